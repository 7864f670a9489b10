use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::config::PdfSettings;
use crate::error::{LawdeskError, Result};

/// Command-line arguments for one HTML -> PDF conversion
pub fn renderer_args(settings: &PdfSettings, html_path: &Path, pdf_path: &Path) -> Vec<String> {
    let margin = format!("{}mm", settings.margin_mm);
    let mut args = vec![
        "--quiet".to_string(),
        "--encoding".to_string(),
        "utf-8".to_string(),
        "--page-size".to_string(),
        settings.paper.clone(),
    ];
    for side in ["--margin-top", "--margin-bottom", "--margin-left", "--margin-right"] {
        args.push(side.to_string());
        args.push(margin.clone());
    }
    args.push(html_path.to_string_lossy().into_owned());
    args.push(pdf_path.to_string_lossy().into_owned());
    args
}

/// Render a standalone HTML page to PDF using the wkhtmltopdf CLI.
pub fn render_pdf(html: &str, settings: &PdfSettings, output_path: &Path) -> Result<()> {
    let renderer = settings.renderer.as_str();

    // Check if the renderer is available
    if Command::new(renderer).arg("--version").output().is_err() {
        return Err(LawdeskError::PdfRendererNotFound);
    }

    let temp_dir = std::env::temp_dir().join("lawdesk");
    std::fs::create_dir_all(&temp_dir)?;

    let html_path = temp_dir.join(format!("render-{}.html", std::process::id()));
    std::fs::write(&html_path, html)?;

    let args = renderer_args(settings, &html_path, output_path);
    debug!(renderer, ?args, "rendering pdf");
    let output = Command::new(renderer).args(&args).output();

    // Clean up before reporting
    let _ = std::fs::remove_file(&html_path);
    let output = output?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LawdeskError::PdfGeneration(stderr.trim().to_string()));
    }

    info!(path = %output_path.display(), "rendered pdf");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn args_carry_paper_and_margins() {
        let settings = PdfSettings {
            paper: "Letter".to_string(),
            margin_mm: 15,
            ..Default::default()
        };
        let args = renderer_args(
            &settings,
            &PathBuf::from("/tmp/in.html"),
            &PathBuf::from("/tmp/out.pdf"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("--page-size Letter"));
        assert!(joined.contains("--margin-left 15mm"));
        assert!(joined.ends_with("/tmp/in.html /tmp/out.pdf"));
    }

    #[test]
    fn missing_renderer_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PdfSettings {
            renderer: dir.path().join("no-such-renderer").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let out = dir.path().join("out.pdf");
        assert!(matches!(
            render_pdf("<p>oi</p>", &settings, &out),
            Err(LawdeskError::PdfRendererNotFound)
        ));
        assert!(!out.exists());
    }
}
