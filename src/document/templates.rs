use std::path::Path;
use tracing::info;

use crate::config::{load_state, save_state};
use crate::error::{LawdeskError, Result};
use crate::template::{load_template_html, validate_template};

/// Convert and validate a template file, then store it. Returns the new id.
pub fn upload_template(
    cfg_dir: &Path,
    name: &str,
    description: &str,
    file: &Path,
) -> Result<u32> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LawdeskError::EmptyTemplateName);
    }

    let content = load_template_html(file)?;
    let fields = validate_template(&content)?;

    let mut state = load_state(cfg_dir)?;
    let id = state.add_template(name, description.trim(), content, fields);
    state.log_activity("template_uploaded", format!("template={id} name={name}"));
    save_state(cfg_dir, &state)?;

    info!(id, name, "stored template");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_valid_templates_only() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.html");
        std::fs::write(&good, "<p>{nomeCliente} / {numeroOAB}</p>").unwrap();
        let bad = dir.path().join("bad.html");
        std::fs::write(&bad, "<p>{nomeCliente} {apelido}</p>").unwrap();

        let id = upload_template(dir.path(), "Procuração", "", &good).unwrap();
        let state = load_state(dir.path()).unwrap();
        let stored = state.template(id).unwrap();
        assert_eq!(stored.fields, vec!["nomeCliente", "numeroOAB"]);

        assert!(matches!(
            upload_template(dir.path(), "Outro", "", &bad),
            Err(LawdeskError::InvalidPlaceholders(_))
        ));
        assert!(matches!(
            upload_template(dir.path(), "  ", "", &good),
            Err(LawdeskError::EmptyTemplateName)
        ));
        assert_eq!(load_state(dir.path()).unwrap().templates.len(), 1);
    }
}
