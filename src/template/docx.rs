use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{LawdeskError, Result};

/// Stylesheet shipped with every converted template
const DOCUMENT_CSS: &str = r#"<style>
  .header { text-align: center; margin-bottom: 2em; }
  .header img { max-width: 100%; height: auto; }
  .footer { text-align: center; margin-top: 2em; border-top: 1px solid #ccc; padding-top: 1em; }
  p { margin: 1em 0; line-height: 1.5; }
  .document-content { white-space: pre-wrap; font-family: Arial, sans-serif; }
</style>"#;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wrap converted body HTML with the stock stylesheet.
pub fn wrap_document(body: &str) -> String {
    format!("{DOCUMENT_CSS}\n<div class=\"document-content\">\n{body}\n</div>\n")
}

/// Load a template file as HTML: .docx is converted, .html is read as-is.
pub fn load_template_html(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("docx") => docx_to_html(path),
        Some("html") | Some("htm") => Ok(std::fs::read_to_string(path)?),
        _ => Err(LawdeskError::UnsupportedTemplateFile(path.to_path_buf())),
    }
}

/// Convert a DOCX file into an HTML fragment.
pub fn docx_to_html(path: &Path) -> Result<String> {
    let docx_err = |reason: String| LawdeskError::DocxRead {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| docx_err(format!("invalid zip: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| docx_err(format!("word/document.xml: {e}")))?
        .read_to_string(&mut xml)?;

    let body = document_xml_to_html(&xml).map_err(docx_err)?;
    debug!(path = %path.display(), bytes = body.len(), "converted docx");
    Ok(wrap_document(&body))
}

#[derive(Default)]
struct RunFormat {
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Default)]
struct Paragraph {
    style: Option<String>,
    html: String,
}

impl Paragraph {
    fn finish(self) -> String {
        let content = if self.html.trim().is_empty() {
            "&nbsp;".to_string()
        } else {
            self.html
        };
        match self.style.as_deref() {
            Some("Heading1") => format!("<h1>{content}</h1>"),
            Some("Heading2") => format!("<h2>{content}</h2>"),
            Some("Header") => format!("<div class=\"header\">{content}</div>"),
            Some("Footer") => format!("<div class=\"footer\">{content}</div>"),
            _ => format!("<p>{content}</p>"),
        }
    }
}

/// `<w:b/>` is on unless its value says otherwise.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    match e.try_get_attribute("w:val") {
        Ok(Some(attr)) => !matches!(
            attr.unescape_value().as_deref(),
            Ok("0") | Ok("false") | Ok("none")
        ),
        _ => true,
    }
}

fn attr_value(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Translate WordprocessingML body XML into HTML paragraphs.
fn document_xml_to_html(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out: Vec<String> = Vec::new();
    let mut paragraph: Option<Paragraph> = None;
    let mut format = RunFormat::default();
    let mut run_text = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => paragraph = Some(Paragraph::default()),
                b"r" => {
                    in_run = true;
                    format = RunFormat::default();
                    run_text.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => out.push(Paragraph::default().finish()),
                b"pStyle" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.style = attr_value(&e, "w:val");
                    }
                }
                b"b" if in_run => format.bold = toggle_on(&e),
                b"i" if in_run => format.italic = toggle_on(&e),
                b"u" if in_run => format.underline = toggle_on(&e),
                b"tab" if in_run => run_text.push('\t'),
                b"br" if in_run => run_text.push_str("<br/>"),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                run_text.push_str(&escape_html(&text));
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => {
                    in_run = false;
                    if let Some(p) = paragraph.as_mut() {
                        let mut html = std::mem::take(&mut run_text);
                        if format.underline {
                            html = format!("<u>{html}</u>");
                        }
                        if format.italic {
                            html = format!("<i>{html}</i>");
                        }
                        if format.bold {
                            html = format!("<b>{html}</b>");
                        }
                        p.html.push_str(&html);
                    }
                }
                b"p" => {
                    if let Some(p) = paragraph.take() {
                        out.push(p.finish());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Contrato</w:t></w:r></w:p>
    <w:p>
      <w:r><w:rPr><w:b/></w:rPr><w:t>Contratante:</w:t></w:r>
      <w:r><w:t xml:space="preserve"> {nomeCliente} &amp; filhos</w:t></w:r>
    </w:p>
    <w:p/>
    <w:p><w:r><w:rPr><w:i/><w:u w:val="single"/></w:rPr><w:t>{dataContrato}</w:t></w:r></w:p>
    <w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>fim</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn converts_paragraphs_and_runs() {
        let html = document_xml_to_html(BODY).unwrap();
        assert!(html.contains("<h1>Contrato</h1>"));
        assert!(html.contains("<p><b>Contratante:</b> {nomeCliente} &amp; filhos</p>"));
        assert!(html.contains("<p>&nbsp;</p>"));
        assert!(html.contains("<p><i><u>{dataContrato}</u></i></p>"));
        assert!(html.contains("<p>fim</p>"));
    }

    #[test]
    fn reads_docx_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelo.docx");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(BODY.as_bytes()).unwrap();
        zip.finish().unwrap();

        let html = load_template_html(&path).unwrap();
        assert!(html.starts_with("<style>"));
        assert!(html.contains("<div class=\"document-content\">"));
        assert!(html.contains("{nomeCliente}"));
    }

    #[test]
    fn rejects_unknown_extensions_and_bad_archives() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("modelo.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(matches!(
            load_template_html(&txt),
            Err(LawdeskError::UnsupportedTemplateFile(_))
        ));

        let fake = dir.path().join("fake.docx");
        std::fs::write(&fake, "not a zip").unwrap();
        assert!(matches!(
            load_template_html(&fake),
            Err(LawdeskError::DocxRead { .. })
        ));
    }
}
