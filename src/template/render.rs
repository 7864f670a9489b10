use regex::Captures;

use super::placeholder::{detect_placeholders, substitution_re, PlaceholderKind, RenderContext};
use crate::error::{LawdeskError, Result};

/// Replace every registered placeholder with its value.
///
/// Values are HTML-escaped. Unregistered tokens are left as they are.
/// Substituted text is never rescanned.
pub fn render_document(content: &str, ctx: &RenderContext<'_>) -> String {
    substitution_re()
        .replace_all(content, |caps: &Captures<'_>| {
            match PlaceholderKind::from_key(&caps[1]) {
                Some(kind) => super::docx::escape_html(&kind.evaluate(ctx)),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Strict check used before storing a template; returns the registered fields.
pub fn validate_template(content: &str) -> Result<Vec<String>> {
    let report = detect_placeholders(content);
    if !report.invalid.is_empty() {
        return Err(LawdeskError::InvalidPlaceholders(report.invalid));
    }
    Ok(report.valid)
}

/// Wrap a rendered fragment in a standalone UTF-8 HTML page.
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        super::docx::escape_html(title),
        body
    )
}
