use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{
    load_clients, load_config, load_state, resolve_dir, save_state, FileRecord,
};
use crate::error::{LawdeskError, Result};
use crate::pdf::render_pdf;
use crate::storage::{sanitize_name, ObjectStore};
use crate::template::{html_page, render_document, RenderContext};

pub const HTML_MIME: &str = "text/html";
pub const PDF_MIME: &str = "application/pdf";

/// Where a generated document ended up
#[derive(Debug)]
pub struct GeneratedDocument {
    pub file_id: u32,
    pub pdf_file_id: Option<u32>,
    pub object_path: String,
    pub local_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
}

pub fn object_store(cfg_dir: &Path) -> Result<ObjectStore> {
    let config = load_config(cfg_dir)?;
    Ok(ObjectStore::new(resolve_dir(&config.storage.root, cfg_dir)))
}

/// Build the stored file name: "{template}_{first}_{last}_{timestamp}.{ext}".
pub fn document_file_name(
    template_name: &str,
    first_name: &str,
    last_name: &str,
    timestamp: i64,
    ext: &str,
) -> String {
    format!(
        "{}_{}_{}.{}",
        sanitize_name(template_name),
        sanitize_name(&format!("{first_name}_{last_name}")),
        timestamp,
        ext
    )
}

/// Render a template for a client and store the result.
pub fn generate_document(
    cfg_dir: &Path,
    template_id: u32,
    client_id: &str,
    with_pdf: bool,
) -> Result<GeneratedDocument> {
    let config = load_config(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let store = ObjectStore::new(resolve_dir(&config.storage.root, cfg_dir));

    let template = state
        .template(template_id)
        .ok_or(LawdeskError::TemplateNotFound(template_id))?
        .clone();
    let client = clients
        .get(client_id)
        .ok_or_else(|| LawdeskError::ClientNotFound(client_id.to_string()))?;

    let ctx = RenderContext::new(client, &config.lawyer);
    let rendered = render_document(&template.content, &ctx);
    let page = html_page(
        &format!("{} - {}", template.name, client.full_name()),
        &rendered,
    );

    let now = Local::now();
    let file_name = document_file_name(
        &template.name,
        &client.first_name,
        &client.last_name,
        now.timestamp(),
        "html",
    );
    let object_path = format!("client-{client_id}/{file_name}");
    let local_path = store.upload(&object_path, page.as_bytes())?;

    let mut pdf = None;
    if with_pdf {
        let pdf_name = file_name.replace(".html", ".pdf");
        let pdf_object = format!("client-{client_id}/{pdf_name}");
        let rendered = store
            .path_of(&pdf_object)
            .and_then(|target| render_pdf(&page, &config.pdf, &target).map(|_| target));
        match rendered {
            Ok(target) => pdf = Some((pdf_name, pdf_object, target)),
            Err(e) => {
                // Nothing is recorded for this document, so nothing may stay stored
                store.delete(&object_path)?;
                return Err(e);
            }
        }
    }

    let description = format!("Generated from template: {}", template.name);
    let file_id = state.add_file(FileRecord {
        id: 0,
        client_id: client_id.to_string(),
        file_name,
        file_path: object_path.clone(),
        file_type: HTML_MIME.to_string(),
        description: description.clone(),
        created_at: now,
    });

    let mut pdf_file_id = None;
    let mut pdf_path = None;
    if let Some((pdf_name, pdf_object, target)) = pdf {
        pdf_file_id = Some(state.add_file(FileRecord {
            id: 0,
            client_id: client_id.to_string(),
            file_name: pdf_name,
            file_path: pdf_object,
            file_type: PDF_MIME.to_string(),
            description,
            created_at: now,
        }));
        pdf_path = Some(target);
    }

    state.log_activity(
        "document_generated",
        format!("template={} client={client_id}", template.id),
    );
    save_state(cfg_dir, &state)?;

    info!(template_id, client_id, file_id, "generated document");

    Ok(GeneratedDocument {
        file_id,
        pdf_file_id,
        object_path,
        local_path,
        pdf_path,
    })
}
