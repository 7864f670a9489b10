use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{load_clients, load_state, save_state, FileRecord};
use crate::error::{LawdeskError, Result};
use crate::storage::sanitize_name;

use super::generator::object_store;

/// MIME type from a file extension
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("html") | Some("htm") => "text/html",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("doc") => "application/msword",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Stored name: "{timestamp}_{sanitized stem}.{ext}"
fn stored_name(path: &Path, timestamp: i64) -> String {
    let stem = path
        .file_stem()
        .map(|s| sanitize_name(&s.to_string_lossy()))
        .unwrap_or_else(|| "file".to_string());
    match path.extension() {
        Some(ext) => format!(
            "{timestamp}_{stem}.{}",
            ext.to_string_lossy().to_ascii_lowercase()
        ),
        None => format!("{timestamp}_{stem}"),
    }
}

/// Copy a local file into a client's storage folder and record it.
pub fn add_client_file(
    cfg_dir: &Path,
    client_id: &str,
    file: &Path,
    description: &str,
) -> Result<u32> {
    let clients = load_clients(cfg_dir)?;
    if !clients.contains_key(client_id) {
        return Err(LawdeskError::ClientNotFound(client_id.to_string()));
    }

    let bytes = fs::read(file)?;
    let store = object_store(cfg_dir)?;
    let now = Local::now();
    let object_path = format!("client-{client_id}/{}", stored_name(file, now.timestamp()));
    store.upload(&object_path, &bytes)?;

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| object_path.clone());

    let mut state = load_state(cfg_dir)?;
    let id = state.add_file(FileRecord {
        id: 0,
        client_id: client_id.to_string(),
        file_name,
        file_path: object_path,
        file_type: mime_for(file).to_string(),
        description: description.trim().to_string(),
        created_at: now,
    });
    state.log_activity("file_uploaded", format!("file={id} client={client_id}"));
    save_state(cfg_dir, &state)?;

    info!(id, client_id, "stored client file");
    Ok(id)
}

/// Copy a stored file out to `output`. Returns the written path.
pub fn export_client_file(cfg_dir: &Path, id: u32, output: &Path) -> Result<PathBuf> {
    let state = load_state(cfg_dir)?;
    let record = state.file(id).ok_or(LawdeskError::FileNotFound(id))?;
    let bytes = object_store(cfg_dir)?.download(&record.file_path)?;

    let target = if output.is_dir() {
        output.join(&record.file_name)
    } else {
        output.to_path_buf()
    };
    fs::write(&target, bytes)?;
    Ok(target)
}

/// Delete a stored file and its record. Returns the removed record.
pub fn remove_client_file(cfg_dir: &Path, id: u32) -> Result<FileRecord> {
    let store = object_store(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let record = state.remove_file(id).ok_or(LawdeskError::FileNotFound(id))?;

    store.delete(&record.file_path)?;
    state.log_activity(
        "file_deleted",
        format!("file={id} client={}", record.client_id),
    );
    save_state(cfg_dir, &state)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_keep_the_extension() {
        assert_eq!(
            stored_name(Path::new("/tmp/RG Frente.JPG"), 1760000000),
            "1760000000_rg_frente.jpg"
        );
        assert_eq!(stored_name(Path::new("notas"), 5), "5_notas");
        assert_eq!(mime_for(Path::new("a.PDF")), "application/pdf");
        assert_eq!(mime_for(Path::new("a.bin")), "application/octet-stream");
    }
}
