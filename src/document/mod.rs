mod files;
mod generator;
mod templates;

pub use files::{add_client_file, export_client_file, mime_for, remove_client_file};
pub use generator::{
    document_file_name, generate_document, object_store, GeneratedDocument, HTML_MIME, PDF_MIME,
};
pub use templates::upload_template;
