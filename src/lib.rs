pub mod config;
pub mod document;
pub mod error;
pub mod payment;
pub mod pdf;
pub mod registration;
pub mod session;
pub mod storage;
pub mod template;

pub use config::{Client, Config, Lawyer, PaymentPlan, State, Template};
pub use document::{generate_document, upload_template, GeneratedDocument};
pub use error::{ErrorKind, LawdeskError, Result};
pub use session::{SessionTracker, SignOut};
