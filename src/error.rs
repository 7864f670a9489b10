use std::path::PathBuf;
use thiserror::Error;

use crate::registration::FieldError;

/// Broad category of a failure, used to decide how it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Permission,
    ExternalService,
    NotFound,
    Config,
    Io,
}

impl ErrorKind {
    /// Process exit status for a command failing with this kind of error
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Config | ErrorKind::Io => 1,
            ErrorKind::Validation => 2,
            ErrorKind::Conflict => 3,
            ErrorKind::NotFound => 4,
            ErrorKind::Permission => 5,
            ErrorKind::ExternalService => 6,
        }
    }
}

#[derive(Error, Debug)]
pub enum LawdeskError {
    #[error("Config directory not found at {0}. Run 'lawdesk init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Client '{0}' not found in clients.toml")]
    ClientNotFound(String),

    #[error("Payment plan {0} not found")]
    PlanNotFound(u32),

    #[error("Installment {number} not found in plan {plan}")]
    InstallmentNotFound { plan: u32, number: u32 },

    #[error("Template {0} not found")]
    TemplateNotFound(u32),

    #[error("File {0} not found")]
    FileNotFound(u32),

    #[error("Appointment {0} not found")]
    AppointmentNotFound(u32),

    #[error("Stored object not found: {0}")]
    ObjectNotFound(String),

    #[error("CEP {0} not found")]
    CepNotFound(String),

    #[error("Invalid client data:\n{}", format_field_errors(.0))]
    InvalidClient(Vec<FieldError>),

    #[error("Client with {field} '{value}' is already registered")]
    DuplicateClient { field: String, value: String },

    #[error("Invalid amount '{0}'. Use e.g. 1.234,56 or 1234.56")]
    InvalidAmountFormat(String),

    #[error("Payment amount must be greater than zero")]
    InvalidPaymentAmount,

    #[error("Paid amount {amount:.2} is outside 0.00..={max:.2}")]
    InvalidPaidAmount {
        amount: rust_decimal::Decimal,
        max: rust_decimal::Decimal,
    },

    #[error("Total value must be greater than zero")]
    InvalidTotalValue,

    #[error("Installment count must be at least 1")]
    InvalidInstallmentCount,

    #[error("Payment would exceed plan balance (max {max:.2} remaining)")]
    OverPayment {
        plan: u32,
        max: rust_decimal::Decimal,
    },

    #[error("Invalid date '{0}'. Expected {1}")]
    InvalidDate(String, &'static str),

    #[error("Template contains unknown placeholders: {}", .0.join(", "))]
    InvalidPlaceholders(Vec<String>),

    #[error("Template name must not be empty")]
    EmptyTemplateName,

    #[error("Unsupported template file '{0}'. Use a .docx or .html file")]
    UnsupportedTemplateFile(PathBuf),

    #[error("Failed to read DOCX {path}: {reason}")]
    DocxRead { path: PathBuf, reason: String },

    #[error("wkhtmltopdf not found. Install it from https://wkhtmltopdf.org/")]
    PdfRendererNotFound,

    #[error("Failed to generate PDF: {0}")]
    PdfGeneration(String),

    #[error("CEP lookup failed: {0}")]
    CepLookup(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LawdeskError {
    pub fn kind(&self) -> ErrorKind {
        use LawdeskError::*;
        match self {
            ConfigNotFound(_)
            | ConfigFileNotFound(_)
            | ConfigParse { .. }
            | ConfigWrite { .. }
            | AlreadyInitialized(_) => ErrorKind::Config,
            ClientNotFound(_)
            | PlanNotFound(_)
            | InstallmentNotFound { .. }
            | TemplateNotFound(_)
            | FileNotFound(_)
            | AppointmentNotFound(_)
            | ObjectNotFound(_)
            | CepNotFound(_) => ErrorKind::NotFound,
            DuplicateClient { .. } => ErrorKind::Conflict,
            PermissionDenied(_) => ErrorKind::Permission,
            PdfRendererNotFound | PdfGeneration(_) | CepLookup(_) => ErrorKind::ExternalService,
            Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            Io(_) => ErrorKind::Io,
            InvalidClient(_)
            | InvalidAmountFormat(_)
            | InvalidPaymentAmount
            | InvalidPaidAmount { .. }
            | InvalidTotalValue
            | InvalidInstallmentCount
            | OverPayment { .. }
            | InvalidDate(..)
            | InvalidPlaceholders(_)
            | EmptyTemplateName
            | UnsupportedTemplateFile(_)
            | DocxRead { .. } => ErrorKind::Validation,
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, LawdeskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn kinds_pick_exit_codes() {
        let cases = [
            (LawdeskError::InvalidPaymentAmount, ErrorKind::Validation, 2),
            (
                LawdeskError::DuplicateClient {
                    field: "CPF".into(),
                    value: "52998224725".into(),
                },
                ErrorKind::Conflict,
                3,
            ),
            (LawdeskError::PlanNotFound(9), ErrorKind::NotFound, 4),
            (
                LawdeskError::PermissionDenied("../x".into()),
                ErrorKind::Permission,
                5,
            ),
            (LawdeskError::PdfRendererNotFound, ErrorKind::ExternalService, 6),
            (
                LawdeskError::AlreadyInitialized(PathBuf::from("/tmp/x")),
                ErrorKind::Config,
                1,
            ),
        ];
        for (err, kind, code) in cases {
            assert_eq!(err.kind(), kind, "{err}");
            assert_eq!(err.kind().exit_code(), code);
        }

        let over = LawdeskError::OverPayment {
            plan: 1,
            max: Decimal::new(70000, 2),
        };
        assert_eq!(over.to_string(), "Payment would exceed plan balance (max 700.00 remaining)");

        let denied = LawdeskError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        assert_eq!(denied.kind(), ErrorKind::Permission);
    }
}
