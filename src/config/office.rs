use serde::{Deserialize, Serialize};

use crate::session::{DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_TIMEOUT_MINUTES};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub office: Office,
    pub lawyer: Lawyer,
    #[serde(default)]
    pub payments: PaymentSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub pdf: PdfSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Office {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Profile of the lawyer signing generated documents
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Lawyer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub oab_number: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PaymentSettings {
    pub currency_symbol: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency_symbol: "R$ ".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SessionSettings {
    pub timeout_minutes: u64,
    pub check_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Root of the object store; relative paths are resolved against the config dir
    pub root: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: "storage".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PdfSettings {
    /// wkhtmltopdf binary, looked up on PATH unless a path is given
    #[serde(default = "default_renderer")]
    pub renderer: String,
    pub paper: String,
    pub margin_mm: u32,
}

fn default_renderer() -> String {
    "wkhtmltopdf".to_string()
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            renderer: default_renderer(),
            paper: "A4".to_string(),
            margin_mm: 20,
        }
    }
}
