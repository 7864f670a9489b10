mod client;
mod office;
pub mod state;

pub use client::Client;
pub use office::{Config, Lawyer, Office, PdfSettings, SessionSettings};
pub use state::{
    Appointment, FileRecord, Installment, PaymentHistoryEntry, PaymentPlan, PlanStatus, State,
    Template,
};

use crate::error::{LawdeskError, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Get the config directory path (~/.lawdesk/)
pub fn config_dir() -> Result<PathBuf> {
    // First try XDG-style directories
    if let Some(proj_dirs) = ProjectDirs::from("", "", "lawdesk") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    // Fallback to ~/.lawdesk/
    let home = dirs_home().ok_or_else(|| {
        LawdeskError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".lawdesk"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand ~ in paths
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve a configured directory; relative paths live under the config dir.
pub fn resolve_dir(configured: &str, cfg_dir: &Path) -> PathBuf {
    let expanded = expand_path(configured);
    if expanded.is_absolute() {
        expanded
    } else {
        cfg_dir.join(expanded)
    }
}

fn read_toml<T: DeserializeOwned>(path: PathBuf) -> Result<T> {
    if !path.exists() {
        return Err(LawdeskError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| LawdeskError::ConfigParse { path, source: e })
}

fn write_toml<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    let content = toml::to_string_pretty(value)
        .map_err(|e| LawdeskError::ConfigWrite { path: path.clone(), source: e })?;
    fs::write(&path, content)?;
    debug!(path = %path.display(), "saved");
    Ok(())
}

/// Load the main config.toml
pub fn load_config(config_dir: &Path) -> Result<Config> {
    read_toml(config_dir.join("config.toml"))
}

/// Load clients.toml keyed by client id
pub fn load_clients(config_dir: &Path) -> Result<BTreeMap<String, Client>> {
    read_toml(config_dir.join("clients.toml"))
}

/// Save clients.toml
pub fn save_clients(config_dir: &Path, clients: &BTreeMap<String, Client>) -> Result<()> {
    write_toml(config_dir.join("clients.toml"), clients)
}

/// Load state.toml (creates default if missing)
pub fn load_state(config_dir: &Path) -> Result<State> {
    let path = config_dir.join("state.toml");
    if !path.exists() {
        return Ok(State::default());
    }
    read_toml(path)
}

/// Save state.toml
pub fn save_state(config_dir: &Path, state: &State) -> Result<()> {
    write_toml(config_dir.join("state.toml"), state)
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[office]
name = "Silva & Associados"
# email = "contato@silvaadv.com.br"   # optional
# phone = "+55 11 3333-4444"          # optional

[lawyer]
name = "Dra. Ana Silva"
oab_number = "SP 123.456"

[payments]
currency_symbol = "R$ "

[session]
timeout_minutes = 480      # sign out after 8 hours without activity
check_interval_secs = 60

[storage]
root = "storage"           # relative to this directory

[pdf]
renderer = "wkhtmltopdf"
paper = "A4"
margin_mm = 20
"#;

/// Template content for clients.toml
pub const CLIENTS_TEMPLATE: &str = r#"# Clients are normally added with 'lawdesk clients add'. The table name
# (e.g., [maria-souza]) is the client identifier used by other commands.

[maria-souza]
first_name = "Maria"
last_name = "Souza"
phone = "11987654321"
cpf = "52998224725"
rg = "123456789"
expeditor_rg = "SSP/SP"
nationality = "brasileira"
marital_status = "casada"
cep = "01001000"
address = "Praça da Sé"
address_number = "100"
neighborhood = "Sé"
city = "São Paulo"
state = "SP"
mother_name = "Joana Souza"
birth_date = "1980-05-17"
"#;
