use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Client {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    pub cpf: String,
    pub rg: String,
    #[serde(default)]
    pub expeditor_rg: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub marital_status: Option<String>,
    pub cep: String,
    pub address: String,
    #[serde(default)]
    pub address_number: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub father_name: Option<String>,
    pub mother_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
