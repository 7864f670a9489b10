//! Client registration: form validation, duplicate detection and CEP lookup.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use ureq::Agent;

use crate::config::Client;
use crate::error::{LawdeskError, Result};

/// A single problem with a submitted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Raw registration form as typed by the operator.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistration {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub contact_phone: Option<String>,
    pub cpf: String,
    pub rg: String,
    pub expeditor_rg: Option<String>,
    pub nationality: Option<String>,
    pub marital_status: Option<String>,
    pub cep: String,
    pub address: String,
    pub address_number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: String,
    pub state: String,
    pub father_name: Option<String>,
    pub mother_name: String,
    pub birth_date: String,
}

/// Address fields returned by a CEP lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CepAddress {
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check a CPF against its two mod-11 check digits.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = digits_only(cpf)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 {
            0
        } else {
            rest
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

/// CEPs are eight digits once punctuation is removed.
pub fn normalize_cep(cep: &str) -> Option<String> {
    let digits = digits_only(cep);
    (digits.len() == 8).then_some(digits)
}

impl ClientRegistration {
    /// Form prefilled from a stored client, for editing.
    pub fn from_client(client: &Client) -> Self {
        ClientRegistration {
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            phone: client.phone.clone(),
            contact_phone: client.contact_phone.clone(),
            cpf: client.cpf.clone(),
            rg: client.rg.clone(),
            expeditor_rg: client.expeditor_rg.clone(),
            nationality: client.nationality.clone(),
            marital_status: client.marital_status.clone(),
            cep: client.cep.clone(),
            address: client.address.clone(),
            address_number: client.address_number.clone(),
            neighborhood: client.neighborhood.clone(),
            city: client.city.clone(),
            state: client.state.clone(),
            father_name: client.father_name.clone(),
            mother_name: client.mother_name.clone(),
            birth_date: client
                .birth_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate the form and produce the stored client record.
    ///
    /// All field problems are collected before returning.
    pub fn validate(self) -> Result<Client> {
        let mut errors = Vec::new();

        let mut required = |field: &'static str, value: &str, label: &str| {
            if value.trim().is_empty() {
                errors.push(FieldError::new(field, format!("{label} is required")));
            }
        };
        required("first_name", &self.first_name, "First name");
        required("last_name", &self.last_name, "Last name");
        required("phone", &self.phone, "Phone");
        required("rg", &self.rg, "RG");
        required("address", &self.address, "Address");
        required("city", &self.city, "City");
        required("state", &self.state, "State");
        required("mother_name", &self.mother_name, "Mother's name");

        let cpf = digits_only(&self.cpf);
        if cpf.is_empty() {
            errors.push(FieldError::new("cpf", "CPF is required"));
        } else if !is_valid_cpf(&cpf) {
            errors.push(FieldError::new("cpf", "invalid CPF"));
        }

        let cep = normalize_cep(&self.cep);
        if self.cep.trim().is_empty() {
            errors.push(FieldError::new("cep", "CEP is required"));
        } else if cep.is_none() {
            errors.push(FieldError::new("cep", "invalid CEP format, expected 8 digits"));
        }

        let birth_date = if self.birth_date.trim().is_empty() {
            errors.push(FieldError::new("birth_date", "Birth date is required"));
            None
        } else {
            match NaiveDate::parse_from_str(self.birth_date.trim(), "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(_) => {
                    errors.push(FieldError::new("birth_date", "expected YYYY-MM-DD"));
                    None
                }
            }
        };

        if !errors.is_empty() {
            return Err(LawdeskError::InvalidClient(errors));
        }

        Ok(Client {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: digits_only(&self.phone),
            contact_phone: non_empty(self.contact_phone.map(|p| digits_only(&p))),
            cpf,
            rg: self.rg.trim().to_string(),
            expeditor_rg: non_empty(self.expeditor_rg),
            nationality: non_empty(self.nationality),
            marital_status: non_empty(self.marital_status),
            cep: cep.unwrap_or_default(),
            address: self.address.trim().to_string(),
            address_number: non_empty(self.address_number),
            neighborhood: non_empty(self.neighborhood),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            father_name: non_empty(self.father_name),
            mother_name: self.mother_name.trim().to_string(),
            birth_date,
        })
    }

    /// Fill address fields the operator left blank.
    pub fn fill_address(&mut self, found: &CepAddress) {
        if self.address.trim().is_empty() {
            self.address = found.address.clone();
        }
        if self.city.trim().is_empty() {
            self.city = found.city.clone();
        }
        if self.state.trim().is_empty() {
            self.state = found.state.clone();
        }
        if non_empty(self.neighborhood.clone()).is_none() && !found.neighborhood.is_empty() {
            self.neighborhood = Some(found.neighborhood.clone());
        }
    }

    pub fn needs_address(&self) -> bool {
        self.address.trim().is_empty() || self.city.trim().is_empty() || self.state.trim().is_empty()
    }
}

/// Reject a client whose CPF or RG is already registered under another id.
pub fn check_duplicates(
    clients: &BTreeMap<String, Client>,
    client: &Client,
    own_id: Option<&str>,
) -> Result<()> {
    for (id, existing) in clients {
        if Some(id.as_str()) == own_id {
            continue;
        }
        if existing.cpf == client.cpf {
            return Err(LawdeskError::DuplicateClient {
                field: "CPF".to_string(),
                value: client.cpf.clone(),
            });
        }
        if existing.rg == client.rg {
            return Err(LawdeskError::DuplicateClient {
                field: "RG".to_string(),
                value: client.rg.clone(),
            });
        }
    }
    Ok(())
}

/// Derive a client id like "maria-souza", suffixed when already taken.
pub fn client_id_for(client: &Client, clients: &BTreeMap<String, Client>) -> String {
    let base: String = client
        .full_name()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let base = if base.is_empty() { "client".to_string() } else { base };

    let mut candidate = base.clone();
    let mut n = 2;
    while clients.contains_key(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    candidate
}

/// Parse a ViaCEP JSON response.
pub fn parse_viacep(cep: &str, body: &str) -> Result<CepAddress> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| LawdeskError::CepLookup(e.to_string()))?;

    let not_found = match &json["erro"] {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => s == "true",
        _ => false,
    };
    if not_found {
        return Err(LawdeskError::CepNotFound(cep.to_string()));
    }

    let field = |key: &str| json[key].as_str().unwrap_or_default().to_string();
    Ok(CepAddress {
        address: field("logradouro"),
        neighborhood: field("bairro"),
        city: field("localidade"),
        state: field("uf"),
    })
}

/// Look up an address from the ViaCEP service.
pub fn lookup_cep(cep: &str) -> Result<CepAddress> {
    let cep = normalize_cep(cep).ok_or_else(|| {
        LawdeskError::InvalidClient(vec![FieldError::new(
            "cep",
            "invalid CEP format, expected 8 digits",
        )])
    })?;

    let agent: Agent = Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(5)))
        .build()
        .into();

    debug!(%cep, "looking up CEP");
    let url = format!("https://viacep.com.br/ws/{cep}/json/");
    let body: String = agent
        .get(url.as_str())
        .call()
        .map_err(|e| {
            warn!(%cep, error = %e, "CEP lookup failed");
            LawdeskError::CepLookup(e.to_string())
        })?
        .body_mut()
        .read_to_string()
        .map_err(|e| LawdeskError::CepLookup(e.to_string()))?;

    parse_viacep(&cep, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ClientRegistration {
        ClientRegistration {
            first_name: "Maria".into(),
            last_name: "Souza".into(),
            phone: "(11) 98765-4321".into(),
            cpf: "529.982.247-25".into(),
            rg: "12.345.678-9".into(),
            cep: "01001-000".into(),
            address: "Praça da Sé".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
            mother_name: "Joana Souza".into(),
            birth_date: "1980-05-17".into(),
            ..Default::default()
        }
    }

    #[test]
    fn cpf_checksum() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("52998224725"));
        assert!(!is_valid_cpf("529.982.247-24"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("1234"));
    }

    #[test]
    fn valid_form_is_normalized() {
        let client = form().validate().unwrap();
        assert_eq!(client.cpf, "52998224725");
        assert_eq!(client.phone, "11987654321");
        assert_eq!(client.cep, "01001000");
        assert_eq!(client.birth_date, NaiveDate::from_ymd_opt(1980, 5, 17));
        assert_eq!(client.father_name, None);
    }

    #[test]
    fn collects_every_field_error() {
        let bad = ClientRegistration {
            cpf: "123".into(),
            cep: "0100".into(),
            birth_date: "17/05/1980".into(),
            ..Default::default()
        };
        let Err(LawdeskError::InvalidClient(errors)) = bad.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        for expected in ["first_name", "phone", "mother_name", "cpf", "cep", "birth_date"] {
            assert!(fields.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn duplicates_are_conflicts() {
        let client = form().validate().unwrap();
        let mut clients = BTreeMap::new();
        clients.insert("maria-souza".to_string(), client.clone());

        let err = check_duplicates(&clients, &client, None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        assert!(check_duplicates(&clients, &client, Some("maria-souza")).is_ok());
    }

    #[test]
    fn stored_client_round_trips_through_the_form() {
        let client = form().validate().unwrap();
        let mut edit = ClientRegistration::from_client(&client);
        assert_eq!(edit.birth_date, "1980-05-17");

        edit.city = "Campinas".into();
        let edited = edit.validate().unwrap();
        assert_eq!(edited.city, "Campinas");
        assert_eq!(edited.cpf, client.cpf);
        assert_eq!(edited.birth_date, client.birth_date);
    }

    #[test]
    fn client_ids_are_unique_slugs() {
        let client = form().validate().unwrap();
        let mut clients = BTreeMap::new();
        assert_eq!(client_id_for(&client, &clients), "maria-souza");
        clients.insert("maria-souza".to_string(), client.clone());
        assert_eq!(client_id_for(&client, &clients), "maria-souza-2");
    }

    #[test]
    fn viacep_responses() {
        let body = r#"{"cep":"01001-000","logradouro":"Praça da Sé","bairro":"Sé","localidade":"São Paulo","uf":"SP"}"#;
        let found = parse_viacep("01001000", body).unwrap();
        assert_eq!(found.city, "São Paulo");
        assert_eq!(found.state, "SP");

        assert!(matches!(
            parse_viacep("99999999", r#"{"erro": true}"#),
            Err(LawdeskError::CepNotFound(_))
        ));
        assert!(matches!(
            parse_viacep("99999999", r#"{"erro": "true"}"#),
            Err(LawdeskError::CepNotFound(_))
        ));
    }

    #[test]
    fn lookup_fills_only_blank_fields() {
        let mut reg = ClientRegistration {
            city: "Osasco".into(),
            ..Default::default()
        };
        assert!(reg.needs_address());
        reg.fill_address(&CepAddress {
            address: "Rua A".into(),
            neighborhood: "Centro".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
        });
        assert_eq!(reg.address, "Rua A");
        assert_eq!(reg.city, "Osasco");
        assert_eq!(reg.neighborhood.as_deref(), Some("Centro"));
        assert!(!reg.needs_address());
    }
}
