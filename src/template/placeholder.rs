use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::{Client, Lawyer};

/// Whose data a placeholder is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Client,
    Lawyer,
    Document,
}

/// Every placeholder a template may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    NomeCliente,
    Nacionalidade,
    EstadoCivil,
    NumeroRg,
    ExpeditorRg,
    NumeroCpf,
    EnderecoCompleto,
    NomeAdv,
    NumeroOab,
    DataContrato,
}

/// Data available while rendering a document.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub client: Option<&'a Client>,
    pub lawyer: Option<&'a Lawyer>,
    pub today: NaiveDate,
}

impl<'a> RenderContext<'a> {
    pub fn new(client: &'a Client, lawyer: &'a Lawyer) -> Self {
        Self {
            client: Some(client),
            lawyer: Some(lawyer),
            today: chrono::Local::now().date_naive(),
        }
    }
}

const MONTHS_PT: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// "16 de outubro de 2026"
pub fn long_date_pt_br(date: NaiveDate) -> String {
    format!(
        "{} de {} de {}",
        date.day(),
        MONTHS_PT[date.month0() as usize],
        date.year()
    )
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn full_address(client: &Client) -> String {
    let number = client
        .address_number
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(|n| format!("nº {n}"))
        .unwrap_or_default();

    [
        client.address.clone(),
        number,
        opt(&client.neighborhood),
        client.city.clone(),
        client.state.clone(),
    ]
    .into_iter()
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

impl PlaceholderKind {
    pub const ALL: [PlaceholderKind; 10] = [
        PlaceholderKind::NomeCliente,
        PlaceholderKind::Nacionalidade,
        PlaceholderKind::EstadoCivil,
        PlaceholderKind::NumeroRg,
        PlaceholderKind::ExpeditorRg,
        PlaceholderKind::NumeroCpf,
        PlaceholderKind::EnderecoCompleto,
        PlaceholderKind::NomeAdv,
        PlaceholderKind::NumeroOab,
        PlaceholderKind::DataContrato,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PlaceholderKind::NomeCliente => "nomeCliente",
            PlaceholderKind::Nacionalidade => "nacionalidade",
            PlaceholderKind::EstadoCivil => "estadoCivil",
            PlaceholderKind::NumeroRg => "numeroRG",
            PlaceholderKind::ExpeditorRg => "expeditorRG",
            PlaceholderKind::NumeroCpf => "numeroCPF",
            PlaceholderKind::EnderecoCompleto => "enderecoCompleto",
            PlaceholderKind::NomeAdv => "nomeAdv",
            PlaceholderKind::NumeroOab => "numeroOAB",
            PlaceholderKind::DataContrato => "dataContrato",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn subject(self) -> Subject {
        match self {
            PlaceholderKind::NomeAdv | PlaceholderKind::NumeroOab => Subject::Lawyer,
            PlaceholderKind::DataContrato => Subject::Document,
            _ => Subject::Client,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PlaceholderKind::NomeCliente => "Client full name",
            PlaceholderKind::Nacionalidade => "Client nationality",
            PlaceholderKind::EstadoCivil => "Client marital status",
            PlaceholderKind::NumeroRg => "Client RG number",
            PlaceholderKind::ExpeditorRg => "RG issuing authority",
            PlaceholderKind::NumeroCpf => "Client CPF",
            PlaceholderKind::EnderecoCompleto => "Client full address",
            PlaceholderKind::NomeAdv => "Lawyer name",
            PlaceholderKind::NumeroOab => "Lawyer OAB number",
            PlaceholderKind::DataContrato => "Contract date (today)",
        }
    }

    /// Substitution text for this placeholder. Missing data yields "".
    pub fn evaluate(self, ctx: &RenderContext<'_>) -> String {
        match self.subject() {
            Subject::Client => ctx.client.map(|c| self.client_value(c)).unwrap_or_default(),
            Subject::Lawyer => ctx.lawyer.map(|l| self.lawyer_value(l)).unwrap_or_default(),
            Subject::Document => long_date_pt_br(ctx.today),
        }
    }

    fn client_value(self, client: &Client) -> String {
        match self {
            PlaceholderKind::NomeCliente => client.full_name(),
            PlaceholderKind::Nacionalidade => opt(&client.nationality),
            PlaceholderKind::EstadoCivil => opt(&client.marital_status),
            PlaceholderKind::NumeroRg => client.rg.clone(),
            PlaceholderKind::ExpeditorRg => opt(&client.expeditor_rg),
            PlaceholderKind::NumeroCpf => client.cpf.clone(),
            PlaceholderKind::EnderecoCompleto => full_address(client),
            _ => String::new(),
        }
    }

    fn lawyer_value(self, lawyer: &Lawyer) -> String {
        match self {
            PlaceholderKind::NomeAdv => lawyer.name.clone(),
            PlaceholderKind::NumeroOab => lawyer.oab_number.clone(),
            _ => String::new(),
        }
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("placeholder regex"))
}

/// Innermost `{token}` only, so a stray brace next to a token does not hide it.
pub(super) fn substitution_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("substitution regex"))
}

fn style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<style>.*?</style>").expect("style regex"))
}

/// Placeholders found in a template, split by whether they are registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderReport {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

impl PlaceholderReport {
    pub fn all(&self) -> Vec<String> {
        self.valid.iter().chain(&self.invalid).cloned().collect()
    }
}

/// Scan content for `{name}` tokens outside `<style>` blocks.
pub fn detect_placeholders(content: &str) -> PlaceholderReport {
    let without_styles = style_re().replace_all(content, "");
    let mut report = PlaceholderReport::default();

    for caps in placeholder_re().captures_iter(&without_styles) {
        let name = caps[1].to_string();
        if report.valid.contains(&name) || report.invalid.contains(&name) {
            continue;
        }
        if PlaceholderKind::from_key(&name).is_some() {
            report.valid.push(name);
        } else {
            report.invalid.push(name);
        }
    }

    report
}
