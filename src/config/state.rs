use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payment::{remaining_balance, AppliedPayment};

/// Everything the application persists besides config and clients.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct State {
    #[serde(default)]
    pub counter: Counter,
    #[serde(default)]
    pub plans: Vec<PaymentPlan>,
    #[serde(default)]
    pub history: Vec<PaymentHistoryEntry>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub activity: Vec<ActivityLogEntry>,
}

/// Last identifier handed out per entity.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Counter {
    #[serde(default)]
    pub plan: u32,
    #[serde(default)]
    pub installment: u32,
    #[serde(default)]
    pub payment: u32,
    #[serde(default)]
    pub template: u32,
    #[serde(default)]
    pub file: u32,
    #[serde(default)]
    pub appointment: u32,
}

impl Counter {
    fn bump(slot: &mut u32) -> u32 {
        *slot += 1;
        *slot
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaymentPlan {
    pub id: u32,
    pub client_id: String,
    pub contract_date: NaiveDate,
    pub total_value: Decimal,
    pub installments_count: u32,
    #[serde(default)]
    pub installments: Vec<Installment>,
}

impl PaymentPlan {
    pub fn paid_amount(&self) -> Decimal {
        self.installments.iter().map(|i| i.paid_amount).sum()
    }

    pub fn outstanding(&self) -> Decimal {
        remaining_balance(&self.installments)
    }

    pub fn status(&self) -> PlanStatus {
        if self.installments.iter().all(|i| i.settled) {
            PlanStatus::Settled
        } else if self.paid_amount() > Decimal::ZERO {
            PlanStatus::Partial
        } else {
            PlanStatus::Pending
        }
    }

    pub fn installment_mut(&mut self, number: u32) -> Option<&mut Installment> {
        self.installments
            .iter_mut()
            .find(|i| i.installment_number == number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Pending,
    Partial,
    Settled,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "PENDING"),
            PlanStatus::Partial => write!(f, "PARTIAL"),
            PlanStatus::Settled => write!(f, "SETTLED"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Installment {
    pub id: u32,
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub installment_value: Decimal,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub settled: bool,
}

impl Installment {
    pub fn unpaid(&self) -> Decimal {
        self.installment_value - self.paid_amount
    }
}

/// Append-only audit trail of amounts applied to installments.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaymentHistoryEntry {
    pub id: u32,
    pub plan_id: u32,
    pub installment_id: u32,
    pub installment_number: u32,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub difference: Decimal,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Template {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    /// Registered placeholders found in the content at upload time
    #[serde(default)]
    pub fields: Vec<String>,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FileRecord {
    pub id: u32,
    pub client_id: String,
    pub file_name: String,
    /// Path inside object storage, e.g. "client-maria/contrato_maria_silva_1700000000.html"
    pub file_path: String,
    pub file_type: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Appointment {
    pub id: u32,
    pub client_id: String,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ActivityLogEntry {
    pub action_type: String,
    #[serde(default)]
    pub details: String,
    pub at: DateTime<Local>,
}

impl State {
    /// Store a freshly generated plan, assigning plan and installment ids.
    pub fn add_plan(
        &mut self,
        client_id: &str,
        contract_date: NaiveDate,
        total_value: Decimal,
        mut installments: Vec<Installment>,
    ) -> &PaymentPlan {
        let id = Counter::bump(&mut self.counter.plan);
        for inst in &mut installments {
            inst.id = Counter::bump(&mut self.counter.installment);
        }
        self.plans.push(PaymentPlan {
            id,
            client_id: client_id.to_string(),
            contract_date,
            total_value,
            installments_count: installments.len() as u32,
            installments,
        });
        &self.plans[self.plans.len() - 1]
    }

    pub fn plan(&self, id: u32) -> Option<&PaymentPlan> {
        self.plans.iter().find(|p| p.id == id)
    }

    pub fn plan_mut(&mut self, id: u32) -> Option<&mut PaymentPlan> {
        self.plans.iter_mut().find(|p| p.id == id)
    }

    pub fn plans_for(&self, client_id: &str) -> Vec<&PaymentPlan> {
        self.plans
            .iter()
            .filter(|p| p.client_id == client_id)
            .collect()
    }

    pub fn record_payments(&mut self, plan_id: u32, applied: Vec<AppliedPayment>) {
        for a in applied {
            let id = Counter::bump(&mut self.counter.payment);
            self.history.push(PaymentHistoryEntry {
                id,
                plan_id,
                installment_id: a.installment_id,
                installment_number: a.installment_number,
                payment_date: a.payment_date,
                amount: a.amount,
                difference: a.difference,
            });
        }
    }

    /// History of a plan, newest first.
    pub fn history_for(&self, plan_id: u32) -> Vec<&PaymentHistoryEntry> {
        let mut entries: Vec<_> = self
            .history
            .iter()
            .filter(|h| h.plan_id == plan_id)
            .collect();
        entries.sort_by(|a, b| b.payment_date.cmp(&a.payment_date).then(b.id.cmp(&a.id)));
        entries
    }

    pub fn add_template(&mut self, name: &str, description: &str, content: String, fields: Vec<String>) -> u32 {
        let id = Counter::bump(&mut self.counter.template);
        self.templates.push(Template {
            id,
            name: name.to_string(),
            description: description.to_string(),
            content,
            fields,
            created_at: Local::now(),
        });
        id
    }

    pub fn template(&self, id: u32) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn remove_template(&mut self, id: u32) -> Option<Template> {
        let idx = self.templates.iter().position(|t| t.id == id)?;
        Some(self.templates.remove(idx))
    }

    pub fn add_file(&mut self, mut record: FileRecord) -> u32 {
        record.id = Counter::bump(&mut self.counter.file);
        let id = record.id;
        self.files.push(record);
        id
    }

    pub fn file(&self, id: u32) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn remove_file(&mut self, id: u32) -> Option<FileRecord> {
        let idx = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(idx))
    }

    pub fn add_appointment(&mut self, client_id: &str, date: NaiveDateTime, description: &str) -> u32 {
        let id = Counter::bump(&mut self.counter.appointment);
        self.appointments.push(Appointment {
            id,
            client_id: client_id.to_string(),
            date,
            description: description.to_string(),
        });
        id
    }

    pub fn remove_appointment(&mut self, id: u32) -> Option<Appointment> {
        let idx = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(idx))
    }

    pub fn log_activity(&mut self, action_type: &str, details: impl Into<String>) {
        self.activity.push(ActivityLogEntry {
            action_type: action_type.to_string(),
            details: details.into(),
            at: Local::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::generate_plan;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_plan_assigns_sequential_ids() {
        let mut state = State::default();
        let first = generate_plan(Decimal::new(300, 0), 3, date(2026, 1, 10)).unwrap();
        let second = generate_plan(Decimal::new(100, 0), 2, date(2026, 1, 10)).unwrap();

        state.add_plan("maria", date(2026, 1, 1), Decimal::new(300, 0), first);
        let plan = state.add_plan("maria", date(2026, 1, 1), Decimal::new(100, 0), second);

        assert_eq!(plan.id, 2);
        let ids: Vec<u32> = plan.installments.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![4, 5]);
        assert_eq!(state.plans_for("maria").len(), 2);
    }

    #[test]
    fn plan_status_follows_payments() {
        let mut state = State::default();
        let insts = generate_plan(Decimal::new(200, 0), 2, date(2026, 1, 10)).unwrap();
        state.add_plan("joao", date(2026, 1, 1), Decimal::new(200, 0), insts);
        let plan = state.plan_mut(1).unwrap();
        assert_eq!(plan.status(), PlanStatus::Pending);

        let first = plan.installment_mut(1).unwrap();
        first.paid_amount = Decimal::new(50, 0);
        assert_eq!(plan.status(), PlanStatus::Partial);

        for inst in &mut plan.installments {
            inst.paid_amount = inst.installment_value;
            inst.settled = true;
        }
        assert_eq!(plan.status(), PlanStatus::Settled);
        assert_eq!(plan.outstanding(), Decimal::ZERO);
    }

    #[test]
    fn state_round_trips_through_toml() {
        let mut state = State::default();
        let insts = generate_plan(Decimal::new(120000, 2), 3, date(2026, 1, 31)).unwrap();
        state.add_plan("maria", date(2026, 1, 2), Decimal::new(120000, 2), insts);
        state.log_activity("login", "");

        let text = toml::to_string_pretty(&state).unwrap();
        let back: State = toml::from_str(&text).unwrap();
        assert_eq!(back.plans[0].installments, state.plans[0].installments);
        assert_eq!(back.counter.installment, 3);
        assert_eq!(back.activity.len(), 1);
    }
}
