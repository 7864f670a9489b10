mod amount;
mod schedule;

pub use amount::{format_brl, parse_amount, round_cents};
pub use schedule::{
    apply_payment, generate_plan, remaining_balance, set_paid_amount, AppliedPayment,
    PaymentOutcome,
};
