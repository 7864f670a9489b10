use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use super::amount::round_cents;
use crate::config::Installment;
use crate::error::{LawdeskError, Result};

/// An amount applied to a single installment by one payment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPayment {
    pub installment_id: u32,
    pub installment_number: u32,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub difference: Decimal,
}

/// Result of applying a payment to a plan's installments
#[derive(Debug)]
pub struct PaymentOutcome {
    pub installments: Vec<Installment>,
    pub applied: Vec<AppliedPayment>,
}

/// Due date of the installment `index` months after the first one.
///
/// Computed from the first date every time so a clamped month end
/// (Jan 31 -> Feb 28) does not drift into later months.
fn due_date(first: NaiveDate, index: u32) -> NaiveDate {
    first
        .checked_add_months(Months::new(index))
        .unwrap_or(NaiveDate::MAX)
}

/// Build the installment schedule for a plan.
///
/// Every installment is `total / count` truncated to cents; the last one
/// absorbs the remainder so the values sum to `total` exactly and no value
/// is negative. A zero-value installment starts settled. Ids are left at
/// zero for the store to assign.
pub fn generate_plan(
    total_value: Decimal,
    installments_count: u32,
    first_due_date: NaiveDate,
) -> Result<Vec<Installment>> {
    if total_value <= Decimal::ZERO {
        return Err(LawdeskError::InvalidTotalValue);
    }
    if installments_count == 0 {
        return Err(LawdeskError::InvalidInstallmentCount);
    }

    let total_value = round_cents(total_value);
    let base = (total_value / Decimal::from(installments_count))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let head_total = base * Decimal::from(installments_count - 1);

    let installments = (0..installments_count)
        .map(|index| {
            let is_last = index + 1 == installments_count;
            let value = if is_last { total_value - head_total } else { base };
            Installment {
                id: 0,
                installment_number: index + 1,
                due_date: due_date(first_due_date, index),
                installment_value: value,
                paid_amount: Decimal::ZERO,
                settled: value.is_zero(),
            }
        })
        .collect();

    Ok(installments)
}

/// Sum of scheduled values minus sum of paid amounts, in cents.
pub fn remaining_balance(installments: &[Installment]) -> Decimal {
    let total: Decimal = installments.iter().map(|i| i.installment_value).sum();
    let paid: Decimal = installments.iter().map(|i| i.paid_amount).sum();
    round_cents(total - paid)
}

/// Apply a payment to outstanding installments in ascending order.
///
/// A payment larger than the remaining balance is rejected as a whole.
pub fn apply_payment(
    installments: &[Installment],
    amount: Decimal,
    payment_date: NaiveDate,
) -> Result<PaymentOutcome> {
    let amount = round_cents(amount);
    if amount <= Decimal::ZERO {
        return Err(LawdeskError::InvalidPaymentAmount);
    }

    let balance = remaining_balance(installments);
    if amount > balance {
        return Err(LawdeskError::OverPayment {
            plan: 0,
            max: balance,
        });
    }

    let mut updated = installments.to_vec();
    updated.sort_by_key(|i| i.installment_number);

    let mut remaining = amount;
    let mut applied = Vec::new();

    for inst in updated.iter_mut() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let unpaid = inst.unpaid();
        if unpaid <= Decimal::ZERO {
            continue;
        }

        let portion = remaining.min(unpaid);
        inst.paid_amount = round_cents(inst.paid_amount + portion);
        inst.settled = inst.paid_amount >= inst.installment_value;
        remaining = round_cents(remaining - portion);

        applied.push(AppliedPayment {
            installment_id: inst.id,
            installment_number: inst.installment_number,
            payment_date,
            amount: portion,
            difference: portion,
        });
    }

    Ok(PaymentOutcome {
        installments: updated,
        applied,
    })
}

/// Overwrite the paid amount of one installment.
///
/// The history entry records the new paid amount and the difference from
/// the previous one.
pub fn set_paid_amount(
    installment: &mut Installment,
    new_paid: Decimal,
    payment_date: NaiveDate,
) -> Result<AppliedPayment> {
    let new_paid = round_cents(new_paid);
    if new_paid < Decimal::ZERO || new_paid > installment.installment_value {
        return Err(LawdeskError::InvalidPaidAmount {
            amount: new_paid,
            max: installment.installment_value,
        });
    }

    let previous = installment.paid_amount;
    installment.paid_amount = new_paid;
    installment.settled = new_paid >= installment.installment_value;

    Ok(AppliedPayment {
        installment_id: installment.id,
        installment_number: installment.installment_number,
        payment_date,
        amount: new_paid,
        difference: new_paid - previous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn splits_evenly() {
        let plan = generate_plan(money(120000), 3, date(2026, 2, 10)).unwrap();
        assert_eq!(plan.len(), 3);
        for (idx, inst) in plan.iter().enumerate() {
            assert_eq!(inst.installment_number, idx as u32 + 1);
            assert_eq!(inst.installment_value, money(40000));
            assert_eq!(inst.paid_amount, Decimal::ZERO);
            assert!(!inst.settled);
        }
        assert_eq!(plan[2].due_date, date(2026, 4, 10));
    }

    #[test]
    fn last_installment_absorbs_remainder() {
        let plan = generate_plan(money(10000), 3, date(2026, 1, 5)).unwrap();
        let values: Vec<Decimal> = plan.iter().map(|i| i.installment_value).collect();
        assert_eq!(values, vec![money(3333), money(3333), money(3334)]);

        for count in 1..=24u32 {
            let plan = generate_plan(money(99999), count, date(2026, 1, 5)).unwrap();
            let sum: Decimal = plan.iter().map(|i| i.installment_value).sum();
            assert_eq!(sum, money(99999), "count {count}");
            let numbers: Vec<u32> = plan.iter().map(|i| i.installment_number).collect();
            assert_eq!(numbers, (1..=count).collect::<Vec<_>>());
        }
    }

    #[test]
    fn many_installments_never_go_negative() {
        for (cents, count) in [(20000, 300), (10000, 7), (99999, 120), (200, 3), (1, 3)] {
            let plan = generate_plan(money(cents), count, date(2026, 1, 5)).unwrap();
            assert!(
                plan.iter().all(|i| i.installment_value >= Decimal::ZERO),
                "{cents}/{count}"
            );
            let sum: Decimal = plan.iter().map(|i| i.installment_value).sum();
            assert_eq!(sum, money(cents));

            let out = apply_payment(&plan, remaining_balance(&plan), date(2026, 2, 1)).unwrap();
            assert_eq!(remaining_balance(&out.installments), Decimal::ZERO);
            assert!(out.installments.iter().all(|i| i.settled), "{cents}/{count}");
        }

        let plan = generate_plan(money(20000), 300, date(2026, 1, 5)).unwrap();
        assert_eq!(plan[0].installment_value, money(66));
        assert_eq!(plan[299].installment_value, money(266));
    }

    #[test]
    fn single_installment_equals_total() {
        let plan = generate_plan(money(123457), 1, date(2026, 3, 1)).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].installment_value, money(123457));
    }

    #[test]
    fn month_end_due_dates_clamp_without_drift() {
        let plan = generate_plan(money(40000), 4, date(2026, 1, 31)).unwrap();
        let dates: Vec<NaiveDate> = plan.iter().map(|i| i.due_date).collect();
        assert_eq!(
            dates,
            vec![
                date(2026, 1, 31),
                date(2026, 2, 28),
                date(2026, 3, 31),
                date(2026, 4, 30)
            ]
        );
    }

    #[test]
    fn rejects_invalid_plan_input() {
        assert!(matches!(
            generate_plan(Decimal::ZERO, 3, date(2026, 1, 1)),
            Err(LawdeskError::InvalidTotalValue)
        ));
        assert!(matches!(
            generate_plan(money(100), 0, date(2026, 1, 1)),
            Err(LawdeskError::InvalidInstallmentCount)
        ));
    }

    #[test]
    fn partial_payment_spills_into_next_installment() {
        let plan = generate_plan(money(120000), 3, date(2026, 2, 10)).unwrap();
        let out = apply_payment(&plan, money(50000), date(2026, 2, 1)).unwrap();

        assert_eq!(out.installments[0].paid_amount, money(40000));
        assert!(out.installments[0].settled);
        assert_eq!(out.installments[1].paid_amount, money(10000));
        assert!(!out.installments[1].settled);
        assert_eq!(out.installments[2].paid_amount, Decimal::ZERO);
        assert_eq!(remaining_balance(&out.installments), money(70000));

        assert_eq!(out.applied.len(), 2);
        assert_eq!(out.applied[0].amount, money(40000));
        assert_eq!(out.applied[1].amount, money(10000));
        assert_eq!(out.applied[1].difference, money(10000));
    }

    #[test]
    fn payments_go_in_installment_order_even_if_unsorted() {
        let mut plan = generate_plan(money(30000), 3, date(2026, 2, 10)).unwrap();
        plan.reverse();
        let out = apply_payment(&plan, money(10000), date(2026, 2, 1)).unwrap();
        assert_eq!(out.applied[0].installment_number, 1);
        assert!(out.installments[0].settled);
    }

    #[test]
    fn settled_installments_are_skipped() {
        let plan = generate_plan(money(30000), 3, date(2026, 2, 10)).unwrap();
        let first = apply_payment(&plan, money(15000), date(2026, 2, 1)).unwrap();
        let second = apply_payment(&first.installments, money(10000), date(2026, 3, 1)).unwrap();

        assert_eq!(second.applied[0].installment_number, 2);
        assert_eq!(second.applied[0].amount, money(5000));
        assert_eq!(second.applied[1].installment_number, 3);
        assert_eq!(second.applied[1].amount, money(5000));
    }

    #[test]
    fn balance_strictly_decreases() {
        let mut plan = generate_plan(money(100000), 7, date(2026, 2, 10)).unwrap();
        for cents in [1, 9999, 14286, 50000] {
            let before = remaining_balance(&plan);
            plan = apply_payment(&plan, money(cents), date(2026, 2, 1))
                .unwrap()
                .installments;
            assert!(remaining_balance(&plan) < before);
        }
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let plan = generate_plan(money(30000), 3, date(2026, 2, 10)).unwrap();
        assert!(matches!(
            apply_payment(&plan, Decimal::ZERO, date(2026, 2, 1)),
            Err(LawdeskError::InvalidPaymentAmount)
        ));
        assert!(matches!(
            apply_payment(&plan, money(-100), date(2026, 2, 1)),
            Err(LawdeskError::InvalidPaymentAmount)
        ));
    }

    #[test]
    fn rejects_amounts_that_round_to_zero() {
        let plan = generate_plan(money(120000), 3, date(2026, 2, 10)).unwrap();
        assert!(matches!(
            apply_payment(&plan, Decimal::new(4, 3), date(2026, 2, 1)),
            Err(LawdeskError::InvalidPaymentAmount)
        ));

        let out = apply_payment(&plan, Decimal::new(5, 3), date(2026, 2, 1)).unwrap();
        assert_eq!(out.applied[0].amount, money(1));
        assert_eq!(remaining_balance(&out.installments), money(119999));
    }

    #[test]
    fn overpayment_is_checked_after_rounding() {
        let plan = generate_plan(money(30000), 3, date(2026, 2, 10)).unwrap();
        let out = apply_payment(&plan, Decimal::new(300004, 3), date(2026, 2, 1)).unwrap();
        assert!(out.installments.iter().all(|i| i.settled));
    }

    #[test]
    fn rejects_overpayment_without_applying() {
        let plan = generate_plan(money(30000), 3, date(2026, 2, 10)).unwrap();
        match apply_payment(&plan, money(30001), date(2026, 2, 1)) {
            Err(LawdeskError::OverPayment { max, .. }) => assert_eq!(max, money(30000)),
            other => panic!("expected overpayment, got {other:?}"),
        }

        let paid = apply_payment(&plan, money(30000), date(2026, 2, 1)).unwrap();
        assert!(paid.installments.iter().all(|i| i.settled));
        assert!(apply_payment(&paid.installments, money(1), date(2026, 2, 1)).is_err());
    }

    #[test]
    fn set_paid_amount_records_difference() {
        let mut plan = generate_plan(money(30000), 3, date(2026, 2, 10)).unwrap();
        let inst = &mut plan[0];

        let first = set_paid_amount(inst, money(4000), date(2026, 2, 1)).unwrap();
        assert_eq!(first.amount, money(4000));
        assert_eq!(first.difference, money(4000));
        assert!(!inst.settled);

        let second = set_paid_amount(inst, money(10000), date(2026, 2, 2)).unwrap();
        assert_eq!(second.difference, money(6000));
        assert!(inst.settled);

        assert!(set_paid_amount(inst, money(10001), date(2026, 2, 3)).is_err());
        assert!(set_paid_amount(inst, money(-1), date(2026, 2, 3)).is_err());
    }
}
