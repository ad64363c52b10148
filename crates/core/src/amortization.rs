//! # Amortization Calculator
//!
//! Fixed-payment repayment schedules.
//!
//! The periodic payment and the per-installment interest/principal split are
//! computed at full `Decimal` precision. Rounding to minor units happens once,
//! when the installment values are produced for persistence:
//!
//! - every installment but the last is due `round(payment)`, rounded down
//!   instead when rounding half-up would overshoot the total
//! - the last installment absorbs the residual so the schedule sums to
//!   `round(payment * term)`
//! - the last installment's principal is whatever principal is still
//!   unallocated, so the remaining balance ends at exactly zero

use crate::error::{CoreError, CoreResult};
use crate::loan::validate_rate;
use crate::money::round_minor;
use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// One scheduled payment, already rounded to minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    /// Principal still outstanding after this installment
    pub remaining_balance: Decimal,
}

fn monthly_rate(annual_rate_pct: Decimal) -> Decimal {
    annual_rate_pct / Decimal::ONE_HUNDRED / Decimal::from(12)
}

/// Unrounded fixed monthly payment.
///
/// `principal * r(1+r)^n / ((1+r)^n - 1)` with `r` the monthly rate, or an
/// even split when the rate is zero.
pub fn monthly_payment(
    principal: Decimal,
    annual_rate_pct: Decimal,
    term_months: u32,
) -> CoreResult<Decimal> {
    if principal <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "principal must be positive: {}",
            principal
        )));
    }
    if term_months == 0 {
        return Err(CoreError::InvalidTerm("term must be at least one month".into()));
    }
    validate_rate(annual_rate_pct)?;

    let term = Decimal::from(term_months);
    if annual_rate_pct.is_zero() {
        return Ok(principal / term);
    }

    let rate = monthly_rate(annual_rate_pct);
    let growth = (Decimal::ONE + rate)
        .checked_powu(term_months as u64)
        .ok_or_else(|| CoreError::InvalidTerm(format!("term too long: {}", term_months)))?;

    let numerator = principal
        .checked_mul(rate * growth)
        .ok_or_else(|| CoreError::InvalidAmount(format!("principal too large: {}", principal)))?;
    Ok(numerator / (growth - Decimal::ONE))
}

/// Build the full repayment schedule.
///
/// Due dates are `start_date + i months` for `i = 1..=term_months`; chrono
/// clamps month ends (Jan 31 + 1 month = Feb 28/29).
pub fn schedule(
    principal: Decimal,
    annual_rate_pct: Decimal,
    term_months: u32,
    start_date: NaiveDate,
    decimals: u8,
) -> CoreResult<Vec<Installment>> {
    let principal = round_minor(principal, decimals);
    let payment = monthly_payment(principal, annual_rate_pct, term_months)?;
    let rate = monthly_rate(annual_rate_pct);

    let total = round_minor(payment * Decimal::from(term_months), decimals);
    let leading_months = Decimal::from(term_months - 1);
    // Half-up can overshoot the total on long terms; rounding down keeps the
    // last installment's remainder positive.
    let mut regular = round_minor(payment, decimals);
    if regular * leading_months > total {
        regular = payment.round_dp_with_strategy(decimals as u32, RoundingStrategy::ToZero);
    }
    if regular.is_zero() {
        return Err(CoreError::InvalidAmount(format!(
            "principal {} is too small to spread over {} months",
            principal, term_months
        )));
    }
    let leading = regular * leading_months;

    let mut installments = Vec::with_capacity(term_months as usize);
    let mut remaining = principal;
    let mut allocated = Decimal::ZERO;

    for number in 1..=term_months {
        let interest_exact = remaining * rate;
        let principal_exact = (payment - interest_exact).max(Decimal::ZERO).min(payment);
        remaining -= principal_exact;

        let (amount_due, principal_part, interest_part) = if number < term_months {
            let principal_part = round_minor(principal_exact, decimals).min(regular);
            (regular, principal_part, regular - principal_part)
        } else {
            let principal_part = principal - allocated;
            let amount_due = total - leading;
            let interest_part = amount_due - principal_part;
            if interest_part < Decimal::ZERO {
                (principal_part, principal_part, Decimal::ZERO)
            } else {
                (amount_due, principal_part, interest_part)
            }
        };
        allocated += principal_part;

        let due_date = start_date
            .checked_add_months(Months::new(number))
            .ok_or_else(|| {
                CoreError::InvalidDate(format!("{} + {} months", start_date, number))
            })?;

        installments.push(Installment {
            number,
            due_date,
            amount_due,
            principal: principal_part,
            interest: interest_part,
            remaining_balance: principal - allocated,
        });
    }

    Ok(installments)
}

/// Sum of `amount_due` over a schedule.
pub fn total_due(installments: &[Installment]) -> Decimal {
    installments.iter().map(|i| i.amount_due).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_standard_payment_10000_12pct_12m() {
        let payment = monthly_payment(dec!(10000), dec!(12), 12).unwrap();
        assert_eq!(round_minor(payment, 2), dec!(888.49));
    }

    #[test]
    fn test_schedule_sums_to_total_repayment() {
        let start = date(2026, 1, 15);
        let rows = schedule(dec!(10000), dec!(12), 12, start, 2).unwrap();
        assert_eq!(rows.len(), 12);

        let exact_total = monthly_payment(dec!(10000), dec!(12), 12).unwrap() * dec!(12);
        let sum = total_due(&rows);
        assert!((sum - exact_total).abs() <= dec!(0.01), "sum {} vs {}", sum, exact_total);
        assert_eq!(sum, dec!(10661.85));

        let principal_sum: Decimal = rows.iter().map(|r| r.principal).sum();
        assert_eq!(principal_sum, dec!(10000));
        assert_eq!(rows.last().unwrap().remaining_balance, dec!(0));

        // first month: 1% of 10000 is interest
        assert_eq!(rows[0].interest, dec!(100.00));
        assert_eq!(rows[0].principal, dec!(788.49));

        // last installment absorbs the residual cents
        assert_eq!(rows[11].amount_due, dec!(888.46));
        for row in &rows {
            assert_eq!(row.amount_due, row.principal + row.interest);
            assert!(row.interest >= dec!(0));
        }
    }

    #[test]
    fn test_interest_share_declines() {
        let rows = schedule(dec!(5000), dec!(8), 6, date(2026, 3, 1), 2).unwrap();
        for pair in rows.windows(2) {
            assert!(pair[0].interest >= pair[1].interest);
            assert!(pair[0].remaining_balance > pair[1].remaining_balance);
        }
    }

    #[test]
    fn test_zero_rate_even_split_last_absorbs() {
        let rows = schedule(dec!(100), dec!(0), 3, date(2026, 1, 1), 2).unwrap();
        let dues: Vec<Decimal> = rows.iter().map(|r| r.amount_due).collect();
        assert_eq!(dues, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
        assert!(rows.iter().all(|r| r.interest.is_zero()));
        assert_eq!(total_due(&rows), dec!(100));
    }

    #[test]
    fn test_long_term_small_payment_rounds_down() {
        // 498.60 / 360 = 1.385; half-up 1.39 * 359 would exceed the principal
        let rows = schedule(dec!(498.60), dec!(0), 360, date(2026, 1, 1), 2).unwrap();
        assert_eq!(rows.len(), 360);
        assert_eq!(rows[0].amount_due, dec!(1.38));
        assert_eq!(rows[359].amount_due, dec!(3.18));
        assert_eq!(total_due(&rows), dec!(498.60));
        assert_eq!(rows[359].remaining_balance, dec!(0));
        for row in &rows {
            assert!(row.amount_due > dec!(0));
            assert!(row.principal >= dec!(0) && row.interest >= dec!(0));
        }

        let rows = schedule(dec!(500), dec!(1), 360, date(2026, 1, 1), 2).unwrap();
        let principal_sum: Decimal = rows.iter().map(|r| r.principal).sum();
        assert_eq!(principal_sum, dec!(500));
        assert!(rows.iter().all(|r| r.amount_due > dec!(0) && r.interest >= dec!(0)));
    }

    #[test]
    fn test_due_dates_monthly_and_clamped() {
        let rows = schedule(dec!(1200), dec!(0), 3, date(2026, 1, 31), 2).unwrap();
        assert_eq!(rows[0].due_date, date(2026, 2, 28));
        assert_eq!(rows[1].due_date, date(2026, 3, 31));
        assert_eq!(rows[2].due_date, date(2026, 4, 30));
    }

    #[test]
    fn test_single_month_term() {
        let rows = schedule(dec!(1000), dec!(12), 1, date(2026, 1, 1), 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount_due, dec!(1010.00));
        assert_eq!(rows[0].principal, dec!(1000));
        assert_eq!(rows[0].remaining_balance, dec!(0));
    }

    #[test]
    fn test_invalid_inputs() {
        let start = date(2026, 1, 1);
        assert!(schedule(dec!(0), dec!(5), 12, start, 2).is_err());
        assert!(schedule(dec!(100), dec!(5), 0, start, 2).is_err());
        assert!(schedule(dec!(100), dec!(-1), 12, start, 2).is_err());
        assert!(schedule(dec!(0.05), dec!(0), 10, start, 2).is_err());
    }
}
