//! Installment schedule math.
//!
//! Everything here is pure: a loan's stored terms plus an evaluation date go in, a
//! [`LoanView`] (or an updated [`Loan`]) comes out. Writing results back to a store is
//! the tracker's job.

use crate::error::{EmiError, Result};
use crate::loan::{Loan, LoanStatus, LoanView, Tracking};
use chrono::{DateTime, Datelike, Months, NaiveDate};
use log::{error, info, trace, warn};

/// Rule deciding when a date-driven installment counts as elapsed.
///
/// Installment `k` (zero based) falls due on `start_date + k months`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ElapsedRule {
    /// The first installment is due on the start date itself and each installment
    /// counts from the first moment of its due day.
    #[default]
    CalendarDay,
    /// Like `CalendarDay`, but an installment only counts once its due day is over.
    WholeDay,
    /// The start date is the disbursement date; the first installment falls due one
    /// month later.
    FirstDueNextMonth,
}

/// Parses a stored start date, either `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EmiError::Validation("start date is missing".to_string()));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive()))
        .map_err(|_| EmiError::Validation(format!("'{}' is not a valid date", text)))
}

/// Calendar month addition; a day missing from the target month clamps to its last day.
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months)).ok_or_else(|| {
        EmiError::Validation(format!("{} plus {} months is out of range", date, months))
    })
}

pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

// signed number of month boundaries between the two dates
fn month_span(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + to.month() as i64 - from.month() as i64
}

/// Number of installments that have fallen due between `start` and `as_of`.
pub fn elapsed_installments(
    start: NaiveDate,
    as_of: NaiveDate,
    rule: ElapsedRule,
) -> Result<u32> {
    let (first, inclusive) = match rule {
        ElapsedRule::CalendarDay => (0, true),
        ElapsedRule::WholeDay => (0, false),
        ElapsedRule::FirstDueNextMonth => (1, true),
    };

    let span = month_span(start, as_of);
    if span < 0 {
        return Ok(0);
    }

    // the installment falling in as_of's month may not be reached yet; the one
    // before it always is
    let mut last = span;
    let due = add_months(start, span as u32)?;
    let reached = if inclusive { due <= as_of } else { due < as_of };
    if !reached {
        last -= 1;
    }

    if last < first {
        Ok(0)
    } else {
        Ok((last - first + 1) as u32)
    }
}

fn installments_paid(
    loan: &Loan,
    start: NaiveDate,
    as_of: NaiveDate,
    rule: ElapsedRule,
) -> Result<u32> {
    let count = match loan.tracking {
        Tracking::Manual { paid, .. } => paid,
        Tracking::DateDriven => elapsed_installments(start, as_of, rule)?,
    };
    Ok(count.min(loan.tenure))
}

/// Derives the payment status of `loan` as of the given date.
pub fn evaluate(loan: &Loan, as_of: NaiveDate, rule: ElapsedRule) -> Result<LoanView> {
    let start = parse_date(&loan.start_date)?;
    let tenure = loan.tenure;

    let current = installments_paid(loan, start, as_of, rule)?;
    let next_payment_date = add_months(start, current)?;
    let final_payment_date = add_months(start, tenure.saturating_sub(1))?;
    let status = if current >= tenure {
        LoanStatus::Completed
    } else {
        LoanStatus::Active
    };

    trace!(
        "loan {} as of {}: installment {}/{}, next due {}",
        loan.id,
        as_of,
        current,
        tenure,
        next_payment_date
    );

    Ok(LoanView {
        loan: loan.clone(),
        next_payment_date,
        final_payment_date,
        last_payment_date: loan.tracking.last_payment().unwrap_or(final_payment_date),
        remaining: tenure.saturating_sub(current),
        current,
        status,
        total_paid: current as f64 * loan.installment(),
    })
}

/// Like [`evaluate`], but never fails: a loan whose terms cannot be evaluated gets a
/// zeroed, active view anchored on `as_of`.
pub fn snapshot(loan: &Loan, as_of: NaiveDate, rule: ElapsedRule) -> LoanView {
    match evaluate(loan, as_of, rule) {
        Ok(view) => view,
        Err(e) => {
            error!("cannot compute status of loan {}: {}", loan.id, e);
            default_view(loan, as_of)
        }
    }
}

/// The view shown for a loan whose terms cannot be evaluated.
pub fn default_view(loan: &Loan, as_of: NaiveDate) -> LoanView {
    LoanView {
        loan: loan.clone(),
        next_payment_date: as_of,
        final_payment_date: as_of,
        last_payment_date: loan.tracking.last_payment().unwrap_or(as_of),
        remaining: loan.tenure,
        current: 0,
        status: LoanStatus::Active,
        total_paid: 0.,
    }
}

pub fn has_started(loan: &Loan, as_of: NaiveDate) -> bool {
    match parse_date(&loan.start_date) {
        Ok(start) => start <= as_of,
        Err(e) => {
            warn!("loan {}: {}", loan.id, e);
            false
        }
    }
}

/// True when a manual payment was recorded in the month of `as_of`.
pub fn is_paid_for_month(loan: &Loan, as_of: NaiveDate) -> bool {
    loan.tracking
        .last_payment()
        .is_some_and(|paid_on| same_month(paid_on, as_of))
}

/// True when the loan's next installment falls on `as_of` and nothing was paid this month.
///
/// Under [`ElapsedRule::CalendarDay`] a date-driven loan already counts the installment on
/// its due day, so its next date has moved on; only manually tracked loans (or the
/// [`ElapsedRule::WholeDay`] rule) report an installment due today.
pub fn is_due_today(loan: &Loan, as_of: NaiveDate, rule: ElapsedRule) -> bool {
    if !has_started(loan, as_of) || is_paid_for_month(loan, as_of) {
        return false;
    }
    match evaluate(loan, as_of, rule) {
        Ok(view) => view.next_payment_date == as_of,
        Err(e) => {
            warn!("loan {}: {}", loan.id, e);
            false
        }
    }
}

/// Records one installment as paid on `as_of` and returns the updated loan.
///
/// The loan moves to manual tracking; a date-driven loan's counter starts from the
/// installments already elapsed.
pub fn pay_installment(loan: &Loan, as_of: NaiveDate, rule: ElapsedRule) -> Result<Loan> {
    let start = parse_date(&loan.start_date)?;
    if start > as_of {
        return Err(EmiError::NotStarted(start));
    }

    if is_paid_for_month(loan, as_of) {
        return Err(EmiError::AlreadyPaid(as_of.format("%B %Y").to_string()));
    }

    let view = evaluate(loan, as_of, rule)?;
    if !same_month(view.next_payment_date, as_of) {
        return Err(EmiError::NotDue(view.next_payment_date));
    }

    if view.current >= loan.tenure {
        return Err(EmiError::Overpaid(loan.tenure));
    }

    let paid = view.current + 1;
    let mut updated = loan.clone();
    updated.tracking = Tracking::Manual {
        paid,
        last_payment: Some(as_of),
    };
    if paid >= loan.tenure {
        updated.status = Some(LoanStatus::Completed);
    }

    info!(
        "loan {}: installment {}/{} paid on {}",
        loan.id, paid, loan.tenure, as_of
    );
    Ok(updated)
}
