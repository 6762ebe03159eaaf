//! Dashboard aggregates over evaluated loans.

use crate::loan::{LoanStatus, LoanView};
use crate::schedule::same_month;
use chrono::{Datelike, NaiveDate};

pub fn with_status(views: &[LoanView], status: LoanStatus) -> Vec<LoanView> {
    views
        .iter()
        .filter(|view| view.status == status)
        .cloned()
        .collect()
}

pub fn count_with_status(views: &[LoanView], status: LoanStatus) -> usize {
    views.iter().filter(|view| view.status == status).count()
}

/// Active loans with an installment still to come in `as_of`'s month, earliest first.
pub fn upcoming(views: &[LoanView], as_of: NaiveDate) -> Vec<LoanView> {
    let mut upcoming: Vec<LoanView> = views
        .iter()
        .filter(|view| {
            view.is_active()
                && same_month(view.next_payment_date, as_of)
                && view.next_payment_date >= as_of
        })
        .cloned()
        .collect();
    upcoming.sort_by_key(|view| view.next_payment_date);
    upcoming
}

/// Sum of the installments of all active loans.
pub fn total_monthly(views: &[LoanView]) -> f64 {
    views
        .iter()
        .filter(|view| view.is_active())
        .map(LoanView::installment)
        .sum()
}

/// Sum of installment times tenure over every loan.
pub fn total_contracted(views: &[LoanView]) -> f64 {
    views
        .iter()
        .map(|view| view.installment() * view.loan.tenure as f64)
        .sum()
}

pub fn total_paid(views: &[LoanView]) -> f64 {
    views.iter().map(|view| view.total_paid).sum()
}

// active loans count through their next due date, completed ones through their
// last payment
fn falls_in_month(view: &LoanView, as_of: NaiveDate) -> bool {
    match view.status {
        LoanStatus::Active => same_month(view.next_payment_date, as_of),
        LoanStatus::Completed => same_month(view.last_payment_date, as_of),
    }
}

pub fn current_month_due(views: &[LoanView], as_of: NaiveDate) -> f64 {
    views
        .iter()
        .filter(|view| falls_in_month(view, as_of))
        .map(LoanView::installment)
        .sum()
}

pub fn current_month_paid(views: &[LoanView], as_of: NaiveDate) -> f64 {
    views
        .iter()
        .filter(|view| {
            falls_in_month(view, as_of)
                && (view.status == LoanStatus::Completed
                    || as_of.day() >= view.next_payment_date.day())
        })
        .map(LoanView::installment)
        .sum()
}

/// This month's installments split into paid and outstanding.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct MonthlyOverview {
    pub total: f64,
    pub paid: f64,
    pub due: f64,
    /// Paid share of the total in percent, within `0..=100`.
    pub progress: f64,
}

impl MonthlyOverview {
    pub fn new(views: &[LoanView], as_of: NaiveDate) -> Self {
        let total = current_month_due(views, as_of);
        let paid = current_month_paid(views, as_of);
        let progress = if total == 0. {
            0.
        } else {
            (paid / total * 100.).clamp(0., 100.)
        };
        Self {
            total,
            paid,
            due: total - paid,
            progress,
        }
    }
}

/// Everything the overview screen shows, computed in one pass.
#[derive(Clone, PartialEq, Debug)]
pub struct Dashboard {
    pub active_count: usize,
    pub completed_count: usize,
    pub upcoming: Vec<LoanView>,
    pub total_monthly: f64,
    pub total_contracted: f64,
    pub total_paid: f64,
    pub month: MonthlyOverview,
}

impl Dashboard {
    pub fn new(views: &[LoanView], as_of: NaiveDate) -> Self {
        Self {
            active_count: count_with_status(views, LoanStatus::Active),
            completed_count: count_with_status(views, LoanStatus::Completed),
            upcoming: upcoming(views, as_of),
            total_monthly: total_monthly(views),
            total_contracted: total_contracted(views),
            total_paid: total_paid(views),
            month: MonthlyOverview::new(views, as_of),
        }
    }
}
