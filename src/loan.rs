use chrono::NaiveDate;
use log::warn;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LoanStatus {
    #[default]
    Active,
    Completed,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Active => write!(f, "active"),
            LoanStatus::Completed => write!(f, "completed"),
        }
    }
}

/// How the number of paid installments is determined.
///
/// A loan starts out `DateDriven`. The first explicit payment switches it to `Manual`
/// for good; from then on only the counter moves it forward.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "mode", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum Tracking {
    #[default]
    DateDriven,
    Manual {
        paid: u32,
        last_payment: Option<NaiveDate>,
    },
}

impl Tracking {
    pub fn last_payment(&self) -> Option<NaiveDate> {
        match self {
            Tracking::DateDriven => None,
            Tracking::Manual { last_payment, .. } => *last_payment,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, Tracking::Manual { .. })
    }
}

/// Fields supplied by the user when a loan is first recorded.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NewLoan {
    pub name: String,
    pub total_amount: f64,
    pub installment_amount: f64,
    pub start_date: String,
    pub tenure: u32,
    pub interest_rate: f64,
}

impl NewLoan {
    pub fn new(
        name: impl Into<String>,
        total_amount: f64,
        installment_amount: f64,
        start_date: NaiveDate,
        tenure: u32,
        interest_rate: f64,
    ) -> Self {
        Self {
            name: name.into(),
            total_amount,
            installment_amount,
            start_date: start_date.format("%Y-%m-%d").to_string(),
            tenure,
            interest_rate,
        }
    }

    /// Replaces unusable numbers with zero and a missing start date with `today`.
    pub fn sanitized(mut self, today: NaiveDate) -> Self {
        self.total_amount = non_negative("total amount", &self.name, self.total_amount);
        self.installment_amount =
            non_negative("installment amount", &self.name, self.installment_amount);
        self.interest_rate = non_negative("interest rate", &self.name, self.interest_rate);
        if self.start_date.trim().is_empty() {
            warn!("loan '{}' has no start date, using {}", self.name, today);
            self.start_date = today.format("%Y-%m-%d").to_string();
        }
        self
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Loan {
    pub id: String,
    pub name: String,
    pub total_amount: f64,
    pub installment_amount: f64,
    pub start_date: String,
    pub tenure: u32,
    pub interest_rate: f64,
    pub status: Option<LoanStatus>,
    pub tracking: Tracking,
}

impl Loan {
    /// Builds the stored record for a freshly created loan.
    pub fn from_new(id: impl Into<String>, new: NewLoan) -> Self {
        Self {
            id: id.into(),
            name: new.name,
            total_amount: new.total_amount,
            installment_amount: new.installment_amount,
            start_date: new.start_date,
            tenure: new.tenure,
            interest_rate: new.interest_rate,
            status: None,
            tracking: Tracking::DateDriven,
        }
    }

    /// Installment amount as used in totals, zero when the stored value is unusable.
    pub fn installment(&self) -> f64 {
        non_negative("installment amount", &self.id, self.installment_amount)
    }
}

/// Point-in-time payment status of a loan. Recomputed on every read.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct LoanView {
    pub loan: Loan,
    pub next_payment_date: NaiveDate,
    /// Contractual due date of the final installment.
    pub final_payment_date: NaiveDate,
    /// Most recent manual payment when there is one, otherwise the final due date.
    pub last_payment_date: NaiveDate,
    pub remaining: u32,
    pub current: u32,
    pub status: LoanStatus,
    pub total_paid: f64,
}

impl LoanView {
    pub fn id(&self) -> &str {
        &self.loan.id
    }

    pub fn installment(&self) -> f64 {
        self.loan.installment()
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn progress_percent(&self) -> u32 {
        if self.loan.tenure == 0 {
            0
        } else {
            (self.current as f64 / self.loan.tenure as f64 * 100.).round() as u32
        }
    }
}

impl fmt::Display for LoanView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: installment {}/{} ({}), next due {}, final due {}, paid ${:.2}, {} remaining",
            self.loan.name,
            self.current,
            self.loan.tenure,
            self.status,
            self.next_payment_date,
            self.final_payment_date,
            self.total_paid,
            self.remaining
        )
    }
}

pub(crate) fn non_negative(field: &str, owner: &str, value: f64) -> f64 {
    if value.is_finite() && value >= 0. {
        value
    } else {
        warn!("{} of loan '{}' is {}, using 0", field, owner, value);
        0.
    }
}

#[cfg(test)]
mod tests {
    use super::{Loan, LoanStatus, LoanView, NewLoan, Tracking};
    use chrono::NaiveDate;
    use test_log::test;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_loan_sanitized() {
        let today = date(2024, 3, 10);
        let mut new = NewLoan::new("car", f64::NAN, -10., today, 12, 9.5);
        new.start_date = "  ".to_string();
        let new = new.sanitized(today);

        assert_eq!(new.total_amount, 0.);
        assert_eq!(new.installment_amount, 0.);
        assert_eq!(new.interest_rate, 9.5);
        assert_eq!(new.start_date, "2024-03-10");
    }

    #[test]
    fn test_from_new_is_date_driven() {
        let loan = Loan::from_new(
            "abc",
            NewLoan::new("phone", 60000., 5000., date(2024, 1, 15), 12, 0.),
        );

        assert_eq!(loan.id, "abc");
        assert_eq!(loan.start_date, "2024-01-15");
        assert_eq!(loan.status, None);
        assert_eq!(loan.tracking, Tracking::DateDriven);
        assert_eq!(loan.tracking.last_payment(), None);
    }

    #[test]
    fn test_progress_and_display() {
        let loan = Loan::from_new(
            "abc",
            NewLoan::new("phone", 60000., 5000., date(2024, 1, 15), 12, 0.),
        );
        let view = LoanView {
            loan,
            next_payment_date: date(2024, 5, 15),
            final_payment_date: date(2024, 12, 15),
            last_payment_date: date(2024, 12, 15),
            remaining: 8,
            current: 4,
            status: LoanStatus::Active,
            total_paid: 20000.,
        };

        assert_eq!(view.progress_percent(), 33);
        assert_eq!(
            view.to_string(),
            "phone: installment 4/12 (active), next due 2024-05-15, final due 2024-12-15, paid $20000.00, 8 remaining"
        );
    }
}
