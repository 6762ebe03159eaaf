//! The document store holding loan records.
//!
//! [`LoanStore`] is the contract the tracker needs from a backend. [`MemoryStore`]
//! keeps everything in process and is what the demo binary and the tests run against.

use crate::error::StoreError;
use crate::loan::{Loan, LoanStatus, NewLoan};
use crate::notify::{Listeners, Subscription};
use async_trait::async_trait;
use log::{info, trace};
use tokio::sync::RwLock;
use uuid::Uuid;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Incremental change pushed to subscribers, keyed by loan id.
#[derive(Clone, PartialEq, Debug)]
pub enum LoanChange {
    Added(Loan),
    Modified(Loan),
    Removed(String),
}

impl LoanChange {
    pub fn id(&self) -> &str {
        match self {
            LoanChange::Added(loan) | LoanChange::Modified(loan) => &loan.id,
            LoanChange::Removed(id) => id,
        }
    }
}

pub type ChangeCallback = Box<dyn Fn(&LoanChange) + Send + Sync>;

#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Stores a new loan and returns it with its assigned id.
    async fn create(&self, loan: NewLoan) -> StoreResult<Loan>;

    /// Replaces an existing record.
    async fn update(&self, loan: &Loan) -> StoreResult<()>;

    /// Writes only the status field of a record.
    async fn set_status(&self, id: &str, status: LoanStatus) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn get(&self, id: &str) -> StoreResult<Option<Loan>>;

    async fn list(&self) -> StoreResult<Vec<Loan>>;

    /// Registers a callback for every subsequent change.
    fn subscribe(&self, on_change: ChangeCallback) -> Subscription;
}

/// In-process store. Failures can be switched on to exercise error paths.
#[derive(Default)]
pub struct MemoryStore {
    loans: RwLock<Vec<Loan>>,
    listeners: Listeners<LoanChange>,
    fail_writes: RwLock<bool>,
    fail_reads: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with records, ids included.
    pub fn with_loans(loans: Vec<Loan>) -> Self {
        Self {
            loans: RwLock::new(loans),
            ..Self::default()
        }
    }

    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    pub async fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.write().await = fail;
    }

    async fn check_writes(&self) -> StoreResult<()> {
        if *self.fail_writes.read().await {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }

    async fn check_reads(&self) -> StoreResult<()> {
        if *self.fail_reads.read().await {
            return Err(StoreError::Unavailable("reads are disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn create(&self, loan: NewLoan) -> StoreResult<Loan> {
        self.check_writes().await?;
        let loan = Loan::from_new(Uuid::new_v4().to_string(), loan);
        self.loans.write().await.push(loan.clone());

        info!("created loan {} '{}'", loan.id, loan.name);
        self.listeners.notify(&LoanChange::Added(loan.clone()));
        Ok(loan)
    }

    async fn update(&self, loan: &Loan) -> StoreResult<()> {
        self.check_writes().await?;
        {
            let mut loans = self.loans.write().await;
            let stored = loans
                .iter_mut()
                .find(|stored| stored.id == loan.id)
                .ok_or_else(|| StoreError::NotFound(loan.id.clone()))?;
            *stored = loan.clone();
        }

        trace!("updated loan {}", loan.id);
        self.listeners.notify(&LoanChange::Modified(loan.clone()));
        Ok(())
    }

    async fn set_status(&self, id: &str, status: LoanStatus) -> StoreResult<()> {
        self.check_writes().await?;
        let updated = {
            let mut loans = self.loans.write().await;
            let stored = loans
                .iter_mut()
                .find(|stored| stored.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            stored.status = Some(status);
            stored.clone()
        };

        trace!("loan {} status set to {}", id, status);
        self.listeners.notify(&LoanChange::Modified(updated));
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.check_writes().await?;
        let removed = {
            let mut loans = self.loans.write().await;
            let before = loans.len();
            loans.retain(|stored| stored.id != id);
            loans.len() != before
        };

        if removed {
            info!("deleted loan {}", id);
            self.listeners.notify(&LoanChange::Removed(id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Loan>> {
        self.check_reads().await?;
        Ok(self
            .loans
            .read()
            .await
            .iter()
            .find(|stored| stored.id == id)
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Loan>> {
        self.check_reads().await?;
        Ok(self.loans.read().await.clone())
    }

    fn subscribe(&self, on_change: ChangeCallback) -> Subscription {
        self.listeners.register(move |change| on_change(change))
    }
}

#[cfg(test)]
mod tests {
    use super::{LoanChange, LoanStore, MemoryStore};
    use crate::error::StoreError;
    use crate::loan::{LoanStatus, NewLoan};
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use test_log::test;

    fn new_loan(name: &str) -> NewLoan {
        NewLoan::new(
            name,
            120000.,
            10000.,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            12,
            10.5,
        )
    }

    #[test(tokio::test)]
    async fn test_crud() {
        let store = MemoryStore::new();
        let car = store.create(new_loan("car")).await.unwrap();
        let bike = store.create(new_loan("bike")).await.unwrap();
        assert_ne!(car.id, bike.id);

        let mut renamed = car.clone();
        renamed.name = "family car".to_string();
        store.update(&renamed).await.unwrap();
        assert_eq!(store.get(&car.id).await.unwrap(), Some(renamed));

        store.set_status(&bike.id, LoanStatus::Completed).await.unwrap();
        let bike = store.get(&bike.id).await.unwrap().unwrap();
        assert_eq!(bike.status, Some(LoanStatus::Completed));

        store.delete(&car.id).await.unwrap();
        assert_eq!(store.get(&car.id).await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec![bike]);
    }

    #[test(tokio::test)]
    async fn test_update_missing() {
        let store = MemoryStore::new();
        let mut loan = store.create(new_loan("car")).await.unwrap();
        store.delete(&loan.id).await.unwrap();
        loan.name = "gone".to_string();

        assert_eq!(
            store.update(&loan).await,
            Err(StoreError::NotFound(loan.id.clone()))
        );
        assert_eq!(
            store.set_status(&loan.id, LoanStatus::Active).await,
            Err(StoreError::NotFound(loan.id.clone()))
        );
    }

    #[test(tokio::test)]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.set_fail_writes(true).await;
        assert!(matches!(
            store.create(new_loan("car")).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_fail_writes(false).await;
        store.create(new_loan("car")).await.unwrap();
        store.set_fail_reads(true).await;
        assert!(matches!(store.list().await, Err(StoreError::Unavailable(_))));
    }

    #[test(tokio::test)]
    async fn test_subscribe() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscription = {
            let seen = seen.clone();
            store.subscribe(Box::new(move |change: &LoanChange| {
                seen.lock().unwrap().push(change.clone());
            }))
        };

        let loan = store.create(new_loan("car")).await.unwrap();
        store.set_status(&loan.id, LoanStatus::Completed).await.unwrap();
        store.delete(&loan.id).await.unwrap();
        subscription.unsubscribe();
        store.create(new_loan("bike")).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], LoanChange::Added(loan.clone()));
        assert!(matches!(&seen[1], LoanChange::Modified(l) if l.status == Some(LoanStatus::Completed)));
        assert_eq!(seen[2], LoanChange::Removed(loan.id.clone()));
    }
}
