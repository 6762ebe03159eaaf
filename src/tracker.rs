//! The in-process loan list and the operations the screens call.
//!
//! A [`LoanTracker`] owns the cached records, keeps them in step with the store
//! (bulk [`LoanTracker::reload`] or live [`LoanTracker::follow`]) and tells its
//! listeners whenever the list changes. Views are never cached; every read
//! evaluates the schedule again.

use crate::config::TrackerConfig;
use crate::error::{EmiError, Result};
use crate::loan::{Loan, LoanStatus, LoanView, NewLoan};
use crate::notify::{Listeners, Subscription};
use crate::schedule;
use crate::store::{LoanChange, LoanStore};
use crate::summary::{self, Dashboard};
use chrono::{Local, NaiveDate};
use log::{error, info, trace, warn};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::runtime::Handle;

/// Today's date in the local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

struct Inner {
    store: Arc<dyn LoanStore>,
    config: TrackerConfig,
    loans: RwLock<Vec<Loan>>,
    listeners: Listeners<()>,
}

impl Inner {
    fn apply(&self, change: &LoanChange) {
        {
            let mut loans = self.loans.write().unwrap_or_else(PoisonError::into_inner);
            match change {
                LoanChange::Added(loan) | LoanChange::Modified(loan) => {
                    match loans.iter_mut().find(|cached| cached.id == loan.id) {
                        Some(cached) => *cached = loan.clone(),
                        None => loans.push(loan.clone()),
                    }
                }
                LoanChange::Removed(id) => loans.retain(|cached| &cached.id != id),
            }
        }
        trace!("applied change to loan {}", change.id());
        self.listeners.notify(&());
    }

    fn cached(&self, id: &str) -> Option<Loan> {
        self.loans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|cached| cached.id == id)
            .cloned()
    }

    fn set_cached_status(&self, id: &str, status: LoanStatus) {
        let found = {
            let mut loans = self.loans.write().unwrap_or_else(PoisonError::into_inner);
            match loans.iter_mut().find(|cached| cached.id == id) {
                Some(cached) => {
                    cached.status = Some(status);
                    true
                }
                None => false,
            }
        };
        if found {
            self.listeners.notify(&());
        }
    }

    fn snapshot(&self) -> Vec<Loan> {
        self.loans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Clone)]
pub struct LoanTracker {
    inner: Arc<Inner>,
}

impl LoanTracker {
    pub fn new(store: Arc<dyn LoanStore>, config: TrackerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                loans: RwLock::new(Vec::new()),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Replaces the cached list with everything in the store.
    pub async fn reload(&self) -> Result<usize> {
        let loans = self.inner.store.list().await.map_err(|e| {
            error!("error loading loans: {}", e);
            EmiError::from(e)
        })?;
        let count = loans.len();
        *self
            .inner
            .loans
            .write()
            .unwrap_or_else(PoisonError::into_inner) = loans;

        info!("loaded {} loans", count);
        self.inner.listeners.notify(&());
        Ok(count)
    }

    /// Keeps the cache in step with changes made to the store by anyone.
    pub fn follow(&self) -> Subscription {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.store.subscribe(Box::new(move |change: &LoanChange| {
            if let Some(inner) = inner.upgrade() {
                inner.apply(change);
            }
        }))
    }

    /// Applies one change notification to the cache, last write wins.
    pub fn apply(&self, change: &LoanChange) {
        self.inner.apply(change);
    }

    /// Registers a callback fired after every change to the cached list.
    pub fn on_change(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.inner.listeners.register(move |_| callback())
    }

    /// The cached records, as stored.
    pub fn loans(&self) -> Vec<Loan> {
        self.inner.snapshot()
    }

    pub async fn add_loan(&self, loan: NewLoan) -> Result<Loan> {
        let loan = self
            .inner
            .store
            .create(loan.sanitized(today()))
            .await
            .map_err(|e| {
                error!("error adding loan: {}", e);
                EmiError::from(e)
            })?;
        self.inner.apply(&LoanChange::Added(loan.clone()));
        Ok(loan)
    }

    /// Saves edited terms of a cached loan and returns the stored record.
    ///
    /// Only name, amounts, start date, tenure and rate are taken from `loan`; the
    /// payment tracking and persisted status stay as cached, so an edit never
    /// rewinds a manually tracked loan.
    pub async fn update_loan(&self, loan: &Loan) -> Result<Loan> {
        let cached = self
            .inner
            .cached(&loan.id)
            .ok_or_else(|| EmiError::NotFound(loan.id.clone()))?;
        let updated = Loan {
            tracking: cached.tracking,
            status: cached.status,
            ..loan.clone()
        };

        self.inner.store.update(&updated).await.map_err(|e| {
            error!("error updating loan {}: {}", loan.id, e);
            EmiError::from(e)
        })?;
        self.inner.apply(&LoanChange::Modified(updated.clone()));
        Ok(updated)
    }

    pub async fn delete_loan(&self, id: &str) -> Result<()> {
        self.inner.store.delete(id).await.map_err(|e| {
            error!("error deleting loan {}: {}", id, e);
            EmiError::from(e)
        })?;
        self.inner.apply(&LoanChange::Removed(id.to_string()));
        Ok(())
    }

    /// Reads a record straight from the store, bypassing the cache.
    pub async fn fetch_loan(&self, id: &str) -> Result<Option<Loan>> {
        self.inner.store.get(id).await.map_err(|e| {
            error!("error getting loan {}: {}", id, e);
            EmiError::from(e)
        })
    }

    /// Records one installment of the cached loan `id` as paid on `as_of`.
    ///
    /// Two calls racing for the same loan are not serialized; callers must not
    /// issue a second payment before the first one settles.
    pub async fn mark_paid(&self, id: &str, as_of: NaiveDate) -> Result<Loan> {
        let loan = self
            .inner
            .cached(id)
            .ok_or_else(|| EmiError::NotFound(id.to_string()))?;

        let updated = schedule::pay_installment(&loan, as_of, self.inner.config.elapsed_rule)
            .inspect_err(|e| warn!("cannot mark loan {} as paid: {}", id, e))?;

        self.inner.store.update(&updated).await.map_err(|e| {
            error!("error marking loan {} as paid: {}", id, e);
            EmiError::from(e)
        })?;
        self.inner.apply(&LoanChange::Modified(updated.clone()));
        Ok(updated)
    }

    pub fn is_paid_for_month(&self, id: &str, as_of: NaiveDate) -> bool {
        self.inner
            .cached(id)
            .is_some_and(|loan| schedule::is_paid_for_month(&loan, as_of))
    }

    pub fn is_due_today(&self, id: &str, as_of: NaiveDate) -> bool {
        self.inner.cached(id).is_some_and(|loan| {
            schedule::is_due_today(&loan, as_of, self.inner.config.elapsed_rule)
        })
    }

    /// Evaluates one cached loan. Never fails for a loan that exists.
    pub fn view(&self, id: &str, as_of: NaiveDate) -> Option<LoanView> {
        self.inner.cached(id).map(|loan| self.evaluate(&loan, as_of))
    }

    pub fn views(&self, as_of: NaiveDate) -> Vec<LoanView> {
        self.inner
            .snapshot()
            .iter()
            .map(|loan| self.evaluate(loan, as_of))
            .collect()
    }

    pub fn active(&self, as_of: NaiveDate) -> Vec<LoanView> {
        summary::with_status(&self.views(as_of), LoanStatus::Active)
    }

    pub fn completed(&self, as_of: NaiveDate) -> Vec<LoanView> {
        summary::with_status(&self.views(as_of), LoanStatus::Completed)
    }

    pub fn upcoming(&self, as_of: NaiveDate) -> Vec<LoanView> {
        summary::upcoming(&self.views(as_of), as_of)
    }

    pub fn dashboard(&self, as_of: NaiveDate) -> Dashboard {
        Dashboard::new(&self.views(as_of), as_of)
    }

    fn evaluate(&self, loan: &Loan, as_of: NaiveDate) -> LoanView {
        match schedule::evaluate(loan, as_of, self.inner.config.elapsed_rule) {
            Ok(view) => {
                if view.status != loan.status.unwrap_or_default() {
                    self.reconcile_status(&loan.id, view.status);
                }
                view
            }
            Err(e) => {
                error!("error calculating status of loan {}: {}", loan.id, e);
                schedule::default_view(loan, as_of)
            }
        }
    }

    // fire and forget: the write runs on its own task and only logs failures
    fn reconcile_status(&self, id: &str, status: LoanStatus) {
        if !self.inner.config.reconcile_status {
            return;
        }
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no async runtime, status of loan {} not written", id);
                return;
            }
        };

        let store = self.inner.store.clone();
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = id.to_string();
        handle.spawn(async move {
            match store.set_status(&id, status).await {
                Ok(()) => {
                    info!("loan {} status synced to {}", id, status);
                    // the cache must agree or every read would write again
                    if let Some(inner) = inner.upgrade() {
                        inner.set_cached_status(&id, status);
                    }
                }
                Err(e) => error!("error syncing status of loan {}: {}", id, e),
            }
        });
    }
}
