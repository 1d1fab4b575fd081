//! Lock sets: the coarse and fine granularities, each in a mutex and an
//! rwlock flavor.
//!
//! The worker loop only talks to [`LockSet`] and [`TransactionScope`]. A
//! scope spans one worker iteration: the coarse scope holds the coordinator
//! lock for its whole lifetime, the fine scope takes per-account and budget
//! locks only around the individual steps. Every lock is a guard, released
//! when it goes out of scope.

use crate::account::{apply_transfer, reserve, AccountStore, Ledger};
use crate::budget::WorkBudget;
use crate::config::StrategyKind;
use crate::error::Result;
use crate::transaction::{JobKind, TransferOrder};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rust_decimal::Decimal;
use std::ops::{Deref, DerefMut};

/// A blocking lock flavor. `read` is shared for an rwlock and exclusive for a
/// mutex; `write` is always exclusive.
pub trait Latch<T>: Send + Sync {
    type ReadGuard<'a>: Deref<Target = T>
    where
        Self: 'a;
    type WriteGuard<'a>: DerefMut<Target = T>
    where
        Self: 'a;

    /// Whether concurrent `read` guards may coexist.
    const SHARED_READS: bool;

    fn new(value: T) -> Self;
    fn read(&self) -> Self::ReadGuard<'_>;
    fn write(&self) -> Self::WriteGuard<'_>;
}

impl<T: Send> Latch<T> for Mutex<T> {
    type ReadGuard<'a> = MutexGuard<'a, T> where Self: 'a;
    type WriteGuard<'a> = MutexGuard<'a, T> where Self: 'a;

    const SHARED_READS: bool = false;

    fn new(value: T) -> Self {
        Mutex::new(value)
    }

    fn read(&self) -> Self::ReadGuard<'_> {
        self.lock()
    }

    fn write(&self) -> Self::WriteGuard<'_> {
        self.lock()
    }
}

impl<T: Send + Sync> Latch<T> for RwLock<T> {
    type ReadGuard<'a> = RwLockReadGuard<'a, T> where Self: 'a;
    type WriteGuard<'a> = RwLockWriteGuard<'a, T> where Self: 'a;

    const SHARED_READS: bool = true;

    fn new(value: T) -> Self {
        RwLock::new(value)
    }

    fn read(&self) -> Self::ReadGuard<'_> {
        RwLock::read(self)
    }

    fn write(&self) -> Self::WriteGuard<'_> {
        RwLock::write(self)
    }
}

/// The shared state of one run together with the locks guarding it.
pub trait LockSet: Send + Sync + Sized {
    type Scope<'a>: TransactionScope
    where
        Self: 'a;

    const KIND: StrategyKind;

    fn build(accounts: AccountStore, budget: WorkBudget) -> Result<Self>;

    /// Opens the critical context for one worker iteration.
    fn begin(&self) -> Self::Scope<'_>;

    fn account_count(&self) -> usize;

    /// Snapshot of the balances. Only consistent once the workers are joined.
    fn balances(&self) -> Vec<Decimal>;

    fn remaining(&self) -> WorkBudget;
}

/// The operations of one worker iteration.
pub trait TransactionScope {
    /// Claims the preferred kind, falling back to the other kind. `None`
    /// means the budget is exhausted.
    fn claim(&mut self, preferred: JobKind) -> Option<JobKind>;

    fn query(&mut self, index: usize) -> Decimal;

    fn transfer(&mut self, order: TransferOrder) -> bool;

    /// Closes out a claimed job once its transaction ran.
    fn settle(&mut self, job: JobKind, applied: bool);
}

/// One coordinator lock over the balances and the budget.
pub struct Coarse<L> {
    ledger: L,
    accounts: usize,
}

pub type CoarseMutex = Coarse<Mutex<Ledger>>;
pub type CoarseRwLock = Coarse<RwLock<Ledger>>;

impl<L: Latch<Ledger>> LockSet for Coarse<L> {
    type Scope<'a> = CoarseScope<L::WriteGuard<'a>> where Self: 'a;

    const KIND: StrategyKind = if L::SHARED_READS {
        StrategyKind::CoarseRwLock
    } else {
        StrategyKind::CoarseMutex
    };

    fn build(accounts: AccountStore, budget: WorkBudget) -> Result<Self> {
        Ok(Self {
            accounts: accounts.len(),
            ledger: L::new(Ledger::new(accounts, budget)),
        })
    }

    // Every iteration may touch the budget, so even the rwlock flavor takes
    // the write side here.
    fn begin(&self) -> Self::Scope<'_> {
        CoarseScope {
            ledger: self.ledger.write(),
        }
    }

    fn account_count(&self) -> usize {
        self.accounts
    }

    fn balances(&self) -> Vec<Decimal> {
        self.ledger.read().accounts.balances().to_vec()
    }

    fn remaining(&self) -> WorkBudget {
        self.ledger.read().budget
    }
}

/// Holds the coordinator lock from claim to settle, so a unit is only taken
/// from the budget once its transaction has been applied.
pub struct CoarseScope<G> {
    ledger: G,
}

impl<G: DerefMut<Target = Ledger>> TransactionScope for CoarseScope<G> {
    fn claim(&mut self, preferred: JobKind) -> Option<JobKind> {
        self.ledger.budget.select(preferred)
    }

    fn query(&mut self, index: usize) -> Decimal {
        self.ledger.accounts.read(index)
    }

    fn transfer(&mut self, order: TransferOrder) -> bool {
        self.ledger.accounts.try_transfer(order)
    }

    fn settle(&mut self, job: JobKind, applied: bool) {
        if applied {
            self.ledger.budget.consume(job);
        }
    }
}

/// One lock per account plus a dedicated budget lock.
pub struct Fine<A, B> {
    accounts: Vec<A>,
    budget: B,
}

pub type FineMutex = Fine<Mutex<Decimal>, Mutex<WorkBudget>>;
pub type FineRwLock = Fine<RwLock<Decimal>, RwLock<WorkBudget>>;

impl<A: Latch<Decimal>, B: Latch<WorkBudget>> Fine<A, B> {
    /// # Panics
    ///
    /// Panics if `index` is not below [`LockSet::account_count`].
    pub fn lock_account(&self, index: usize) -> A::ReadGuard<'_> {
        self.accounts[index].read()
    }

    /// Locks two distinct accounts, lower index first, and hands them back
    /// as (source, target). Returns `None` for a self-transfer. Panics on an
    /// index out of range, like [`Fine::lock_account`].
    pub fn lock_pair(&self, from: usize, to: usize) -> Option<PairGuard<A::WriteGuard<'_>>> {
        if from == to {
            return None;
        }
        let low = self.accounts[from.min(to)].write();
        let high = self.accounts[from.max(to)].write();
        Some(PairGuard {
            high,
            low,
            source_is_low: from < to,
        })
    }

    pub fn lock_budget(&self) -> B::WriteGuard<'_> {
        self.budget.write()
    }
}

impl<A: Latch<Decimal>, B: Latch<WorkBudget>> LockSet for Fine<A, B> {
    type Scope<'a> = FineScope<'a, A, B> where Self: 'a;

    const KIND: StrategyKind = if A::SHARED_READS {
        StrategyKind::FineRwLock
    } else {
        StrategyKind::FineMutex
    };

    fn build(accounts: AccountStore, budget: WorkBudget) -> Result<Self> {
        let mut locks = reserve("account locks", accounts.len())?;
        locks.extend(accounts.into_balances().into_iter().map(A::new));
        Ok(Self {
            accounts: locks,
            budget: B::new(budget),
        })
    }

    fn begin(&self) -> Self::Scope<'_> {
        FineScope { locks: self }
    }

    fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn balances(&self) -> Vec<Decimal> {
        self.accounts.iter().map(|account| *account.read()).collect()
    }

    fn remaining(&self) -> WorkBudget {
        *self.budget.read()
    }
}

/// Claims up front under the budget lock and hands the unit back if the
/// transfer then fails its funds check.
pub struct FineScope<'a, A, B> {
    locks: &'a Fine<A, B>,
}

impl<A: Latch<Decimal>, B: Latch<WorkBudget>> TransactionScope for FineScope<'_, A, B> {
    fn claim(&mut self, preferred: JobKind) -> Option<JobKind> {
        self.locks.lock_budget().try_claim(preferred)
    }

    fn query(&mut self, index: usize) -> Decimal {
        *self.locks.lock_account(index)
    }

    fn transfer(&mut self, order: TransferOrder) -> bool {
        match self.locks.lock_pair(order.from, order.to) {
            Some(mut pair) => {
                let (source, target) = pair.split_mut();
                apply_transfer(source, target, order.amount)
            }
            None => false,
        }
    }

    fn settle(&mut self, job: JobKind, applied: bool) {
        if job == JobKind::Transfer && !applied {
            self.locks.lock_budget().release(job);
        }
    }
}

/// Write guards on two accounts.
pub struct PairGuard<G> {
    // Fields drop in declaration order: the higher index is released first.
    high: G,
    low: G,
    source_is_low: bool,
}

impl<G: DerefMut<Target = Decimal>> PairGuard<G> {
    pub fn split_mut(&mut self) -> (&mut Decimal, &mut Decimal) {
        if self.source_is_low {
            (&mut *self.low, &mut *self.high)
        } else {
            (&mut *self.high, &mut *self.low)
        }
    }
}
