use crate::budget::WorkBudget;
use crate::config::StrategyKind;
use arrow::error::ArrowError;
use rust_decimal::Decimal;
use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("account count must be at least 1")]
    NoAccounts,

    #[error("transfers need at least 2 accounts, got {0}")]
    TooFewAccounts(usize),

    #[error("transactions per thread must be at least 1")]
    NoTransactions,

    #[error("thread count must be at least 1")]
    NoThreads,

    #[error("query percentage must be within 0..=100, got {0}")]
    PercentageOutOfRange(u8),

    #[error("{transactions_per_thread} transactions x {threads} threads overflows the budget")]
    BudgetOverflow {
        transactions_per_thread: u64,
        threads: usize,
    },

    #[error("unknown lock strategy {0:?}, expected one of coarse_mutex, fine_mutex, coarse_rwlock, fine_rwlock, mutex, rwlock, all")]
    UnknownStrategy(String),
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to allocate {count} {what}")]
    Allocation {
        what: &'static str,
        count: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("failed to spawn worker {thread}")]
    Spawn {
        thread: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("{strategy}: total balance changed from {before} to {after}")]
    ConservationViolated {
        strategy: StrategyKind,
        before: Decimal,
        after: Decimal,
    },

    #[error("{strategy}: completed {completed} of {expected} operations, {remaining:?} left unclaimed")]
    BudgetMismatch {
        strategy: StrategyKind,
        completed: u64,
        expected: u64,
        remaining: WorkBudget,
    },

    #[error("failed to write report: {0}")]
    Report(#[from] ArrowError),
}

pub type Result<T> = std::result::Result<T, SimError>;
