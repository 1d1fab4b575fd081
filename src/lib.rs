//! Concurrent account-transfer simulator.
//!
//! A pool of worker threads drains a shared budget of money transfers and
//! balance queries over one array of balances, under one of four locking
//! strategies: a single coordinator lock or per-account locks, each as a
//! mutex or an rwlock. Every run must conserve the total balance and consume
//! each budget unit exactly once.

pub mod account;
pub mod budget;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod output;
pub mod runner;
pub mod transaction;
pub mod worker;

pub use account::{AccountStore, Ledger};
pub use budget::WorkBudget;
pub use config::{LockSelection, SimulationConfig, StrategyKind};
pub use engine::{Engine, RunOutcome, RunPhase, SimulationContext};
pub use error::{ConfigError, Result, SimError};
pub use lock::{CoarseMutex, CoarseRwLock, FineMutex, FineRwLock, LockSet, TransactionScope};
pub use runner::{run_strategy, Simulation};
pub use transaction::{Draw, JobKind, JobSource, RandomDraws, ScriptedDraws, TransferOrder};
pub use worker::{Worker, WorkerExit, WorkerReport};
