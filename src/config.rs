use crate::budget::WorkBudget;
use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// One of the four concurrency-control strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    CoarseMutex,
    FineMutex,
    CoarseRwLock,
    FineRwLock,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::CoarseMutex,
        StrategyKind::FineMutex,
        StrategyKind::CoarseRwLock,
        StrategyKind::FineRwLock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::CoarseMutex => "coarse_mutex",
            StrategyKind::FineMutex => "fine_mutex",
            StrategyKind::CoarseRwLock => "coarse_rwlock",
            StrategyKind::FineRwLock => "fine_rwlock",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StrategyKind::CoarseMutex => "COARSE-GRAINED MUTEX",
            StrategyKind::FineMutex => "FINE-GRAINED MUTEX",
            StrategyKind::CoarseRwLock => "COARSE-GRAINED RWLOCK",
            StrategyKind::FineRwLock => "FINE-GRAINED RWLOCK",
        }
    }

    pub fn is_fine(self) -> bool {
        matches!(self, StrategyKind::FineMutex | StrategyKind::FineRwLock)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which strategies a simulation runs, in order.
///
/// `Mutex` and `RwLock` run the coarse variant first and the fine variant
/// second, resetting balances and budget in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockSelection {
    Single(StrategyKind),
    Mutex,
    RwLock,
    All,
}

impl LockSelection {
    pub fn strategies(self) -> Vec<StrategyKind> {
        match self {
            LockSelection::Single(kind) => vec![kind],
            LockSelection::Mutex => vec![StrategyKind::CoarseMutex, StrategyKind::FineMutex],
            LockSelection::RwLock => vec![StrategyKind::CoarseRwLock, StrategyKind::FineRwLock],
            LockSelection::All => StrategyKind::ALL.to_vec(),
        }
    }
}

impl From<StrategyKind> for LockSelection {
    fn from(kind: StrategyKind) -> Self {
        LockSelection::Single(kind)
    }
}

impl FromStr for LockSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selection = match s.trim().to_ascii_lowercase().as_str() {
            "coarse_mutex" => StrategyKind::CoarseMutex.into(),
            "fine_mutex" => StrategyKind::FineMutex.into(),
            "coarse_rwlock" => StrategyKind::CoarseRwLock.into(),
            "fine_rwlock" => StrategyKind::FineRwLock.into(),
            "mutex" => LockSelection::Mutex,
            "rwlock" => LockSelection::RwLock,
            "all" => LockSelection::All,
            _ => return Err(ConfigError::UnknownStrategy(s.to_string())),
        };
        Ok(selection)
    }
}

/// Parameter bundle for one simulation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub account_count: usize,
    pub transactions_per_thread: u64,
    /// Probability, in percent, that a worker prefers a balance query.
    pub query_percentage: u8,
    pub lock: LockSelection,
    pub thread_count: usize,
    /// Fixes the initial balances and every worker's draw stream.
    pub seed: Option<u64>,
    pub pin_threads: bool,
}

impl SimulationConfig {
    pub fn new(
        account_count: usize,
        transactions_per_thread: u64,
        query_percentage: u8,
        lock: impl Into<LockSelection>,
        thread_count: usize,
    ) -> Self {
        Self {
            account_count,
            transactions_per_thread,
            query_percentage,
            lock: lock.into(),
            thread_count,
            seed: None,
            pin_threads: false,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_count == 0 {
            return Err(ConfigError::NoAccounts);
        }
        if self.transactions_per_thread == 0 {
            return Err(ConfigError::NoTransactions);
        }
        if self.thread_count == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.query_percentage > 100 {
            return Err(ConfigError::PercentageOutOfRange(self.query_percentage));
        }
        let budget = self.budget()?;
        if budget.transfers() > 0 && self.account_count < 2 {
            return Err(ConfigError::TooFewAccounts(self.account_count));
        }
        Ok(())
    }

    pub fn total_operations(&self) -> Result<u64, ConfigError> {
        u64::try_from(self.thread_count)
            .ok()
            .and_then(|threads| self.transactions_per_thread.checked_mul(threads))
            .ok_or(ConfigError::BudgetOverflow {
                transactions_per_thread: self.transactions_per_thread,
                threads: self.thread_count,
            })
    }

    /// The budget every strategy run starts from.
    pub fn budget(&self) -> Result<WorkBudget, ConfigError> {
        let total = self.total_operations()?;
        let queries = (u128::from(total) * u128::from(self.query_percentage) / 100) as u64;
        Ok(WorkBudget::new(total - queries, queries))
    }
}
