use crate::account::AccountStore;
use crate::config::{SimulationConfig, StrategyKind};
use crate::engine::{Engine, RunOutcome};
use crate::error::Result;
use crate::lock::{CoarseMutex, CoarseRwLock, FineMutex, FineRwLock};
use tracing::{debug, info, trace};

/// Runs every strategy of a lock selection back to back, starting each one
/// from freshly generated balances and a full budget.
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run(&self) -> Result<Vec<RunOutcome>> {
        let budget = self.config.budget()?;
        info!(
            accounts = self.config.account_count,
            transactions_per_thread = self.config.transactions_per_thread,
            threads = self.config.thread_count,
            transfers = budget.transfers(),
            queries = budget.queries(),
            "starting simulation"
        );

        let mut outcomes = Vec::new();
        for strategy in self.config.lock.strategies() {
            debug!(%strategy, "resetting balances and budget");
            let accounts = AccountStore::random(self.config.account_count, self.config.seed)?;
            let outcome = run_strategy(strategy, &self.config, accounts)?;
            outcome.verify()?;
            trace!(%strategy, balances = ?outcome.balances, "final balances");
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Runs a single strategy over `accounts` with random draws.
pub fn run_strategy(
    strategy: StrategyKind,
    config: &SimulationConfig,
    accounts: AccountStore,
) -> Result<RunOutcome> {
    match strategy {
        StrategyKind::CoarseMutex => Engine::<CoarseMutex>::new(config, accounts)?.run(),
        StrategyKind::FineMutex => Engine::<FineMutex>::new(config, accounts)?.run(),
        StrategyKind::CoarseRwLock => Engine::<CoarseRwLock>::new(config, accounts)?.run(),
        StrategyKind::FineRwLock => Engine::<FineRwLock>::new(config, accounts)?.run(),
    }
}
