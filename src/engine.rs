use crate::account::AccountStore;
use crate::budget::WorkBudget;
use crate::config::{SimulationConfig, StrategyKind};
use crate::error::{Result, SimError};
use crate::lock::LockSet;
use crate::transaction::{JobSource, RandomDraws};
use crate::worker::{Worker, WorkerReport};
use crossbeam::channel::unbounded;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of one strategy run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    /// Budget and locks are set up, no worker started.
    Init,
    Running,
    /// The budget hit zero or a worker finished; the rest are finishing
    /// their last jobs.
    Draining,
    /// All workers joined.
    Done,
}

/// Everything the workers of one run share.
pub struct SimulationContext<L> {
    pub locks: L,
    pub quota: u64,
    pub query_percentage: u8,
    pub seed: Option<u64>,
}

/// Runs one strategy: spawns the workers, joins them and collects reports.
pub struct Engine<L> {
    context: Arc<SimulationContext<L>>,
    threads: usize,
    pin_threads: bool,
    total_before: Decimal,
    expected: u64,
    phases: Vec<RunPhase>,
}

impl<L: LockSet + 'static> Engine<L> {
    pub fn new(config: &SimulationConfig, accounts: AccountStore) -> Result<Self> {
        config.validate()?;
        let budget = config.budget()?;
        let total_before = accounts.total();
        let locks = L::build(accounts, budget)?;
        Ok(Self {
            context: Arc::new(SimulationContext {
                locks,
                quota: config.transactions_per_thread,
                query_percentage: config.query_percentage,
                seed: config.seed,
            }),
            threads: config.thread_count,
            pin_threads: config.pin_threads,
            total_before,
            expected: budget.total(),
            phases: vec![RunPhase::Init],
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phases.last().copied().unwrap_or(RunPhase::Init)
    }

    fn advance(&mut self, next: RunPhase) {
        let current = self.phase();
        debug_assert!(next > current, "run phase moved from {current:?} to {next:?}");
        debug!(strategy = %L::KIND, from = ?current, to = ?next, "run phase");
        self.phases.push(next);
    }

    /// A worker only reports once it left its loop, either on its quota or
    /// on an empty budget, so the first report starts the drain.
    fn observe(&mut self, report: &WorkerReport) {
        if self.phase() == RunPhase::Running {
            debug!(thread = report.thread, exit = ?report.exit, "first worker finished");
            self.advance(RunPhase::Draining);
        }
    }

    /// Runs with per-thread random draws.
    pub fn run(self) -> Result<RunOutcome> {
        let seed = self.context.seed;
        let query_percentage = self.context.query_percentage;
        self.run_with(move |thread| RandomDraws::for_thread(thread, seed, query_percentage))
    }

    /// Runs with the job source `make_source` builds for each thread id.
    pub fn run_with<S, F>(mut self, mut make_source: F) -> Result<RunOutcome>
    where
        S: JobSource + Send + 'static,
        F: FnMut(usize) -> S,
    {
        let cores = if self.pin_threads {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };
        let (tx, rx) = unbounded::<WorkerReport>();
        let mut handles: Vec<thread::JoinHandle<()>> = Vec::with_capacity(self.threads);

        self.advance(RunPhase::Running);
        let start = Instant::now();
        for id in 0..self.threads {
            let context = self.context.clone();
            let tx = tx.clone();
            let source = make_source(id);
            let core = (!cores.is_empty()).then(|| cores[id % cores.len()]);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || {
                    if let Some(core) = core {
                        if !core_affinity::set_for_current(core) {
                            warn!(thread = id, core = core.id, "failed to pin worker");
                        }
                    }
                    let report = Worker::new(id, &context.locks, source, context.quota).run();
                    tx.send(report).ok();
                });
            let handle = match handle {
                Ok(handle) => handle,
                Err(source) => {
                    // already running workers still hold the context
                    for handle in handles {
                        handle.join().ok();
                    }
                    return Err(SimError::Spawn { thread: id, source });
                }
            };
            handles.push(handle);
        }
        drop(tx);

        let mut workers = Vec::with_capacity(self.threads);
        for report in rx {
            self.observe(&report);
            workers.push(report);
        }
        if self.phase() == RunPhase::Running {
            self.advance(RunPhase::Draining);
        }
        let mut panicked = None;
        for (id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                panicked.get_or_insert(id);
            }
        }
        let elapsed = start.elapsed();
        self.advance(RunPhase::Done);
        if let Some(id) = panicked {
            return Err(SimError::WorkerPanicked(id));
        }

        workers.sort_by_key(|report| report.thread);
        let outcome = RunOutcome {
            strategy: L::KIND,
            elapsed,
            workers,
            expected: self.expected,
            total_before: self.total_before,
            balances: self.context.locks.balances(),
            remaining: self.context.locks.remaining(),
            phases: self.phases,
        };
        info!(
            strategy = %outcome.strategy,
            elapsed = ?outcome.elapsed,
            transfers = outcome.transfers(),
            queries = outcome.queries(),
            "run finished"
        );
        Ok(outcome)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub strategy: StrategyKind,
    pub elapsed: Duration,
    pub workers: Vec<WorkerReport>,
    /// Operations the budget started with.
    pub expected: u64,
    pub total_before: Decimal,
    pub balances: Vec<Decimal>,
    pub remaining: WorkBudget,
    /// Every phase the run went through, in order.
    pub phases: Vec<RunPhase>,
}

impl RunOutcome {
    pub fn transfers(&self) -> u64 {
        self.workers.iter().map(|w| w.transfers).sum()
    }

    pub fn queries(&self) -> u64 {
        self.workers.iter().map(|w| w.queries).sum()
    }

    pub fn failed_transfers(&self) -> u64 {
        self.workers.iter().map(|w| w.failed_transfers).sum()
    }

    pub fn total_after(&self) -> Decimal {
        self.balances.iter().sum()
    }

    /// Checks that money was conserved and every budget unit was consumed
    /// exactly once.
    pub fn verify(&self) -> Result<()> {
        let after = self.total_after();
        if after != self.total_before {
            return Err(SimError::ConservationViolated {
                strategy: self.strategy,
                before: self.total_before,
                after,
            });
        }
        let completed = self.transfers() + self.queries();
        if completed != self.expected || !self.remaining.is_exhausted() {
            return Err(SimError::BudgetMismatch {
                strategy: self.strategy,
                completed,
                expected: self.expected,
                remaining: self.remaining,
            });
        }
        Ok(())
    }
}
