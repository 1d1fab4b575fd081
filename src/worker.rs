use crate::lock::{LockSet, TransactionScope};
use crate::transaction::{JobKind, JobSource};
use tracing::{info, trace};

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    QuotaMet,
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub thread: usize,
    pub transfers: u64,
    pub queries: u64,
    /// Transfer attempts refused for insufficient funds or a self-transfer.
    pub failed_transfers: u64,
    pub exit: WorkerExit,
}

impl WorkerReport {
    fn new(thread: usize) -> Self {
        Self {
            thread,
            transfers: 0,
            queries: 0,
            failed_transfers: 0,
            exit: WorkerExit::QuotaMet,
        }
    }

    pub fn completed(&self) -> u64 {
        self.transfers + self.queries
    }

    fn record(&mut self, job: JobKind, applied: bool) {
        match (job, applied) {
            (JobKind::Transfer, true) => self.transfers += 1,
            (JobKind::Transfer, false) => self.failed_transfers += 1,
            (JobKind::Query, _) => self.queries += 1,
        }
    }
}

pub struct Worker<'a, L, S> {
    id: usize,
    locks: &'a L,
    source: S,
    quota: u64,
}

impl<'a, L: LockSet, S: JobSource> Worker<'a, L, S> {
    pub fn new(id: usize, locks: &'a L, source: S, quota: u64) -> Self {
        Self {
            id,
            locks,
            source,
            quota,
        }
    }

    pub fn run(mut self) -> WorkerReport {
        let accounts = self.locks.account_count();
        let mut report = WorkerReport::new(self.id);

        while report.completed() < self.quota {
            let preferred = self.source.prefer();
            let mut scope = self.locks.begin();
            let Some(job) = scope.claim(preferred) else {
                report.exit = WorkerExit::BudgetExhausted;
                break;
            };

            let applied = match job {
                JobKind::Query => {
                    let index = self.source.query_index(accounts);
                    let balance = scope.query(index);
                    trace!(thread = self.id, index, %balance, "balance query");
                    true
                }
                JobKind::Transfer => {
                    let order = self.source.transfer_order(accounts);
                    let applied = scope.transfer(order);
                    trace!(
                        thread = self.id,
                        from = order.from,
                        to = order.to,
                        amount = %order.amount,
                        applied,
                        "money transfer"
                    );
                    applied
                }
            };
            scope.settle(job, applied);
            report.record(job, applied);
        }

        info!(
            thread = self.id,
            transfers = report.transfers,
            queries = report.queries,
            failed_transfers = report.failed_transfers,
            exit = ?report.exit,
            "worker finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStore;
    use crate::budget::WorkBudget;
    use crate::lock::{CoarseMutex, FineRwLock};
    use crate::transaction::{Draw, ScriptedDraws, TransferOrder};
    use rust_decimal::Decimal;

    fn accounts(balances: &[u32]) -> AccountStore {
        AccountStore::new(balances.iter().copied().map(Decimal::from).collect())
    }

    #[test]
    fn test_stops_at_quota() {
        let locks = CoarseMutex::build(accounts(&[10, 10]), WorkBudget::new(0, 10)).unwrap();
        let source = ScriptedDraws::new(vec![Draw::Query(1)]);
        let report = Worker::new(0, &locks, source, 4).run();
        assert_eq!(report.queries, 4);
        assert_eq!(report.exit, WorkerExit::QuotaMet);
        assert_eq!(locks.remaining(), WorkBudget::new(0, 6));
    }

    #[test]
    fn test_stops_when_budget_exhausted() {
        let locks = FineRwLock::build(accounts(&[10, 10]), WorkBudget::new(1, 1)).unwrap();
        let source = ScriptedDraws::new(vec![
            Draw::Transfer(TransferOrder::new(0, 1, 3u32)),
            Draw::Query(0),
        ]);
        let report = Worker::new(0, &locks, source, 100).run();
        assert_eq!((report.transfers, report.queries), (1, 1));
        assert_eq!(report.exit, WorkerExit::BudgetExhausted);
        assert!(locks.remaining().is_exhausted());
    }

    #[test]
    fn test_failed_transfer_does_not_count_toward_quota() {
        let locks = FineRwLock::build(accounts(&[0, 10]), WorkBudget::new(1, 0)).unwrap();
        let source = ScriptedDraws::new(vec![
            Draw::Transfer(TransferOrder::new(0, 1, 5u32)),
            Draw::Transfer(TransferOrder::new(1, 0, 5u32)),
        ]);
        let report = Worker::new(0, &locks, source, 1).run();
        assert_eq!(report.failed_transfers, 1);
        assert_eq!(report.transfers, 1);
        assert_eq!(locks.balances(), vec![Decimal::from(5), Decimal::from(5)]);
        assert!(locks.remaining().is_exhausted());
    }

    #[test]
    fn test_rerouted_claim_uses_remaining_kind() {
        let locks = CoarseMutex::build(accounts(&[10, 0]), WorkBudget::new(1, 0)).unwrap();
        // the first step prefers a query, but only a transfer is left
        let source = ScriptedDraws::new(vec![
            Draw::Query(0),
            Draw::Transfer(TransferOrder::new(0, 1, 4u32)),
        ]);
        let report = Worker::new(0, &locks, source, 5).run();
        assert_eq!(report.queries, 0);
        assert_eq!(report.failed_transfers, 1);
        assert_eq!(report.transfers, 1);
        assert_eq!(report.exit, WorkerExit::BudgetExhausted);
        assert_eq!(locks.balances(), vec![Decimal::from(6), Decimal::from(4)]);
    }
}
