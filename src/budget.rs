use crate::transaction::JobKind;

/// Remaining transfer and query operations shared by all workers of a run.
///
/// The budget carries no lock of its own; the lock set decides whether it
/// sits behind the coordinator lock or a dedicated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkBudget {
    transfers: u64,
    queries: u64,
}

impl WorkBudget {
    pub fn new(transfers: u64, queries: u64) -> Self {
        Self { transfers, queries }
    }

    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn queries(&self) -> u64 {
        self.queries
    }

    pub fn remaining(&self, kind: JobKind) -> u64 {
        match kind {
            JobKind::Transfer => self.transfers,
            JobKind::Query => self.queries,
        }
    }

    pub fn total(&self) -> u64 {
        self.transfers + self.queries
    }

    pub fn is_exhausted(&self) -> bool {
        self.total() == 0
    }

    /// Picks the kind a claim would take without consuming it: the preferred
    /// kind if any is left, otherwise the other one.
    pub fn select(&self, preferred: JobKind) -> Option<JobKind> {
        [preferred, preferred.other()]
            .into_iter()
            .find(|kind| self.remaining(*kind) > 0)
    }

    /// Consumes one unit of `kind`. Callers must have selected it first.
    pub fn consume(&mut self, kind: JobKind) {
        let counter = self.counter_mut(kind);
        debug_assert!(*counter > 0, "consumed exhausted {kind:?} budget");
        *counter -= 1;
    }

    pub fn try_claim(&mut self, preferred: JobKind) -> Option<JobKind> {
        let kind = self.select(preferred)?;
        self.consume(kind);
        Some(kind)
    }

    /// Hands a claimed unit back after its transaction failed validation.
    pub fn release(&mut self, kind: JobKind) {
        *self.counter_mut(kind) += 1;
    }

    fn counter_mut(&mut self, kind: JobKind) -> &mut u64 {
        match kind {
            JobKind::Transfer => &mut self.transfers,
            JobKind::Query => &mut self.queries,
        }
    }
}
