use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::time::{SystemTime, UNIX_EPOCH};

/// Transfer amounts are drawn from `0..MAX_TRANSFER_AMOUNT`.
pub const MAX_TRANSFER_AMOUNT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Transfer,
    Query,
}

impl JobKind {
    pub fn other(self) -> JobKind {
        match self {
            JobKind::Transfer => JobKind::Query,
            JobKind::Query => JobKind::Transfer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOrder {
    pub from: usize,
    pub to: usize,
    pub amount: Decimal,
}

impl TransferOrder {
    pub fn new(from: usize, to: usize, amount: impl Into<Decimal>) -> Self {
        Self {
            from,
            to,
            amount: amount.into(),
        }
    }
}

/// One scripted step of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Draw {
    Transfer(TransferOrder),
    Query(usize),
}

impl Draw {
    pub fn kind(&self) -> JobKind {
        match self {
            Draw::Transfer(_) => JobKind::Transfer,
            Draw::Query(_) => JobKind::Query,
        }
    }
}

/// Per-thread source of job preferences and transaction parameters.
pub trait JobSource {
    fn prefer(&mut self) -> JobKind;
    fn query_index(&mut self, accounts: usize) -> usize;
    fn transfer_order(&mut self, accounts: usize) -> TransferOrder;
}

/// Pseudo-random draws, private to one worker thread.
pub struct RandomDraws {
    rng: StdRng,
    query_percentage: u8,
}

impl RandomDraws {
    pub fn new(seed: u64, query_percentage: u8) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            query_percentage,
        }
    }

    /// Seeds from the wall clock mixed with the thread id, or from `seed`
    /// mixed with the thread id when the run is pinned to a seed.
    pub fn for_thread(thread_id: usize, seed: Option<u64>, query_percentage: u8) -> Self {
        let base = seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        });
        Self::new(base ^ thread_id as u64, query_percentage)
    }
}

impl JobSource for RandomDraws {
    fn prefer(&mut self) -> JobKind {
        if self.rng.gen_range(0..100u8) < self.query_percentage {
            JobKind::Query
        } else {
            JobKind::Transfer
        }
    }

    fn query_index(&mut self, accounts: usize) -> usize {
        self.rng.gen_range(0..accounts)
    }

    fn transfer_order(&mut self, accounts: usize) -> TransferOrder {
        let from = self.rng.gen_range(0..accounts);
        let to = self.rng.gen_range(0..accounts);
        let amount = self.rng.gen_range(0..MAX_TRANSFER_AMOUNT);
        TransferOrder::new(from, to, amount)
    }
}

/// Replays a fixed sequence of draws, wrapping around at the end.
///
/// Each step is consumed by the transaction that follows the preference, so
/// a step whose kind differs from the claimed job is reinterpreted: a query
/// step used for a transfer becomes a self-transfer (always refused) and a
/// transfer step used for a query reads the source account.
///
/// Indices are replayed as given and must be valid for the accounts of the
/// run; an out-of-range index panics the worker, which the engine reports as
/// [`crate::SimError::WorkerPanicked`].
#[derive(Debug, Clone)]
pub struct ScriptedDraws {
    steps: Vec<Draw>,
    cursor: usize,
}

impl ScriptedDraws {
    pub fn new(steps: Vec<Draw>) -> Self {
        Self { steps, cursor: 0 }
    }

    fn peek(&self) -> Option<Draw> {
        if self.steps.is_empty() {
            return None;
        }
        Some(self.steps[self.cursor % self.steps.len()])
    }

    fn advance(&mut self) -> Option<Draw> {
        let step = self.peek()?;
        self.cursor += 1;
        Some(step)
    }
}

impl JobSource for ScriptedDraws {
    fn prefer(&mut self) -> JobKind {
        self.peek().map_or(JobKind::Query, |step| step.kind())
    }

    fn query_index(&mut self, _accounts: usize) -> usize {
        match self.advance() {
            Some(Draw::Query(index)) => index,
            Some(Draw::Transfer(order)) => order.from,
            None => 0,
        }
    }

    fn transfer_order(&mut self, _accounts: usize) -> TransferOrder {
        match self.advance() {
            Some(Draw::Transfer(order)) => order,
            Some(Draw::Query(index)) => TransferOrder::new(index, index, 0u32),
            None => TransferOrder::new(0, 0, 0u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_draws_stay_in_range() {
        let mut draws = RandomDraws::new(7, 50);
        for _ in 0..1_000 {
            let order = draws.transfer_order(5);
            assert!(order.from < 5 && order.to < 5);
            assert!(order.amount >= Decimal::ZERO);
            assert!(order.amount < Decimal::from(MAX_TRANSFER_AMOUNT));
            assert!(draws.query_index(5) < 5);
        }
    }

    #[test]
    fn test_random_draws_respect_percentage_extremes() {
        let mut queries = RandomDraws::new(1, 100);
        let mut transfers = RandomDraws::new(1, 0);
        for _ in 0..200 {
            assert_eq!(queries.prefer(), JobKind::Query);
            assert_eq!(transfers.prefer(), JobKind::Transfer);
        }
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = RandomDraws::for_thread(3, Some(42), 25);
        let mut b = RandomDraws::for_thread(3, Some(42), 25);
        for _ in 0..50 {
            assert_eq!(a.prefer(), b.prefer());
            assert_eq!(a.transfer_order(9), b.transfer_order(9));
        }
    }

    #[test]
    fn test_scripted_draws_replay_in_order() {
        let mut draws = ScriptedDraws::new(vec![
            Draw::Transfer(TransferOrder::new(0, 1, 5u32)),
            Draw::Query(2),
        ]);
        assert_eq!(draws.prefer(), JobKind::Transfer);
        assert_eq!(draws.transfer_order(3), TransferOrder::new(0, 1, 5u32));
        assert_eq!(draws.prefer(), JobKind::Query);
        assert_eq!(draws.query_index(3), 2);
        // wraps around
        assert_eq!(draws.prefer(), JobKind::Transfer);
    }

    #[test]
    fn test_scripted_query_step_used_as_transfer_is_self_transfer() {
        let mut draws = ScriptedDraws::new(vec![Draw::Query(1)]);
        let order = draws.transfer_order(3);
        assert_eq!(order.from, order.to);
    }
}
