use crate::budget::WorkBudget;
use crate::error::{Result, SimError};
use crate::transaction::TransferOrder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Initial balances are drawn from `0..MAX_INITIAL_BALANCE`.
pub const MAX_INITIAL_BALANCE: u32 = 1000;

/// Moves `amount` from `source` to `target` if the source can cover it.
pub fn apply_transfer(source: &mut Decimal, target: &mut Decimal, amount: Decimal) -> bool {
    if *source < amount {
        return false;
    }
    *source -= amount;
    *target += amount;
    true
}

/// Reserves room for `count` items, reporting allocation failure as an error.
pub(crate) fn reserve<T>(what: &'static str, count: usize) -> Result<Vec<T>> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|source| SimError::Allocation {
            what,
            count,
            source,
        })?;
    Ok(items)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStore {
    balances: Vec<Decimal>,
}

impl AccountStore {
    pub fn new(balances: Vec<Decimal>) -> Self {
        Self { balances }
    }

    /// Random integral balances in `[0, MAX_INITIAL_BALANCE)`.
    pub fn random(count: usize, seed: Option<u64>) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut balances = reserve("account balances", count)?;
        balances.extend((0..count).map(|_| Decimal::from(rng.gen_range(0..MAX_INITIAL_BALANCE))));
        Ok(Self { balances })
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn read(&self, index: usize) -> Decimal {
        self.balances[index]
    }

    /// Self-transfers are refused.
    pub fn try_transfer(&mut self, order: TransferOrder) -> bool {
        if order.from == order.to {
            return false;
        }
        let (low, high) = (order.from.min(order.to), order.from.max(order.to));
        let (head, tail) = self.balances.split_at_mut(high);
        let (low, high) = (&mut head[low], &mut tail[0]);
        if order.from < order.to {
            apply_transfer(low, high, order.amount)
        } else {
            apply_transfer(high, low, order.amount)
        }
    }

    pub fn total(&self) -> Decimal {
        self.balances.iter().sum()
    }

    pub fn balances(&self) -> &[Decimal] {
        &self.balances
    }

    pub fn into_balances(self) -> Vec<Decimal> {
        self.balances
    }
}

/// Everything the coarse coordinator lock protects: the balances and the
/// budget together.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub accounts: AccountStore,
    pub budget: WorkBudget,
}

impl Ledger {
    pub fn new(accounts: AccountStore, budget: WorkBudget) -> Self {
        Self { accounts, budget }
    }
}
