use bank_sim::{
    run_strategy, AccountStore, Draw, Engine, JobKind, JobSource, LockSet, RandomDraws,
    RunOutcome, ScriptedDraws, SimulationConfig, StrategyKind, TransferOrder,
};
use bank_sim::{CoarseMutex, CoarseRwLock, FineMutex, FineRwLock};
use crossbeam::channel::bounded;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::thread;
use std::time::Duration;

fn balances(values: &[u32]) -> AccountStore {
    AccountStore::new(values.iter().copied().map(Decimal::from).collect())
}

fn scripted<L: LockSet + 'static>(
    config: &SimulationConfig,
    accounts: AccountStore,
    script: &[Draw],
) -> RunOutcome {
    let script = script.to_vec();
    Engine::<L>::new(config, accounts)
        .unwrap()
        .run_with(move |_| ScriptedDraws::new(script.clone()))
        .unwrap()
}

fn run_scripted(
    strategy: StrategyKind,
    config: &SimulationConfig,
    accounts: AccountStore,
    script: &[Draw],
) -> RunOutcome {
    match strategy {
        StrategyKind::CoarseMutex => scripted::<CoarseMutex>(config, accounts, script),
        StrategyKind::FineMutex => scripted::<FineMutex>(config, accounts, script),
        StrategyKind::CoarseRwLock => scripted::<CoarseRwLock>(config, accounts, script),
        StrategyKind::FineRwLock => scripted::<FineRwLock>(config, accounts, script),
    }
}

/// Records a random draw stream up front so it can be replayed.
fn record_script(seed: u64, query_percentage: u8, accounts: usize, steps: usize) -> Vec<Draw> {
    let mut draws = RandomDraws::new(seed, query_percentage);
    (0..steps)
        .map(|_| match draws.prefer() {
            JobKind::Query => Draw::Query(draws.query_index(accounts)),
            JobKind::Transfer => Draw::Transfer(draws.transfer_order(accounts)),
        })
        .collect()
}

#[test]
fn test_three_transfer_scenario_on_every_strategy() {
    let script = [
        Draw::Transfer(TransferOrder::new(0, 1, 50u32)),
        // account 1 holds 150 at this point
        Draw::Transfer(TransferOrder::new(1, 2, 200u32)),
        Draw::Transfer(TransferOrder::new(2, 3, 30u32)),
    ];
    for strategy in StrategyKind::ALL {
        // two transfers in the budget: the refused one is not counted
        let config = SimulationConfig::new(4, 2, 0, strategy, 1);
        let outcome = run_scripted(strategy, &config, balances(&[100, 100, 100, 100]), &script);

        assert_eq!(outcome.balances, balances(&[50, 150, 70, 130]).into_balances(), "{strategy}");
        assert_eq!(outcome.transfers(), 2);
        assert_eq!(outcome.failed_transfers(), 1);
        outcome.verify().unwrap();
    }
}

#[test]
fn test_strategies_agree_on_the_same_draws() {
    let script = record_script(2024, 30, 10, 500);
    let initial = AccountStore::random(10, Some(77)).unwrap();

    let results: Vec<Vec<Decimal>> = StrategyKind::ALL
        .into_iter()
        .map(|strategy| {
            let config = SimulationConfig::new(10, 200, 30, strategy, 1);
            let outcome = run_scripted(strategy, &config, initial.clone(), &script);
            outcome.verify().unwrap();
            outcome.balances
        })
        .collect();

    assert_ne!(results[0], initial.balances().to_vec());
    for other in &results[1..] {
        assert_eq!(&results[0], other);
    }
}

#[test]
fn test_concurrent_runs_conserve_money_and_drain_budget() {
    for strategy in StrategyKind::ALL {
        let config = SimulationConfig::new(32, 2_000, 20, strategy, 8).with_seed(3);
        let accounts = AccountStore::random(32, Some(3)).unwrap();
        let before = accounts.total();
        let outcome = run_strategy(strategy, &config, accounts).unwrap();

        assert_eq!(outcome.strategy, strategy);
        assert_eq!(outcome.total_after(), before);
        assert_eq!(outcome.transfers(), 12_800);
        assert_eq!(outcome.queries(), 3_200);
        assert!(outcome.remaining.is_exhausted());
        assert!(outcome.balances.iter().all(|b| *b >= Decimal::ZERO));
        outcome.verify().unwrap();
    }
}

#[test]
fn test_two_hot_accounts_never_deadlock() {
    for strategy in [StrategyKind::FineMutex, StrategyKind::FineRwLock] {
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let config = SimulationConfig::new(2, 5_000, 10, strategy, 32);
            let accounts = balances(&[500, 500]);
            tx.send(run_strategy(strategy, &config, accounts)).ok();
        });
        let outcome = rx
            .recv_timeout(Duration::from_secs(120))
            .unwrap_or_else(|_| panic!("{strategy} did not finish"))
            .unwrap();
        assert_eq!(outcome.total_after(), Decimal::from(1000));
        outcome.verify().unwrap();
    }
}

#[test]
fn test_query_only_workload_leaves_balances_untouched() {
    for strategy in StrategyKind::ALL {
        let config = SimulationConfig::new(1, 300, 100, strategy, 4);
        let outcome = run_strategy(strategy, &config, balances(&[42])).unwrap();
        assert_eq!(outcome.balances, vec![Decimal::from(42)]);
        assert_eq!(outcome.queries(), 1_200);
        assert_eq!(outcome.failed_transfers(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_run_is_conserved_and_exact(
        accounts in 2usize..12,
        per_thread in 1u64..200,
        percentage in 0u8..=100,
        threads in 1usize..6,
        strategy in 0usize..4,
        seed in any::<u64>(),
    ) {
        let strategy = StrategyKind::ALL[strategy];
        let config = SimulationConfig::new(accounts, per_thread, percentage, strategy, threads)
            .with_seed(seed);
        let store = AccountStore::random(accounts, Some(seed)).unwrap();
        let before = store.total();
        let outcome = run_strategy(strategy, &config, store).unwrap();

        prop_assert_eq!(outcome.total_after(), before);
        prop_assert_eq!(outcome.transfers() + outcome.queries(), per_thread * threads as u64);
        prop_assert!(outcome.balances.iter().all(|b| *b >= Decimal::ZERO));
        prop_assert!(outcome.verify().is_ok());
    }
}
