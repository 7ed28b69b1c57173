// Valuation and batch benchmarks for the Tessera protocol.
//
// Covers risk-adjusted valuation at various position counts, a single
// accrual step, and a full deposit-then-withdraw batch (state clone,
// external transfers, solvency guard, commit).

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tessera_protocol::config::{Config, TokenStorageConfig, SECONDS_PER_YEAR};
use tessera_protocol::external::{
    Ed25519AuthProvider, FixedPriceOracle, InMemoryToken, ManualClock, PauseFlag,
};
use tessera_protocol::interest::{accrue, PoolState, RateCurve};
use tessera_protocol::registry::{FungibleParams, RiskParams};
use tessera_protocol::{Address, Amount, AssetId, Call, CreditLedger, Environment, Wad};

/// A ledger with `n` fungible assets and one account holding all of them.
fn setup_ledger(n: usize) -> (CreditLedger, Vec<AssetId>, Address, Address) {
    let env = Environment {
        custody: Address::new("tessera:custody"),
        pause: Arc::new(PauseFlag::new()),
        clock: Arc::new(ManualClock::new(1_700_000_000)),
        auth: Arc::new(Ed25519AuthProvider::new()),
    };
    let mut ledger =
        CreditLedger::new(Config::default(), TokenStorageConfig::default(), env).unwrap();
    let owner = Address::new("bench");
    let account = Address::new("acct:bench");
    ledger.open_account(account.clone(), owner.clone()).unwrap();

    let mut assets = Vec::with_capacity(n);
    for i in 0..n {
        let token = Arc::new(InMemoryToken::new());
        token.mint(&owner, 1_000_000_000);
        let asset = ledger
            .register_fungible(FungibleParams {
                symbol: format!("TKN{i}"),
                token,
                oracle: Arc::new(FixedPriceOracle::new(Wad::from_int(i as u128 + 1).unwrap())),
                risk: RiskParams {
                    collateral_factor: Wad::from_percent(75),
                    borrow_factor: Some(Wad::ONE),
                },
                curve: RateCurve::default(),
            })
            .unwrap();
        ledger
            .deposit(&owner, &account, asset, Amount::Exact(1_000_000))
            .unwrap();
        assets.push(asset);
    }
    (ledger, assets, owner, account)
}

fn bench_valuation(c: &mut Criterion) {
    let mut group = c.benchmark_group("valuation/risk_adjusted");

    for size in [1, 10, 25, 50] {
        let (ledger, _, _, account) = setup_ledger(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &account, |b, account| {
            b.iter(|| ledger.risk_adjusted_position_values(account).unwrap());
        });
    }

    group.finish();
}

fn bench_accrue(c: &mut Criterion) {
    let curve = RateCurve::default();
    let mut pool = PoolState::new(0);
    pool.total_collateral_shares = 1_000_000_000_000;
    pool.total_debt_shares = 650_000_000_000;

    c.bench_function("interest/accrue_one_year", |b| {
        b.iter(|| {
            let mut p = pool.clone();
            accrue(&mut p, &curve, SECONDS_PER_YEAR, Wad::from_bps(500)).unwrap()
        });
    });
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch/deposit_withdraw");

    for size in [1, 10, 50] {
        let (mut ledger, assets, owner, account) = setup_ledger(size);
        let calls = [
            Call::Deposit {
                asset: assets[0],
                amount: Amount::Exact(1_000),
            },
            Call::Withdraw {
                asset: assets[0],
                amount: Amount::Exact(1_000),
            },
        ];
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                ledger.execute_batch(&owner, &account, &calls).unwrap();
                ledger.take_events()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_valuation, bench_accrue, bench_batch);
criterion_main!(benches);
