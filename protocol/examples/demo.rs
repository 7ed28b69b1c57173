//! Terminal walkthrough of a Tessera credit account's life.
//!
//! Registers two assets, opens a leveraged account, shocks the price of its
//! debt, and liquidates it into a second account, printing the valuation at
//! every step. Output uses ANSI escape codes.
//!
//! Run with:
//!   cargo run --example demo --release

use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use tessera_protocol::config::{Config, TokenStorageConfig};
use tessera_protocol::external::{
    Ed25519AuthProvider, FixedPriceOracle, FungibleToken, InMemoryToken, ManualClock, PauseFlag,
};
use tessera_protocol::interest::RateCurve;
use tessera_protocol::registry::{FungibleParams, RiskParams};
use tessera_protocol::valuation::PositionValues;
use tessera_protocol::{Address, Amount, Call, CreditLedger, Environment, Wad};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                            {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    TESSERA  --  Credit Account Walkthrough                 {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                            {RESET}");
    println!();
}

fn step(n: u32, title: &str) {
    println!("{BOLD}{CYAN}[{n}]{RESET} {BOLD}{title}{RESET}");
}

fn detail(label: &str, value: impl std::fmt::Display) {
    println!("    {DIM}{label:<22}{RESET} {value}");
}

fn show_values(label: &str, values: &PositionValues) {
    let health = if values.is_liquid() {
        format!("{GREEN}liquid{RESET}")
    } else {
        format!("{RED}underwater{RESET}")
    };
    println!(
        "    {DIM}{label:<22}{RESET} collateral {YELLOW}{}{RESET}  debt {YELLOW}{}{RESET}  {health}",
        values.collateral, values.debt
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn Error>> {
    let started = Instant::now();
    banner();

    let custody = Address::new("tessera:custody");
    let env = Environment {
        custody: custody.clone(),
        pause: Arc::new(PauseFlag::new()),
        clock: Arc::new(ManualClock::new(1_700_000_000)),
        auth: Arc::new(Ed25519AuthProvider::new()),
    };
    let mut ledger = CreditLedger::new(Config::default(), TokenStorageConfig::default(), env)?;

    step(1, "Register assets");
    let usdc_token = Arc::new(InMemoryToken::new());
    let usdc = ledger.register_fungible(FungibleParams {
        symbol: "USDC".into(),
        token: usdc_token.clone(),
        oracle: Arc::new(FixedPriceOracle::new(Wad::ONE)),
        risk: RiskParams {
            collateral_factor: Wad::from_percent(90),
            borrow_factor: Some(Wad::ONE),
        },
        curve: RateCurve::default(),
    })?;
    let weth_token = Arc::new(InMemoryToken::new());
    let weth_oracle = Arc::new(FixedPriceOracle::new(Wad::from_int(2_000)?));
    let weth = ledger.register_fungible(FungibleParams {
        symbol: "WETH".into(),
        token: weth_token.clone(),
        oracle: weth_oracle.clone(),
        risk: RiskParams {
            collateral_factor: Wad::from_percent(80),
            borrow_factor: Some(Wad::ONE),
        },
        curve: RateCurve::default(),
    })?;
    detail("USDC", format!("{usdc}, price 1, cf 0.9"));
    detail("WETH", format!("{weth}, price 2000, cf 0.8"));

    step(2, "Seed WETH liquidity");
    let lp = Address::new("lp");
    let lp_acct = Address::new("acct:lp");
    ledger.open_account(lp_acct.clone(), lp.clone())?;
    weth_token.mint(&lp, 100);
    ledger.deposit(&lp, &lp_acct, weth, Amount::Max)?;
    detail("custody WETH", weth_token.balance_of(&custody));

    step(3, "Alice deposits 10,000 USDC and borrows 4 WETH");
    let alice = Address::new("alice");
    let alice_acct = Address::new("acct:alice");
    ledger.open_account(alice_acct.clone(), alice.clone())?;
    usdc_token.mint(&alice, 10_000);
    let receipt = ledger.execute_batch(
        &alice,
        &alice_acct,
        &[
            Call::Deposit {
                asset: usdc,
                amount: Amount::Max,
            },
            Call::Withdraw {
                asset: weth,
                amount: Amount::Exact(4),
            },
        ],
    )?;
    detail("batch", receipt.batch_id);
    show_values("alice", &receipt.values);

    step(4, "WETH rallies to 2,400");
    weth_oracle.set_price(Wad::from_int(2_400)?);
    show_values("alice", &ledger.risk_adjusted_position_values(&alice_acct)?);

    step(5, "Bob liquidates Alice");
    let bob = Address::new("bob");
    let bob_acct = Address::new("acct:bob");
    ledger.open_account(bob_acct.clone(), bob.clone())?;
    usdc_token.mint(&bob, 50_000);
    ledger.deposit(&bob, &bob_acct, usdc, Amount::Max)?;
    let report = ledger.liquidate(&bob, &bob_acct, &alice_acct)?;
    detail("underwater ratio", report.percent_underwater);
    detail("refund value", report.refund_value);
    for refund in &report.refunds {
        detail("refund paid", format!("{} of {}", refund.amount, refund.asset));
    }
    show_values("alice", &ledger.risk_adjusted_position_values(&alice_acct)?);
    show_values("bob", &ledger.risk_adjusted_position_values(&bob_acct)?);
    detail("alice wallet USDC", usdc_token.balance_of(&alice));

    step(6, "Event log");
    for event in ledger.take_events() {
        detail(event.name(), serde_json::to_string(&event)?);
    }

    println!();
    println!(
        "{DIM}done in {:.2} ms{RESET}",
        started.elapsed().as_secs_f64() * 1_000.0
    );
    Ok(())
}
