//! # REST API
//!
//! Builds the axum router that exposes the ledger over HTTP. All endpoints
//! share application state through axum's `State` extractor; the ledger
//! itself sits behind a [`tokio::sync::RwLock`] so reads run concurrently
//! and batches run one at a time.
//!
//! ## Endpoints
//!
//! | Method | Path                                  | Description                       |
//! |--------|---------------------------------------|-----------------------------------|
//! | GET    | `/health`                             | Liveness probe                    |
//! | GET    | `/status`                             | Ledger summary                    |
//! | GET    | `/assets`                             | All registered assets             |
//! | GET    | `/assets/:id`                         | One asset with its pool           |
//! | GET    | `/accounts/:address`                  | Valuation, positions, NFTs        |
//! | GET    | `/accounts/:address/balances/:asset`  | Signed balance of one asset       |
//! | POST   | `/batches`                            | Submit a signed batch             |
//! | GET    | `/events`                             | Recent ledger events              |
//! | POST   | `/admin/prices`                       | Move an oracle price              |
//! | POST   | `/admin/pause`                        | Flip the pause switch             |

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tessera_protocol::external::{FixedPriceOracle, PauseFlag};
use tessera_protocol::registry::AssetInfo;
use tessera_protocol::types::i128_string;
use tessera_protocol::valuation::{PositionValue, PositionValues};
use tessera_protocol::{
    Address, AssetId, BatchReceipt, CallOutcome, CreditLedger, LedgerError, LedgerEvent, NftId,
    SignedBatch, Wad,
};

use crate::metrics::SharedMetrics;

/// How many events `/events` remembers.
pub const EVENT_BUFFER_CAPACITY: usize = 1_024;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The ledger.
    pub ledger: Arc<RwLock<CreditLedger>>,
    /// Oracles the admin API may move.
    pub oracles: Arc<HashMap<AssetId, Arc<FixedPriceOracle>>>,
    /// Protocol pause switch.
    pub pause: Arc<PauseFlag>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Most recent ledger events, oldest first.
    pub events: Arc<Mutex<VecDeque<LedgerEvent>>>,
}

impl AppState {
    /// Wraps a freshly built ledger. Events already emitted (genesis
    /// registrations) seed the event buffer.
    pub fn new(
        version: impl Into<String>,
        mut ledger: CreditLedger,
        oracles: HashMap<AssetId, Arc<FixedPriceOracle>>,
        pause: Arc<PauseFlag>,
        metrics: SharedMetrics,
    ) -> Self {
        metrics.accounts.set(ledger.account_count() as i64);
        metrics.assets.set(ledger.state().registry().len() as i64);
        let genesis_events = ledger.take_events();
        let state = Self {
            version: version.into(),
            ledger: Arc::new(RwLock::new(ledger)),
            oracles: Arc::new(oracles),
            pause,
            metrics,
            events: Arc::new(Mutex::new(VecDeque::with_capacity(EVENT_BUFFER_CAPACITY))),
        };
        state.record_events(genesis_events);
        state
    }

    fn record_events(&self, events: Vec<LedgerEvent>) {
        let mut buffer = self.events.lock();
        for event in events {
            if buffer.len() == EVENT_BUFFER_CAPACITY {
                buffer.pop_front();
            }
            buffer.push_back(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/assets", get(assets_handler))
        .route("/assets/:id", get(asset_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/accounts/:address/balances/:asset", get(balance_handler))
        .route("/batches", post(batch_handler))
        .route("/events", get(events_handler))
        .route("/admin/prices", post(price_handler))
        .route("/admin/pause", post(pause_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub paused: bool,
    /// Ledger clock, seconds.
    pub now: u64,
    pub accounts: usize,
    pub assets: usize,
    pub custody: Address,
    pub treasury: Address,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    pub owner: Address,
    /// Risk-adjusted totals.
    pub values: PositionValues,
    /// Whether the account passes the solvency guard right now.
    pub liquid: bool,
    pub positions: Vec<PositionValue>,
    pub nfts: Vec<NftId>,
    pub liquidation_strategy: Option<Address>,
}

/// Response payload for `GET /accounts/:address/balances/:asset`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account: Address,
    pub asset: AssetId,
    /// Positive is collateral, negative is debt.
    #[serde(with = "i128_string")]
    pub balance: i128,
}

/// Body of `POST /admin/prices`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub asset: AssetId,
    /// Quote value of one whole token.
    pub price: Wad,
}

/// Body of `POST /admin/pause` and its response.
#[derive(Debug, Serialize, Deserialize)]
pub struct PauseUpdate {
    pub paused: bool,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error kind, see [`LedgerError::kind`].
    pub kind: String,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn not_found(kind: &str, error: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse {
                error,
                kind: kind.into(),
            },
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::UnknownAsset(_)
            | LedgerError::UnknownCollection(_)
            | LedgerError::UnknownAccount(_) => StatusCode::NOT_FOUND,
            LedgerError::Auth(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            LedgerError::Paused => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::DeadlineExpired { .. }
            | LedgerError::NonceAlreadyUsed { .. }
            | LedgerError::AccountExists(_) => StatusCode::CONFLICT,
            LedgerError::Math(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                kind: err.kind().into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let ledger = state.ledger.read().await;
    Json(StatusResponse {
        version: state.version.clone(),
        paused: ledger.is_paused(),
        now: ledger.now(),
        accounts: ledger.account_count(),
        assets: ledger.state().registry().len(),
        custody: ledger.custody().clone(),
        treasury: ledger.config().treasury_account.clone(),
    })
}

async fn assets_handler(State(state): State<AppState>) -> Result<Json<Vec<AssetInfo>>, ApiError> {
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.assets()?))
}

async fn asset_handler(
    Path(id): Path<u16>,
    State(state): State<AppState>,
) -> Result<Json<AssetInfo>, ApiError> {
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.asset_info(AssetId(id))?))
}

/// `GET /accounts/:address`: valuation at current prices.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let address = Address::new(address);
    let ledger = state.ledger.read().await;
    let owner = ledger.owner_of(&address)?;
    let valuation = ledger.valuation(&address)?;
    Ok(Json(AccountResponse {
        liquid: ledger.is_liquid(&address)?,
        nfts: ledger.held_nfts(&address)?,
        liquidation_strategy: ledger.liquidation_strategy(&address)?,
        values: valuation.values,
        positions: valuation.positions,
        owner,
        address,
    }))
}

async fn balance_handler(
    Path((address, asset)): Path<(String, u16)>,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = Address::new(address);
    let asset = AssetId(asset);
    let balance = state.ledger.read().await.balance_of(asset, &account)?;
    Ok(Json(BalanceResponse {
        account,
        asset,
        balance,
    }))
}

/// `POST /batches`: executes a signed batch and records its metrics.
async fn batch_handler(
    State(state): State<AppState>,
    Json(batch): Json<SignedBatch>,
) -> Result<Json<BatchReceipt>, ApiError> {
    let started = Instant::now();
    let mut ledger = state.ledger.write().await;
    let result = ledger.execute_signed_batch(&batch);
    state
        .metrics
        .batch_latency_seconds
        .observe(started.elapsed().as_secs_f64());
    let events = ledger.take_events();
    state.metrics.accounts.set(ledger.account_count() as i64);
    drop(ledger);
    state.record_events(events);

    match result {
        Ok(receipt) => {
            state.metrics.batches_committed_total.inc();
            let liquidations = receipt
                .outcomes
                .iter()
                .filter(|o| matches!(o, CallOutcome::Liquidated(_)))
                .count();
            state.metrics.liquidations_total.inc_by(liquidations as u64);
            Ok(Json(receipt))
        }
        Err(e) => {
            state
                .metrics
                .batches_rejected_total
                .with_label_values(&[e.kind()])
                .inc();
            Err(e.into())
        }
    }
}

async fn events_handler(State(state): State<AppState>) -> Json<Vec<LedgerEvent>> {
    Json(state.events.lock().iter().cloned().collect())
}

/// `POST /admin/prices`: sets the price an in-memory oracle reports.
async fn price_handler(
    State(state): State<AppState>,
    Json(update): Json<PriceUpdate>,
) -> Result<Json<PriceUpdate>, ApiError> {
    let Some(oracle) = state.oracles.get(&update.asset) else {
        return Err(ApiError::not_found(
            "unknown_asset",
            format!("no oracle for {}", update.asset),
        ));
    };
    oracle.set_price(update.price);
    tracing::info!(asset = %update.asset, price = %update.price, "oracle price updated");
    Ok(Json(update))
}

async fn pause_handler(
    State(state): State<AppState>,
    Json(update): Json<PauseUpdate>,
) -> Json<PauseUpdate> {
    state.pause.set(update.paused);
    tracing::warn!(paused = update.paused, "pause switch flipped");
    Json(update)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tessera_protocol::crypto::Keypair;
    use tessera_protocol::external::ManualClock;
    use tessera_protocol::{Amount, BatchAuthorization, Call};
    use tower::ServiceExt;

    use crate::genesis::Genesis;
    use crate::metrics::NodeMetrics;

    const NOW: u64 = 1_700_000_000;
    const USDC: AssetId = AssetId(0);
    const WETH: AssetId = AssetId(1);

    fn test_app_state() -> AppState {
        let built = Genesis::devnet()
            .build(Arc::new(ManualClock::new(NOW)))
            .unwrap();
        AppState::new(
            "0.1.0-test",
            built.ledger,
            built.oracles,
            built.pause,
            Arc::new(NodeMetrics::new().unwrap()),
        )
    }

    fn signed(seed: u8, account: &str, nonce: u64, calls: Vec<Call>) -> serde_json::Value {
        let batch = BatchAuthorization {
            account: Address::new(account),
            calls,
            nonce,
            deadline: NOW + 60,
        }
        .sign(&Keypair::from_seed(&[seed; 32]))
        .unwrap();
        serde_json::to_value(batch).unwrap()
    }

    fn deposit(asset: AssetId, amount: u128) -> Call {
        Call::Deposit {
            asset,
            amount: Amount::Exact(amount),
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_genesis_ledger() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let status: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(status.version, "0.1.0-test");
        assert!(!status.paused);
        assert_eq!(status.now, NOW);
        assert_eq!(status.accounts, 3);
        assert_eq!(status.assets, 3);
    }

    #[tokio::test]
    async fn assets_are_listed_and_addressable() {
        let router = create_router(test_app_state());

        let (status, body) = get(&router, "/assets").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body).as_array().unwrap().len(), 3);

        let (status, body) = get(&router, "/assets/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["symbol"], "WETH");

        let (status, body) = get(&router, "/assets/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["kind"], "unknown_asset");
    }

    #[tokio::test]
    async fn unknown_account_returns_404() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/accounts/acct:nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["kind"], "unknown_account");
    }

    #[tokio::test]
    async fn signed_batch_commits_once() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let batch = signed(1, "acct:alice", 7, vec![deposit(USDC, 1_000)]);

        let (status, body) = post_json(&router, "/batches", batch.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let receipt: BatchReceipt = serde_json::from_slice(&body).unwrap();
        assert_eq!(receipt.outcomes, vec![CallOutcome::Moved { amount: 1_000 }]);

        let (status, body) = get(&router, "/accounts/acct:alice/balances/0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["balance"], "1000");

        let (status, body) = post_json(&router, "/batches", batch).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json(&body)["kind"], "nonce_already_used");

        let metrics = state.metrics.encode().unwrap();
        assert!(metrics.contains("tessera_batches_committed_total 1"));
        assert!(metrics.contains("tessera_batches_rejected_total{kind=\"nonce_already_used\"} 1"));
    }

    #[tokio::test]
    async fn batch_signed_by_someone_else_is_unauthorized() {
        let router = create_router(test_app_state());
        // Bob's key over Alice's account.
        let batch = signed(2, "acct:alice", 1, vec![deposit(USDC, 1)]);
        let (status, body) = post_json(&router, "/batches", batch).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json(&body)["kind"], "auth");
    }

    #[tokio::test]
    async fn insolvent_batch_is_unprocessable() {
        let router = create_router(test_app_state());
        let (status, _) = post_json(&router, "/batches", signed(2, "acct:bob", 1, vec![deposit(USDC, 1_000)])).await;
        assert_eq!(status, StatusCode::OK);

        let borrow = Call::Withdraw {
            asset: USDC,
            amount: Amount::Exact(10),
        };
        let (status, body) = post_json(&router, "/batches", signed(1, "acct:alice", 1, vec![borrow])).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(&body)["kind"], "insolvent");
    }

    #[tokio::test]
    async fn price_move_makes_account_illiquid() {
        let router = create_router(test_app_state());

        let (status, _) = post_json(&router, "/batches", signed(2, "acct:bob", 1, vec![deposit(WETH, 10)])).await;
        assert_eq!(status, StatusCode::OK);

        // 9_000 of collateral against 4 * 2_000 * 1.1 = 8_800 of debt.
        let calls = vec![
            deposit(USDC, 10_000),
            Call::Withdraw {
                asset: WETH,
                amount: Amount::Exact(4),
            },
        ];
        let (status, _) = post_json(&router, "/batches", signed(1, "acct:alice", 1, calls)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, "/accounts/acct:alice").await;
        let account: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert!(account.liquid);
        assert_eq!(account.positions.len(), 2);

        let update = serde_json::json!({ "asset": 1, "price": "2100" });
        let (status, _) = post_json(&router, "/admin/prices", update).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, "/accounts/acct:alice").await;
        let account: AccountResponse = serde_json::from_slice(&body).unwrap();
        assert!(!account.liquid);
        assert!(account.values.is_liquidatable());
    }

    #[tokio::test]
    async fn price_update_for_unknown_asset_is_404() {
        let router = create_router(test_app_state());
        let update = serde_json::json!({ "asset": 42, "price": "1" });
        let (status, _) = post_json(&router, "/admin/prices", update).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn paused_ledger_rejects_batches() {
        let state = test_app_state();
        let router = create_router(state.clone());

        let (status, _) = post_json(&router, "/admin/pause", serde_json::json!({ "paused": true })).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(&router, "/batches", signed(1, "acct:alice", 1, vec![deposit(USDC, 1)])).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(&body)["kind"], "paused");

        let (_, body) = get(&router, "/status").await;
        assert_eq!(json(&body)["paused"], true);
    }

    #[tokio::test]
    async fn events_include_genesis_and_batches() {
        let router = create_router(test_app_state());
        post_json(&router, "/batches", signed(1, "acct:alice", 1, vec![deposit(USDC, 5)])).await;

        let (status, body) = get(&router, "/events").await;
        assert_eq!(status, StatusCode::OK);
        let types: Vec<String> = json(&body)
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("account_opened"));
        assert!(types.contains(&"asset_registered".to_string()));
        assert_eq!(types.last().map(String::as_str), Some("batch_executed"));
    }

    #[test]
    fn event_buffer_is_bounded() {
        let state = test_app_state();
        let filler = state.events.lock().front().cloned().unwrap();
        state.record_events(vec![filler; EVENT_BUFFER_CAPACITY + 10]);
        assert_eq!(state.events.lock().len(), EVENT_BUFFER_CAPACITY);
    }
}
