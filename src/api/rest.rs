// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Reads are public. Every endpoint that
// moves balances or changes session state requires a valid Bearer token
// checked via the `AuthBearer` extractor.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::balance_store::BalanceStore;
use crate::deposit::{deposit_address, record_deposit, DepositNotice};
use crate::exchange::{ExchangeError, ExchangeQuote};
use crate::history::{ActivityKind, ActivityStatus};
use crate::indicators::{compute_overlays, rsi_zone, IndicatorSpec, RsiZone};
use crate::market_data::{Candle, CandleKey};
use crate::mining::{MiningPlan, SETTLEMENT_SYMBOL};
use crate::navigation::{NavOutcome, View, ViewContext};
use crate::options::{OpenTrade, OptionTrade, TradeStatus};
use crate::session::AppCommand;
use crate::transaction_pin::TransactionPin;
use crate::types::{is_usable_price, ActiveSide};
use crate::withdrawal::WithdrawalRequest;

const DEFAULT_CANDLE_LIMIT: usize = 200;

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public reads ────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/assets", get(assets))
        .route("/api/v1/exchange/quote", post(exchange_quote))
        .route("/api/v1/candles/:symbol", get(candles))
        .route("/api/v1/indicators", post(indicators))
        .route("/api/v1/deposits/address/:asset_id", get(deposit_address_for))
        .route("/api/v1/mining/plans", get(mining_plans))
        .route("/api/v1/mining/orders", get(mining_orders))
        .route("/api/v1/options/terms", get(options_terms))
        .route("/api/v1/options/trades", get(options_trades))
        .route("/api/v1/history", get(history))
        .route("/api/v1/session", get(session))
        // ── Authenticated mutations ─────────────────────────────────
        .route("/api/v1/exchange/execute", post(exchange_execute))
        .route("/api/v1/transaction-pin", post(set_transaction_pin))
        .route("/api/v1/withdrawals", post(submit_withdrawal))
        .route("/api/v1/deposits", post(submit_deposit))
        .route("/api/v1/mining/investments", post(mining_invest))
        .route("/api/v1/options/trades", post(open_option))
        .route("/api/v1/session/commands", post(session_command))
        .route("/api/v1/navigation", post(navigate))
        .route("/api/v1/navigation/back", post(navigate_back))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

/// Log a rejected mutation and keep it in the recent error ring.
fn rejected(state: &AppState, err: impl Into<ApiError>) -> ApiError {
    let err = err.into();
    warn!(code = err.code, status = %err.status, error = %err.message, "request rejected");
    state.push_error_with_code(err.message.clone(), Some(err.code.to_string()));
    err
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: Utc::now().timestamp_millis(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    };
    Json(resp)
}

async fn assets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.portfolio())
}

// =============================================================================
// Exchange
// =============================================================================

#[derive(Deserialize)]
struct QuoteRequest {
    from_id: String,
    to_id: String,
    amount: f64,
    #[serde(default)]
    active_side: ActiveSide,
}

#[derive(Serialize)]
struct QuoteResponse {
    #[serde(flatten)]
    quote: ExchangeQuote,
    from_display: String,
    to_display: String,
    convertible: bool,
}

async fn exchange_quote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuoteRequest>,
) -> ApiResult<QuoteResponse> {
    let quote = match state
        .exchange
        .quote_ids(&req.from_id, &req.to_id, req.amount, req.active_side)
    {
        Ok(q) => q,
        Err(ExchangeError::ZeroPrice) | Err(ExchangeError::InvalidAmount) => {
            ExchangeQuote::unconvertible()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(QuoteResponse {
        from_display: quote.from_display(),
        to_display: quote.to_display(),
        convertible: quote.is_convertible(),
        quote,
    }))
}

#[derive(Deserialize)]
struct ExecuteRequest {
    from_id: String,
    to_id: String,
    from_amount: f64,
}

async fn exchange_execute(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fill = state
        .exchange
        .execute(&req.from_id, &req.to_id, req.from_amount)
        .map_err(|e| rejected(&state, e))?;

    let from_symbol = state
        .store
        .get_asset(&req.from_id)
        .map(|a| a.symbol)
        .unwrap_or_default();
    let to_symbol = state
        .store
        .get_asset(&req.to_id)
        .map(|a| a.symbol)
        .unwrap_or_default();
    state.activity.record(
        ActivityKind::Exchange,
        &from_symbol,
        fill.from_amount,
        ActivityStatus::Completed,
        format!("{from_symbol} -> {} {to_symbol}", fill.to_amount),
    );
    state.increment_version();

    Ok(Json(fill))
}

// =============================================================================
// Market data & indicators
// =============================================================================

#[derive(Deserialize)]
struct CandleQuery {
    interval: Option<String>,
    limit: Option<usize>,
}

fn candles_for(state: &AppState, symbol: &str, interval: Option<&str>, limit: Option<usize>) -> Vec<Candle> {
    let interval = interval.unwrap_or_else(|| state.feed.interval());
    let key = CandleKey::new(symbol, interval);
    state
        .candle_buffer
        .get(&key, limit.unwrap_or(DEFAULT_CANDLE_LIMIT))
}

async fn candles(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(q): Query<CandleQuery>,
) -> impl IntoResponse {
    Json(candles_for(&state, &symbol, q.interval.as_deref(), q.limit))
}

#[derive(Deserialize)]
struct IndicatorRequest {
    symbol: String,
    interval: Option<String>,
    limit: Option<usize>,
    /// Falls back to the configured default overlays when absent.
    indicators: Option<Vec<IndicatorSpec>>,
}

#[derive(Serialize)]
struct LatestRsi {
    value: f64,
    zone: RsiZone,
}

#[derive(Serialize)]
struct IndicatorResponse {
    symbol: String,
    candles: usize,
    overlays: Vec<crate::indicators::Overlay>,
    latest_rsi: Option<LatestRsi>,
}

async fn indicators(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndicatorRequest>,
) -> impl IntoResponse {
    let specs = req
        .indicators
        .unwrap_or_else(|| state.runtime_config.read().default_indicators.clone());
    let series = candles_for(&state, &req.symbol, req.interval.as_deref(), req.limit);
    let overlays = compute_overlays(&series, &specs);

    let latest_rsi = overlays
        .iter()
        .find(|o| matches!(o.spec, IndicatorSpec::Rsi { .. }))
        .and_then(|o| o.points.last())
        .map(|p| LatestRsi {
            value: p.value,
            zone: rsi_zone(p.value),
        });

    Json(IndicatorResponse {
        symbol: req.symbol.to_uppercase(),
        candles: series.len(),
        overlays,
        latest_rsi,
    })
}

// =============================================================================
// Withdrawals & transaction PIN
// =============================================================================

#[derive(Deserialize)]
struct PinRequest {
    password: String,
    confirm: String,
}

async fn set_transaction_pin(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pin = TransactionPin::set(&req.password, &req.confirm).map_err(|e| rejected(&state, e))?;
    state.withdrawals.set_pin(pin);
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn submit_withdrawal(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<WithdrawalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .withdrawals
        .submit(state.store.as_ref(), &req)
        .map_err(|e| rejected(&state, e))?;

    state.activity.record(
        ActivityKind::Withdrawal,
        &receipt.asset,
        receipt.amount,
        ActivityStatus::Completed,
        receipt.tx_id.clone(),
    );
    state.increment_version();
    Ok(Json(receipt))
}

// =============================================================================
// Deposits
// =============================================================================

#[derive(Serialize)]
struct DepositAddress {
    asset_id: String,
    symbol: String,
    address: String,
}

async fn deposit_address_for(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> ApiResult<DepositAddress> {
    let asset = state
        .store
        .get_asset(&asset_id)
        .ok_or_else(|| ApiError::not_found("unknown_asset", format!("unknown asset: {asset_id}")))?;
    Ok(Json(DepositAddress {
        address: deposit_address(&asset.symbol),
        asset_id: asset.id,
        symbol: asset.symbol,
    }))
}

async fn submit_deposit(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(notice): Json<DepositNotice>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = record_deposit(state.store.as_ref(), &state.activity, &notice)
        .map_err(|e| rejected(&state, e))?;
    state.increment_version();
    Ok(Json(ticket))
}

// =============================================================================
// Mining
// =============================================================================

#[derive(Serialize)]
struct PlanView {
    #[serde(flatten)]
    plan: MiningPlan,
    daily_revenue: f64,
}

async fn mining_plans(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let plans: Vec<PlanView> = state
        .mining
        .plans()
        .iter()
        .map(|p| PlanView {
            daily_revenue: p.daily_revenue(),
            plan: p.clone(),
        })
        .collect();
    Json(plans)
}

#[derive(Deserialize)]
struct InvestRequest {
    plan_id: String,
    amount: f64,
    #[serde(default)]
    accepted_terms: bool,
}

async fn mining_invest(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let investment = state
        .mining
        .invest(
            state.store.as_ref(),
            &req.plan_id,
            req.amount,
            req.accepted_terms,
            Utc::now().timestamp(),
        )
        .map_err(|e| rejected(&state, e))?;

    state.activity.record(
        ActivityKind::Mining,
        SETTLEMENT_SYMBOL,
        investment.amount,
        ActivityStatus::Pending,
        investment.plan_id.clone(),
    );
    state.increment_version();
    Ok(Json(investment))
}

async fn mining_orders(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.mining.orders(Utc::now().timestamp()))
}

// =============================================================================
// Options
// =============================================================================

async fn options_terms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.options.terms().to_vec())
}

#[derive(Serialize)]
struct TradeView {
    #[serde(flatten)]
    trade: OptionTrade,
    remaining_secs: i64,
    /// Live P/L at the current mark; only present while the trade runs.
    projected_pnl: Option<f64>,
}

async fn options_trades(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now().timestamp();
    let views: Vec<TradeView> = state
        .options
        .trades()
        .into_iter()
        .rev()
        .map(|trade| {
            let mark = state
                .store
                .find_by_symbol(&trade.symbol)
                .map(|a| a.price_usd)
                .filter(|p| is_usable_price(*p));
            let projected_pnl = match (trade.status, mark) {
                (TradeStatus::Active, Some(price)) => Some(trade.projected_pnl(price)),
                _ => None,
            };
            TradeView {
                remaining_secs: trade.remaining_secs(now),
                projected_pnl,
                trade,
            }
        })
        .collect();
    Json(views)
}

async fn open_option(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenTrade>,
) -> Result<impl IntoResponse, ApiError> {
    let trade = state
        .options
        .open(state.store.as_ref(), &req, Utc::now().timestamp())
        .map_err(|e| rejected(&state, e))?;

    state.activity.record(
        ActivityKind::Option,
        SETTLEMENT_SYMBOL,
        trade.amount,
        ActivityStatus::Pending,
        format!("{}/{} {:?}", trade.symbol, SETTLEMENT_SYMBOL, trade.direction),
    );
    state.increment_version();
    Ok(Json(trade))
}

// =============================================================================
// History
// =============================================================================

#[derive(Deserialize)]
struct HistoryQuery {
    kind: Option<ActivityKind>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> impl IntoResponse {
    let mut records = state.activity.list(q.kind);
    records.reverse();
    Json(records)
}

// =============================================================================
// Session & navigation
// =============================================================================

#[derive(Serialize)]
struct SessionResponse {
    session: crate::session::SessionState,
    navigation: Vec<crate::navigation::NavEntry>,
    state_version: u64,
}

fn session_snapshot(state: &AppState) -> SessionResponse {
    SessionResponse {
        session: state.session.read().clone(),
        navigation: state.navigation.read().entries().to_vec(),
        state_version: state.current_state_version(),
    }
}

async fn session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(session_snapshot(&state))
}

async fn session_command(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(command): Json<AppCommand>,
) -> impl IntoResponse {
    state.session.write().apply(command);
    if command == AppCommand::Logout {
        *state.navigation.write() = Default::default();
    }
    state.increment_version();
    Json(session_snapshot(&state))
}

#[derive(Deserialize)]
struct NavigateRequest {
    view: View,
    #[serde(default)]
    context: ViewContext,
}

#[derive(Serialize)]
struct NavigateResponse {
    outcome: NavOutcome,
    #[serde(flatten)]
    snapshot: SessionResponse,
}

async fn navigate(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NavigateRequest>,
) -> impl IntoResponse {
    let outcome = state.navigation.write().navigate(req.view, req.context);
    if outcome != NavOutcome::Unchanged {
        info!(view = ?req.view, ?outcome, "navigated");
        state.increment_version();
    }
    Json(NavigateResponse {
        outcome,
        snapshot: session_snapshot(&state),
    })
}

async fn navigate_back(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let popped = state.navigation.write().back();
    if popped {
        state.increment_version();
    }
    Json(serde_json::json!({
        "popped": popped,
        "navigation": state.navigation.read().entries(),
    }))
}
