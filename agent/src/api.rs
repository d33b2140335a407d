//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the agent's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                       | Description                        |
//! |--------|----------------------------|------------------------------------|
//! | GET    | `/health`                  | Liveness probe                     |
//! | GET    | `/status`                  | Session + ledger status summary    |
//! | POST   | `/session/connect`         | Interactive wallet connect         |
//! | POST   | `/session/disconnect`      | Explicit disconnect                |
//! | POST   | `/session/reconnect`       | Bounded auto-reconnect             |
//! | POST   | `/session/refresh-balance` | Re-read the connected balance      |
//! | GET    | `/transactions`            | Ledger, newest first               |
//! | GET    | `/transactions/:id`        | One record by local id             |
//! | POST   | `/transactions`            | Submit a transfer                  |
//! | POST   | `/transactions/split`      | Submit a split payment             |
//! | POST   | `/links`                   | Encode a payment link              |
//! | GET    | `/links/:token`            | Decode a payment link              |
//! | GET    | `/ws`                      | WebSocket for live session events  |
//! | GET    | `/metrics`                 | Prometheus text exposition         |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use paylink_core::config::DEFAULT_LINK_TTL_SECS;
use paylink_core::link;
use paylink_core::provider::Address;
use paylink_core::session::{ConnectionState, SessionError, StatusLevel, WalletSession};
use paylink_core::tracker::{
    plan_custom, plan_equal, plan_percentage, BulkOutcome, Direction, SplitError,
    TrackerError, TransactionRecord, TransactionTracker,
};
use paylink_core::units::validate_amount;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The agent's reported version string.
    pub version: String,
    /// The wallet session state machine.
    pub session: Arc<WalletSession>,
    /// The transaction ledger and pollers.
    pub tracker: Arc<TransactionTracker>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// When the agent started, for the uptime report.
    pub started_at: DateTime<Utc>,
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
        .route("/session/connect", post(connect_handler))
        .route("/session/disconnect", post(disconnect_handler))
        .route("/session/reconnect", post(reconnect_handler))
        .route("/session/refresh-balance", post(refresh_balance_handler))
        .route("/transactions", get(history_handler).post(send_handler))
        .route("/transactions/split", post(split_handler))
        .route("/transactions/:id", get(transaction_handler))
        .route("/links", post(encode_link_handler))
        .route("/links/:token", get(decode_link_handler))
        .route("/ws", get(ws_handler))
        .route("/metrics", get(metrics_handler))
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
    /// Agent software version.
    pub version: String,
    /// Full session state, including details when connected.
    pub state: ConnectionState,
    /// Coarse display status derived from the state.
    pub status: StatusLevel,
    /// Total records in the ledger.
    pub records: usize,
    /// Records still pending settlement.
    pub pending: usize,
    /// Seconds since the agent started.
    pub uptime_secs: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Request payload for `POST /transactions`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Recipient, 0x-hex address.
    pub to: String,
    /// Amount in whole SHM, decimal string.
    pub amount: String,
    /// Optional free-text annotation.
    pub message: Option<String>,
}

/// Request payload for `POST /transactions/split`. The `mode` tag selects
/// how the shares are computed.
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitRequest {
    /// Divide a total equally, remainder to the first recipient.
    Equal {
        total: String,
        recipients: Vec<String>,
        message: Option<String>,
    },
    /// Divide a total by basis-point shares that must sum to 10000.
    Percentage {
        total: String,
        shares: Vec<ShareSpec>,
        message: Option<String>,
    },
    /// Explicit per-recipient amounts.
    Custom {
        items: Vec<ItemSpec>,
        message: Option<String>,
    },
}

/// One percentage share within a split request.
#[derive(Debug, Deserialize)]
pub struct ShareSpec {
    pub recipient: String,
    pub basis_points: u32,
}

/// One explicit item within a split request.
#[derive(Debug, Deserialize)]
pub struct ItemSpec {
    pub recipient: String,
    pub amount: String,
}

/// Request payload for `POST /links`.
#[derive(Debug, Deserialize)]
pub struct EncodeLinkRequest {
    /// Recipient, 0x-hex address.
    pub recipient: String,
    /// Amount in whole SHM, decimal string.
    pub amount: String,
    /// Optional free-text annotation.
    pub message: Option<String>,
    /// Link lifetime in seconds; defaults to 30.
    pub ttl_secs: Option<u64>,
}

/// Response payload for `POST /links`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkResponse {
    /// The encoded token.
    pub token: String,
    /// Payment page path carrying the token.
    pub payment_path: String,
    /// EIP-681-style URI a wallet can open directly.
    pub one_click_uri: String,
}

/// Response payload for `GET /links/:token`.
#[derive(Debug, Serialize)]
pub struct DecodedLinkResponse {
    /// Verdict on the token's lifetime.
    pub status: link::LinkStatus,
    /// User-facing reason when the status is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Countdown string against the embedded expiry.
    pub time_remaining: String,
    /// The embedded payment descriptor.
    pub descriptor: link::PaymentDescriptor,
}

/// Query parameters for `GET /transactions`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Restrict the ledger to one direction.
    pub direction: Option<Direction>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps session failures onto HTTP statuses. User-driven refusals are
/// client errors; infrastructure failures are gateway errors.
fn session_error_status(e: &SessionError) -> StatusCode {
    match e {
        SessionError::WalletUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::UserRejected(_) => StatusCode::FORBIDDEN,
        SessionError::NoAccounts
        | SessionError::WrongNetwork { .. }
        | SessionError::NotConnected
        | SessionError::ReconnectInProgress => StatusCode::CONFLICT,
        SessionError::NoStoredAccount => StatusCode::NOT_FOUND,
        SessionError::ReconnectExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
        SessionError::ValidationFailed(_) | SessionError::Provider(_) => StatusCode::BAD_GATEWAY,
        SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn tracker_error_status(e: &TrackerError) -> StatusCode {
    match e {
        TrackerError::NotConnected => StatusCode::CONFLICT,
        TrackerError::InvalidAmount(_) | TrackerError::InsufficientBalance { .. } => {
            StatusCode::BAD_REQUEST
        }
        TrackerError::Provider(_) => StatusCode::BAD_GATEWAY,
        TrackerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_address(raw: &str) -> Result<Address, axum::response::Response> {
    Address::parse(raw)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("invalid address: {}", e)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the agent is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.). It
/// intentionally does not check wallet reachability — that belongs in
/// `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — session state, display status, and ledger counters.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session_state = state.session.state();
    let status = StatusLevel::for_session(&session_state);
    let records = state.tracker.history(None).len();
    let pending = state.tracker.pending_count();
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(StatusResponse {
        version: state.version.clone(),
        state: session_state,
        status,
        records,
        pending,
        uptime_secs: uptime,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `POST /session/connect` — interactive wallet connect.
async fn connect_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.connect().await {
        Ok(details) => {
            state.metrics.sessions_connected_total.inc();
            state.metrics.session_connected.set(1);
            Json(details).into_response()
        }
        Err(e) => error_response(session_error_status(&e), e.to_string()),
    }
}

/// `POST /session/disconnect` — explicit disconnect. Idempotent.
async fn disconnect_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.disconnect().await {
        Ok(()) => {
            state.metrics.session_connected.set(0);
            Json(serde_json::json!({ "state": "disconnected" })).into_response()
        }
        Err(e) => error_response(session_error_status(&e), e.to_string()),
    }
}

/// `POST /session/reconnect` — bounded auto-reconnect using the stored
/// account marker.
async fn reconnect_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.auto_reconnect().await {
        Ok(details) => {
            state.metrics.session_connected.set(1);
            Json(details).into_response()
        }
        Err(e) => error_response(session_error_status(&e), e.to_string()),
    }
}

/// `POST /session/refresh-balance` — re-read the connected account's
/// balance with the retry policy.
async fn refresh_balance_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.refresh_balance().await {
        Ok(balance) => Json(serde_json::json!({ "balance": balance })).into_response(),
        Err(e) => error_response(session_error_status(&e), e.to_string()),
    }
}

/// `GET /transactions` — the ledger, newest first, optionally filtered by
/// `?direction=sent|received`.
async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    Json(state.tracker.history(query.direction))
}

/// `GET /transactions/:id` — one ledger record by its local id.
async fn transaction_handler(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.tracker.get(&id) {
        Some(record) => Json(record).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Transaction not found: {}", id),
        ),
    }
}

/// `POST /transactions` — submit a transfer and start tracking it.
async fn send_handler(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> impl IntoResponse {
    let to = match parse_address(&req.to) {
        Ok(address) => address,
        Err(resp) => return resp,
    };

    match state.tracker.send(to, &req.amount, req.message).await {
        Ok(record) => {
            state.metrics.transactions_submitted_total.inc();
            (StatusCode::CREATED, Json(record)).into_response()
        }
        Err(e) => error_response(tracker_error_status(&e), e.to_string()),
    }
}

/// `POST /transactions/split` — plan and execute a split payment.
///
/// Planning failures (bad percentages, bad amounts) reject the whole
/// request up front; execution failures land in the outcome's failure
/// list without aborting the batch.
async fn split_handler(
    State(state): State<AppState>,
    Json(req): Json<SplitRequest>,
) -> impl IntoResponse {
    let (plan, message) = match build_split_plan(req) {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };

    let outcome: BulkOutcome = state.tracker.send_split(&plan, message.as_deref()).await;
    state
        .metrics
        .transactions_submitted_total
        .inc_by(outcome.successes.len() as u64);
    Json(outcome).into_response()
}

fn build_split_plan(
    req: SplitRequest,
) -> Result<(Vec<paylink_core::tracker::SplitItem>, Option<String>), axum::response::Response> {
    let split_status = |e: &SplitError| match e {
        SplitError::NoRecipients
        | SplitError::PercentagesMustTotal { .. }
        | SplitError::Amount(_) => StatusCode::BAD_REQUEST,
    };

    match req {
        SplitRequest::Equal {
            total,
            recipients,
            message,
        } => {
            let recipients: Vec<Address> = recipients
                .iter()
                .map(|raw| parse_address(raw))
                .collect::<Result<_, _>>()?;
            let plan = plan_equal(&total, &recipients)
                .map_err(|e| error_response(split_status(&e), e.to_string()))?;
            Ok((plan, message))
        }
        SplitRequest::Percentage {
            total,
            shares,
            message,
        } => {
            let shares: Vec<(Address, u32)> = shares
                .iter()
                .map(|s| Ok((parse_address(&s.recipient)?, s.basis_points)))
                .collect::<Result<_, axum::response::Response>>()?;
            let plan = plan_percentage(&total, &shares)
                .map_err(|e| error_response(split_status(&e), e.to_string()))?;
            Ok((plan, message))
        }
        SplitRequest::Custom { items, message } => {
            let items: Vec<(Address, String)> = items
                .iter()
                .map(|i| Ok((parse_address(&i.recipient)?, i.amount.clone())))
                .collect::<Result<_, axum::response::Response>>()?;
            let plan = plan_custom(&items)
                .map_err(|e| error_response(split_status(&e), e.to_string()))?;
            Ok((plan, message))
        }
    }
}

/// `POST /links` — encode a payment link token.
async fn encode_link_handler(
    State(state): State<AppState>,
    Json(req): Json<EncodeLinkRequest>,
) -> impl IntoResponse {
    let recipient = match parse_address(&req.recipient) {
        Ok(address) => address,
        Err(resp) => return resp,
    };
    let ttl = req.ttl_secs.unwrap_or(DEFAULT_LINK_TTL_SECS);

    let token = match link::encode(recipient, &req.amount, req.message.clone(), ttl) {
        Ok(token) => token,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    // The amount already passed encode validation; reuse it for the
    // wallet URI's base units.
    let base_units = match validate_amount(&req.amount) {
        Ok(v) => v,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let aux = match link::aux_expiry_token(ttl) {
        Ok(aux) => aux,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    state.metrics.links_encoded_total.inc();
    (
        StatusCode::CREATED,
        Json(LinkResponse {
            payment_path: link::payment_page_url("", &token),
            one_click_uri: link::one_click_uri(&recipient, base_units, Some(&aux)),
            token,
        }),
    )
        .into_response()
}

/// `GET /links/:token` — decode a payment link token.
///
/// Expired and over-age tokens still return 200 with the descriptor and a
/// reason; only a structurally broken token is a 400.
async fn decode_link_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    state.metrics.links_decoded_total.inc();
    match link::decode(&token) {
        Ok(decoded) => {
            let now = Utc::now();
            Json(DecodedLinkResponse {
                status: decoded.status,
                reason: decoded.status.reason().map(String::from),
                time_remaining: link::format_time_remaining(decoded.descriptor.expiry, now),
                descriptor: decoded.descriptor,
            })
            .into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// `GET /metrics` — Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// `GET /ws` — WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded session and tracker events, merged into
/// one stream. The connection is read-only from the server's perspective;
/// client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding session and tracker
/// events until the client disconnects or both channels close.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut session_rx = state.session.subscribe();
    let mut tracker_rx = state.tracker.subscribe();

    loop {
        let payload = tokio::select! {
            event = session_rx.recv() => match event {
                Ok(ev) => serde_json::to_string(&ev).ok(),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("ws subscriber lagged by {} session events", n);
                    None
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            event = tracker_rx.recv() => match event {
                Ok(ev) => serde_json::to_string(&ev).ok(),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("ws subscriber lagged by {} tracker events", n);
                    None
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => continue, // Push-only channel; client messages ignored.
                    _ => break,              // Disconnected or error.
                }
            }
        };

        if let Some(payload) = payload {
            if socket.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    }
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
    use paylink_core::provider::{SimulatedWallet, WalletProvider};
    use paylink_core::store::PayLinkDb;
    use paylink_core::tracker::RecordStatus;
    use paylink_core::units::parse_shm;
    use tower::ServiceExt;

    const ALICE: &str = "0x00000000000000000000000000000000000011aa";
    const BOB: &str = "0x00000000000000000000000000000000000022bb";
    const CAROL: &str = "0x00000000000000000000000000000000000033cc";

    fn addr(raw: &str) -> Address {
        Address::parse(raw).unwrap()
    }

    /// Creates a test AppState over a simulated wallet with a funded
    /// account. The session starts disconnected.
    fn test_app_state(balance_shm: &str) -> (Arc<SimulatedWallet>, AppState) {
        let wallet = Arc::new(SimulatedWallet::with_account(
            addr(ALICE),
            parse_shm(balance_shm).unwrap(),
        ));
        let db = PayLinkDb::open_temporary().expect("temp db");
        let session = WalletSession::new(Arc::clone(&wallet) as Arc<dyn WalletProvider>, db);
        let tracker = TransactionTracker::new(Arc::clone(&session)).expect("tracker");

        let state = AppState {
            version: "0.1.0-test".into(),
            session,
            tracker,
            metrics: Arc::new(crate::metrics::AgentMetrics::new()),
            started_at: Utc::now(),
        };
        (wallet, state)
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

    // -- 1. Health ------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    // -- 2. Status reflects the session ---------------------------------------

    #[tokio::test]
    async fn status_reports_disconnected_then_connected() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.status, StatusLevel::Disconnected);
        assert_eq!(resp.records, 0);

        let (status, _) = post_json(&router, "/session/connect", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, "/status").await;
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.status, StatusLevel::Connected);
        assert!(resp.state.is_connected());
    }

    // -- 3. Connect surfaces wallet refusals ----------------------------------

    #[tokio::test]
    async fn rejected_connect_is_forbidden() {
        let (wallet, state) = test_app_state("10");
        wallet.set_reject_connect(true);
        let router = create_router(state);

        let (status, body) = post_json(&router, "/session/connect", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error, "User rejected the request.");
    }

    // -- 4. Sending requires a connection --------------------------------------

    #[tokio::test]
    async fn send_without_session_is_conflict() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);

        let (status, _) = post_json(
            &router,
            "/transactions",
            serde_json::json!({ "to": BOB, "amount": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    // -- 5. Send, list, fetch ---------------------------------------------------

    #[tokio::test]
    async fn send_creates_a_ledger_record() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);
        post_json(&router, "/session/connect", serde_json::json!({})).await;

        let (status, body) = post_json(
            &router,
            "/transactions",
            serde_json::json!({ "to": BOB, "amount": "2.5", "message": "lunch" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let record: TransactionRecord = serde_json::from_slice(&body).unwrap();
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.amount, "2.5");

        let (status, body) = get(&router, "/transactions").await;
        assert_eq!(status, StatusCode::OK);
        let list: Vec<TransactionRecord> = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, record.id);

        let (status, body) = get(&router, &format!("/transactions/{}", record.id)).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: TransactionRecord = serde_json::from_slice(&body).unwrap();
        assert_eq!(fetched.id, record.id);

        let (status, _) =
            get(&router, &format!("/transactions/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // -- 6. Validation failures are client errors -------------------------------

    #[tokio::test]
    async fn overdraft_and_bad_amounts_are_bad_requests() {
        let (_wallet, state) = test_app_state("5");
        let router = create_router(state);
        post_json(&router, "/session/connect", serde_json::json!({})).await;

        let (status, body) = post_json(
            &router,
            "/transactions",
            serde_json::json!({ "to": BOB, "amount": "99" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("insufficient balance"));

        let (status, _) = post_json(
            &router,
            "/transactions",
            serde_json::json!({ "to": BOB, "amount": "abc" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            &router,
            "/transactions",
            serde_json::json!({ "to": "not-an-address", "amount": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- 7. Split payments -------------------------------------------------------

    #[tokio::test]
    async fn equal_split_pays_every_recipient() {
        let (wallet, state) = test_app_state("10");
        let router = create_router(state);
        post_json(&router, "/session/connect", serde_json::json!({})).await;

        let (status, body) = post_json(
            &router,
            "/transactions/split",
            serde_json::json!({
                "mode": "equal",
                "total": "6",
                "recipients": [BOB, CAROL],
                "message": "dinner"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["successes"].as_array().unwrap().len(), 2);
        assert!(json["failures"].as_array().unwrap().is_empty());

        assert_eq!(wallet.balance_of(&addr(BOB)), parse_shm("3").unwrap());
        assert_eq!(wallet.balance_of(&addr(CAROL)), parse_shm("3").unwrap());
    }

    #[tokio::test]
    async fn bad_percentage_split_is_rejected_up_front() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);
        post_json(&router, "/session/connect", serde_json::json!({})).await;

        let (status, body) = post_json(
            &router,
            "/transactions/split",
            serde_json::json!({
                "mode": "percentage",
                "total": "10",
                "shares": [
                    { "recipient": BOB, "basis_points": 5000 },
                    { "recipient": CAROL, "basis_points": 4000 }
                ]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("percentages must total 100%"));
        // Nothing was attempted.
        let (_, body) = get(&router, "/transactions").await;
        let list: Vec<TransactionRecord> = serde_json::from_slice(&body).unwrap();
        assert!(list.is_empty());
    }

    // -- 8. Payment links ---------------------------------------------------------

    #[tokio::test]
    async fn link_encode_decode_roundtrip() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);

        let (status, body) = post_json(
            &router,
            "/links",
            serde_json::json!({
                "recipient": BOB,
                "amount": "1.5",
                "message": "coffee",
                "ttl_secs": 60
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let link: LinkResponse = serde_json::from_slice(&body).unwrap();
        assert!(link.payment_path.ends_with(&format!("/pay/{}", link.token)));
        assert!(link.one_click_uri.starts_with("ethereum:"));

        let (status, body) = get(&router, &format!("/links/{}", link.token)).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "valid");
        assert_eq!(json["descriptor"]["amount"], "1.5");
        assert_eq!(json["descriptor"]["message"], "coffee");
        assert!(json.get("reason").is_none());
    }

    #[tokio::test]
    async fn malformed_link_token_is_bad_request() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);

        let (status, body) = get(&router, "/links/%21%21not-base64%21%21").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error, "Invalid payment link format");
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_bad_request() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);

        let (status, _) = post_json(
            &router,
            "/links",
            serde_json::json!({ "recipient": BOB, "amount": "1", "ttl_secs": 3600 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- 9. Metrics endpoint -------------------------------------------------------

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);
        post_json(&router, "/session/connect", serde_json::json!({})).await;

        let (status, body) = get(&router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("paylink_sessions_connected_total 1"));
        assert!(text.contains("paylink_session_connected 1"));
    }

    // -- 10. Disconnect is idempotent ----------------------------------------------

    #[tokio::test]
    async fn disconnect_twice_is_fine() {
        let (_wallet, state) = test_app_state("10");
        let router = create_router(state);
        post_json(&router, "/session/connect", serde_json::json!({})).await;

        let (status, _) =
            post_json(&router, "/session/disconnect", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            post_json(&router, "/session/disconnect", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, "/status").await;
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.status, StatusLevel::Disconnected);
    }
}
