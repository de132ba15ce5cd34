//! Live broker adapter (§4.2.2): a PSS-SHA256 signed HTTP client against the
//! exchange's REST API, with short-lived caches for balance/positions/orders
//! and close-then-open smart order splitting.

use super::{Adapter, OrderEvent, OrderEventStatus, OrderRequest, OrderResult, PlaceStatus, TradeRecord};
use crate::core::{AdapterError, Action, MarketState, OpenOrder, OrderId, OrderStatus, Position, Side, SigningError, Ticker};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDateTime;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::SigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Caches survive this long before a fresh round-trip is made (§4.2.2).
const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(500);

pub struct LiveAdapterConfig {
    pub base_url: String,
    pub key_id: String,
    pub private_key_path: std::path::PathBuf,
    pub cache_ttl: Duration,
}

struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

pub struct LiveAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
    key_id: String,
    private_key: RsaPrivateKey,
    cache_ttl: Duration,
    balance_cache: Option<Cached<Decimal>>,
    positions_cache: Option<Cached<HashMap<Ticker, Position>>>,
    orders_cache: HashMap<Ticker, Cached<Vec<OpenOrder>>>,
    /// Maps our process-local `OrderId` to the exchange's order id string.
    broker_order_ids: HashMap<OrderId, String>,
    trades: Vec<TradeRecord>,
    order_events: Vec<OrderEvent>,
}

impl LiveAdapter {
    pub fn connect(config: LiveAdapterConfig) -> Result<Self, SigningError> {
        let pem = std::fs::read_to_string(&config.private_key_path).map_err(|e| SigningError::KeyUnreadable {
            path: config.private_key_path.display().to_string(),
            source: e,
        })?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| SigningError::MalformedKey(e.to_string()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SigningError::SignFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url,
            key_id: config.key_id,
            private_key,
            cache_ttl: if config.cache_ttl.is_zero() { DEFAULT_CACHE_TTL } else { config.cache_ttl },
            balance_cache: None,
            positions_cache: None,
            orders_cache: HashMap::new(),
            broker_order_ids: HashMap::new(),
            trades: Vec::new(),
            order_events: Vec::new(),
        })
    }

    /// `base64(PSS-SHA256(timestamp_ms || method || path))`, the exchange's
    /// required request signature.
    fn sign(&self, method: &str, path: &str, timestamp_ms: i64) -> Result<String, SigningError> {
        let message = format!("{timestamp_ms}{method}{path}");
        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let mut rng = rand::thread_rng();
        let signature = signing_key
            .try_sign_with_rng(&mut rng, message.as_bytes())
            .map_err(|e| SigningError::SignFailed(e.to_string()))?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }

    fn auth_headers(&self, method: &str, path: &str) -> Result<Vec<(&'static str, String)>, AdapterError> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        let signature = self.sign(method, path, timestamp_ms)?;
        Ok(vec![
            ("KALSHI-ACCESS-KEY", self.key_id.clone()),
            ("KALSHI-ACCESS-TIMESTAMP", timestamp_ms.to_string()),
            ("KALSHI-ACCESS-SIGNATURE", signature),
        ])
    }

    fn get(&self, path: &str) -> Result<serde_json::Value, AdapterError> {
        let headers = self.auth_headers("GET", path)?;
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().map_err(|e| AdapterError::BrokerException(e.into()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AdapterError::BrokerHttp { status: status.as_u16(), body });
        }
        resp.json().map_err(|e| AdapterError::BrokerException(e.into()))
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, AdapterError> {
        let headers = self.auth_headers("POST", path)?;
        let mut req = self.client.post(format!("{}{}", self.base_url, path)).json(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().map_err(|e| AdapterError::BrokerException(e.into()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AdapterError::BrokerHttp { status: status.as_u16(), body });
        }
        resp.json().map_err(|e| AdapterError::BrokerException(e.into()))
    }

    fn delete(&self, path: &str) -> Result<(), AdapterError> {
        let headers = self.auth_headers("DELETE", path)?;
        let mut req = self.client.delete(format!("{}{}", self.base_url, path));
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().map_err(|e| AdapterError::BrokerException(e.into()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(AdapterError::BrokerHttp { status, body });
        }
        Ok(())
    }

    fn refresh_balance(&mut self) -> Result<Decimal, AdapterError> {
        #[derive(Deserialize)]
        struct BalanceResp {
            balance_cents: i64,
        }
        let resp: BalanceResp = serde_json::from_value(self.get("/portfolio/balance")?)
            .map_err(|e| AdapterError::BrokerException(e.into()))?;
        let cash = Decimal::from(resp.balance_cents) / Decimal::from(100);
        self.balance_cache = Some(Cached { value: cash, fetched_at: Instant::now() });
        Ok(cash)
    }

    fn refresh_positions(&mut self) -> Result<HashMap<Ticker, Position>, AdapterError> {
        #[derive(Deserialize)]
        struct MarketPosition {
            ticker: String,
            yes_qty: u32,
            no_qty: u32,
            market_exposure_cents: i64,
        }
        #[derive(Deserialize)]
        struct PositionsResp {
            market_positions: Vec<MarketPosition>,
        }
        let resp: PositionsResp = serde_json::from_value(self.get("/portfolio/positions")?)
            .map_err(|e| AdapterError::BrokerException(e.into()))?;
        let positions = resp
            .market_positions
            .into_iter()
            .map(|p| {
                (
                    p.ticker,
                    Position {
                        yes: p.yes_qty,
                        no: p.no_qty,
                        cost: Decimal::from(p.market_exposure_cents) / Decimal::from(100),
                    },
                )
            })
            .collect();
        self.positions_cache = Some(Cached { value: positions, fetched_at: Instant::now() });
        Ok(self.positions_cache.as_ref().unwrap().value.clone())
    }

    fn refresh_orders(&mut self, ticker: &Ticker) -> Result<Vec<OpenOrder>, AdapterError> {
        #[derive(Deserialize)]
        struct ApiOrder {
            order_id: String,
            side: String,
            price_cents: u8,
            remaining_count: u32,
            status: String,
            created_time: String,
        }
        #[derive(Deserialize)]
        struct OrdersResp {
            orders: Vec<ApiOrder>,
        }
        let path = format!("/portfolio/orders?ticker={ticker}&status=resting");
        let resp: OrdersResp =
            serde_json::from_value(self.get(&path)?).map_err(|e| AdapterError::BrokerException(e.into()))?;

        let mut open = Vec::with_capacity(resp.orders.len());
        for o in resp.orders {
            let side = if o.side.eq_ignore_ascii_case("yes") { Side::Yes } else { Side::No };
            let status = match o.status.as_str() {
                "resting" => OrderStatus::Resting,
                "executed" => OrderStatus::Executed,
                "canceled" => OrderStatus::Cancelled,
                "expired" => OrderStatus::Expired,
                _ => OrderStatus::Open,
            };
            let created_time = NaiveDateTime::parse_from_str(&o.created_time, "%Y-%m-%dT%H:%M:%S%.fZ")
                .unwrap_or_else(|_| NaiveDateTime::from_timestamp_opt(0, 0).unwrap());
            let id = OrderId::generate();
            self.broker_order_ids.insert(id, o.order_id);
            open.push(OpenOrder {
                id,
                ticker: ticker.clone(),
                side,
                action: Action::Buy,
                price_cents: o.price_cents,
                remaining_qty: o.remaining_count,
                status,
                created_time,
                ready_at: Some(created_time),
            });
        }
        self.orders_cache.insert(ticker.clone(), Cached { value: open.clone(), fetched_at: Instant::now() });
        Ok(open)
    }

    /// Close-then-open splitting: selling down existing opposite-side
    /// inventory is a separate broker call from opening new exposure, since
    /// the exchange models both as distinct order actions.
    fn place_with_close_then_open(&mut self, req: OrderRequest, t: NaiveDateTime) -> OrderResult {
        let positions = self.positions_cache.as_ref().map(|c| c.value.clone()).unwrap_or_default();
        let held_opposite = positions
            .get(&req.ticker)
            .map(|p| match req.side {
                Side::Yes => p.no,
                Side::No => p.yes,
            })
            .unwrap_or(0);

        let mut remaining = req.qty;
        if held_opposite > 0 {
            let close_qty = held_opposite.min(remaining);
            // The close leg sells the opposite side; its price must be
            // complemented (Kalshi only quotes YES, NO = 100 - YES) before
            // being sent as that side's sell price, not passed through as
            // req.price_cents verbatim.
            let close_price_cents = complement_price(req.price_cents);
            if let Err(e) =
                self.submit_order(&req.ticker, opposite(req.side), Action::Sell, close_price_cents, close_qty, t)
            {
                warn!(ticker = %req.ticker, error = %e, "close leg failed, continuing with open leg only");
            } else {
                remaining -= close_qty;
            }
        }

        if remaining == 0 {
            return OrderResult { ok: true, filled: true, status: PlaceStatus::Executed, order_id: None };
        }

        match self.submit_order(&req.ticker, req.side, Action::Buy, req.price_cents, remaining, t) {
            Ok(result) => result,
            Err(AdapterError::BrokerHttp { status, body }) if status == 400 && body.contains("insufficient") => {
                OrderResult::rejected_cash()
            }
            Err(e) => OrderResult::error(e.to_string()),
        }
    }

    fn submit_order(
        &mut self,
        ticker: &Ticker,
        side: Side,
        action: Action,
        price_cents: u8,
        qty: u32,
        t: NaiveDateTime,
    ) -> Result<OrderResult, AdapterError> {
        #[derive(Deserialize)]
        struct CreateOrderResp {
            order_id: String,
            status: String,
        }
        let body = serde_json::json!({
            "ticker": ticker,
            "side": side.to_string(),
            "action": action.to_string(),
            "type": "limit",
            "count": qty,
            "yes_price": if side == Side::Yes { Some(price_cents) } else { None },
            "no_price": if side == Side::No { Some(price_cents) } else { None },
            "client_order_id": OrderId::generate().to_string(),
        });
        let resp: CreateOrderResp =
            serde_json::from_value(self.post("/portfolio/orders", &body)?).map_err(|e| AdapterError::BrokerException(e.into()))?;

        let id = OrderId::generate();
        self.broker_order_ids.insert(id, resp.order_id.clone());
        let filled = resp.status == "executed";
        self.order_events.push(OrderEvent {
            time: t,
            ticker: ticker.clone(),
            side,
            price_cents,
            qty,
            status: if filled { OrderEventStatus::Executed } else { OrderEventStatus::Accepted },
            filled: if filled { qty } else { 0 },
            order_id: id,
        });
        if filled {
            self.trades.push(TradeRecord {
                time: t,
                action: format!("{}_{}", action, side).to_uppercase(),
                ticker: ticker.clone(),
                price_cents,
                qty,
                fee: crate::core::fees::convex_fee(price_cents, qty),
                cost: Decimal::from(qty) * Decimal::from(price_cents) / Decimal::from(100),
                source: "live".to_string(),
                order_id: id,
                order_time: t,
                fill_time: t,
                fill_delay_s: 0.0,
            });
        }
        Ok(OrderResult {
            ok: true,
            filled,
            status: if filled { PlaceStatus::Executed } else { PlaceStatus::Resting },
            order_id: Some(id),
        })
    }

    /// Where this order sits in the resting queue at its price level, if the
    /// exchange exposes it (§6.1 supplemented feature).
    pub fn get_queue_position(&self, order_id: OrderId) -> Result<Option<u32>, AdapterError> {
        let Some(broker_id) = self.broker_order_ids.get(&order_id) else {
            return Err(AdapterError::UnknownOrder(order_id.to_string()));
        };
        #[derive(Deserialize)]
        struct QueueResp {
            queue_position: Option<u32>,
        }
        let path = format!("/portfolio/orders/{broker_id}/queue_position");
        match self.get(&path) {
            Ok(v) => {
                let resp: QueueResp = serde_json::from_value(v).map_err(|e| AdapterError::BrokerException(e.into()))?;
                Ok(resp.queue_position)
            }
            Err(AdapterError::BrokerHttp { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn opposite(side: Side) -> Side {
    match side {
        Side::Yes => Side::No,
        Side::No => Side::Yes,
    }
}

/// Kalshi only quotes YES prices; a NO price (or a sell-side complement of a
/// YES price) is always `100 - yes_price` (§4.4 step 4).
fn complement_price(price_cents: u8) -> u8 {
    100u8.saturating_sub(price_cents)
}

impl Adapter for LiveAdapter {
    fn process_tick(&mut self, _ticker: &Ticker, _market_state: &MarketState, _t: NaiveDateTime) {
        // The exchange owns the book; nothing to simulate here. This is
        // still the engine's once-per-tick `&mut self` hook, so it doubles
        // as the place to keep the balance/position caches warm, since
        // `get_positions`/`get_cash` are `&self` and can't refresh lazily.
        if self.balance_cache.as_ref().map(|c| !c.fresh(self.cache_ttl)).unwrap_or(true) {
            if let Err(e) = self.refresh_balance() {
                debug!(error = %e, "balance refresh failed");
            }
        }
        if self.positions_cache.as_ref().map(|c| !c.fresh(self.cache_ttl)).unwrap_or(true) {
            if let Err(e) = self.refresh_positions() {
                debug!(error = %e, "positions refresh failed");
            }
        }
    }

    fn get_open_orders(&mut self, ticker: &Ticker, _t: NaiveDateTime) -> Vec<OpenOrder> {
        if let Some(cached) = self.orders_cache.get(ticker) {
            if cached.fresh(self.cache_ttl) {
                return cached.value.clone();
            }
        }
        match self.refresh_orders(ticker) {
            Ok(orders) => orders,
            Err(e) => {
                warn!(%ticker, error = %e, "failed to refresh open orders, returning stale/empty");
                self.orders_cache.get(ticker).map(|c| c.value.clone()).unwrap_or_default()
            }
        }
    }

    fn cancel_order(&mut self, order_id: OrderId) -> Result<(), AdapterError> {
        let Some(broker_id) = self.broker_order_ids.get(&order_id).cloned() else {
            return Err(AdapterError::UnknownOrder(order_id.to_string()));
        };
        self.delete(&format!("/portfolio/orders/{broker_id}"))
    }

    fn place_order(&mut self, order: OrderRequest, _market_state: &MarketState, t: NaiveDateTime) -> OrderResult {
        self.place_with_close_then_open(order, t)
    }

    fn amend_order(&mut self, order_id: OrderId, new_price_cents: u8, new_qty: u32) -> Result<bool, AdapterError> {
        let Some(broker_id) = self.broker_order_ids.get(&order_id).cloned() else {
            return Err(AdapterError::UnknownOrder(order_id.to_string()));
        };
        let body = serde_json::json!({ "price_cents": new_price_cents, "count": new_qty });
        match self.post(&format!("/portfolio/orders/{broker_id}/amend"), &body) {
            Ok(_) => Ok(true),
            Err(AdapterError::BrokerHttp { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn get_positions(&self) -> HashMap<Ticker, Position> {
        self.positions_cache.as_ref().map(|c| c.value.clone()).unwrap_or_default()
    }

    fn get_cash(&self) -> Decimal {
        self.balance_cache.as_ref().map(|c| c.value).unwrap_or(Decimal::ZERO)
    }

    fn queue_position(&self, order_id: OrderId) -> Option<u32> {
        self.get_queue_position(order_id).ok().flatten()
    }

    fn take_trades(&mut self) -> Vec<TradeRecord> {
        std::mem::take(&mut self.trades)
    }

    fn take_order_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.order_events)
    }
}
