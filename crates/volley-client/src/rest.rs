//! Venue REST client.
//!
//! One `reqwest::Client` (and its connection pool) is shared by every account
//! and every in-flight request. The pool must be large enough for the burst:
//! a pool that is too small queues requests and flattens the flood loop.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use volley_clock::TimeProbe;
use volley_core::{
    Account, BoxFuture, ClientOrderId, OrderAck, OrderIntent, TransportResult, VenueTransport,
};

use crate::error::{ClientError, ClientResult};
use crate::signer::{canonical_query, sign_query};

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const TIME_UNIT_HEADER: &str = "X-MBX-TIME-UNIT";

/// Source of request timestamps (epoch ms).
pub type TimestampFn = Arc<dyn Fn() -> i64 + Send + Sync>;

/// REST endpoint and connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_time_path")]
    pub time_path: String,
    #[serde(default = "default_order_path")]
    pub order_path: String,
    #[serde(default = "default_open_orders_path")]
    pub open_orders_path: String,
    #[serde(default = "default_account_path")]
    pub account_path: String,
    /// Per-request timeout (ms). Default: 10000.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Idle connections kept per host. Default: 512.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    /// Optional `recvWindow` sent with every signed request (ms).
    #[serde(default)]
    pub recv_window_ms: Option<u64>,
    /// Ask the venue for microsecond timestamps in responses.
    #[serde(default)]
    pub microsecond_timestamps: bool,
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_time_path() -> String {
    "/api/v3/time".to_string()
}

fn default_order_path() -> String {
    "/api/v3/order".to_string()
}

fn default_open_orders_path() -> String {
    "/api/v3/openOrders".to_string()
}

fn default_account_path() -> String {
    "/api/v3/account".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_pool_max_idle_per_host() -> usize {
    512
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            time_path: default_time_path(),
            order_path: default_order_path(),
            open_orders_path: default_open_orders_path(),
            account_path: default_account_path(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            recv_window_ms: None,
            microsecond_timestamps: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTimeResponse {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderResponse {
    order_id: i64,
    #[serde(default)]
    transact_time: i64,
}

/// An order resting on the book.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub symbol: String,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: String,
    pub price: Decimal,
    pub orig_qty: Decimal,
    pub side: String,
    pub status: String,
}

/// Free and locked amount of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl AssetBalance {
    fn zero(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            free: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AssetBalance>,
}

/// Signed REST client shared by all accounts.
#[derive(Clone)]
pub struct VenueClient {
    http: Client,
    config: ClientConfig,
    timestamp_fn: TimestampFn,
}

impl VenueClient {
    /// Build the client and its connection pool.
    ///
    /// Request timestamps come from the local clock until
    /// [`with_timestamp_fn`](Self::with_timestamp_fn) replaces it.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ClientError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            timestamp_fn: Arc::new(|| chrono::Utc::now().timestamp_millis()),
        })
    }

    /// Use `timestamp_fn` for the `timestamp` parameter of signed requests.
    #[must_use]
    pub fn with_timestamp_fn(mut self, timestamp_fn: TimestampFn) -> Self {
        self.timestamp_fn = timestamp_fn;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Venue time from the unsigned time endpoint.
    pub async fn fetch_server_time(&self) -> ClientResult<i64> {
        let url = format!("{}{}", self.config.rest_url, self.config.time_path);
        let response = self.http.get(url).send().await?;
        let parsed: ServerTimeResponse = decode(&read_body(response).await?)?;
        Ok(parsed.server_time)
    }

    /// Signed call to the time endpoint.
    ///
    /// Exercises the account's credentials and warms the pooled connection.
    pub async fn signed_time(&self, account: &Account) -> ClientResult<i64> {
        let body = self
            .send_signed(Method::GET, &self.config.time_path, account, Vec::new())
            .await?;
        let parsed: ServerTimeResponse = decode(&body)?;
        Ok(parsed.server_time)
    }

    /// Place one order with a fresh client order id.
    pub async fn submit_order(
        &self,
        account: &Account,
        intent: &OrderIntent,
    ) -> ClientResult<OrderAck> {
        let mut params = intent.wire_params();
        params.push(("newClientOrderId", ClientOrderId::new().to_string()));

        let body = self
            .send_signed(Method::POST, &self.config.order_path, account, params)
            .await?;
        let parsed: PlaceOrderResponse = decode(&body)?;
        Ok(OrderAck {
            order_id: parsed.order_id.to_string(),
            transact_time: parsed.transact_time,
        })
    }

    /// Open orders for `symbol`.
    pub async fn open_orders(&self, account: &Account, symbol: &str) -> ClientResult<Vec<OpenOrder>> {
        let body = self
            .send_signed(
                Method::GET,
                &self.config.open_orders_path,
                account,
                vec![("symbol", symbol.to_string())],
            )
            .await?;
        let orders: Vec<OpenOrder> = decode(&body)?;
        debug!(account = %account.name(), symbol, count = orders.len(), "Open orders fetched");
        Ok(orders)
    }

    /// Balances of `assets`, in the order requested.
    ///
    /// Assets the venue does not report come back as zero.
    pub async fn balances<S: AsRef<str>>(
        &self,
        account: &Account,
        assets: &[S],
    ) -> ClientResult<Vec<AssetBalance>> {
        let body = self
            .send_signed(Method::GET, &self.config.account_path, account, Vec::new())
            .await?;
        let parsed: AccountResponse = decode(&body)?;
        Ok(select_balances(parsed.balances, assets))
    }

    /// Cancel every open order for `symbol`. Returns the number cancelled.
    ///
    /// Checks for open orders first: the venue rejects a bulk cancel when
    /// there is nothing to cancel.
    pub async fn cancel_open_orders(&self, account: &Account, symbol: &str) -> ClientResult<usize> {
        let open = self.open_orders(account, symbol).await?;
        if open.is_empty() {
            return Ok(0);
        }

        let body = self
            .send_signed(
                Method::DELETE,
                &self.config.open_orders_path,
                account,
                vec![("symbol", symbol.to_string())],
            )
            .await?;
        let cancelled: Vec<serde_json::Value> = decode(&body)?;
        info!(
            account = %account.name(),
            symbol,
            cancelled = cancelled.len(),
            "Open orders cancelled"
        );
        Ok(cancelled.len())
    }

    /// Append timestamp (and recvWindow) and sign the resulting query.
    fn signed_query(
        &self,
        account: &Account,
        mut params: Vec<(&'static str, String)>,
    ) -> ClientResult<String> {
        params.push(("timestamp", (self.timestamp_fn)().to_string()));
        if let Some(recv_window) = self.config.recv_window_ms {
            params.push(("recvWindow", recv_window.to_string()));
        }
        let canonical = canonical_query(&params);
        let signature = sign_query(account.secret_key(), &canonical)?;
        Ok(format!("{canonical}&signature={signature}"))
    }

    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        account: &Account,
        params: Vec<(&'static str, String)>,
    ) -> ClientResult<String> {
        let query = self.signed_query(account, params)?;
        let url = format!("{}{}?{}", self.config.rest_url, path, query);

        let mut request = self
            .http
            .request(method, url)
            .header(API_KEY_HEADER, account.api_key());
        if self.config.microsecond_timestamps {
            request = request.header(TIME_UNIT_HEADER, "MICROSECOND");
        }

        read_body(request.send().await?).await
    }
}

impl std::fmt::Debug for VenueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueClient")
            .field("rest_url", &self.config.rest_url)
            .finish_non_exhaustive()
    }
}

async fn read_body(response: Response) -> ClientResult<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn select_balances<S: AsRef<str>>(all: Vec<AssetBalance>, assets: &[S]) -> Vec<AssetBalance> {
    assets
        .iter()
        .map(|asset| {
            let asset = asset.as_ref();
            all.iter()
                .find(|b| b.asset == asset)
                .cloned()
                .unwrap_or_else(|| AssetBalance::zero(asset))
        })
        .collect()
}

fn decode<T: DeserializeOwned>(body: &str) -> ClientResult<T> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode(format!("{e}: {body}")))
}

impl VenueTransport for VenueClient {
    fn place_order<'a>(
        &'a self,
        account: &'a Account,
        intent: &'a OrderIntent,
    ) -> BoxFuture<'a, TransportResult<OrderAck>> {
        Box::pin(async move { Ok(self.submit_order(account, intent).await?) })
    }

    fn probe<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, TransportResult<i64>> {
        Box::pin(async move { Ok(self.signed_time(account).await?) })
    }
}

impl TimeProbe for VenueClient {
    fn server_time_ms(&self) -> BoxFuture<'_, TransportResult<i64>> {
        Box::pin(async move { Ok(self.fetch_server_time().await?) })
    }
}
