//! Venue transport trait for order dispatch.
//!
//! Provides a trait-based abstraction for sending requests to the venue.
//! This allows for:
//! - Dependency injection for testing
//! - Separation of the dispatch engine from signing and HTTP details

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::account::Account;
use crate::order::OrderIntent;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Failure of a single venue request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Venue answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Request never got a response (connect, timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Request could not be built or signed.
    #[error("Request error: {0}")]
    Request(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    /// Venue-assigned order id.
    pub order_id: String,
    /// Venue transaction timestamp (ms, or µs when the venue is asked for it).
    pub transact_time: i64,
}

/// Trait for sending requests to the venue.
///
/// Implementations must not serialize concurrent calls: the flood loop keeps
/// thousands of `place_order` futures in flight at once.
pub trait VenueTransport: Send + Sync {
    /// Place one order for `account`.
    fn place_order<'a>(
        &'a self,
        account: &'a Account,
        intent: &'a OrderIntent,
    ) -> BoxFuture<'a, TransportResult<OrderAck>>;

    /// Lightweight keep-alive request used to warm the connection.
    ///
    /// Resolves to the venue time reported by the probe (ms).
    fn probe<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, TransportResult<i64>>;
}

/// Arc wrapper for VenueTransport trait objects.
pub type DynTransport = Arc<dyn VenueTransport>;

/// A recorded probe call.
#[derive(Debug, Clone)]
pub struct ProbeCall {
    pub account: String,
    pub at: tokio::time::Instant,
}

/// Mock transport for testing.
///
/// Orders and probes resolve after an optional fixed latency. Failures can be
/// injected per account (probes) or globally (orders).
#[derive(Debug)]
pub struct MockTransport {
    orders_sent: AtomicU64,
    order_accounts: Mutex<Vec<String>>,
    probes: Mutex<Vec<ProbeCall>>,
    failing_probe_accounts: Mutex<HashSet<String>>,
    order_error: Mutex<Option<TransportError>>,
    latency: Mutex<Duration>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport with zero latency that accepts everything.
    pub fn new() -> Self {
        Self {
            orders_sent: AtomicU64::new(0),
            order_accounts: Mutex::new(Vec::new()),
            probes: Mutex::new(Vec::new()),
            failing_probe_accounts: Mutex::new(HashSet::new()),
            order_error: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Make every probe for `account` fail.
    pub fn fail_probes_for(&self, account: impl Into<String>) {
        self.failing_probe_accounts.lock().insert(account.into());
    }

    /// Make every order fail with `error` (None restores success).
    pub fn set_order_error(&self, error: Option<TransportError>) {
        *self.order_error.lock() = error;
    }

    /// Set the latency applied to every request.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Number of order requests that reached the transport.
    pub fn orders_sent(&self) -> u64 {
        self.orders_sent.load(Ordering::SeqCst)
    }

    /// Number of order requests that reached the transport for `account`.
    pub fn orders_sent_for(&self, account: &str) -> usize {
        self.order_accounts
            .lock()
            .iter()
            .filter(|a| a.as_str() == account)
            .count()
    }

    /// Get recorded probes, in call order.
    pub fn get_probes(&self) -> Vec<ProbeCall> {
        self.probes.lock().clone()
    }

    /// Get recorded probes for one account, in call order.
    pub fn probes_for(&self, account: &str) -> Vec<ProbeCall> {
        self.probes
            .lock()
            .iter()
            .filter(|p| p.account == account)
            .cloned()
            .collect()
    }

    async fn apply_latency(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl VenueTransport for MockTransport {
    fn place_order<'a>(
        &'a self,
        account: &'a Account,
        _intent: &'a OrderIntent,
    ) -> BoxFuture<'a, TransportResult<OrderAck>> {
        Box::pin(async move {
            let seq = self.orders_sent.fetch_add(1, Ordering::SeqCst) + 1;
            self.order_accounts.lock().push(account.name().to_string());
            self.apply_latency().await;

            if let Some(err) = self.order_error.lock().clone() {
                return Err(err);
            }
            Ok(OrderAck {
                order_id: seq.to_string(),
                transact_time: chrono::Utc::now().timestamp_millis(),
            })
        })
    }

    fn probe<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, TransportResult<i64>> {
        Box::pin(async move {
            self.probes.lock().push(ProbeCall {
                account: account.name().to_string(),
                at: tokio::time::Instant::now(),
            });
            self.apply_latency().await;

            if self.failing_probe_accounts.lock().contains(account.name()) {
                return Err(TransportError::Transport("connection refused".to_string()));
            }
            Ok(chrono::Utc::now().timestamp_millis())
        })
    }
}
