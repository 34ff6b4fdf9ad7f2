//! Order-related types and identifiers.
//!
//! Provides order side, type, time-in-force, the client order ID and the
//! `OrderIntent` fired by every request in a batch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    #[serde(alias = "BUY")]
    Buy,
    #[serde(alias = "SELL")]
    Sell,
}

impl OrderSide {
    /// Venue wire representation.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Limit order.
    #[default]
    #[serde(alias = "LIMIT")]
    Limit,
    /// Market order. Price and time-in-force are not sent.
    #[serde(alias = "MARKET")]
    Market,
}

impl OrderType {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Limit => "LIMIT",
            Self::Market => "MARKET",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Market => write!(f, "market"),
        }
    }
}

/// Time-in-force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled.
    #[default]
    #[serde(rename = "GTC", alias = "gtc")]
    GoodTilCancelled,
    /// Immediate-or-cancel.
    #[serde(rename = "IOC", alias = "ioc")]
    ImmediateOrCancel,
    /// Fill-or-kill.
    #[serde(rename = "FOK", alias = "fok")]
    FillOrKill,
}

impl TimeInForce {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::GoodTilCancelled => "GTC",
            Self::ImmediateOrCancel => "IOC",
            Self::FillOrKill => "FOK",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Client order ID attached to every fired request.
///
/// Format: `vl{timestamp_ms}{uuid_short}`. Kept alphanumeric and under the
/// 36-character limit most venues put on client ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("vl{ts}{}", &uuid[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The order fired by every request of a batch.
///
/// Built once per batch and shared read-only (`Arc<OrderIntent>`) by every
/// dispatcher and every in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Instrument symbol (e.g., "REDUSDT").
    pub symbol: String,
    pub side: OrderSide,
    /// Limit price. Ignored for market orders.
    pub price: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

impl OrderIntent {
    /// Create a GTC limit order intent.
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            price,
            quantity,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::GoodTilCancelled,
        }
    }

    /// Validate the intent before a batch starts.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidIntent` for an empty symbol, a non-positive
    /// quantity, or a non-positive limit price.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidIntent("empty symbol".to_string()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::InvalidIntent(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.order_type == OrderType::Limit && self.price <= Decimal::ZERO {
            return Err(CoreError::InvalidIntent(format!(
                "limit price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }

    /// Order parameters in venue wire order (without timestamp/signature).
    pub fn wire_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("side", self.side.as_wire().to_string()),
            ("type", self.order_type.as_wire().to_string()),
        ];
        if self.order_type == OrderType::Limit {
            params.push(("timeInForce", self.time_in_force.as_wire().to_string()));
        }
        params.push(("quantity", self.quantity.normalize().to_string()));
        if self.order_type == OrderType::Limit {
            params.push(("price", self.price.normalize().to_string()));
        }
        params
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_type {
            OrderType::Limit => write!(
                f,
                "{} {} {} @ {} ({})",
                self.side, self.quantity, self.symbol, self.price, self.time_in_force
            ),
            OrderType::Market => {
                write!(f, "{} {} {} @ market", self.side, self.quantity, self.symbol)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_wire_params() {
        let intent = OrderIntent::limit("REDUSDT", OrderSide::Buy, dec!(0.60), dec!(5000));
        let params = intent.wire_params();
        let keys: Vec<_> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["symbol", "side", "type", "timeInForce", "quantity", "price"]
        );
        assert_eq!(params[1].1, "BUY");
        assert_eq!(params[4].1, "5000");
        assert_eq!(params[5].1, "0.6");
    }

    #[test]
    fn test_market_omits_price_and_tif() {
        let mut intent = OrderIntent::limit("REDUSDT", OrderSide::Sell, dec!(0), dec!(10));
        intent.order_type = OrderType::Market;
        assert!(intent.validate().is_ok());
        let keys: Vec<_> = intent.wire_params().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["symbol", "side", "type", "quantity"]);
    }

    #[test]
    fn test_validate_rejects_bad_intents() {
        let base = OrderIntent::limit("REDUSDT", OrderSide::Buy, dec!(0.6), dec!(100));
        assert!(base.validate().is_ok());

        let mut empty_symbol = base.clone();
        empty_symbol.symbol = " ".to_string();
        assert!(empty_symbol.validate().is_err());

        let mut zero_qty = base.clone();
        zero_qty.quantity = Decimal::ZERO;
        assert!(zero_qty.validate().is_err());

        let mut zero_price = base;
        zero_price.price = Decimal::ZERO;
        assert!(zero_price.validate().is_err());
    }

    #[test]
    fn test_client_order_id_unique() {
        let a = ClientOrderId::new();
        let b = ClientOrderId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("vl"));
        assert!(a.as_str().len() <= 36);
    }

    #[test]
    fn test_side_accepts_uppercase_alias() {
        #[derive(Deserialize)]
        struct Wrapper {
            side: OrderSide,
            tif: TimeInForce,
        }
        let w: Wrapper = serde_json_like("BUY", "ioc");
        assert_eq!(w.side, OrderSide::Buy);
        assert_eq!(w.tif, TimeInForce::ImmediateOrCancel);

        fn serde_json_like(side: &str, tif: &str) -> Wrapper {
            use serde::de::value::{Error, MapDeserializer};
            let entries = vec![("side", side), ("tif", tif)];
            Wrapper::deserialize(MapDeserializer::<_, Error>::new(entries.into_iter()))
                .unwrap()
        }
    }
}
