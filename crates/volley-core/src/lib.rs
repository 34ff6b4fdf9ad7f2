//! Core domain types for the volley burst-dispatch engine.
//!
//! This crate provides the types shared by every other crate:
//! - `Account`: credential handle used to parametrize outbound requests
//! - `OrderIntent`: the immutable order fired by every request of a batch
//! - `DispatchWindow`: the `[start, end]` interval around a target instant
//! - `DispatchResult`, `BatchResult`: per-account and aggregated throughput
//! - `VenueTransport`: the seam between the engine and the venue client

pub mod account;
pub mod error;
pub mod order;
pub mod result;
pub mod transport;
pub mod window;

pub use account::Account;
pub use error::{CoreError, Result};
pub use order::{ClientOrderId, OrderIntent, OrderSide, OrderType, TimeInForce};
pub use result::{compute_qps, AccountFailure, BatchResult, DispatchResult};
pub use transport::{
    BoxFuture, DynTransport, MockTransport, OrderAck, ProbeCall, TransportError, TransportResult,
    VenueTransport,
};
pub use window::DispatchWindow;
