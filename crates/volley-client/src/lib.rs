//! Signed REST client for the venue.
//!
//! Implements the engine's [`VenueTransport`] and [`TimeProbe`] seams over
//! HTTP. Every signed request carries the account's API key in the
//! `X-MBX-APIKEY` header and an HMAC-SHA256 signature over its query string.
//!
//! [`VenueTransport`]: volley_core::VenueTransport
//! [`TimeProbe`]: volley_clock::TimeProbe

pub mod error;
pub mod rest;
pub mod signer;

pub use error::{ClientError, ClientResult};
pub use rest::{AssetBalance, ClientConfig, OpenOrder, TimestampFn, VenueClient};
pub use signer::{canonical_query, sign_query};
