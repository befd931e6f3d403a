//! Blocking client for the account API.
//!
//! # Overview
//! Creates, fetches and deletes `accounts` resources over HTTP/JSON. Every
//! call is single-shot: no retries, no caching, no state carried between
//! calls.
//!
//! # Design
//! - `AccountClient` holds only a `Config` and a `Transport`.
//! - Each operation is split into `build_*` (produces a request) and
//!   `parse_*` (consumes a response), so the I/O boundary is explicit and the
//!   request/response mapping is testable without a network.
//! - Status codes are classified through one shared table per operation.
//! - The crate only emits `tracing` events; installing a subscriber is the
//!   caller's business.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod status;
pub mod types;

pub use client::AccountClient;
pub use config::Config;
pub use context::{CancelHandle, Context};
pub use error::{ApiError, ConfigError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{AccountAttributes, AccountData, Envelope, ErrorPayload};
