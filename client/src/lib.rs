//! HTTP backend for `vecstore-core`.
//!
//! [`HttpEngine`] implements the store's `Engine` trait against a remote
//! vector engine's REST schema API, batch endpoint and GraphQL search.

mod engine;
mod graphql;
mod transport;

pub use engine::HttpEngine;
pub use transport::{ClientError, ClientOptions, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
