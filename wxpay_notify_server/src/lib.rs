//! # Payment notification server
//! Receives the asynchronous payment-result notifications that the provider posts to the merchant's `notify_url`,
//! and hands them to the notification engine. The engine verifies, decrypts and deduplicates each notification before
//! the merchant's business logic runs.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `GET /health`: returns a 200 OK response.
//! * `GET /` and `GET {prefix}/`: a small JSON liveness message.
//! * `POST {prefix}/notify`: the notification endpoint. Replies `200 {"code":"SUCCESS"}` when the notification was
//!   processed (or had been already), and `500 {"code":"FAILED"}` otherwise, which makes the provider redeliver.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
