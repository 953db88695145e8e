//! Core quota-refresh logic: auth fallback, HTTP fetch, payload parsing,
//! and the refresh engine state machine.

pub mod auth;
pub mod credentials;
pub mod engine;
pub mod http;
pub mod logging;
pub mod snapshot;
