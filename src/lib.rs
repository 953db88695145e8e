//! fwq - Firmware Quota Watcher
//!
//! A CLI tool for monitoring Firmware API quota usage. Polls the quota
//! endpoint, tracks usage deltas across 5-hour quota windows, and renders
//! the result in the terminal, one-shot or continuously.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod render;
pub mod storage;
pub mod util;

pub use error::{FwqError, Result};
