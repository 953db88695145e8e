//! Persistent storage: application paths and the CSV quota log.

pub mod paths;
pub mod quota_log;
