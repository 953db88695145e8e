//! Command-line interface: argument definitions and command entry points.

pub mod args;
pub mod key;
pub mod quota;
pub mod watch;
