//! CLI command implementations for god.
//!
//! Each module corresponds to one mode of the binary: the foreground daemon,
//! a navigation query, or a control command against a running daemon.

pub mod query;
pub mod serve;
pub mod status;
pub mod stop;
