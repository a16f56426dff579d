//! Pieces shared by the switchboard crates: the HTTP service runner and the
//! metric definition plumbing.

pub mod http;
pub mod metrics_defs;
