//! Crate-internal logging shims.
//!
//! Modules log through the `log_*` aliases so call sites read uniformly;
//! installing a subscriber is the host application's decision.

pub use tracing::{
    debug as log_debug,
    error as log_error,
    info as log_info,
    warn as log_warn,
};
