//! Tracing bootstrap for Mbrtree.
//!
//! Logging is controlled by the `DEBUG_MBRTREE` environment variable. If it is
//! not set or is set to a falsy value ("0", "false", or empty), logging stays
//! disabled. Otherwise a subscriber with a maximum level of DEBUG is installed
//! at load time.

use ctor::ctor;
use tracing::Level;

#[ctor]
fn set_debug_level() {
    // If DEBUG_MBRTREE is not set or set to a falsy value, disable logging.
    // Otherwise, initialize a debug-level subscriber.
    if std::env::var("DEBUG_MBRTREE").map_or(true, |v| v == "0" || v == "false" || v.is_empty()) {
        // Logging macros stay as no-ops without a subscriber.
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}
