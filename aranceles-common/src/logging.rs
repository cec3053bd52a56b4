//! Tracing subscriber setup shared by the service binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to the
/// aranceles crates and `tower_http` request traces.
pub fn init_tracing(default_level: &str) {
    let fallback = format!(
        "aranceles_common={level},aranceles_benefits={level},aranceles_debts={level},\
         aranceles_payments={level},tower_http={level}",
        level = default_level
    );

    // try_init: a second call (tests) leaves the first subscriber in place
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
