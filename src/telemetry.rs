use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Call once from the embedding application; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "wallet_core=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
