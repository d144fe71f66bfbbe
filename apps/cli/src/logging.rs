use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Target prefix shared by the library and the binary crates.
const DEFAULT_FILTER: &str = "writeright=info";
const VERBOSE_FILTER: &str = "writeright=debug";

/// Installs the stderr subscriber. `RUST_LOG` wins over `--verbose`.
/// 安裝輸出至 stderr 的日誌訂閱者；`RUST_LOG` 優先於 `--verbose`。
pub fn init(verbose: bool) {
    let fallback = if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
