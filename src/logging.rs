//! Tracing subscriber setup for binaries and tools.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Guard that flushes `trace.json` when dropped.
#[cfg(feature = "chrome-trace")]
pub type TraceGuard = tracing_chrome::FlushGuard;
#[cfg(not(feature = "chrome-trace"))]
pub type TraceGuard = ();

/// Default filter directive; `-v` raises it to debug.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "wavetrace=debug"
    } else {
        "wavetrace=info"
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// With `WAVETRACE_TRACE=1` a Chrome trace is also written to `trace.json`;
/// keep the returned guard alive until exit.
pub fn init(verbose: bool) -> Option<TraceGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let fmt = tracing_subscriber::fmt::layer().with_target(false);

    #[cfg(feature = "chrome-trace")]
    {
        if std::env::var("WAVETRACE_TRACE").ok().as_deref() == Some("1") {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file("trace.json")
                .build();
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt)
                .with(chrome_layer);
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                return None;
            }
            return Some(guard);
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt);
    // a subscriber may already be installed (tests, embedding hosts)
    let _ = tracing::subscriber::set_global_default(subscriber);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "wavetrace=info");
        assert_eq!(default_directive(true), "wavetrace=debug");
    }
}
