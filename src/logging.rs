//! Logging bootstrap for the `solakon` binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a `fmt` subscriber.
///
/// `RUST_LOG` wins over `level` when set. Fails if a global subscriber is
/// already installed.
pub fn init(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // Only one global subscriber may exist per process.
        let _ = init("debug");
        assert!(init("info").is_err());
    }
}
