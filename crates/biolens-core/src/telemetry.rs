//! Tracing initialisation for the `biolens` binary.
//!
//! `RUST_LOG` wins when set; otherwise the supplied level applies to the
//! BioLens crates and `warn` to everything else, which keeps reqwest and
//! hyper quiet at `debug`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn default_directives(level: Level) -> String {
    format!("warn,biolens_core={level},biolens_domain={level},biolens={level}")
}

/// Install the global subscriber. Only the first call in a process takes
/// effect; later calls return `false`.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_biolens() {
        let d = default_directives(Level::DEBUG);
        assert!(d.starts_with("warn,"));
        assert!(d.contains("biolens_core=DEBUG"));
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_tracing(false, Level::INFO);
        assert!(!init_tracing(true, Level::INFO));
    }
}
