use std::io;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a stderr subscriber, so stdout only carries command output.
/// `RUST_LOG` overrides the default `info` filter.
pub(crate) fn init(json: bool) {
    let filt = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let builder = fmt().with_writer(io::stderr).with_env_filter(filt);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
