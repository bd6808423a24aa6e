//! Provide tracing, tailored to this crate.
//!
//! Applications embedding the transports may call [`init_journald_or_stdout`]
//! to install a subscriber. Inside the crate, `use crate::tracing::prelude::*`
//! gives convenient access to the `trace!()`, `debug!()`, `info!()`,
//! `warn!()`, and `error!()` macros.

use std::env;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Initialize logging.
///
/// If running under systemd, use journald; otherwise fall back to stdout.
/// Returns false when a global subscriber was already installed, in which
/// case the existing one is left alone.
pub fn init_journald_or_stdout() -> bool {
    if env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(layer) = tracing_journald::layer() {
            return tracing_subscriber::registry().with(layer).try_init().is_ok();
        }
        let installed = use_stdout();
        error!("Failed to initialize journald logging, using stdout.");
        installed
    } else {
        use_stdout()
    }
}

// Log to stdout, filtering according to environment variable RUST_LOG,
// overriding the default level (ERROR) to INFO.
fn use_stdout() -> bool {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTimer))
        .try_init()
        .is_ok()
}

// Timestamps in local time, to the nearest second.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        let formatted = now
            .format(time::macros::format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{formatted}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn second_init_keeps_existing_subscriber() {
        // Whichever test binary gets here first installs the subscriber;
        // any later call must report that nothing was replaced.
        let _ = init_journald_or_stdout();
        assert!(!init_journald_or_stdout());
    }

    #[test]
    fn local_timer_writes_hh_mm_ss() {
        let mut out = String::new();
        LocalTimer
            .format_time(&mut Writer::new(&mut out))
            .expect("timer should format");
        assert_eq!(out.len(), 8);
        assert_eq!(out.matches(':').count(), 2);
    }
}
