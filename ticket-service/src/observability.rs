//! Tracing setup
//!
//! Production logs are JSON lines; development logs are human-readable.
//! Both read their filter from `service.log_level`, overridable by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

use crate::config::{Config, RuntimeMode};
use crate::error::Result;

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber and the panic hook
///
/// Calling this twice is harmless; the second subscriber is ignored.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = env_filter(&config.service.log_level);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.mode() {
        RuntimeMode::Production => builder.json().try_init().is_ok(),
        RuntimeMode::Development => builder.pretty().try_init().is_ok(),
    };

    if installed {
        install_panic_hook();
    }

    tracing::info!(
        service = %config.service.name,
        environment = %config.mode(),
        "Tracing initialized"
    );

    Ok(())
}

/// Route panics through the subscriber before the default hook runs
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_default();
        tracing::error!(%location, "panic: {}", panic_message(info.payload()));
        previous(info);
    }));
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Flush before exit
pub fn shutdown_tracing() {
    tracing::info!("Tracing shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        let config = Config::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn test_panic_message_variants() {
        let text: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(text.as_ref()), "boom");

        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(owned.as_ref()), "kaboom");

        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
