//! The `utils` module provides shared definitions used across the
//! `relaychat` application: the error enums and tracing initialisation.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::error::{AppError, GatewayError};
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
        logging::init("nonsense");
    }

    #[test]
    fn app_error_covers_startup_and_broker_loss() {
        let config = ::config::ConfigError::Message("bad port".into());
        assert!(matches!(AppError::from(config), AppError::Config(_)));

        let lost = AppError::from(GatewayError::ConnectionLost);
        assert!(matches!(lost, AppError::Gateway(GatewayError::ConnectionLost)));
        assert_eq!(lost.to_string(), "broker connection lost");

        let bind = AppError::Bind {
            addr: "127.0.0.1:3000".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.to_string().starts_with("cannot bind 127.0.0.1:3000"));
    }
}
