//! The `utils` module provides definitions shared across the `subpub` crate:
//! the broker error type, logging setup and shutdown signal handling.

pub mod error;
pub mod logging;
pub mod signal;

#[cfg(test)]
mod tests {
    use super::logging;
    use tracing::Level;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info", None).unwrap();
        logging::init("debug", None).unwrap();
        logging::init("warn", None).unwrap();
    }

    #[test]
    fn parse_level_falls_back_to_info() {
        assert_eq!(logging::parse_level("ERROR"), Level::ERROR);
        assert_eq!(logging::parse_level("warning"), Level::WARN);
        assert_eq!(logging::parse_level("trace"), Level::TRACE);
        assert_eq!(logging::parse_level("verbose"), Level::INFO);
        assert_eq!(logging::parse_level(""), Level::INFO);
    }

    #[test]
    fn logging_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subpub.log");
        logging::init("info", Some(&path)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn logging_init_reports_unopenable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("subpub.log");
        assert!(logging::init("info", Some(&path)).is_err());
    }
}
