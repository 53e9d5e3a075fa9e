use std::path::PathBuf;

/// Largest accepted request body (16 MiB).
pub const MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0).
    pub host: String,
    /// Listen port (default: 5001).
    pub port: u16,
    /// Verbose logging when the `DEBUG` flag is true.
    pub debug: bool,
    /// Directory where uploads are staged while being encoded.
    pub upload_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Request body cap in bytes.
    pub max_content_length: usize,
}

impl Config {
    /// Load configuration from the environment with defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 5001),
            debug: env_flag("DEBUG"),
            upload_dir: std::env::var("FACEGATE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            model_dir: facegate_core::default_model_dir(),
            intra_threads: env_parse("FACEGATE_INTRA_THREADS", 2),
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info,tower_http=info"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            debug: false,
            upload_dir: PathBuf::from("uploads"),
            model_dir: PathBuf::from("models"),
            intra_threads: 2,
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:5001");
        assert_eq!(config.max_content_length, 16 * 1024 * 1024);
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" 1 "));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("no"));
    }

    #[test]
    fn test_default_log_filter() {
        let mut config = Config::default();
        assert_eq!(config.default_log_filter(), "info,tower_http=info");
        config.debug = true;
        assert_eq!(config.default_log_filter(), "debug");
    }
}
