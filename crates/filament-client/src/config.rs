//! Driver configuration.

use std::time::Duration;

use serde::Deserialize;

/// Driver name reported in CONNECT and DB_OPEN.
pub const DRIVER_NAME: &str = "filament";
/// Driver version reported in CONNECT and DB_OPEN.
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Record serialization format, negotiated at handshake time via the
/// `serialization-impl` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serialization {
    #[default]
    Csv,
    Binary,
}

impl Serialization {
    /// The implementation name sent to the server.
    pub fn impl_name(self) -> &'static str {
        match self {
            Self::Csv => "ORecordDocument2csv",
            Self::Binary => "ORecordSerializerBinary",
        }
    }
}

/// Tuning for the adaptive non-blocking receive loop.
///
/// The loop starts patient (one second) waiting for the first byte, then
/// tightens toward the floor while full buffers keep arriving and relaxes
/// again on partial ones. Three consecutive idle polls end the loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceiveConfig {
    pub initial_timeout: Duration,
    pub short_timeout: Duration,
    pub timeout_inc: Duration,
    pub timeout_dec: Duration,
    pub min_timeout: Duration,
    pub idle_retries: u32,
    pub buffer_size: usize,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            initial_timeout: Duration::from_secs(1),
            short_timeout: Duration::from_millis(10),
            timeout_inc: Duration::from_millis(10),
            timeout_dec: Duration::from_millis(10),
            min_timeout: Duration::from_micros(10),
            idle_retries: 3,
            buffer_size: 4096,
        }
    }
}

/// Connection endpoint and session options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub host: String,
    pub port: u16,
    pub serialization: Serialization,
    /// Request a token session at CONNECT; the returned bearer token is
    /// echoed on every following request.
    pub token_session: bool,
    pub receive: ReceiveConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 2424,
            serialization: Serialization::default(),
            token_session: false,
            receive: ReceiveConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_defaults_match_the_protocol_constants() {
        let cfg = ReceiveConfig::default();
        assert_eq!(cfg.initial_timeout, Duration::from_secs(1));
        assert_eq!(cfg.short_timeout, Duration::from_millis(10));
        assert_eq!(cfg.timeout_inc, Duration::from_millis(10));
        assert_eq!(cfg.timeout_dec, Duration::from_millis(10));
        assert_eq!(cfg.min_timeout, Duration::from_micros(10));
        assert_eq!(cfg.idle_retries, 3);
        assert_eq!(cfg.buffer_size, 4096);
    }

    #[test]
    fn serialization_impl_names() {
        assert_eq!(Serialization::Csv.impl_name(), "ORecordDocument2csv");
        assert_eq!(
            Serialization::Binary.impl_name(),
            "ORecordSerializerBinary"
        );
    }

    #[test]
    fn default_endpoint_is_the_binary_port() {
        let cfg = DriverConfig::default();
        assert_eq!(cfg.port, 2424);
        assert!(!cfg.token_session);
    }
}
