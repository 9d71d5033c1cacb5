//! HMAC-SHA256 request signing for the Bybit v5 API.
//!
//! The signature is computed over `timestamp + api_key + recv_window +
//! param_str`, where `param_str` is the sorted `key=value` query/body
//! parameters joined with `&`. The hex-encoded digest travels in the
//! `X-BAPI-SIGN` header. The secret is never logged.

use crate::error::{BybitError, Result};
use hmac::{Hmac, Mac};
use paper_trade_core::config::ExchangeConfig;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Headers required on authenticated Bybit requests.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub api_key: String,
    pub timestamp: String,
    pub recv_window: String,
    pub signature: String,
}

impl SignedHeaders {
    #[must_use]
    pub fn as_tuples(&self) -> [(&'static str, &str); 4] {
        [
            ("X-BAPI-API-KEY", &self.api_key),
            ("X-BAPI-TIMESTAMP", &self.timestamp),
            ("X-BAPI-RECV-WINDOW", &self.recv_window),
            ("X-BAPI-SIGN", &self.signature),
        ]
    }
}

/// Signer holding the API credentials.
pub struct BybitAuth {
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl std::fmt::Debug for BybitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitAuth")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("recv_window_ms", &self.recv_window_ms)
            .finish()
    }
}

impl BybitAuth {
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        recv_window_ms: u64,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            recv_window_ms,
        }
    }

    /// Builds a signer from the exchange configuration.
    ///
    /// # Errors
    /// Returns an error when either credential is empty.
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(BybitError::Configuration(
                "Bybit API credentials not configured".to_string(),
            ));
        }
        Ok(Self::new(
            config.api_key.clone(),
            config.api_secret.clone(),
            config.recv_window_ms,
        ))
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Signs `param_str` with the current wall-clock timestamp.
    pub fn signed_headers(&self, param_str: &str) -> Result<SignedHeaders> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| BybitError::Signing(format!("clock before epoch: {e}")))?
            .as_millis() as u64;
        self.signed_headers_at(param_str, timestamp_ms)
    }

    /// Signs `param_str` with an explicit timestamp, for deterministic tests.
    pub fn signed_headers_at(&self, param_str: &str, timestamp_ms: u64) -> Result<SignedHeaders> {
        let timestamp = timestamp_ms.to_string();
        let recv_window = self.recv_window_ms.to_string();
        let payload = format!("{}{}{}{}", timestamp, self.api_key, recv_window, param_str);
        let signature = self.sign(&payload)?;
        Ok(SignedHeaders {
            api_key: self.api_key.clone(),
            timestamp,
            recv_window,
            signature,
        })
    }

    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| BybitError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> BybitAuth {
        BybitAuth::new("test-key", "test-secret", 5000)
    }

    // ==================== Signing Tests ====================

    #[test]
    fn signature_is_hex_sha256_digest() {
        let headers = auth()
            .signed_headers_at("category=spot&symbol=BTCUSDT", 1_706_817_600_000)
            .unwrap();
        assert_eq!(headers.signature.len(), 64);
        assert!(headers.signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signing_is_deterministic() {
        let a = auth()
            .signed_headers_at("qty=0.5&symbol=BTCUSDT", 1_706_817_600_000)
            .unwrap();
        let b = auth()
            .signed_headers_at("qty=0.5&symbol=BTCUSDT", 1_706_817_600_000)
            .unwrap();
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn signature_depends_on_secret() {
        let a = auth().signed_headers_at("symbol=BTCUSDT", 1).unwrap();
        let b = BybitAuth::new("test-key", "other-secret", 5000)
            .signed_headers_at("symbol=BTCUSDT", 1)
            .unwrap();
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn signature_depends_on_timestamp_and_params() {
        let base = auth().signed_headers_at("symbol=BTCUSDT", 1).unwrap();
        let other_ts = auth().signed_headers_at("symbol=BTCUSDT", 2).unwrap();
        let other_params = auth().signed_headers_at("symbol=ETHUSDT", 1).unwrap();
        assert_ne!(base.signature, other_ts.signature);
        assert_ne!(base.signature, other_params.signature);
    }

    // ==================== Header Tests ====================

    #[test]
    fn headers_carry_bapi_fields() {
        let headers = auth().signed_headers_at("", 1_706_817_600_000).unwrap();
        let tuples = headers.as_tuples();
        assert_eq!(tuples[0], ("X-BAPI-API-KEY", "test-key"));
        assert_eq!(tuples[1], ("X-BAPI-TIMESTAMP", "1706817600000"));
        assert_eq!(tuples[2], ("X-BAPI-RECV-WINDOW", "5000"));
        assert_eq!(tuples[3].0, "X-BAPI-SIGN");
    }

    // ==================== Configuration Tests ====================

    #[test]
    fn from_config_rejects_missing_credentials() {
        let config = ExchangeConfig {
            rest_url: "https://api.bybit.com".to_string(),
            api_key: String::new(),
            api_secret: "secret".to_string(),
            recv_window_ms: 5000,
        };
        let result = BybitAuth::from_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("credentials not configured"));
    }

    #[test]
    fn debug_redacts_secret() {
        let output = format!("{:?}", auth());
        assert!(output.contains("test-key"));
        assert!(!output.contains("test-secret"));
        assert!(output.contains("[REDACTED]"));
    }
}
