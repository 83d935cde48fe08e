//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. Any struct deriving `Debug`
//! with a `SecretString` field automatically redacts it, so secrets
//! cannot leak through `{:?}` formatting or tracing fields. Values are
//! zeroized on drop.
//!
//! Use `SecretString` for the RTC provider secret and any other
//! credential this service holds; access the raw value only at the call
//! site that needs it, via [`ExposeSecret::expose_secret`].
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct ProviderCredentials {
//!     base_url: String,
//!     secret: SecretString,  // Debug shows "[REDACTED]"
//! }
//!
//! let creds = ProviderCredentials {
//!     base_url: "https://rtc.example.com".to_string(),
//!     secret: SecretString::from("MY_PROVIDER_SECRET"),
//! };
//!
//! let raw: &str = creds.secret.expose_secret();
//! assert_eq!(raw, "MY_PROVIDER_SECRET");
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("MY_PROVIDER_SECRET");
        let debug_str = format!("{secret:?}");

        assert!(!debug_str.contains("MY_PROVIDER_SECRET"));
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_expose_secret_returns_value() {
        let secret = SecretString::from("MY_PROVIDER_SECRET");
        assert_eq!(secret.expose_secret(), "MY_PROVIDER_SECRET");
    }

    #[test]
    fn test_deserialize_from_json() {
        #[derive(Debug, Deserialize)]
        struct Credentials {
            client_id: String,
            client_secret: SecretString,
        }

        let json = r#"{"client_id": "vc-1", "client_secret": "s3cret"}"#;
        let creds: Credentials = serde_json::from_str(json).unwrap();

        assert_eq!(creds.client_id, "vc-1");
        assert_eq!(creds.client_secret.expose_secret(), "s3cret");

        let debug_str = format!("{creds:?}");
        assert!(!debug_str.contains("s3cret"));
    }
}
