//! HTTP client construction

use std::time::Duration;

use url::Url;

use crate::error::SubmitError;

/// Build the shared client
///
/// # Errors
/// [`SubmitError::Client`] when the TLS backend cannot be initialised with
/// the requested settings
pub fn build_client(insecure: bool, timeout: Duration) -> Result<reqwest::Client, SubmitError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(insecure)
        .build()
        .map_err(SubmitError::Client)
}

/// Endpoint with any password masked, for logs
pub fn redact_endpoint(endpoint: &str) -> String {
    match Url::parse(endpoint) {
        Ok(mut url) => {
            if url.password().is_some() {
                // Only fails for cannot-be-a-base URLs, which carry no password
                let _ = url.set_password(Some("xxxxx"));
            }
            url.to_string()
        }
        Err(_) => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_honours_settings() {
        assert!(build_client(false, Duration::from_secs(10)).is_ok());
        assert!(build_client(true, Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn test_redact_endpoint_masks_password() {
        assert_eq!(
            redact_endpoint("http://u:secret@h:8086/write?db=x"),
            "http://u:xxxxx@h:8086/write?db=x"
        );
        assert_eq!(
            redact_endpoint("http://h:8086/write?db=x"),
            "http://h:8086/write?db=x"
        );
    }
}
