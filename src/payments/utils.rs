use crate::payments::error::{ProviderError, ProviderResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Thin JSON client for the invoicing API with bounded timeout and
/// exponential backoff on 5xx/429.
#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl ProviderHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> ProviderResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| ProviderError::Network {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
    ) -> ProviderResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    ProviderError::Network {
                        message: format!("provider request failed: {}", e),
                    }
                }
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            ProviderError::InvalidResponse {
                                message: format!("invalid provider JSON response: {}", e),
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(ProviderError::RateLimit {
                            message: "provider rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "provider server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(ProviderError::Api {
                        message: format!("HTTP {}: {}", status, text),
                        status_code: Some(status.as_u16()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::Network {
            message: "provider request failed".to_string(),
        }))
    }
}

/// Re-serializes a parsed payload into its canonical byte form. serde_json
/// keeps object keys in a sorted map, so nested keys come out in a stable
/// order regardless of how the sender ordered them.
pub fn canonical_payload(payload: &JsonValue) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap_or_default()
}

/// Verifies an HMAC-SHA512 hex signature over the canonical payload bytes.
pub fn verify_webhook_signature(payload: &JsonValue, secret: &str, signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    type HmacSha512 = Hmac<Sha512>;
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return false,
    };
    mac.update(&canonical_payload(payload));
    let computed = hex::encode(mac.finalize().into_bytes());
    secure_eq(computed.as_bytes(), signature.trim().as_bytes())
}

/// Computes the hex signature for a payload. Used by tests and by outbound
/// tooling that needs to produce what `verify_webhook_signature` accepts.
pub fn sign_payload(payload: &JsonValue, secret: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    type HmacSha512 = Hmac<Sha512>;
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return String::new(),
    };
    mac.update(&canonical_payload(payload));
    hex::encode(mac.finalize().into_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn canonical_payload_sorts_keys_at_every_level() {
        let scrambled: JsonValue =
            serde_json::from_str(r#"{"z":1,"a":{"y":2,"b":3},"m":[{"q":4,"c":5}]}"#)
                .expect("payload should parse");
        let canonical = String::from_utf8(canonical_payload(&scrambled)).unwrap();
        assert_eq!(canonical, r#"{"a":{"b":3,"y":2},"m":[{"c":5,"q":4}],"z":1}"#);
    }

    #[test]
    fn signature_round_trip_verifies() {
        let payload = json!({"event": "invoice-paid", "data": {"invoiceReference": "r1"}});
        let signature = sign_payload(&payload, "whsec_test");
        assert!(verify_webhook_signature(&payload, "whsec_test", &signature));
    }

    #[test]
    fn signature_verification_is_key_order_independent() {
        let sent: JsonValue =
            serde_json::from_str(r#"{"event":"invoice-paid","data":{"invoiceReference":"r1"}}"#)
                .unwrap();
        let reordered: JsonValue =
            serde_json::from_str(r#"{"data":{"invoiceReference":"r1"},"event":"invoice-paid"}"#)
                .unwrap();
        let signature = sign_payload(&sent, "whsec_test");
        assert!(verify_webhook_signature(&reordered, "whsec_test", &signature));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let payload = json!({"event": "payment-succeeded", "data": {"amount": 40000}});
        let signature = sign_payload(&payload, "whsec_test");
        let tampered = json!({"event": "payment-succeeded", "data": {"amount": 4000000}});
        assert!(!verify_webhook_signature(&tampered, "whsec_test", &signature));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let payload = json!({"event": "invoice-paid"});
        let signature = sign_payload(&payload, "whsec_a");
        assert!(!verify_webhook_signature(&payload, "whsec_b", &signature));
    }
}
