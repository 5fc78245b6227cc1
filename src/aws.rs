//! AWS request signing.
//!
//! Resolves credentials through the standard AWS provider chain (environment,
//! shared config and credentials files, SSO, IMDS) for an optional named
//! profile, and signs JSON POST requests with Signature Version 4.

use std::fmt;
use std::time::SystemTime;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use tracing::debug;

use crate::error::{Result, RetrieverError};

/// Signs requests for one AWS service in one region.
#[derive(Clone)]
pub struct AwsSigner {
    service: &'static str,
    region: String,
    credentials: SharedCredentialsProvider,
}

impl fmt::Debug for AwsSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSigner")
            .field("service", &self.service)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsSigner {
    /// Builds a signer backed by the default credential chain.
    ///
    /// `profile` selects a named profile from the shared config files.
    pub async fn from_profile(
        service: &'static str,
        region: &str,
        profile: Option<&str>,
    ) -> Result<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let credentials = sdk_config.credentials_provider().ok_or_else(|| {
            RetrieverError::config(format!(
                "No AWS credentials provider available for profile '{}'",
                profile.unwrap_or("default")
            ))
        })?;

        debug!(
            service,
            region,
            profile = profile.unwrap_or("default"),
            "Loaded AWS credentials provider"
        );

        Ok(Self {
            service,
            region: region.to_string(),
            credentials,
        })
    }

    /// Builds a signer with fixed credentials.
    pub fn with_credentials(service: &'static str, region: &str, credentials: Credentials) -> Self {
        Self {
            service,
            region: region.to_string(),
            credentials: SharedCredentialsProvider::new(credentials),
        }
    }

    /// Computes the signature headers for a POST of `body` to `url`.
    ///
    /// `headers` are the headers the request will carry besides `Host`; they
    /// are all covered by the signature. Failures are mapped with `to_error`.
    pub async fn sign_post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
        to_error: fn(String) -> RetrieverError,
    ) -> Result<Vec<(String, String)>> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| to_error(format!("Failed to resolve AWS credentials: {e}")))?;
        let identity = credentials.into();

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| to_error(format!("Invalid signing parameters: {e}")))?
            .into();

        let signable = SignableRequest::new(
            "POST",
            url,
            headers.iter().copied(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| to_error(format!("Request cannot be signed: {e}")))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| to_error(format!("Failed to sign request: {e}")))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serves one canned `(status, body)` reply per connection, in order,
    /// and returns every raw request received.
    pub(crate) async fn canned_server(
        replies: Vec<(u16, &'static str)>,
    ) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            requests
        });

        (endpoint, handle)
    }

    /// Reads one HTTP/1.1 request, headers and body.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_ascii_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub(crate) fn static_signer(service: &'static str) -> AwsSigner {
        AwsSigner::with_credentials(
            service,
            "us-east-1",
            Credentials::new("AKIDEXAMPLE", "secret", None, None, "static"),
        )
    }

    #[tokio::test]
    async fn test_sign_post_adds_authorization_and_date() {
        let signer = static_signer("athena");
        let headers = signer
            .sign_post(
                "https://athena.us-east-1.amazonaws.com/",
                &[("content-type", "application/x-amz-json-1.1")],
                b"{}",
                RetrieverError::Submission,
            )
            .await
            .unwrap();

        let authorization = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.as_str())
            .unwrap();
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(authorization.contains("/us-east-1/athena/aws4_request"));
        assert!(authorization.contains("content-type"));
        assert!(headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("x-amz-date")));
    }

    #[tokio::test]
    async fn test_session_token_is_forwarded() {
        let signer = AwsSigner::with_credentials(
            "bedrock",
            "eu-west-1",
            Credentials::new("AKID", "secret", Some("token".to_string()), None, "static"),
        );
        let headers = signer
            .sign_post(
                "https://bedrock-runtime.eu-west-1.amazonaws.com/",
                &[],
                b"{}",
                RetrieverError::Generation,
            )
            .await
            .unwrap();

        assert!(headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("x-amz-security-token") && value == "token"
        }));
    }

    #[tokio::test]
    async fn test_invalid_url_maps_through_error_constructor() {
        let err = static_signer("athena")
            .sign_post("not a url", &[], b"", RetrieverError::Status)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Status Error");
    }

    #[test]
    fn test_debug_omits_credentials() {
        let rendered = format!("{:?}", static_signer("athena"));
        assert!(rendered.contains("athena"));
        assert!(!rendered.contains("secret"));
    }
}
