//! Transport: every byte that crosses the network goes through here.
//!
//! The [`Transport`] trait is the seam between the job driver and the wire.
//! [`HttpTransport`] is the production implementation over one shared
//! `reqwest::Client`; tests substitute a scripted in-memory transport.
//!
//! Three kinds of call exist, with different authentication:
//!
//! | Call | Auth | Failure |
//! |------|------|---------|
//! | JSON API (`/jobs`, `/tasks`, `/import`) | `Bearer <key>` | `RemoteApi` |
//! | Multipart upload to a pre-signed form | none | `UploadFailed` |
//! | Result download from a pre-signed URL | none | `RemoteApi` |
//!
//! The transport is stateless between calls apart from the connection pool.

use crate::config::ClientConfig;
use crate::error::ConvertError;
use crate::model::{ApiErrorBody, UploadTarget};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Content type of the multipart `file` part.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Network I/O used by the job driver.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticated JSON call against an API path such as `/jobs`.
    /// Returns the raw response body of a 2xx response.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, ConvertError>;

    /// POST `bytes` to a pre-signed form as multipart/form-data.
    async fn upload_multipart(
        &self,
        target: &UploadTarget,
        bytes: &[u8],
        filename: &str,
    ) -> Result<(), ConvertError>;

    /// Unauthenticated GET of a pre-signed result URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ConvertError>;
}

/// Call `endpoint` and decode the response as `T`.
pub async fn request_json<T, R>(
    transport: &T,
    method: Method,
    endpoint: &str,
    body: Option<&serde_json::Value>,
) -> Result<R, ConvertError>
where
    T: Transport + ?Sized,
    R: DeserializeOwned,
{
    let context = format!("{method} {endpoint}");
    let bytes = transport.request(method, endpoint, body).await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!("Undecodable response for {}: {}", context, preview(&bytes));
        ConvertError::decode(context, e)
    })
}

/// Production transport over `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Build a transport sharing the config's base URL and key handle.
    pub fn new(config: &ClientConfig) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ConvertError::network)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn api_url(&self, endpoint: &str) -> Result<reqwest::Url, ConvertError> {
        let raw = self.config.endpoint(endpoint);
        reqwest::Url::parse(&raw).map_err(|_| ConvertError::InvalidUrl { url: raw })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, ConvertError> {
        let url = self.api_url(endpoint)?;
        debug!("{} {}", method, endpoint);

        let mut req = self
            .client
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key.get()))
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            let encoded = serde_json::to_vec(body)
                .map_err(|e| ConvertError::decode(format!("{method} {endpoint} body"), e))?;
            req = req.body(encoded);
        }

        let response = req.send().await.map_err(ConvertError::network)?;
        let status = response.status();
        debug!("   Response: HTTP {}", status.as_u16());

        if !status.is_success() {
            // An unreadable error body still yields "HTTP <status>".
            let bytes = response.bytes().await.unwrap_or_default();
            let err = api_error(status.as_u16(), &bytes);
            warn!("{} {} failed: {} ({})", method, endpoint, err, preview(&bytes));
            return Err(err);
        }
        let bytes = response.bytes().await.map_err(ConvertError::network)?;
        Ok(bytes.to_vec())
    }

    async fn upload_multipart(
        &self,
        target: &UploadTarget,
        bytes: &[u8],
        filename: &str,
    ) -> Result<(), ConvertError> {
        let url = reqwest::Url::parse(&target.url).map_err(|_| ConvertError::InvalidUrl {
            url: target.url.clone(),
        })?;
        let boundary = uuid::Uuid::new_v4().to_string();
        let body = encode_multipart(&target.parameters, bytes, filename, &boundary);
        debug!("Uploading {} ({} bytes)", filename, bytes.len());

        let response = self
            .client
            .post(url)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| ConvertError::UploadFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Upload of {} failed: HTTP {}", filename, status.as_u16());
            return Err(ConvertError::UploadFailed {
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        debug!("Upload successful: HTTP {}", status.as_u16());
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ConvertError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| ConvertError::InvalidUrl {
            url: url.to_string(),
        })?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(ConvertError::network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConvertError::RemoteApi {
                message: format!("HTTP {}", status.as_u16()),
            });
        }
        let bytes = response.bytes().await.map_err(ConvertError::network)?;
        Ok(bytes.to_vec())
    }
}

/// Map a non-2xx API response to `RemoteApi`, preferring the decoded
/// `{"message": …}` body over the bare status code.
pub fn api_error(status: u16, body: &[u8]) -> ConvertError {
    let message = serde_json::from_slice::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| format!("HTTP {status}"));
    ConvertError::RemoteApi { message }
}

/// Encode a multipart/form-data body.
///
/// Layout: one text part per form parameter (in key order), then a single
/// `file` part carrying `bytes` verbatim as `application/octet-stream`.
/// Pre-signed forms usually require the policy fields to precede the file.
pub fn encode_multipart(
    parameters: &BTreeMap<String, String>,
    bytes: &[u8],
    filename: &str,
    boundary: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256 * (parameters.len() + 1));

    for (key, value) in parameters {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quoted(key)
            )
            .as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            escape_quoted(filename)
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {OCTET_STREAM}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn escape_quoted(s: &str) -> String {
    s.replace('"', "%22").replace(['\r', '\n'], " ")
}

/// First 500 bytes of a body, lossily decoded, for log lines.
fn preview(bytes: &[u8]) -> String {
    let end = bytes.len().min(500);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        [("key", "abc"), ("policy", "xyz")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn multipart_fields_then_single_file_part() {
        let body = encode_multipart(&params(), b"hello", "a.txt", "BOUNDARY");
        let text = String::from_utf8(body).unwrap();
        let expected = "--BOUNDARY\r\n\
Content-Disposition: form-data; name=\"key\"\r\n\r\n\
abc\r\n\
--BOUNDARY\r\n\
Content-Disposition: form-data; name=\"policy\"\r\n\r\n\
xyz\r\n\
--BOUNDARY\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
Content-Type: application/octet-stream\r\n\r\n\
hello\r\n\
--BOUNDARY--\r\n";
        assert_eq!(text, expected);
        assert_eq!(text.matches("name=\"file\"").count(), 1);
    }

    #[test]
    fn multipart_file_bytes_are_not_transcoded() {
        let payload: Vec<u8> = (0u8..=255).chain([0xff, 0xfe, 0x00, b'\r', b'\n']).collect();
        let body = encode_multipart(&BTreeMap::new(), &payload, "blob.bin", "B");
        let header_end = body
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("part header terminator")
            + 4;
        let trailer = b"\r\n--B--\r\n";
        assert!(body.ends_with(trailer));
        assert_eq!(&body[header_end..body.len() - trailer.len()], payload.as_slice());
    }

    #[test]
    fn multipart_escapes_quotes_in_filename() {
        let body = encode_multipart(&BTreeMap::new(), b"", "we\"ird.pdf", "B");
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("filename=\"we%22ird.pdf\""), "got: {text}");
    }

    #[test]
    fn api_error_prefers_message_body() {
        let err = api_error(422, br#"{"message": "The given data was invalid.", "code": "INVALID_DATA"}"#);
        assert_eq!(err.to_string(), "The given data was invalid.");
    }

    #[test]
    fn api_error_falls_back_to_status() {
        let err = api_error(502, b"<html>Bad Gateway</html>");
        assert!(matches!(err, ConvertError::RemoteApi { ref message } if message == "HTTP 502"));
    }

    #[test]
    fn api_url_joins_base_and_endpoint() {
        let config = ClientConfig::builder()
            .api_key("k")
            .base_url("https://api.example.com/v2")
            .build()
            .unwrap();
        let t = HttpTransport::new(&config).unwrap();
        assert_eq!(
            t.api_url("/jobs/abc").unwrap().as_str(),
            "https://api.example.com/v2/jobs/abc"
        );
    }

    #[test]
    fn api_url_uses_config_endpoint_join() {
        let config = ClientConfig::builder()
            .api_key("k")
            .base_url("https://api.sandbox.example/v2/")
            .build()
            .unwrap();
        let t = HttpTransport::new(&config).unwrap();
        assert_eq!(t.api_url("tasks/1").unwrap().as_str(), config.endpoint("/tasks/1"));
    }

    #[tokio::test]
    async fn upload_to_malformed_url_is_invalid_url() {
        let config = ClientConfig::builder().api_key("k").build().unwrap();
        let t = HttpTransport::new(&config).unwrap();
        let target = UploadTarget {
            url: "not a url".into(),
            parameters: BTreeMap::new(),
        };
        let err = t.upload_multipart(&target, b"x", "x.bin").await.unwrap_err();
        assert!(matches!(err, ConvertError::InvalidUrl { .. }), "got: {err:?}");
    }

    // ── Wire behaviour against a one-shot local server ──────────────────

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one request on 127.0.0.1 with `status` and `body`. The handle
    /// yields the raw request, lowercased.
    async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
        let reply = format!(
            "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        serve_raw_once(reply).await
    }

    /// Write `reply` verbatim in answer to one request.
    async fn serve_raw_once(reply: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .map(|v| v.trim().parse::<usize>().unwrap())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_ascii_lowercase()
        });
        (format!("http://{addr}"), server)
    }

    fn local(base_url: &str) -> HttpTransport {
        let config = ClientConfig::builder()
            .api_key("secret-key")
            .base_url(base_url)
            .build()
            .unwrap();
        HttpTransport::new(&config).unwrap()
    }

    #[tokio::test]
    async fn api_request_carries_bearer_and_json_content_type() {
        let (base, server) = serve_once(200, r#"{"data":{"id":"j1"}}"#).await;
        let body = serde_json::json!({"tasks": {}});

        let bytes = local(&base)
            .request(Method::POST, "/jobs", Some(&body))
            .await
            .unwrap();
        assert_eq!(bytes, br#"{"data":{"id":"j1"}}"#);

        let seen = server.await.unwrap();
        assert!(seen.starts_with("post /jobs http/1.1"), "got: {seen}");
        assert!(seen.contains("authorization: bearer secret-key"), "got: {seen}");
        assert!(seen.contains("content-type: application/json"), "got: {seen}");
        assert!(seen.ends_with(r#"{"tasks":{}}"#), "got: {seen}");
    }

    #[tokio::test]
    async fn api_error_body_message_becomes_remote_api() {
        let (base, server) = serve_once(422, r#"{"message":"bad things","code":"INVALID"}"#).await;
        let err = local(&base)
            .request(Method::GET, "/jobs/x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::RemoteApi { ref message } if message == "bad things"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn api_error_without_message_is_http_status() {
        let (base, server) = serve_once(500, "oops").await;
        let err = local(&base)
            .request(Method::GET, "/jobs/x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::RemoteApi { ref message } if message == "HTTP 500"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn truncated_error_body_still_maps_to_http_status() {
        let reply = "HTTP/1.1 502 Bad Gateway\r\ncontent-length: 100\r\n\
                     connection: close\r\n\r\npartial"
            .to_string();
        let (base, server) = serve_raw_once(reply).await;
        let err = local(&base)
            .request(Method::GET, "/jobs/x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::RemoteApi { ref message } if message == "HTTP 502"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn upload_is_unauthenticated_multipart() {
        let (base, server) = serve_once(201, "").await;
        let target = UploadTarget {
            url: format!("{base}/bucket"),
            parameters: params(),
        };

        local("https://api.example.com/v2")
            .upload_multipart(&target, b"hello", "a.txt")
            .await
            .unwrap();

        let seen = server.await.unwrap();
        assert!(seen.starts_with("post /bucket http/1.1"), "got: {seen}");
        assert!(!seen.contains("authorization:"), "got: {seen}");
        assert!(seen.contains("content-type: multipart/form-data; boundary="), "got: {seen}");
        assert!(seen.contains("name=\"policy\"\r\n\r\nxyz\r\n"), "got: {seen}");
        assert!(seen.contains("filename=\"a.txt\""), "got: {seen}");
    }

    #[tokio::test]
    async fn rejected_upload_is_upload_failed() {
        let (base, server) = serve_once(403, "denied").await;
        let target = UploadTarget {
            url: format!("{base}/bucket"),
            parameters: BTreeMap::new(),
        };
        let err = local("https://api.example.com/v2")
            .upload_multipart(&target, b"x", "x.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::UploadFailed { ref reason } if reason == "HTTP 403"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn download_is_unauthenticated_and_maps_status() {
        let (base, server) = serve_once(200, "%PDF-1.7").await;
        let bytes = local("https://api.example.com/v2")
            .download(&format!("{base}/out.pdf"))
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
        let seen = server.await.unwrap();
        assert!(seen.starts_with("get /out.pdf http/1.1"), "got: {seen}");
        assert!(!seen.contains("authorization:"), "got: {seen}");

        let (base, server) = serve_once(404, "").await;
        let err = local("https://api.example.com/v2")
            .download(&format!("{base}/gone.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::RemoteApi { ref message } if message == "HTTP 404"));
        server.await.unwrap();
    }
}
