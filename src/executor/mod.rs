//! Request execution state machine
//!
//! Turns a [`RequestConfig`] into one or more transport calls:
//! `Dispatching -> {Complete | Redirecting -> Dispatching | Failed}`.
//! The transport itself sits behind the [`Transport`] trait so the state
//! machine is exercised against a mock in tests; the reqwest-backed
//! implementation lives in [`transport`].

pub mod transport;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::config::{Body, Headers, Method, MultipartPart, RequestConfig, ResumePoint};
use crate::errors::{Error, Result, TimeoutPhase};
use crate::response::Timings;

pub use transport::HttpTransport;

/// One wire request, ready for a transport to send.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// One wire response, as the transport saw it.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// e.g. `HTTP/1.1`
    pub version: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// A stateless per-hop dependency; the connection pool it wraps is owned by
/// the caller, not the state machine.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        config: &'a RequestConfig,
        request: TransportRequest,
    ) -> BoxFuture<'a, Result<TransportResponse>>;
}

/// One request/response pair within a redirect chain, kept for the
/// verbose trace and the include-headers blocks.
#[derive(Debug, Clone)]
pub struct HopRecord {
    pub method: String,
    pub url: String,
    pub request_headers: Vec<(String, String)>,
    pub status: u16,
    pub version: String,
    pub response_headers: Headers,
}

/// The final response plus everything the assembler needs about the chain.
#[derive(Debug)]
pub struct Exchange {
    pub response: TransportResponse,
    pub final_url: Url,
    pub hops: Vec<HopRecord>,
    pub timings: Timings,
}

/// A body prepared once per run; redirect hops reuse or drop it.
#[derive(Debug, Clone)]
struct PreparedBody {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

enum State {
    Dispatching {
        url: Url,
        method: Method,
        body: Option<PreparedBody>,
        redirects: u32,
    },
    Redirecting {
        response: TransportResponse,
        url: Url,
        method: Method,
        body: Option<PreparedBody>,
        redirects: u32,
    },
    Complete {
        response: TransportResponse,
        url: Url,
    },
}

pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        RequestExecutor { transport }
    }

    /// Run the state machine, bounded by `--max-time` when set.
    pub async fn execute(
        &self,
        config: &RequestConfig,
        cancel: &CancellationToken,
    ) -> Result<Exchange> {
        match config.total_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(config, cancel))
                .await
                .map_err(|_| Error::Timeout {
                    phase: TimeoutPhase::Total,
                    after: limit,
                })?,
            None => self.run(config, cancel).await,
        }
    }

    async fn run(&self, config: &RequestConfig, cancel: &CancellationToken) -> Result<Exchange> {
        let initial_url = parse_target_url(&config.url)?;
        let origin_host = initial_url.host_str().unwrap_or_default().to_string();

        // HEAD never carries a body.
        let prepared = if config.head_only {
            None
        } else {
            prepare_body(config)?
        };

        let started = Instant::now();
        let mut redirect_elapsed = Duration::ZERO;
        let mut hops: Vec<HopRecord> = Vec::new();

        let mut state = State::Dispatching {
            url: initial_url,
            method: config.method.clone(),
            body: prepared,
            redirects: 0,
        };

        loop {
            state = match state {
                State::Dispatching {
                    url,
                    method,
                    body,
                    redirects,
                } => {
                    // Credentials only travel to the origin host, unless
                    // --location-trusted says otherwise.
                    let send_auth = config.location_trusted
                        || url.host_str().unwrap_or_default() == origin_host;
                    let headers = build_wire_headers(config, body.as_ref(), send_auth);
                    let request = TransportRequest {
                        method: method.as_str().to_string(),
                        url: url.clone(),
                        headers: headers.clone(),
                        body: body.as_ref().map(|b| b.bytes.clone()),
                    };
                    trace!(method = %method, url = %url, hop = redirects, "dispatching");

                    let response = tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Aborted),
                        sent = self.transport.send(config, request) => sent?,
                    };

                    hops.push(HopRecord {
                        method: method.as_str().to_string(),
                        url: url.to_string(),
                        request_headers: headers,
                        status: response.status,
                        version: response.version.clone(),
                        response_headers: response.headers.clone(),
                    });

                    if config.follow_redirects && is_redirect_status(response.status) {
                        State::Redirecting {
                            response,
                            url,
                            method,
                            body,
                            redirects,
                        }
                    } else {
                        State::Complete { response, url }
                    }
                }
                State::Redirecting {
                    response,
                    url,
                    method,
                    body,
                    redirects,
                } => {
                    if redirects >= config.max_redirects {
                        return Err(Error::TooManyRedirects(config.max_redirects));
                    }
                    let location = response
                        .headers
                        .get("location")
                        .ok_or_else(|| Error::Protocol("redirect missing Location".to_string()))?;
                    let next_url = url.join(location).map_err(|e| {
                        Error::Protocol(format!("invalid redirect URL '{}': {}", location, e))
                    })?;

                    // 301/302 rewrite POST to GET and drop the body, 303
                    // forces GET for everything but HEAD; 307/308 preserve
                    // the method and body.
                    let (next_method, next_body) = match response.status {
                        301 | 302 if method == Method::Post => (Method::Get, None),
                        303 if method != Method::Head => (Method::Get, None),
                        _ => (method, body),
                    };

                    redirect_elapsed = started.elapsed();
                    debug!(
                        status = response.status,
                        location = %next_url,
                        hop = redirects + 1,
                        "following redirect"
                    );
                    State::Dispatching {
                        url: next_url,
                        method: next_method,
                        body: next_body,
                        redirects: redirects + 1,
                    }
                }
                State::Complete { response, url } => {
                    let total = started.elapsed();
                    let timings = Timings {
                        start_transfer: total.as_millis() as u64,
                        redirect_time: redirect_elapsed.as_millis() as u64,
                        total: total.as_millis() as u64,
                        ..Timings::default()
                    };
                    return Ok(Exchange {
                        response,
                        final_url: url,
                        hops,
                        timings,
                    });
                }
            };
        }
    }
}

fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Parse the target URL, defaulting to `http://` like curl when the scheme
/// is missing, and rejecting schemes outside http/https/file.
fn parse_target_url(raw: &str) -> Result<Url> {
    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{}", raw)).map_err(|e| Error::malformed(format!("invalid URL '{}': {}", raw, e)))?
        }
        Err(e) => return Err(Error::malformed(format!("invalid URL '{}': {}", raw, e))),
    };
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed),
        other => Err(Error::UnsupportedProtocol(other.to_string())),
    }
}

pub(crate) const USER_AGENT_STRING: &str = concat!("recurl/", env!("CARGO_PKG_VERSION"));

/// Build the wire headers for one hop. Defaults first, then the user's
/// headers overlaid so an explicit `-H` always wins.
fn build_wire_headers(
    config: &RequestConfig,
    body: Option<&PreparedBody>,
    send_auth: bool,
) -> Vec<(String, String)> {
    let mut headers = Headers::new();
    headers.set("User-Agent", config.user_agent.clone().unwrap_or_else(|| USER_AGENT_STRING.to_string()));

    if let Some(referer) = &config.referer {
        headers.set("Referer", referer.clone());
    }
    if let Some(cookie) = &config.cookie {
        // `-b name=value`; a pathname (cookie-jar read) is a collaborator
        // concern and is skipped here.
        if cookie.contains('=') {
            headers.set("Cookie", cookie.clone());
        }
    }
    if let Some(range) = range_header(config) {
        headers.set("Range", range);
    }
    if config.compressed {
        headers.set("Accept-Encoding", "gzip, deflate, br, zstd");
    }
    if send_auth && !config.headers.contains("authorization") {
        if let Some(creds) = &config.credentials {
            let token = BASE64.encode(format!("{}:{}", creds.username, creds.password));
            headers.set("Authorization", format!("Basic {}", token));
        }
    }
    if let Some(creds) = &config.proxy_credentials {
        let token = BASE64.encode(format!("{}:{}", creds.username, creds.password));
        headers.set("Proxy-Authorization", format!("Basic {}", token));
    }

    for (name, value) in config.headers.iter() {
        headers.set(name.to_string(), value.to_string());
    }

    if let Some(content_type) = body.and_then(|b| b.content_type.as_deref()) {
        headers.set_if_absent("Content-Type", content_type.to_string());
    }

    headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `-r`/`-C` both land in the Range header. `--continue-at -` resumes from
/// the current length of the output file when one exists.
fn range_header(config: &RequestConfig) -> Option<String> {
    if let Some(range) = &config.range {
        return Some(if range.starts_with("bytes=") {
            range.clone()
        } else {
            format!("bytes={}", range)
        });
    }
    match config.resume_from? {
        ResumePoint::Offset(offset) => Some(format!("bytes={}-", offset)),
        ResumePoint::Auto => {
            let path = config.output_file.as_ref()?;
            let len = std::fs::metadata(path).ok()?.len();
            Some(format!("bytes={}-", len))
        }
    }
}

/// Build the request body once per run: multipart when form parts exist,
/// raw bytes for binary/upload, text with a form-urlencoded default
/// content type unless the caller supplied one.
fn prepare_body(config: &RequestConfig) -> Result<Option<PreparedBody>> {
    if let Some(path) = &config.upload_file {
        let bytes = std::fs::read(path).map_err(|source| Error::ReadError {
            path: path.clone(),
            source,
        })?;
        return Ok(Some(PreparedBody {
            bytes,
            content_type: Some("application/octet-stream".to_string()),
        }));
    }

    match &config.body {
        Body::None => Ok(None),
        Body::Text(text) => Ok(Some(PreparedBody {
            bytes: text.clone().into_bytes(),
            content_type: Some("application/x-www-form-urlencoded".to_string()),
        })),
        Body::Binary(bytes) => Ok(Some(PreparedBody {
            bytes: bytes.clone(),
            content_type: None,
        })),
        Body::Multipart(parts) => {
            let boundary = multipart_boundary();
            let bytes = encode_multipart(parts, &boundary)?;
            Ok(Some(PreparedBody {
                bytes,
                content_type: Some(format!("multipart/form-data; boundary={}", boundary)),
            }))
        }
    }
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("------------------------{:024x}", nanos ^ (std::process::id() as u128))
}

fn encode_multipart(parts: &[MultipartPart], boundary: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match part {
            MultipartPart::Field { name, value } => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        name
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
            }
            MultipartPart::File { name, path } => {
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("file");
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name,
                        filename,
                        guess_mime_type(path)
                    )
                    .as_bytes(),
                );
                let contents = std::fs::read(path).map_err(|source| Error::ReadError {
                    path: path.clone(),
                    source,
                })?;
                out.extend_from_slice(&contents);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    Ok(out)
}

/// Guess a MIME type from the file extension.
pub(crate) fn guess_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
