//! reqwest-backed transport
//!
//! One [`HttpTransport::send`] call performs exactly one hop: the client is
//! built with redirects disabled so the state machine in the parent module
//! owns the redirect chain. `file://` URLs are served locally with a
//! synthetic status so commands copied from docs still produce a response
//! shape the assembler understands.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;
use url::Url;

use crate::config::{Headers, HttpVersion, RequestConfig};
use crate::errors::{Error, Result, TimeoutPhase};
use crate::executor::{guess_mime_type, Transport, TransportRequest, TransportResponse};

pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        HttpTransport::new()
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        config: &'a RequestConfig,
        request: TransportRequest,
    ) -> BoxFuture<'a, Result<TransportResponse>> {
        Box::pin(async move {
            if request.url.scheme() == "file" {
                return fetch_file(&request.url);
            }

            let client = build_client(config, request.url.as_str())?;
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|_| Error::Protocol(format!("invalid method '{}'", request.method)))?;

            let mut builder = client.request(method, request.url.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| map_send_error(e, config, &request.url))?;

            let status = response.status().as_u16();
            let version = format!("{:?}", response.version());
            let headers = collect_headers(response.headers());
            let body = response
                .bytes()
                .await
                .map_err(|e| map_send_error(e, config, &request.url))?
                .to_vec();

            Ok(TransportResponse {
                status,
                version,
                headers,
                body,
            })
        })
    }
}

/// Duplicate response headers (Set-Cookie and friends) are folded into a
/// single comma-joined value so the ordered map stays one-entry-per-name.
fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map.iter() {
        let value = value.to_str().unwrap_or_default();
        match headers.get(name.as_str()) {
            Some(existing) => {
                let combined = format!("{}, {}", existing, value);
                headers.set(name.as_str(), combined);
            }
            None => headers.set(name.as_str(), value),
        }
    }
    headers
}

/// Serve a `file://` URL from the local filesystem: 200 with the file's
/// contents, 404 when it does not exist.
fn fetch_file(url: &Url) -> Result<TransportResponse> {
    let path = url
        .to_file_path()
        .map_err(|_| Error::Protocol(format!("invalid file URL '{}'", url)))?;

    match std::fs::read(&path) {
        Ok(body) => {
            let mut headers = Headers::new();
            headers.set("Content-Type", guess_mime_type(&path));
            headers.set("Content-Length", body.len().to_string());
            Ok(TransportResponse {
                status: 200,
                version: "HTTP/1.1".to_string(),
                headers,
                body,
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TransportResponse {
            status: 404,
            version: "HTTP/1.1".to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }),
        Err(source) => Err(Error::ReadError { path, source }),
    }
}

/// Build a one-hop client for this configuration. Redirects stay disabled
/// here; following them is the executor's job.
fn build_client(config: &RequestConfig, url: &str) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .referer(false);

    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    if config.insecure_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(ca_path) = &config.ca_cert_file {
        let ca_data = std::fs::read(ca_path).map_err(|source| Error::ReadError {
            path: ca_path.clone(),
            source,
        })?;
        let cert = reqwest::Certificate::from_pem(&ca_data)
            .map_err(|e| Error::TlsVerificationFailed(format!("invalid CA certificate: {}", e)))?;
        builder = builder.add_root_certificate(cert);
    }
    if let Some(cert_path) = &config.cert_file {
        let mut pem = std::fs::read(cert_path).map_err(|source| Error::ReadError {
            path: cert_path.clone(),
            source,
        })?;
        if let Some(key_path) = &config.key_file {
            let key_data = std::fs::read(key_path).map_err(|source| Error::ReadError {
                path: key_path.clone(),
                source,
            })?;
            pem.extend_from_slice(&key_data);
        }
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| Error::TlsVerificationFailed(format!("invalid client certificate: {}", e)))?;
        builder = builder.identity(identity);
    }

    if let Some(socks) = &config.socks_proxy {
        let socks_url = if socks.contains("://") {
            socks.clone()
        } else {
            format!("socks5://{}", socks)
        };
        let proxy = reqwest::Proxy::all(&socks_url)
            .map_err(|e| Error::malformed(format!("invalid SOCKS proxy '{}': {}", socks, e)))?;
        builder = builder.proxy(proxy);
    }
    if let Some(proxy_url) = &config.proxy {
        let mut proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| Error::malformed(format!("invalid proxy '{}': {}", proxy_url, e)))?;
        if let Some(creds) = &config.proxy_credentials {
            proxy = proxy.basic_auth(&creds.username, &creds.password);
        }
        builder = builder.proxy(proxy);
    }

    for entry in &config.resolve {
        match entry.address.parse::<IpAddr>() {
            Ok(addr) => {
                builder = builder.resolve(&entry.host, SocketAddr::new(addr, entry.port));
            }
            Err(_) => warn!(host = %entry.host, address = %entry.address, "ignoring unparseable resolve address"),
        }
    }

    if let Some(interface) = &config.interface {
        match interface.parse::<IpAddr>() {
            Ok(addr) => builder = builder.local_address(addr),
            Err(_) => warn!(interface = %interface, "ignoring non-IP interface value"),
        }
    }
    if let Some(keepalive) = config.keepalive_time {
        builder = builder.tcp_keepalive(Some(keepalive));
    }

    builder = match config.http_version {
        Some(HttpVersion::Http10 | HttpVersion::Http11) => builder.http1_only(),
        // Prior knowledge only makes sense for cleartext; over TLS the
        // version is negotiated via ALPN.
        Some(HttpVersion::Http2) if url.starts_with("http://") => builder.http2_prior_knowledge(),
        _ => builder,
    };

    builder
        .build()
        .map_err(|e| Error::Transfer(format!("failed to build HTTP client: {}", e)))
}

/// Fold a reqwest error into the curl-style taxonomy. DNS failures hide
/// inside the connect classification, so the source chain text is checked
/// before the broader `is_connect` bucket.
fn map_send_error(error: reqwest::Error, config: &RequestConfig, url: &Url) -> Error {
    let chain = error_chain_text(&error);

    if error.is_timeout() {
        return if error.is_connect() {
            Error::Timeout {
                phase: TimeoutPhase::Connect,
                after: config.connect_timeout.unwrap_or(Duration::ZERO),
            }
        } else {
            Error::Timeout {
                phase: TimeoutPhase::Total,
                after: config.total_timeout.unwrap_or(Duration::ZERO),
            }
        };
    }
    if chain.contains("dns") || chain.contains("resolve") || chain.contains("lookup") {
        return Error::DnsResolutionFailed(url.host_str().unwrap_or_default().to_string());
    }
    if error.is_connect() {
        return Error::ConnectionFailed {
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port_or_known_default().unwrap_or(0),
        };
    }
    if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        return Error::TlsVerificationFailed(error.to_string());
    }
    Error::Transfer(error.to_string())
}

fn error_chain_text(error: &reqwest::Error) -> String {
    let mut text = error.to_string().to_lowercase();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        text.push(' ');
        text.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }
    text
}
