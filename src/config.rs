//! Request configuration model
//!
//! The option resolver accumulates into a mutable [`RequestConfigBuilder`];
//! [`RequestConfigBuilder::build`] finalizes it into an immutable
//! [`RequestConfig`] so the executor never observes a partially-mutated
//! configuration and configs can be safely cloned for retries.
//!
//! # Why IndexMap?
//!
//! Header insertion order is preserved for trace output, while lookups are
//! case-insensitive. [`IndexMap`] gives us ordered storage; the
//! case-insensitive view is layered on top in [`Headers`].

use indexmap::IndexMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{Error, ParseReason, Result};

/// Default redirect cap, matching curl's `--max-redirs` default.
pub const DEFAULT_MAX_REDIRECTS: u32 = 50;

/// HTTP method, with custom verbs preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Custom(String),
}

impl Method {
    /// Map a `--request` value onto a method, keeping unknown verbs as-is.
    pub fn from_token(token: &str) -> Method {
        match token.to_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            _ => Method::Custom(token.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Custom(verb) => verb,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, case-insensitive header map.
///
/// Keys keep the case they were supplied with for display; lookups and
/// overwrites ignore case. A later `-H` for the same key replaces the
/// earlier one rather than appending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: IndexMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    /// Insert or overwrite a header. The replacement keeps the new key's
    /// case and moves the header to the end of the ordering.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let existing = self
            .entries
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&name))
            .cloned();
        if let Some(key) = existing {
            self.entries.shift_remove(&key);
        }
        self.entries.insert(name, value.into());
    }

    /// Insert only if no header with this name exists yet.
    pub fn set_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.entries.insert(name, value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        let existing = self
            .entries
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned();
        if let Some(key) = existing {
            self.entries.shift_remove(&key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

/// One part of a multipart body built from `-F`.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    /// `-F key=value`
    Field { name: String, value: String },
    /// `-F key=@path`
    File { name: String, path: PathBuf },
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    None,
    Text(String),
    Binary(Vec<u8>),
    Multipart(Vec<MultipartPart>),
}

impl Body {
    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }
}

/// `user:password` credentials from `-u` / `--proxy-user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Split on the first colon; a value with no colon becomes `(user, "")`.
    pub fn parse(value: &str) -> Credentials {
        match value.split_once(':') {
            Some((user, pass)) => Credentials {
                username: user.to_string(),
                password: pass.to_string(),
            },
            None => Credentials {
                username: value.to_string(),
                password: String::new(),
            },
        }
    }
}

/// `--continue-at` value: a byte offset, or `-` for auto-resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    Offset(u64),
    Auto,
}

/// `--resolve host:port:address` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveEntry {
    pub host: String,
    pub port: u16,
    pub address: String,
}

/// HTTP version pin from `--http1.0` / `--http1.1` / `--http2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
    Http2,
}

/// Retry policy from `--retry`, `--retry-delay`, `--retry-max-time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub count: u32,
    pub delay: Duration,
    pub max_time: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            count: 0,
            delay: Duration::from_secs(1),
            max_time: None,
        }
    }
}

/// The canonical, immutable-once-built representation of a parsed command.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub url: String,
    pub method: Method,
    pub headers: Headers,
    pub body: Body,
    pub credentials: Option<Credentials>,
    pub proxy_credentials: Option<Credentials>,
    pub proxy: Option<String>,
    pub socks_proxy: Option<String>,
    pub follow_redirects: bool,
    pub location_trusted: bool,
    pub max_redirects: u32,
    pub insecure_tls: bool,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_cert_file: Option<PathBuf>,
    pub connect_timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,
    pub range: Option<String>,
    pub resume_from: Option<ResumePoint>,
    pub speed_limit: Option<u64>,
    pub speed_time: Option<Duration>,
    pub keepalive_time: Option<Duration>,
    pub output_file: Option<PathBuf>,
    pub use_remote_file_name: bool,
    pub create_dirs: bool,
    pub include_headers_in_body: bool,
    pub head_only: bool,
    pub verbose: bool,
    pub silent: bool,
    pub show_error: bool,
    pub fail_on_http_error: bool,
    pub compressed: bool,
    pub write_out_template: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub cookie: Option<String>,
    pub cookie_jar: Option<PathBuf>,
    pub http_version: Option<HttpVersion>,
    pub interface: Option<String>,
    pub dns_servers: Option<String>,
    pub resolve: Vec<ResolveEntry>,
    pub upload_file: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub original_command: String,
}

/// Mutable accumulation target for the option resolver.
#[derive(Debug, Clone, Default)]
pub struct RequestConfigBuilder {
    pub url: Option<String>,
    pub method: Method,
    /// Set when `-X`/`-I`/`-T` picked the method, so body-bearing options
    /// don't override it with the implicit POST.
    pub method_explicit: bool,
    pub headers: Headers,
    pub body: Body,
    pub credentials: Option<Credentials>,
    pub proxy_credentials: Option<Credentials>,
    pub proxy: Option<String>,
    pub socks_proxy: Option<String>,
    pub follow_redirects: bool,
    pub location_trusted: bool,
    pub max_redirects: Option<u32>,
    pub insecure_tls: bool,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub ca_cert_file: Option<PathBuf>,
    pub connect_timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,
    pub range: Option<String>,
    pub resume_from: Option<ResumePoint>,
    pub speed_limit: Option<u64>,
    pub speed_time: Option<Duration>,
    pub keepalive_time: Option<Duration>,
    pub output_file: Option<PathBuf>,
    pub use_remote_file_name: bool,
    pub create_dirs: bool,
    pub include_headers_in_body: bool,
    pub head_only: bool,
    pub verbose: bool,
    pub silent: bool,
    pub show_error: bool,
    pub fail_on_http_error: bool,
    pub compressed: bool,
    pub write_out_template: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub cookie: Option<String>,
    pub cookie_jar: Option<PathBuf>,
    pub http_version: Option<HttpVersion>,
    pub interface: Option<String>,
    pub dns_servers: Option<String>,
    pub resolve: Vec<ResolveEntry>,
    pub upload_file: Option<PathBuf>,
    pub retry: RetryPolicy,
    /// `-G`: move `--data` into the query string and keep GET.
    pub get_with_data: bool,
}

impl RequestConfigBuilder {
    /// Append a `--data` value, concatenating with `&` when data was
    /// already supplied, and default the method to POST if still GET.
    pub fn append_data(&mut self, value: &str) {
        match &mut self.body {
            Body::Text(existing) => {
                existing.push('&');
                existing.push_str(value);
            }
            _ => self.body = Body::Text(value.to_string()),
        }
        self.default_to_post();
    }

    /// Add a multipart part, defaulting the method to POST.
    pub fn push_part(&mut self, part: MultipartPart) {
        match &mut self.body {
            Body::Multipart(parts) => parts.push(part),
            _ => self.body = Body::Multipart(vec![part]),
        }
        self.default_to_post();
    }

    fn default_to_post(&mut self) {
        if !self.method_explicit && self.method == Method::Get {
            self.method = Method::Post;
        }
    }

    /// Finalize into an immutable [`RequestConfig`].
    ///
    /// Fails with `MissingUrl` when no positional URL token was seen.
    /// `-G` is applied here: text data moves into the query string and
    /// the method stays GET.
    pub fn build(mut self, original_command: &str) -> Result<RequestConfig> {
        let mut url = self.url.ok_or(Error::MalformedCommand {
            reason: ParseReason::MissingUrl,
        })?;

        if self.get_with_data && !self.method_explicit {
            if let Body::Text(data) = &self.body {
                let sep = if url.contains('?') { '&' } else { '?' };
                url.push(sep);
                url.push_str(data);
                self.body = Body::None;
                self.method = Method::Get;
            }
        }

        if self.head_only {
            self.method = Method::Head;
        }

        Ok(RequestConfig {
            url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            credentials: self.credentials,
            proxy_credentials: self.proxy_credentials,
            proxy: self.proxy,
            socks_proxy: self.socks_proxy,
            follow_redirects: self.follow_redirects,
            location_trusted: self.location_trusted,
            max_redirects: self.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
            insecure_tls: self.insecure_tls,
            cert_file: self.cert_file,
            key_file: self.key_file,
            ca_cert_file: self.ca_cert_file,
            connect_timeout: self.connect_timeout,
            total_timeout: self.total_timeout,
            range: self.range,
            resume_from: self.resume_from,
            speed_limit: self.speed_limit,
            speed_time: self.speed_time,
            keepalive_time: self.keepalive_time,
            output_file: self.output_file,
            use_remote_file_name: self.use_remote_file_name,
            create_dirs: self.create_dirs,
            include_headers_in_body: self.include_headers_in_body,
            head_only: self.head_only,
            verbose: self.verbose,
            silent: self.silent,
            show_error: self.show_error,
            fail_on_http_error: self.fail_on_http_error,
            compressed: self.compressed,
            write_out_template: self.write_out_template,
            user_agent: self.user_agent,
            referer: self.referer,
            cookie: self.cookie,
            cookie_jar: self.cookie_jar,
            http_version: self.http_version,
            interface: self.interface,
            dns_servers: self.dns_servers,
            resolve: self.resolve,
            upload_file: self.upload_file,
            retry: self.retry,
            original_command: original_command.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive_overwrite() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        headers.set("content-type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_headers_preserve_insertion_order() {
        let mut headers = Headers::new();
        headers.set("B", "2");
        headers.set("A", "1");
        let names: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_method_from_token() {
        assert_eq!(Method::from_token("post"), Method::Post);
        assert_eq!(Method::from_token("PATCH"), Method::Patch);
        assert_eq!(
            Method::from_token("PROPFIND"),
            Method::Custom("PROPFIND".to_string())
        );
    }

    #[test]
    fn test_credentials_split_on_first_colon() {
        let creds = Credentials::parse("bob:se:cret");
        assert_eq!(creds.username, "bob");
        assert_eq!(creds.password, "se:cret");

        let no_pass = Credentials::parse("bob");
        assert_eq!(no_pass.username, "bob");
        assert_eq!(no_pass.password, "");
    }

    #[test]
    fn test_data_concatenation_defaults_post() {
        let mut builder = RequestConfigBuilder::default();
        builder.append_data("a=1");
        builder.append_data("b=2");
        assert_eq!(builder.body, Body::Text("a=1&b=2".to_string()));
        assert_eq!(builder.method, Method::Post);
    }

    #[test]
    fn test_explicit_method_survives_data() {
        let mut builder = RequestConfigBuilder::default();
        builder.method = Method::Put;
        builder.method_explicit = true;
        builder.append_data("a=1");
        assert_eq!(builder.method, Method::Put);
    }

    #[test]
    fn test_build_requires_url() {
        let builder = RequestConfigBuilder::default();
        let err = builder.build("curl").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedCommand {
                reason: ParseReason::MissingUrl
            }
        ));
    }

    #[test]
    fn test_build_applies_get_with_data() {
        let mut builder = RequestConfigBuilder::default();
        builder.url = Some("http://example.test/search".to_string());
        builder.get_with_data = true;
        builder.append_data("q=rust");
        let config = builder.build("curl -G -d q=rust http://example.test/search").unwrap();
        assert_eq!(config.url, "http://example.test/search?q=rust");
        assert_eq!(config.method, Method::Get);
        assert!(config.body.is_none());
    }

    #[test]
    fn test_default_max_redirects() {
        let mut builder = RequestConfigBuilder::default();
        builder.url = Some("http://example.test".to_string());
        let config = builder.build("curl http://example.test").unwrap();
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
    }
}
