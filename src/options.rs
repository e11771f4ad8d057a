//! Option resolution
//!
//! Maps a token list onto a [`RequestConfig`], applying curl's short/long
//! alias table, combined-short-flag expansion, and per-option
//! override/concatenation rules.
//!
//! The option table is a registry of descriptors rather than a hard-coded
//! branch per flag: adding an option is a data change. Unknown but
//! well-formed long options are ignored (never a hard failure) so pasted
//! real-world commands with flags we haven't modeled still execute.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::config::{
    Credentials, HttpVersion, Method, MultipartPart, RequestConfig, RequestConfigBuilder,
    ResolveEntry, ResumePoint,
};
use crate::errors::{Error, ParseReason, Result};

type Apply = fn(&mut RequestConfigBuilder, &str) -> Result<()>;

/// One entry in the option table.
pub struct OptionSpec {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    /// Whether the option consumes the following token as its value.
    pub takes_value: bool,
    apply: Apply,
}

/// Resolve a token list into an immutable [`RequestConfig`].
///
/// The first positional token becomes the URL; later positional tokens are
/// discarded. `--` ends option processing.
pub fn resolve(tokens: &[String], original_command: &str) -> Result<RequestConfig> {
    let mut builder = RequestConfigBuilder::default();
    let mut options_done = false;
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if !options_done && token == "--" {
            options_done = true;
            i += 1;
        } else if !options_done && token.starts_with("--") {
            i += apply_long(&mut builder, token, tokens.get(i + 1))?;
        } else if !options_done && token.starts_with('-') && token.len() > 1 {
            i += apply_short_cluster(&mut builder, token, tokens.get(i + 1))?;
        } else {
            if builder.url.is_none() {
                builder.url = Some(token.clone());
            } else {
                debug!(token = %token, "discarding extra positional token");
            }
            i += 1;
        }
    }

    builder.build(original_command)
}

/// curl's heuristic: the next token is a value unless it looks like a flag.
/// A lone `-` is a value (`--continue-at -`), never a flag.
fn value_of(next: Option<&String>) -> Option<&str> {
    match next {
        Some(t) if t == "-" || !t.starts_with('-') => Some(t.as_str()),
        _ => None,
    }
}

/// Apply one long option; returns how many tokens were consumed.
fn apply_long(
    builder: &mut RequestConfigBuilder,
    token: &str,
    next: Option<&String>,
) -> Result<usize> {
    let name = &token[2..];
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(Error::MalformedCommand {
            reason: ParseReason::UnknownOption(token.to_string()),
        });
    }

    match REGISTRY.get(token) {
        Some(spec) if spec.takes_value => match value_of(next) {
            Some(value) => {
                (spec.apply)(builder, value)?;
                Ok(2)
            }
            None => {
                debug!(option = %token, "option is missing its value, treating as valueless");
                Ok(1)
            }
        },
        Some(spec) => {
            (spec.apply)(builder, "")?;
            Ok(1)
        }
        None => {
            debug!(option = %token, "ignoring unrecognized option");
            // Skip what looks like the unknown option's value.
            if value_of(next).is_some() {
                Ok(2)
            } else {
                Ok(1)
            }
        }
    }
}

/// Apply a short flag or combined cluster (`-sSL`); returns tokens consumed.
///
/// Every letter is expanded. A value-taking letter either consumes the rest
/// of the cluster as its attached value (`-XPOST`) or the next token.
fn apply_short_cluster(
    builder: &mut RequestConfigBuilder,
    token: &str,
    next: Option<&String>,
) -> Result<usize> {
    let letters = &token[1..];
    for (idx, ch) in letters.char_indices() {
        let key = [b'-', ch as u8];
        let key = std::str::from_utf8(&key).unwrap_or("-");
        match REGISTRY.get(key) {
            Some(spec) if spec.takes_value => {
                let attached = &letters[idx + ch.len_utf8()..];
                if !attached.is_empty() {
                    (spec.apply)(builder, attached)?;
                    return Ok(1);
                }
                return match value_of(next) {
                    Some(value) => {
                        (spec.apply)(builder, value)?;
                        Ok(2)
                    }
                    None => {
                        debug!(option = %key, "flag is missing its value, treating as valueless");
                        Ok(1)
                    }
                };
            }
            Some(spec) => (spec.apply)(builder, "")?,
            None => debug!(flag = %ch, "ignoring unrecognized short flag"),
        }
    }
    Ok(1)
}

/// Parse a seconds value (fractions allowed) the way curl does.
fn parse_secs(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs >= 0.0 && secs.is_finite())
        .map(Duration::from_secs_f64)
}

/// Parse a size with an optional `k`/`m`/`g` suffix (case-insensitive).
fn parse_size(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    let lower = trimmed.to_ascii_lowercase();
    let (digits, multiplier) = if let Some(rest) = lower.strip_suffix('k') {
        (rest.to_string(), 1024u64)
    } else if let Some(rest) = lower.strip_suffix('m') {
        (rest.to_string(), 1024 * 1024)
    } else if let Some(rest) = lower.strip_suffix('g') {
        (rest.to_string(), 1024 * 1024 * 1024)
    } else {
        (lower, 1)
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
}

/// Read a `@file` data reference, stripping CR/LF the way `curl -d @file` does.
fn read_data_file(path: &str) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ReadError {
        path: PathBuf::from(path),
        source,
    })?;
    Ok(content.replace(['\r', '\n'], ""))
}

fn apply_header(builder: &mut RequestConfigBuilder, value: &str) -> Result<()> {
    match value.split_once(':') {
        Some((name, header_value)) => {
            builder
                .headers
                .set(name.trim().to_string(), header_value.trim().to_string());
        }
        None => debug!(header = %value, "ignoring header with no colon"),
    }
    Ok(())
}

fn apply_data(builder: &mut RequestConfigBuilder, value: &str) -> Result<()> {
    if let Some(path) = value.strip_prefix('@') {
        let content = read_data_file(path)?;
        builder.append_data(&content);
    } else {
        builder.append_data(value);
    }
    Ok(())
}

fn apply_data_binary(builder: &mut RequestConfigBuilder, value: &str) -> Result<()> {
    if let Some(path) = value.strip_prefix('@') {
        let bytes = std::fs::read(path).map_err(|source| Error::ReadError {
            path: PathBuf::from(path),
            source,
        })?;
        builder.body = crate::config::Body::Binary(bytes);
        if !builder.method_explicit && builder.method == Method::Get {
            builder.method = Method::Post;
        }
    } else {
        builder.append_data(value);
    }
    Ok(())
}

fn apply_data_urlencode(builder: &mut RequestConfigBuilder, value: &str) -> Result<()> {
    let encoded = match value.split_once('=') {
        Some((name, content)) if !name.is_empty() => {
            format!("{}={}", name, urlencoding::encode(content))
        }
        Some((_, content)) => urlencoding::encode(content).into_owned(),
        None => urlencoding::encode(value).into_owned(),
    };
    builder.append_data(&encoded);
    Ok(())
}

fn apply_form(builder: &mut RequestConfigBuilder, value: &str) -> Result<()> {
    match value.split_once('=') {
        Some((name, field)) => {
            let part = if let Some(path) = field.strip_prefix('@') {
                MultipartPart::File {
                    name: name.to_string(),
                    path: PathBuf::from(path),
                }
            } else {
                MultipartPart::Field {
                    name: name.to_string(),
                    value: field.to_string(),
                }
            };
            builder.push_part(part);
        }
        None => debug!(field = %value, "ignoring form field with no '='"),
    }
    Ok(())
}

fn apply_resolve(builder: &mut RequestConfigBuilder, value: &str) -> Result<()> {
    // host:port:address, where the address may itself contain colons (IPv6)
    let mut parts = value.splitn(3, ':');
    let (host, port, address) = (parts.next(), parts.next(), parts.next());
    match (host, port.and_then(|p| p.parse::<u16>().ok()), address) {
        (Some(host), Some(port), Some(address)) if !host.is_empty() && !address.is_empty() => {
            builder.resolve.push(ResolveEntry {
                host: host.to_string(),
                port,
                address: address.trim_matches(['[', ']']).to_string(),
            });
        }
        _ => warn!(entry = %value, "ignoring malformed --resolve entry"),
    }
    Ok(())
}

fn apply_continue_at(builder: &mut RequestConfigBuilder, value: &str) -> Result<()> {
    if value == "-" {
        builder.resume_from = Some(ResumePoint::Auto);
    } else if let Ok(offset) = value.parse::<u64>() {
        builder.resume_from = Some(ResumePoint::Offset(offset));
    } else {
        warn!(value = %value, "ignoring non-numeric --continue-at value");
    }
    Ok(())
}

fn no_op(_builder: &mut RequestConfigBuilder, _value: &str) -> Result<()> {
    Ok(())
}

/// The full option table. Canonical long names with their short aliases;
/// FTP-era flags are recognized (and consume their value where applicable)
/// but set no configuration.
static SPECS: &[OptionSpec] = &[
    OptionSpec {
        canonical: "--request",
        aliases: &["-X"],
        takes_value: true,
        apply: |b, v| {
            b.method = Method::from_token(v);
            b.method_explicit = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--header",
        aliases: &["-H"],
        takes_value: true,
        apply: apply_header,
    },
    OptionSpec {
        canonical: "--data",
        aliases: &["-d", "--data-ascii"],
        takes_value: true,
        apply: apply_data,
    },
    OptionSpec {
        canonical: "--data-raw",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.append_data(v);
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--data-binary",
        aliases: &[],
        takes_value: true,
        apply: apply_data_binary,
    },
    OptionSpec {
        canonical: "--data-urlencode",
        aliases: &[],
        takes_value: true,
        apply: apply_data_urlencode,
    },
    OptionSpec {
        canonical: "--form",
        aliases: &["-F"],
        takes_value: true,
        apply: apply_form,
    },
    OptionSpec {
        canonical: "--output",
        aliases: &["-o"],
        takes_value: true,
        apply: |b, v| {
            b.output_file = Some(PathBuf::from(v));
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--remote-name",
        aliases: &["-O"],
        takes_value: false,
        apply: |b, _| {
            b.use_remote_file_name = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--upload-file",
        aliases: &["-T"],
        takes_value: true,
        apply: |b, v| {
            b.upload_file = Some(PathBuf::from(v));
            if !b.method_explicit {
                b.method = Method::Put;
            }
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--include",
        aliases: &["-i"],
        takes_value: false,
        apply: |b, _| {
            b.include_headers_in_body = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--head",
        aliases: &["-I"],
        takes_value: false,
        apply: |b, _| {
            b.head_only = true;
            b.method = Method::Head;
            b.method_explicit = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--location",
        aliases: &["-L"],
        takes_value: false,
        apply: |b, _| {
            b.follow_redirects = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--location-trusted",
        aliases: &[],
        takes_value: false,
        apply: |b, _| {
            b.follow_redirects = true;
            b.location_trusted = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--max-redirs",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            match v.parse::<i64>() {
                // curl treats a negative cap as unlimited
                Ok(n) if n < 0 => b.max_redirects = Some(u32::MAX),
                Ok(n) => b.max_redirects = Some(n.min(u32::MAX as i64) as u32),
                Err(_) => warn!(value = %v, "ignoring non-numeric --max-redirs value"),
            }
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--insecure",
        aliases: &["-k"],
        takes_value: false,
        apply: |b, _| {
            b.insecure_tls = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--verbose",
        aliases: &["-v"],
        takes_value: false,
        apply: |b, _| {
            b.verbose = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--silent",
        aliases: &["-s"],
        takes_value: false,
        apply: |b, _| {
            b.silent = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--show-error",
        aliases: &["-S"],
        takes_value: false,
        apply: |b, _| {
            b.show_error = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--fail",
        aliases: &["-f"],
        takes_value: false,
        apply: |b, _| {
            b.fail_on_http_error = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--user-agent",
        aliases: &["-A"],
        takes_value: true,
        apply: |b, v| {
            b.user_agent = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--referer",
        aliases: &["-e"],
        takes_value: true,
        apply: |b, v| {
            b.referer = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--cookie",
        aliases: &["-b"],
        takes_value: true,
        apply: |b, v| {
            b.cookie = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--cookie-jar",
        aliases: &["-c"],
        takes_value: true,
        apply: |b, v| {
            b.cookie_jar = Some(PathBuf::from(v));
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--user",
        aliases: &["-u"],
        takes_value: true,
        apply: |b, v| {
            b.credentials = Some(Credentials::parse(v));
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--proxy",
        aliases: &["-x"],
        takes_value: true,
        apply: |b, v| {
            b.proxy = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--proxy-user",
        aliases: &["-U"],
        takes_value: true,
        apply: |b, v| {
            b.proxy_credentials = Some(Credentials::parse(v));
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--socks5",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.socks_proxy = Some(if v.contains("://") {
                v.to_string()
            } else {
                format!("socks5://{}", v)
            });
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--max-time",
        aliases: &["-m"],
        takes_value: true,
        apply: |b, v| {
            match parse_secs(v) {
                Some(t) => b.total_timeout = Some(t),
                None => warn!(value = %v, "ignoring non-numeric --max-time value"),
            }
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--connect-timeout",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            match parse_secs(v) {
                Some(t) => b.connect_timeout = Some(t),
                None => warn!(value = %v, "ignoring non-numeric --connect-timeout value"),
            }
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--compressed",
        aliases: &[],
        takes_value: false,
        apply: |b, _| {
            b.compressed = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--write-out",
        aliases: &["-w"],
        takes_value: true,
        apply: |b, v| {
            b.write_out_template = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--range",
        aliases: &["-r"],
        takes_value: true,
        apply: |b, v| {
            b.range = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--continue-at",
        aliases: &["-C"],
        takes_value: true,
        apply: apply_continue_at,
    },
    OptionSpec {
        canonical: "--cert",
        aliases: &["-E"],
        takes_value: true,
        apply: |b, v| {
            b.cert_file = Some(PathBuf::from(v));
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--key",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.key_file = Some(PathBuf::from(v));
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--cacert",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.ca_cert_file = Some(PathBuf::from(v));
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--interface",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.interface = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--http1.0",
        aliases: &["-0"],
        takes_value: false,
        apply: |b, _| {
            b.http_version = Some(HttpVersion::Http10);
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--http1.1",
        aliases: &[],
        takes_value: false,
        apply: |b, _| {
            b.http_version = Some(HttpVersion::Http11);
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--http2",
        aliases: &[],
        takes_value: false,
        apply: |b, _| {
            b.http_version = Some(HttpVersion::Http2);
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--limit-rate",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            match parse_size(v) {
                Some(n) => b.speed_limit = Some(n),
                None => warn!(value = %v, "ignoring malformed --limit-rate value"),
            }
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--speed-time",
        aliases: &["-y"],
        takes_value: true,
        apply: |b, v| {
            b.speed_time = parse_secs(v);
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--keepalive-time",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.keepalive_time = parse_secs(v);
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--dns-servers",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.dns_servers = Some(v.to_string());
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--resolve",
        aliases: &[],
        takes_value: true,
        apply: apply_resolve,
    },
    OptionSpec {
        canonical: "--retry",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            match v.parse::<u32>() {
                Ok(n) => b.retry.count = n,
                Err(_) => warn!(value = %v, "ignoring non-numeric --retry value"),
            }
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--retry-delay",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            if let Some(t) = parse_secs(v) {
                b.retry.delay = t;
            }
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--retry-max-time",
        aliases: &[],
        takes_value: true,
        apply: |b, v| {
            b.retry.max_time = parse_secs(v);
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--get",
        aliases: &["-G"],
        takes_value: false,
        apply: |b, _| {
            b.get_with_data = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--create-dirs",
        aliases: &[],
        takes_value: false,
        apply: |b, _| {
            b.create_dirs = true;
            Ok(())
        },
    },
    OptionSpec {
        canonical: "--progress-bar",
        aliases: &["-#"],
        takes_value: false,
        apply: no_op,
    },
    OptionSpec {
        canonical: "--quote",
        aliases: &["-Q"],
        takes_value: true,
        apply: no_op,
    },
    OptionSpec {
        canonical: "--ftp-pasv",
        aliases: &[],
        takes_value: false,
        apply: no_op,
    },
    OptionSpec {
        canonical: "--ftp-ssl",
        aliases: &[],
        takes_value: false,
        apply: no_op,
    },
    OptionSpec {
        canonical: "--disable-epsv",
        aliases: &[],
        takes_value: false,
        apply: no_op,
    },
    OptionSpec {
        canonical: "--disable-eprt",
        aliases: &[],
        takes_value: false,
        apply: no_op,
    },
];

static REGISTRY: Lazy<HashMap<&'static str, &'static OptionSpec>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for spec in SPECS {
        map.insert(spec.canonical, spec);
        for alias in spec.aliases {
            map.insert(*alias, spec);
        }
    }
    map
});
