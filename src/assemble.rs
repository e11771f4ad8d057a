//! Response assembly
//!
//! Builds the final [`ExecutionResult`] from the executed exchange: the
//! verbose trace, include-headers blocks, payload, rendered write-out
//! template, and any output files, applied in that fixed order.

use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::config::RequestConfig;
use crate::errors::{Error, Result};
use crate::executor::{Exchange, HopRecord};
use crate::response::ExecutionResult;

pub fn assemble(config: &RequestConfig, exchange: &Exchange) -> Result<ExecutionResult> {
    let content_type = exchange
        .response
        .headers
        .get("content-type")
        .unwrap_or_default()
        .to_string();
    let textual = is_textual(&content_type);
    let payload = &exchange.response.body;

    let mut text = String::new();

    if config.verbose {
        for hop in &exchange.hops {
            text.push_str(&render_trace(hop));
        }
    }

    if config.include_headers_in_body {
        for hop in &exchange.hops {
            text.push_str(&render_header_block(hop));
            text.push('\n');
        }
    }

    let output_files_written = write_output_files(config, exchange, payload)?;

    // The payload lands in exactly one place: an output file when one was
    // requested, the text body when decodable, the binary slot otherwise.
    let mut binary_data = None;
    if output_files_written.is_empty() {
        if textual {
            text.push_str(&String::from_utf8_lossy(payload));
        } else if !payload.is_empty() {
            binary_data = Some(payload.clone());
        }
    }

    if let Some(template) = &config.write_out_template {
        text.push_str(&render_write_out(
            template,
            exchange,
            &content_type,
            payload.len(),
        ));
    }

    Ok(ExecutionResult {
        status_code: exchange.response.status,
        headers: exchange.response.headers.clone(),
        body: (!text.is_empty()).then_some(text),
        binary_data,
        timings: exchange.timings,
        output_files_written,
        command_echo: config.original_command.clone(),
    })
}

/// Synthesized curl-style trace for one hop.
fn render_trace(hop: &HopRecord) -> String {
    let url = url::Url::parse(&hop.url).ok();
    let host = url
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or("unknown")
        .to_string();
    let port = url.as_ref().and_then(|u| u.port_or_known_default()).unwrap_or(80);
    let path = url
        .as_ref()
        .map(|u| {
            let mut p = u.path().to_string();
            if let Some(q) = u.query() {
                p.push('?');
                p.push_str(q);
            }
            p
        })
        .unwrap_or_else(|| "/".to_string());

    let mut out = String::new();
    out.push_str(&format!("* Trying {}:{}...\n", host, port));
    out.push_str(&format!("* Connected to {} port {}\n", host, port));
    out.push_str(&format!("> {} {} {}\n", hop.method, path, hop.version));
    out.push_str(&format!("> Host: {}\n", host));
    for (name, value) in &hop.request_headers {
        out.push_str(&format!("> {}: {}\n", name, value));
    }
    out.push_str(">\n");
    out.push_str(&format!(
        "< {} {} {}\n",
        hop.version,
        hop.status,
        reason_phrase(hop.status)
    ));
    for (name, value) in hop.response_headers.iter() {
        out.push_str(&format!("< {}: {}\n", name, value));
    }
    out.push_str("<\n");
    out
}

/// Status line plus response headers, as `-i` prints them.
fn render_header_block(hop: &HopRecord) -> String {
    let mut out = format!("{} {} {}\n", hop.version, hop.status, reason_phrase(hop.status));
    for (name, value) in hop.response_headers.iter() {
        out.push_str(&format!("{}: {}\n", name, value));
    }
    out
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        418 => "I'm a teapot",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

/// Text-vs-binary classification by Content-Type.
fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.starts_with("text/")
        || ct.contains("json")
        || ct.contains("xml")
        || ct.contains("javascript")
        || ct.contains("x-www-form-urlencoded")
}

/// Render a `--write-out` template: literal `\n`/`\t`/`\r` escapes first,
/// then the recognized `%{...}` placeholders.
fn render_write_out(
    template: &str,
    exchange: &Exchange,
    content_type: &str,
    size_download: usize,
) -> String {
    template
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
        .replace("%{http_code}", &format!("{:03}", exchange.response.status))
        .replace("%{size_download}", &size_download.to_string())
        .replace("%{url_effective}", exchange.final_url.as_str())
        .replace("%{content_type}", content_type)
        .replace(
            "%{time_total}",
            &format!("{:.6}", exchange.timings.total as f64 / 1000.0),
        )
        .replace("%{num_redirects}", &(exchange.hops.len().saturating_sub(1)).to_string())
}

/// Write the payload to disk when `-o` or `-O` asked for it. An explicit
/// `--output` path wins over `--remote-name`.
fn write_output_files(
    config: &RequestConfig,
    exchange: &Exchange,
    payload: &[u8],
) -> Result<Vec<PathBuf>> {
    let path = match (&config.output_file, config.use_remote_file_name) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from(remote_file_name(exchange)),
        (None, false) => return Ok(Vec::new()),
    };

    if config.create_dirs {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| Error::WriteError {
                    path: path.clone(),
                    source,
                })?;
            }
        }
    }

    std::fs::write(&path, payload).map_err(|source| Error::WriteError {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), bytes = payload.len(), "wrote output file");
    Ok(vec![path])
}

/// Derive an output filename from the final URL's last path segment,
/// percent-decoded and sanitized; `download` when the path has none.
fn remote_file_name(exchange: &Exchange) -> String {
    let segment = exchange
        .final_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let name = sanitize_filename::sanitize(decoded.as_ref());
    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}
