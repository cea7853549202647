use std::collections::HashMap;
use std::fmt::{self, Display, Formatter, Write as _};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures of a single engine HTTP call. `call` reads like `"POST /v1/schema"`.
#[derive(Debug)]
pub enum ClientError {
    InvalidOption(String),
    Transport {
        call: String,
        source: io::Error,
    },
    Http {
        status: u16,
        call: String,
        body: String,
    },
    InvalidJson {
        call: String,
        body: String,
        source: serde_json::Error,
    },
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOption(message) => f.write_str(message),
            Self::Transport { call, source } => write!(f, "{call} failed: {source}"),
            Self::Http { status, call, body } => write!(f, "{call} returned {status}: {body}"),
            Self::InvalidJson { call, source, .. } => {
                write!(f, "{call} returned malformed JSON: {source}")
            }
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            Self::InvalidJson { source, .. } => Some(source),
            Self::InvalidOption(_) | Self::Http { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    /// Sent as `x-api-key`.
    pub api_key: Option<String>,
    /// Sent as `Authorization: Bearer ...`.
    pub bearer_token: Option<String>,
    pub headers: HashMap<String, String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
            bearer_token: None,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BaseUrl {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) path_prefix: String,
}

/// Opens one connection per request (`Connection: close`) to a single port.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    base_url: BaseUrl,
    timeout: Duration,
    headers: Vec<(String, String)>,
}

impl HttpTransport {
    pub(crate) fn new(base_url: BaseUrl, options: &ClientOptions) -> Self {
        let mut headers: Vec<(String, String)> = options
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.sort();
        if let Some(api_key) = &options.api_key {
            headers.push(("x-api-key".to_string(), api_key.clone()));
        }
        if let Some(token) = &options.bearer_token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        Self {
            base_url,
            timeout: options.timeout,
            headers,
        }
    }

    /// Sends the request and returns the body of a 2xx response.
    pub(crate) fn request(&self, method: &str, path: &str, body: Option<&Value>) -> Result<String> {
        let call = format!("{method} {path}");
        let payload = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| ClientError::InvalidJson {
                call: call.clone(),
                body: String::new(),
                source,
            })?;

        let target = format!("{}{path}", self.base_url.path_prefix);
        let request = self.build_http_request(method, &target, payload.as_deref());
        let raw = self
            .exchange(request.as_bytes())
            .map_err(|source| transport_error(&call, source))?;
        let response = parse_http_response(&raw).map_err(|source| transport_error(&call, source))?;

        let status = response.status;
        let body = String::from_utf8_lossy(&response.body).into_owned();
        debug!(call = %call, port = self.base_url.port, status, "engine request completed");

        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(ClientError::Http { status, call, body })
        }
    }

    fn exchange(&self, request: &[u8]) -> io::Result<Vec<u8>> {
        let mut stream = TcpStream::connect((self.base_url.host.as_str(), self.base_url.port))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(request)?;
        stream.flush()?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        Ok(raw)
    }

    pub(crate) fn build_http_request(&self, method: &str, target: &str, body: Option<&str>) -> String {
        let BaseUrl { host, port, .. } = &self.base_url;
        let mut request = format!(
            "{method} {target} HTTP/1.1\r\nHost: {host}:{port}\r\nConnection: close\r\nAccept: application/json\r\n"
        );
        for (name, value) in &self.headers {
            let _ = write!(request, "{name}: {value}\r\n");
        }
        match body {
            Some(body) => {
                let _ = write!(
                    request,
                    "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                );
            }
            None => request.push_str("\r\n"),
        }
        request
    }
}

pub(crate) fn deserialize_json<T: serde::de::DeserializeOwned>(
    call: &str,
    payload: String,
) -> Result<T> {
    serde_json::from_str(&payload).map_err(|source| ClientError::InvalidJson {
        call: call.to_string(),
        body: payload,
        source,
    })
}

#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) body: Vec<u8>,
}

pub(crate) fn parse_http_response(raw: &[u8]) -> io::Result<HttpResponse> {
    let head_end = find(raw, b"\r\n\r\n").ok_or_else(|| invalid_data("missing response headers"))?;
    let head = String::from_utf8_lossy(&raw[..head_end]);
    let payload = &raw[head_end + 4..];

    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|status_line| status_line.split_whitespace().nth(1))
        .ok_or_else(|| invalid_data("missing status code"))?
        .parse::<u16>()
        .map_err(|_| invalid_data("invalid status code"))?;

    let chunked = lines.any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value.to_ascii_lowercase().contains("chunked")
        })
    });

    let body = if chunked {
        dechunk(payload)?
    } else {
        payload.to_vec()
    };
    Ok(HttpResponse { status, body })
}

fn dechunk(mut rest: &[u8]) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    while !rest.is_empty() {
        let line_end = find(rest, b"\r\n").ok_or_else(|| invalid_data("invalid chunk header"))?;
        let size_line = std::str::from_utf8(&rest[..line_end])
            .map_err(|_| invalid_data("invalid chunk size line"))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size =
            usize::from_str_radix(size_hex, 16).map_err(|_| invalid_data("invalid chunk size"))?;
        rest = &rest[line_end + 2..];

        if size == 0 {
            break;
        }
        let chunk = rest
            .get(..size)
            .ok_or_else(|| invalid_data("chunk exceeds payload size"))?;
        body.extend_from_slice(chunk);
        rest = rest.get(size + 2..).unwrap_or_default();
    }
    Ok(body)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn invalid_data(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Accepts `http://host[:port][/prefix]`; blank input means [`DEFAULT_BASE_URL`].
pub(crate) fn parse_base_url(base_url: &str) -> Result<BaseUrl> {
    let invalid = |message: &str| ClientError::InvalidOption(message.to_string());

    let url = match base_url.trim() {
        "" => DEFAULT_BASE_URL,
        trimmed => trimmed,
    };
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| invalid("base URL must start with http://"))?;

    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let path = path.trim_matches('/');
    let path_prefix = if path.is_empty() {
        String::new()
    } else {
        format!("/{path}")
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>()
                .map_err(|_| invalid("invalid base URL port"))?,
        ),
        None => (authority, 80),
    };
    if host.is_empty() {
        return Err(invalid("base URL host cannot be empty"));
    }

    Ok(BaseUrl {
        host: host.to_string(),
        port,
        path_prefix,
    })
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub(crate) fn escape_segment(value: impl AsRef<str>) -> String {
    value
        .as_ref()
        .bytes()
        .fold(String::new(), |mut output, byte| {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
                output.push(char::from(byte));
            } else {
                let _ = write!(output, "%{byte:02X}");
            }
            output
        })
}

pub(crate) fn transport_error(call: &str, source: io::Error) -> ClientError {
    ClientError::Transport {
        call: call.to_string(),
        source,
    }
}
