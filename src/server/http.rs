//! Minimal blocking HTTP/1.1 over any `Read + Write` stream.
//!
//! One request per connection, no chunked bodies, bodies need
//! Content-Length. Headers are capped at 32 KiB and bodies at 1 MiB.
//! Callers should hand in a buffered reader; headers are scanned a byte at
//! a time.

use std::io::{ErrorKind, Read, Write};

use serde::Serialize;

use crate::error::{ArError, Result};

const MAX_HEADER_SIZE: usize = 32 * 1024;
const MAX_BODY_SIZE: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// JSON response; serialization failure becomes a bare 500.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body,
            },
            Err(_) => Self::empty(500),
        }
    }

    #[must_use]
    pub const fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

const fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Read one request.
///
/// `Ok(None)` means the peer closed before sending anything. Malformed
/// input is [`ArError::Http`]; the caller answers it with a 400.
pub fn read_request(stream: &mut impl Read) -> Result<Option<HttpRequest>> {
    let mut header_buf = Vec::with_capacity(4096);
    let mut byte = [0u8; 1];

    loop {
        match stream.read(&mut byte) {
            Ok(0) if header_buf.is_empty() => return Ok(None),
            Ok(0) => return Err(ArError::Http("connection closed mid-request".to_string())),
            Ok(_) => {
                header_buf.push(byte[0]);
                if header_buf.len() > MAX_HEADER_SIZE {
                    return Err(ArError::Http("headers too large".to_string()));
                }
                if header_buf.ends_with(b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) if header_buf.is_empty() => return Ok(None),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(ArError::Http("timed out waiting for request headers".to_string()));
            }
            Err(err) => return Err(ArError::Http(format!("read error: {err}"))),
        }
    }

    let mut parsed_headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut parsed_headers);
    match req.parse(&header_buf) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(ArError::Http("incomplete request".to_string()));
        }
        Err(err) => return Err(ArError::Http(format!("parse error: {err}"))),
    }

    let method = req.method.unwrap_or("").to_string();
    let target = req.path.unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/").to_string();

    let mut headers = Vec::with_capacity(req.headers.len());
    let mut content_length: Option<usize> = None;
    for header in req.headers.iter() {
        let name = header.name.to_string();
        let value = String::from_utf8_lossy(header.value).to_string();
        if name.eq_ignore_ascii_case("Content-Length") {
            content_length = Some(
                value
                    .trim()
                    .parse()
                    .map_err(|_| ArError::Http(format!("bad Content-Length '{value}'")))?,
            );
        }
        if name.eq_ignore_ascii_case("Transfer-Encoding")
            && value.to_ascii_lowercase().contains("chunked")
        {
            return Err(ArError::Http(
                "chunked transfer encoding not supported".to_string(),
            ));
        }
        headers.push((name, value));
    }

    let body = if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
        let Some(len) = content_length else {
            return Err(ArError::Http(format!("{method} requires Content-Length")));
        };
        if len > MAX_BODY_SIZE {
            return Err(ArError::PayloadTooLarge {
                size: len,
                limit: MAX_BODY_SIZE,
            });
        }
        let mut body = Vec::with_capacity(len);
        stream
            .take(len as u64)
            .read_to_end(&mut body)
            .map_err(|err| ArError::Http(format!("read error: {err}")))?;
        if body.len() < len {
            return Err(ArError::Http("connection closed mid-body".to_string()));
        }
        body
    } else {
        Vec::new()
    };

    Ok(Some(HttpRequest {
        method,
        path,
        headers,
        body,
    }))
}

/// Write `response`; errors mean the client went away and are returned
/// for logging only.
pub fn write_response(stream: &mut impl Write, response: &HttpResponse) -> std::io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(raw: &[u8]) -> Result<Option<HttpRequest>> {
        read_request(&mut Cursor::new(raw.to_vec()))
    }

    #[test]
    fn get_with_query_string() {
        let req = parse(b"GET /health?verbose=1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/health");
        assert_eq!(req.header("host"), Some("localhost"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn post_body_is_read_to_content_length() {
        let body = r#"{"query":"java"}"#;
        let raw = format!(
            "POST /recommend HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let req = parse(raw.as_bytes()).unwrap().unwrap();
        assert_eq!(req.body, body.as_bytes());
    }

    #[test]
    fn rejected_requests() {
        let chunked = parse(b"POST /recommend HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert!(chunked.unwrap_err().to_string().contains("chunked"));

        let no_length = parse(b"POST /recommend HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(no_length.unwrap_err().to_string().contains("Content-Length"));

        let huge = parse(b"POST /recommend HTTP/1.1\r\nContent-Length: 99999999\r\n\r\n");
        let huge = huge.unwrap_err();
        assert!(matches!(huge, ArError::PayloadTooLarge { size: 99_999_999, .. }));
        assert_eq!(huge.code().http_status(), 413);

        let short = parse(b"POST /recommend HTTP/1.1\r\nContent-Length: 10\r\n\r\n{}");
        assert!(short.is_err());

        assert!(parse(b"GET / HTTP/1.1\r\n").is_err());
    }

    #[test]
    fn closed_connection_is_none() {
        assert!(parse(b"").unwrap().is_none());
    }

    #[test]
    fn response_framing() {
        let response = HttpResponse::json(503, &serde_json::json!({"status": "not_ready"}))
            .with_header("Access-Control-Allow-Origin", "*");
        let mut buf = Vec::new();
        write_response(&mut buf, &response).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(text.ends_with(r#"{"status":"not_ready"}"#));
    }
}
