//! Response header parsing shared by probe and fetch.

/// Key headers of the final response in a (possibly redirected) exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
}

/// Parse collected header lines. A status line resets everything so only the
/// last response of a redirect chain counts.
pub fn parse_headers(lines: &[String]) -> ResponseHeaders {
    let mut out = ResponseHeaders::default();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            out = ResponseHeaders {
                status: parse_status_line(line),
                ..ResponseHeaders::default()
            };
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                if let Ok(n) = value.parse::<u64>() {
                    out.content_length = Some(n);
                }
            }
            if name.eq_ignore_ascii_case("etag") {
                let v = value.trim_start_matches("W/").trim_matches('"');
                if !v.is_empty() {
                    out.etag = Some(v.to_string());
                }
            }
        }
    }
    out
}

/// `HTTP/1.1 404 Not Found` -> 404.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}
