//! Minimal HTTP/1.1 server for integration tests: one behavior per path,
//! HEAD and GET, and per-request hit counters.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Behavior {
    /// 200 with body and optional ETag.
    Ok { body: Vec<u8>, etag: Option<String> },
    /// Bare status with empty body.
    Status(u16),
    /// Read the request, then stall this long before answering.
    Stall(Duration, Vec<u8>),
    /// Advertise the full length but send only the first half, then close.
    Truncated(Vec<u8>),
    /// First `n` requests get 503, later ones the body.
    FlakyThenOk(usize, Vec<u8>),
    /// 302 to another path on this server.
    Redirect(String),
}

impl Behavior {
    pub fn body(body: &[u8]) -> Self {
        Behavior::Ok {
            body: body.to_vec(),
            etag: None,
        }
    }

    pub fn tagged(body: &[u8], etag: &str) -> Self {
        Behavior::Ok {
            body: body.to_vec(),
            etag: Some(etag.to_string()),
        }
    }
}

type Hits = Arc<Mutex<HashMap<(String, String), usize>>>;

pub struct AssetServer {
    base: String,
    hits: Hits,
}

impl AssetServer {
    /// Serve `routes` (path -> behavior) from a background thread until the process exits.
    /// Unknown paths get 404.
    pub fn start(routes: Vec<(&str, Behavior)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<HashMap<String, Behavior>> = Arc::new(
            routes
                .into_iter()
                .map(|(p, b)| (p.to_string(), b))
                .collect(),
        );
        let hits: Hits = Arc::default();
        let server_hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let hits = Arc::clone(&server_hits);
                thread::spawn(move || handle(stream, &routes, &hits));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            hits,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Requests seen for `method` on `path`.
    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 2048];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(buf).ok()
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Behavior>, hits: &Hits) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let mut parts = head.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("/").to_string();
    let n = {
        let mut h = hits.lock().unwrap();
        let e = h.entry((method.clone(), path.clone())).or_insert(0);
        *e += 1;
        *e
    };
    let is_head = method.eq_ignore_ascii_case("HEAD");

    let ok = |stream: &mut TcpStream, body: &[u8], etag: Option<&str>| {
        let etag = etag
            .map(|t| format!("ETag: \"{}\"\r\n", t))
            .unwrap_or_default();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
            body.len(),
            etag
        );
        let _ = stream.write_all(head.as_bytes());
        if !is_head {
            let _ = stream.write_all(body);
        }
    };
    let status = |stream: &mut TcpStream, code: u16| {
        let _ = stream.write_all(
            format!(
                "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            )
            .as_bytes(),
        );
    };

    match routes.get(&path) {
        None => status(&mut stream, 404),
        Some(Behavior::Ok { body, etag }) => ok(&mut stream, body, etag.as_deref()),
        Some(Behavior::Status(code)) => status(&mut stream, *code),
        Some(Behavior::Stall(d, body)) => {
            thread::sleep(*d);
            ok(&mut stream, body, None);
        }
        Some(Behavior::Truncated(body)) => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            if !is_head {
                let _ = stream.write_all(&body[..body.len() / 2]);
            }
        }
        Some(Behavior::FlakyThenOk(fails, body)) => {
            if n <= *fails {
                status(&mut stream, 503);
            } else {
                ok(&mut stream, body, None);
            }
        }
        Some(Behavior::Redirect(to)) => {
            let _ = stream.write_all(
                format!(
                    "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    to
                )
                .as_bytes(),
            );
        }
    }
    let _ = stream.flush();
}
