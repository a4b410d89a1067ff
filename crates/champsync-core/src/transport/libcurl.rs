//! libcurl-backed transport.
//!
//! Every request has a connect timeout and a whole-transfer timeout, follows
//! redirects, and installs a progress callback that aborts as soon as the run
//! is cancelled.

use std::cell::{Cell, RefCell};
use std::io;
use std::str;
use std::time::Duration;

use curl::easy::{Easy, List};

use super::headers::{parse_headers, parse_status_line};
use super::{BodySink, FetchMeta, RemoteProbe, Transport};
use crate::config::SyncConfig;
use crate::control::RunControl;
use crate::retry::FetchError;

const DEFAULT_USER_AGENT: &str = concat!("champsync/", env!("CARGO_PKG_VERSION"));

/// Per-request network settings.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub max_redirections: u32,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for TransportOptions {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            request_timeout: cfg.request_timeout(),
            user_agent: cfg
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_redirections: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    opts: TransportOptions,
}

impl CurlTransport {
    pub fn new(opts: TransportOptions) -> Self {
        Self { opts }
    }

    fn easy(&self, url: &str) -> Result<Easy, FetchError> {
        let mut easy = Easy::new();
        easy.url(url).map_err(map_curl_error)?;
        easy.follow_location(true).map_err(map_curl_error)?;
        easy.max_redirections(self.opts.max_redirections)
            .map_err(map_curl_error)?;
        easy.connect_timeout(self.opts.connect_timeout)
            .map_err(map_curl_error)?;
        easy.timeout(self.opts.request_timeout)
            .map_err(map_curl_error)?;
        easy.useragent(&self.opts.user_agent)
            .map_err(map_curl_error)?;
        let mut list = List::new();
        list.append("Accept: */*").map_err(map_curl_error)?;
        easy.http_headers(list).map_err(map_curl_error)?;
        easy.progress(true).map_err(map_curl_error)?;
        Ok(easy)
    }
}

impl Transport for CurlTransport {
    fn probe(&self, url: &str, control: &RunControl) -> Result<RemoteProbe, FetchError> {
        let mut easy = self.easy(url)?;
        easy.nobody(true).map_err(map_curl_error)?;
        let mut lines: Vec<String> = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        lines.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(map_curl_error)?;
            transfer
                .progress_function(|_, _, _, _| !control.is_cancelled())
                .map_err(map_curl_error)?;
            transfer.perform().map_err(map_curl_error)?;
        }
        let code = easy.response_code().map_err(map_curl_error)?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        let headers = parse_headers(&lines);
        Ok(RemoteProbe {
            content_length: headers.content_length,
            etag: headers.etag,
        })
    }

    fn fetch(
        &self,
        url: &str,
        control: &RunControl,
        sink: &mut BodySink<'_>,
    ) -> Result<FetchMeta, FetchError> {
        let mut easy = self.easy(url)?;
        let mut lines: Vec<String> = Vec::new();
        let status = Cell::new(0u32);
        let received = Cell::new(0u64);
        let storage_error: RefCell<Option<io::Error>> = RefCell::new(None);

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        let line = s.trim_end();
                        if line.starts_with("HTTP/") {
                            status.set(parse_status_line(line).unwrap_or(0));
                        }
                        lines.push(line.to_string());
                    }
                    true
                })
                .map_err(map_curl_error)?;
            // Error pages and redirect bodies are not content.
            transfer
                .write_function(|data| {
                    if !(200..300).contains(&status.get()) {
                        return Ok(data.len());
                    }
                    match sink(data) {
                        Ok(()) => {
                            received.set(received.get() + data.len() as u64);
                            Ok(data.len())
                        }
                        Err(e) => {
                            storage_error.borrow_mut().replace(e);
                            Ok(0)
                        }
                    }
                })
                .map_err(map_curl_error)?;
            transfer
                .progress_function(|_, _, _, _| !control.is_cancelled())
                .map_err(map_curl_error)?;
            transfer.perform()
        };

        let headers = parse_headers(&lines);
        if let Err(e) = performed {
            if e.is_write_error() {
                if let Some(io_err) = storage_error.borrow_mut().take() {
                    return Err(FetchError::Storage(io_err));
                }
            }
            if e.is_partial_file() {
                return Err(FetchError::PartialTransfer {
                    expected: headers.content_length.unwrap_or(0),
                    received: received.get(),
                });
            }
            return Err(map_curl_error(e));
        }

        let code = easy.response_code().map_err(map_curl_error)?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        if let Some(expected) = headers.content_length {
            if received.get() < expected {
                return Err(FetchError::PartialTransfer {
                    expected,
                    received: received.get(),
                });
            }
        }
        Ok(FetchMeta {
            content_length: headers.content_length,
            etag: headers.etag,
        })
    }
}

/// Translate a libcurl error into the engine's error taxonomy.
pub(crate) fn map_curl_error(e: curl::Error) -> FetchError {
    if e.is_aborted_by_callback() {
        return FetchError::Cancelled;
    }
    if e.is_operation_timedout() {
        return FetchError::Timeout(e.to_string());
    }
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return FetchError::InvalidLocator(e.to_string());
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_ssl_connect_error()
    {
        return FetchError::Connection(e.to_string());
    }
    if e.is_partial_file() {
        return FetchError::PartialTransfer {
            expected: 0,
            received: 0,
        };
    }
    FetchError::Transport(e.to_string())
}
