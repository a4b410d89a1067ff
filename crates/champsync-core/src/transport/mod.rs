//! Network seam of the engine: one metadata probe or one body fetch per call.
//!
//! `CurlTransport` is the production implementation (libcurl easy handles,
//! blocking, one per worker thread). The trait exists so the engine can be
//! driven by in-memory transports in tests.

mod libcurl;
mod headers;

pub use libcurl::{CurlTransport, TransportOptions};
pub use headers::{parse_headers, ResponseHeaders};

use std::io;

use crate::control::RunControl;
use crate::retry::FetchError;

/// Lightweight remote metadata from a HEAD request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteProbe {
    /// `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
    /// `ETag` without surrounding quotes.
    pub etag: Option<String>,
}

/// Metadata from a completed body fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchMeta {
    pub content_length: Option<u64>,
    pub etag: Option<String>,
}

/// Body chunks are pushed into this as they arrive. An error aborts the transfer
/// and is reported as `FetchError::Storage`.
pub type BodySink<'a> = dyn FnMut(&[u8]) -> io::Result<()> + 'a;

pub trait Transport: Send + Sync {
    /// HEAD-style metadata request; no body is transferred.
    fn probe(&self, url: &str, control: &RunControl) -> Result<RemoteProbe, FetchError>;

    /// GET `url`, streaming a 2xx body into `sink`. Must stop promptly once
    /// `control` is cancelled.
    fn fetch(
        &self,
        url: &str,
        control: &RunControl,
        sink: &mut BodySink<'_>,
    ) -> Result<FetchMeta, FetchError>;
}
