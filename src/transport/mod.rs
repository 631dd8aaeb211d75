//! Smart HTTP transport for clone
//!
//! - `pkt_line`: length-prefixed framing
//! - `capabilities`: what the server offers and what a clone asks for
//! - `advertisement`: refs returned by discovery
//! - `request`: upload-pack request body
//! - `response`: shallow lines, acknowledgements and side-band demultiplexing
//! - `pack`: packfile parsing and delta resolution
//! - `delta`: delta instruction decoding
//! - `http`: the [`RemoteTransport`] over `reqwest`

pub mod advertisement;
pub mod capabilities;
pub mod delta;
pub mod http;
pub mod pack;
pub mod pkt_line;
pub mod request;
pub mod response;

use crate::transport::advertisement::RefAdvertisement;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use http::{HttpOptions, HttpTransport};

/// `agent=` value sent to servers, also used as the HTTP user agent
pub fn agent() -> String {
    format!("moonwalk/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    #[error("authentication failed for {url} (HTTP {status})")]
    Auth { status: u16, url: String },
    #[error("{url} does not support the smart HTTP protocol (content type {content_type:?})")]
    DumbHttp { url: String, content_type: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("corrupt packfile: {0}")]
    CorruptPack(String),
    #[error("invalid delta: {0}")]
    Delta(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl TransportError {
    pub fn is_auth(&self) -> bool {
        matches!(self, TransportError::Auth { .. })
    }
}

/// A remote that serves `git-upload-pack`
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Remote URL as recorded in `.git/config`
    fn url(&self) -> &str;

    async fn discover(&self) -> Result<RefAdvertisement, TransportError>;

    /// Send an upload-pack request and return the raw response body
    async fn upload_pack(&self, request: Bytes) -> Result<Bytes, TransportError>;
}
