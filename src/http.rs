//! HTTP API for clips
//!
//! ## Endpoints
//! - `GET /api/v1` - Server info (`{ip, time}`), no auth required
//! - `GET /api/v1/clips` - List clips, newest first
//! - `HEAD /api/v1/clips` - Clip count in the `X-Cclip-Count` header
//! - `POST /api/v1/clips` - Upload a clip (raw body)
//! - `GET /api/v1/clips/{id}` - Download a clip
//! - `DELETE /api/v1/clips/{id}` - Delete a clip
//! - `DELETE /api/v1/clips` - Delete all clips
//!
//! `{id}` must be 32 lowercase hex characters; anything else is a 404 before
//! any handler runs. When a password is configured every endpoint except
//! server info requires `Authorization: Bearer <password>`.
//!
//! ## Example Usage
//!
//! ```bash
//! # Upload
//! curl -X POST -H "Authorization: Bearer $CCLIP_PASSWORD" \
//!      -H "Content-Type: text/plain" -H "X-Cclip-Name: todo.txt" \
//!      --data-binary @todo.txt http://localhost:50979/api/v1/clips
//!
//! # Download
//! curl -H "Authorization: Bearer $CCLIP_PASSWORD" \
//!      http://localhost:50979/api/v1/clips/3f2a... > todo.txt
//! ```

use crate::config::Config;
use crate::error::ClipError;
use crate::id::ClipId;
use crate::response::{self, BoxBody};
use crate::store::{ClipContent, ClipStore, ClipSummary};
use bytes::Bytes;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use futures_util::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Body, Frame};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

pub const API_ROOT: &str = "/api/v1";
pub const CLIPS_PATH: &str = "/api/v1/clips";

/// Response header carrying the clip count on `HEAD /api/v1/clips`
pub const COUNT_HEADER: &str = "X-Cclip-Count";

/// Request header carrying an optional display name on upload
pub const NAME_HEADER: &str = "X-Cclip-Name";

/// IMF-fixdate, as used by the `Date` header
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    ServerInfo,
    Clips,
    Clip(ClipId),
}

impl Route {
    fn parse(path: &str) -> Option<Self> {
        match path {
            API_ROOT => Some(Route::ServerInfo),
            CLIPS_PATH => Some(Route::Clips),
            p => p
                .strip_prefix(CLIPS_PATH)
                .and_then(|rest| rest.strip_prefix('/'))
                .and_then(ClipId::parse)
                .map(Route::Clip),
        }
    }

    fn requires_auth(&self, method: &Method) -> bool {
        !(matches!(self, Route::ServerInfo) && method == Method::GET)
    }
}

#[derive(Debug, Serialize)]
struct ServerInfo {
    ip: String,
    time: String,
}

/// HTTP server state
pub struct HttpServer {
    store: Arc<ClipStore>,
    listen: SocketAddr,
    /// Bearer token, `None` when auth is disabled
    token: Option<String>,
}

impl HttpServer {
    /// Create a new HTTP server listening on `config.listen`
    pub fn new(store: Arc<ClipStore>, config: &Config) -> Self {
        Self {
            store,
            listen: config.listen,
            token: config.token.clone(),
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), ClipError> {
        let listener = TcpListener::bind(self.listen).await?;
        info!(addr = %self.listen, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle_request(req, remote_addr).await) }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Authenticate, route and dispatch a single request
    pub async fn handle_request<B>(
        &self,
        req: Request<B>,
        remote_addr: SocketAddr,
    ) -> Response<BoxBody>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        info!(addr = %remote_addr, method = %method, path = %path, "Incoming request");

        let Some(route) = Route::parse(&path) else {
            return response::not_found("Not Found");
        };

        let allowed = match route {
            Route::ServerInfo => method == Method::GET,
            Route::Clips => matches!(
                method,
                Method::GET | Method::HEAD | Method::POST | Method::DELETE
            ),
            Route::Clip(_) => matches!(method, Method::GET | Method::DELETE),
        };
        if !allowed {
            return response::method_not_allowed();
        }

        if route.requires_auth(&method) && !self.is_authorized(&req) {
            debug!(addr = %remote_addr, path = %path, "Rejected unauthorized request");
            return response::error_response(&ClipError::Unauthorized);
        }

        let result = match (method, route) {
            (Method::GET, Route::ServerInfo) => Ok(self.handle_server_info(remote_addr)),
            (Method::GET, Route::Clips) => self.handle_list().await,
            (Method::HEAD, Route::Clips) => self.handle_count().await,
            (Method::POST, Route::Clips) => self.handle_upload(req).await,
            (Method::DELETE, Route::Clips) => self.handle_delete_all().await,
            (Method::GET, Route::Clip(id)) => self.handle_fetch(&id).await,
            (Method::DELETE, Route::Clip(id)) => self.handle_delete(&id).await,
            _ => Ok(response::method_not_allowed()),
        };

        result.unwrap_or_else(|e| response::error_response(&e))
    }

    fn is_authorized<B>(&self, req: &Request<B>) -> bool {
        let Some(token) = self.token.as_deref() else {
            return true;
        };

        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|presented| presented == token)
            .unwrap_or(false)
    }

    /// GET /api/v1
    fn handle_server_info(&self, remote_addr: SocketAddr) -> Response<BoxBody> {
        response::ok(&ServerInfo {
            ip: remote_addr.to_string(),
            time: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// GET /api/v1/clips
    async fn handle_list(&self) -> Result<Response<BoxBody>, ClipError> {
        let clips: Vec<ClipSummary> = self.store.list().await?;
        debug!(count = clips.len(), "Listing clips");
        Ok(response::ok(&clips))
    }

    /// HEAD /api/v1/clips
    async fn handle_count(&self) -> Result<Response<BoxBody>, ClipError> {
        let count = self.store.count().await?;

        Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header(COUNT_HEADER, count)
            .body(response::empty_body())
            .unwrap())
    }

    /// POST /api/v1/clips
    async fn handle_upload<B>(&self, req: Request<B>) -> Result<Response<BoxBody>, ClipError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        let limit = self.store.max_clip_size();
        let declared_len = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(len) = declared_len {
            if limit > 0 && len > limit {
                warn!(length = len, limit, "Rejecting upload by Content-Length");
                return Err(ClipError::PayloadTooLarge { limit });
            }
        }

        let mime = header_str(&req, header::CONTENT_TYPE.as_str());
        let name = header_str(&req, NAME_HEADER);

        let body = req.into_body().into_data_stream();
        let clip = self.store.put(body, mime.as_deref(), name.as_deref()).await?;

        Ok(response::created(&ClipSummary::from(&clip)))
    }

    /// GET /api/v1/clips/{id}
    async fn handle_fetch(&self, id: &ClipId) -> Result<Response<BoxBody>, ClipError> {
        let ClipContent {
            meta,
            file,
            size,
            modified,
            ..
        } = self.store.get(id.as_str()).await?;

        info!(id = %id, size, "Serving clip");

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, size)
            .header(header::DATE, http_date(modified));

        let mime = meta.mime.trim().to_lowercase();
        if !mime.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, mime);
        }

        let stream = ReaderStream::new(file).map_ok(Frame::data);
        Ok(builder.body(StreamBody::new(stream).boxed()).unwrap())
    }

    /// DELETE /api/v1/clips/{id}
    async fn handle_delete(&self, id: &ClipId) -> Result<Response<BoxBody>, ClipError> {
        self.store.delete(id.as_str()).await?;
        Ok(response::no_content())
    }

    /// DELETE /api/v1/clips
    async fn handle_delete_all(&self) -> Result<Response<BoxBody>, ClipError> {
        self.store.delete_all().await?;
        Ok(response::no_content())
    }
}

fn header_str<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn http_date(t: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(t).format(HTTP_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/api/v1"), Some(Route::ServerInfo));
        assert_eq!(Route::parse("/api/v1/clips"), Some(Route::Clips));
        assert_eq!(
            Route::parse("/api/v1/clips/0123456789abcdef0123456789abcdef"),
            Some(Route::Clip(ClipId::parse("0123456789abcdef0123456789abcdef").unwrap()))
        );

        assert_eq!(Route::parse("/api/v1/clips/not-a-valid-id"), None);
        assert_eq!(Route::parse("/api/v1/clips/0123456789ABCDEF0123456789ABCDEF"), None);
        assert_eq!(Route::parse("/api/v1/clipsx"), None);
        assert_eq!(Route::parse("/api/v1/clips/"), None);
        assert_eq!(Route::parse("/"), None);
    }

    #[test]
    fn test_server_info_is_public() {
        assert!(!Route::ServerInfo.requires_auth(&Method::GET));
        assert!(Route::Clips.requires_auth(&Method::GET));
        assert!(Route::Clips.requires_auth(&Method::HEAD));
    }

    #[test]
    fn test_http_date() {
        let t = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(t), "Sun, 06 Nov 1994 08:49:37 GMT");
    }
}
