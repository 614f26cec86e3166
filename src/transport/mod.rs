//! HTTP Transports
//!
//! - [`http`] - peer-to-peer protocol: `GET <base_path><namespace>/<key>`
//! - [`api`] - front-end API for clients, plus stats, metrics and health
//!
//! Both servers run on hyper's HTTP/1 connection driver with one tokio task
//! per connection.

pub mod api;
pub mod http;

use std::convert::Infallible;
use std::future::Future;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::error;

use crate::error::{Error, Result};

pub use api::ApiServer;
pub use http::{HttpConnector, HttpFetcher, HttpPool, HttpPoolConfig};

/// Response body type used by both servers
pub type Body = Full<Bytes>;

/// Accept connections forever, serving each with `handler` on its own task
pub(crate) async fn serve_connections<H, F>(
    listener: TcpListener,
    server: &'static str,
    handler: H,
) -> Result<()>
where
    H: Fn(Request<Incoming>) -> F + Clone + Send + 'static,
    F: Future<Output = Response<Body>> + Send + 'static,
{
    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("{} server accept error: {}", server, e)))?;

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = handler(req);
                async move { Ok::<_, Infallible>(response.await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(server, error = %e, "Connection error");
            }
        });
    }
}

/// Build a response with the given status, content type and body
pub(crate) fn response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Body> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Plain-text response, used for errors and health probes
pub(crate) fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    response(status, "text/plain; charset=utf-8", body.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let resp = text_response(StatusCode::NOT_FOUND, "no such namespace");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers()[CONTENT_TYPE],
            HeaderValue::from_static("text/plain; charset=utf-8")
        );
    }
}
