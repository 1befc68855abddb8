use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use metrics::{Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

fn handle(req: &Request<Incoming>, path: &str, registry: &Registry) -> Response<Full<Bytes>> {
    if req.method() != Method::GET || req.uri().path() != path {
        let mut resp = Response::new(Full::default());
        *resp.status_mut() = StatusCode::NOT_FOUND;
        return resp;
    }

    let mut encoder = TextEncoder::new();
    registry.report(&mut encoder);

    let mut resp = Response::new(Full::new(Bytes::from(encoder.finish())));
    resp.headers_mut()
        .insert(CONTENT_TYPE, http::HeaderValue::from_static(CONTENT_TYPE_TEXT));
    resp
}

/// Serve metrics of `registry` at `path` until `shutdown` is cancelled.
/// Connections in flight are closed gracefully.
pub async fn serve(
    listener: TcpListener,
    path: String,
    registry: Registry,
    shutdown: CancellationToken,
) {
    let path: Arc<str> = Arc::from(path);

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = listener.accept() => match result {
                Ok(conn) => conn,
                Err(err) => {
                    error!(message = "accept new connection failed", %err);
                    continue;
                }
            }
        };

        let path = Arc::clone(&path);
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let resp = handle(&req, &path, &registry);
                async move { Ok::<_, Infallible>(resp) }
            });

            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = shutdown.cancelled() => {
                    // finish the response in flight, then close
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };

            if let Err(err) = result {
                trace!(message = "failed to serve http connection", %peer, %err);
            }
        });
    }

    debug!(message = "metrics server stopped");
}
