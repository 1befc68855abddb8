use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A HTTP server answering every request with the next scripted response,
/// the last one is repeated once the script is exhausted.
pub struct MockServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(script: Vec<(u16, &'static str)>) -> MockServer {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        MockServer::start_on(addr, script).await
    }

    pub async fn start_on(addr: SocketAddr, script: Vec<(u16, &'static str)>) -> MockServer {
        assert!(!script.is_empty(), "script must not be empty");

        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(script);

        let served = Arc::clone(&hits);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _peer)) = listener.accept().await else {
                    continue;
                };

                let hits = Arc::clone(&served);
                let script = Arc::clone(&script);
                let service = service_fn(move |_req: Request<Incoming>| {
                    let index = hits.fetch_add(1, Ordering::SeqCst).min(script.len() - 1);
                    let (status, body) = script[index];

                    async move {
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(status)
                                .header("content-type", "application/json")
                                .body(Full::new(Bytes::from_static(body.as_bytes())))
                                .unwrap(),
                        )
                    }
                });

                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        MockServer { addr, hits, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}/targets", self.addr)
    }

    /// How many requests have been served
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
