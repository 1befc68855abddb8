use bytes::Bytes;
use http::header::{ACCEPT, HeaderValue, USER_AGENT};
use http::{Method, Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_rustls::{ConfigBuilderExt, HttpsConnector};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP request: {0}")]
    BuildRequest(#[from] http::Error),
    #[error("Failed to make HTTP(S) request: {0}")]
    CallRequest(#[from] hyper_util::client::legacy::Error),
}

/// A small HTTP(S) client, cloning it is cheap and clones share the
/// connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    user_agent: HeaderValue,
}

impl HttpClient {
    pub fn new() -> HttpClient {
        let mut http = HttpConnector::new();
        http.enforce_http(false);

        let config = match ClientConfig::builder().with_native_roots() {
            Ok(builder) => builder.with_no_client_auth(),
            Err(err) => {
                warn!(
                    message = "load native root certificates failed, https endpoints cannot be verified",
                    %err
                );

                ClientConfig::builder()
                    .with_root_certificates(RootCertStore::empty())
                    .with_no_client_auth()
            }
        };
        let https = HttpsConnector::from((http, config));

        let client = Client::builder(TokioExecutor::new()).build(https);
        let user_agent = HeaderValue::from_static(concat!("http-sd/", env!("CARGO_PKG_VERSION")));

        HttpClient { client, user_agent }
    }

    /// Send a GET request, the returned future resolves once the response
    /// head is received, the body is left for the caller to read.
    pub async fn get(&self, uri: &Uri) -> Result<Response<Incoming>, HttpError> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(Full::<Bytes>::default())?;

        let resp = self.client.request(req).await?;

        debug!(
            message = "HTTP response received",
            %uri,
            status = %resp.status(),
            version = ?resp.version(),
        );

        Ok(resp)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        HttpClient::new()
    }
}
