use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::{Body as HyperBody, Client, HeaderMap, Method, Request, Uri};
use hyper_tls::HttpsConnector;
use tokio::time::{timeout, Instant};

use crate::models::dsl_model::TestConfig;
use crate::models::metrics::{RequestError, RequestSample};

pub type HttpsClient = Client<HttpsConnector<HttpConnector>>;

/// Issues the GET every iteration performs. Cheap to clone; clones share the
/// connection pool.
#[derive(Clone)]
pub struct RequestExecutor {
    client: HttpsClient,
    uri: Uri,
    headers: HeaderMap,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(config: &TestConfig) -> Self {
        let https = HttpsConnector::new();
        let client: HttpsClient = Client::builder().build::<_, HyperBody>(https);
        Self {
            client,
            uri: config.uri.clone(),
            headers: config.headers.clone(),
            timeout: config.timeout,
        }
    }

    /// Never fails: network errors and timeouts come back as a sample with
    /// status 0.
    pub async fn execute(&self) -> RequestSample {
        let mut request = Request::new(HyperBody::empty());
        *request.method_mut() = Method::GET;
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();

        let start = Instant::now();
        let result = timeout(self.timeout, async {
            let response = self.client.request(request).await?;
            let status = response.status();
            // Body is drained so latency covers the full transfer.
            hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>(status)
        })
        .await;
        let latency = start.elapsed();

        let sample = match result {
            Ok(Ok(status)) => RequestSample::response(start, latency, status.as_u16()),
            Ok(Err(e)) => RequestSample::failed(start, latency, classify(&e, latency)),
            Err(_) => RequestSample::failed(start, latency, RequestError::Timeout(self.timeout)),
        };

        tracing::trace!(
            started_at = ?sample.started_at,
            status = sample.status,
            latency_ms = latency.as_secs_f64() * 1000.0,
            error = ?sample.error,
            "request finished"
        );
        sample
    }
}

/// `elapsed` is reported as the wait when hyper itself gave up.
fn classify(e: &hyper::Error, elapsed: Duration) -> RequestError {
    if e.is_connect() {
        RequestError::Connect(e.to_string())
    } else if e.is_timeout() {
        RequestError::Timeout(elapsed)
    } else if e.is_closed() || e.is_incomplete_message() {
        RequestError::Closed
    } else {
        RequestError::Other(e.to_string())
    }
}
