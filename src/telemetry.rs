use std::borrow::Cow;

use http::StatusCode;
use metrics::{Attributes, Metric, Registry};

macro_rules! namespaced {
    ($name:literal) => {
        concat!("prometheus_sd_http_", $name)
    };
}

/// Counts completed requests against discovery endpoints, labeled by
/// status code and the polled url.
#[derive(Clone, Debug)]
pub struct RequestsCounter {
    metric: Metric,
}

impl RequestsCounter {
    pub fn register(registry: &Registry) -> Self {
        let metric =
            registry.register_counter(namespaced!("http_requests_total"), "Number of http requests.");

        RequestsCounter { metric }
    }

    pub fn observe(&self, status: StatusCode, api_url: &str) {
        let attrs = Attributes::from([
            ("code", Cow::Owned(status.as_u16().to_string())),
            ("api_url", Cow::Owned(api_url.to_string())),
        ]);

        self.metric.recorder(attrs).inc(1);
    }

    /// Current value of one series, zero if never observed.
    pub fn get(&self, status: StatusCode, api_url: &str) -> u64 {
        self.metric
            .observe()
            .into_iter()
            .find(|(attrs, _)| {
                attrs.get("code") == Some(status.as_str()) && attrs.get("api_url") == Some(api_url)
            })
            .map(|(_, value)| value)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name() {
        let counter = RequestsCounter::register(&Registry::new());
        assert_eq!(
            counter.metric.name(),
            "prometheus_sd_http_http_requests_total"
        );
    }

    #[test]
    fn observe() {
        let registry = Registry::new();
        let counter = RequestsCounter::register(&registry);

        counter.observe(StatusCode::OK, "http://a");
        counter.observe(StatusCode::OK, "http://a");
        counter.observe(StatusCode::INTERNAL_SERVER_ERROR, "http://a");
        counter.clone().observe(StatusCode::OK, "http://b");

        assert_eq!(counter.get(StatusCode::OK, "http://a"), 2);
        assert_eq!(counter.get(StatusCode::INTERNAL_SERVER_ERROR, "http://a"), 1);
        assert_eq!(counter.get(StatusCode::OK, "http://b"), 1);
        assert_eq!(counter.get(StatusCode::NOT_FOUND, "http://b"), 0);
    }
}
