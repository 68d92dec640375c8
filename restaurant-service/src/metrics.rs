use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    billing_aggregations: IntCounterVec,
    http_errors: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "restaurant_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let billing_aggregations = IntCounterVec::new(
            Opts::new(
                "restaurant_billing_aggregations_total",
                "Count of order billing aggregations grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(billing_aggregations.clone()))?;

        let http_errors = IntCounterVec::new(
            Opts::new(
                "restaurant_http_errors_total",
                "Count of error responses grouped by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(http_errors.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            billing_aggregations,
            http_errors,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn billing_aggregation(&self, outcome: &str) {
        self.billing_aggregations.with_label_values(&[outcome]).inc();
    }

    pub fn http_error(&self, code: &str) {
        self.http_errors.with_label_values(&[code]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_counters() {
        let metrics = ServiceMetrics::new().expect("metrics");
        metrics.login_attempt("success");
        metrics.billing_aggregation("success");
        metrics.http_error("AUTH_EXPIRED");
        let response = metrics.render().expect("render");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
