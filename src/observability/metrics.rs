use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub list_requests_total: IntCounterVec,
    pub detail_fetches_total: IntCounterVec,
    pub fallback_total: IntCounterVec,
    pub nearby_lookups_total: IntCounterVec,
    pub commits_total: IntCounterVec,
    pub cancels_total: IntCounterVec,
    pub cache_invalidations_total: IntCounterVec,
    pub poll_transitions_total: IntCounter,
    pub active_detail_watches: IntGauge,
    pub request_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let list_requests_total = IntCounterVec::new(
            Opts::new("list_requests_total", "Order list requests by data source"),
            &["source"],
        )
        .expect("valid list_requests_total metric");

        let detail_fetches_total = IntCounterVec::new(
            Opts::new("detail_fetches_total", "Order detail fetches by outcome"),
            &["outcome"],
        )
        .expect("valid detail_fetches_total metric");

        let fallback_total = IntCounterVec::new(
            Opts::new(
                "fallback_total",
                "Reads served from synthetic data after a transient backend failure",
            ),
            &["operation"],
        )
        .expect("valid fallback_total metric");

        let nearby_lookups_total = IntCounterVec::new(
            Opts::new("nearby_lookups_total", "Nearby driver lookups by source"),
            &["source"],
        )
        .expect("valid nearby_lookups_total metric");

        let commits_total = IntCounterVec::new(
            Opts::new("commits_total", "Assignment commits by mode and outcome"),
            &["mode", "outcome"],
        )
        .expect("valid commits_total metric");

        let cancels_total = IntCounterVec::new(
            Opts::new("cancels_total", "Order cancellations by mode and outcome"),
            &["mode", "outcome"],
        )
        .expect("valid cancels_total metric");

        let cache_invalidations_total = IntCounterVec::new(
            Opts::new(
                "cache_invalidations_total",
                "Cache entries dropped after acknowledged mutations",
            ),
            &["scope"],
        )
        .expect("valid cache_invalidations_total metric");

        let poll_transitions_total = IntCounter::new(
            "poll_transitions_total",
            "Status transitions observed by detail polling",
        )
        .expect("valid poll_transitions_total metric");

        let active_detail_watches = IntGauge::new(
            "active_detail_watches",
            "Detail poll loops currently running",
        )
        .expect("valid active_detail_watches metric");

        let request_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "request_latency_seconds",
                "Latency of backend requests in seconds",
            ),
            &["operation"],
        )
        .expect("valid request_latency_seconds metric");

        registry
            .register(Box::new(list_requests_total.clone()))
            .expect("register list_requests_total");
        registry
            .register(Box::new(detail_fetches_total.clone()))
            .expect("register detail_fetches_total");
        registry
            .register(Box::new(fallback_total.clone()))
            .expect("register fallback_total");
        registry
            .register(Box::new(nearby_lookups_total.clone()))
            .expect("register nearby_lookups_total");
        registry
            .register(Box::new(commits_total.clone()))
            .expect("register commits_total");
        registry
            .register(Box::new(cancels_total.clone()))
            .expect("register cancels_total");
        registry
            .register(Box::new(cache_invalidations_total.clone()))
            .expect("register cache_invalidations_total");
        registry
            .register(Box::new(poll_transitions_total.clone()))
            .expect("register poll_transitions_total");
        registry
            .register(Box::new(active_detail_watches.clone()))
            .expect("register active_detail_watches");
        registry
            .register(Box::new(request_latency_seconds.clone()))
            .expect("register request_latency_seconds");

        Self {
            registry,
            list_requests_total,
            detail_fetches_total,
            fallback_total,
            nearby_lookups_total,
            commits_total,
            cancels_total,
            cache_invalidations_total,
            poll_transitions_total,
            active_detail_watches,
            request_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
