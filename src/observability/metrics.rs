use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_attempts_total: IntCounterVec,
    pub requests_in_queue: IntGauge,
    pub match_latency_seconds: HistogramVec,
    pub notifications_total: IntCounterVec,
    pub live_connections: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_attempts_total = IntCounterVec::new(
            Opts::new("dispatch_attempts_total", "Assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_attempts_total metric");

        let requests_in_queue =
            IntGauge::new("requests_in_queue", "Pending requests waiting for a match")
                .expect("valid requests_in_queue metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of match processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "notifications_total",
                "Notification deliveries by result (delivered/failed/undelivered)",
            ),
            &["result"],
        )
        .expect("valid notifications_total metric");

        let live_connections = IntGauge::new("live_connections", "Currently connected websockets")
            .expect("valid live_connections metric");

        registry
            .register(Box::new(dispatch_attempts_total.clone()))
            .expect("register dispatch_attempts_total");
        registry
            .register(Box::new(requests_in_queue.clone()))
            .expect("register requests_in_queue");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(live_connections.clone()))
            .expect("register live_connections");

        Self {
            registry,
            dispatch_attempts_total,
            requests_in_queue,
            match_latency_seconds,
            notifications_total,
            live_connections,
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
