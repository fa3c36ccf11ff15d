use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_accepts_total: IntCounterVec,
    pub deliveries_completed_total: IntCounter,
    pub points_credited_total: IntCounter,
    pub points_redeemed_total: IntCounter,
    pub store_call_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_accepts_total = IntCounterVec::new(
            Opts::new("order_accepts_total", "Order accept attempts by outcome"),
            &["outcome"],
        )
        .expect("valid order_accepts_total metric");

        let deliveries_completed_total = IntCounter::new(
            "deliveries_completed_total",
            "Orders transitioned to delivered",
        )
        .expect("valid deliveries_completed_total metric");

        let points_credited_total =
            IntCounter::new("points_credited_total", "Reward points credited to couriers")
                .expect("valid points_credited_total metric");

        let points_redeemed_total =
            IntCounter::new("points_redeemed_total", "Reward points redeemed by couriers")
                .expect("valid points_redeemed_total metric");

        let store_call_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "store_call_latency_seconds",
                "Latency of document store calls in seconds",
            ),
            &["op", "outcome"],
        )
        .expect("valid store_call_latency_seconds metric");

        registry
            .register(Box::new(order_accepts_total.clone()))
            .expect("register order_accepts_total");
        registry
            .register(Box::new(deliveries_completed_total.clone()))
            .expect("register deliveries_completed_total");
        registry
            .register(Box::new(points_credited_total.clone()))
            .expect("register points_credited_total");
        registry
            .register(Box::new(points_redeemed_total.clone()))
            .expect("register points_redeemed_total");
        registry
            .register(Box::new(store_call_latency_seconds.clone()))
            .expect("register store_call_latency_seconds");

        Self {
            registry,
            order_accepts_total,
            deliveries_completed_total,
            points_credited_total,
            points_redeemed_total,
            store_call_latency_seconds,
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
