use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub scheduled_promotions_total: IntCounterVec,
    pub scheduled_pending: IntGauge,
    pub sweep_duration_seconds: Histogram,
    pub order_numbers_issued_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Assignment operations by kind and outcome"),
            &["operation", "outcome"],
        )
        .expect("valid assignments_total metric");

        let scheduled_promotions_total = IntCounterVec::new(
            Opts::new(
                "scheduled_promotions_total",
                "Scheduled assignments processed by the sweep, by outcome",
            ),
            &["outcome"],
        )
        .expect("valid scheduled_promotions_total metric");

        let scheduled_pending = IntGauge::new(
            "scheduled_pending",
            "Scheduled assignments waiting for their execution time",
        )
        .expect("valid scheduled_pending metric");

        let sweep_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "sweep_duration_seconds",
            "Duration of one scheduler sweep in seconds",
        ))
        .expect("valid sweep_duration_seconds metric");

        let order_numbers_issued_total =
            IntCounter::new("order_numbers_issued_total", "Order numbers handed out")
                .expect("valid order_numbers_issued_total metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(scheduled_promotions_total.clone()))
            .expect("register scheduled_promotions_total");
        registry
            .register(Box::new(scheduled_pending.clone()))
            .expect("register scheduled_pending");
        registry
            .register(Box::new(sweep_duration_seconds.clone()))
            .expect("register sweep_duration_seconds");
        registry
            .register(Box::new(order_numbers_issued_total.clone()))
            .expect("register order_numbers_issued_total");

        Self {
            registry,
            assignments_total,
            scheduled_promotions_total,
            scheduled_pending,
            sweep_duration_seconds,
            order_numbers_issued_total,
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
