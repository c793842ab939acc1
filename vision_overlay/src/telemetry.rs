use frame_pipeline::{InferenceOutcome, PipelineObserver};
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;
use std::time::Duration;

pub struct Metrics {
    request_counter: Counter<u64>,
    frames_offered: Counter<u64>,
    inference_duration: Histogram<u64>,
    inference_outcomes: Counter<u64>,
    camera_fps: Gauge<f64>,
    // Dropping the last provider handle shuts its readers down.
    _provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| prometheus::Error::Msg(e.to_string()))?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("vision_overlay");
        global::set_meter_provider(provider.clone());

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let frames_offered = meter
            .u64_counter("frames_offered_total")
            .with_description("Frames offered to the inference pipeline")
            .build();

        // Remote vision models answer in hundreds of ms up to tens of seconds.
        let boundaries = generate_boundaries((100, 1000, 2000, 10000, 60000));

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of inference calls in milliseconds")
            .build();

        let inference_outcomes = meter
            .u64_counter("inference_outcomes_total")
            .with_description("Completed inference calls by outcome")
            .build();

        let camera_fps = meter
            .f64_gauge("camera_fps")
            .with_description("FPS of the frame source")
            .build();

        Ok(Metrics {
            request_counter,
            frames_offered,
            inference_duration,
            inference_outcomes,
            camera_fps,
            _provider: provider,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_camera_fps(&self, fps: f64) {
        self.camera_fps.record(fps, &[]);
    }
}

impl PipelineObserver for Metrics {
    fn frame_offered(&self, accepted: bool) {
        let attributes = vec![KeyValue::new("accepted", accepted)];
        self.frames_offered.add(1, &attributes);
    }

    fn inference_completed(&self, outcome: &InferenceOutcome, elapsed: Duration) {
        let attributes = vec![KeyValue::new("outcome", outcome.label())];
        self.inference_duration
            .record(elapsed.as_millis() as u64, &attributes);
        self.inference_outcomes.add(1, &attributes);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 100;
    let middle_step: usize = 250;
    let end_step: usize = 1000;
    let tail_step: usize = 10000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
