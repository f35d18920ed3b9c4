//! Workspace umbrella crate for the tern telemetry envelope pipeline.
//!
//! This crate stitches together the envelope codec and the payload
//! normalizer so callers can turn raw envelope bytes into normalized items
//! with a single API entry point.

pub use envelope::{
    format_timestamp, parse_timestamp, CodecConfig, Envelope, EnvelopeError, EnvelopeHeaders,
    Item, ItemHeaders, PayloadRef,
};
pub use normalize::{
    normalize_envelope, normalize_item, ItemKind, NormalizeConfig, NormalizeError,
    NormalizeOutcome,
};

pub mod config;

pub use config::{ConfigLoadError, PipelineConfig};

use std::error::Error;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use serde_json::json;

/// Errors that can occur while processing envelope bytes through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The byte stream could not be parsed into an envelope.
    Parse(EnvelopeError),
    /// The processed envelope could not be serialized back to bytes.
    Encode(EnvelopeError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Parse(err) => write!(f, "envelope parse failure: {err}"),
            PipelineError::Encode(err) => write!(f, "envelope encode failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Parse(err) | PipelineError::Encode(err) => Some(err),
        }
    }
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_parse(&self, latency: Duration, result: Result<(), EnvelopeError>);
    fn record_normalize(&self, latency: Duration, outcome: NormalizeOutcome);
    fn record_encode(&self, latency: Duration, result: Result<(), EnvelopeError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock.write().expect("pipeline metrics lock poisoned");
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    fn record_parse(self, result: Result<(), EnvelopeError>) {
        self.recorder.record_parse(self.start.elapsed(), result);
    }

    fn record_normalize(self, outcome: NormalizeOutcome) {
        self.recorder.record_normalize(self.start.elapsed(), outcome);
    }

    fn record_encode(self, result: Result<(), EnvelopeError>) {
        self.recorder.record_encode(self.start.elapsed(), result);
    }
}

/// A parsed and normalized envelope, ready for downstream consumption.
#[derive(Debug, Clone)]
pub struct ProcessedEnvelope {
    /// The envelope with normalized payloads, item order preserved.
    pub envelope: Envelope,
    /// What normalization did, per item.
    pub outcome: NormalizeOutcome,
}

/// Parse and normalize envelope bytes with explicit stage configuration.
pub fn process_envelope_with_configs(
    bytes: &[u8],
    codec_cfg: &CodecConfig,
    normalize_cfg: &NormalizeConfig,
) -> Result<ProcessedEnvelope, PipelineError> {
    let mut parse_metrics = MetricsSpan::start();
    let mut envelope = match Envelope::from_slice_with(bytes, codec_cfg) {
        Ok(envelope) => {
            if let Some(span) = parse_metrics.take() {
                span.record_parse(Ok(()));
            }
            envelope
        }
        Err(err) => {
            if let Some(span) = parse_metrics.take() {
                span.record_parse(Err(err.clone()));
            }
            tracing::warn!(error = %err, bytes = bytes.len(), "envelope rejected");
            return Err(PipelineError::Parse(err));
        }
    };

    let mut normalize_metrics = MetricsSpan::start();
    let outcome = normalize_envelope(&mut envelope, normalize_cfg);
    if let Some(span) = normalize_metrics.take() {
        span.record_normalize(outcome);
    }

    tracing::debug!(
        items = envelope.items.len(),
        normalized = outcome.normalized_items,
        merged = outcome.merged_measure_items,
        skipped = outcome.skipped_items,
        "envelope processed"
    );
    Ok(ProcessedEnvelope { envelope, outcome })
}

/// Parse and normalize envelope bytes using default stage configuration.
pub fn process_envelope(bytes: &[u8]) -> Result<ProcessedEnvelope, PipelineError> {
    process_envelope_with_configs(bytes, &CodecConfig::default(), &NormalizeConfig::default())
}

/// Parse and normalize envelope bytes using a loaded pipeline config.
pub fn process_envelope_with_config(
    bytes: &[u8],
    cfg: &PipelineConfig,
) -> Result<ProcessedEnvelope, PipelineError> {
    process_envelope_with_configs(bytes, &cfg.codec, &cfg.normalize)
}

/// Serialize a processed envelope back to wire bytes.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, PipelineError> {
    let mut encode_metrics = MetricsSpan::start();
    match envelope.to_vec() {
        Ok(bytes) => {
            if let Some(span) = encode_metrics.take() {
                span.record_encode(Ok(()));
            }
            Ok(bytes)
        }
        Err(err) => {
            if let Some(span) = encode_metrics.take() {
                span.record_encode(Err(err.clone()));
            }
            Err(PipelineError::Encode(err))
        }
    }
}

/// Builds a small demonstration envelope: one transaction plus a measures
/// item, exercising every normalization rule. Used by the demo binary.
///
/// ```rust
/// let envelope = tern::demo_envelope();
/// let bytes = envelope.to_vec().unwrap();
/// let processed = tern::process_envelope(&bytes).unwrap();
/// assert_eq!(processed.outcome.merged_measure_items, 1);
/// ```
pub fn demo_envelope() -> Envelope {
    let mut envelope = Envelope::new();
    envelope.add_item(Item::from_json(
        "transaction",
        json!({"transaction": "/demo"}),
    ));
    envelope.add_item(Item::from_json(
        "measures",
        json!({"measurements": {"LCP": 420.9, "fid": 3}}),
    ));
    envelope
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, MutexGuard};

    use super::*;

    // The metrics recorder is process-global; tests that drive the pipeline
    // serialize on this lock so recordings stay attributable.
    fn pipeline_lock() -> MutexGuard<'static, ()> {
        static LOCK: Mutex<()> = Mutex::new(());
        LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn pipeline_parses_and_normalizes() {
        let _guard = pipeline_lock();
        let bytes = demo_envelope().to_vec().unwrap();
        let processed = process_envelope(&bytes).unwrap();

        assert_eq!(processed.outcome.merged_measure_items, 1);
        assert_eq!(processed.envelope.items.len(), 1);
        let body = processed.envelope.items[0].payload.as_value().unwrap();
        assert_eq!(body["contexts"]["measures"]["measurements"]["lcp"], 420.9);
        assert_eq!(body["contexts"]["measures"]["measurements"]["fid"], 3);
    }

    #[test]
    fn parse_failures_surface_as_pipeline_errors() {
        let _guard = pipeline_lock();
        let res = process_envelope(b"not an envelope header");
        assert!(matches!(
            res,
            Err(PipelineError::Parse(EnvelopeError::MalformedHeader { .. }))
        ));
    }

    #[derive(Default)]
    struct RecordingMetrics {
        parses: Mutex<Vec<bool>>,
        normalizes: Mutex<Vec<NormalizeOutcome>>,
        encodes: Mutex<Vec<bool>>,
    }

    impl PipelineMetrics for RecordingMetrics {
        fn record_parse(&self, _latency: Duration, result: Result<(), EnvelopeError>) {
            self.parses.lock().unwrap().push(result.is_ok());
        }

        fn record_normalize(&self, _latency: Duration, outcome: NormalizeOutcome) {
            self.normalizes.lock().unwrap().push(outcome);
        }

        fn record_encode(&self, _latency: Duration, result: Result<(), EnvelopeError>) {
            self.encodes.lock().unwrap().push(result.is_ok());
        }
    }

    #[test]
    fn metrics_recorder_observes_every_stage() {
        let _guard = pipeline_lock();
        let recorder = Arc::new(RecordingMetrics::default());
        set_pipeline_metrics(Some(recorder.clone()));

        let bytes = demo_envelope().to_vec().unwrap();
        let processed = process_envelope(&bytes).unwrap();
        let _ = encode_envelope(&processed.envelope).unwrap();
        let _ = process_envelope(b"garbage");

        set_pipeline_metrics(None);

        assert_eq!(*recorder.parses.lock().unwrap(), vec![true, false]);
        assert_eq!(recorder.normalizes.lock().unwrap().len(), 1);
        assert_eq!(*recorder.encodes.lock().unwrap(), vec![true]);
    }
}
