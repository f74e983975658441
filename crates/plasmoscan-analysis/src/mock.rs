//! Mock backends for deterministic testing.
//!
//! Provides scripted implementations of the analysis, quality, and
//! biometric collaborators with call logs and concurrency instrumentation,
//! so tests can assert not just outcomes but calling discipline (e.g. that
//! the batch pipeline never has two analysis calls in flight).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use plasmoscan_analysis::mock::MockAnalysisBackend;
//!
//! #[tokio::test]
//! async fn test_with_mock_backend() {
//!     let backend = MockAnalysisBackend::new()
//!         .with_latency_ms(5)
//!         .with_failure_for("bad.jpg");
//!
//!     let result = backend.analyze("good.jpg", SampleType::ThinSmear).await;
//!     assert!(result.is_ok());
//!     assert_eq!(backend.peak_in_flight(), 1);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use plasmoscan_core::{
    AnalysisBackend, AnalysisResult, BiometricSample, BiometricVerifier, Error, QualityAssessor,
    QualityReport, Result, SampleType,
};

/// One logged backend invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: Instant,
}

// ---------------------------------------------------------------------------
// Analysis backend
// ---------------------------------------------------------------------------

/// Mock analysis backend for testing.
#[derive(Clone)]
pub struct MockAnalysisBackend {
    config: Arc<MockAnalysisConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    calls_started: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

#[derive(Debug, Clone)]
struct MockAnalysisConfig {
    latency_ms: u64,
    /// Per-call latencies cycled by call index; overrides `latency_ms` when
    /// non-empty.
    latency_schedule: Vec<u64>,
    fail_uris: HashSet<String>,
    timeout_uris: HashSet<String>,
    fixed_results: HashMap<String, AnalysisResult>,
    failure_rate: f64,
    default_detected: bool,
}

impl Default for MockAnalysisConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            latency_schedule: Vec::new(),
            fail_uris: HashSet::new(),
            timeout_uris: HashSet::new(),
            fixed_results: HashMap::new(),
            failure_rate: 0.0,
            default_detected: false,
        }
    }
}

impl Default for MockAnalysisBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalysisBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockAnalysisConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
            calls_started: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set simulated latency for all calls.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set per-call latencies, cycled by call index. Lets tests give each
    /// image a different artificial response time.
    pub fn with_latency_schedule(mut self, schedule: Vec<u64>) -> Self {
        Arc::make_mut(&mut self.config).latency_schedule = schedule;
        self
    }

    /// Script an analysis failure for a specific uri.
    pub fn with_failure_for(mut self, uri: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).fail_uris.insert(uri.into());
        self
    }

    /// Script a timeout for a specific uri.
    pub fn with_timeout_for(mut self, uri: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .timeout_uris
            .insert(uri.into());
        self
    }

    /// Fix the result returned for a specific uri.
    pub fn with_result(mut self, uri: impl Into<String>, result: AnalysisResult) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_results
            .insert(uri.into(), result);
        self
    }

    /// Set random failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Whether default (non-fixed) results report detected parasites.
    pub fn with_default_detection(mut self, detected: bool) -> Self {
        Arc::make_mut(&mut self.config).default_detected = detected;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of analyze calls started.
    pub fn call_count(&self) -> usize {
        self.calls_started.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently in-flight analyze calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear();
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            timestamp: Instant::now(),
        });
    }

    fn should_fail_randomly(&self) -> bool {
        use rand::Rng;
        self.config.failure_rate > 0.0
            && rand::thread_rng().gen::<f64>() < self.config.failure_rate
    }

    fn default_result(&self, uri: &str) -> AnalysisResult {
        let detected = self.config.default_detected;
        AnalysisResult {
            image_uri: uri.to_string(),
            confidence: 88,
            parasites_detected: detected,
            parasite_count: if detected { 7 } else { 0 },
            rbc_count: 4800,
            completed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for MockAnalysisBackend {
    async fn analyze(&self, uri: &str, _sample_type: SampleType) -> Result<AnalysisResult> {
        self.log_call("analyze", uri);
        let call_index = self.calls_started.fetch_add(1, Ordering::SeqCst);

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let latency = if self.config.latency_schedule.is_empty() {
            self.config.latency_ms
        } else {
            self.config.latency_schedule[call_index % self.config.latency_schedule.len()]
        };
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let outcome = if self.config.timeout_uris.contains(uri) {
            Err(Error::Timeout(format!("scripted timeout for {uri}")))
        } else if self.config.fail_uris.contains(uri) || self.should_fail_randomly() {
            Err(Error::Analysis(format!("scripted failure for {uri}")))
        } else if let Some(fixed) = self.config.fixed_results.get(uri) {
            Ok(fixed.clone())
        } else {
            Ok(self.default_result(uri))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ---------------------------------------------------------------------------
// Quality assessor
// ---------------------------------------------------------------------------

/// Mock quality assessor with scripted reports.
#[derive(Clone)]
pub struct MockQualityAssessor {
    config: Arc<MockQualityConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockQualityConfig {
    default_score: u8,
    reports: HashMap<String, QualityReport>,
    fail_uris: HashSet<String>,
    latency_ms: u64,
}

impl Default for MockQualityConfig {
    fn default() -> Self {
        Self {
            default_score: 85,
            reports: HashMap::new(),
            fail_uris: HashSet::new(),
            latency_ms: 0,
        }
    }
}

impl Default for MockQualityAssessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQualityAssessor {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockQualityConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the score returned for uris without a scripted report.
    pub fn with_default_score(mut self, score: u8) -> Self {
        Arc::make_mut(&mut self.config).default_score = score;
        self
    }

    /// Script a report for a specific uri.
    pub fn with_report(mut self, uri: impl Into<String>, report: QualityReport) -> Self {
        Arc::make_mut(&mut self.config).reports.insert(uri.into(), report);
        self
    }

    /// Script an assessment failure for a specific uri.
    pub fn with_failure_for(mut self, uri: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).fail_uris.insert(uri.into());
        self
    }

    /// Set simulated latency for all calls.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Number of assess calls made.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

#[async_trait]
impl QualityAssessor for MockQualityAssessor {
    async fn assess(&self, uri: &str) -> Result<QualityReport> {
        self.call_log.lock().unwrap().push(MockCall {
            operation: "assess".to_string(),
            input: uri.to_string(),
            timestamp: Instant::now(),
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail_uris.contains(uri) {
            return Err(Error::Assessment(format!("scripted failure for {uri}")));
        }
        Ok(self
            .config
            .reports
            .get(uri)
            .cloned()
            .unwrap_or_else(|| QualityReport::new(self.config.default_score, Vec::new())))
    }
}

// ---------------------------------------------------------------------------
// Biometric verifier
// ---------------------------------------------------------------------------

/// Mock biometric verifier with genuine per-user template matching.
///
/// A sample identifies a user only if its bytes equal that user's enrolled
/// template; there is no "first enrolled user wins" shortcut.
#[derive(Clone, Default)]
pub struct MockBiometricVerifier {
    enrolled: Arc<Mutex<HashMap<Uuid, Vec<u8>>>>,
    fail_enroll: Arc<AtomicBool>,
}

impl MockBiometricVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent enroll calls fail (sensor error).
    pub fn set_fail_enroll(&self, fail: bool) {
        self.fail_enroll.store(fail, Ordering::SeqCst);
    }

    /// Seed an enrollment directly.
    pub fn pre_enroll(&self, user_id: Uuid, template: Vec<u8>) {
        self.enrolled.lock().unwrap().insert(user_id, template);
    }

    /// Number of enrolled templates.
    pub fn enrolled_count(&self) -> usize {
        self.enrolled.lock().unwrap().len()
    }
}

#[async_trait]
impl BiometricVerifier for MockBiometricVerifier {
    async fn enroll(&self, user_id: Uuid, sample: &BiometricSample) -> Result<Vec<u8>> {
        if self.fail_enroll.load(Ordering::SeqCst) {
            return Err(Error::EnrollmentFailed("sensor error".to_string()));
        }
        let template = sample.data.clone();
        self.enrolled
            .lock()
            .unwrap()
            .insert(user_id, template.clone());
        Ok(template)
    }

    async fn identify(&self, sample: &BiometricSample) -> Result<Option<Uuid>> {
        let enrolled = self.enrolled.lock().unwrap();
        Ok(enrolled
            .iter()
            .find(|(_, template)| template.as_slice() == sample.data.as_slice())
            .map(|(id, _)| *id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_analysis_default_result() {
        let backend = MockAnalysisBackend::new();
        let result = backend
            .analyze("smear.jpg", SampleType::ThinSmear)
            .await
            .unwrap();
        assert_eq!(result.image_uri, "smear.jpg");
        assert!(!result.parasites_detected);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_analysis_scripted_failure_and_timeout() {
        let backend = MockAnalysisBackend::new()
            .with_failure_for("bad.jpg")
            .with_timeout_for("slow.jpg");

        let err = backend
            .analyze("bad.jpg", SampleType::ThinSmear)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Analysis(_)));

        let err = backend
            .analyze("slow.jpg", SampleType::ThinSmear)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_analysis_peak_in_flight_tracks_concurrency() {
        let backend = MockAnalysisBackend::new().with_latency_ms(20);

        let a = backend.clone();
        let b = backend.clone();
        let (ra, rb) = tokio::join!(
            a.analyze("one.jpg", SampleType::ThinSmear),
            b.analyze("two.jpg", SampleType::ThinSmear),
        );
        ra.unwrap();
        rb.unwrap();

        assert_eq!(backend.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_quality_scripted_report() {
        let assessor = MockQualityAssessor::new()
            .with_default_score(90)
            .with_report("blurry.jpg", QualityReport::new(35, vec!["blur".to_string()]));

        let clean = assessor.assess("clean.jpg").await.unwrap();
        assert_eq!(clean.score, 90);

        let blurry = assessor.assess("blurry.jpg").await.unwrap();
        assert_eq!(blurry.score, 35);
        assert_eq!(assessor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_biometric_template_matching() {
        let verifier = MockBiometricVerifier::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        verifier
            .enroll(alice, &BiometricSample::new(vec![1, 1, 1]))
            .await
            .unwrap();
        verifier
            .enroll(bob, &BiometricSample::new(vec![2, 2, 2]))
            .await
            .unwrap();

        let hit = verifier
            .identify(&BiometricSample::new(vec![2, 2, 2]))
            .await
            .unwrap();
        assert_eq!(hit, Some(bob));

        let miss = verifier
            .identify(&BiometricSample::new(vec![9, 9, 9]))
            .await
            .unwrap();
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn test_biometric_enroll_failure() {
        let verifier = MockBiometricVerifier::new();
        verifier.set_fail_enroll(true);
        let err = verifier
            .enroll(Uuid::new_v4(), &BiometricSample::new(vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnrollmentFailed(_)));
        assert_eq!(verifier.enrolled_count(), 0);
    }
}
