//! Analysis pipeline orchestration
//!
//! This module provides the public API for stroke behavior analysis. The core path
//! is `Session -> MetricsExtractor -> Metrics -> DiagnosticClassifier -> DiagnosisResult`;
//! the JSON entry points wrap it with parsing, validation and encoding.

use crate::adapter::{parse_session, session_warnings, validate_session};
use crate::config::DiagnosticThresholds;
use crate::error::AnalyzeError;
use crate::features::MetricsExtractor;
use crate::rules::{DiagnosticClassifier, DiagnosticRule, FallbackRule};
use crate::types::{Diagnosis, DiagnosisResult, Session};

const EMPTY_SESSION_DETAILS: &str = "No strokes detected. Please write something on the canvas.";
const EMPTY_SESSION_TIP: &str = "Try drawing your solution before submitting.";

/// Analyze a session with the default thresholds.
///
/// Never fails: every degenerate input resolves to a well-defined result, and a
/// session with no strokes at all yields `Diagnosis::Error` without metrics.
pub fn analyze(session: &Session) -> DiagnosisResult {
    BehaviorAnalyzer::new().analyze(session)
}

/// Convert session JSON to diagnosis JSON (stateless, one-shot).
///
/// # Arguments
/// * `session_json` - Canvas session JSON
///
/// # Returns
/// Diagnosis JSON string
///
/// # Example
/// ```ignore
/// let diagnosis_json = analyze_json(session_json)?;
/// ```
pub fn analyze_json(session_json: String) -> Result<String, AnalyzeError> {
    BehaviorAnalyzer::new().analyze_json(&session_json)
}

/// Reusable analyzer holding a threshold configuration.
///
/// Holds no per-session state; one instance can serve any number of sessions,
/// including from several threads at once.
#[derive(Debug, Clone, Default)]
pub struct BehaviorAnalyzer {
    classifier: DiagnosticClassifier,
}

impl BehaviorAnalyzer {
    /// Create an analyzer with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an analyzer with custom thresholds
    pub fn with_thresholds(thresholds: DiagnosticThresholds) -> Result<Self, AnalyzeError> {
        thresholds.validate()?;
        Ok(Self {
            classifier: DiagnosticClassifier::new(thresholds),
        })
    }

    /// Create an analyzer from a JSON threshold override
    pub fn from_config_json(json: &str) -> Result<Self, AnalyzeError> {
        Self::with_thresholds(DiagnosticThresholds::from_json(json)?)
    }

    pub fn thresholds(&self) -> &DiagnosticThresholds {
        self.classifier.thresholds()
    }

    /// Diagnostic rules in evaluation order
    pub fn rules(&self) -> &[DiagnosticRule] {
        self.classifier.rules()
    }

    /// Outcome used when no rule matches
    pub fn fallback(&self) -> &FallbackRule {
        self.classifier.fallback()
    }

    /// Analyze a session
    pub fn analyze(&self, session: &Session) -> DiagnosisResult {
        if session.strokes.is_empty() {
            tracing::debug!(session_id = %session.session_id, "session has no strokes");
            return DiagnosisResult {
                diagnosis: Diagnosis::Error,
                confidence: 0.0,
                details: EMPTY_SESSION_DETAILS.to_string(),
                recommendations: Some(vec![EMPTY_SESSION_TIP.to_string()]),
                metrics: None,
            };
        }

        let metrics = MetricsExtractor::extract(&session.strokes);
        let classification = self.classifier.classify(&metrics);

        tracing::debug!(
            session_id = %session.session_id,
            problem_id = %session.problem_id,
            strokes = session.strokes.len(),
            diagnosis = %classification.diagnosis,
            rule = classification.rule,
            "session analyzed"
        );

        DiagnosisResult {
            diagnosis: classification.diagnosis,
            confidence: classification.confidence,
            details: classification.details,
            recommendations: Some(classification.recommendations),
            metrics: Some(metrics),
        }
    }

    /// Parse, validate and analyze session JSON, returning diagnosis JSON
    pub fn analyze_json(&self, session_json: &str) -> Result<String, AnalyzeError> {
        let session = parse_session(session_json)?;
        validate_session(&session)?;
        for warning in session_warnings(&session) {
            tracing::warn!(session_id = %session.session_id, "{}", warning);
        }
        let result = self.analyze(&session);
        serde_json::to_string(&result).map_err(|e| AnalyzeError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::{eraser_stroke, pen_stroke, straight_stroke};
    use crate::types::{Metrics, Stroke};
    use pretty_assertions::assert_eq;

    fn session_with(strokes: Vec<Stroke>) -> Session {
        Session {
            session_id: "sess-123".to_string(),
            problem_id: "demo_problem_001".to_string(),
            session_start: "2026-01-05T10:00:00".to_string(),
            strokes,
        }
    }

    /// `count` back-to-back one-second pen strokes starting at `start`
    fn steady_strokes(count: i64, start: f64) -> Vec<Stroke> {
        (0..count)
            .map(|i| straight_stroke(i, start + i as f64, 1.0, 50.0))
            .collect()
    }

    #[test]
    fn test_empty_session_is_error() {
        let result = analyze(&session_with(vec![]));

        assert_eq!(result.diagnosis, Diagnosis::Error);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.details, EMPTY_SESSION_DETAILS);
        assert_eq!(
            result.recommendations,
            Some(vec![EMPTY_SESSION_TIP.to_string()])
        );
        assert!(result.metrics.is_none());

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["diagnosis"], "ERROR");
        assert_eq!(value["confidence"], 0.0);
        assert!(value.get("metrics").is_none());
    }

    #[test]
    fn test_late_first_stroke_is_concept_gap() {
        let result = analyze(&session_with(vec![pen_stroke(
            1,
            &[(45.0, 0.0, 0.0), (46.0, 10.0, 0.0)],
        )]));

        assert_eq!(result.diagnosis, Diagnosis::ConceptGap);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.metrics.unwrap().start_latency, 45.0);
    }

    #[test]
    fn test_few_strokes_is_concept_gap() {
        let result = analyze(&session_with(steady_strokes(3, 5.0)));
        let metrics = result.metrics.unwrap();

        assert_eq!(metrics.total_strokes, 3);
        assert_eq!(metrics.start_latency, 5.0);
        assert_eq!(result.diagnosis, Diagnosis::ConceptGap);
    }

    #[test]
    fn test_many_erasers_is_hesitation() {
        let mut strokes = steady_strokes(8, 15.0);
        strokes.extend((100..106).map(|i| eraser_stroke(i, 30.0)));

        let result = analyze(&session_with(strokes));

        assert_eq!(result.metrics.unwrap().erase_count, 6);
        assert_eq!(result.diagnosis, Diagnosis::Hesitation);
        assert_eq!(result.confidence, 0.78);
    }

    #[test]
    fn test_late_speedup_is_time_pressure() {
        let strokes: Vec<Stroke> = (0..10)
            .map(|i| straight_stroke(i, i as f64, 1.0, if i >= 8 { 30.0 } else { 10.0 }))
            .collect();

        let result = analyze(&session_with(strokes));

        assert_eq!(result.metrics.unwrap().acceleration_end, 3.0);
        assert_eq!(result.diagnosis, Diagnosis::TimePressure);
        assert_eq!(result.confidence, 0.72);
    }

    #[test]
    fn test_quick_steady_start_is_mistake() {
        // Strokes at 2, 4, 6, 8, 10, 12 each lasting 1.8s: 0.2s gaps
        let strokes: Vec<Stroke> = (0..6)
            .map(|i| straight_stroke(i, 2.0 + 2.0 * i as f64, 1.8, 90.0))
            .collect();

        let result = analyze(&session_with(strokes));
        let metrics = result.metrics.unwrap();

        assert_eq!(metrics.start_latency, 2.0);
        assert!(metrics.pause_ratio < 0.3);
        assert_eq!(result.diagnosis, Diagnosis::Mistake);
        assert_eq!(result.confidence, 0.65);
    }

    #[test]
    fn test_neutral_session_completes() {
        let result = analyze(&session_with(steady_strokes(6, 20.0)));

        assert_eq!(result.diagnosis, Diagnosis::AnalysisComplete);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(
            result.metrics,
            Some(Metrics {
                start_latency: 20.0,
                avg_stroke_speed: 50.0,
                pause_ratio: 0.0,
                erase_count: 0,
                acceleration_end: 1.0,
                total_time: 26.0,
                total_strokes: 6,
                total_distance: 300.0,
            })
        );
    }

    #[test]
    fn test_only_eraser_strokes_is_not_error() {
        let result = analyze(&session_with(vec![eraser_stroke(1, 2.0)]));

        // No pen strokes: total_strokes = 0 < 5
        assert_eq!(result.diagnosis, Diagnosis::ConceptGap);
        assert!(result.metrics.is_some());
    }

    #[test]
    fn test_confidence_in_unit_interval() {
        let sessions = vec![
            session_with(vec![]),
            session_with(steady_strokes(2, 0.0)),
            session_with(steady_strokes(6, 20.0)),
            session_with(vec![pen_stroke(1, &[(3.0, 1.0, 1.0)])]),
            session_with(vec![pen_stroke(1, &[]), eraser_stroke(2, 0.0)]),
        ];

        for session in &sessions {
            let confidence = analyze(session).confidence;
            assert!((0.0..=1.0).contains(&confidence));
        }
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let mut strokes = steady_strokes(7, 3.3);
        strokes.push(eraser_stroke(50, 4.0));
        let session = session_with(strokes);

        let first = serde_json::to_string(&analyze(&session)).unwrap();
        let second = serde_json::to_string(&analyze(&session)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_thresholds() {
        let analyzer =
            BehaviorAnalyzer::from_config_json(r#"{"concept_gap_min_strokes": 2}"#).unwrap();
        let result = analyzer.analyze(&session_with(steady_strokes(3, 20.0)));
        assert_eq!(result.diagnosis, Diagnosis::AnalysisComplete);
        assert_eq!(analyzer.thresholds().concept_gap_min_strokes, 2);
        assert_eq!(analyzer.rules().len(), 4);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let thresholds = DiagnosticThresholds {
            default_confidence: -0.1,
            ..DiagnosticThresholds::default()
        };
        assert!(matches!(
            BehaviorAnalyzer::with_thresholds(thresholds),
            Err(AnalyzeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_analyze_json_roundtrip() {
        let json = r##"{
            "session_id": "sess-json",
            "problem_id": "demo_problem_001",
            "session_start": "2026-01-05T10:00:00",
            "strokes": [
                {
                    "stroke_id": 1,
                    "tool": "pen",
                    "color": "#000000",
                    "points": [
                        {"t": 45.0, "x": 100, "y": 200, "pressure": 0.5, "type": "start"},
                        {"t": 45.5, "x": 150, "y": 250, "pressure": 0.5, "type": "end"}
                    ]
                }
            ]
        }"##;

        let output = analyze_json(json.to_string()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(payload["diagnosis"], "CONCEPT_GAP");
        assert_eq!(payload["confidence"], 0.85);
        assert_eq!(payload["metrics"]["start_latency"], 45.0);
        assert_eq!(payload["metrics"]["total_strokes"], 1);
        assert_eq!(payload["recommendations"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_analyze_json_empty_strokes() {
        let json = r#"{"session_id": "s", "problem_id": "p", "session_start": "2026-01-05T10:00:00", "strokes": []}"#;
        let payload: serde_json::Value =
            serde_json::from_str(&analyze_json(json.to_string()).unwrap()).unwrap();

        assert_eq!(payload["diagnosis"], "ERROR");
        assert_eq!(payload["confidence"], 0.0);
        assert!(payload.get("metrics").is_none());
    }

    #[test]
    fn test_analyze_json_invalid() {
        assert!(analyze_json("not valid json".to_string()).is_err());

        let bad_pressure = r##"{"session_id": "s", "problem_id": "p", "session_start": "2026-01-05T10:00:00",
            "strokes": [{"stroke_id": 1, "tool": "pen", "color": "#000",
            "points": [{"t": 0.0, "x": 0, "y": 0, "pressure": 3.0, "type": "start"}]}]}"##;
        assert!(matches!(
            analyze_json(bad_pressure.to_string()),
            Err(AnalyzeError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_analyze_json_accepts_opaque_session_fields() {
        let json = r#"{"session_id": "", "problem_id": "p", "session_start": "2026-01-05 10:00:00", "strokes": []}"#;
        let payload: serde_json::Value =
            serde_json::from_str(&analyze_json(json.to_string()).unwrap()).unwrap();

        assert_eq!(payload["diagnosis"], "ERROR");
    }

    #[test]
    fn test_analyzer_shared_across_threads() {
        let analyzer = std::sync::Arc::new(BehaviorAnalyzer::new());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let analyzer = analyzer.clone();
                std::thread::spawn(move || {
                    analyzer
                        .analyze(&session_with(steady_strokes(6 + n, 20.0)))
                        .diagnosis
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Diagnosis::AnalysisComplete);
        }
    }
}
