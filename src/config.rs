//! Diagnostic threshold configuration
//!
//! Every number the classification rules compare against, plus the confidence each
//! rule reports, lives here so it can be recalibrated without touching rule logic.
//! Partial JSON overrides are accepted; missing fields keep their defaults.

use crate::error::AnalyzeError;
use serde::{Deserialize, Serialize};

/// Tunable thresholds and confidences for the diagnostic rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticThresholds {
    /// Concept gap when the first pen point arrives later than this (seconds)
    pub concept_gap_latency_sec: f64,
    /// Concept gap when fewer pen strokes than this were drawn (count)
    pub concept_gap_min_strokes: u32,
    /// Concept gap when the pause ratio exceeds this (fraction 0-1)
    pub concept_gap_pause_ratio: f64,
    /// Hesitation when more eraser strokes than this were made (count)
    pub hesitation_erase_count: u32,
    /// Time pressure when late/early speed ratio exceeds this (ratio)
    pub time_pressure_acceleration: f64,
    /// Mistake requires a start latency below this (seconds)
    pub mistake_max_latency_sec: f64,
    /// Mistake requires a pause ratio below this (fraction 0-1)
    pub mistake_max_pause_ratio: f64,

    pub concept_gap_confidence: f64,
    pub hesitation_confidence: f64,
    pub time_pressure_confidence: f64,
    pub mistake_confidence: f64,
    /// Confidence of the fallback `ANALYSIS_COMPLETE` outcome
    pub default_confidence: f64,
}

impl Default for DiagnosticThresholds {
    fn default() -> Self {
        Self {
            concept_gap_latency_sec: 40.0,
            concept_gap_min_strokes: 5,
            concept_gap_pause_ratio: 0.7,
            hesitation_erase_count: 5,
            time_pressure_acceleration: 1.5,
            mistake_max_latency_sec: 10.0,
            mistake_max_pause_ratio: 0.3,
            concept_gap_confidence: 0.85,
            hesitation_confidence: 0.78,
            time_pressure_confidence: 0.72,
            mistake_confidence: 0.65,
            default_confidence: 0.50,
        }
    }
}

impl DiagnosticThresholds {
    /// Load thresholds from JSON, validating the result
    pub fn from_json(json: &str) -> Result<Self, AnalyzeError> {
        let thresholds: Self = serde_json::from_str(json)
            .map_err(|e| AnalyzeError::InvalidConfig(format!("Failed to parse thresholds: {e}")))?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Serialize thresholds to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, AnalyzeError> {
        serde_json::to_string_pretty(self).map_err(AnalyzeError::JsonError)
    }

    /// Check that thresholds are finite and confidences lie in [0, 1]
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        let limits = [
            ("concept_gap_latency_sec", self.concept_gap_latency_sec),
            ("concept_gap_pause_ratio", self.concept_gap_pause_ratio),
            ("time_pressure_acceleration", self.time_pressure_acceleration),
            ("mistake_max_latency_sec", self.mistake_max_latency_sec),
            ("mistake_max_pause_ratio", self.mistake_max_pause_ratio),
        ];
        if let Some((name, value)) = limits.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalyzeError::InvalidConfig(format!(
                "{name} must be finite, got {value}"
            )));
        }

        let confidences = [
            ("concept_gap_confidence", self.concept_gap_confidence),
            ("hesitation_confidence", self.hesitation_confidence),
            ("time_pressure_confidence", self.time_pressure_confidence),
            ("mistake_confidence", self.mistake_confidence),
            ("default_confidence", self.default_confidence),
        ];
        if let Some((name, value)) = confidences
            .iter()
            .find(|(_, v)| !(0.0..=1.0).contains(v))
        {
            return Err(AnalyzeError::InvalidConfig(format!(
                "{name} must be within [0, 1], got {value}"
            )));
        }

        Ok(())
    }
}
