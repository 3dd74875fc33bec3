//! Diagnostic classification rules
//!
//! Metrics are matched against an explicit ordered list of rules; the first rule
//! whose predicate holds decides the diagnosis. Predicates overlap, so list order
//! is the precedence. When nothing matches, the fallback `ANALYSIS_COMPLETE`
//! outcome is returned.

use crate::config::DiagnosticThresholds;
use crate::types::{Diagnosis, Metrics};

/// Outcome of classifying one metrics record
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub diagnosis: Diagnosis,
    pub confidence: f64,
    pub details: String,
    pub recommendations: Vec<String>,
    /// Name of the rule that produced this outcome
    pub rule: &'static str,
}

type Predicate = fn(&Metrics, &DiagnosticThresholds) -> bool;
type ConfidenceOf = fn(&DiagnosticThresholds) -> f64;
type Details = fn(&Metrics) -> String;
type Condition = fn(&DiagnosticThresholds) -> String;

/// A single (predicate, outcome) pair in the rule chain
#[derive(Clone, Copy)]
pub struct DiagnosticRule {
    pub name: &'static str,
    pub diagnosis: Diagnosis,
    predicate: Predicate,
    confidence: ConfidenceOf,
    details: Details,
    condition: Condition,
    recommendations: &'static [&'static str],
}

impl std::fmt::Debug for DiagnosticRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticRule")
            .field("name", &self.name)
            .field("diagnosis", &self.diagnosis)
            .finish()
    }
}

impl DiagnosticRule {
    /// Whether this rule's predicate holds for the metrics
    pub fn matches(&self, metrics: &Metrics, thresholds: &DiagnosticThresholds) -> bool {
        (self.predicate)(metrics, thresholds)
    }

    /// Confidence reported when this rule fires
    pub fn confidence(&self, thresholds: &DiagnosticThresholds) -> f64 {
        (self.confidence)(thresholds)
    }

    /// Human-readable predicate with the live threshold values
    pub fn condition(&self, thresholds: &DiagnosticThresholds) -> String {
        (self.condition)(thresholds)
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        self.recommendations
    }

    fn outcome(&self, metrics: &Metrics, thresholds: &DiagnosticThresholds) -> Classification {
        Classification {
            diagnosis: self.diagnosis,
            confidence: self.confidence(thresholds),
            details: (self.details)(metrics),
            recommendations: self.recommendations.iter().map(|r| r.to_string()).collect(),
            rule: self.name,
        }
    }
}

const CONCEPT_GAP_TIPS: &[&str] = &[
    "Review the foundational concepts for this problem type.",
    "Try solving similar but easier problems first.",
    "Consider watching a tutorial on this topic.",
];

const HESITATION_TIPS: &[&str] = &[
    "Practice similar problems to build confidence.",
    "Before starting, spend 30 seconds planning your approach.",
    "Don't be afraid to commit to one method.",
];

const TIME_PRESSURE_TIPS: &[&str] = &[
    "Practice time management: allocate time per problem.",
    "Learn to skip and return to difficult problems.",
    "Work on improving calculation speed.",
];

const MISTAKE_TIPS: &[&str] = &[
    "Double-check your arithmetic.",
    "Read the question again before answering.",
    "Take a breath before clicking submit.",
];

const FALLBACK_TIPS: &[&str] = &[
    "Review your work carefully.",
    "Compare with practice problems.",
];

/// Long start, very few strokes, or mostly idle
pub const CONCEPT_GAP: DiagnosticRule = DiagnosticRule {
    name: "concept_gap",
    diagnosis: Diagnosis::ConceptGap,
    predicate: |m, t| {
        m.start_latency > t.concept_gap_latency_sec
            || m.total_strokes < t.concept_gap_min_strokes
            || m.pause_ratio > t.concept_gap_pause_ratio
    },
    confidence: |t| t.concept_gap_confidence,
    details: |m| {
        format!(
            "You seem to have difficulty starting or continuing the problem. \
             Start latency was {:.1}s, and pause ratio was {:.0}%.",
            m.start_latency,
            m.pause_ratio * 100.0
        )
    },
    condition: |t| {
        format!(
            "start_latency > {} OR total_strokes < {} OR pause_ratio > {}",
            t.concept_gap_latency_sec, t.concept_gap_min_strokes, t.concept_gap_pause_ratio
        )
    },
    recommendations: CONCEPT_GAP_TIPS,
};

/// Heavy eraser use
pub const HESITATION: DiagnosticRule = DiagnosticRule {
    name: "hesitation",
    diagnosis: Diagnosis::Hesitation,
    predicate: |m, t| m.erase_count > t.hesitation_erase_count,
    confidence: |t| t.hesitation_confidence,
    details: |m| {
        format!(
            "You erased {} times, suggesting uncertainty about your approach. \
             This indicates you may be second-guessing your solution strategy.",
            m.erase_count
        )
    },
    condition: |t| format!("erase_count > {}", t.hesitation_erase_count),
    recommendations: HESITATION_TIPS,
};

/// Writing sped up sharply near the end
pub const TIME_PRESSURE: DiagnosticRule = DiagnosticRule {
    name: "time_pressure",
    diagnosis: Diagnosis::TimePressure,
    predicate: |m, t| m.acceleration_end > t.time_pressure_acceleration,
    confidence: |t| t.time_pressure_confidence,
    details: |m| {
        format!(
            "Your writing speed increased by {:.0}% in the final section. \
             This pattern suggests you were rushing to finish.",
            (m.acceleration_end - 1.0) * 100.0
        )
    },
    condition: |t| format!("acceleration_end > {}", t.time_pressure_acceleration),
    recommendations: TIME_PRESSURE_TIPS,
};

/// Quick, steady start: likely a careless slip
pub const MISTAKE: DiagnosticRule = DiagnosticRule {
    name: "mistake",
    diagnosis: Diagnosis::Mistake,
    predicate: |m, t| {
        m.start_latency < t.mistake_max_latency_sec && m.pause_ratio < t.mistake_max_pause_ratio
    },
    confidence: |t| t.mistake_confidence,
    details: |m| {
        format!(
            "You started quickly ({:.1}s) and wrote steadily. \
             If this was incorrect, it's likely a careless calculation error.",
            m.start_latency
        )
    },
    condition: |t| {
        format!(
            "start_latency < {} AND pause_ratio < {}",
            t.mistake_max_latency_sec, t.mistake_max_pause_ratio
        )
    },
    recommendations: MISTAKE_TIPS,
};

/// Outcome used when no rule in the chain fires
#[derive(Clone, Copy)]
pub struct FallbackRule {
    pub name: &'static str,
    pub diagnosis: Diagnosis,
    confidence: ConfidenceOf,
    details: Details,
    recommendations: &'static [&'static str],
}

impl std::fmt::Debug for FallbackRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackRule")
            .field("name", &self.name)
            .field("diagnosis", &self.diagnosis)
            .finish()
    }
}

impl FallbackRule {
    pub fn confidence(&self, thresholds: &DiagnosticThresholds) -> f64 {
        (self.confidence)(thresholds)
    }

    pub fn condition(&self) -> &'static str {
        "otherwise"
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        self.recommendations
    }

    fn outcome(&self, metrics: &Metrics, thresholds: &DiagnosticThresholds) -> Classification {
        Classification {
            diagnosis: self.diagnosis,
            confidence: self.confidence(thresholds),
            details: (self.details)(metrics),
            recommendations: self.recommendations.iter().map(|r| r.to_string()).collect(),
            rule: self.name,
        }
    }
}

pub const ANALYSIS_COMPLETE: FallbackRule = FallbackRule {
    name: "analysis_complete",
    diagnosis: Diagnosis::AnalysisComplete,
    confidence: |t| t.default_confidence,
    details: |m| {
        format!(
            "Analysis complete. Total time: {:.1}s, {} strokes recorded.",
            m.total_time, m.total_strokes
        )
    },
    recommendations: FALLBACK_TIPS,
};

/// Rules in precedence order (fallback excluded)
pub fn default_rules() -> Vec<DiagnosticRule> {
    vec![CONCEPT_GAP, HESITATION, TIME_PRESSURE, MISTAKE]
}

/// First-match-wins classifier over an ordered rule list
#[derive(Debug, Clone)]
pub struct DiagnosticClassifier {
    thresholds: DiagnosticThresholds,
    rules: Vec<DiagnosticRule>,
}

impl Default for DiagnosticClassifier {
    fn default() -> Self {
        Self::new(DiagnosticThresholds::default())
    }
}

impl DiagnosticClassifier {
    /// Create a classifier with the default rule order
    pub fn new(thresholds: DiagnosticThresholds) -> Self {
        Self {
            thresholds,
            rules: default_rules(),
        }
    }

    pub fn thresholds(&self) -> &DiagnosticThresholds {
        &self.thresholds
    }

    /// Rules in evaluation order, not including the fallback
    pub fn rules(&self) -> &[DiagnosticRule] {
        &self.rules
    }

    /// Outcome when no rule matches
    pub fn fallback(&self) -> &FallbackRule {
        &ANALYSIS_COMPLETE
    }

    /// The first rule whose predicate holds, if any
    pub fn matching_rule(&self, metrics: &Metrics) -> Option<&DiagnosticRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(metrics, &self.thresholds))
    }

    /// Classify metrics into a diagnosis
    pub fn classify(&self, metrics: &Metrics) -> Classification {
        let classification = match self.matching_rule(metrics) {
            Some(rule) => rule.outcome(metrics, &self.thresholds),
            None => self.fallback().outcome(metrics, &self.thresholds),
        };
        tracing::debug!(
            rule = classification.rule,
            diagnosis = %classification.diagnosis,
            "rule matched"
        );
        classification
    }
}
