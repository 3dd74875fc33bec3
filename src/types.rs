//! Core data types for stroke telemetry and diagnoses
//!
//! Sessions, strokes and points arrive from the drawing surface; `Metrics` and
//! `DiagnosisResult` are what the analyzer hands back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a point within its stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointType {
    Start,
    Move,
    End,
}

/// Instrument used for a stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Pen,
    Eraser,
}

/// A single sampled point of a stroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Timestamp in seconds
    pub t: f64,
    /// X coordinate in canvas pixels
    pub x: f64,
    /// Y coordinate in canvas pixels
    pub y: f64,
    /// Pen pressure (0-1)
    pub pressure: f64,
    /// Phase within the stroke
    #[serde(rename = "type")]
    pub point_type: PointType,
}

/// One continuous pen-down to pen-up gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub stroke_id: i64,
    pub tool: Tool,
    /// Hex color string as sent by the canvas
    pub color: String,
    /// Points in recording order, ascending by `t`
    pub points: Vec<Point>,
}

impl Stroke {
    /// Timestamp of the first point, if any
    pub fn start_t(&self) -> Option<f64> {
        self.points.first().map(|p| p.t)
    }

    /// Timestamp of the last point, if any
    pub fn end_t(&self) -> Option<f64> {
        self.points.last().map(|p| p.t)
    }

    pub fn is_pen(&self) -> bool {
        self.tool == Tool::Pen
    }
}

/// A problem-solving session captured from the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub problem_id: String,
    /// Session start as reported by the client (ISO-8601)
    pub session_start: String,
    /// Strokes in recording order
    pub strokes: Vec<Stroke>,
}

/// Scalar metrics derived from a session's strokes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Seconds until the first pen point (2 dp)
    pub start_latency: f64,
    /// Mean per-stroke speed in px/sec (1 dp)
    pub avg_stroke_speed: f64,
    /// Share of total time spent between pen strokes (3 dp)
    pub pause_ratio: f64,
    /// Number of eraser strokes
    pub erase_count: u32,
    /// Late-session speed over early-session speed (2 dp, 0 when undefined)
    pub acceleration_end: f64,
    /// Latest pen point timestamp in seconds (2 dp)
    pub total_time: f64,
    /// Number of pen strokes
    pub total_strokes: u32,
    /// Total pen path length in px (0 dp)
    pub total_distance: f64,
}

/// Diagnostic category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Diagnosis {
    Error,
    ConceptGap,
    Hesitation,
    TimePressure,
    Mistake,
    AnalysisComplete,
}

impl Diagnosis {
    /// Wire tag for this diagnosis
    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::Error => "ERROR",
            Diagnosis::ConceptGap => "CONCEPT_GAP",
            Diagnosis::Hesitation => "HESITATION",
            Diagnosis::TimePressure => "TIME_PRESSURE",
            Diagnosis::Mistake => "MISTAKE",
            Diagnosis::AnalysisComplete => "ANALYSIS_COMPLETE",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of analyzing one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub diagnosis: Diagnosis,
    /// Confidence in the diagnosis (0-1)
    pub confidence: f64,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    /// Absent only for `Diagnosis::Error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}
