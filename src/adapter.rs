//! Session payload adapter
//!
//! Parses canvas session JSON and checks it is well-formed before it reaches the
//! analyzer. The analyzer itself assumes validated input and never re-checks it.

use crate::error::AnalyzeError;
use crate::types::{Session, Stroke};
use chrono::{DateTime, NaiveDateTime};

/// Parse a canvas session JSON string into a Session
pub fn parse_session(json: &str) -> Result<Session, AnalyzeError> {
    serde_json::from_str(json)
        .map_err(|e| AnalyzeError::ParseError(format!("Failed to parse canvas session: {}", e)))
}

/// Parse newline-delimited session JSON, skipping blank lines
pub fn parse_ndjson(input: &str) -> Result<Vec<Session>, AnalyzeError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_session(line.trim())
                .map_err(|e| AnalyzeError::ParseError(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

/// Validate a session's values
///
/// Rejects non-finite timestamps or coordinates, pressure outside [0, 1] and points
/// that go back in time within a stroke. Reports the first violation found.
/// `session_id` and `session_start` are opaque strings and are never rejected.
pub fn validate_session(session: &Session) -> Result<(), AnalyzeError> {
    session.strokes.iter().try_for_each(validate_stroke)
}

/// Non-fatal observations about a session's identifying fields
///
/// Flags a blank `session_id` and a `session_start` that is not an ISO-8601
/// timestamp. Neither stops analysis.
pub fn session_warnings(session: &Session) -> Vec<String> {
    let mut warnings = Vec::new();
    if session.session_id.trim().is_empty() {
        warnings.push("session_id is blank".to_string());
    }
    if let Err(e) = parse_session_start(&session.session_start) {
        warnings.push(e.to_string());
    }
    warnings
}

/// Parse `session_start` as RFC 3339 or a naive ISO-8601 timestamp
pub fn parse_session_start(value: &str) -> Result<NaiveDateTime, AnalyzeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| {
            AnalyzeError::InvalidSession(format!("Invalid session_start '{}': {}", value, e))
        })
}

fn validate_stroke(stroke: &Stroke) -> Result<(), AnalyzeError> {
    let invalid = |index: usize, reason: String| {
        AnalyzeError::InvalidSession(format!(
            "stroke {} point {}: {}",
            stroke.stroke_id, index, reason
        ))
    };

    for (i, point) in stroke.points.iter().enumerate() {
        if !(point.t.is_finite() && point.x.is_finite() && point.y.is_finite()) {
            return Err(invalid(i, "non-finite coordinate or timestamp".to_string()));
        }
        if !(0.0..=1.0).contains(&point.pressure) {
            return Err(invalid(
                i,
                format!("pressure {} outside [0, 1]", point.pressure),
            ));
        }
    }

    if let Some(i) = stroke
        .points
        .windows(2)
        .position(|pair| pair[1].t < pair[0].t)
    {
        return Err(invalid(
            i + 1,
            format!(
                "timestamp {} precedes previous point at {}",
                stroke.points[i + 1].t,
                stroke.points[i].t
            ),
        ));
    }

    Ok(())
}
