//! Chalk Analyzer - Behavior analysis for handwritten problem-solving sessions
//!
//! The analyzer turns pen/eraser stroke telemetry from a drawing canvas into a
//! behavioral diagnosis through a deterministic pipeline: stroke metrics extraction
//! → ordered diagnostic rules → diagnosis with confidence and guidance.
//!
//! ## Modules
//!
//! - **Core**: `features` (metrics extraction) and `rules` (diagnostic classification)
//! - **Boundary**: `adapter` (JSON parsing and validation), `pipeline` (entry points), `ffi`

pub mod adapter;
pub mod config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod rules;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::DiagnosticThresholds;
pub use error::AnalyzeError;
pub use features::MetricsExtractor;
pub use pipeline::{analyze, analyze_json, BehaviorAnalyzer};
pub use rules::{Classification, DiagnosticClassifier, DiagnosticRule, FallbackRule};
pub use types::{Diagnosis, DiagnosisResult, Metrics, Point, PointType, Session, Stroke, Tool};

/// Analyzer version
pub const ANALYZER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and FFI
pub const PRODUCER_NAME: &str = "chalk-analyzer";
