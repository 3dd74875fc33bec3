//! Chalk CLI - Command-line interface for Chalk Analyzer
//!
//! Commands:
//! - analyze: Diagnose canvas sessions (single JSON or NDJSON batch)
//! - validate: Validate session payloads
//! - rules: Print the diagnostic rule chain with live thresholds
//! - doctor: Diagnose analyzer configuration
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use chalk_analyzer::adapter::{parse_ndjson, parse_session, session_warnings, validate_session};
use chalk_analyzer::{
    AnalyzeError, BehaviorAnalyzer, DiagnosisResult, DiagnosticThresholds, Point, PointType,
    Session, Stroke, Tool, ANALYZER_VERSION, PRODUCER_NAME,
};

/// Chalk - Behavior analysis for handwritten problem-solving sessions
#[derive(Parser)]
#[command(name = "chalk")]
#[command(version = ANALYZER_VERSION)]
#[command(about = "Diagnose problem-solving behavior from canvas stroke data", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze canvas sessions and print diagnoses
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Threshold configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate session payloads without analyzing them
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the diagnostic rules in evaluation order
    Rules {
        /// Threshold configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose analyzer health and configuration
    Doctor {
        /// Threshold configuration JSON file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// A single session JSON object
    Json,
    /// Newline-delimited JSON (one session per line)
    Ndjson,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Newline-delimited JSON (one diagnosis per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (canvas session)
    Input,
    /// Output schema (diagnosis result)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), ChalkCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_analyze(&input, &output, input_format, output_format, config.as_deref()),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Rules { config, json } => cmd_rules(config.as_deref(), json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), ChalkCliError> {
    let analyzer = load_analyzer(config)?;
    let sessions = read_sessions(input, input_format)?;

    if sessions.is_empty() {
        return Err(ChalkCliError::NoSessions);
    }

    let results = sessions
        .iter()
        .map(|session| {
            validate_session(session)?;
            Ok(analyzer.analyze(session))
        })
        .collect::<Result<Vec<DiagnosisResult>, AnalyzeError>>()?;

    tracing::info!(sessions = results.len(), "analysis finished");

    let single = matches!(input_format, InputFormat::Json);
    let output_data = format_output(&results, output_format, single)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), ChalkCliError> {
    let sessions = read_sessions(input, input_format)?;

    let errors: Vec<ValidationErrorDetail> = sessions
        .iter()
        .enumerate()
        .filter_map(|(index, session)| {
            validate_session(session)
                .err()
                .map(|e| ValidationErrorDetail {
                    index,
                    session_id: session.session_id.clone(),
                    error: e.to_string(),
                })
        })
        .collect();

    let warnings: Vec<ValidationErrorDetail> = sessions
        .iter()
        .enumerate()
        .flat_map(|(index, session)| {
            session_warnings(session)
                .into_iter()
                .map(move |warning| ValidationErrorDetail {
                    index,
                    session_id: session.session_id.clone(),
                    error: warning,
                })
        })
        .collect();

    let report = ValidationReport {
        total_sessions: sessions.len(),
        valid_sessions: sessions.len() - errors.len(),
        invalid_sessions: errors.len(),
        errors,
        warnings,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total sessions:   {}", report.total_sessions);
        println!("Valid sessions:   {}", report.valid_sessions);
        println!("Invalid sessions: {}", report.invalid_sessions);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Session {} (index {}): {}",
                    err.session_id, err.index, err.error
                );
            }
        }

        if !report.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &report.warnings {
                println!(
                    "  - Session {} (index {}): {}",
                    warning.session_id, warning.index, warning.error
                );
            }
        }
    }

    if report.invalid_sessions > 0 {
        Err(ChalkCliError::ValidationFailed(report.invalid_sessions))
    } else {
        Ok(())
    }
}

fn cmd_rules(config: Option<&Path>, json: bool) -> Result<(), ChalkCliError> {
    let analyzer = load_analyzer(config)?;
    let thresholds = analyzer.thresholds();

    let mut rows: Vec<RuleRow> = analyzer
        .rules()
        .iter()
        .enumerate()
        .map(|(i, rule)| RuleRow {
            order: i + 1,
            name: rule.name.to_string(),
            diagnosis: rule.diagnosis.to_string(),
            condition: rule.condition(thresholds),
            confidence: rule.confidence(thresholds),
        })
        .collect();

    let fallback = analyzer.fallback();
    rows.push(RuleRow {
        order: rows.len() + 1,
        name: fallback.name.to_string(),
        diagnosis: fallback.diagnosis.to_string(),
        condition: fallback.condition().to_string(),
        confidence: fallback.confidence(thresholds),
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("Diagnostic Rules (first match wins)");
        println!("===================================");
        for row in &rows {
            println!(
                "  {}. {:<18} {:.2}  {}",
                row.order, row.diagnosis, row.confidence, row.condition
            );
        }
    }

    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), ChalkCliError> {
    let mut checks: Vec<DoctorCheck> = vec![DoctorCheck {
        name: "analyzer_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Chalk analyzer version {}", ANALYZER_VERSION),
    }];

    if let Some(config_path) = config {
        let check = if !config_path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist; defaults will be used".to_string(),
            }
        } else {
            match fs::read_to_string(config_path)
                .map_err(ChalkCliError::from)
                .and_then(|content| Ok(DiagnosticThresholds::from_json(&content)?))
            {
                Ok(thresholds) => {
                    let changed = changed_threshold_count(&thresholds)?;
                    DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!("Config valid ({} values differ from defaults)", changed),
                    }
                }
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: CliError::from(e).message,
                },
            }
        };
        checks.push(check);
    }

    let analyzer = load_analyzer(config.filter(|path| path.exists()))
        .unwrap_or_else(|_| BehaviorAnalyzer::new());
    checks.push(self_test_check(&analyzer));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ANALYZER_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Chalk Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ChalkCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), ChalkCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: canvas session");
                println!();
                println!("- session_id: string");
                println!("- problem_id: string");
                println!("- session_start: string (ISO-8601 expected, not interpreted)");
                println!("- strokes: array of strokes in recording order:");
                println!("  - stroke_id: integer");
                println!("  - tool: pen | eraser");
                println!("  - color: hex color string");
                println!("  - points: array of {{ t, x, y, pressure (0-1), type: start | move | end }}");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: diagnosis result");
                println!();
                println!("- diagnosis: ERROR | CONCEPT_GAP | HESITATION | TIME_PRESSURE | MISTAKE | ANALYSIS_COMPLETE");
                println!("- confidence: number (0-1)");
                println!("- details: string");
                println!("- recommendations: array of strings (optional)");
                println!("- metrics: {{ start_latency, avg_stroke_speed, pause_ratio, erase_count,");
                println!("             acceleration_end, total_time, total_strokes, total_distance }}");
                println!("  (absent for ERROR)");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, ChalkCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(ChalkCliError::StdinIsTty);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_sessions(input: &Path, input_format: InputFormat) -> Result<Vec<Session>, ChalkCliError> {
    let input_data = read_input(input)?;
    let sessions = match input_format {
        InputFormat::Json => vec![parse_session(&input_data)?],
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
    };
    Ok(sessions)
}

fn load_analyzer(config: Option<&Path>) -> Result<BehaviorAnalyzer, ChalkCliError> {
    match config {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            tracing::debug!(path = %path.display(), "loading threshold config");
            Ok(BehaviorAnalyzer::from_config_json(&json)?)
        }
        None => Ok(BehaviorAnalyzer::new()),
    }
}

/// Analyze a built-in session twice and check the result is well-formed and stable
fn self_test_check(analyzer: &BehaviorAnalyzer) -> DoctorCheck {
    let session = self_test_session();
    let first = analyzer.analyze(&session);
    let second = analyzer.analyze(&session);

    let (status, message) = if first != second {
        (CheckStatus::Error, "Repeated analysis gave different results".to_string())
    } else if first.metrics.is_none() || !(0.0..=1.0).contains(&first.confidence) {
        (
            CheckStatus::Error,
            format!("Malformed result for sample session: {:?}", first.diagnosis),
        )
    } else {
        (
            CheckStatus::Ok,
            format!(
                "Sample session diagnosed as {} ({:.2})",
                first.diagnosis, first.confidence
            ),
        )
    };

    DoctorCheck {
        name: "self_test".to_string(),
        status,
        message,
    }
}

/// Eight steady one-second pen strokes starting at t=15s
fn self_test_session() -> Session {
    let strokes = (0..8)
        .map(|i| {
            let start = 15.0 + 2.0 * i as f64;
            Stroke {
                stroke_id: i,
                tool: Tool::Pen,
                color: "#000000".to_string(),
                points: vec![
                    Point {
                        t: start,
                        x: 0.0,
                        y: 0.0,
                        pressure: 0.5,
                        point_type: PointType::Start,
                    },
                    Point {
                        t: start + 1.0,
                        x: 60.0,
                        y: 0.0,
                        pressure: 0.5,
                        point_type: PointType::End,
                    },
                ],
            }
        })
        .collect();

    Session {
        session_id: "doctor-self-test".to_string(),
        problem_id: "self_test".to_string(),
        session_start: "2026-01-05T10:00:00".to_string(),
        strokes,
    }
}

fn changed_threshold_count(thresholds: &DiagnosticThresholds) -> Result<usize, ChalkCliError> {
    let current = serde_json::to_value(thresholds)?;
    let defaults = serde_json::to_value(DiagnosticThresholds::default())?;

    let count = match (current.as_object(), defaults.as_object()) {
        (Some(current), Some(defaults)) => current
            .iter()
            .filter(|(key, value)| defaults.get(*key) != Some(*value))
            .count(),
        _ => 0,
    };
    Ok(count)
}

fn format_output(
    results: &[DiagnosisResult],
    format: OutputFormat,
    single: bool,
) -> Result<String, ChalkCliError> {
    let output = match (format, results) {
        (OutputFormat::Ndjson, _) => {
            let mut lines: Vec<String> = Vec::new();
            for result in results {
                lines.push(serde_json::to_string(result)?);
            }
            lines.join("\n")
        }
        (OutputFormat::Json, [result]) if single => serde_json::to_string(result)?,
        (OutputFormat::JsonPretty, [result]) if single => serde_json::to_string_pretty(result)?,
        (OutputFormat::Json, _) => serde_json::to_string(results)?,
        (OutputFormat::JsonPretty, _) => serde_json::to_string_pretty(results)?,
    };
    Ok(output + "\n")
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "chalk.session.v1",
        "description": "Canvas stroke session",
        "type": "object",
        "required": ["session_id", "problem_id", "session_start", "strokes"],
        "properties": {
            "session_id": { "type": "string" },
            "problem_id": { "type": "string" },
            "session_start": { "type": "string" },
            "strokes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["stroke_id", "tool", "color", "points"],
                    "properties": {
                        "stroke_id": { "type": "integer" },
                        "tool": { "type": "string", "enum": ["pen", "eraser"] },
                        "color": { "type": "string" },
                        "points": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["t", "x", "y", "pressure", "type"],
                                "properties": {
                                    "t": { "type": "number" },
                                    "x": { "type": "number" },
                                    "y": { "type": "number" },
                                    "pressure": { "type": "number", "minimum": 0, "maximum": 1 },
                                    "type": { "type": "string", "enum": ["start", "move", "end"] }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "chalk.diagnosis.v1",
        "description": "Behavioral diagnosis for a canvas session",
        "type": "object",
        "required": ["diagnosis", "confidence", "details"],
        "properties": {
            "diagnosis": {
                "type": "string",
                "enum": ["ERROR", "CONCEPT_GAP", "HESITATION", "TIME_PRESSURE", "MISTAKE", "ANALYSIS_COMPLETE"]
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "details": { "type": "string" },
            "recommendations": { "type": "array", "items": { "type": "string" } },
            "metrics": {
                "type": "object",
                "properties": {
                    "start_latency": { "type": "number" },
                    "avg_stroke_speed": { "type": "number" },
                    "pause_ratio": { "type": "number" },
                    "erase_count": { "type": "integer" },
                    "acceleration_end": { "type": "number" },
                    "total_time": { "type": "number" },
                    "total_strokes": { "type": "integer" },
                    "total_distance": { "type": "number" }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum ChalkCliError {
    Io(io::Error),
    Analyze(AnalyzeError),
    Json(serde_json::Error),
    NoSessions,
    StdinIsTty,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for ChalkCliError {
    fn from(e: io::Error) -> Self {
        ChalkCliError::Io(e)
    }
}

impl From<AnalyzeError> for ChalkCliError {
    fn from(e: AnalyzeError) -> Self {
        ChalkCliError::Analyze(e)
    }
}

impl From<serde_json::Error> for ChalkCliError {
    fn from(e: serde_json::Error) -> Self {
        ChalkCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ChalkCliError> for CliError {
    fn from(e: ChalkCliError) -> Self {
        match e {
            ChalkCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ChalkCliError::Analyze(e) => {
                let (code, hint) = match &e {
                    AnalyzeError::ParseError(_) | AnalyzeError::JsonError(_) => {
                        ("PARSE_ERROR", "Ensure input matches the session schema ('chalk schema input')")
                    }
                    AnalyzeError::InvalidSession(_) => {
                        ("INVALID_SESSION", "Run 'chalk validate' for details")
                    }
                    AnalyzeError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'chalk doctor --config <file>' to check thresholds")
                    }
                    AnalyzeError::EncodingError(_) => {
                        ("ANALYSIS_FAILED", "This is a bug; please report it with the input")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ChalkCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ChalkCliError::NoSessions => CliError {
                code: "NO_SESSIONS".to_string(),
                message: "No sessions found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ChalkCliError::StdinIsTty => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal; no session data was piped in".to_string(),
                hint: Some("Pipe a session file or pass -i <path>".to_string()),
            },
            ChalkCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} sessions failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            ChalkCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_sessions: usize,
    valid_sessions: usize,
    invalid_sessions: usize,
    errors: Vec<ValidationErrorDetail>,
    warnings: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    session_id: String,
    error: String,
}

#[derive(serde::Serialize)]
struct RuleRow {
    order: usize,
    name: String,
    diagnosis: String,
    condition: String,
    confidence: f64,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_test_passes_with_defaults() {
        let check = self_test_check(&BehaviorAnalyzer::new());
        assert!(matches!(check.status, CheckStatus::Ok));
        assert!(check.message.contains("ANALYSIS_COMPLETE"));
    }

    #[test]
    fn test_self_test_reflects_config() {
        let analyzer =
            BehaviorAnalyzer::from_config_json(r#"{"concept_gap_min_strokes": 20}"#).unwrap();
        let check = self_test_check(&analyzer);
        assert!(matches!(check.status, CheckStatus::Ok));
        assert!(check.message.contains("CONCEPT_GAP"));
    }

    #[test]
    fn test_changed_threshold_count() {
        let thresholds = DiagnosticThresholds {
            hesitation_erase_count: 8,
            ..DiagnosticThresholds::default()
        };
        assert_eq!(changed_threshold_count(&thresholds).unwrap(), 1);
    }
}
