//! FFI bindings for Chalk Analyzer
//!
//! This module provides C-compatible functions for calling the analyzer from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `chalk_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::pipeline::{analyze_json, BehaviorAnalyzer};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze session JSON with default thresholds and return diagnosis JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `chalk_free_string`.
/// - Returns NULL on error; call `chalk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn chalk_analyze(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match analyze_json(json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Analyze session JSON with a threshold override and return diagnosis JSON.
///
/// # Safety
/// - `json` and `config_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `chalk_free_string`.
/// - Returns NULL on error; call `chalk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn chalk_analyze_with_config(
    json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let config_str = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    let analyzer = match BehaviorAnalyzer::from_config_json(&config_str) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    analyze_with(&analyzer, json)
}

unsafe fn analyze_with(analyzer: &BehaviorAnalyzer, json: *const c_char) -> *mut c_char {
    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match analyzer.analyze_json(&json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Configured Analyzer API
// ============================================================================

/// Opaque handle to a configured BehaviorAnalyzer
pub struct ChalkAnalyzerHandle {
    analyzer: BehaviorAnalyzer,
}

/// Create an analyzer. Pass NULL for default thresholds.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `chalk_analyzer_free`.
/// - Returns NULL on error; call `chalk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn chalk_analyzer_new(config_json: *const c_char) -> *mut ChalkAnalyzerHandle {
    clear_last_error();

    let analyzer = if config_json.is_null() {
        BehaviorAnalyzer::new()
    } else {
        let config = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match BehaviorAnalyzer::from_config_json(&config) {
            Ok(analyzer) => analyzer,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(ChalkAnalyzerHandle { analyzer }))
}

/// Free an analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `chalk_analyzer_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn chalk_analyzer_free(analyzer: *mut ChalkAnalyzerHandle) {
    if !analyzer.is_null() {
        drop(Box::from_raw(analyzer));
    }
}

/// Analyze session JSON with a configured analyzer.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `chalk_analyzer_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `chalk_free_string`.
/// - Returns NULL on error; call `chalk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn chalk_analyzer_analyze(
    analyzer: *const ChalkAnalyzerHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }

    analyze_with(&(*analyzer).analyzer, json)
}

/// Return the analyzer's thresholds as JSON.
///
/// # Safety
/// - `analyzer` must be a valid pointer returned by `chalk_analyzer_new`.
/// - Returns a newly allocated string that must be freed with `chalk_free_string`.
/// - Returns NULL on error; call `chalk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn chalk_analyzer_thresholds(
    analyzer: *const ChalkAnalyzerHandle,
) -> *mut c_char {
    clear_last_error();

    if analyzer.is_null() {
        set_last_error("Null analyzer pointer");
        return ptr::null_mut();
    }

    match (*analyzer).analyzer.thresholds().to_json_pretty() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by analyzer functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an analyzer function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn chalk_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next analyzer call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn chalk_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the analyzer library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn chalk_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session_json() -> CString {
        CString::new(
            r##"{
            "session_id": "ffi-session",
            "problem_id": "demo_problem_001",
            "session_start": "2026-01-05T10:00:00",
            "strokes": [
                {
                    "stroke_id": 1,
                    "tool": "pen",
                    "color": "#000000",
                    "points": [
                        {"t": 45.0, "x": 100, "y": 200, "pressure": 0.5, "type": "start"},
                        {"t": 46.0, "x": 130, "y": 240, "pressure": 0.5, "type": "end"}
                    ]
                }
            ]
        }"##,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_analyze() {
        let json = sample_session_json();

        unsafe {
            let result = chalk_analyze(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let payload: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(payload["diagnosis"], "CONCEPT_GAP");
            assert_eq!(payload["metrics"]["total_distance"], 50.0);

            chalk_free_string(result);
        }
    }

    #[test]
    fn test_ffi_analyze_with_config() {
        let json = sample_session_json();
        let config = CString::new(
            r#"{"concept_gap_latency_sec": 100.0, "concept_gap_min_strokes": 1}"#,
        )
        .unwrap();

        unsafe {
            let result = chalk_analyze_with_config(json.as_ptr(), config.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("ANALYSIS_COMPLETE"));
            chalk_free_string(result);
        }
    }

    #[test]
    fn test_ffi_analyzer_lifecycle() {
        unsafe {
            let analyzer = chalk_analyzer_new(ptr::null());
            assert!(!analyzer.is_null());

            let json = sample_session_json();
            let result = chalk_analyzer_analyze(analyzer, json.as_ptr());
            assert!(!result.is_null());
            chalk_free_string(result);

            let thresholds = chalk_analyzer_thresholds(analyzer);
            assert!(!thresholds.is_null());
            let thresholds_str = CStr::from_ptr(thresholds).to_str().unwrap();
            assert!(thresholds_str.contains("concept_gap_latency_sec"));
            chalk_free_string(thresholds);

            chalk_analyzer_free(analyzer);
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let config = CString::new(r#"{"hesitation_confidence": 7.0}"#).unwrap();

        unsafe {
            let analyzer = chalk_analyzer_new(config.as_ptr());
            assert!(analyzer.is_null());

            let error = CStr::from_ptr(chalk_last_error()).to_str().unwrap();
            assert!(error.contains("hesitation_confidence"));
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = chalk_analyze(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = chalk_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert!(chalk_analyze(ptr::null()).is_null());
            assert!(chalk_analyzer_analyze(ptr::null(), invalid_json.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = chalk_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
