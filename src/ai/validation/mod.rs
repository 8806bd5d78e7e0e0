//! Response Payload Validation
//!
//! Validates extracted completion text against the caller's expected field
//! set:
//! - markdown code-fence stripping before parsing
//! - presence + truthiness checks for every expected field
//! - field-specific deep validators with accumulated, ordered error messages
//!
//! A fresh [`ValidationOutcome`] is produced per attempt and never retained
//! across attempts.

mod fields;

use serde_json::Value;

/// Result of validating one response payload.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// True when no violations were recorded.
    pub is_valid: bool,
    /// Parsed payload, possibly mutated by validators (e.g. synthesized
    /// `commonTags`). Absent when the text never parsed.
    pub data: Option<Value>,
    /// Ordered, human-readable violation messages.
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn failure(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            data: None,
            errors,
        }
    }
}

/// Validate response text against the expected field set.
///
/// All expected fields are checked before returning; violations accumulate
/// rather than short-circuiting, so the error list names every problem the
/// payload has.
pub fn validate_payload(text: &str, expected_fields: &[&str]) -> ValidationOutcome {
    if text.trim().is_empty() {
        return ValidationOutcome::failure(vec!["empty response".to_string()]);
    }

    let cleaned = strip_code_fences(text);
    let mut data: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(e) => return ValidationOutcome::failure(vec![format!("invalid JSON: {}", e)]),
    };

    let mut errors = Vec::new();
    for name in expected_fields {
        match data.get(name) {
            None => {
                errors.push(format!("missing expected field '{}'", name));
                continue;
            }
            Some(value) if !is_truthy(value) => {
                errors.push(format!("expected field '{}' is empty", name));
            }
            Some(_) => {}
        }

        if let Some(field) = data.get_mut(name) {
            fields::apply(name, field, &mut errors);
        }
    }

    ValidationOutcome {
        is_valid: errors.is_empty(),
        data: Some(data),
        errors,
    }
}

/// Strip markdown code fences (```json ... ```) and a BOM, if present.
fn strip_code_fences(raw: &str) -> String {
    let mut result = raw.trim().trim_start_matches('\u{feff}').trim().to_string();

    if result.starts_with("```")
        && let Some(first_newline) = result.find('\n')
    {
        result = result[first_newline + 1..].to_string();
    }

    if result.ends_with("```") {
        result = result[..result.len() - 3].trim_end().to_string();
    }

    result
}

/// JavaScript-style truthiness: null, false, 0, and "" are falsy; arrays and
/// objects are always truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// =============================================================================
// Tests
// =============================================================================
