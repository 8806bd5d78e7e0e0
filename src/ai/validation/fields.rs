//! Field-Specific Deep Validators
//!
//! Each known analysis field has a schema check beyond presence/truthiness.
//! Validators record violations into the shared error list; `tagStrategy`
//! additionally synthesizes `commonTags` when the model omitted it.

use serde_json::Value;

/// Upper bound on synthesized `commonTags` entries.
const MAX_COMMON_TAGS: usize = 10;

/// Apply the deep validator registered for `name`, if any.
pub(super) fn apply(name: &str, field: &mut Value, errors: &mut Vec<String>) {
    match name {
        "rules" => validate_rules(field, errors),
        "titleFormulas" => validate_title_formulas(field, errors),
        "contentStructure" => validate_content_structure(field, errors),
        "tagStrategy" => validate_tag_strategy(field, errors),
        "coverStyleAnalysis" => validate_cover_style(field, errors),
        _ => {}
    }
}

fn validate_rules(field: &Value, errors: &mut Vec<String>) {
    if !non_empty_array(Some(field)) {
        errors.push("'rules' must be a non-empty array".to_string());
    }
}

fn validate_title_formulas(field: &Value, errors: &mut Vec<String>) {
    let Some(obj) = field.as_object() else {
        errors.push("'titleFormulas' must be an object".to_string());
        return;
    };
    if !non_empty_array(obj.get("suggestedFormulas")) {
        errors.push("'titleFormulas.suggestedFormulas' must be a non-empty array".to_string());
    }
    if !is_array(obj.get("commonKeywords")) {
        errors.push("'titleFormulas.commonKeywords' must be an array".to_string());
    }
}

fn validate_content_structure(field: &Value, errors: &mut Vec<String>) {
    let Some(obj) = field.as_object() else {
        errors.push("'contentStructure' must be an object".to_string());
        return;
    };
    if !non_empty_array(obj.get("openingHooks")) {
        errors.push("'contentStructure.openingHooks' must be a non-empty array".to_string());
    }
    if !non_empty_array(obj.get("endingHooks")) {
        errors.push("'contentStructure.endingHooks' must be a non-empty array".to_string());
    }
    if !obj.get("bodyTemplate").is_some_and(Value::is_string) {
        errors.push("'contentStructure.bodyTemplate' must be a string".to_string());
    }
}

/// `commonTags` is required downstream; when the model only produced
/// `tagCategories`, derive it from core + long-tail keywords, capped at
/// [`MAX_COMMON_TAGS`] entries.
fn validate_tag_strategy(field: &mut Value, errors: &mut Vec<String>) {
    let Some(obj) = field.as_object_mut() else {
        errors.push("'tagStrategy' must be an object".to_string());
        return;
    };

    match obj.get("commonTags") {
        Some(Value::Array(_)) => {}
        Some(_) => errors.push("'tagStrategy.commonTags' must be an array".to_string()),
        None => {
            let mut tags: Vec<Value> = Vec::new();
            if let Some(categories) = obj.get("tagCategories") {
                for key in ["coreKeywords", "longTailKeywords"] {
                    if let Some(Value::Array(items)) = categories.get(key) {
                        tags.extend(items.iter().cloned());
                    }
                }
            }
            tags.truncate(MAX_COMMON_TAGS);
            obj.insert("commonTags".to_string(), Value::Array(tags));
        }
    }
}

fn validate_cover_style(field: &Value, errors: &mut Vec<String>) {
    let Some(obj) = field.as_object() else {
        errors.push("'coverStyleAnalysis' must be an object".to_string());
        return;
    };
    if !non_empty_array(obj.get("commonStyles")) {
        errors.push("'coverStyleAnalysis.commonStyles' must be a non-empty array".to_string());
    }
}

fn is_array(value: Option<&Value>) -> bool {
    value.is_some_and(Value::is_array)
}

fn non_empty_array(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::validate_payload;
    use serde_json::json;

    #[test]
    fn test_rules_rejects_empty_array() {
        let outcome = validate_payload(r#"{"rules": []}"#, &["rules"]);
        assert!(!outcome.is_valid);
        assert!(outcome.errors.iter().any(|e| e.contains("'rules'")));
    }

    #[test]
    fn test_title_formulas_schema() {
        let good = json!({
            "titleFormulas": {
                "suggestedFormulas": ["X大避雷指南"],
                "commonKeywords": []
            }
        });
        let outcome = validate_payload(&good.to_string(), &["titleFormulas"]);
        assert!(outcome.is_valid, "errors: {:?}", outcome.errors);

        let bad = json!({
            "titleFormulas": {
                "suggestedFormulas": [],
                "commonKeywords": "not-an-array"
            }
        });
        let outcome = validate_payload(&bad.to_string(), &["titleFormulas"]);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn test_content_structure_schema() {
        let good = json!({
            "contentStructure": {
                "openingHooks": ["question"],
                "endingHooks": ["call to action"],
                "bodyTemplate": "intro / points / summary"
            }
        });
        let outcome = validate_payload(&good.to_string(), &["contentStructure"]);
        assert!(outcome.is_valid, "errors: {:?}", outcome.errors);

        let bad = json!({
            "contentStructure": {
                "openingHooks": [],
                "endingHooks": ["x"],
                "bodyTemplate": 7
            }
        });
        let outcome = validate_payload(&bad.to_string(), &["contentStructure"]);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn test_tag_strategy_synthesizes_common_tags() {
        let payload = json!({
            "tagStrategy": {
                "tagCategories": {
                    "coreKeywords": ["a", "b"],
                    "longTailKeywords": ["c", "d", "e", "f", "g", "h", "i", "j", "k", "l"]
                }
            }
        });
        let outcome = validate_payload(&payload.to_string(), &["tagStrategy"]);
        assert!(outcome.is_valid, "errors: {:?}", outcome.errors);

        let data = outcome.data.unwrap();
        let tags = data["tagStrategy"]["commonTags"].as_array().unwrap();
        assert_eq!(tags.len(), 10);
        assert_eq!(tags[0], json!("a"));
        assert_eq!(tags[2], json!("c"));
    }

    #[test]
    fn test_tag_strategy_synthesis_tolerates_missing_categories() {
        let outcome = validate_payload(r#"{"tagStrategy": {}}"#, &["tagStrategy"]);
        assert!(outcome.is_valid);
        let data = outcome.data.unwrap();
        assert_eq!(data["tagStrategy"]["commonTags"], json!([]));
    }

    #[test]
    fn test_tag_strategy_keeps_existing_common_tags() {
        let payload = json!({
            "tagStrategy": {
                "commonTags": ["kept"],
                "tagCategories": { "coreKeywords": ["ignored"] }
            }
        });
        let outcome = validate_payload(&payload.to_string(), &["tagStrategy"]);
        assert!(outcome.is_valid);
        assert_eq!(
            outcome.data.unwrap()["tagStrategy"]["commonTags"],
            json!(["kept"])
        );
    }

    #[test]
    fn test_tag_strategy_rejects_non_array_common_tags() {
        let outcome = validate_payload(
            r#"{"tagStrategy": {"commonTags": "oops"}}"#,
            &["tagStrategy"],
        );
        assert!(!outcome.is_valid);
        assert!(outcome.errors[0].contains("commonTags"));
    }

    #[test]
    fn test_cover_style_schema() {
        let outcome = validate_payload(
            r#"{"coverStyleAnalysis": {"commonStyles": ["minimal"]}}"#,
            &["coverStyleAnalysis"],
        );
        assert!(outcome.is_valid);

        let outcome = validate_payload(
            r#"{"coverStyleAnalysis": {"commonStyles": []}}"#,
            &["coverStyleAnalysis"],
        );
        assert!(!outcome.is_valid);
    }
}
