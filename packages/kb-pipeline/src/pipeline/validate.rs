//! Checks over published guide documents.
//!
//! - Structural: keys and JSON types declared by the published schema
//!   (`required`, `type`, `items`, `properties`, local `$ref`s).
//! - Contract: no `claim_id` / `claim_ids` key and no string value starting
//!   with `claim.` anywhere in the output.
//! - Semantic: guide ids, dense step numbering, unique variant ids,
//!   citation timestamps and URLs.

use chrono::DateTime;
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

use crate::error::{IssueKind, ValidationError, ValidationIssue};

const FORBIDDEN_KEYS: &[&str] = &["claim_id", "claim_ids"];
const FORBIDDEN_PREFIX: &str = "claim.";

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Resolve `#/$defs/<name>` against the root schema.
fn resolve_ref<'a>(root: &'a Value, schema: &'a Value) -> &'a Value {
    match schema.get("$ref").and_then(Value::as_str) {
        Some(reference) => reference
            .strip_prefix('#')
            .and_then(|pointer| root.pointer(pointer))
            .unwrap_or(schema),
        None => schema,
    }
}

fn check_schema(root: &Value, schema: &Value, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let schema = resolve_ref(root, schema);

    let type_ok = match schema.get("type") {
        Some(Value::String(t)) => type_matches(t, value),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| type_matches(t, value)),
        _ => true,
    };
    if !type_ok {
        issues.push(ValidationIssue::new(
            IssueKind::Structural,
            path,
            format!("expected type {}", schema["type"]),
        ));
        return;
    }

    if let Some(object) = value.as_object() {
        for key in schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            if !object.contains_key(key) {
                issues.push(ValidationIssue::new(
                    IssueKind::Structural,
                    path,
                    format!("missing required key '{}'", key),
                ));
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, sub_schema) in properties {
                if let Some(child) = object.get(key) {
                    check_schema(root, sub_schema, child, &format!("{}/{}", path, key), issues);
                }
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (i, child) in array.iter().enumerate() {
            check_schema(root, items, child, &format!("{}/{}", path, i), issues);
        }
    }
}

/// Keys and types declared by `schema`.
pub fn validate_structure(doc: &Value, schema: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_schema(schema, schema, doc, "", &mut issues);
    issues
}

fn walk_contract(value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{}/{}", path, key);
                if FORBIDDEN_KEYS.contains(&key.as_str()) {
                    issues.push(ValidationIssue::new(
                        IssueKind::Contract,
                        &child_path,
                        format!("internal key '{}' in published output", key),
                    ));
                }
                walk_contract(child, &child_path, issues);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk_contract(child, &format!("{}/{}", path, i), issues);
            }
        }
        Value::String(s) if s.starts_with(FORBIDDEN_PREFIX) => {
            issues.push(ValidationIssue::new(
                IssueKind::Contract,
                path,
                format!("claim reference '{}' in published output", s),
            ));
        }
        _ => {}
    }
}

/// No claim ids, as keys or as values.
pub fn validate_contract(doc: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    walk_contract(doc, "", &mut issues);
    issues
}

fn check_citations(citations: Option<&Value>, path: &str, issues: &mut Vec<ValidationIssue>) {
    let Some(citations) = citations.and_then(Value::as_array) else {
        return;
    };
    for (i, citation) in citations.iter().enumerate() {
        let at = format!("{}/citations/{}", path, i);
        let retrieved_ok = citation
            .get("retrieved_at")
            .and_then(Value::as_str)
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
        if !retrieved_ok {
            issues.push(ValidationIssue::new(
                IssueKind::Semantic,
                format!("{}/retrieved_at", at),
                "retrieved_at is not an ISO-8601 timestamp",
            ));
        }
        let url_ok = citation
            .get("canonical_url")
            .and_then(Value::as_str)
            .is_some_and(|s| Url::parse(s).is_ok());
        if !url_ok {
            issues.push(ValidationIssue::new(
                IssueKind::Semantic,
                format!("{}/canonical_url", at),
                "canonical_url is not an absolute URL",
            ));
        }
    }
}

/// Visit every object carrying a `citations` array below `value`.
fn each_cited(value: &Value, path: &str, f: &mut dyn FnMut(&Value, &str)) {
    match value {
        Value::Object(map) => {
            if map.contains_key("citations") {
                f(value, path);
            }
            for (key, child) in map {
                if key != "citations" {
                    each_cited(child, &format!("{}/{}", path, key), f);
                }
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                each_cited(child, &format!("{}/{}", path, i), f);
            }
        }
        _ => {}
    }
}

/// Guide-level meaning: ids, numbering, variants, citations.
pub fn validate_semantics(doc: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let guides = doc.get("guides").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();

    let mut guide_ids = HashSet::new();
    for (g, guide) in guides.iter().enumerate() {
        let path = format!("/guides/{}", g);

        match guide.get("guide_id").and_then(Value::as_str) {
            Some(id) if id.starts_with("guide.") => {
                if !guide_ids.insert(id) {
                    issues.push(ValidationIssue::new(
                        IssueKind::Semantic,
                        format!("{}/guide_id", path),
                        format!("duplicate guide_id '{}'", id),
                    ));
                }
            }
            other => issues.push(ValidationIssue::new(
                IssueKind::Semantic,
                format!("{}/guide_id", path),
                format!("guide_id {:?} does not start with 'guide.'", other),
            )),
        }

        let steps = guide.get("steps").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
        for (i, step) in steps.iter().enumerate() {
            let expected = i as u64 + 1;
            let actual = step.get("step_number").and_then(Value::as_u64);
            if actual != Some(expected) {
                issues.push(ValidationIssue::new(
                    IssueKind::Semantic,
                    format!("{}/steps/{}/step_number", path, i),
                    format!("expected step {} but found {:?}", expected, actual),
                ));
            }
        }

        let mut variant_ids = HashSet::new();
        let variants = guide.get("variants").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
        for (i, variant) in variants.iter().enumerate() {
            if let Some(id) = variant.get("variant_id").and_then(Value::as_str) {
                if !variant_ids.insert(id) {
                    issues.push(ValidationIssue::new(
                        IssueKind::Semantic,
                        format!("{}/variants/{}/variant_id", path, i),
                        format!("duplicate variant_id '{}'", id),
                    ));
                }
            }
        }

        each_cited(guide, &path, &mut |node, at| {
            check_citations(node.get("citations"), at, &mut issues)
        });
    }
    issues
}

/// Run every check over `public_guides.json` and the contract check over
/// the index. Returns all findings at once.
pub fn validate_outputs(guides: &Value, index: &Value, schema: &Value) -> Result<(), ValidationError> {
    let mut issues = validate_structure(guides, schema);
    issues.extend(validate_contract(guides));
    issues.extend(validate_semantics(guides));
    issues.extend(validate_contract(index).into_iter().map(|mut issue| {
        issue.path = format!("index:{}", issue.path);
        issue
    }));

    if issues.is_empty() {
        Ok(())
    } else {
        for issue in &issues {
            tracing::warn!(kind = ?issue.kind, path = %issue.path, "{}", issue.message);
        }
        Err(ValidationError { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::publish::public_guides_schema;
    use serde_json::json;

    fn citation() -> Value {
        json!({
            "source_page_id": "source.abc",
            "canonical_url": "https://www.epassport.gov.bd/instructions/passport-fees",
            "domain": "epassport.gov.bd",
            "quoted_text": "Fee: 4,025 BDT",
            "locator": "Fees > Regular",
            "retrieved_at": "2025-01-31T10:00:00Z",
            "language": "en"
        })
    }

    fn doc() -> Value {
        json!({
            "generated_at": "2025-01-31T10:00:00Z",
            "data_version": 3,
            "guides": [{
                "guide_id": "guide.epassport",
                "service_id": "svc.epassport",
                "agency_id": "agency.dip",
                "agency_name": "Department of Immigration and Passports",
                "title": "e-Passport",
                "steps": [
                    {"step_number": 1, "title": "Visit the portal", "citations": [citation()]},
                    {"step_number": 2, "title": "Pay the fee", "citations": [citation()]}
                ],
                "sections": [],
                "variants": [{"variant_id": "regular", "label": "Regular", "fees": []}],
                "required_documents": [],
                "fees": [{"label": "Fee", "amount": 4025.0, "currency": "BDT", "citations": [citation()]}],
                "official_links": [],
                "keywords": ["epassport"],
                "updated_at": "2025-01-31T10:00:00Z",
                "meta": {
                    "total_steps": 2,
                    "total_citations": 3,
                    "verification_summary": {"verified": 0, "unverified": 3, "stale": 0, "deprecated": 0, "contradicted": 0},
                    "last_crawled_at": null,
                    "source_domains": ["epassport.gov.bd"]
                }
            }]
        })
    }

    fn kinds(issues: &[ValidationIssue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_valid_document_passes() {
        validate_outputs(&doc(), &json!({"guides": []}), &public_guides_schema()).unwrap();
    }

    #[test]
    fn test_missing_key_is_structural() {
        let mut d = doc();
        d["guides"][0].as_object_mut().unwrap().remove("title");
        d["guides"][0]["fees"][0]["citations"][0].as_object_mut().unwrap().remove("locator");
        let issues = validate_structure(&d, &public_guides_schema());
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].path, "/guides/0");
        assert!(issues[1].path.ends_with("/fees/0/citations/0"));
    }

    #[test]
    fn test_wrong_type_is_structural() {
        let mut d = doc();
        d["data_version"] = json!("three");
        assert_eq!(kinds(&validate_structure(&d, &public_guides_schema())), vec![IssueKind::Structural]);
    }

    #[test]
    fn test_claim_leak_is_contract() {
        let mut d = doc();
        d["guides"][0]["steps"][0]["claim_ids"] = json!(["x"]);
        d["guides"][0]["keywords"] = json!(["claim.fee.epassport.0123456789abcdef"]);
        let issues = validate_contract(&d);
        assert_eq!(kinds(&issues), vec![IssueKind::Contract, IssueKind::Contract]);

        let err = validate_outputs(&d, &json!({}), &public_guides_schema()).unwrap_err();
        assert!(err.issues.iter().all(|i| i.kind == IssueKind::Contract));
    }

    #[test]
    fn test_step_gap_and_duplicate_variant() {
        let mut d = doc();
        d["guides"][0]["steps"][1]["step_number"] = json!(3);
        d["guides"][0]["variants"] = json!([
            {"variant_id": "express", "label": "Express", "fees": []},
            {"variant_id": "express", "label": "Express", "fees": []}
        ]);
        let issues = validate_semantics(&d);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].path.ends_with("/steps/1/step_number"));
        assert!(issues[1].message.contains("duplicate variant_id"));
    }

    #[test]
    fn test_bad_guide_id_and_citation() {
        let mut d = doc();
        d["guides"][0]["guide_id"] = json!("epassport");
        d["guides"][0]["fees"][0]["citations"][0]["retrieved_at"] = json!("last tuesday");
        d["guides"][0]["fees"][0]["citations"][0]["canonical_url"] = json!("/relative");
        let issues = validate_semantics(&d);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.kind == IssueKind::Semantic));
    }
}
