use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json)?\s*(\{.*?\}|\[.*?\])\s*```").unwrap());
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").unwrap());
static JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").unwrap());

static EVIDENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)evidence\s*:\s*(.+)").unwrap());
static REASONING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)reasoning\s*:\s*(.+)").unwrap());
static FINAL_OUTPUT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(?:final[_ ]?(?:answer|output)|answer)\s*:\s*(.+)").unwrap());
static DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());

/// Extracts a structured JSON value from free-form model output, following
/// the same fallback order as `structured_generator.py`: a fenced code
/// block, then the first JSON object literal found anywhere in the text,
/// then the first element of a JSON array, then a heuristic reconstruction
/// from `evidence:`/`reasoning:`/`final answer:` style labelled lines and
/// any ISO date found in the text.
pub fn extract_json(text: &str, required_keys: &[&str]) -> Option<Value> {
    if let Some(captures) = FENCED_JSON.captures(text)
        && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&captures[1])
        && required_keys.iter().all(|key| map.contains_key(*key))
    {
        return Some(Value::Object(map));
    }

    for candidate in JSON_OBJECT.find_iter(text) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate.as_str())
            && required_keys.iter().all(|key| map.contains_key(*key))
        {
            return Some(Value::Object(map));
        }
    }

    if let Some(found) = JSON_ARRAY.find(text)
        && let Ok(Value::Array(items)) = serde_json::from_str::<Value>(found.as_str())
        && let Some(first) = items.into_iter().next()
    {
        return Some(first);
    }

    heuristic_from_labels(text)
}

fn heuristic_from_labels(text: &str) -> Option<Value> {
    let mut map = Map::new();

    if let Some(c) = EVIDENCE.captures(text) {
        map.insert("evidence".to_string(), Value::String(c[1].trim().to_string()));
    }
    if let Some(c) = REASONING.captures(text) {
        map.insert("reasoning".to_string(), Value::String(c[1].trim().to_string()));
    }
    if let Some(c) = FINAL_OUTPUT.captures(text) {
        map.insert("value".to_string(), Value::String(c[1].trim().to_string()));
    }
    if let Some(c) = DATE.captures(text) {
        map.entry("date").or_insert_with(|| Value::String(c[1].to_string()));
    }

    if map.is_empty() { None } else { Some(Value::Object(map)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let text = "here it is\n```json\n{\"value\": \"yes\"}\n```\n";
        let value = extract_json(text, &["value"]).unwrap();
        assert_eq!(value["value"], "yes");
    }

    #[test]
    fn extracts_bare_object_with_required_keys() {
        let text = "thinking... {\"value\": \"no\", \"evidence\": \"none\"} done";
        let value = extract_json(text, &["value", "evidence"]).unwrap();
        assert_eq!(value["value"], "no");
    }

    #[test]
    fn falls_back_to_labelled_lines() {
        let text = "Evidence: tumor noted in left breast\nFinal answer: malignant";
        let value = extract_json(text, &["value"]).unwrap();
        assert_eq!(value["evidence"], "tumor noted in left breast");
        assert_eq!(value["value"], "malignant");
    }

    #[test]
    fn returns_none_when_nothing_matches() {
        assert!(extract_json("no structure here at all", &["value"]).is_none());
    }
}
