//! Inline bracket annotations on checklist labels.
//!
//! A label line may carry any number of `[...]` segments encoding fields for
//! the created item: `[@alice,bob]` assigns users, a bare `[3]` sets estimate
//! points, and `[key=value]` sets an arbitrary named field. Everything else
//! inside brackets is ignored. The scanner has no escape mechanism: a literal
//! `]` always terminates a segment.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// A parsed annotation value. Only `assignees` and `labels` ever become
/// lists; a purely numeric value becomes a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(String),
    Number(i64),
    List(Vec<String>),
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]*)\]").expect("segment pattern is valid"))
}

/// Extracts every bracket segment from `raw`, returning the label with the
/// segments removed (and trimmed) plus the collected field map.
///
/// Keys are lower-cased; `@...` segments normalise to `assignees` and bare
/// numeric segments to `points`. When the same key appears in several
/// segments, the last one wins.
pub fn parse_annotations(raw: &str) -> (String, BTreeMap<String, FieldValue>) {
    let mut fields = BTreeMap::new();

    for captures in segment_pattern().captures_iter(raw) {
        let segment = &captures[1];
        if let Some(rest) = segment.strip_prefix('@') {
            fields.insert("assignees".to_string(), FieldValue::Scalar(rest.to_string()));
        } else if is_digits(segment) {
            if let Ok(points) = segment.parse::<i64>() {
                fields.insert("points".to_string(), FieldValue::Number(points));
            }
        } else if let Some((key, value)) = segment.split_once('=') {
            let key = key.trim().to_lowercase();
            let value = value.trim();
            let parsed = match value.parse::<i64>() {
                Ok(number) if is_digits(value) => FieldValue::Number(number),
                _ => FieldValue::Scalar(value.to_string()),
            };
            fields.insert(key, parsed);
        }
        // Any other segment shape carries no field and contributes nothing.
    }

    for key in ["assignees", "labels"] {
        if let Some(FieldValue::Scalar(joined)) = fields.get(key) {
            let list = joined
                .split(',')
                .map(|piece| piece.trim().to_string())
                .filter(|piece| !piece.is_empty())
                .collect();
            fields.insert(key.to_string(), FieldValue::List(list));
        }
    }

    let cleaned = segment_pattern().replace_all(raw, "").trim().to_string();
    (cleaned, fields)
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(fields: &BTreeMap<String, FieldValue>, key: &str) -> FieldValue {
        fields.get(key).cloned().expect("field present")
    }

    #[test]
    fn removes_all_segments_and_trims_label() {
        let (cleaned, fields) = parse_annotations("Fix bug [@alice] [status=Done] [labels=bug] [2]");
        assert_eq!(cleaned, "Fix bug");
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn assignee_segment_splits_on_commas() {
        let (_, fields) = parse_annotations("Task [@alice, bob]");
        assert_eq!(
            field(&fields, "assignees"),
            FieldValue::List(vec!["alice".into(), "bob".into()])
        );
    }

    #[test]
    fn later_segment_overwrites_earlier_one() {
        let (_, fields) = parse_annotations("Task [@a,b] then [@c]");
        assert_eq!(field(&fields, "assignees"), FieldValue::List(vec!["c".into()]));
    }

    #[test]
    fn bare_number_becomes_points() {
        let (cleaned, fields) = parse_annotations("Task [3]");
        assert_eq!(cleaned, "Task");
        assert_eq!(field(&fields, "points"), FieldValue::Number(3));
    }

    #[test]
    fn key_value_keeps_non_numeric_values_as_text() {
        let (_, fields) = parse_annotations("Task [status=Done] [points=3]");
        assert_eq!(field(&fields, "status"), FieldValue::Scalar("Done".into()));
        assert_eq!(field(&fields, "points"), FieldValue::Number(3));
    }

    #[test]
    fn keys_are_lowercased_and_trimmed() {
        let (_, fields) = parse_annotations("Task [ Priority = High ]");
        assert_eq!(field(&fields, "priority"), FieldValue::Scalar("High".into()));
    }

    #[test]
    fn labels_value_splits_into_list() {
        let (_, fields) = parse_annotations("Task [labels=bug, backend]");
        assert_eq!(
            field(&fields, "labels"),
            FieldValue::List(vec!["bug".into(), "backend".into()])
        );
    }

    #[test]
    fn malformed_segment_is_ignored() {
        let (cleaned, fields) = parse_annotations("Task [just a note]");
        assert_eq!(cleaned, "Task");
        assert!(fields.is_empty());
    }

    #[test]
    fn literal_bracket_terminates_segment() {
        // No escaping: the first `]` always ends the segment.
        let (cleaned, fields) = parse_annotations("Do [x=1]] tail");
        assert_eq!(field(&fields, "x"), FieldValue::Number(1));
        assert_eq!(cleaned, "Do ] tail");
    }

    #[test]
    fn label_without_segments_is_unchanged() {
        let (cleaned, fields) = parse_annotations("  Plain label  ");
        assert_eq!(cleaned, "Plain label");
        assert!(fields.is_empty());
    }
}
