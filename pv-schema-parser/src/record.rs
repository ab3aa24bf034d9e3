//! Channel names of the form `record[.FIELD][$][{filter}]`.

use serde_json::{Map, Value as Json};
use thiserror::Error;

const FILTER_KEYS: [&str; 4] = ["ts", "arr", "sync", "dbnd"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordModifier {
    /// Trailing `$`: read a string field as a char array.
    pub long_string: bool,
    pub filtered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub record_dot_field: String,
    pub record: String,
    pub field: Option<String>,
    pub modifiers: Option<RecordModifier>,
    pub filter: Option<String>,
}

impl RecordField {
    fn plain(record: &str) -> Self {
        RecordField {
            record_dot_field: record.to_string(),
            record: record.to_string(),
            field: None,
            modifiers: None,
            filter: None,
        }
    }
}

/// Splits a channel name into record, field, modifiers and filter text.
///
/// `VAL` is not folded into the bare record here; callers decide what a
/// field means for their records.
pub fn parse_record_field(name: &str) -> RecordField {
    let Some((record, rest)) = name.split_once('.') else {
        return RecordField::plain(name);
    };

    if rest.is_empty() {
        return RecordField::plain(record);
    }

    let mut modifiers = RecordModifier::default();
    let (field, filter) = if rest.starts_with('{') {
        modifiers.filtered = true;
        (None, Some(rest.to_string()))
    } else {
        let (field, filter) = match rest.find('{') {
            Some(at) => {
                modifiers.filtered = true;
                (&rest[..at], Some(rest[at..].to_string()))
            }
            None => (rest, None),
        };
        let trimmed = field.trim_end_matches('$');
        if trimmed.len() != field.len() {
            modifiers.long_string = true;
        }
        (Some(trimmed.to_string()), filter)
    };

    let field = field.filter(|f| !f.is_empty());
    let record_dot_field = match &field {
        Some(f) => format!("{record}.{f}"),
        None => record.to_string(),
    };

    RecordField {
        record_dot_field,
        record: record.to_string(),
        field,
        modifiers: (modifiers != RecordModifier::default()).then_some(modifiers),
        filter,
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid channel filter JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("channel filter must be a JSON object")]
    NotAnObject,
    #[error("unsupported filters: {0:?}")]
    Unsupported(Vec<String>),
}

/// Parses the JSON text of a channel filter, rejecting unknown filter kinds.
pub fn parse_channel_filter(text: &str) -> Result<Map<String, Json>, FilterError> {
    let Json::Object(filter) = serde_json::from_str::<Json>(text)? else {
        return Err(FilterError::NotAnObject);
    };

    let unsupported: Vec<String> = filter
        .keys()
        .filter(|k| !FILTER_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();
    if !unsupported.is_empty() {
        return Err(FilterError::Unsupported(unsupported));
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rec", "rec", None, None)]
    #[case("rec.", "rec", None, None)]
    #[case("rec.VAL", "rec.VAL", Some("VAL"), None)]
    #[case("rec.DESC$", "rec.DESC", Some("DESC"), Some(RecordModifier { long_string: true, filtered: false }))]
    #[case(
        "rec.{\"dbnd\":{}}",
        "rec",
        None,
        Some(RecordModifier { long_string: false, filtered: true })
    )]
    #[case(
        "rec.VAL${\"ts\":{}}",
        "rec.VAL",
        Some("VAL"),
        Some(RecordModifier { long_string: true, filtered: true })
    )]
    fn record_fields(
        #[case] name: &str,
        #[case] record_dot_field: &str,
        #[case] field: Option<&str>,
        #[case] modifiers: Option<RecordModifier>,
    ) {
        let parsed = parse_record_field(name);
        assert_eq!(parsed.record, "rec");
        assert_eq!(parsed.record_dot_field, record_dot_field);
        assert_eq!(parsed.field.as_deref(), field);
        assert_eq!(parsed.modifiers, modifiers);
    }

    #[test]
    fn cluster_member_names_have_no_field() {
        let parsed = parse_record_field("integration:get_random:Status");
        assert_eq!(parsed.record, "integration:get_random:Status");
        assert_eq!(parsed.field, None);
    }

    #[test]
    fn filter_text_is_kept() {
        let parsed = parse_record_field("rec.{\"arr\":{\"s\":1}}");
        assert_eq!(parsed.filter.as_deref(), Some("{\"arr\":{\"s\":1}}"));
    }

    #[test]
    fn channel_filters() {
        let filter = parse_channel_filter(r#"{"ts": {}, "dbnd": {"d": 1.5}}"#).expect("valid filter");
        assert_eq!(filter.len(), 2);

        assert!(matches!(
            parse_channel_filter(r#"{"bogus": {}}"#),
            Err(FilterError::Unsupported(keys)) if keys == ["bogus"]
        ));
        assert!(matches!(parse_channel_filter("[1]"), Err(FilterError::NotAnObject)));
        assert!(matches!(parse_channel_filter("{"), Err(FilterError::Json(_))));
    }
}
