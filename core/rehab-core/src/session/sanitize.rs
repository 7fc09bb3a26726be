//! Validation of persisted session records.
//!
//! Anything read back from storage is untrusted: it may be truncated, written
//! by an older client, or edited by hand. [`sanitize_exercise_data`] either
//! returns a session that satisfies every invariant or `None`; it never repairs
//! a structurally invalid record.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::types::{
    DataCollectionType, ExerciseSession, MAX_EXERCISE_ID_CHARS, MAX_FORM_KEY_CHARS,
    MAX_FORM_VALUE_CHARS, SESSION_RECORD_VERSION,
};

/// Validates and normalizes an untrusted session record.
///
/// Rejects the whole record when `exerciseId`, `dataCollectionType` or
/// `startTime` is missing or mistyped, when the collection type is unknown,
/// or when the record declares an unsupported `version`. Everything else is
/// coerced: booleans by truthiness, counters to non-negative integers, and
/// form data to bracket-free, length-limited string pairs.
pub fn sanitize_exercise_data(value: &Value) -> Option<ExerciseSession> {
    let record = value.as_object()?;

    if !is_supported_version(record.get("version")) {
        return None;
    }

    let exercise_id = record.get("exerciseId")?.as_str()?;
    if exercise_id.is_empty() {
        return None;
    }
    let data_collection_type: DataCollectionType =
        record.get("dataCollectionType")?.as_str()?.parse().ok()?;
    let start_time = number_as_i64(record.get("startTime")?)?;

    let time_remaining =
        non_negative(record.get("timeRemaining")).min(data_collection_type.total_secs());

    Some(ExerciseSession {
        exercise_id: truncate_chars(exercise_id, MAX_EXERCISE_ID_CHARS),
        data_collection_type,
        is_started: truthy(record.get("isStarted")),
        is_timer_running: truthy(record.get("isTimerRunning")),
        time_remaining,
        current_interval: non_negative(record.get("currentInterval")),
        start_time,
        form_data: sanitize_form_data(record.get("formData")),
    })
}

fn is_supported_version(version: Option<&Value>) -> bool {
    match version {
        None | Some(Value::Null) => true,
        Some(v) => v.as_u64().is_some_and(|v| v <= SESSION_RECORD_VERSION),
    }
}

fn number_as_i64(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f.floor() as i64)
    } else {
        None
    }
}

/// Non-numeric input becomes 0; negatives clamp to 0; fractions are floored.
fn non_negative(value: Option<&Value>) -> u32 {
    let Some(n) = value.and_then(Value::as_f64) else {
        return 0;
    };
    if !n.is_finite() || n <= 0.0 {
        return 0;
    }
    n.floor().min(u32::MAX as f64) as u32
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn sanitize_form_data(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(entries) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    sanitize_form_entries(entries)
}

fn sanitize_form_entries(entries: &Map<String, Value>) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter_map(|(key, value)| {
            let value = value.as_str()?;
            Some((
                truncate_chars(&strip_angle_brackets(key), MAX_FORM_KEY_CHARS),
                truncate_chars(&strip_angle_brackets(value), MAX_FORM_VALUE_CHARS),
            ))
        })
        .collect()
}

/// Removes literal `<` and `>` characters only.
pub(crate) fn strip_angle_brackets(input: &str) -> String {
    input.chars().filter(|c| !matches!(c, '<' | '>')).collect()
}

pub(crate) fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => input[..byte_idx].to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_session() -> ExerciseSession {
        let mut form_data = BTreeMap::new();
        form_data.insert("input_0".to_string(), "94".to_string());
        form_data.insert("observations".to_string(), "felt fine".to_string());
        ExerciseSession {
            exercise_id: "ex1".to_string(),
            data_collection_type: DataCollectionType::A,
            is_started: true,
            is_timer_running: true,
            time_remaining: 480,
            current_interval: 1,
            start_time: 1_700_000_000_000,
            form_data,
        }
    }

    fn valid_record() -> Value {
        json!({
            "exerciseId": "ex1",
            "dataCollectionType": "B",
            "isStarted": true,
            "isTimerRunning": false,
            "timeRemaining": 200,
            "currentInterval": 1,
            "startTime": 1_700_000_000_000i64,
            "formData": {"input_0": "92"}
        })
    }

    #[test]
    fn test_round_trip_returns_equal_session() {
        let session = valid_session();
        let text = serde_json::to_string(&session).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(sanitize_exercise_data(&parsed), Some(session));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(sanitize_exercise_data(&json!("session")).is_none());
        assert!(sanitize_exercise_data(&json!([1, 2])).is_none());
        assert!(sanitize_exercise_data(&Value::Null).is_none());
    }

    #[test]
    fn test_rejects_missing_start_time() {
        let mut record = valid_record();
        record.as_object_mut().unwrap().remove("startTime");
        assert!(sanitize_exercise_data(&record).is_none());
    }

    #[test]
    fn test_rejects_mistyped_required_fields() {
        let mut record = valid_record();
        record["startTime"] = json!("yesterday");
        assert!(sanitize_exercise_data(&record).is_none());

        let mut record = valid_record();
        record["exerciseId"] = json!(42);
        assert!(sanitize_exercise_data(&record).is_none());

        let mut record = valid_record();
        record["exerciseId"] = json!("");
        assert!(sanitize_exercise_data(&record).is_none());
    }

    #[test]
    fn test_rejects_unknown_collection_type() {
        let mut record = valid_record();
        record["dataCollectionType"] = json!("Z");
        assert!(sanitize_exercise_data(&record).is_none());
    }

    #[test]
    fn test_version_handling() {
        let mut record = valid_record();
        record["version"] = json!(1);
        assert!(sanitize_exercise_data(&record).is_some());

        record["version"] = json!(2);
        assert!(sanitize_exercise_data(&record).is_none());

        record["version"] = json!("1");
        assert!(sanitize_exercise_data(&record).is_none());
    }

    #[test]
    fn test_truncates_exercise_id() {
        let mut record = valid_record();
        record["exerciseId"] = json!("x".repeat(150));
        let session = sanitize_exercise_data(&record).unwrap();
        assert_eq!(session.exercise_id.chars().count(), 100);
    }

    #[test]
    fn test_coerces_booleans_by_truthiness() {
        let mut record = valid_record();
        record["isStarted"] = json!(1);
        record["isTimerRunning"] = json!("");
        let session = sanitize_exercise_data(&record).unwrap();
        assert!(session.is_started);
        assert!(!session.is_timer_running);

        record.as_object_mut().unwrap().remove("isStarted");
        record["isTimerRunning"] = json!("yes");
        let session = sanitize_exercise_data(&record).unwrap();
        assert!(!session.is_started);
        assert!(session.is_timer_running);
    }

    #[test]
    fn test_clamps_counters() {
        let mut record = valid_record();
        record["timeRemaining"] = json!(-5);
        record["currentInterval"] = json!("three");
        let session = sanitize_exercise_data(&record).unwrap();
        assert_eq!(session.time_remaining, 0);
        assert_eq!(session.current_interval, 0);

        record["timeRemaining"] = json!(99_999);
        record["currentInterval"] = json!(2.7);
        let session = sanitize_exercise_data(&record).unwrap();
        assert_eq!(session.time_remaining, 360);
        assert_eq!(session.current_interval, 2);
    }

    #[test]
    fn test_form_value_truncated_to_limit() {
        let mut record = valid_record();
        record["formData"] = json!({"observations": "a".repeat(2000)});
        let session = sanitize_exercise_data(&record).unwrap();
        assert_eq!(session.form_data["observations"].len(), 1000);
    }

    #[test]
    fn test_form_key_truncated_to_limit() {
        let mut record = valid_record();
        let mut form = Map::new();
        form.insert("k".repeat(80), json!("v"));
        record["formData"] = Value::Object(form);
        let session = sanitize_exercise_data(&record).unwrap();
        let key = session.form_data.keys().next().unwrap();
        assert_eq!(key.len(), 50);
    }

    #[test]
    fn test_strips_angle_brackets_only() {
        let mut record = valid_record();
        record["formData"] = json!({"<b>note</b>": "<script>alert(1)</script>"});
        let session = sanitize_exercise_data(&record).unwrap();
        assert_eq!(
            session.form_data.get("bnote/b").map(String::as_str),
            Some("scriptalert(1)/script")
        );
    }

    #[test]
    fn test_drops_non_string_form_entries() {
        let mut record = valid_record();
        record["formData"] = json!({"input_0": 92, "input_1": null, "input_2": "88"});
        let session = sanitize_exercise_data(&record).unwrap();
        assert_eq!(session.form_data.len(), 1);
        assert_eq!(session.form_data["input_2"], "88");
    }

    #[test]
    fn test_non_object_form_data_becomes_empty() {
        let mut record = valid_record();
        record["formData"] = json!(["92"]);
        let session = sanitize_exercise_data(&record).unwrap();
        assert!(session.form_data.is_empty());
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("ééé", 2), "éé");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
