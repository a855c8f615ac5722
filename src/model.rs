use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Root payload as delivered by the school cloud export:
/// everything hangs off a single `Result` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradesPayload {
    #[serde(rename = "Result")]
    pub result: Option<ExamResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamResult {
    #[serde(rename = "StudentName", default)]
    pub student_name: Option<String>,
    #[serde(rename = "StudentClassName", default)]
    pub student_class_name: Option<String>,
    #[serde(rename = "StudentSeatNo", default, deserialize_with = "de_display")]
    pub student_seat_no: Option<String>,
    #[serde(rename = "StudentNo", default, deserialize_with = "de_display")]
    pub student_no: Option<String>,
    #[serde(rename = "ExamItem", default)]
    pub exam_item: Option<ExamItem>,
    /// Ordered; drives card/table ordering downstream.
    #[serde(rename = "SubjectExamInfoList", default)]
    pub subjects: Vec<SubjectRecord>,
    /// Percentile standards per subject. Unordered relative to `subjects`;
    /// matched by cleaned name, else by position.
    #[serde(rename = "成績五標List", default, deserialize_with = "de_lenient_seq")]
    pub benchmarks: Vec<BenchmarkRecord>,
    #[serde(rename = "Show班級排名", default)]
    pub show_class_rank: bool,
    #[serde(rename = "Show班級排名人數", default)]
    pub show_class_rank_count: bool,
    #[serde(rename = "Show類組排名", default)]
    pub show_category_rank: bool,
    #[serde(rename = "Show類組排名人數", default)]
    pub show_category_rank_count: bool,
    #[serde(rename = "GetDataTimeDisplay", default)]
    pub data_time_display: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamItem {
    #[serde(rename = "ExamName", default)]
    pub exam_name: Option<String>,
    /// May be fractional in the source; displayed floored.
    #[serde(rename = "ClassRank", default)]
    pub class_rank: Option<f64>,
    #[serde(rename = "ClassCount", default)]
    pub class_count: Option<i64>,
    #[serde(rename = "類組排名", default)]
    pub category_rank: Option<f64>,
    #[serde(rename = "類組排名Count", default)]
    pub category_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectRecord {
    #[serde(rename = "SubjectName", default)]
    pub subject_name: String,
    /// Raw numeric score; fallback when the display string does not parse.
    #[serde(rename = "Score", default)]
    pub score: Option<f64>,
    /// Pre-formatted score as the student saw it. Wins when parseable.
    /// May contain placeholder text such as "--".
    #[serde(rename = "ScoreDisplay", default, deserialize_with = "de_display")]
    pub score_display: Option<String>,
    #[serde(rename = "ClassAVGScore", default)]
    pub class_avg_score: Option<f64>,
    #[serde(rename = "ClassAVGScoreDisplay", default, deserialize_with = "de_display")]
    pub class_avg_score_display: Option<String>,
    #[serde(rename = "ClassRank", default)]
    pub class_rank: Option<f64>,
    #[serde(rename = "ClassRankCount", default)]
    pub class_rank_count: Option<i64>,
    #[serde(rename = "YearRank", default)]
    pub year_rank: Option<f64>,
    #[serde(rename = "YearRankCount", default)]
    pub year_rank_count: Option<i64>,
    #[serde(rename = "YearTermDisplay", default)]
    pub year_term_display: Option<String>,
}

/// Five percentile cut points plus per-decile student counts.
/// The `大於NCount` fields read as cumulative but the upstream data carries
/// exclusive decile bands (`大於90Count` is the 90-100 band alone).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BenchmarkRecord {
    /// May contain a `<br/>` line-break artifact; clean before matching.
    #[serde(rename = "SubjectName", default)]
    pub subject_name: String,
    #[serde(rename = "頂標", default)]
    pub top: f64,
    #[serde(rename = "前標", default)]
    pub front: f64,
    #[serde(rename = "均標", default)]
    pub average: f64,
    #[serde(rename = "後標", default)]
    pub back: f64,
    #[serde(rename = "底標", default)]
    pub bottom: f64,
    #[serde(rename = "標準差", default)]
    pub std_dev: f64,
    #[serde(rename = "大於0Count", default)]
    pub ge0_count: i64,
    #[serde(rename = "大於10Count", default)]
    pub ge10_count: i64,
    #[serde(rename = "大於20Count", default)]
    pub ge20_count: i64,
    #[serde(rename = "大於30Count", default)]
    pub ge30_count: i64,
    #[serde(rename = "大於40Count", default)]
    pub ge40_count: i64,
    #[serde(rename = "大於50Count", default)]
    pub ge50_count: i64,
    #[serde(rename = "大於60Count", default)]
    pub ge60_count: i64,
    #[serde(rename = "大於70Count", default)]
    pub ge70_count: i64,
    #[serde(rename = "大於80Count", default)]
    pub ge80_count: i64,
    #[serde(rename = "大於90Count", default)]
    pub ge90_count: i64,
}

/// Display-string fields arrive as JSON string or number depending on the
/// export path; accept both.
fn de_display<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// A missing or non-array sequence degrades to empty instead of failing the
/// whole import. Used for the benchmark list, which older exports omit.
fn de_lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingResult,
    MissingSubjectList,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingResult => "missing_result",
            ValidationError::MissingSubjectList => "missing_subject_list",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ValidationError::MissingResult => "payload has no Result object",
            ValidationError::MissingSubjectList => {
                "Result.SubjectExamInfoList is missing or not a list"
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Minimal shape check before any computation. Field types inside subject
/// records are deliberately not checked here.
pub fn validate(payload: &Value) -> Result<(), ValidationError> {
    let result = match payload.get("Result") {
        Some(v) if !v.is_null() => v,
        _ => return Err(ValidationError::MissingResult),
    };
    match result.get("SubjectExamInfoList") {
        Some(v) if v.is_array() => Ok(()),
        _ => Err(ValidationError::MissingSubjectList),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_rejects_missing_result() {
        assert_eq!(
            validate(&json!({ "foo": 1 })),
            Err(ValidationError::MissingResult)
        );
        assert_eq!(
            validate(&json!({ "Result": null })),
            Err(ValidationError::MissingResult)
        );
    }

    #[test]
    fn validate_rejects_non_list_subjects() {
        assert_eq!(
            validate(&json!({ "Result": {} })),
            Err(ValidationError::MissingSubjectList)
        );
        assert_eq!(
            validate(&json!({ "Result": { "SubjectExamInfoList": "nope" } })),
            Err(ValidationError::MissingSubjectList)
        );
    }

    #[test]
    fn validate_accepts_minimal_payload() {
        assert_eq!(
            validate(&json!({ "Result": { "SubjectExamInfoList": [] } })),
            Ok(())
        );
    }

    #[test]
    fn display_fields_accept_numbers() {
        let payload: GradesPayload = serde_json::from_value(json!({
            "Result": {
                "SubjectExamInfoList": [
                    { "SubjectName": "國語文", "Score": 87.5, "ScoreDisplay": 87.5 }
                ],
                "StudentSeatNo": 12
            }
        }))
        .expect("parse payload");
        let result = payload.result.expect("result");
        assert_eq!(result.student_seat_no.as_deref(), Some("12"));
        assert_eq!(result.subjects[0].score_display.as_deref(), Some("87.5"));
    }

    #[test]
    fn benchmark_list_degrades_to_empty_when_not_a_list() {
        let payload: GradesPayload = serde_json::from_value(json!({
            "Result": {
                "SubjectExamInfoList": [],
                "成績五標List": "n/a"
            }
        }))
        .expect("parse payload");
        assert!(payload.result.expect("result").benchmarks.is_empty());
    }
}
