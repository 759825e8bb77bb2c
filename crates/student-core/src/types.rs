use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::metrics::{compute_metrics, DerivedMetrics};

/// Raw test scores plus the learn-guide completion flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScoreSet {
    pub test_1_score: Option<f64>,
    pub test_2_score: Option<f64>,
    pub test_3_score: Option<f64>,
    pub learn_guide_completed: Option<bool>,
}

impl RawScoreSet {
    pub fn metrics(&self) -> DerivedMetrics {
        compute_metrics(self.test_1_score, self.test_2_score, self.test_3_score)
    }
}

/// A tracked student record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub program: String,
    pub section: String,
    pub test_1_score: Option<f64>,
    pub test_2_score: Option<f64>,
    pub test_3_score: Option<f64>,
    pub avg_test_score: Option<f64>,
    #[serde(default, with = "signed_infinity")]
    pub score_improvement_rate: Option<f64>,
    pub test_scores_std_dev: Option<f64>,
    pub learn_guide_completed: bool,
}

impl Student {
    pub fn raw_scores(&self) -> RawScoreSet {
        RawScoreSet {
            test_1_score: self.test_1_score,
            test_2_score: self.test_2_score,
            test_3_score: self.test_3_score,
            learn_guide_completed: Some(self.learn_guide_completed),
        }
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(&self.program, &self.section)
    }
}

/// Create/update payload for a student. `dob` arrives as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInput {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub program: String,
    pub section: String,
    pub test_1_score: Option<f64>,
    pub test_2_score: Option<f64>,
    pub test_3_score: Option<f64>,
    pub learn_guide_completed: bool,
}

impl StudentInput {
    pub fn parse_dob(&self) -> Result<NaiveDate, ServiceError> {
        NaiveDate::parse_from_str(&self.dob, "%Y-%m-%d").map_err(|_| {
            ServiceError::Validation(format!(
                "Invalid date format for 'dob'. Expected YYYY-MM-DD, received '{}'.",
                self.dob
            ))
        })
    }

    pub fn raw_scores(&self) -> RawScoreSet {
        RawScoreSet {
            test_1_score: self.test_1_score,
            test_2_score: self.test_2_score,
            test_3_score: self.test_3_score,
            learn_guide_completed: Some(self.learn_guide_completed),
        }
    }
}

/// Snapshot of a student's scores and metrics, appended on every create/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentFeatureSet {
    pub feature_id: i64,
    pub student_id: i64,
    pub test_1_score: Option<f64>,
    pub test_2_score: Option<f64>,
    pub test_3_score: Option<f64>,
    pub avg_test_score: Option<f64>,
    #[serde(default, with = "signed_infinity")]
    pub score_improvement_rate: Option<f64>,
    pub test_scores_std_dev: Option<f64>,
    pub learn_guide_completed: bool,
}

/// (program, section) pair identifying a class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub program: String,
    pub section: String,
}

impl GroupKey {
    pub fn new(program: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            section: section.into(),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.program, self.section)
    }
}

/// Predicted outcome label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Pass,
    Fail,
}

impl Category {
    /// 1 maps to Pass, anything else to Fail.
    pub fn from_numeric(value: u8) -> Self {
        if value == 1 {
            Category::Pass
        } else {
            Category::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pass => "Pass",
            Category::Fail => "Fail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pass" => Some(Category::Pass),
            "Fail" => Some(Category::Fail),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prediction about to be appended to history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub student_id: i64,
    pub date: NaiveDate,
    /// Probability of passing (0-1)
    pub predicted_score: f64,
    pub category: Category,
    /// Type name of the classifier that produced it
    pub model_type: String,
}

/// A persisted prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction_id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub predicted_score: f64,
    pub category: Category,
    pub model_type: String,
}

/// JSON encoding for optional floats that may be infinite.
///
/// Strict JSON has no infinity, so ±∞ is written as the strings
/// `"Infinity"` / `"-Infinity"`. Finite values stay plain numbers and `None`
/// stays `null`. Deserialization accepts all three forms.
pub mod signed_infinity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub const POSITIVE: &str = "Infinity";
    pub const NEGATIVE: &str = "-Infinity";

    pub fn serialize<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) if *v == f64::INFINITY => serializer.serialize_str(POSITIVE),
            Some(v) if *v == f64::NEG_INFINITY => serializer.serialize_str(NEGATIVE),
            Some(v) if v.is_nan() => serializer.serialize_none(),
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_none(),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(s)) if s == POSITIVE => Ok(Some(f64::INFINITY)),
            Some(Repr::Text(s)) if s == NEGATIVE => Ok(Some(f64::NEG_INFINITY)),
            Some(Repr::Text(s)) => Err(serde::de::Error::custom(format!(
                "expected a number, null, \"{POSITIVE}\" or \"{NEGATIVE}\", got \"{s}\""
            ))),
        }
    }
}
