//! Command-line parsing. Bad arguments are validation errors so they report
//! the same way as any other rejected input.

use std::collections::HashMap;
use student_core::{GroupKey, ServiceError, ServiceResult, StudentInput};

pub const USAGE: &str = "\
Usage:
  course-predictor metrics <s1> <s2> <s3>           Derived metrics ('-' for a missing score)
  course-predictor add-student key=value ...        first_name last_name dob program section
                                                    [test_1_score test_2_score test_3_score
                                                     learn_guide_completed]
  course-predictor update-student <id> key=value... Replace a student's fields (same keys)
  course-predictor delete-student <id>
  course-predictor list-students                    All students by last name, first name
  course-predictor feature-history <id>             Score snapshots, newest first
  course-predictor predict <student_id>             Predict and record one student
  course-predictor predict-class <program> <section>
  course-predictor history <student_id>             Prediction history, newest first
  course-predictor class-latest <program> <section> Latest prediction per student
  course-predictor class-history <program> <section>
  course-predictor status                           Model artifact readiness";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Metrics([Option<f64>; 3]),
    AddStudent(StudentInput),
    UpdateStudent(i64, StudentInput),
    DeleteStudent(i64),
    ListStudents,
    FeatureHistory(i64),
    Predict(i64),
    PredictClass(GroupKey),
    History(i64),
    ClassLatest(GroupKey),
    ClassHistory(GroupKey),
    Status,
}

impl Command {
    /// Parse everything after the program name
    pub fn parse(args: &[String]) -> ServiceResult<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| invalid("No command given."))?;

        match name.as_str() {
            "metrics" => {
                let [s1, s2, s3] = exactly::<3>(name, rest)?;
                Ok(Command::Metrics([
                    parse_score("s1", s1)?,
                    parse_score("s2", s2)?,
                    parse_score("s3", s3)?,
                ]))
            }
            "add-student" => parse_student(rest).map(Command::AddStudent),
            "update-student" => {
                let (id, fields) = rest.split_first().ok_or_else(|| {
                    invalid("'update-student' needs a student id followed by key=value fields.")
                })?;
                Ok(Command::UpdateStudent(parse_id(id)?, parse_student(fields)?))
            }
            "delete-student" => {
                let [id] = exactly::<1>(name, rest)?;
                parse_id(id).map(Command::DeleteStudent)
            }
            "list-students" => {
                exactly::<0>(name, rest)?;
                Ok(Command::ListStudents)
            }
            "feature-history" => {
                let [id] = exactly::<1>(name, rest)?;
                parse_id(id).map(Command::FeatureHistory)
            }
            "predict" => {
                let [id] = exactly::<1>(name, rest)?;
                parse_id(id).map(Command::Predict)
            }
            "history" => {
                let [id] = exactly::<1>(name, rest)?;
                parse_id(id).map(Command::History)
            }
            "predict-class" => group_key(name, rest).map(Command::PredictClass),
            "class-latest" => group_key(name, rest).map(Command::ClassLatest),
            "class-history" => group_key(name, rest).map(Command::ClassHistory),
            "status" => {
                exactly::<0>(name, rest)?;
                Ok(Command::Status)
            }
            other => Err(invalid(&format!("Unknown command '{other}'."))),
        }
    }

    /// Commands that need the model artifacts loaded first
    pub fn needs_model(&self) -> bool {
        matches!(
            self,
            Command::Predict(_) | Command::PredictClass(_) | Command::Status
        )
    }
}

fn invalid(message: &str) -> ServiceError {
    ServiceError::Validation(message.to_string())
}

fn exactly<'a, const N: usize>(name: &str, rest: &'a [String]) -> ServiceResult<[&'a str; N]> {
    if rest.len() != N {
        return Err(invalid(&format!(
            "'{name}' takes {N} argument(s), got {}.",
            rest.len()
        )));
    }
    let mut out = [""; N];
    for (slot, arg) in out.iter_mut().zip(rest) {
        *slot = arg.as_str();
    }
    Ok(out)
}

fn group_key(name: &str, rest: &[String]) -> ServiceResult<GroupKey> {
    let [program, section] = exactly::<2>(name, rest)?;
    Ok(GroupKey::new(program, section))
}

fn parse_id(value: &str) -> ServiceResult<i64> {
    value
        .parse()
        .map_err(|_| invalid(&format!("Invalid student id '{value}'.")))
}

fn parse_score(field: &str, value: &str) -> ServiceResult<Option<f64>> {
    if value == "-" || value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| invalid(&format!("Invalid value for '{field}': '{value}'.")))
}

fn parse_bool(field: &str, value: &str) -> ServiceResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(&format!("Invalid value for '{field}': '{value}'."))),
    }
}

fn parse_student(rest: &[String]) -> ServiceResult<StudentInput> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for arg in rest {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| invalid(&format!("Expected key=value, got '{arg}'.")))?;
        fields.insert(key.trim(), value.trim());
    }

    let required = |key: &str| -> ServiceResult<String> {
        match fields.get(key) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(invalid(&format!("Missing required field '{key}'."))),
        }
    };
    let score = |key: &str| -> ServiceResult<Option<f64>> {
        fields.get(key).map_or(Ok(None), |v| parse_score(key, v))
    };

    Ok(StudentInput {
        first_name: required("first_name")?,
        last_name: required("last_name")?,
        dob: required("dob")?,
        program: required("program")?,
        section: required("section")?,
        test_1_score: score("test_1_score")?,
        test_2_score: score("test_2_score")?,
        test_3_score: score("test_3_score")?,
        learn_guide_completed: fields
            .get("learn_guide_completed")
            .map_or(Ok(false), |v| parse_bool("learn_guide_completed", v))?,
    })
}
