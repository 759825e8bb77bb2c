//! course-predictor: manage students and record pass/fail predictions.
//!
//! Model artifacts are loaded once at startup from `ML_MODELS_PATH`; results
//! are printed as JSON on stdout and logs go to stderr.
//!
//! Usage:
//!   course-predictor metrics 80 - 100
//!   course-predictor add-student first_name=Ada last_name=Lovelace dob=2004-12-10 program=CS section=A
//!   course-predictor predict 1
//!   course-predictor predict-class CS A

mod commands;
mod config;

use anyhow::Result;
use commands::{Command, USAGE};
use config::{AppConfig, LogFormat};
use ml_engine::ModelStore;
use prediction_service::PredictionService;
use serde::Serialize;
use std::sync::Arc;
use student_core::{compute_metrics, ServiceError};
use student_store::StudentDb;

const DEFAULT_LOG_FILTER: &str =
    "course_predictor=info,prediction_service=info,ml_engine=info,student_store=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_logging(config.log_format);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "--help" || args[0] == "help" {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }

    let outcome = match Command::parse(&args) {
        Ok(command) => run(&config, command).await,
        Err(e) => {
            eprintln!("{USAGE}");
            Err(e.into())
        }
    };

    if let Err(e) = outcome {
        let (category, code) = classify(&e);
        tracing::error!(category, error = %e, "Command failed");
        eprintln!(
            "{}",
            serde_json::json!({ "error": category, "message": e.to_string() })
        );
        std::process::exit(code);
    }

    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Error category and process exit code
fn classify(e: &anyhow::Error) -> (&'static str, i32) {
    match e.downcast_ref::<ServiceError>() {
        Some(ServiceError::Validation(_)) => ("validation", 2),
        Some(ServiceError::NotFound(_)) => ("not_found", 3),
        Some(ServiceError::ModelUnavailable(_)) => ("model_unavailable", 4),
        Some(ServiceError::Persistence(_)) => ("persistence", 5),
        None => ("internal", 1),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// History commands report an unknown id instead of an empty list
async fn ensure_student(db: &StudentDb, student_id: i64) -> Result<()> {
    if db.get_student(student_id).await.map_err(ServiceError::from)?.is_none() {
        return Err(
            ServiceError::NotFound(format!("Student with id {student_id} not found.")).into(),
        );
    }
    Ok(())
}

async fn run(config: &AppConfig, command: Command) -> Result<()> {
    if let Command::Metrics([s1, s2, s3]) = command {
        return print_json(&compute_metrics(s1, s2, s3));
    }

    let store = Arc::new(ModelStore::empty());
    let load_report = if command.needs_model() {
        Some(store.load_from_dir(&config.models_path))
    } else {
        None
    };

    let db = StudentDb::new(&config.database_url)
        .await
        .map_err(ServiceError::from)?;
    let service = PredictionService::new(store, Arc::new(db.clone()));

    match command {
        Command::Metrics(_) => Ok(()),
        Command::AddStudent(input) => {
            let student = db.create_student(&input).await.map_err(ServiceError::from)?;
            print_json(&student)
        }
        Command::UpdateStudent(student_id, input) => {
            let student = db
                .update_student(student_id, &input)
                .await
                .map_err(ServiceError::from)?;
            print_json(&student)
        }
        Command::DeleteStudent(student_id) => {
            let deleted = db.delete_student(student_id).await.map_err(ServiceError::from)?;
            print_json(&serde_json::json!({
                "message": "Student deleted successfully",
                "student_id": deleted,
            }))
        }
        Command::ListStudents => {
            let students = db.list_students().await.map_err(ServiceError::from)?;
            print_json(&students)
        }
        Command::FeatureHistory(student_id) => {
            ensure_student(&db, student_id).await?;
            let history = db.feature_history(student_id).await.map_err(ServiceError::from)?;
            print_json(&history)
        }
        Command::Predict(student_id) => print_json(&service.predict_one(student_id).await?),
        Command::PredictClass(key) => print_json(&service.predict_many(&key).await?),
        Command::History(student_id) => {
            ensure_student(&db, student_id).await?;
            let history = db
                .predictions_for_student(student_id)
                .await
                .map_err(ServiceError::from)?;
            print_json(&history)
        }
        Command::ClassLatest(key) => {
            let latest = db
                .latest_predictions_for_class(&key)
                .await
                .map_err(ServiceError::from)?;
            print_json(&latest)
        }
        Command::ClassHistory(key) => {
            let history = db
                .predictions_for_class(&key)
                .await
                .map_err(ServiceError::from)?;
            print_json(&history)
        }
        Command::Status => print_json(&serde_json::json!({
            "models_path": config.models_path,
            "load": load_report,
            "service": service.status(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_service_errors() {
        let e: anyhow::Error = ServiceError::NotFound("x".to_string()).into();
        assert_eq!(classify(&e), ("not_found", 3));

        let e: anyhow::Error = ServiceError::ModelUnavailable("x".to_string()).into();
        assert_eq!(classify(&e), ("model_unavailable", 4));

        let e = anyhow::anyhow!("boom");
        assert_eq!(classify(&e), ("internal", 1));
    }
}
