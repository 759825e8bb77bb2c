use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ServiceError {
    /// Stable category name, used for exit codes and structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ModelUnavailable(_) => "model_unavailable",
            ServiceError::Persistence(_) => "persistence",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_distinct() {
        let errors = [
            ServiceError::Validation("bad dob".into()),
            ServiceError::NotFound("student 9".into()),
            ServiceError::ModelUnavailable("classifier".into()),
            ServiceError::Persistence("disk full".into()),
        ];
        let mut categories: Vec<&str> = errors.iter().map(|e| e.category()).collect();
        categories.sort();
        categories.dedup();
        assert_eq!(categories.len(), 4);
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ServiceError::NotFound("Student with ID 7 not found".into());
        assert_eq!(err.to_string(), "Not found: Student with ID 7 not found");
    }
}
