use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::Validate;

use crate::error::AppError;

pub type FieldErrors = HashMap<String, Vec<String>>;

/// Key for errors that belong to a whole sub-form rather than one field.
pub const NON_FIELD_ERRORS: &str = "__all__";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: FieldErrors,
}

impl ValidationResponse {
    pub fn new(errors: FieldErrors) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

/// Field errors of every sub-form of one composite applicant submission.
/// `documents` is index-aligned with the submitted document list.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubmissionErrors {
    pub applicant: FieldErrors,
    pub mother: FieldErrors,
    pub father: FieldErrors,
    pub health: FieldErrors,
    pub documents: Vec<FieldErrors>,
}

impl SubmissionErrors {
    pub fn is_empty(&self) -> bool {
        self.applicant.is_empty()
            && self.mother.is_empty()
            && self.father.is_empty()
            && self.health.is_empty()
            && self.documents.iter().all(|errors| errors.is_empty())
    }

    pub fn non_field(message: &str) -> Self {
        let mut errors = Self::default();
        add_error(&mut errors.applicant, NON_FIELD_ERRORS, message);
        errors
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubmissionResponse {
    pub success: bool,
    pub applicant_id: Option<i64>,
    pub redirect_url: Option<String>,
    pub errors: Option<SubmissionErrors>,
    #[serde(default)]
    pub retry: bool,
}

impl SubmissionResponse {
    pub fn saved(applicant_id: i64) -> Self {
        Self {
            success: true,
            applicant_id: Some(applicant_id),
            redirect_url: Some(format!("/api/applicants/{}", applicant_id)),
            errors: None,
            retry: false,
        }
    }

    pub fn rejected(errors: SubmissionErrors) -> Self {
        Self {
            success: false,
            applicant_id: None,
            redirect_url: None,
            errors: Some(errors),
            retry: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            success: false,
            applicant_id: None,
            redirect_url: None,
            errors: None,
            retry: true,
        }
    }
}

pub fn add_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

/// Runs the declared rules of a form and flattens the result into
/// `field -> messages`.
pub fn validate_form<F: Validate>(form: &F) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => field_errors(&errors),
    }
}

pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    let mut error_map = HashMap::new();

    for (field, field_errors) in errors.field_errors() {
        let error_messages: Vec<String> = field_errors
            .iter()
            .map(|error| {
                error
                    .message
                    .clone()
                    .unwrap_or_else(|| "Некорректное значение.".into())
                    .to_string()
            })
            .collect();

        error_map.insert(field.to_string(), error_messages);
    }

    error_map
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let response = match self {
            AppError::Form(errors) => ValidationResponse::new(errors),
            AppError::Conflict { field, message } => {
                ValidationResponse::with_error(&field, &message)
            }
            AppError::Validation(msg) => ValidationResponse::with_error(NON_FIELD_ERRORS, &msg),
            AppError::NotFound(msg) => {
                ValidationResponse::with_error("resource", &format!("Not found: {}", msg))
            }
            AppError::InvalidSubmission(errors) => {
                ValidationResponse::new(errors.applicant.clone())
            }
            AppError::Database(_) | AppError::FileStorage(_) => {
                ValidationResponse::with_error("storage", "Storage unavailable, try again")
            }
            AppError::Internal(_) => ValidationResponse::with_error("server", "Internal server error"),
        };

        Custom(status, Json(response))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self.code {
            404 => ("resource", "Resource not found"),
            409 => ("resource", "Resource already exists"),
            400 => ("request", "Bad request"),
            413 => ("scan", "Файл слишком большой."),
            422 => ("validation", "Validation failed"),
            500 => ("server", "Internal server error"),
            503 => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

pub trait ValidateCustomExt<T> {
    fn validate_custom(self) -> Result<T, Custom<Json<ValidationResponse>>>;
}

impl<T> ValidateCustomExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> Result<T, Custom<Json<ValidationResponse>>> {
        self.map_err(|err| err.to_validation_response())
    }
}
