use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::validation::{
    FieldErrors, SubmissionErrors, SubmissionResponse, ValidationResponse, NON_FIELD_ERRORS,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File storage error: {0}")]
    FileStorage(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Form validation failed on {} field(s)", .0.len())]
    Form(FieldErrors),

    #[error("Invalid applicant submission")]
    InvalidSubmission(Box<SubmissionErrors>),

    #[error("Conflict on {field}: {message}")]
    Conflict { field: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::FileStorage(err) => {
                error!(error = %message, context = %ctx, io_error = %err, "File storage error");
                "file_storage_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Validation(msg) => {
                warn!(message = %msg, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::Form(errors) => {
                warn!(fields = ?errors.keys().collect::<Vec<_>>(), context = %ctx, "Form validation error");
                "validation_error"
            }
            AppError::InvalidSubmission(errors) => {
                warn!(errors = ?errors, context = %ctx, "Composite submission rejected");
                "validation_error"
            }
            AppError::Conflict { field, message } => {
                warn!(field = %field, message = %message, context = %ctx, "Conflict error");
                "conflict_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            if self.is_storage_fault() || matches!(self, AppError::Internal(_)) {
                current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::ServiceUnavailable,
            AppError::FileStorage(_) => Status::ServiceUnavailable,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::UnprocessableEntity,
            AppError::Form(_) => Status::UnprocessableEntity,
            AppError::InvalidSubmission(_) => Status::UnprocessableEntity,
            AppError::Conflict { .. } => Status::Conflict,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }

    /// Storage faults are worth retrying; everything else needs different input.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::FileStorage(_))
    }

    /// Turns a constraint violation raised by a write into a field error, so a
    /// lost race on a unique key reads like the pre-check that would have caught it.
    pub fn from_write(err: sqlx::Error, field: &str, message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                AppError::Conflict {
                    field: field.to_string(),
                    message: message.to_string(),
                }
            }
            _ => AppError::Database(err),
        }
    }

    /// Folds a failure from inside the composite save transaction into the
    /// shape the composite endpoints report.
    pub fn into_submission_error(self) -> Self {
        match self {
            AppError::Database(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                warn!(db_error = %db_err, "Constraint violation during composite save");
                AppError::InvalidSubmission(Box::new(SubmissionErrors::non_field(
                    "Запись была изменена другим пользователем. Обновите страницу и повторите попытку.",
                )))
            }
            AppError::Conflict { field, message } => {
                let mut errors = SubmissionErrors::default();
                let key = if field.is_empty() {
                    NON_FIELD_ERRORS.to_string()
                } else {
                    field
                };
                errors.applicant.insert(key, vec![message]);
                AppError::InvalidSubmission(Box::new(errors))
            }
            other => other,
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.to_status_with_log(&format!("Request to {} {}", req.method(), req.uri()));

        match self {
            AppError::InvalidSubmission(errors) => {
                Custom(status, Json(SubmissionResponse::rejected(*errors))).respond_to(req)
            }
            AppError::Database(_) | AppError::FileStorage(_) => {
                Custom(status, Json(SubmissionResponse::unavailable())).respond_to(req)
            }
            AppError::Form(errors) => {
                Custom(status, Json(ValidationResponse::new(errors))).respond_to(req)
            }
            AppError::Conflict { field, message } => Custom(
                status,
                Json(ValidationResponse::with_error(&field, &message)),
            )
            .respond_to(req),
            AppError::Validation(msg) => Custom(
                status,
                Json(ValidationResponse::with_error(NON_FIELD_ERRORS, &msg)),
            )
            .respond_to(req),
            AppError::NotFound(_) | AppError::Internal(_) => status.respond_to(req),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Corrupt record: {}", error))
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.to_status_with_log("Error conversion into Status")
    }
}
