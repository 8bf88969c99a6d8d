use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

const NOT_AUTHORIZED_MESSAGE: &str = "You are not allowed to do this.";
const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong.";
const BAD_REQUEST_MESSAGE: &str = "Sorry, we didn't understand your request.";
const NOT_FOUND_MESSAGE: &str = "There's nothing here";

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    NotFound,
    Unauthorized,
    ValidationError(String),
    DatabaseError(String),
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound => String::from(NOT_FOUND_MESSAGE),
            AppError::Unauthorized => String::from(NOT_AUTHORIZED_MESSAGE),
            AppError::ValidationError(_) => String::from(BAD_REQUEST_MESSAGE),
            AppError::DatabaseError(_) => String::from(INTERNAL_ERROR_MESSAGE),
            AppError::InternalServerError(_) => String::from(INTERNAL_ERROR_MESSAGE),
        }
    }

    pub fn error_detail(&self) -> String {
        match self {
            AppError::NotFound => String::from(NOT_FOUND_MESSAGE),
            AppError::Unauthorized => String::from(NOT_AUTHORIZED_MESSAGE),
            AppError::ValidationError(e) => e.clone(),
            AppError::DatabaseError(_) => String::from(INTERNAL_ERROR_MESSAGE),
            AppError::InternalServerError(e) => e.clone(),
        }
    }

    /// Constructs a new [`AppError::InternalServerError`] from some other type.
    pub fn new(msg: impl ToString) -> Self {
        Self::InternalServerError(msg.to_string())
    }

    /// Constructs a new [`AppError::ValidationError`] with the given message.
    pub fn validation(msg: impl ToString) -> Self {
        Self::ValidationError(msg.to_string())
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
    }
}

impl FromStr for AppError {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

fn get_validation_error_message(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => error.code.to_string(),
    }
}

fn collect_validation_messages(
    errors: &ValidationErrors,
    prefix: &str,
    message_vec: &mut Vec<String>,
) {
    for (field, error_kind) in errors.errors() {
        let field = match prefix.is_empty() {
            true => field.to_string(),
            false => format!("{prefix}.{field}"),
        };
        match error_kind {
            ValidationErrorsKind::Field(error_vec) => {
                for error in error_vec {
                    message_vec.push(format!("{field}: {}", get_validation_error_message(error)));
                }
            },
            ValidationErrorsKind::Struct(nested_errors) => {
                collect_validation_messages(nested_errors, &field, message_vec);
            },
            ValidationErrorsKind::List(nested_error_map) => {
                for (index, nested_errors) in nested_error_map {
                    collect_validation_messages(nested_errors, &format!("{field}[{index}]"), message_vec);
                }
            },
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut message_vec = Vec::new();
        collect_validation_messages(&errors, "", &mut message_vec);
        message_vec.sort();
        AppError::ValidationError(message_vec.join(" "))
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::ValidationError(get_validation_error_message(&error))
    }
}

impl From<std::env::VarError> for AppError {
    fn from(error: std::env::VarError) -> Self {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(feature = "ssr")]
mod ssr {
    use crate::errors::AppError;

    impl From<sqlx::Error> for AppError {
        fn from(error: sqlx::Error) -> Self {
            match error {
                sqlx::Error::RowNotFound => AppError::NotFound,
                _ => AppError::DatabaseError(error.to_string()),
            }
        }
    }

    impl From<sqlx::migrate::MigrateError> for AppError {
        fn from(error: sqlx::migrate::MigrateError) -> Self {
            AppError::DatabaseError(error.to_string())
        }
    }
}
