use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use company_common::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: &'static str,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid company name")]
    InvalidCompanyName,
    #[error("invalid phone number")]
    InvalidPhoneNumber,
    #[error("invalid facebook url")]
    InvalidFacebookUrl,
    #[error("invalid website")]
    InvalidWebsite,
    #[error("no lookup parameter given")]
    MissingParameters,
    #[error("unsupported query parameter {0}")]
    InvalidParameter(String),
    #[error("no company matches the lookup")]
    CompanyNotFound,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidCompanyName => "INVALID_COMPANY_NAME",
            ApiError::InvalidPhoneNumber => "INVALID_PHONE_NUMBER",
            ApiError::InvalidFacebookUrl => "INVALID_FACEBOOK_URL",
            ApiError::InvalidWebsite => "INVALID_WEBSITE",
            ApiError::MissingParameters => "MISSING_PARAMETERS",
            ApiError::InvalidParameter(_) => "INVALID_PARAMETER",
            ApiError::CompanyNotFound => "COMPANY_NOT_FOUND",
            ApiError::Store(_) => "INTERNAL_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::InvalidCompanyName => {
                "The company name must be a string between 1 and 250 characters."
            }
            ApiError::InvalidPhoneNumber => {
                "Phone number must contain only digits, '+', '-', '(', ')' or spaces."
            }
            ApiError::InvalidFacebookUrl => {
                "Facebook must be a valid URL (e.g., https://www.facebook.com/company)."
            }
            ApiError::InvalidWebsite => "Website must not be empty.",
            ApiError::MissingParameters => {
                "At least one query parameter (name, website, phoneNumber or facebook) is required."
            }
            ApiError::InvalidParameter(_) => {
                "Only 'name', 'website', 'phoneNumber' and 'facebook' are allowed as query parameters."
            }
            ApiError::CompanyNotFound => "No company found matching the given criteria.",
            ApiError::Store(_) => "An unexpected error occurred. Please try again later.",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::CompanyNotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(e) = &self {
            tracing::error!(error = %e, "company lookup failed");
        }

        let body = ErrorResponse {
            code: self.code(),
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
