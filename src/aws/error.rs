//! AWS error classification
//!
//! Uses the service error code from `ProvideErrorMetadata` rather than
//! string matching. The classes only shape warning text and let status
//! probes treat "not found" as a miss; nothing here retries.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwsError {
    #[error("access denied ({code}): {message}")]
    AccessDenied { code: String, message: String },

    #[error("invalid credentials ({code}): {message}")]
    InvalidCredentials { code: String, message: String },

    #[error("rate limited ({code}): {message}")]
    Throttled { code: String, message: String },

    #[error("not found ({code}): {message}")]
    NotFound { code: String, message: String },

    #[error("service unavailable ({code}): {message}")]
    Unavailable { code: String, message: String },

    #[error("{}", sdk_message(.code.as_deref(), .message))]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

fn sdk_message(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{}: {}", code, message),
        None => message.to_string(),
    }
}

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "AllAccessDisabled",
    "AuthorizationError",
    "UnauthorizedAccess",
    "UnauthorizedOperation",
];

const INVALID_CREDENTIAL_CODES: &[&str] = &[
    "AuthFailure",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidAccessKeyId",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
];

const THROTTLING_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
];

const NOT_FOUND_CODES: &[&str] = &[
    "DBClusterNotFoundFault",
    "DBInstanceNotFound",
    "DBInstanceNotFoundFault",
    "InvalidGroup.NotFound",
    "InvalidGroupId.Malformed",
    "InvalidInstanceID.Malformed",
    "InvalidInstanceID.NotFound",
    "InvalidVpcID.Malformed",
    "InvalidVpcID.NotFound",
    "NoSuchBucket",
    "NoSuchEntity",
    "NotFound",
];

const UNAVAILABLE_CODES: &[&str] = &[
    "InternalError",
    "InternalFailure",
    "ServiceUnavailable",
    "Unavailable",
];

/// Classify by error code
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("unknown error").to_string();
    let Some(code) = code else {
        return AwsError::Sdk {
            code: None,
            message,
        };
    };

    let code_owned = code.to_string();
    if ACCESS_DENIED_CODES.contains(&code) {
        AwsError::AccessDenied {
            code: code_owned,
            message,
        }
    } else if INVALID_CREDENTIAL_CODES.contains(&code) {
        AwsError::InvalidCredentials {
            code: code_owned,
            message,
        }
    } else if THROTTLING_CODES.contains(&code) {
        AwsError::Throttled {
            code: code_owned,
            message,
        }
    } else if NOT_FOUND_CODES.contains(&code) {
        AwsError::NotFound {
            code: code_owned,
            message,
        }
    } else if UNAVAILABLE_CODES.contains(&code) {
        AwsError::Unavailable {
            code: code_owned,
            message,
        }
    } else {
        AwsError::Sdk {
            code: Some(code_owned),
            message,
        }
    }
}

impl AwsError {
    /// Classify any SDK operation error.
    ///
    /// Transport failures carry no service code; their full error chain
    /// becomes the message.
    pub fn from_sdk<E>(err: &E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        match err.message() {
            Some(message) => classify_aws_error(err.code(), Some(message)),
            None => classify_aws_error(err.code(), Some(&DisplayErrorContext(err).to_string())),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::AccessDenied { code, .. }
            | AwsError::InvalidCredentials { code, .. }
            | AwsError::Throttled { code, .. }
            | AwsError::NotFound { code, .. }
            | AwsError::Unavailable { code, .. } => Some(code),
            AwsError::Sdk { code, .. } => code.as_deref(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, AwsError::AccessDenied { .. })
    }
}
