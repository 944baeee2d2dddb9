//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use redkite_domain::RedkiteError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;
use toml::de::Error as TomlError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RedkiteError);

impl From<InfraError> for RedkiteError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RedkiteError> for InfraError {
    fn from(value: RedkiteError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoRedkiteError {
    fn into_redkite(self) -> RedkiteError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RedkiteError */
/* -------------------------------------------------------------------------- */

impl IntoRedkiteError for HttpError {
    fn into_redkite(self) -> RedkiteError {
        if self.is_timeout() {
            return RedkiteError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return RedkiteError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return RedkiteError::Decode(format!("failed to read response body: {self}"));
        }

        if let Some(status) = self.status() {
            return RedkiteError::Http {
                status: status.as_u16(),
                url: self.url().map(ToString::to_string).unwrap_or_default(),
                body: status.canonical_reason().unwrap_or("unknown status").to_string(),
            };
        }

        RedkiteError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_redkite())
    }
}

/* -------------------------------------------------------------------------- */
/* Parse and I/O errors → RedkiteError */
/* -------------------------------------------------------------------------- */

impl IntoRedkiteError for JsonError {
    fn into_redkite(self) -> RedkiteError {
        RedkiteError::Decode(format!("invalid JSON at line {} column {}: {self}", self.line(), self.column()))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_redkite())
    }
}

impl IntoRedkiteError for TomlError {
    fn into_redkite(self) -> RedkiteError {
        RedkiteError::Config(format!("Invalid TOML format: {}", self.message()))
    }
}

impl From<TomlError> for InfraError {
    fn from(value: TomlError) -> Self {
        InfraError(value.into_redkite())
    }
}

impl IntoRedkiteError for IoError {
    fn into_redkite(self) -> RedkiteError {
        RedkiteError::Config(format!("I/O failure: {self}"))
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_redkite())
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(RedkiteError::InvalidArgument(format!("invalid URL: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
