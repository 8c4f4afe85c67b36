//! Typed failures for inventory service calls.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for transport operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the inventory transport.
///
/// Variants are `Clone` (messages only, no live handles) so the sync layer
/// can fan a single failed fetch out to every waiter on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
  /// No usable response reached us: connection refused, DNS, timeout.
  #[error("network error: {0}")]
  Network(String),

  /// 5xx, an unexpected non-2xx, or a success body we could not decode.
  #[error("server error {status}: {message}")]
  Server { status: u16, message: String },

  /// The service reports the id does not exist.
  #[error("not found: {resource}")]
  NotFound { resource: String },

  /// The service rejected the submitted field content.
  #[error("validation rejected: {message}")]
  Validation { message: String },
}

impl ApiError {
  /// Map a non-success HTTP status (plus whatever body text the service
  /// returned) onto the taxonomy. 404 is its own variant; other 4xx mean
  /// the input was rejected; everything else is the server's problem.
  pub(crate) fn from_status(status: StatusCode, resource: &str, body: String) -> Self {
    match status.as_u16() {
      404 => ApiError::NotFound {
        resource: resource.to_string(),
      },
      400..=499 => ApiError::Validation { message: body },
      code => ApiError::Server {
        status: code,
        message: body,
      },
    }
  }

  /// A 2xx response whose body failed to parse as the expected shape.
  pub(crate) fn bad_body(status: StatusCode, err: impl std::fmt::Display) -> Self {
    ApiError::Server {
      status: status.as_u16(),
      message: format!("invalid response body: {}", err),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ApiError::Network(format!("request timed out: {}", err))
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_404_maps_to_not_found() {
    let err = ApiError::from_status(StatusCode::NOT_FOUND, "item 42", String::new());
    assert_eq!(
      err,
      ApiError::NotFound {
        resource: "item 42".to_string()
      }
    );
    assert!(err.is_not_found());
  }

  #[test]
  fn client_errors_map_to_validation() {
    for code in [400u16, 409, 415, 422] {
      let status = StatusCode::from_u16(code).unwrap();
      let err = ApiError::from_status(status, "items", "price must be a number".to_string());
      assert!(
        matches!(err, ApiError::Validation { .. }),
        "status {} should be a validation failure",
        code
      );
    }
  }

  #[test]
  fn server_errors_keep_status_and_message() {
    let err = ApiError::from_status(
      StatusCode::INTERNAL_SERVER_ERROR,
      "items",
      "boom".to_string(),
    );
    assert_eq!(
      err,
      ApiError::Server {
        status: 500,
        message: "boom".to_string()
      }
    );
  }

  #[test]
  fn undecodable_success_body_is_a_server_error() {
    let err = ApiError::bad_body(StatusCode::OK, "expected a sequence");
    match err {
      ApiError::Server { status, message } => {
        assert_eq!(status, 200);
        assert!(message.contains("invalid response body"));
      }
      other => panic!("unexpected variant: {:?}", other),
    }
  }
}
