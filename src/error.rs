use serde_json::{json, Value as JsonValue};

use thiserror::Error;

/// Message used for every unique-field violation.
pub const ALREADY_TAKEN: &str = "is already taken";

#[derive(Error, Debug)]
pub enum Error {
  // 404
  #[error("not found: {0}")]
  NotFound(JsonValue),

  // 422
  #[error("unprocessable entity: {0}")]
  UnprocessableEntity(JsonValue),

  // 500
  #[error("internal server error")]
  InternalServerError,

  // 400
  #[error("bad request: {0}")]
  BadRequest(String),

  // Json error
  #[error("Json error: {source}")]
  JsonError {
    #[from]
    source: serde_json::Error,
  },

  #[error("disconnected: {0}")]
  DisconnectedError(String),

  #[error("postgres error: {source}")]
  PgError {
    #[from]
    source: tokio_postgres::error::Error,
  },

  #[error("std io error")]
  IOError {
    #[from]
    source: std::io::Error,
  },

  #[error("config error")]
  ConfigError {
    #[from]
    source: config::ConfigError,
  },

  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

impl Error {
  /// Unique-field violation, in the `{"errors": {field: [msg]}}` shape clients expect.
  pub fn already_taken(field: &str) -> Self {
    Error::UnprocessableEntity(json!({
      "errors": {
        field: [ALREADY_TAKEN],
      }
    }))
  }

  pub fn not_found(what: &str) -> Self {
    Error::NotFound(json!({
      "error": format!("{} not found", what),
    }))
  }

  /// True for the error produced by `already_taken(field)`.
  pub fn is_already_taken(&self, field: &str) -> bool {
    match self {
      Error::UnprocessableEntity(ref message) => {
        message["errors"][field][0] == JsonValue::from(ALREADY_TAKEN)
      },
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn already_taken_message_shape() {
    let err = Error::already_taken("slug");
    assert!(err.is_already_taken("slug"));
    assert!(!err.is_already_taken("email"));
    assert_eq!(
      err.to_string(),
      r#"unprocessable entity: {"errors":{"slug":["is already taken"]}}"#
    );
  }

  #[test]
  fn other_errors_are_not_uniqueness_violations() {
    assert!(!Error::not_found("article").is_already_taken("slug"));
    assert!(!Error::BadRequest("slug".into()).is_already_taken("slug"));
  }
}
