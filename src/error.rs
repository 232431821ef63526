use thiserror::Error;

/// The category of a geometry compiler error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalaGeometryErrorKind {
  /// The source data is unreadable or unsupported.
  Input,
  /// An internal invariant was violated.
  Internal,
  /// Reading or writing a file failed.
  Io,
}

/// The error type of the hala-geometryc crate.
#[derive(Error, Debug)]
pub struct HalaGeometryError {
  kind: HalaGeometryErrorKind,
  msg: String,
  #[source]
  source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// The implementation of the error type of the hala-geometryc crate.
impl HalaGeometryError {
  /// Create a new error.
  /// param kind: The kind of the error.
  /// param msg: The message of the error.
  /// param source: The source of the error.
  /// return: The error.
  pub fn new(kind: HalaGeometryErrorKind, msg: &str, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self {
      kind,
      msg: msg.to_string(),
      source,
    }
  }

  /// Create a new input error.
  /// param msg: The message of the error.
  /// return: The error.
  pub fn input(msg: &str) -> Self {
    Self::new(HalaGeometryErrorKind::Input, msg, None)
  }

  /// Create a new internal invariant violation error.
  /// param msg: The message of the error.
  /// return: The error.
  pub fn internal(msg: &str) -> Self {
    Self::new(HalaGeometryErrorKind::Internal, msg, None)
  }

  /// Create a new I/O error.
  /// param msg: The message of the error.
  /// param err: The underlying I/O error.
  /// return: The error.
  pub fn io(msg: &str, err: std::io::Error) -> Self {
    Self::new(HalaGeometryErrorKind::Io, msg, Some(Box::new(err)))
  }

  pub fn kind(&self) -> HalaGeometryErrorKind {
    self.kind
  }

  pub fn message(&self) -> &str {
    &self.msg
  }
}

impl std::convert::From<std::io::Error> for HalaGeometryError {
  fn from(err: std::io::Error) -> Self {
    Self {
      kind: HalaGeometryErrorKind::Io,
      msg: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

/// The implementation Display trait for the error type of the hala-geometryc crate.
impl std::fmt::Display for HalaGeometryError {
  /// Format the error.
  /// param f: The formatter.
  /// return: The result.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.msg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn io_errors_keep_their_source() {
    let err: HalaGeometryError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert_eq!(err.kind(), HalaGeometryErrorKind::Io);
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(err.to_string(), "missing");
  }
}
