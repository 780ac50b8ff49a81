use crate::error::{DriverError, Error, Expected};

#[test]
fn test_binding_error_display() {
  let err = Error::binding(2, "unsupported parameter type");
  assert_eq!(
    err.to_string(),
    "cannot bind parameter 2: unsupported parameter type"
  );
}

#[test]
fn test_execution_error_from_driver_error() {
  let driver: DriverError = "syntax error near SELEC".into();
  let err: Error = driver.into();
  assert!(matches!(err, Error::Execution(_)));
  assert_eq!(err.to_string(), "execution failed: syntax error near SELEC");
  assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_cardinality_error_display() {
  let none = Error::Cardinality {
    expected: Expected::ExactlyOne,
    found: 0,
  };
  assert_eq!(none.to_string(), "expected exactly one row, found 0");
  assert!(none.is_cardinality());

  let many = Error::Cardinality {
    expected: Expected::AtMostOne,
    found: 2,
  };
  assert_eq!(many.to_string(), "expected at most one row, found 2");
}

#[test]
fn test_no_row_is_not_cardinality() {
  assert!(!Error::NoRow.is_cardinality());
}
