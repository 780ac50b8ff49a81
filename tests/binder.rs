mod common;

use bytes::Bytes;
use chrono::{NaiveDate, NaiveTime};
use common::{MockDb, Script};
use rowstream::{
  BoundValue, Connection, Decimal, EnumConstant, Error, bind_any, bind_parameters,
};
use std::any::Any;

#[test]
fn test_bind_parameters_uses_one_setter_per_kind() {
  let db = MockDb::new(Script::default());
  let conn = db.connect();
  let mut statement = conn.prepare("INSERT INTO t VALUES (?)").unwrap();

  let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
  let time = NaiveTime::from_hms_opt(8, 15, 0).unwrap();
  let params = vec![
    BoundValue::Null,
    BoundValue::Int(5),
    BoundValue::Long(42),
    BoundValue::String("a".to_string()),
    BoundValue::Double(0.5),
    BoundValue::Float(1.5),
    BoundValue::Bool(true),
    BoundValue::Date(date),
    BoundValue::Time(time),
    BoundValue::DateTime(date.and_time(time)),
    BoundValue::Decimal(Decimal::new(12345, 2)),
    BoundValue::Binary(Bytes::from_static(b"\x01\x02")),
    BoundValue::Enum(EnumConstant::new("ACTIVE")),
  ];

  bind_parameters(&mut statement, &params).unwrap();

  let binds = db.log().binds;
  let expected = vec![
    (1, "null"),
    (2, "int:5"),
    (3, "long:42"),
    (4, "string:a"),
    (5, "double:0.5"),
    (6, "float:1.5"),
    (7, "bool:true"),
    (8, "date:2024-01-31"),
    (9, "time:08:15:00"),
    (10, "timestamp:2024-01-31 08:15:00"),
    (11, "decimal:123.45"),
    (12, "binary:[1, 2]"),
    (13, "object:ACTIVE"),
  ];
  let expected: Vec<(usize, String)> = expected
    .into_iter()
    .map(|(i, s)| (i, s.to_string()))
    .collect();
  assert_eq!(binds, expected);
}

#[test]
fn test_bind_parameters_empty_is_noop() {
  let db = MockDb::new(Script::default());
  let mut statement = db.connect().prepare("SELECT 1").unwrap();
  bind_parameters(&mut statement, &[]).unwrap();
  assert!(db.log().binds.is_empty());
}

#[test]
fn test_bind_parameters_driver_failure_is_execution_error() {
  let db = MockDb::new(Script {
    fail_bind_at: Some(2),
    ..Script::default()
  });
  let mut statement = db.connect().prepare("SELECT ?, ?").unwrap();

  let err = bind_parameters(&mut statement, &rowstream::params![1, 2]).unwrap_err();
  assert!(matches!(err, Error::Execution(_)));
  assert_eq!(db.log().binds, vec![(1, "int:1".to_string())]);
}

#[test]
fn test_bind_any_fails_before_any_setter() {
  let db = MockDb::new(Script::default());
  let mut statement = db.connect().prepare("SELECT ?, ?, ?").unwrap();

  let values: [&dyn Any; 3] = [&1i32, &"ok", &std::time::Instant::now()];
  let err = bind_any(&mut statement, &values).unwrap_err();

  match err {
    Error::Binding { index, .. } => assert_eq!(index, 3),
    other => panic!("unexpected error {:?}", other),
  }
  assert!(db.log().binds.is_empty());
}

#[test]
fn test_bind_any_supported_values() {
  let db = MockDb::new(Script::default());
  let mut statement = db.connect().prepare("SELECT ?, ?, ?").unwrap();

  let values: [&dyn Any; 3] = [&(), &7i64, &String::from("x")];
  bind_any(&mut statement, &values).unwrap();

  assert_eq!(
    db.log().binds,
    vec![
      (1, "null".to_string()),
      (2, "long:7".to_string()),
      (3, "string:x".to_string()),
    ]
  );
}
