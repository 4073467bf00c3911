//! Primitive value tests

use crate::runtime::value::{Value, ValueType, EXITED_WITH_ERROR};

#[test]
fn test_unit_value() {
    let v = Value::Unit;
    assert_eq!(v.value_type(), ValueType::Unit);
    assert!(!v.is_true());
    assert_eq!(Value::default(), Value::Unit);
}

#[test]
fn test_int_truthiness() {
    assert!(Value::Int(1).is_true());
    assert!(Value::Int(-7).is_true());
    assert!(!Value::Int(0).is_true());
    assert_eq!(Value::from(true), Value::Int(1));
    assert_eq!(Value::Int(42).to_int(), Some(42));
}

#[test]
fn test_string_values() {
    let v = Value::from("hello");
    assert_eq!(v.value_type(), ValueType::Str);
    assert_eq!(v.as_str(), Some("hello"));
    assert!(v.is_true());
    assert!(!Value::str("").is_true());
    assert!(v.to_int().is_none());
}

#[test]
fn test_error_value_is_false() {
    let v = Value::error(EXITED_WITH_ERROR);
    assert!(v.is_error());
    assert!(!v.is_true());
    assert_eq!(v.error_text(), Some(EXITED_WITH_ERROR));
    assert_eq!(v.value_type(), ValueType::Error);
}

#[test]
fn test_display() {
    assert_eq!(Value::Int(5).to_string(), "5");
    assert_eq!(Value::str("a").to_string(), "\"a\"");
    assert_eq!(Value::Unit.to_string(), "unit");
    assert_eq!(
        Value::error("boom").to_string(),
        "error{ errortext = \"boom\" }"
    );
    assert_eq!(ValueType::Str.to_string(), "String");
}
