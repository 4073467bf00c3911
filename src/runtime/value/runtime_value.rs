//! Runtime value type for scripts
//!
//! `Value` is the unified representation of everything a script can push,
//! store or return. Strings are shared (`Arc<str>`) so copying a value
//! between stacks never copies payloads.

use std::fmt;
use std::sync::Arc;

/// Message carried by the error value of a script that could not be resolved.
pub const UNABLE_TO_READ_SCRIPT: &str = "Unable to read script";

/// Message carried by the error value of a script that trapped.
pub const EXITED_WITH_ERROR: &str = "Script exited with an error condition";

/// Value type tag, used for type checks and trap messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Unit,
    Int,
    Str,
    Error,
}

impl fmt::Display for ValueType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ValueType::Unit => "Unit",
            ValueType::Int => "Int",
            ValueType::Str => "String",
            ValueType::Error => "Error",
        };
        f.write_str(name)
    }
}

/// A script value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// Empty value
    #[default]
    Unit,
    /// 64-bit signed integer
    Int(i64),
    /// Immutable shared string
    Str(Arc<str>),
    /// Script-level error object
    ///
    /// Returned to callers that embed a script call inside another script,
    /// so that a failure is something the calling script can inspect rather
    /// than a host-level fault.
    Error(Arc<str>),
}

impl Value {
    /// Build a string value.
    #[inline]
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Build an error value.
    #[inline]
    pub fn error(message: impl AsRef<str>) -> Self {
        Value::Error(Arc::from(message.as_ref()))
    }

    /// Get the type tag.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Unit => ValueType::Unit,
            Value::Int(_) => ValueType::Int,
            Value::Str(_) => ValueType::Str,
            Value::Error(_) => ValueType::Error,
        }
    }

    /// Script truthiness: zero, unit, the empty string and every error are false.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Unit => false,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Error(_) => false,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the integer payload, if any.
    #[inline]
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the string payload, if any.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the error message, if this is an error value.
    #[inline]
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Value::Error(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(b as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "unit"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Error(msg) => write!(f, "error{{ errortext = \"{}\" }}", msg),
        }
    }
}
