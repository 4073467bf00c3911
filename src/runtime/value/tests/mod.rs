//! Tests for script value semantics

mod primitives;
