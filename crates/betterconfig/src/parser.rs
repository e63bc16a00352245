// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed access to the configuration document.
//!
//! The document is a flat JSON object. Whole-document reads go through
//! `serde`; single-key reads go through [`SettingValue`], which also accepts
//! the string spellings the CDN emits for numbers and booleans.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ParseError;

mod sealed {
    pub trait Sealed {}

    impl Sealed for String {}
    impl Sealed for bool {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
}

/// Scalar types a single configuration key can be read as.
///
/// Implemented for `String`, `bool`, `i32`, `i64` and `f64`; the trait is
/// sealed so reads of any other type do not compile.
pub trait SettingValue: sealed::Sealed + Sized + Send + 'static {
    /// Name used in type mismatch errors.
    const TYPE_NAME: &'static str;

    /// Converts a JSON value, `None` when it has no sensible reading as `Self`.
    fn from_json(value: &Value) -> Option<Self>;
}

impl SettingValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }
}

impl SettingValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
            Value::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

impl SettingValue for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().or_else(|| {
                // Integral floats such as `342423.0` read as integers.
                number
                    .as_f64()
                    .filter(|wide| {
                        wide.fract() == 0.0
                            && *wide >= i64::MIN as f64
                            && *wide < i64::MAX as f64
                    })
                    .map(|wide| wide as i64)
            }),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl SettingValue for i32 {
    const TYPE_NAME: &'static str = "integer";

    fn from_json(value: &Value) -> Option<Self> {
        i64::from_json(value).and_then(|wide| i32::try_from(wide).ok())
    }
}

impl SettingValue for f64 {
    const TYPE_NAME: &'static str = "double";

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Deserializes the whole document into `T`.
pub fn parse<T: DeserializeOwned>(json: &str) -> Result<T, ParseError> {
    if json.is_empty() {
        return Err(ParseError::InvalidArgument("json is empty"));
    }
    serde_json::from_str(json).map_err(|source| ParseError::InvalidJson {
        json: json.to_owned(),
        source,
    })
}

/// Reads the value stored under `key` as `T`.
pub fn parse_value<T: SettingValue>(json: &str, key: &str) -> Result<T, ParseError> {
    if key.is_empty() {
        return Err(ParseError::InvalidArgument("key is empty"));
    }
    let document: Value = parse(json)?;
    let Value::Object(mut settings) = document else {
        return Err(ParseError::NotAnObject);
    };
    match settings.remove(key) {
        None | Some(Value::Null) => Err(ParseError::KeyNotFound(key.to_owned())),
        Some(value) => T::from_json(&value).ok_or_else(|| ParseError::TypeMismatch {
            key: key.to_owned(),
            expected: T::TYPE_NAME,
        }),
    }
}
