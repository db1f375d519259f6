// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Dynamic values and positional messages
//!
//! A [`Message`] is the runtime counterpart of a
//! [`MessageShape`](shaperpc_contract::MessageShape): an ordered bag of
//! [`Value`]s addressed by 1-based position.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shaperpc_contract::{MessageShape, Primitive, TypeDescriptor};
use thiserror::Error;

use crate::status::Status;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Value of a named type, field by field
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Struct(_) => "struct",
        }
    }

    /// Whether this value can stand for a declared type
    pub fn conforms_to(&self, ty: &TypeDescriptor) -> bool {
        match (ty, self) {
            (TypeDescriptor::Void, Value::Nil) => true,
            (TypeDescriptor::Primitive(p), value) => primitive_conforms(*p, value),
            (TypeDescriptor::Nullable(_), Value::Nil) => true,
            (TypeDescriptor::Nullable(inner), value) => value.conforms_to(inner),
            (TypeDescriptor::Array(inner), Value::Bytes(_)) => {
                **inner == TypeDescriptor::Primitive(Primitive::Byte)
            }
            (TypeDescriptor::Array(inner), Value::List(items)) => {
                items.iter().all(|item| item.conforms_to(inner))
            }
            (TypeDescriptor::Tuple(types), Value::Tuple(values)) => {
                types.len() == values.len()
                    && types.iter().zip(values).all(|(t, v)| v.conforms_to(t))
            }
            (TypeDescriptor::Named(_), Value::Struct(_)) => true,
            _ => false,
        }
    }
}

fn primitive_conforms(primitive: Primitive, value: &Value) -> bool {
    match (primitive, value) {
        (Primitive::Boolean, Value::Bool(_)) => true,
        (Primitive::String, Value::String(_)) => true,
        (Primitive::Single | Primitive::Double, Value::Float(_)) => true,
        (Primitive::Int16, Value::Int(i)) => i16::try_from(*i).is_ok(),
        (Primitive::Int32, Value::Int(i)) => i32::try_from(*i).is_ok(),
        (Primitive::Int64, Value::Int(_)) => true,
        (Primitive::Byte, Value::UInt(u)) => u8::try_from(*u).is_ok(),
        (Primitive::UInt16, Value::UInt(u)) => u16::try_from(*u).is_ok(),
        (Primitive::UInt32, Value::UInt(u)) => u32::try_from(*u).is_ok(),
        (Primitive::UInt64, Value::UInt(_)) => true,
        _ => false,
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("value {value} out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("no value at position {0}")]
    Missing(usize),
}

impl From<ValueError> for Status {
    fn from(error: ValueError) -> Self {
        Status::invalid_argument(error.to_string())
    }
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

fn mismatch(expected: &'static str, found: &Value) -> ValueError {
    ValueError::Mismatch {
        expected,
        found: found.kind(),
    }
}

macro_rules! signed_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(self as i64)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let out_of_range = |v: String| ValueError::OutOfRange {
                        value: v,
                        target: stringify!($ty),
                    };
                    match value {
                        Value::Int(i) => {
                            <$ty>::try_from(i).map_err(|_| out_of_range(i.to_string()))
                        }
                        Value::UInt(u) => {
                            <$ty>::try_from(u).map_err(|_| out_of_range(u.to_string()))
                        }
                        other => Err(mismatch("int", &other)),
                    }
                }
            }
        )*
    };
}

macro_rules! unsigned_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::UInt(self as u64)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let out_of_range = |v: String| ValueError::OutOfRange {
                        value: v,
                        target: stringify!($ty),
                    };
                    match value {
                        Value::UInt(u) => {
                            <$ty>::try_from(u).map_err(|_| out_of_range(u.to_string()))
                        }
                        Value::Int(i) => {
                            <$ty>::try_from(i).map_err(|_| out_of_range(i.to_string()))
                        }
                        other => Err(mismatch("uint", &other)),
                    }
                }
            }
        )*
    };
}

signed_value!(i16, i32, i64);
unsigned_value!(u8, u16, u32, u64);

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map(IntoValue::into_value).unwrap_or(Value::Nil)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

macro_rules! tuple_value {
    ($($name:ident),+) => {
        impl<$($name: IntoValue),+> IntoValue for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_value(self) -> Value {
                let ($($name,)+) = self;
                Value::Tuple(vec![$($name.into_value()),+])
            }
        }

        impl<$($name: FromValue),+> FromValue for ($($name,)+) {
            fn from_value(value: Value) -> Result<Self, ValueError> {
                match value {
                    Value::Tuple(values) => {
                        let mut values = values.into_iter();
                        Ok(($(
                            $name::from_value(values.next().ok_or(ValueError::Mismatch {
                                expected: "longer tuple",
                                found: "tuple",
                            })?)?,
                        )+))
                    }
                    other => Err(mismatch("tuple", &other)),
                }
            }
        }
    };
}

tuple_value!(A, B);
tuple_value!(A, B, C);

/// Positional bag of values, positions starting at 1
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    values: Vec<Value>,
}

/// Builds a [`Message`] from values implementing [`IntoValue`]
#[macro_export]
macro_rules! message {
    () => {
        $crate::value::Message::empty()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::value::Message::new(vec![$($crate::value::IntoValue::into_value($value)),+])
    };
}

impl Message {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn push(&mut self, value: impl IntoValue) {
        self.values.push(value.into_value());
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        position.checked_sub(1).and_then(|i| self.values.get(i))
    }

    /// Replaces the value at `position`, returning the previous one
    pub fn set(&mut self, position: usize, value: impl IntoValue) -> Result<Value, ValueError> {
        let slot = position
            .checked_sub(1)
            .and_then(|i| self.values.get_mut(i))
            .ok_or(ValueError::Missing(position))?;
        Ok(std::mem::replace(slot, value.into_value()))
    }

    /// Typed copy of the value at `position`
    pub fn arg<T: FromValue>(&self, position: usize) -> Result<T, ValueError> {
        let value = self.get(position).ok_or(ValueError::Missing(position))?;
        T::from_value(value.clone())
    }

    /// Checks arity and the type of every position against `shape`
    pub fn conform(&self, shape: &MessageShape) -> Result<(), Status> {
        if self.values.len() != shape.len() {
            return Err(Status::invalid_argument(format!(
                "message has {} values, {} expects {}",
                self.values.len(),
                shape,
                shape.len()
            )));
        }
        for (position, ty) in shape.positions() {
            let value = &self.values[position - 1];
            if !value.conforms_to(ty) {
                return Err(Status::invalid_argument(format!(
                    "{} is a {}, expected {}",
                    MessageShape::property_name(position),
                    value.kind(),
                    ty
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;
    use shaperpc_contract::type_of;

    #[test]
    fn test_positions() {
        let mut msg = message![7i32, "seven"];
        assert_eq!(msg.get(1), Some(&Value::Int(7)));
        assert_eq!(msg.get(0), None);
        assert_eq!(msg.arg::<String>(2).unwrap(), "seven");
        assert_eq!(msg.arg::<i32>(3), Err(ValueError::Missing(3)));

        let previous = msg.set(1, 8i32).unwrap();
        assert_eq!(previous, Value::Int(7));
        assert_eq!(msg.arg::<i64>(1).unwrap(), 8);
        assert!(msg.set(5, 1i32).is_err());
    }

    #[test]
    fn test_conformance() {
        let shape = MessageShape::new(vec![
            type_of::<i32>(),
            type_of::<Option<String>>(),
            type_of::<Vec<u8>>(),
        ]);

        let ok = message![1i32, Option::<String>::None, Value::Bytes(vec![1, 2])];
        assert!(ok.conform(&shape).is_ok());

        let wrong_type = message!["1", Option::<String>::None, Value::Bytes(vec![])];
        let err = wrong_type.conform(&shape).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(err.message().unwrap().contains("Value1"));

        let wrong_len = message![1i32];
        assert!(wrong_len.conform(&shape).is_err());

        assert!(Message::empty().conform(&MessageShape::empty()).is_ok());
    }

    #[test]
    fn test_integer_ranges() {
        assert!(Value::Int(i64::from(i32::MAX) + 1).conforms_to(&type_of::<i64>()));
        assert!(!Value::Int(i64::from(i32::MAX) + 1).conforms_to(&type_of::<i32>()));
        assert!(!Value::UInt(256).conforms_to(&type_of::<u8>()));
        assert!(matches!(
            u8::from_value(Value::UInt(256)),
            Err(ValueError::OutOfRange { .. })
        ));
        assert_eq!(u16::from_value(Value::Int(12)).unwrap(), 12);
    }

    #[test]
    fn test_tuples_and_options() {
        let value = (1i32, Some("a".to_string())).into_value();
        assert!(value.conforms_to(&type_of::<(i32, Option<String>)>()));
        let back: (i32, Option<String>) = FromValue::from_value(value).unwrap();
        assert_eq!(back, (1, Some("a".to_string())));

        let none: Option<i32> = FromValue::from_value(Value::Nil).unwrap();
        assert_eq!(none, None);
    }
}
