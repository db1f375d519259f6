// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Host-neutral type model
//!
//! Signatures are described with [`TypeDescriptor`] values instead of host
//! reflection. Rust types can produce their descriptor through [`TypeInfo`],
//! but descriptors can also be built by hand or deserialized from a
//! pre-parsed model.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Built-in scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Primitive {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    String,
}

impl Primitive {
    /// Canonical name, also used by the name transliteration
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Boolean => "Boolean",
            Primitive::Byte => "Byte",
            Primitive::Int16 => "Int16",
            Primitive::Int32 => "Int32",
            Primitive::Int64 => "Int64",
            Primitive::UInt16 => "UInt16",
            Primitive::UInt32 => "UInt32",
            Primitive::UInt64 => "UInt64",
            Primitive::Single => "Single",
            Primitive::Double => "Double",
            Primitive::String => "String",
        }
    }

    /// True for the integral primitives
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Primitive::Byte
                | Primitive::Int16
                | Primitive::Int32
                | Primitive::Int64
                | Primitive::UInt16
                | Primitive::UInt32
                | Primitive::UInt64
        )
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined (possibly generic) type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedType {
    /// Fully qualified name, segments separated by `.` or `::`
    pub name: String,
    /// Generic arguments, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<TypeDescriptor>,
    /// Names of the types this one is assignable to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<String>,
}

impl NamedType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            supertypes: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<TypeDescriptor>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Last segment of the qualified name
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit(['.', ':'])
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.name)
    }

    /// True if this type is, or is assignable to, `name`
    ///
    /// Both the qualified and the simple name are accepted.
    pub fn is_assignable_to(&self, name: &str) -> bool {
        self.name == name
            || self.simple_name() == name
            || self.supertypes.iter().any(|s| s == name)
    }
}

/// Description of a value type as it appears in a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// No value (`()` in Rust)
    Void,
    Primitive(Primitive),
    Named(NamedType),
    Nullable(Box<TypeDescriptor>),
    Array(Box<TypeDescriptor>),
    Tuple(Vec<TypeDescriptor>),
    /// An awaitable producing the inner type
    AsyncResult(Box<TypeDescriptor>),
    /// A lazily pulled, finite sequence of the inner type
    AsyncSequence(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn primitive(primitive: Primitive) -> Self {
        TypeDescriptor::Primitive(primitive)
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named(NamedType::new(name))
    }

    pub fn generic(name: impl Into<String>, arguments: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Named(NamedType::new(name).with_arguments(arguments))
    }

    pub fn nullable(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Nullable(Box::new(inner))
    }

    pub fn array(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(inner))
    }

    pub fn tuple(elements: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Tuple(elements)
    }

    pub fn async_result(inner: TypeDescriptor) -> Self {
        TypeDescriptor::AsyncResult(Box::new(inner))
    }

    pub fn async_sequence(item: TypeDescriptor) -> Self {
        TypeDescriptor::AsyncSequence(Box::new(item))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    pub fn is_async_result(&self) -> bool {
        matches!(self, TypeDescriptor::AsyncResult(_))
    }

    /// Item type if this is an async sequence
    pub fn sequence_item(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeDescriptor::AsyncSequence(item) => Some(item),
            _ => None,
        }
    }

    /// Strips one async-result wrapper, if present
    pub fn unwrap_async_result(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::AsyncResult(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Void => f.write_str("void"),
            TypeDescriptor::Primitive(p) => write!(f, "{p}"),
            TypeDescriptor::Named(named) => {
                f.write_str(&named.name)?;
                if !named.arguments.is_empty() {
                    f.write_str("<")?;
                    write_list(f, &named.arguments)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeDescriptor::Nullable(inner) => write!(f, "{inner}?"),
            TypeDescriptor::Array(inner) => write!(f, "{inner}[]"),
            TypeDescriptor::Tuple(elements) => {
                f.write_str("(")?;
                write_list(f, elements)?;
                f.write_str(")")
            }
            TypeDescriptor::AsyncResult(inner) => write!(f, "AsyncResult<{inner}>"),
            TypeDescriptor::AsyncSequence(inner) => write!(f, "AsyncSequence<{inner}>"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeDescriptor]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Rust types that can describe themselves to the contract compiler
pub trait TypeInfo {
    fn type_descriptor() -> TypeDescriptor;
}

/// Shorthand for `T::type_descriptor()`
pub fn type_of<T: TypeInfo>() -> TypeDescriptor {
    T::type_descriptor()
}

macro_rules! primitive_type_info {
    ($($ty:ty => $primitive:ident),* $(,)?) => {
        $(
            impl TypeInfo for $ty {
                fn type_descriptor() -> TypeDescriptor {
                    TypeDescriptor::Primitive(Primitive::$primitive)
                }
            }
        )*
    };
}

primitive_type_info! {
    bool => Boolean,
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Single,
    f64 => Double,
    String => String,
}

impl TypeInfo for () {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Void
    }
}

impl<T: TypeInfo> TypeInfo for Option<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::nullable(T::type_descriptor())
    }
}

impl<T: TypeInfo> TypeInfo for Vec<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::type_descriptor())
    }
}

macro_rules! tuple_type_info {
    ($($name:ident),+) => {
        impl<$($name: TypeInfo),+> TypeInfo for ($($name,)+) {
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::Tuple(vec![$($name::type_descriptor()),+])
            }
        }
    };
}

tuple_type_info!(A, B);
tuple_type_info!(A, B, C);
tuple_type_info!(A, B, C, D);

/// Marker for an awaitable result in a declared signature
pub struct AsyncResult<T>(PhantomData<T>);

impl<T: TypeInfo> TypeInfo for AsyncResult<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::async_result(T::type_descriptor())
    }
}

/// Marker for an async sequence in a declared signature
pub struct AsyncSequence<T>(PhantomData<T>);

impl<T: TypeInfo> TypeInfo for AsyncSequence<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::async_sequence(T::type_descriptor())
    }
}
