// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarative interface descriptors
//!
//! An interface is described as a side table instead of through attributes:
//! a service marker on the interface and an operation marker on each remote
//! method. Both markers may override the name derived from the declaration.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::TypeDescriptor;

/// How a parameter is passed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassingMode {
    #[default]
    Value,
    Out,
    Ref,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub passing: PassingMode,
}

/// Marks a method as a remote operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMarker {
    /// Explicit operation name, defaults to the method name
    pub name: Option<String>,
}

/// Marks an interface as a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMarker {
    /// Explicit service name, defaults to the interface name
    pub name: Option<String>,
    /// Explicit namespace, defaults to the interface namespace
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_type: TypeDescriptor,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub operation: Option<OperationMarker>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, return_type: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type,
            type_parameters: Vec::new(),
            is_static: false,
            operation: None,
        }
    }

    pub fn param(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param_with(name, ty, PassingMode::Value)
    }

    pub fn out_param(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param_with(name, ty, PassingMode::Out)
    }

    pub fn ref_param(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param_with(name, ty, PassingMode::Ref)
    }

    fn param_with(
        mut self,
        name: impl Into<String>,
        ty: TypeDescriptor,
        passing: PassingMode,
    ) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            ty,
            passing,
        });
        self
    }

    pub fn type_parameter(mut self, name: impl Into<String>) -> Self {
        self.type_parameters.push(name.into());
        self
    }

    /// Marks the method as an operation named after the method
    pub fn operation(mut self) -> Self {
        self.operation = Some(OperationMarker::default());
        self
    }

    /// Marks the method as an operation with an explicit name
    pub fn operation_named(mut self, name: impl Into<String>) -> Self {
        self.operation = Some(OperationMarker {
            name: Some(name.into()),
        });
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Human readable signature, e.g. `Ping(Int32 x) -> String`
    pub fn signature(&self) -> String {
        let mut out = self.name.clone();
        if !self.type_parameters.is_empty() {
            let _ = write!(out, "<{}>", self.type_parameters.join(", "));
        }
        out.push('(');
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match p.passing {
                PassingMode::Value => {}
                PassingMode::Out => out.push_str("out "),
                PassingMode::Ref => out.push_str("ref "),
            }
            let _ = write!(out, "{} {}", p.ty, p.name);
        }
        let _ = write!(out, ") -> {}", self.return_type);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub generic_arguments: Vec<TypeDescriptor>,
    #[serde(default)]
    pub service: Option<ServiceMarker>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub extends: Vec<Arc<InterfaceDescriptor>>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            generic_arguments: Vec::new(),
            service: None,
            methods: Vec::new(),
            extends: Vec::new(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_generic_arguments(mut self, arguments: Vec<TypeDescriptor>) -> Self {
        self.generic_arguments = arguments;
        self
    }

    /// Marks the interface as a service named after the declaration
    pub fn service(mut self) -> Self {
        self.service = Some(ServiceMarker::default());
        self
    }

    /// Marks the interface as a service with an explicit name
    pub fn service_named(mut self, name: impl Into<String>) -> Self {
        let marker = self.service.get_or_insert_with(ServiceMarker::default);
        marker.name = Some(name.into());
        self
    }

    /// Marks the interface as a service under an explicit namespace
    pub fn service_namespace(mut self, namespace: impl Into<String>) -> Self {
        let marker = self.service.get_or_insert_with(ServiceMarker::default);
        marker.namespace = Some(namespace.into());
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn extends(mut self, parent: impl Into<Arc<InterfaceDescriptor>>) -> Self {
        self.extends.push(parent.into());
        self
    }

    pub fn is_service(&self) -> bool {
        self.service.is_some()
    }

    /// Identity of the interface: namespace, name and generic arguments
    pub fn full_name(&self) -> String {
        let mut out = String::new();
        if let Some(ns) = &self.namespace {
            out.push_str(ns);
            out.push('.');
        }
        out.push_str(&self.name);
        if !self.generic_arguments.is_empty() {
            out.push('<');
            for (i, arg) in self.generic_arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{arg}");
            }
            out.push('>');
        }
        out
    }
}

/// A Rust type that carries a contract description
///
/// Implementations return the same descriptor on every call; the cache keys
/// the analyzed contract by the implementing type.
pub trait ServiceContract: 'static {
    fn describe() -> InterfaceDescriptor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AsyncResult, type_of};

    #[test]
    fn test_signature_rendering() {
        let method = MethodDescriptor::new("Ping", type_of::<AsyncResult<String>>())
            .param("x", type_of::<i32>())
            .out_param("y", type_of::<i64>());
        assert_eq!(
            method.signature(),
            "Ping(Int32 x, out Int64 y) -> AsyncResult<String>"
        );

        let generic = MethodDescriptor::new("Echo", type_of::<i32>()).type_parameter("T");
        assert_eq!(generic.signature(), "Echo<T>() -> Int32");
    }

    #[test]
    fn test_full_name() {
        let iface = InterfaceDescriptor::new("Repository")
            .in_namespace("app.data")
            .with_generic_arguments(vec![type_of::<i32>(), type_of::<Option<String>>()]);
        assert_eq!(iface.full_name(), "app.data.Repository<Int32, String?>");
    }

    #[test]
    fn test_service_markers() {
        let iface = InterfaceDescriptor::new("Calculator");
        assert!(!iface.is_service());

        let iface = iface.service_named("Calc").service_namespace("math");
        let marker = iface.service.as_ref().unwrap();
        assert_eq!(marker.name.as_deref(), Some("Calc"));
        assert_eq!(marker.namespace.as_deref(), Some("math"));
    }
}
