// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Service and operation naming
//!
//! Generic interfaces get a name suffix derived from their type arguments.
//! The transliteration only produces ASCII alphanumerics and `-`, so the
//! result is safe in file names, identifiers and URL paths.

use crate::interface::{InterfaceDescriptor, MethodDescriptor};
use crate::types::TypeDescriptor;

/// Replaces every run of non-alphanumeric characters with a single `-`
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Identifier-safe spelling of a type
///
/// `Option<i32>` becomes `Nullable-Int32` and `Vec<Vec<Option<i32>>>`
/// becomes `ArrayArrayNullable-Int32`.
pub fn transliterate(ty: &TypeDescriptor) -> String {
    match ty {
        TypeDescriptor::Void => "Void".to_string(),
        TypeDescriptor::Primitive(p) => p.as_str().to_string(),
        TypeDescriptor::Named(named) => {
            let mut out = normalize(named.simple_name());
            for arg in &named.arguments {
                out.push('-');
                out.push_str(&transliterate(arg));
            }
            out
        }
        TypeDescriptor::Nullable(inner) => format!("Nullable-{}", transliterate(inner)),
        TypeDescriptor::Array(inner) => format!("Array{}", transliterate(inner)),
        TypeDescriptor::Tuple(elements) => {
            let mut out = "Tuple".to_string();
            for element in elements {
                out.push('-');
                out.push_str(&transliterate(element));
            }
            out
        }
        TypeDescriptor::AsyncResult(inner) => format!("AsyncResult-{}", transliterate(inner)),
        TypeDescriptor::AsyncSequence(inner) => {
            format!("AsyncSequence-{}", transliterate(inner))
        }
    }
}

/// Service name as exposed on the wire
pub fn service_name(interface: &InterfaceDescriptor) -> String {
    let marker = interface.service.as_ref();

    let mut base = match marker.and_then(|m| m.name.as_deref()) {
        Some(explicit) => explicit.to_string(),
        None => normalize(&interface.name),
    };
    for arg in &interface.generic_arguments {
        base.push('-');
        base.push_str(&transliterate(arg));
    }

    let namespace = marker
        .and_then(|m| m.namespace.as_deref())
        .or(interface.namespace.as_deref())
        .filter(|ns| !ns.is_empty());

    match namespace {
        Some(ns) => format!("{ns}.{base}"),
        None => base,
    }
}

/// Operation name: the explicit marker name or the method name
pub fn operation_name(method: &MethodDescriptor) -> String {
    method
        .operation
        .as_ref()
        .and_then(|m| m.name.clone())
        .unwrap_or_else(|| method.name.clone())
}

/// Routing path of an operation, `/{service}/{operation}`
pub fn operation_path(service: &str, operation: &str) -> String {
    format!("/{service}/{operation}")
}
