// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Signature classification
//!
//! Maps a method signature onto an [`OperationShape`] and assigns a
//! [`ParameterRole`] to every parameter. Classification is a pure function of
//! the signature and the configured set of context-like types. A signature
//! that cannot be mapped yields an [`UnsupportedSignature`] value so that the
//! analyzer can record it and move on.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::interface::{InterfaceDescriptor, MethodDescriptor, PassingMode};
use crate::message::MessageShapeBuilder;
use crate::naming;
use crate::operation::{
    MethodRef, OperationDescriptor, OperationShape, ParameterBinding, ParameterRole,
};
use crate::types::TypeDescriptor;

/// Context-like type names recognised when nothing else is configured
pub const DEFAULT_CONTEXT_TYPES: [&str; 4] = [
    "CallContext",
    "CancellationToken",
    "CallOptions",
    "ServerCallContext",
];

/// Closed set of type names classified as [`ParameterRole::Context`]
///
/// A named parameter type matches when its qualified name, simple name or one
/// of its supertypes is in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTypeSet {
    names: BTreeSet<String>,
}

impl Default for ContextTypeSet {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_TYPES)
    }
}

impl ContextTypeSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn matches(&self, ty: &TypeDescriptor) -> bool {
        match ty {
            TypeDescriptor::Named(named) => self.names.iter().any(|n| named.is_assignable_to(n)),
            _ => false,
        }
    }
}

/// Response side of a classified signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// No response value
    Empty,
    /// A single response value
    Value(TypeDescriptor),
    /// A response stream, optionally preceded by header values
    Stream {
        header: Option<Vec<TypeDescriptor>>,
        item: TypeDescriptor,
    },
}

impl ResponseKind {
    pub fn is_stream(&self) -> bool {
        matches!(self, ResponseKind::Stream { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSignature {
    pub shape: OperationShape,
    /// One binding per declared parameter, in declaration order
    pub bindings: Vec<ParameterBinding>,
    /// Item type of the streamed request parameter
    pub request_item: Option<TypeDescriptor>,
    pub response: ResponseKind,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signature not supported: {reason}")]
pub struct UnsupportedSignature {
    pub reason: String,
}

impl UnsupportedSignature {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignatureClassifier {
    context_types: ContextTypeSet,
}

impl SignatureClassifier {
    pub fn new(context_types: ContextTypeSet) -> Self {
        Self { context_types }
    }

    pub fn context_types(&self) -> &ContextTypeSet {
        &self.context_types
    }

    pub fn classify(
        &self,
        method: &MethodDescriptor,
    ) -> Result<ClassifiedSignature, UnsupportedSignature> {
        if !method.type_parameters.is_empty() {
            return Err(UnsupportedSignature::new("generic methods are not supported"));
        }

        let mut bindings = Vec::with_capacity(method.parameters.len());
        let mut request_item: Option<TypeDescriptor> = None;

        for (index, parameter) in method.parameters.iter().enumerate() {
            if parameter.passing != PassingMode::Value {
                return Err(UnsupportedSignature::new(format!(
                    "out and ref parameters are not supported ({})",
                    parameter.name
                )));
            }

            let role = if self.context_types.matches(&parameter.ty) {
                ParameterRole::Context
            } else if let Some(item) = parameter.ty.sequence_item() {
                if request_item.is_some() {
                    return Err(UnsupportedSignature::new(format!(
                        "more than one async sequence parameter ({})",
                        parameter.name
                    )));
                }
                if contains_async(item) {
                    return Err(UnsupportedSignature::new(format!(
                        "nested async type in parameter {}",
                        parameter.name
                    )));
                }
                request_item = Some(item.clone());
                ParameterRole::StreamedValue
            } else if contains_async(&parameter.ty) {
                return Err(UnsupportedSignature::new(format!(
                    "async type {} is not supported as parameter {}",
                    parameter.ty, parameter.name
                )));
            } else {
                ParameterRole::HeaderData
            };

            bindings.push(ParameterBinding { index, role });
        }

        let is_async = method.return_type.is_async_result();
        let response = classify_response(&method.return_type, is_async)?;

        Ok(ClassifiedSignature {
            shape: OperationShape::from_streaming(request_item.is_some(), response.is_stream()),
            bindings,
            request_item,
            response,
            is_async,
        })
    }

    /// Classifies `method` and builds its operation descriptor
    pub fn describe(
        &self,
        service_name: &str,
        interface: &InterfaceDescriptor,
        method: &MethodDescriptor,
    ) -> Result<OperationDescriptor, UnsupportedSignature> {
        let signature = self.classify(method)?;
        let shapes = MessageShapeBuilder::build(method, &signature);

        Ok(OperationDescriptor::new(
            service_name.to_string(),
            naming::operation_name(method),
            MethodRef::new(interface, method),
            signature.shape,
            signature.bindings,
            shapes,
            signature.is_async,
        ))
    }
}

fn classify_response(
    return_type: &TypeDescriptor,
    is_async: bool,
) -> Result<ResponseKind, UnsupportedSignature> {
    let unwrapped = return_type.unwrap_async_result();

    match unwrapped {
        TypeDescriptor::Void => Ok(ResponseKind::Empty),
        TypeDescriptor::AsyncResult(_) => {
            Err(UnsupportedSignature::new("nested async result in the response"))
        }
        TypeDescriptor::AsyncSequence(item) => {
            if contains_async(item) {
                return Err(UnsupportedSignature::new(
                    "nested async type in the response stream",
                ));
            }
            Ok(ResponseKind::Stream {
                header: None,
                item: (**item).clone(),
            })
        }
        TypeDescriptor::Tuple(elements) => {
            let streams = elements
                .iter()
                .filter(|e| e.sequence_item().is_some())
                .count();

            match streams {
                0 => {
                    if contains_async(unwrapped) {
                        return Err(UnsupportedSignature::new(
                            "async result inside a response tuple",
                        ));
                    }
                    Ok(ResponseKind::Value(unwrapped.clone()))
                }
                1 => {
                    if !is_async {
                        return Err(UnsupportedSignature::new(
                            "a response tuple carrying an async sequence must be wrapped in an async result",
                        ));
                    }

                    let mut header = Vec::with_capacity(elements.len() - 1);
                    let mut item = None;
                    for element in elements {
                        match element.sequence_item() {
                            Some(inner) if !contains_async(inner) => item = Some(inner.clone()),
                            Some(_) => {
                                return Err(UnsupportedSignature::new(
                                    "nested async type in the response stream",
                                ));
                            }
                            None if contains_async(element) => {
                                return Err(UnsupportedSignature::new(
                                    "async result inside a response tuple",
                                ));
                            }
                            None => header.push(element.clone()),
                        }
                    }

                    let item = item.ok_or_else(|| {
                        UnsupportedSignature::new("response tuple lost its async sequence")
                    })?;

                    Ok(ResponseKind::Stream {
                        header: (!header.is_empty()).then_some(header),
                        item,
                    })
                }
                _ => Err(UnsupportedSignature::new(
                    "more than one async sequence in the response",
                )),
            }
        }
        other if contains_async(other) => Err(UnsupportedSignature::new(format!(
            "async type {other} is not supported in the response"
        ))),
        other => Ok(ResponseKind::Value(other.clone())),
    }
}

fn contains_async(ty: &TypeDescriptor) -> bool {
    match ty {
        TypeDescriptor::AsyncResult(_) | TypeDescriptor::AsyncSequence(_) => true,
        TypeDescriptor::Nullable(inner) | TypeDescriptor::Array(inner) => contains_async(inner),
        TypeDescriptor::Tuple(elements) => elements.iter().any(contains_async),
        TypeDescriptor::Named(named) => named.arguments.iter().any(contains_async),
        TypeDescriptor::Void | TypeDescriptor::Primitive(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AsyncResult, AsyncSequence, NamedType, type_of};

    fn classify(method: MethodDescriptor) -> Result<ClassifiedSignature, UnsupportedSignature> {
        SignatureClassifier::default().classify(&method)
    }

    fn cancellation() -> TypeDescriptor {
        TypeDescriptor::named("CancellationToken")
    }

    #[test]
    fn test_unary() {
        let sig = classify(
            MethodDescriptor::new("Ping", type_of::<AsyncResult<String>>())
                .param("x", type_of::<i32>())
                .param("token", cancellation()),
        )
        .unwrap();
        assert_eq!(sig.shape, OperationShape::Unary);
        assert!(sig.is_async);
        assert_eq!(
            sig.bindings,
            vec![
                ParameterBinding {
                    index: 0,
                    role: ParameterRole::HeaderData,
                },
                ParameterBinding {
                    index: 1,
                    role: ParameterRole::Context,
                },
            ]
        );
        assert_eq!(sig.response, ResponseKind::Value(type_of::<String>()));
    }

    #[test]
    fn test_sync_unary_is_not_async() {
        let sig = classify(MethodDescriptor::new("Ping", type_of::<String>())).unwrap();
        assert_eq!(sig.shape, OperationShape::Unary);
        assert!(!sig.is_async);
    }

    #[test]
    fn test_client_streaming() {
        let sig = classify(
            MethodDescriptor::new("Sum", type_of::<AsyncResult<i64>>())
                .param("values", type_of::<AsyncSequence<i32>>()),
        )
        .unwrap();
        assert_eq!(sig.shape, OperationShape::ClientStreaming);
        assert_eq!(sig.request_item, Some(type_of::<i32>()));
        assert_eq!(sig.bindings[0].role, ParameterRole::StreamedValue);
    }

    #[test]
    fn test_server_streaming_with_and_without_wrapper() {
        let wrapped = classify(
            MethodDescriptor::new("Range", type_of::<AsyncResult<AsyncSequence<i32>>>())
                .param("count", type_of::<i32>()),
        )
        .unwrap();
        assert_eq!(wrapped.shape, OperationShape::ServerStreaming);
        assert!(wrapped.is_async);

        let bare = classify(
            MethodDescriptor::new("Range", type_of::<AsyncSequence<i32>>())
                .param("count", type_of::<i32>()),
        )
        .unwrap();
        assert_eq!(bare.shape, OperationShape::ServerStreaming);
        assert!(!bare.is_async);
    }

    #[test]
    fn test_duplex() {
        let sig = classify(
            MethodDescriptor::new("Echo", type_of::<AsyncSequence<String>>())
                .param("prefix", type_of::<String>())
                .param("input", type_of::<AsyncSequence<String>>())
                .param("token", cancellation()),
        )
        .unwrap();
        assert_eq!(sig.shape, OperationShape::DuplexStreaming);
        assert_eq!(
            sig.bindings.iter().map(|b| b.role).collect::<Vec<_>>(),
            vec![
                ParameterRole::HeaderData,
                ParameterRole::StreamedValue,
                ParameterRole::Context
            ]
        );
    }

    #[test]
    fn test_second_stream_parameter_is_rejected() {
        let err = classify(
            MethodDescriptor::new("Merge", type_of::<AsyncResult<()>>())
                .param("a", type_of::<AsyncSequence<i32>>())
                .param("b", type_of::<AsyncSequence<i32>>()),
        )
        .unwrap_err();
        assert!(err.reason.contains("more than one async sequence parameter"));
        assert!(err.to_string().starts_with("signature not supported"));
    }

    #[test]
    fn test_out_and_ref_are_rejected() {
        let out = classify(
            MethodDescriptor::new("Get", type_of::<()>()).out_param("value", type_of::<i32>()),
        );
        assert!(out.is_err());

        let by_ref = classify(
            MethodDescriptor::new("Get", type_of::<()>()).ref_param("value", type_of::<i32>()),
        );
        assert!(by_ref.is_err());
    }

    #[test]
    fn test_generic_method_is_rejected() {
        let err = classify(MethodDescriptor::new("Get", type_of::<i32>()).type_parameter("T"))
            .unwrap_err();
        assert_eq!(err.reason, "generic methods are not supported");
    }

    #[test]
    fn test_tuple_with_stream() {
        let sig = classify(MethodDescriptor::new(
            "Page",
            type_of::<AsyncResult<(i32, AsyncSequence<String>, bool)>>(),
        ))
        .unwrap();
        assert_eq!(sig.shape, OperationShape::ServerStreaming);
        assert_eq!(
            sig.response,
            ResponseKind::Stream {
                header: Some(vec![type_of::<i32>(), type_of::<bool>()]),
                item: type_of::<String>(),
            }
        );
    }

    #[test]
    fn test_unwrapped_tuple_with_stream_is_rejected() {
        let err = classify(MethodDescriptor::new(
            "Page",
            type_of::<(i32, AsyncSequence<String>)>(),
        ))
        .unwrap_err();
        assert!(err.reason.contains("must be wrapped"));
    }

    #[test]
    fn test_tuple_with_two_streams_is_rejected() {
        let err = classify(MethodDescriptor::new(
            "Split",
            type_of::<AsyncResult<(AsyncSequence<i32>, AsyncSequence<i32>)>>(),
        ))
        .unwrap_err();
        assert!(err.reason.contains("more than one async sequence in the response"));
    }

    #[test]
    fn test_plain_tuple_is_a_value() {
        let sig = classify(MethodDescriptor::new("Pair", type_of::<(i32, String)>())).unwrap();
        assert_eq!(sig.shape, OperationShape::Unary);
        assert_eq!(sig.response, ResponseKind::Value(type_of::<(i32, String)>()));
    }

    #[test]
    fn test_nested_async_result_is_rejected() {
        let twice = MethodDescriptor::new("Twice", type_of::<AsyncResult<AsyncResult<i32>>>());
        assert!(classify(twice).is_err());
    }

    #[test]
    fn test_context_matching_through_supertypes() {
        let custom = TypeDescriptor::Named(
            NamedType::new("app.TracingContext").with_supertype("CallContext"),
        );
        let sig = classify(
            MethodDescriptor::new("Ping", type_of::<()>()).param("ctx", custom.clone()),
        )
        .unwrap();
        assert_eq!(sig.bindings[0].role, ParameterRole::Context);

        // with a different configured set the same type is plain header data
        let classifier = SignatureClassifier::new(ContextTypeSet::new(["Deadline"]));
        let sig = classifier
            .classify(&MethodDescriptor::new("Ping", type_of::<()>()).param("ctx", custom))
            .unwrap();
        assert_eq!(sig.bindings[0].role, ParameterRole::HeaderData);
    }
}
