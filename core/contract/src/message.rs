// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Positional message shapes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifiedSignature, ResponseKind};
use crate::interface::MethodDescriptor;
use crate::operation::ParameterRole;
use crate::types::TypeDescriptor;

/// Ordered list of value types carried in one logical envelope
///
/// Equality is positional: two shapes are equal when they have the same
/// length and the same type at every position. Parameter names play no part.
/// An empty shape is the canonical "no payload" message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageShape {
    properties: Vec<TypeDescriptor>,
}

impl MessageShape {
    pub fn new(properties: Vec<TypeDescriptor>) -> Self {
        Self { properties }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Single-property shape
    pub fn of(ty: TypeDescriptor) -> Self {
        Self {
            properties: vec![ty],
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn properties(&self) -> &[TypeDescriptor] {
        &self.properties
    }

    /// Property at a 1-based position
    pub fn property(&self, position: usize) -> Option<&TypeDescriptor> {
        position
            .checked_sub(1)
            .and_then(|index| self.properties.get(index))
    }

    /// External name of the property at a 1-based position
    pub fn property_name(position: usize) -> String {
        format!("Value{position}")
    }

    /// `(position, type)` pairs, positions starting at 1
    pub fn positions(&self) -> impl Iterator<Item = (usize, &TypeDescriptor)> {
        self.properties.iter().enumerate().map(|(i, t)| (i + 1, t))
    }
}

impl fmt::Display for MessageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Message")?;
        if self.properties.is_empty() {
            return Ok(());
        }
        f.write_str("<")?;
        for (i, p) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(">")
    }
}

/// Request and response envelopes of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageShapes {
    pub request: MessageShape,
    pub request_header: Option<MessageShape>,
    pub response: MessageShape,
    pub response_header: Option<MessageShape>,
}

/// Groups classified parameters into positional shapes
pub struct MessageShapeBuilder;

impl MessageShapeBuilder {
    pub fn build(method: &MethodDescriptor, signature: &ClassifiedSignature) -> MessageShapes {
        let header_data: Vec<TypeDescriptor> = signature
            .bindings
            .iter()
            .filter(|b| b.role == ParameterRole::HeaderData)
            .filter_map(|b| method.parameters.get(b.index))
            .map(|p| p.ty.clone())
            .collect();

        let (request, request_header) = match &signature.request_item {
            Some(item) => {
                let header = (!header_data.is_empty()).then(|| MessageShape::new(header_data));
                (MessageShape::of(item.clone()), header)
            }
            None => (MessageShape::new(header_data), None),
        };

        let (response, response_header) = match &signature.response {
            ResponseKind::Empty => (MessageShape::empty(), None),
            ResponseKind::Value(ty) => (MessageShape::of(ty.clone()), None),
            ResponseKind::Stream { header, item } => (
                MessageShape::of(item.clone()),
                header.clone().map(MessageShape::new),
            ),
        };

        MessageShapes {
            request,
            request_header,
            response,
            response_header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SignatureClassifier;
    use crate::types::{AsyncResult, AsyncSequence, type_of};

    #[test]
    fn test_positional_equality() {
        let a = MessageShape::new(vec![type_of::<i32>(), type_of::<String>()]);
        let b = MessageShape::new(vec![type_of::<i32>(), type_of::<String>()]);
        let swapped = MessageShape::new(vec![type_of::<String>(), type_of::<i32>()]);
        assert_eq!(a, b);
        assert_ne!(a, swapped);
        assert_ne!(a, MessageShape::of(type_of::<i32>()));
    }

    #[test]
    fn test_names_do_not_affect_equality() {
        let classifier = SignatureClassifier::default();
        let first = MethodDescriptor::new("A", type_of::<()>())
            .param("count", type_of::<i32>())
            .param("label", type_of::<String>());
        let second = MethodDescriptor::new("B", type_of::<()>())
            .param("x", type_of::<i32>())
            .param("y", type_of::<String>());

        let s1 = MessageShapeBuilder::build(&first, &classifier.classify(&first).unwrap());
        let s2 = MessageShapeBuilder::build(&second, &classifier.classify(&second).unwrap());
        assert_eq!(s1.request, s2.request);
        assert!(s1.response.is_empty());
    }

    #[test]
    fn test_positions_are_one_based() {
        let shape = MessageShape::new(vec![type_of::<i32>(), type_of::<bool>()]);
        assert_eq!(shape.property(0), None);
        assert_eq!(shape.property(1), Some(&type_of::<i32>()));
        assert_eq!(shape.property(2), Some(&type_of::<bool>()));
        assert_eq!(shape.property(3), None);
        assert_eq!(MessageShape::property_name(2), "Value2");
        let positions: Vec<usize> = shape.positions().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_streamed_request_moves_header_data_out_of_the_body() {
        let classifier = SignatureClassifier::default();
        let method = MethodDescriptor::new("Upload", type_of::<AsyncResult<i64>>())
            .param("name", type_of::<String>())
            .param("chunks", type_of::<AsyncSequence<Vec<u8>>>())
            .param("token", TypeDescriptor::named("CancellationToken"));

        let shapes = MessageShapeBuilder::build(&method, &classifier.classify(&method).unwrap());
        assert_eq!(shapes.request, MessageShape::of(type_of::<Vec<u8>>()));
        assert_eq!(
            shapes.request_header,
            Some(MessageShape::of(type_of::<String>()))
        );
        assert_eq!(shapes.response, MessageShape::of(type_of::<i64>()));
        assert_eq!(shapes.response_header, None);
    }

    #[test]
    fn test_stream_without_header_data_has_no_header() {
        let classifier = SignatureClassifier::default();
        let method = MethodDescriptor::new("Echo", type_of::<AsyncSequence<String>>())
            .param("input", type_of::<AsyncSequence<String>>());

        let shapes = MessageShapeBuilder::build(&method, &classifier.classify(&method).unwrap());
        assert_eq!(shapes.request_header, None);
        assert_eq!(shapes.response_header, None);
    }

    #[test]
    fn test_tuple_response_header() {
        let classifier = SignatureClassifier::default();
        let method = MethodDescriptor::new(
            "Range",
            type_of::<AsyncResult<(i32, String, AsyncSequence<i64>)>>(),
        )
        .param("count", type_of::<i32>());

        let shapes = MessageShapeBuilder::build(&method, &classifier.classify(&method).unwrap());
        assert_eq!(shapes.request, MessageShape::of(type_of::<i32>()));
        assert_eq!(shapes.response, MessageShape::of(type_of::<i64>()));
        assert_eq!(
            shapes.response_header,
            Some(MessageShape::new(vec![type_of::<i32>(), type_of::<String>()]))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageShape::empty().to_string(), "Message");
        assert_eq!(
            MessageShape::new(vec![type_of::<i32>(), type_of::<String>()]).to_string(),
            "Message<Int32, String>"
        );
    }
}
