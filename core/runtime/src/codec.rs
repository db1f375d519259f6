// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Header marshalling
//!
//! Request and response headers travel in call metadata rather than in the
//! message stream. A [`Marshaller`] turns a header [`Message`] into the bytes
//! stored under [`HEADER_KEY`].

use crate::metadata::Metadata;
use crate::status::Status;
use crate::value::Message;

/// Metadata key carrying an encoded header message
pub const HEADER_KEY: &str = "shaperpc-header-bin";

pub trait Marshaller: Send + Sync {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, Status>;

    fn decode(&self, bytes: &[u8]) -> Result<Message, Status>;

    /// Stores `header` in `metadata`
    fn write_header(&self, metadata: &mut Metadata, header: &Message) -> Result<(), Status> {
        let bytes = self.encode(header)?;
        metadata.insert_bin(HEADER_KEY, bytes);
        Ok(())
    }

    /// Reads the header stored in `metadata`, if any
    fn read_header(&self, metadata: &Metadata) -> Result<Option<Message>, Status> {
        metadata
            .get_bin(HEADER_KEY)
            .map(|bytes| self.decode(bytes))
            .transpose()
    }
}

/// bincode (serde mode, standard configuration)
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeMarshaller;

impl Marshaller for BincodeMarshaller {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, Status> {
        bincode::serde::encode_to_vec(message, bincode::config::standard())
            .map_err(|e| Status::internal(format!("failed to encode header: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message, Status> {
        let (message, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| Status::invalid_argument(format!("failed to decode header: {e}")))?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message;
    use crate::status::Code;
    use crate::value::Value;

    #[test]
    fn test_header_through_metadata() {
        let marshaller = BincodeMarshaller;
        let header = message![42i32, "label", Option::<bool>::None, vec![1.5f64, 2.5]];

        let mut md = Metadata::new();
        assert_eq!(marshaller.read_header(&md).unwrap(), None);

        marshaller.write_header(&mut md, &header).unwrap();
        assert!(md.get_bin(HEADER_KEY).is_some());
        assert_eq!(marshaller.read_header(&md).unwrap(), Some(header));
    }

    #[test]
    fn test_corrupt_header_is_invalid_argument() {
        let mut md = Metadata::new();
        md.insert_bin(HEADER_KEY, vec![0xff, 0xff, 0xff]);
        let err = BincodeMarshaller.read_header(&md).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_struct_values() {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("name".to_string(), Value::String("x".into()));
        let msg = Message::new(vec![Value::Struct(fields)]);
        let bytes = BincodeMarshaller.encode(&msg).unwrap();
        assert_eq!(BincodeMarshaller.decode(&bytes).unwrap(), msg);
    }
}
