//! Data set encoding strategy
//!
//! The SCP accepts exactly one transfer syntax. It is injected as an [`ObjectCodec`] so
//! that the session never depends on a particular encoding.

use std::fmt;

use dicom_dictionary_std::tags;
use dicom_encoding::transfer_syntax::{TransferSyntax, TransferSyntaxIndex};
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use thiserror::Error;

/// Implicit VR Little Endian, the default DICOM transfer syntax
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";

/// Errors raised while decoding or encoding a data set
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to decode data set: {0}")]
    Decode(String),

    #[error("Failed to encode data set: {0}")]
    Encode(String),

    #[error("Unknown transfer syntax: {0}")]
    UnknownTransferSyntax(String),
}

/// Encoding used for objects exchanged on an association
pub trait ObjectCodec: Send + Sync + fmt::Debug {
    /// UID of the transfer syntax this codec reads and writes
    fn transfer_syntax_uid(&self) -> &str;

    /// Decode a complete data set
    fn decode(&self, bytes: &[u8]) -> Result<InMemDicomObject, CodecError>;

    /// Encode a data set
    fn encode(&self, object: &InMemDicomObject) -> Result<Vec<u8>, CodecError>;
}

/// [`ObjectCodec`] backed by a transfer syntax from the dicom-rs registry
#[derive(Clone, Copy)]
pub struct TransferSyntaxCodec {
    ts: &'static TransferSyntax,
}

impl TransferSyntaxCodec {
    /// Codec for Implicit VR Little Endian
    pub fn implicit_vr_little_endian() -> Self {
        Self::from_uid(IMPLICIT_VR_LITTLE_ENDIAN)
            .expect("Implicit VR Little Endian is always registered")
    }

    /// Look up a codec by transfer syntax UID
    pub fn from_uid(uid: &str) -> Result<Self, CodecError> {
        let uid = uid.trim_end_matches(['\0', ' ']);
        let registry: &'static TransferSyntaxRegistry = &TransferSyntaxRegistry;
        registry
            .get(uid)
            .map(|ts| Self { ts })
            .ok_or_else(|| CodecError::UnknownTransferSyntax(uid.to_string()))
    }
}

impl Default for TransferSyntaxCodec {
    fn default() -> Self {
        Self::implicit_vr_little_endian()
    }
}

impl fmt::Debug for TransferSyntaxCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSyntaxCodec")
            .field("uid", &self.ts.uid())
            .field("name", &self.ts.name())
            .finish()
    }
}

impl ObjectCodec for TransferSyntaxCodec {
    fn transfer_syntax_uid(&self) -> &str {
        self.ts.uid()
    }

    fn decode(&self, bytes: &[u8]) -> Result<InMemDicomObject, CodecError> {
        InMemDicomObject::read_dataset_with_ts(bytes, self.ts)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(&self, object: &InMemDicomObject) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        object
            .write_dataset_with_ts(&mut out, self.ts)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out)
    }
}

/// Extract the SOP Instance UID of a decoded object
///
/// Returns an empty string when the element is missing or not textual, so that a
/// parseable but incomplete object never ends the association.
pub fn extract_identifier(object: &InMemDicomObject) -> String {
    read_uid(object, tags::SOP_INSTANCE_UID).unwrap_or_default()
}

/// Read a UID element, with trailing padding removed
pub(crate) fn read_uid(object: &InMemDicomObject, tag: dicom_core::Tag) -> Option<String> {
    object
        .element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
        .filter(|s| !s.is_empty())
}
