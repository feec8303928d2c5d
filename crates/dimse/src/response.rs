//! Acknowledgements sent back after each received message

use dicom_core::{dicom_value, DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;

use crate::codec::ObjectCodec;
use crate::pdu::{command_value, PDataValue, PDV_HEADER_SIZE};
use crate::types::{CommandSet, DimseCommand, DimseStatus, NO_DATA_SET};
use crate::Result;

/// Response command set for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub command: DimseCommand,
    pub status: DimseStatus,
    pub message_id_being_responded_to: u16,
    pub affected_sop_class_uid: Option<String>,
    pub affected_sop_instance_uid: Option<String>,
}

/// Successful C-STORE acknowledgement with no echoed identifiers
pub fn build_success() -> Acknowledgement {
    Acknowledgement {
        command: DimseCommand::Store,
        status: DimseStatus::Success,
        message_id_being_responded_to: 0,
        affected_sop_class_uid: None,
        affected_sop_instance_uid: None,
    }
}

impl Acknowledgement {
    /// Echo the identifiers of the request being answered
    pub fn responding_to(mut self, request: &CommandSet) -> Self {
        self.command = request.command;
        self.message_id_being_responded_to = request.message_id;
        if request.affected_sop_class_uid.is_some() {
            self.affected_sop_class_uid = request.affected_sop_class_uid.clone();
        }
        if request.affected_sop_instance_uid.is_some() {
            self.affected_sop_instance_uid = request.affected_sop_instance_uid.clone();
        }
        self
    }

    pub fn with_status(mut self, status: DimseStatus) -> Self {
        self.status = status;
        self
    }

    /// Fill in affected SOP UIDs that the request did not carry
    pub fn with_fallback_uids(
        mut self,
        sop_class_uid: Option<String>,
        sop_instance_uid: Option<String>,
    ) -> Self {
        if self.affected_sop_class_uid.is_none() {
            self.affected_sop_class_uid = sop_class_uid;
        }
        if self.affected_sop_instance_uid.is_none() {
            self.affected_sop_instance_uid = sop_instance_uid;
        }
        self
    }

    /// Build the response command set
    pub fn to_object(&self) -> InMemDicomObject {
        let mut elements = Vec::with_capacity(6);
        if let Some(uid) = &self.affected_sop_class_uid {
            elements.push(DataElement::new(
                tags::AFFECTED_SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(uid.as_str()),
            ));
        }
        elements.push(DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_value!(U16, [self.command.response_field()]),
        ));
        elements.push(DataElement::new(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            VR::US,
            dicom_value!(U16, [self.message_id_being_responded_to]),
        ));
        elements.push(DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [NO_DATA_SET]),
        ));
        elements.push(DataElement::new(
            tags::STATUS,
            VR::US,
            dicom_value!(U16, [self.status.code()]),
        ));
        if let Some(uid) = &self.affected_sop_instance_uid {
            elements.push(DataElement::new(
                tags::AFFECTED_SOP_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(uid.as_str()),
            ));
        }
        InMemDicomObject::command_from_element_iter(elements)
    }
}

/// Encode an acknowledgement as a single, final command fragment
pub fn to_fragment(
    ack: &Acknowledgement,
    presentation_context_id: u8,
    codec: &dyn ObjectCodec,
) -> Result<PDataValue> {
    let bytes = codec.encode(&ack.to_object())?;
    Ok(command_value(presentation_context_id, bytes, true))
}

/// Split a fragment so that every P-DATA-TF stays within the peer's maximum PDU length
///
/// A `max_pdu_length` of zero means the peer accepts any length.
pub fn split_fragment(fragment: PDataValue, max_pdu_length: u32) -> Vec<PDataValue> {
    let max_chunk = max_pdu_length.saturating_sub(PDV_HEADER_SIZE) as usize;
    if max_pdu_length == 0 || max_chunk == 0 || fragment.data.len() <= max_chunk {
        return vec![fragment];
    }

    let chunks = fragment.data.chunks(max_chunk);
    let count = chunks.len();
    chunks
        .enumerate()
        .map(|(i, chunk)| PDataValue {
            presentation_context_id: fragment.presentation_context_id,
            value_type: fragment.value_type.clone(),
            is_last: i + 1 == count && fragment.is_last,
            data: chunk.to_vec(),
        })
        .collect()
}
