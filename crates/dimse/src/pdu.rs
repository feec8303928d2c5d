//! DICOM upper layer protocol data units (PS3.8 section 9.3)
//!
//! The PDU model and its wire format come from `dicom-ul`. [`PduCodec`] only frames them
//! on a byte stream so that associations can run on `tokio_util::codec::Framed`.

use bytes::{Buf, BytesMut};
use dicom_ul::pdu::{read_pdu, write_pdu, MINIMUM_PDU_SIZE, PDU_HEADER_SIZE};
use tokio_util::codec::{Decoder, Encoder};

use crate::{DimseError, Result};

pub use dicom_ul::pdu::{
    AbortRQServiceProviderReason, AbortRQSource, AssociationAC, AssociationRJ,
    AssociationRJResult, AssociationRJServiceProviderASCEReason,
    AssociationRJServiceProviderPresentationReason, AssociationRJServiceUserReason,
    AssociationRJSource, AssociationRQ, PDataValue, PDataValueType, Pdu,
    PresentationContextProposed, PresentationContextResult, PresentationContextResultReason,
    UserVariableItem, PDV_HEADER_SIZE,
};

/// Upper layer protocol version bit
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// DICOM application context name
pub const APPLICATION_CONTEXT_NAME: &str = "1.2.840.10008.3.1.1.1";

const PDU_HEADER_LEN: usize = PDU_HEADER_SIZE as usize;

/// Data set fragment for a presentation context
pub fn data_value(
    presentation_context_id: u8,
    data: impl Into<Vec<u8>>,
    is_last: bool,
) -> PDataValue {
    PDataValue {
        presentation_context_id,
        value_type: PDataValueType::Data,
        is_last,
        data: data.into(),
    }
}

/// Command set fragment for a presentation context
pub fn command_value(
    presentation_context_id: u8,
    data: impl Into<Vec<u8>>,
    is_last: bool,
) -> PDataValue {
    PDataValue {
        presentation_context_id,
        value_type: PDataValueType::Command,
        is_last,
        data: data.into(),
    }
}

/// Maximum PDU length announced in the user information of a request
pub fn requested_max_pdu_length(rq: &AssociationRQ) -> Option<u32> {
    rq.user_variables.iter().find_map(|item| match item {
        UserVariableItem::MaxLength(length) => Some(*length),
        _ => None,
    })
}

/// Length-delimited codec for upper layer PDUs
#[derive(Debug, Clone)]
pub struct PduCodec {
    max_pdu_length: u32,
}

impl PduCodec {
    /// Create a codec rejecting inbound PDUs whose variable field exceeds `max_pdu_length`
    ///
    /// Values below the upper layer minimum are raised to it.
    pub fn new(max_pdu_length: u32) -> Self {
        Self {
            max_pdu_length: max_pdu_length.max(MINIMUM_PDU_SIZE),
        }
    }

    pub fn max_pdu_length(&self) -> u32 {
        self.max_pdu_length
    }
}

impl Decoder for PduCodec {
    type Item = Pdu;
    type Error = DimseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Pdu>> {
        if src.len() < PDU_HEADER_LEN {
            return Ok(None);
        }

        let mut header = &src[2..PDU_HEADER_LEN];
        let length = header.get_u32();
        if length > self.max_pdu_length {
            return Err(DimseError::malformed(format!(
                "PDU length {} exceeds maximum {}",
                length, self.max_pdu_length
            )));
        }

        let total = PDU_HEADER_LEN + length as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        // read_pdu consumes what it is given, so only hand it a whole frame
        let frame = src.split_to(total).freeze();
        match read_pdu(frame, self.max_pdu_length, true) {
            Ok(Some(pdu)) => Ok(Some(pdu)),
            Ok(None) => Err(DimseError::malformed("truncated PDU")),
            Err(e) => Err(DimseError::malformed(e.to_string())),
        }
    }
}

impl Encoder<Pdu> for PduCodec {
    type Error = DimseError;

    fn encode(&mut self, pdu: Pdu, dst: &mut BytesMut) -> Result<()> {
        let mut buffer = Vec::new();
        write_pdu(&mut buffer, &pdu).map_err(|e| DimseError::PduWrite(e.to_string()))?;
        dst.extend_from_slice(&buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn encode(pdu: Pdu) -> BytesMut {
        let mut buf = BytesMut::new();
        PduCodec::new(16384).encode(pdu, &mut buf).unwrap();
        buf
    }

    fn sample_rq() -> AssociationRQ {
        AssociationRQ {
            protocol_version: PROTOCOL_VERSION,
            calling_ae_title: "MODALITY".to_string(),
            called_ae_title: "HARMONY_SCP".to_string(),
            application_context_name: APPLICATION_CONTEXT_NAME.to_string(),
            presentation_contexts: vec![PresentationContextProposed {
                id: 1,
                abstract_syntax: "1.2.840.10008.5.1.4.1.1.7".to_string(),
                transfer_syntaxes: vec![
                    "1.2.840.10008.1.2.1".to_string(),
                    "1.2.840.10008.1.2".to_string(),
                ],
            }],
            user_variables: vec![UserVariableItem::MaxLength(32768)],
        }
    }

    #[test]
    fn test_association_rq_is_framed_whole() {
        let mut buf = encode(Pdu::AssociationRQ(sample_rq()));
        assert_eq!(buf[0], 0x01);
        let length = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        assert_eq!(length, buf.len() - PDU_HEADER_LEN);

        match PduCodec::new(16384).decode(&mut buf).unwrap() {
            Some(Pdu::AssociationRQ(rq)) => {
                assert_eq!(rq.calling_ae_title, "MODALITY");
                assert_eq!(rq.called_ae_title, "HARMONY_SCP");
                assert_eq!(rq.presentation_contexts.len(), 1);
                assert_eq!(requested_max_pdu_length(&rq), Some(32768));
            }
            other => panic!("Expected A-ASSOCIATE-RQ, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_pdata_message_control_header() {
        let buf = encode(Pdu::PData {
            data: vec![command_value(3, &b"CMD"[..], true)],
        });
        // header, item length, context id, message control header
        assert_eq!(&buf[6..10], &5u32.to_be_bytes());
        assert_eq!(buf[10], 3);
        assert_eq!(buf[11], 0x03);
        assert_eq!(&buf[12..], b"CMD");
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let full = encode(Pdu::PData {
            data: vec![data_value(1, &b"AB"[..], false), data_value(1, &b"CD"[..], true)],
        });
        let mut codec = PduCodec::new(16384);
        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert_eq!(codec.decode(&mut partial).unwrap(), None);
        assert_eq!(partial.len(), full.len() - 1);

        partial.extend_from_slice(&full[full.len() - 1..]);
        match codec.decode(&mut partial).unwrap() {
            Some(Pdu::PData { data }) => {
                assert_eq!(data.len(), 2);
                assert_eq!(data[0].value_type, PDataValueType::Data);
                assert!(!data[0].is_last);
                assert!(data[1].is_last);
                assert_eq!(&data[1].data[..], b"CD");
            }
            other => panic!("Expected P-DATA-TF, got {:?}", other),
        }
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut buf = encode(Pdu::ReleaseRQ);
        buf.extend_from_slice(&encode(Pdu::ReleaseRP));
        let mut codec = PduCodec::new(16384);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Pdu::ReleaseRQ));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Pdu::ReleaseRP));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversized_pdu_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x04);
        buf.put_u8(0);
        buf.put_u32(1_000_000);
        let err = PduCodec::new(16384).decode(&mut buf).unwrap_err();
        assert!(matches!(err, DimseError::MalformedPdu(_)));
    }

    #[test]
    fn test_small_limit_is_raised_to_minimum() {
        assert_eq!(PduCodec::new(0).max_pdu_length(), MINIMUM_PDU_SIZE);
    }

    #[test]
    fn test_control_pdus() {
        let mut codec = PduCodec::new(16384);
        for pdu in [
            Pdu::ReleaseRQ,
            Pdu::ReleaseRP,
            Pdu::AbortRQ {
                source: AbortRQSource::ServiceProvider(
                    AbortRQServiceProviderReason::UnexpectedPdu,
                ),
            },
            Pdu::AssociationRJ(AssociationRJ {
                result: AssociationRJResult::Permanent,
                source: AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CallingAETitleNotRecognized,
                ),
            }),
        ] {
            let mut buf = encode(pdu.clone());
            assert_eq!(codec.decode(&mut buf).unwrap(), Some(pdu));
        }
    }

    #[test]
    fn test_unknown_pdu_type_is_preserved() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x09);
        buf.put_u8(0);
        buf.put_u32(2);
        buf.put_slice(&[0xAA, 0xBB]);
        let pdu = PduCodec::new(16384).decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            pdu,
            Pdu::Unknown {
                pdu_type: 0x09,
                data: vec![0xAA, 0xBB],
            }
        );
    }
}
