//! Common types for DIMSE operations

use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;

use crate::codec::{read_uid, ObjectCodec};
use crate::Result;

/// CommandDataSetType value meaning "no data set follows"
pub const NO_DATA_SET: u16 = 0x0101;

/// Status codes used by this SCP (PS3.7 annex C)
pub mod status {
    pub const SUCCESS: u16 = 0x0000;
    pub const PROCESSING_FAILURE: u16 = 0x0110;
    pub const UNRECOGNIZED_OPERATION: u16 = 0x0211;
    pub const OUT_OF_RESOURCES: u16 = 0xA700;
    pub const CANNOT_UNDERSTAND: u16 = 0xC000;
}

/// DIMSE command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseCommand {
    /// C-STORE command
    Store,
    /// C-ECHO command
    Echo,
    /// Any other command field, carried verbatim
    Other(u16),
}

impl DimseCommand {
    const STORE_RQ: u16 = 0x0001;
    const ECHO_RQ: u16 = 0x0030;
    const RESPONSE_BIT: u16 = 0x8000;

    /// Identify a request from its command field
    pub fn from_request_field(field: u16) -> Self {
        match field {
            Self::STORE_RQ => DimseCommand::Store,
            Self::ECHO_RQ => DimseCommand::Echo,
            other => DimseCommand::Other(other),
        }
    }

    /// Command field of the request
    pub fn request_field(self) -> u16 {
        match self {
            DimseCommand::Store => Self::STORE_RQ,
            DimseCommand::Echo => Self::ECHO_RQ,
            DimseCommand::Other(field) => field & !Self::RESPONSE_BIT,
        }
    }

    /// Command field of the matching response
    pub fn response_field(self) -> u16 {
        self.request_field() | Self::RESPONSE_BIT
    }
}

/// DIMSE operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimseStatus {
    /// Operation completed successfully
    Success,
    /// Operation is pending (more responses to follow)
    Pending,
    /// Operation cancelled by user
    Cancel,
    /// Operation failed with error
    Failure(u16), // DICOM status code
    /// Warning occurred during operation
    Warning(u16), // DICOM status code
}

impl DimseStatus {
    /// Wire value of the status
    pub fn code(self) -> u16 {
        match self {
            DimseStatus::Success => status::SUCCESS,
            DimseStatus::Pending => 0xFF00,
            DimseStatus::Cancel => 0xFE00,
            DimseStatus::Failure(code) | DimseStatus::Warning(code) => code,
        }
    }

    /// Classify a wire status value
    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => DimseStatus::Success,
            0xFF00 | 0xFF01 => DimseStatus::Pending,
            0xFE00 => DimseStatus::Cancel,
            0x0001 | 0x0107 | 0x0116 | 0xB000..=0xBFFF => DimseStatus::Warning(code),
            _ => DimseStatus::Failure(code),
        }
    }

    /// Whether the status reports success, including warnings
    pub fn is_successful(self) -> bool {
        matches!(self, DimseStatus::Success | DimseStatus::Warning(_))
    }
}

/// Fields of a received command set that the SCP acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    pub command: DimseCommand,
    pub message_id: u16,
    pub affected_sop_class_uid: Option<String>,
    pub affected_sop_instance_uid: Option<String>,
    pub has_data_set: bool,
}

impl CommandSet {
    /// Decode a command set; command sets are always Implicit VR Little Endian
    pub fn decode(bytes: &[u8], codec: &dyn ObjectCodec) -> Result<Self> {
        let object = codec.decode(bytes)?;
        Ok(Self::from_object(&object))
    }

    /// Read the command fields from a decoded command object
    ///
    /// Missing fields fall back to zero/absent rather than failing.
    pub fn from_object(object: &InMemDicomObject) -> Self {
        let read_u16 = |tag| {
            object
                .element(tag)
                .ok()
                .and_then(|e| e.to_int::<u16>().ok())
        };

        Self {
            command: DimseCommand::from_request_field(
                read_u16(tags::COMMAND_FIELD).unwrap_or_default(),
            ),
            message_id: read_u16(tags::MESSAGE_ID).unwrap_or_default(),
            affected_sop_class_uid: read_uid(object, tags::AFFECTED_SOP_CLASS_UID),
            affected_sop_instance_uid: read_uid(object, tags::AFFECTED_SOP_INSTANCE_UID),
            has_data_set: read_u16(tags::COMMAND_DATA_SET_TYPE)
                .map(|value| value != NO_DATA_SET)
                .unwrap_or(false),
        }
    }
}
