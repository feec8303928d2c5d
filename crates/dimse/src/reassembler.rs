//! Reassembly of command and data set fragments into complete messages

use bytes::{Bytes, BytesMut};

use crate::pdu::{PDataValue, PDataValueType};
use crate::{DimseError, Result};

/// Default ceiling on the size of a single reassembled data set
pub const DEFAULT_MAX_OBJECT_SIZE: usize = 512 * 1024 * 1024;

/// Ceiling on the size of a reassembled command set
///
/// Command sets only carry a handful of short elements, so this is far above anything a
/// conforming peer sends.
pub const MAX_COMMAND_SET_SIZE: usize = 64 * 1024;

/// Concatenate the data set fragments of one unit, in delivery order
///
/// Command fragments are skipped. An empty result means the unit carried no data set
/// bytes and nothing should be decoded.
pub fn accumulate<'a>(fragments: impl IntoIterator<Item = &'a PDataValue>) -> Bytes {
    accumulate_kind(fragments, PDataValueType::Data)
}

/// Concatenate the fragments of the given kind, in delivery order
pub fn accumulate_kind<'a>(
    fragments: impl IntoIterator<Item = &'a PDataValue>,
    kind: PDataValueType,
) -> Bytes {
    let mut buffer = BytesMut::new();
    for fragment in fragments.into_iter().filter(|f| f.value_type == kind) {
        buffer.extend_from_slice(&fragment.data);
    }
    buffer.freeze()
}

/// Messages completed by a unit
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UnitOutcome {
    /// Complete command set
    pub command: Option<Bytes>,
    /// Complete, non-empty data set
    pub data: Option<Bytes>,
    /// Presentation context of the last fragment seen in the unit
    pub presentation_context_id: Option<u8>,
}

/// Per-association reassembly buffers
///
/// Holds at most one in-flight command set and one in-flight data set. A buffer is
/// complete when a fragment of its kind carries the last-fragment flag; the next
/// fragment of that kind starts a new message.
#[derive(Debug)]
pub struct Reassembler {
    command: BytesMut,
    data: BytesMut,
    max_object_size: usize,
}

impl Reassembler {
    pub fn new(max_object_size: usize) -> Self {
        Self {
            command: BytesMut::new(),
            data: BytesMut::new(),
            max_object_size,
        }
    }

    /// Feed the fragments of one P-DATA-TF unit
    ///
    /// Fails with [`DimseError::MessageTooLarge`] once either buffer would grow past its
    /// ceiling. The partial message is dropped in that case.
    pub fn push_unit(&mut self, fragments: &[PDataValue]) -> Result<UnitOutcome> {
        let mut outcome = UnitOutcome {
            presentation_context_id: fragments.last().map(|f| f.presentation_context_id),
            ..Default::default()
        };

        let chunk = accumulate_kind(fragments, PDataValueType::Command);
        let command_limit = self.max_command_size();
        let size = self.command.len() + chunk.len();
        if size > command_limit {
            self.reset();
            return Err(DimseError::MessageTooLarge {
                size,
                limit: command_limit,
            });
        }
        self.command.extend_from_slice(&chunk);
        if has_last(fragments, PDataValueType::Command) {
            outcome.command = Some(self.command.split().freeze());
        }

        let chunk = accumulate(fragments);
        let size = self.data.len() + chunk.len();
        if size > self.max_object_size {
            self.reset();
            return Err(DimseError::MessageTooLarge {
                size,
                limit: self.max_object_size,
            });
        }
        self.data.extend_from_slice(&chunk);
        if has_last(fragments, PDataValueType::Data) {
            let data = self.data.split().freeze();
            if !data.is_empty() {
                outcome.data = Some(data);
            }
        }

        Ok(outcome)
    }

    fn max_command_size(&self) -> usize {
        MAX_COMMAND_SET_SIZE.min(self.max_object_size)
    }

    /// Discard any partially received message
    pub fn reset(&mut self) {
        self.command.clear();
        self.data.clear();
    }

    /// Whether no message is partially received
    pub fn is_idle(&self) -> bool {
        self.command.is_empty() && self.data.is_empty()
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OBJECT_SIZE)
    }
}

fn has_last(fragments: &[PDataValue], kind: PDataValueType) -> bool {
    fragments.iter().any(|f| f.value_type == kind && f.is_last)
}
