//! DIMSE (DICOM Message Service Element) storage SCP
//!
//! This crate accepts DICOM upper layer associations over TCP and receives objects
//! sent with C-STORE. Each completed object is decoded, handed to a [`StoreHandler`]
//! and acknowledged before the next message on the same association is read.
//!
//! # Features
//! - Association negotiation with optional strict AE title checks
//! - Reassembly of objects split across any number of P-DATA-TF fragments
//! - C-STORE and C-ECHO, one transfer syntax per SCP
//! - One task per association, with a concurrency limit and idle timeouts
//!
//! ```no_run
//! use dimse::{serve, Result};
//! use dicom_object::InMemDicomObject;
//!
//! # async fn example() -> Result<()> {
//! let on_object = |_object: InMemDicomObject, identifier: String| -> Result<()> {
//!     println!("received {}", identifier);
//!     Ok(())
//! };
//! serve("0.0.0.0:11112".parse().unwrap(), "STORE_SCP", 16384, on_object).await
//! # }
//! ```

pub mod association;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod pdu;
pub mod reassembler;
pub mod response;
pub mod scp;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use codec::{extract_identifier, CodecError, ObjectCodec, TransferSyntaxCodec};
pub use config::DimseConfig;
pub use error::{DimseError, Result};
pub use handler::StoreHandler;
pub use pdu::{command_value, data_value, PDataValue, PDataValueType, Pdu, PduCodec};
pub use reassembler::{accumulate, Reassembler};
pub use response::{build_success, Acknowledgement};
pub use scp::{serve, DimseScp};
pub use session::{
    AssociationState, ObjectOutcome, ProtocolUnit, SessionEnd, SessionSummary,
    OVER_CAPACITY_NEGOTIATION_TIMEOUT,
};
pub use types::{CommandSet, DimseCommand, DimseStatus};

/// Default DICOM port (non-TLS)
pub const DEFAULT_DIMSE_PORT: u16 = 11112;
