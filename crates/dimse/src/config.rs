//! Configuration types for DIMSE services

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::codec::{TransferSyntaxCodec, IMPLICIT_VR_LITTLE_ENDIAN};
use crate::error::{DimseError, Result};
use crate::reassembler::DEFAULT_MAX_OBJECT_SIZE;
use crate::DEFAULT_DIMSE_PORT;

/// Implementation class UID announced during association negotiation
pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.10.1078.1";

/// Implementation version name announced during association negotiation
pub const IMPLEMENTATION_VERSION_NAME: &str = "HARMONY_STORE_02";

/// Configuration for the storage SCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimseConfig {
    /// Local Application Entity Title
    pub local_aet: String,

    /// Bind address for SCP listener
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    /// Port for SCP listener
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum PDU size in bytes we are willing to receive
    #[serde(default = "default_max_pdu")]
    pub max_pdu: u32,

    /// Reject associations from peers that are not listed in `allowed_peers`,
    /// or that call a different AE title than `local_aet`
    #[serde(default)]
    pub strict: bool,

    /// Calling AE titles accepted when `strict` is enabled
    #[serde(default)]
    pub allowed_peers: Vec<String>,

    /// Maximum number of concurrent associations
    #[serde(default = "default_max_associations")]
    pub max_associations: u32,

    /// Idle time allowed between two PDUs, in milliseconds
    #[serde(default = "default_association_timeout")]
    pub association_timeout_ms: u64,

    /// Time allowed to write one PDU, in milliseconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// Largest data set accepted in a single message, in bytes
    #[serde(default = "default_max_object_size")]
    pub max_object_size: usize,

    /// The single transfer syntax accepted for data sets
    #[serde(default = "default_transfer_syntax")]
    pub transfer_syntax: String,

    #[serde(default = "default_implementation_class_uid")]
    pub implementation_class_uid: String,

    #[serde(default = "default_implementation_version_name")]
    pub implementation_version_name: String,

    /// Enable C-ECHO service
    #[serde(default = "default_true")]
    pub enable_echo: bool,
}

impl Default for DimseConfig {
    fn default() -> Self {
        Self {
            local_aet: "HARMONY_SCP".to_string(),
            bind_addr: default_bind_addr(),
            port: default_port(),
            max_pdu: default_max_pdu(),
            strict: false,
            allowed_peers: Vec::new(),
            max_associations: default_max_associations(),
            association_timeout_ms: default_association_timeout(),
            write_timeout_ms: default_write_timeout(),
            max_object_size: default_max_object_size(),
            transfer_syntax: default_transfer_syntax(),
            implementation_class_uid: default_implementation_class_uid(),
            implementation_version_name: default_implementation_version_name(),
            enable_echo: true,
        }
    }
}

impl DimseConfig {
    /// Socket address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Get association idle timeout as Duration
    pub fn association_timeout(&self) -> Duration {
        Duration::from_millis(self.association_timeout_ms)
    }

    /// Get write timeout as Duration
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Whether a calling AE title is listed in `allowed_peers`
    pub fn is_allowed_peer(&self, calling_aet: &str) -> bool {
        self.allowed_peers
            .iter()
            .any(|peer| peer.trim() == calling_aet.trim())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_ae_title(&self.local_aet)?;
        for peer in &self.allowed_peers {
            validate_ae_title(peer)?;
        }

        // Validate PDU size
        if self.max_pdu < 16384 || self.max_pdu > 131072 {
            return Err(DimseError::config(
                "Max PDU size must be between 16384 and 131072 bytes",
            ));
        }

        if self.max_associations == 0 {
            return Err(DimseError::config("Max associations must be greater than 0"));
        }

        if self.association_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(DimseError::config("Timeouts must be greater than 0"));
        }

        if self.max_object_size == 0 {
            return Err(DimseError::config("Max object size must be greater than 0"));
        }

        TransferSyntaxCodec::from_uid(&self.transfer_syntax)
            .map_err(|e| DimseError::config(e.to_string()))?;

        Ok(())
    }
}

/// Check that an AE title is 1-16 printable characters without backslashes
pub fn validate_ae_title(title: &str) -> Result<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() || title.len() > 16 {
        return Err(DimseError::InvalidAeTitle(format!(
            "'{}' must be 1-16 characters",
            title
        )));
    }
    if title.chars().any(|c| c == '\\' || c.is_control()) {
        return Err(DimseError::InvalidAeTitle(format!(
            "'{}' contains a backslash or control character",
            title
        )));
    }
    Ok(())
}

// Default value functions
fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    DEFAULT_DIMSE_PORT
}

fn default_max_pdu() -> u32 {
    65536
}

fn default_max_associations() -> u32 {
    10
}

fn default_association_timeout() -> u64 {
    300_000 // 5 minutes
}

fn default_write_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_max_object_size() -> usize {
    DEFAULT_MAX_OBJECT_SIZE
}

fn default_transfer_syntax() -> String {
    IMPLICIT_VR_LITTLE_ENDIAN.to_string()
}

fn default_implementation_class_uid() -> String {
    IMPLEMENTATION_CLASS_UID.to_string()
}

fn default_implementation_version_name() -> String {
    IMPLEMENTATION_VERSION_NAME.to_string()
}

fn default_true() -> bool {
    true
}
