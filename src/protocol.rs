//! Wire protocol types.
//!
//! Every message on the wire is one newline-terminated JSON object.
//! Outbound: `login_req`, `ping`, `event_ack`, and the two remote-control
//! request shapes. Inbound: `event_push` carries a delivery identifier that
//! must be acknowledged; any other command passes through opaquely to the
//! consumer.

use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::constants::{CMD_EVENT_ACK, CMD_EVENT_PUSH, CMD_LOGIN_REQ};
use crate::error::{Error, Result};

// =============================================================================
// Authentication
// =============================================================================

/// One credential entry of the login request.
///
/// A client may log in with several credentials in one request
/// (multi-tenant consumption over a single connection).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCredential {
    /// Product key the subscription belongs to.
    pub product_key: String,
    /// Authentication identifier.
    pub auth_id: String,
    /// Authentication secret.
    pub auth_secret: String,
    /// Subkey scoping the subscription.
    pub subkey: String,
    /// Names of the subscribed events.
    pub events: Vec<String>,
}

impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredential")
            .field("product_key", &self.product_key)
            .field("auth_id", &self.auth_id)
            .field("auth_secret", &"[REDACTED]")
            .field("subkey", &self.subkey)
            .field("events", &self.events)
            .finish()
    }
}

/// Login request, sent as the first frame of every connection cycle.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    cmd: &'static str,
    prefetch_count: u32,
    data: &'a [AuthCredential],
}

impl<'a> LoginRequest<'a> {
    pub(crate) fn new(prefetch_count: u32, credentials: &'a [AuthCredential]) -> Self {
        Self {
            cmd: CMD_LOGIN_REQ,
            prefetch_count,
            data: credentials,
        }
    }

    pub(crate) fn to_frame(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Codec {
            message: format!("login request: {e}"),
        })
    }
}

// =============================================================================
// Inbound events
// =============================================================================

/// Minimal view of an inbound frame.
///
/// Only the command tag and the delivery identifier are inspected; the raw
/// frame text is what gets handed to the consumer callback.
#[derive(Debug, Default, Deserialize)]
pub struct InboundEvent {
    /// Command tag of the frame.
    #[serde(default)]
    pub cmd: String,
    /// Delivery identifier, present on `event_push` frames.
    #[serde(default)]
    pub delivery_id: Option<u64>,
}

impl InboundEvent {
    /// Parse a frame into its minimal inbound view.
    pub fn parse(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| Error::Protocol {
            message: format!("malformed inbound frame: {e}"),
        })
    }

    /// The delivery identifier to acknowledge, if this is a pushed event.
    pub fn ack_id(&self) -> Option<u64> {
        if self.cmd == CMD_EVENT_PUSH {
            self.delivery_id
        } else {
            None
        }
    }
}

/// Acknowledgment for a pushed event.
#[derive(Debug, Serialize)]
pub(crate) struct EventAck {
    cmd: &'static str,
    delivery_id: u64,
}

impl EventAck {
    pub(crate) fn new(delivery_id: u64) -> Self {
        Self {
            cmd: CMD_EVENT_ACK,
            delivery_id,
        }
    }

    pub(crate) fn to_frame(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Codec {
            message: format!("event ack: {e}"),
        })
    }
}

// =============================================================================
// Remote control requests
// =============================================================================

/// A remote-control request produced by the consumer.
///
/// Exactly two shapes are valid on the wire: attribute control (a structured
/// attribute map per device) and raw control (opaque bytes per device). The
/// sum type makes any other shape unrepresentable; "nothing to send" is
/// modeled by the producer callback returning `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlRequest {
    /// Write structured attributes to the target devices.
    Attributes(AttributeControl),
    /// Send raw bytes to the target devices.
    Raw(RawControl),
}

impl ControlRequest {
    pub(crate) fn to_frame(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Codec {
            message: format!("control request: {e}"),
        })
    }
}

/// Attribute-control request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeControl {
    /// Command tag, e.g. `remote_control_v2_req`.
    pub cmd: String,
    /// Caller-chosen message identifier echoed in the response.
    pub msg_id: String,
    /// One entry per target device.
    #[serde(rename = "data")]
    pub items: Vec<AttributeControlItem>,
}

/// One attribute-control operation on a single device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeControlItem {
    /// Per-item command tag, e.g. `write_attrs`.
    pub cmd: String,
    /// Target device and attribute payload.
    pub data: AttributeTarget,
}

/// Target device and attribute map of an attribute-control item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeTarget {
    /// Device identifier.
    pub did: String,
    /// Device MAC address.
    pub mac: String,
    /// Product key of the device.
    pub product_key: String,
    /// Attribute name/value pairs to write.
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

/// Raw-control request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawControl {
    /// Command tag, e.g. `remote_control_v2_req`.
    pub cmd: String,
    /// Caller-chosen message identifier echoed in the response.
    pub msg_id: String,
    /// One entry per target device.
    #[serde(rename = "data")]
    pub items: Vec<RawControlItem>,
}

/// One raw-control operation on a single device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawControlItem {
    /// Per-item command tag, e.g. `write`.
    pub cmd: String,
    /// Target device and raw payload.
    pub data: RawTarget,
}

/// Target device and raw payload of a raw-control item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTarget {
    /// Device identifier.
    pub did: String,
    /// Device MAC address.
    pub mac: String,
    /// Product key of the device.
    pub product_key: String,
    /// Raw command bytes, base64-encoded on the wire.
    #[serde(serialize_with = "serialize_base64")]
    pub raw: Vec<u8>,
}

fn serialize_base64<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}
