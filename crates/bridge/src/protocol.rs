//! USB key bridge wire protocol
//!
//! The bridge service speaks JSON text frames over a local WebSocket:
//!
//! - Outbound control frames carry the operation name in `FunName` plus
//!   operation-specific fields.
//! - Inbound frames of `type == "Process"` drive the exchange. They carry a
//!   monotonically increasing `order` counter (reset per logical operation
//!   by sending `ResetOrder` first), the device error code in `LastError`
//!   (zero means success), and the step result in `return_value`.
//! - Frames of any other `type` are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default address of the local bridge service
pub const DEFAULT_BRIDGE_URL: &str = "ws://127.0.0.1:4007";

/// WebSocket subprotocol the bridge expects
pub const BRIDGE_SUBPROTOCOL: &str = "usbkey-protocol";

// Operation names understood by the bridge service
pub const FN_RESET_ORDER: &str = "ResetOrder";
pub const FN_FIND_PORT: &str = "FindPort";
pub const FN_GET_PUB_KEY_X: &str = "GetPubKeyX";
pub const FN_GET_PUB_KEY_Y: &str = "GetPubKeyY";
pub const FN_SIGN: &str = "YtSign";
pub const FN_SET_PIN: &str = "YtSetPin";
pub const FN_START_GEN_KEY_PAIR: &str = "StarGenKeyPair";
pub const FN_GEN_PRI_KEY: &str = "GenPriKey";
pub const FN_GEN_PUB_KEY_X: &str = "GenPubKeyX";
pub const FN_GEN_PUB_KEY_Y: &str = "GenPubKeyY";

/// An outbound control frame: `{"FunName": <name>, ...fields}`
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    #[serde(rename = "FunName")]
    pub fun_name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Command {
    pub fn new(fun_name: &str) -> Self {
        Self {
            fun_name: fun_name.to_string(),
            fields: Map::new(),
        }
    }

    /// Attach an operation-specific field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// The sequence reset sent immediately after the channel opens
pub fn reset_order() -> Command {
    Command::new(FN_RESET_ORDER)
}

/// An inbound frame from the bridge service
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub order: u32,
    #[serde(rename = "LastError", default)]
    pub last_error: i32,
    #[serde(default)]
    pub return_value: Value,
}

impl ProcessFrame {
    /// Only `Process` frames participate in the exchange
    pub fn is_process(&self) -> bool {
        self.kind == "Process"
    }
}
