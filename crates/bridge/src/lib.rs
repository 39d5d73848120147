//! BookMarket USB Key Bridge Client
//!
//! The physical USB key is driven by a vendor service listening on a local
//! WebSocket port. This crate provides the client side of that protocol:
//! framing (`protocol`), the per-operation channel discipline (`client`),
//! typed device operations (`device`), and the two-stage login orchestration
//! that ties the bridge and the BookMarket API together (`login`).

pub mod client;
pub mod device;
pub mod login;
pub mod protocol;

pub use client::{BridgeClient, BridgeError};
pub use device::{KeyPairInfo, UsbKeyDevice};
pub use login::{LoginClient, LoginError, Session};
