//! Firmware update over Redfish
//!
//! Upload an image into the firmware inventory, trigger `StartUpdate` for a
//! target, poll the returned task and the inventory, then optionally power
//! cycle the system. [`FirmwareService::update_firmware`] runs all steps in
//! order and reports [`UpdatePhase`] changes.

mod client;
mod types;

pub use client::*;
pub use types::*;
