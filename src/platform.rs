//! Collaborators outside the persistence core
//!
//! The lamp never talks to a network stack or the chip directly; it goes
//! through [`Platform`]. The host binary uses [`HostPlatform`], which logs
//! outbound traffic instead of sending it.

use serde_json::Value;
use std::fs;
use std::net::UdpSocket;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::constants::RESTART_EXIT_CODE;

/// Addressing details reported in every state notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub local_ip: String,
    pub device: String,
}

pub trait Platform {
    /// Stable hardware identity the pub/sub unique id is derived from
    fn hardware_id(&self) -> u32;

    fn network(&self) -> NetworkInfo;

    /// Best-effort publish on the pub/sub transport
    fn publish(&mut self, topic: &str, payload: &Value);

    /// Best-effort push to connected web observers
    fn push_web(&mut self, doc: &Value);

    /// Ask for a device restart; the caller stops using the lamp afterwards
    fn request_restart(&mut self);
}

/// Unique id as first assigned on a fresh device
pub fn unique_id(hardware_id: u32) -> String {
    format!("{hardware_id:x}")
}

/// First 32 bits of a machine-id style hex file
pub fn read_machine_id(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path)
        .inspect_err(|e| debug!(path = %path.display(), error = %e, "No machine id"))
        .ok()?;
    let prefix: String = contents.trim().chars().take(8).collect();
    u32::from_str_radix(&prefix, 16).ok()
}

/// Address of the interface the default route goes through
/// Connecting a UDP socket only selects a route; nothing is sent.
pub fn detect_local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("192.0.2.1:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|e| {
            warn!(error = %e, "Could not detect local address, using loopback");
            "127.0.0.1".to_string()
        })
}

#[derive(Debug)]
pub struct HostPlatform {
    hardware_id: u32,
    local_ip: String,
}

impl HostPlatform {
    pub fn new(hardware_id: u32, local_ip: String) -> Self {
        Self {
            hardware_id,
            local_ip,
        }
    }
}

impl Platform for HostPlatform {
    fn hardware_id(&self) -> u32 {
        self.hardware_id
    }

    fn network(&self) -> NetworkInfo {
        NetworkInfo {
            local_ip: self.local_ip.clone(),
            device: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }

    fn publish(&mut self, topic: &str, payload: &Value) {
        info!(topic = %topic, payload = %payload, "Publish");
    }

    fn push_web(&mut self, doc: &Value) {
        debug!(payload = %doc, "Web push");
    }

    fn request_restart(&mut self) {
        error!(exit_code = RESTART_EXIT_CODE, "Restart requested");
    }
}
