//! Security event logging for audit trails.
//!
//! Provides structured logging functions for security-relevant events such as
//! public key checks on the terminating hop and tunnels opened through the
//! jump hop.
//!
//! All security events are logged with `target: TARGET` to allow filtering
//! in production environments.
//!
//! # Example
//!
//! Filter security events only:
//! ```bash
//! RUST_LOG=security=info bastion /etc/bastion/bastion.toml
//! ```

use std::net::SocketAddr;

use tracing::{error, info, warn};

/// Target carried by every event in this module.
pub const TARGET: &str = "security";

fn peer_display(peer: Option<SocketAddr>) -> String {
    peer.map(|p| p.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Log a public key offered on the terminating hop.
pub fn log_auth_attempt(peer: Option<SocketAddr>, username: &str, fingerprint: &str) {
    info!(
        target: TARGET,
        event = "auth_attempt",
        peer = %peer_display(peer),
        username = %username,
        fingerprint = %fingerprint,
        "Public key offered"
    );
}

/// Log a key the control plane authorized.
pub fn log_auth_success(peer: Option<SocketAddr>, username: &str, fingerprint: &str) {
    info!(
        target: TARGET,
        event = "auth_success",
        peer = %peer_display(peer),
        username = %username,
        fingerprint = %fingerprint,
        "Public key authorized"
    );
}

/// Log a key that was denied: not found, or a malformed user or key.
pub fn log_auth_failure(peer: Option<SocketAddr>, username: &str, fingerprint: &str, reason: &str) {
    warn!(
        target: TARGET,
        event = "auth_failure",
        peer = %peer_display(peer),
        username = %username,
        fingerprint = %fingerprint,
        reason = %reason,
        "Public key rejected"
    );
}

/// Log a key that was denied because the control plane could not answer.
pub fn log_auth_backend_error(peer: Option<SocketAddr>, username: &str, error: &str) {
    error!(
        target: TARGET,
        event = "auth_backend_error",
        peer = %peer_display(peer),
        username = %username,
        error = %error,
        "Authorization backend failed, key rejected"
    );
}

/// Log a `direct-tcpip` channel accepted by the jump hop.
pub fn log_tunnel_opened(peer: Option<SocketAddr>, destination: &str, port: u16) {
    info!(
        target: TARGET,
        event = "tunnel_opened",
        peer = %peer_display(peer),
        destination = %destination,
        port = port,
        "Tunnel opened"
    );
}

/// Log a channel or forward request refused by the jump hop.
pub fn log_tunnel_rejected(peer: Option<SocketAddr>, host: &str, port: u32, reason: &str) {
    warn!(
        target: TARGET,
        event = "tunnel_rejected",
        peer = %peer_display(peer),
        host = %host,
        port = port,
        reason = %reason,
        "Tunnel rejected"
    );
}
