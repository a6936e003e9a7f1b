//! SSH bastion for Juju units.
//!
//! Clients connect to the [`JumpHop`] and open a `direct-tcpip` channel to
//! `<unit>.<application>.<model>.juju.local`. The bastion does not dial that
//! host: it runs a second SSH server, the [`TerminatingHop`], inside the
//! tunnel, where the user authenticates by public key.

pub mod destination;
pub mod jump;
pub mod server;
pub mod terminating;

pub use destination::Destination;
pub use jump::JumpHop;
pub use server::{BastionConfig, BastionHandle, BastionServer, BastionStopper};
pub use terminating::TerminatingHop;
