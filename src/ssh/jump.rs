use std::net::SocketAddr;
use std::sync::Arc;

use russh::Channel;
use russh::server::{Auth, Handler, Msg, Session};
use tokio::sync::watch;

use crate::error::SshError;
use crate::security_log;

use super::destination::Destination;
use super::server::{HopContext, drive_session, log_session_end};
use super::terminating::TerminatingHop;

/// Handler for a client's connection to the bastion itself.
///
/// Its only job is to carry `direct-tcpip` tunnels to a [`TerminatingHop`].
/// Every tunnel follows `closing`, so dropping the hop when its connection
/// ends disconnects all of them.
pub struct JumpHop {
    ctx: Arc<HopContext>,
    peer: Option<SocketAddr>,
    closing: watch::Sender<bool>,
}

impl JumpHop {
    pub(crate) fn new(ctx: Arc<HopContext>, peer: Option<SocketAddr>) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            ctx,
            peer,
            closing,
        }
    }

    /// Outer authentication admits everyone. Access control happens on the
    /// terminating hop, where the user's key is checked against the
    /// control plane.
    fn admit(&self, method: &str, user: &str) -> Auth {
        tracing::debug!(peer = ?self.peer, method, user, "jump hop admitted client");
        Auth::Accept
    }

    fn spawn_tunnel(&self, channel: Channel<Msg>, destination: Destination) {
        let peer = self.peer;
        let config = self.ctx.inner.clone();
        let hop = TerminatingHop::new(self.ctx.auth_client.clone(), destination, peer);
        let stream = channel.into_stream();
        let closing = self.closing.subscribe();

        tokio::spawn(async move {
            let result = drive_session(config, stream, hop, closing).await;
            log_session_end(result, peer, "terminating");
        });
    }
}

impl Handler for JumpHop {
    type Error = SshError;

    async fn auth_none(&mut self, user: &str) -> Result<Auth, Self::Error> {
        Ok(self.admit("none", user))
    }

    async fn auth_password(&mut self, user: &str, _password: &str) -> Result<Auth, Self::Error> {
        Ok(self.admit("password", user))
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        _public_key: &russh::keys::PublicKey,
    ) -> Result<Auth, Self::Error> {
        Ok(self.admit("publickey", user))
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let destination = match Destination::parse(host_to_connect, port_to_connect) {
            Ok(destination) => destination,
            Err(error) => {
                security_log::log_tunnel_rejected(
                    self.peer,
                    host_to_connect,
                    port_to_connect,
                    &error.to_string(),
                );
                return Ok(false);
            }
        };

        security_log::log_tunnel_opened(self.peer, &destination.to_string(), destination.port);
        self.spawn_tunnel(channel, destination);
        Ok(true)
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        security_log::log_tunnel_rejected(self.peer, "", 0, "session channels are not served");
        Ok(false)
    }

    async fn tcpip_forward(
        &mut self,
        address: &str,
        port: &mut u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        security_log::log_tunnel_rejected(
            self.peer,
            address,
            *port,
            "remote forwarding is not supported",
        );
        Ok(false)
    }

    async fn cancel_tcpip_forward(
        &mut self,
        _address: &str,
        _port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(false)
    }
}
