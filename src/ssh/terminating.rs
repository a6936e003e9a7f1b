use std::net::SocketAddr;
use std::sync::Arc;

use russh::keys::PublicKeyBase64;
use russh::keys::ssh_key::HashAlg;
use russh::server::{Auth, Handler, Msg, Session, run_stream};
use russh::{Channel, ChannelId, CryptoVec, MethodKind, MethodSet};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::AuthorizationClient;
use crate::error::{AuthError, SshError};
use crate::security_log;

use super::destination::Destination;

/// The SSH server at the far end of a tunnel.
///
/// Authenticates the user against the control plane by public key and, for
/// now, answers the single session it allows with a line naming the
/// destination and user.
pub struct TerminatingHop {
    auth_client: Arc<dyn AuthorizationClient>,
    destination: Destination,
    peer: Option<SocketAddr>,
    user: Option<String>,
    session_channel: Option<Channel<Msg>>,
}

impl TerminatingHop {
    pub fn new(
        auth_client: Arc<dyn AuthorizationClient>,
        destination: Destination,
        peer: Option<SocketAddr>,
    ) -> Self {
        Self {
            auth_client,
            destination,
            peer,
            user: None,
            session_channel: None,
        }
    }

    /// Run the handshake and session over `stream` until the client goes away.
    pub async fn serve<S>(
        self,
        config: Arc<russh::server::Config>,
        stream: S,
    ) -> Result<(), SshError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let session = run_stream(config, stream, self).await?;
        session.await
    }

    fn reject() -> Auth {
        Auth::Reject {
            proceed_with_methods: Some(MethodSet::from([MethodKind::PublicKey].as_slice())),
            partial_success: false,
        }
    }

    fn acknowledge(&self, channel: ChannelId, session: &mut Session) -> Result<(), SshError> {
        let user = self.user.as_deref().unwrap_or_default();
        let message = format!(
            "Your final destination is: {} as user: {}\n",
            self.destination, user
        );

        session.channel_success(channel)?;
        session.data(channel, CryptoVec::from_slice(message.as_bytes()))?;
        session.exit_status_request(channel, 0)?;
        session.eof(channel)?;
        session.close(channel)?;
        Ok(())
    }

    fn owns(&self, channel: ChannelId) -> bool {
        self.user.is_some()
            && self
                .session_channel
                .as_ref()
                .is_some_and(|c| c.id() == channel)
    }
}

impl Handler for TerminatingHop {
    type Error = SshError;

    async fn auth_none(&mut self, _user: &str) -> Result<Auth, Self::Error> {
        Ok(Self::reject())
    }

    async fn auth_password(&mut self, user: &str, _password: &str) -> Result<Auth, Self::Error> {
        tracing::debug!(user, "password authentication refused on terminating hop");
        Ok(Self::reject())
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &russh::keys::PublicKey,
    ) -> Result<Auth, Self::Error> {
        let fingerprint = public_key.fingerprint(HashAlg::Sha256).to_string();
        security_log::log_auth_attempt(self.peer, user, &fingerprint);

        let user_tag = format!("user-{}", user);
        let key_bytes = public_key.public_key_bytes();

        match self.auth_client.check_public_key(&user_tag, &key_bytes).await {
            Ok(()) => {
                security_log::log_auth_success(self.peer, user, &fingerprint);
                self.user = Some(user.to_string());
                Ok(Auth::Accept)
            }
            Err(AuthError::Remote(error)) => {
                security_log::log_auth_backend_error(self.peer, user, &error);
                Ok(Self::reject())
            }
            Err(error) => {
                security_log::log_auth_failure(self.peer, user, &fingerprint, &error.to_string());
                Ok(Self::reject())
            }
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if self.user.is_none() || self.session_channel.is_some() {
            tracing::debug!(channel = ?channel.id(), "session channel refused");
            return Ok(false);
        }
        self.session_channel = Some(channel);
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        _data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if !self.owns(channel) {
            session.channel_failure(channel)?;
            return Ok(());
        }
        self.acknowledge(channel, session)
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if !self.owns(channel) {
            session.channel_failure(channel)?;
            return Ok(());
        }
        self.acknowledge(channel, session)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.owns(channel) {
            session.channel_success(channel)?;
        } else {
            session.channel_failure(channel)?;
        }
        Ok(())
    }

    async fn env_request(
        &mut self,
        channel: ChannelId,
        _variable_name: &str,
        _variable_value: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.owns(channel) {
            session.channel_success(channel)?;
        } else {
            session.channel_failure(channel)?;
        }
        Ok(())
    }
}
