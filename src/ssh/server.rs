use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use russh::server::{Handler, run_stream};
use russh::{Disconnect, MethodKind, MethodSet};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::auth::AuthorizationClient;
use crate::error::{ConfigError, SshError};

use super::jump::JumpHop;

const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(3600);
const DEFAULT_AUTH_REJECTION_TIME: Duration = Duration::from_secs(1);
/// How long a session gets to end after it has been sent a disconnect.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Everything the bastion needs before it can accept connections.
pub struct BastionConfig {
    /// OpenSSH or PEM private key text, used by both hops.
    pub host_key: Option<SecretString>,
    /// Pre-bound listener; the server never binds on its own.
    pub listener: Option<TcpListener>,
    pub auth_client: Option<Arc<dyn AuthorizationClient>>,
    /// Idle connections are dropped after this long. `None` disables it.
    pub inactivity_timeout: Option<Duration>,
    /// Delay applied by russh before answering a rejected authentication.
    pub auth_rejection_time: Duration,
}

impl Default for BastionConfig {
    fn default() -> Self {
        Self {
            host_key: None,
            listener: None,
            auth_client: None,
            inactivity_timeout: Some(DEFAULT_INACTIVITY_TIMEOUT),
            auth_rejection_time: DEFAULT_AUTH_REJECTION_TIME,
        }
    }
}

impl BastionConfig {
    /// Check that every required field is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.host_key {
            Some(key) if !key.expose_secret().trim().is_empty() => {}
            _ => return Err(ConfigError::NotValid("host key")),
        }
        if self.listener.is_none() {
            return Err(ConfigError::NotValid("listener"));
        }
        if self.auth_client.is_none() {
            return Err(ConfigError::NotValid("auth client"));
        }
        Ok(())
    }
}

/// State shared by every connection: one russh config per hop and the
/// authorization capability.
pub(crate) struct HopContext {
    pub(crate) outer: Arc<russh::server::Config>,
    pub(crate) inner: Arc<russh::server::Config>,
    pub(crate) auth_client: Arc<dyn AuthorizationClient>,
}

pub struct BastionServer;

impl BastionServer {
    /// Validate `config`, decode the host key and spawn the accept loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: BastionConfig) -> Result<BastionHandle, ConfigError> {
        config.validate()?;

        let (Some(host_key), Some(listener), Some(auth_client)) =
            (config.host_key, config.listener, config.auth_client)
        else {
            return Err(ConfigError::NotValid("bastion config"));
        };

        let key = russh::keys::decode_secret_key(host_key.expose_secret(), None)
            .map_err(|e| ConfigError::HostKey(e.to_string()))?;

        let outer = russh::server::Config {
            keys: vec![key.clone()],
            methods: MethodSet::from(
                [MethodKind::None, MethodKind::Password, MethodKind::PublicKey].as_slice(),
            ),
            inactivity_timeout: config.inactivity_timeout,
            auth_rejection_time: config.auth_rejection_time,
            auth_rejection_time_initial: Some(Duration::ZERO),
            nodelay: true,
            ..Default::default()
        };

        let inner = russh::server::Config {
            keys: vec![key],
            methods: MethodSet::from([MethodKind::PublicKey].as_slice()),
            inactivity_timeout: config.inactivity_timeout,
            auth_rejection_time: config.auth_rejection_time,
            auth_rejection_time_initial: Some(Duration::ZERO),
            ..Default::default()
        };

        let ctx = Arc::new(HopContext {
            outer: Arc::new(outer),
            inner: Arc::new(inner),
            auth_client,
        });

        let local_addr = listener.local_addr().ok();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(accept_loop(listener, ctx, shutdown_rx));

        if let Some(addr) = local_addr {
            tracing::info!(%addr, "bastion listening");
        }

        Ok(BastionHandle {
            shutdown: Arc::new(shutdown_tx),
            join,
            local_addr,
        })
    }
}

/// Cloneable trigger that stops a running bastion.
///
/// The server also stops once every trigger, including the one held by the
/// handle, has been dropped.
#[derive(Clone)]
pub struct BastionStopper(Arc<watch::Sender<bool>>);

impl BastionStopper {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// A running bastion.
pub struct BastionHandle {
    shutdown: Arc<watch::Sender<bool>>,
    join: JoinHandle<Result<(), SshError>>,
    local_addr: Option<SocketAddr>,
}

impl BastionHandle {
    /// Close the listener and disconnect every open connection.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn stopper(&self) -> BastionStopper {
        BastionStopper(self.shutdown.clone())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Resolve once the accept loop and all connection tasks are gone.
    ///
    /// Waiting does not itself stop the server. Only a listener failure is
    /// reported as an error.
    pub async fn wait(self) -> Result<(), SshError> {
        let BastionHandle { shutdown, join, .. } = self;
        let result = match join.await {
            Ok(result) => result,
            Err(e) => Err(SshError::Task(e.to_string())),
        };
        drop(shutdown);
        result
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<HopContext>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SshError> {
    let mut connections = JoinSet::new();

    let result = loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(ctx.clone(), stream, peer, shutdown.clone()));
                }
                Err(error) if is_connection_error(&error) => {
                    tracing::warn!(%error, "failed to accept SSH connection");
                }
                Err(error) => {
                    tracing::error!(%error, "error accepting SSH connection");
                    break Err(SshError::Listener(error));
                }
            },

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("bastion stopping");
                    break Ok(());
                }
            },

            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(error) = joined {
                    if error.is_panic() {
                        tracing::error!(%error, "connection task panicked");
                    }
                }
            },
        }
    };

    drop(listener);
    let open = connections.len();
    // Every connection task watches `shutdown` and ends within its grace period.
    while let Some(joined) = connections.join_next().await {
        if let Err(error) = joined {
            if error.is_panic() {
                tracing::error!(%error, "connection task panicked");
            }
        }
    }
    tracing::debug!(open, "connections closed");

    result
}

/// Accept failures that concern a single incoming connection rather than
/// the listener.
fn is_connection_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

async fn serve_connection(
    ctx: Arc<HopContext>,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: watch::Receiver<bool>,
) {
    if let Err(error) = stream.set_nodelay(true) {
        tracing::warn!(%peer, %error, "set_nodelay() failed");
    }

    let (stream, socket) = match duplicate_socket(stream) {
        Ok(pair) => pair,
        Err(error) => {
            tracing::warn!(%peer, %error, "failed to duplicate connection socket");
            return;
        }
    };

    tracing::debug!(%peer, "connection accepted");
    let handler = JumpHop::new(ctx.clone(), Some(peer));
    let result = drive_session(ctx.outer.clone(), stream, handler, shutdown).await;
    log_session_end(result, Some(peer), "jump");

    // No session may keep the connection after this point, including one
    // that outlived its grace period. Already-closed sockets report an error.
    let _ = socket.shutdown(Shutdown::Both);
}

/// Split off a second handle on the socket that can shut it down while
/// russh owns the stream.
fn duplicate_socket(stream: TcpStream) -> io::Result<(TcpStream, std::net::TcpStream)> {
    let stream = stream.into_std()?;
    let socket = stream.try_clone()?;
    Ok((TcpStream::from_std(stream)?, socket))
}

/// Run an SSH session over `stream` until it ends on its own or `closing`
/// fires.
///
/// On close the client is sent a disconnect and the session gets
/// [`DISCONNECT_GRACE`] to wind down before it is left behind.
pub(crate) async fn drive_session<H, S>(
    config: Arc<russh::server::Config>,
    stream: S,
    handler: H,
    mut closing: watch::Receiver<bool>,
) -> Result<(), SshError>
where
    H: Handler<Error = SshError> + Send + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut session = tokio::select! {
        started = run_stream(config, stream, handler) => started?,
        () = closed(&mut closing) => return Ok(()),
    };

    tokio::select! {
        result = &mut session => return result,
        () = closed(&mut closing) => {}
    }

    let handle = session.handle();
    let ended = timeout(DISCONNECT_GRACE, async move {
        // Fails only when the session has already ended.
        let _ = handle
            .disconnect(
                Disconnect::ByApplication,
                "bastion shutting down".to_string(),
                "en".to_string(),
            )
            .await;
        session.await
    })
    .await;

    match ended {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("session still running after disconnect");
            Ok(())
        }
    }
}

/// Resolves once a stop was requested or every trigger has been dropped.
async fn closed(closing: &mut watch::Receiver<bool>) {
    let _ = closing.wait_for(|stop| *stop).await;
}

/// Log how an SSH session ended, keeping ordinary hang-ups out of the
/// warning level.
pub(crate) fn log_session_end(result: Result<(), SshError>, peer: Option<SocketAddr>, hop: &str) {
    let peer = peer.map(|p| p.to_string()).unwrap_or_default();
    match result {
        Ok(()) => tracing::debug!(%peer, hop, "session closed"),
        Err(SshError::Russh(russh::Error::Disconnect)) => {
            tracing::debug!(%peer, hop, "client disconnected");
        }
        Err(SshError::Russh(russh::Error::ConnectionTimeout)) => {
            tracing::debug!(%peer, hop, "session timed out");
        }
        Err(SshError::Russh(russh::Error::IO(error)))
            if error.kind() == io::ErrorKind::UnexpectedEof =>
        {
            tracing::debug!(%peer, hop, "eof from client");
        }
        Err(error) => tracing::warn!(%peer, hop, %error, "session closed with error"),
    }
}
