//! Socket server for the presentation service
//!
//! Owns the control surface behind one async mutex, drains remote inputs on
//! a dedicated task and serves operator, remote and projector clients over
//! the Unix socket.

mod handler;

use crate::bible::BibleClient;
use crate::broadcast::BroadcastServer;
use crate::conf::{SessionConfig, SettingsStore};
use crate::control::ControlSurface;
use crate::display::{BackgroundPool, TaskDisplayFactory};
use crate::relay::{Relay, RemoteReceiver, RemoteSender, remote_channel};
use crate::transport::SocketError;
use jiff::Timestamp;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UnixListener;
use tokio::sync::Mutex;

use handler::handle_connection;

type ServerResult<T> = std::result::Result<T, SocketError>;

/// Folders and settings the service runs with
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub slides_dir: PathBuf,
    pub backgrounds_dir: PathBuf,
    pub store: SettingsStore,
    pub bible: BibleClient,
}

pub struct SocketServer {
    inner: Arc<ServerInner>,
    listener: UnixListener,
    remote_rx: Option<RemoteReceiver>,
}

impl SocketServer {
    pub fn new<P: AsRef<Path>>(socket_path: P, options: ServeOptions) -> ServerResult<Self> {
        let socket_path = socket_path.as_ref();

        // Remove a stale socket left by a previous run
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                SocketError::Connection(format!(
                    "Service already running at socket: {}. Stop it before starting another.",
                    socket_path.display()
                ))
            } else {
                SocketError::Connection(format!("Failed to bind socket: {}", e))
            }
        })?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = std::fs::metadata(socket_path)
                .map_err(|e| {
                    SocketError::Connection(format!("Failed to read socket metadata: {}", e))
                })?
                .permissions();
            permissions.set_mode(0o600);
            std::fs::set_permissions(socket_path, permissions).map_err(|e| {
                SocketError::Connection(format!("Failed to set socket permissions: {}", e))
            })?;
        }

        // Session settings are read once; the settings panel does not reach a running service
        let config = SessionConfig::from(&options.store.load());
        tracing::info!(
            version = %config.default_version,
            overlay_return_ms = config.overlay_return_ms,
            show_verse_numbers = config.show_verse_numbers,
            "session configuration loaded"
        );

        let broadcast = BroadcastServer::new();
        let factory = TaskDisplayFactory::new(
            broadcast.clone(),
            BackgroundPool::new(&options.backgrounds_dir),
        );
        let control = ControlSurface::new(config, &options.slides_dir, Relay::new(Box::new(factory)));

        let (remote_tx, remote_rx) = remote_channel();
        let inner = Arc::new(ServerInner {
            control: Mutex::new(control),
            broadcast,
            bible: options.bible,
            store: options.store,
            remote_tx,
            start_time: Instant::now(),
            started_at: Timestamp::now(),
        });

        Ok(Self {
            inner,
            listener,
            remote_rx: Some(remote_rx),
        })
    }

    pub async fn run(&mut self) -> ServerResult<()> {
        {
            let mut control = self.inner.control.lock().await;
            if let Err(e) = control.start() {
                tracing::warn!("failed to load slides at startup: {:#}", e);
            }
        }
        tracing::info!("socket server listening for connections");

        let remote_loop = self
            .remote_rx
            .take()
            .map(|rx| tokio::spawn(Self::remote_loop(Arc::clone(&self.inner), rx)));

        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received, stopping server");
                self.cleanup();
                Ok(())
            }
            result = self.accept_loop() => result,
        };

        if let Some(task) = remote_loop {
            task.abort();
        }
        result
    }

    /// Apply remote inputs in arrival order
    async fn remote_loop(inner: Arc<ServerInner>, mut rx: RemoteReceiver) {
        while let Some(input) = rx.recv().await {
            tracing::debug!(token = input.token(), "remote input");
            inner.control.lock().await.handle_remote_input(input);
        }
    }

    async fn accept_loop(&self) -> ServerResult<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, inner).await {
                            tracing::warn!("error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("failed to accept connection: {}", e);
                }
            }
        }
    }

    fn cleanup(&self) {
        let addr = self.listener.local_addr().ok();

        if let Some(path) = addr
            .as_ref()
            .and_then(|a| a.as_pathname())
            .filter(|p| p.exists())
            && let Err(e) = std::fs::remove_file(path)
        {
            tracing::warn!("failed to remove socket file: {}", e);
        }
    }
}

/// Shared server state
struct ServerInner {
    control: Mutex<ControlSurface>,
    broadcast: BroadcastServer,
    bible: BibleClient,
    store: SettingsStore,
    remote_tx: RemoteSender,
    start_time: Instant,
    started_at: Timestamp,
}

impl ServerInner {
    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
