//! TxVault TCP Server
//!
//! Accepts connections and runs one task per client. Every task owns a
//! `Session` sharing the single store and transaction table.

use crate::{
    config::ServerConfig,
    error::{Result, TxVaultError},
    session::{Outcome, Session},
    store::{MemoryStore, Store},
    transaction::TransactionTable,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::{broadcast, Semaphore},
};
use tracing::{debug, error, info, instrument, warn};

/// TxVault TCP server
pub struct TxVaultServer {
    config: ServerConfig,
    store: Arc<MemoryStore>,
    transactions: Arc<TransactionTable>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TxVaultServer {
    /// Create a new server instance
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store: Arc::new(MemoryStore::new()),
            transactions: Arc::new(TransactionTable::new()),
            shutdown_tx,
        }
    }

    /// Shared store, mostly useful for inspection in tests
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        Ok(listener)
    }

    /// Bind and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("TxVault server listening on {}", listener.local_addr()?);

        let limit = Arc::new(Semaphore::new(self.config.max_connections));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (mut stream, addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&limit).try_acquire_owned() else {
                        warn!("Rejecting {}: connection limit reached", addr);
                        let _ = stream.write_all(b"ERR max number of clients reached\n").await;
                        continue;
                    };

                    info!("New client connected: {}", addr);
                    let session = Session::new(Arc::clone(&self.store), Arc::clone(&self.transactions));
                    let shutdown_rx = self.shutdown_tx.subscribe();
                    let max_line = self.config.max_line_length;

                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, addr, session, max_line, shutdown_rx).await {
                            warn!("Error handling client {}: {}", addr, e);
                        }
                        info!("Client disconnected: {}", addr);
                        drop(permit);
                    });
                }

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        info!("Server stopped with {} keys in memory", self.store.len().await);
        Ok(())
    }

    /// Handle a single client connection
    #[instrument(
        name = "connection",
        skip_all,
        fields(peer = %addr, tx = %session.transaction_id())
    )]
    async fn handle_client(
        mut stream: TcpStream,
        addr: SocketAddr,
        mut session: Session,
        max_line: usize,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        let result = loop {
            line.clear();
            let mut limited = (&mut buf_reader).take(max_line as u64);

            tokio::select! {
                read = limited.read_line(&mut line) => {
                    match read {
                        Ok(0) => break Ok(()),
                        Ok(n) if n >= max_line && !line.ends_with('\n') => {
                            let _ = writer.write_all(b"ERR line too long\n").await;
                            break Err(TxVaultError::Protocol(format!(
                                "request line exceeds {} bytes",
                                max_line
                            )));
                        }
                        Ok(_) => {
                            debug!(line = line.trim_end(), "received");
                            let replies = match session.handle_line(&line).await {
                                Outcome::Continue(replies) => replies,
                                Outcome::Close => break Ok(()),
                            };
                            if replies.is_empty() {
                                continue;
                            }

                            let mut out = Vec::new();
                            for reply in &replies {
                                out.extend_from_slice(&reply.to_bytes());
                            }
                            if let Err(e) = writer.write_all(&out).await {
                                break Err(TxVaultError::from(e));
                            }
                            if let Err(e) = writer.flush().await {
                                break Err(TxVaultError::from(e));
                            }
                        }
                        Err(e) => break Err(TxVaultError::from(e)),
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing client connection");
                    break Ok(());
                }
            }
        };

        session.close().await;
        result
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).map_err(|_| {
            TxVaultError::Server("Failed to send shutdown signal".to_string())
        })?;
        Ok(())
    }
}
