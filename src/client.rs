//! Client library for connecting to a TxVault server
//!
//! Provides a simple interface for interacting with the key-value store

use crate::error::{Result, TxVaultError};
use crate::protocol::Reply;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;

/// Client for connecting to a TxVault server
pub struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: BufWriter<tokio::net::tcp::OwnedWriteHalf>,
    /// Commands queued since `multi`, `None` outside a transaction
    queued: Option<usize>,
}

impl Client {
    /// Connect to a TxVault server
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);
        let writer = BufWriter::new(write_half);

        Ok(Self {
            reader,
            writer,
            queued: None,
        })
    }

    /// Write one raw command line without waiting for a reply
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read one reply line
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut response_line = String::new();
        if self.reader.read_line(&mut response_line).await? == 0 {
            return Err(TxVaultError::Client("Connection closed by server".to_string()));
        }
        Ok(Reply::parse(&response_line))
    }

    /// Send a raw command line and read its single reply
    pub async fn send_line(&mut self, line: &str) -> Result<Reply> {
        self.write_line(line).await?;
        self.read_reply().await
    }

    /// Set a key-value pair; values with spaces are quoted automatically
    pub async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = if value.contains(' ') && !(value.starts_with('"') && value.ends_with('"')) {
            format!("\"{}\"", value)
        } else {
            value.to_string()
        };

        match self.send_line(&format!("SET {} {}", key, value)).await? {
            Reply::Ok => Ok(()),
            other => Err(unexpected("SET", other)),
        }
    }

    /// Get a value by key
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self.send_line(&format!("GET {}", key)).await? {
            Reply::Value(value) => Ok(Some(value)),
            Reply::Nil => Ok(None),
            other => Err(unexpected("GET", other)),
        }
    }

    /// Delete a key
    pub async fn delete(&mut self, key: &str) -> Result<bool> {
        match self.send_line(&format!("DELETE {}", key)).await? {
            Reply::Integer(n) => Ok(n == 1),
            other => Err(unexpected("DELETE", other)),
        }
    }

    /// Increment a counter by one
    pub async fn incr(&mut self, key: &str) -> Result<()> {
        match self.send_line(&format!("INCR {}", key)).await? {
            Reply::Ok => Ok(()),
            other => Err(unexpected("INCR", other)),
        }
    }

    /// Increment a counter by `amount`; the server echoes the amount back
    pub async fn incr_by(&mut self, key: &str, amount: i64) -> Result<i64> {
        match self.send_line(&format!("INCRBY {} {}", key, amount)).await? {
            Reply::Integer(n) => Ok(n),
            other => Err(unexpected("INCRBY", other)),
        }
    }

    /// Whether `multi` has been sent and not yet executed
    pub fn in_transaction(&self) -> bool {
        self.queued.is_some()
    }

    /// Open a transaction; a second call restarts the queue
    pub async fn multi(&mut self) -> Result<()> {
        match self.send_line("MULTI").await? {
            Reply::Ok => {
                self.queued = Some(0);
                Ok(())
            }
            other => Err(unexpected("MULTI", other)),
        }
    }

    /// Queue a raw command inside an open transaction
    pub async fn queue(&mut self, line: &str) -> Result<()> {
        match self.send_line(line).await? {
            Reply::Queued => {
                if let Some(count) = self.queued.as_mut() {
                    *count += 1;
                }
                Ok(())
            }
            other => Err(unexpected("queued command", other)),
        }
    }

    /// Run the open transaction, reading one reply per queued command
    pub async fn exec(&mut self) -> Result<Vec<Reply>> {
        let Some(queued) = self.queued.take() else {
            // Read the server's refusal so it cannot pose as the next reply
            let reply = self.send_line("EXEC").await?;
            return Err(unexpected("EXEC", reply));
        };

        self.write_line("EXEC").await?;
        let mut replies = Vec::with_capacity(queued);
        while replies.len() < queued {
            replies.push(self.read_reply().await?);
        }
        Ok(replies)
    }

    /// Ask the server to close the connection
    pub async fn disconnect(mut self) -> Result<()> {
        self.write_line("DISCONNECT").await?;
        let mut rest = String::new();
        // The server closes without replying
        self.reader.read_line(&mut rest).await?;
        Ok(())
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

fn unexpected(command: &str, reply: Reply) -> TxVaultError {
    match reply {
        Reply::Error(e) => TxVaultError::Server(e),
        other => TxVaultError::Protocol(format!("Unexpected response for {}: {:?}", command, other)),
    }
}
