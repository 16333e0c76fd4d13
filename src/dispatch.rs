//! Executes data commands against the store

use crate::error::CommandError;
use crate::protocol::{Command, Reply, Request};
use crate::store::{MemoryStore, Store};
use tracing::debug;

/// Resolve a request's arguments and run it, turning any failure into its reply line.
pub async fn dispatch(request: Request<'_>, store: &MemoryStore) -> Reply {
    match request.into_command() {
        Ok(command) => execute(command, store).await,
        Err(e) => e.into(),
    }
}

/// Execute a parsed command
pub async fn execute(command: Command, store: &MemoryStore) -> Reply {
    debug!(?command, "executing");
    match command {
        Command::Set { key, value } => match store.set(key, value).await {
            Ok(()) => Reply::Ok,
            Err(e) => CommandError::from(e).into(),
        },
        Command::Get { key } => match store.get(&key).await {
            Some(value) => Reply::Value(value),
            None => Reply::Nil,
        },
        Command::Delete { key } => Reply::Integer(store.delete(&key).await as i64),
        Command::Incr { key } => match store.increment(&key, 1).await {
            Ok(_) => Reply::Ok,
            Err(e) => CommandError::from(e).into(),
        },
        // Replies with the requested amount, not the resulting counter.
        Command::IncrBy { key, amount } => match store.increment(&key, amount).await {
            Ok(_) => Reply::Integer(amount),
            Err(e) => CommandError::from(e).into(),
        },
    }
}
