//! Per-connection session: routes each line either straight to the store or
//! into the connection's open transaction.

use crate::dispatch::dispatch;
use crate::error::CommandError;
use crate::protocol::{parse_request, Reply, Verb};
use crate::store::MemoryStore;
use crate::transaction::{TransactionId, TransactionTable};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Queuing,
}

/// What the connection should do after a line has been handled
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Write these replies (possibly none) and keep reading
    Continue(Vec<Reply>),
    /// Close the connection without replying
    Close,
}

/// Transaction state owned by one connection
pub struct Session {
    tx_id: TransactionId,
    state: SessionState,
    store: Arc<MemoryStore>,
    transactions: Arc<TransactionTable>,
}

impl Session {
    pub fn new(store: Arc<MemoryStore>, transactions: Arc<TransactionTable>) -> Self {
        let tx_id = transactions.allocate_id();
        Self {
            tx_id,
            state: SessionState::Idle,
            store,
            transactions,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.tx_id
    }

    pub fn in_transaction(&self) -> bool {
        self.state == SessionState::Queuing
    }

    /// Handle one raw request line
    pub async fn handle_line(&mut self, line: &str) -> Outcome {
        let Some(request) = parse_request(line) else {
            return Outcome::Continue(Vec::new());
        };

        let verb = request.verb;
        match verb {
            Some(Verb::Multi) => Outcome::Continue(vec![self.multi().await]),
            Some(Verb::Exec) => Outcome::Continue(self.exec().await),
            Some(Verb::Disconnect) => Outcome::Close,
            Some(verb) if verb.is_data() && self.in_transaction() => {
                let raw = line.trim().to_string();
                if self.transactions.enqueue(self.tx_id, raw).await {
                    Outcome::Continue(vec![Reply::Queued])
                } else {
                    // The table lost our queue; behave as if no transaction was open.
                    self.state = SessionState::Idle;
                    Outcome::Continue(vec![dispatch(request, &self.store).await])
                }
            }
            _ => Outcome::Continue(vec![dispatch(request, &self.store).await]),
        }
    }

    async fn multi(&mut self) -> Reply {
        if self.in_transaction() {
            debug!(tx = %self.tx_id, "MULTI while queuing, queue reset");
        }
        self.transactions.begin(self.tx_id).await;
        self.state = SessionState::Queuing;
        Reply::Ok
    }

    async fn exec(&mut self) -> Vec<Reply> {
        if !self.in_transaction() {
            return vec![CommandError::NoTransaction.into()];
        }
        self.state = SessionState::Idle;

        let Some(queue) = self.transactions.take(self.tx_id).await else {
            return vec![CommandError::NoTransaction.into()];
        };
        info!(tx = %self.tx_id, commands = queue.len(), "executing transaction");

        let mut replies = Vec::with_capacity(queue.len());
        for line in &queue {
            if let Some(request) = parse_request(line) {
                replies.push(dispatch(request, &self.store).await);
            }
        }
        replies
    }

    /// Drop any open transaction; called when the connection goes away.
    pub async fn close(&mut self) {
        if !self.in_transaction() {
            return;
        }
        self.state = SessionState::Idle;
        if let Some(lost) = self.transactions.discard(self.tx_id).await {
            info!(tx = %self.tx_id, lost, "discarded open transaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn session() -> (Session, Arc<MemoryStore>, Arc<TransactionTable>) {
        let store = Arc::new(MemoryStore::new());
        let transactions = Arc::new(TransactionTable::new());
        let session = Session::new(Arc::clone(&store), Arc::clone(&transactions));
        (session, store, transactions)
    }

    fn lines(outcome: Outcome) -> Vec<String> {
        match outcome {
            Outcome::Continue(replies) => replies.iter().map(Reply::to_line).collect(),
            Outcome::Close => panic!("connection closed unexpectedly"),
        }
    }

    #[tokio::test]
    async fn test_direct_commands() {
        let (mut session, _, _) = session();

        assert_eq!(lines(session.handle_line("SET a 1\r\n").await), vec!["OK"]);
        assert_eq!(lines(session.handle_line("GET a").await), vec!["\"1\""]);
        assert_eq!(lines(session.handle_line("GET missing").await), vec!["(nil)"]);
    }

    #[tokio::test]
    async fn test_blank_line_gets_no_reply() {
        let (mut session, _, _) = session();
        assert_eq!(session.handle_line("   \n").await, Outcome::Continue(vec![]));
    }

    #[tokio::test]
    async fn test_transaction_scenario() {
        let (mut session, store, _) = session();

        assert_eq!(lines(session.handle_line("MULTI").await), vec!["OK"]);
        assert_eq!(lines(session.handle_line("SET a \"1 2\"").await), vec!["QUEUED"]);
        assert_eq!(lines(session.handle_line("GET a").await), vec!["QUEUED"]);

        // Nothing runs before EXEC
        assert_eq!(store.get("a").await, None);

        assert_eq!(
            lines(session.handle_line("EXEC").await),
            vec!["OK", "\"1 2\""]
        );
        assert!(!session.in_transaction());
        assert_eq!(lines(session.handle_line("GET a").await), vec!["\"1 2\""]);
    }

    #[tokio::test]
    async fn test_exec_without_multi() {
        let (mut session, store, _) = session();

        assert_eq!(
            lines(session.handle_line("EXEC").await),
            vec!["ERR No transaction in progress"]
        );
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_second_exec_fails() {
        let (mut session, _, _) = session();

        session.handle_line("MULTI").await;
        session.handle_line("INCR n").await;
        assert_eq!(lines(session.handle_line("EXEC").await), vec!["OK"]);
        assert_eq!(
            lines(session.handle_line("EXEC").await),
            vec!["ERR No transaction in progress"]
        );
    }

    #[tokio::test]
    async fn test_failed_queued_command_does_not_abort_batch() {
        let (mut session, store, _) = session();

        session.handle_line("MULTI").await;
        assert_eq!(lines(session.handle_line("SET a").await), vec!["QUEUED"]);
        session.handle_line("SET w text").await;
        session.handle_line("INCR w").await;
        session.handle_line("INCRBY n 5").await;
        session.handle_line("DELETE w").await;

        assert_eq!(
            lines(session.handle_line("EXEC").await),
            vec![
                "Usage: SET <key> <value>",
                "OK",
                "ERR value is not an integer",
                "(integer) 5",
                "(integer) 1",
            ]
        );
        assert_eq!(store.get("n").await, Some("5".to_string()));
        assert!(!store.exists("w").await);
    }

    #[tokio::test]
    async fn test_multi_restarts_queue() {
        let (mut session, store, _) = session();

        session.handle_line("MULTI").await;
        session.handle_line("SET lost 1").await;
        assert_eq!(lines(session.handle_line("multi").await), vec!["OK"]);
        session.handle_line("SET kept 1").await;

        assert_eq!(lines(session.handle_line("EXEC").await), vec!["OK"]);
        assert!(!store.exists("lost").await);
        assert!(store.exists("kept").await);
    }

    #[tokio::test]
    async fn test_empty_transaction() {
        let (mut session, _, _) = session();

        session.handle_line("MULTI").await;
        assert_eq!(session.handle_line("EXEC").await, Outcome::Continue(vec![]));
        assert!(!session.in_transaction());
    }

    #[tokio::test]
    async fn test_unknown_command_inside_transaction_is_not_queued() {
        let (mut session, _, _) = session();

        session.handle_line("MULTI").await;
        assert_eq!(
            lines(session.handle_line("FOO").await),
            vec!["Unknown command: FOO"]
        );
        assert_eq!(session.handle_line("EXEC").await, Outcome::Continue(vec![]));
    }

    #[tokio::test]
    async fn test_disconnect_discards_transaction() {
        let (mut session, store, transactions) = session();

        session.handle_line("MULTI").await;
        session.handle_line("SET a 1").await;
        assert_eq!(session.handle_line("DISCONNECT").await, Outcome::Close);

        session.close().await;
        assert_eq!(transactions.open_count().await, 0);
        assert!(!store.exists("a").await);
    }

    #[tokio::test]
    async fn test_sessions_have_separate_transactions() {
        let store = Arc::new(MemoryStore::new());
        let transactions = Arc::new(TransactionTable::new());
        let mut first = Session::new(Arc::clone(&store), Arc::clone(&transactions));
        let mut second = Session::new(Arc::clone(&store), Arc::clone(&transactions));
        assert_ne!(first.transaction_id(), second.transaction_id());

        first.handle_line("MULTI").await;
        first.handle_line("SET a 1").await;
        second.handle_line("MULTI").await;
        second.handle_line("SET b 2").await;

        assert_eq!(lines(second.handle_line("EXEC").await), vec!["OK"]);
        assert!(!store.exists("a").await);
        assert_eq!(lines(first.handle_line("EXEC").await), vec!["OK"]);
        assert!(store.exists("a").await);
    }
}
