//! Turns user commands into session mutations and remote queries.

use crate::event::{AppEvent, UiCommand};
use crate::query::{reply_contents, QueryClient, QueryError, QueryResponse};
use crate::session::manager::SessionManager;
use crate::session::Role;
use std::sync::mpsc;
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

pub struct Conversation {
    sessions: SessionManager,
    client: QueryClient,
    runtime_handle: Handle,
    tx: mpsc::Sender<AppEvent>,
    dark_mode: bool,
    in_flight: usize,
}

impl Conversation {
    pub fn new(
        sessions: SessionManager,
        client: QueryClient,
        runtime_handle: Handle,
        tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        let dark_mode = sessions.store().dark_mode();
        Self {
            sessions,
            client,
            runtime_handle,
            tx,
            dark_mode,
            in_flight: 0,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// Requests sent whose replies have not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn handle(&mut self, command: UiCommand) {
        match command {
            UiCommand::Submit(text) => {
                self.submit(&text);
            }
            UiCommand::NewChat => {
                self.sessions.new_chat();
            }
            UiCommand::SelectChat(id) => {
                if let Err(err) = self.sessions.select_chat(id) {
                    warn!(error = %err, "ignoring selection of a missing chat");
                }
            }
            UiCommand::DeleteChat(id) => {
                if let Err(err) = self.sessions.delete_chat(id) {
                    warn!(error = %err, "ignoring deletion of a missing chat");
                }
            }
            UiCommand::ToggleTheme => {
                self.dark_mode = !self.dark_mode;
                self.sessions.store_mut().set_dark_mode(self.dark_mode);
                debug!(dark_mode = self.dark_mode, "theme toggled");
            }
        }
    }

    /// Appends the trimmed prompt as a user message and fires the query.
    ///
    /// Returns false for blank input. Replies arrive later as
    /// [`AppEvent::QueryFinished`] and are appended in arrival order.
    pub fn submit(&mut self, text: &str) -> bool {
        let prompt = text.trim();
        if prompt.is_empty() {
            return false;
        }

        self.sessions.append_message(Role::User, prompt);
        self.in_flight += 1;

        let submitted_in = self.sessions.current();
        let client = self.client.clone();
        let tx = self.tx.clone();
        let prompt = prompt.to_string();
        info!(chat_id = %submitted_in, url = client.url(), "sending query");

        let query = self
            .runtime_handle
            .spawn(async move { client.run_query(&prompt).await });
        self.runtime_handle.spawn(async move {
            let outcome = task_outcome(query.await);
            if tx
                .send(AppEvent::QueryFinished {
                    submitted_in,
                    outcome,
                })
                .is_err()
            {
                debug!(chat_id = %submitted_in, "ui closed before the reply arrived");
            }
        });
        true
    }

    /// Applies a finished query to whichever chat is current now.
    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::QueryFinished {
                submitted_in,
                outcome,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if let Err(err) = &outcome {
                    warn!(chat_id = %submitted_in, error = %err, "query failed");
                }
                if submitted_in != self.sessions.current() {
                    debug!(
                        submitted_in = %submitted_in,
                        current = %self.sessions.current(),
                        "reply lands in a different chat than its prompt"
                    );
                }

                for content in reply_contents(outcome) {
                    self.sessions.append_message(Role::Assistant, content);
                }
            }
        }
    }
}

/// Every spawned query reports back exactly once, even when its task panicked
/// or was cancelled, so the pending count always drains.
fn task_outcome(
    joined: Result<Result<QueryResponse, QueryError>, JoinError>,
) -> Result<QueryResponse, QueryError> {
    joined.unwrap_or_else(|err| {
        warn!(error = %err, "query task did not complete");
        Err(QueryError::Transport(format!("query task failed: {err}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{ChatStore, MemoryStorage};
    use crate::session::{ChatId, Message};
    use serde_json::json;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn start(storage: MemoryStorage, url: &str) -> (Conversation, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        let sessions = SessionManager::initialize(ChatStore::new(storage));
        (
            Conversation::new(sessions, QueryClient::new(url), Handle::current(), tx),
            rx,
        )
    }

    async fn next_event(rx: mpsc::Receiver<AppEvent>) -> (AppEvent, mpsc::Receiver<AppEvent>) {
        tokio::task::spawn_blocking(move || {
            let event = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("query should finish");
            (event, rx)
        })
        .await
        .unwrap()
    }

    fn finished(chat: ChatId, summary: &str) -> AppEvent {
        AppEvent::QueryFinished {
            submitted_in: chat,
            outcome: Ok(QueryResponse {
                summary: Some(summary.into()),
                ..QueryResponse::default()
            }),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_round_trip_persists_user_and_assistant_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run_query"))
            .and(body_json(json!({ "UserPrompt": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "summary": "hi" })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = MemoryStorage::default();
        let (mut conversation, rx) =
            start(storage.clone(), &format!("{}/run_query", server.uri()));

        assert!(conversation.submit("  hello  "));
        assert_eq!(conversation.in_flight(), 1);
        assert_eq!(conversation.sessions().conversation(), &[Message::user("hello")]);

        let (event, _rx) = next_event(rx).await;
        conversation.apply_event(event);

        let expected = [Message::user("hello"), Message::assistant("hi")];
        assert_eq!(conversation.in_flight(), 0);
        assert_eq!(conversation.sessions().conversation(), &expected);

        let current = conversation.sessions().current();
        let persisted = ChatStore::new(storage).load_collection();
        assert_eq!(persisted.messages(current).unwrap(), &expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_error_is_shown_with_prefix_and_no_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad",
                "rowData": [{"a": 1}]
            })))
            .mount(&server)
            .await;

        let (mut conversation, rx) =
            start(MemoryStorage::default(), &format!("{}/run_query", server.uri()));
        conversation.submit("x");
        let (event, _rx) = next_event(rx).await;
        conversation.apply_event(event);

        assert_eq!(
            conversation.sessions().conversation(),
            &[Message::user("x"), Message::assistant("Error: bad")]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn row_data_appends_summary_then_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "summary": "Two rows.",
                "rowData": [{"a": 1, "b": null}, {"a": 2, "b": 3}]
            })))
            .mount(&server)
            .await;

        let (mut conversation, rx) =
            start(MemoryStorage::default(), &format!("{}/run_query", server.uri()));
        conversation.submit("rows please");
        let (event, _rx) = next_event(rx).await;
        conversation.apply_event(event);

        let shown = conversation.sessions().conversation();
        assert_eq!(shown.len(), 3);
        assert_eq!(shown[1], Message::assistant("Two rows."));
        assert_eq!(
            shown[2].content,
            "<table><tr><th>a</th><th>b</th></tr>\
             <tr><td>1</td><td>N/A</td></tr><tr><td>2</td><td>3</td></tr></table>"
        );
    }

    #[tokio::test]
    async fn blank_submission_is_ignored() {
        let (mut conversation, _rx) =
            start(MemoryStorage::default(), "http://127.0.0.1:9/run_query");

        assert!(!conversation.submit("   "));
        conversation.handle(UiCommand::Submit("\n\t".to_string()));

        assert_eq!(conversation.in_flight(), 0);
        assert!(conversation.sessions().conversation().is_empty());
    }

    #[tokio::test]
    async fn replies_are_appended_in_arrival_order() {
        let (mut conversation, _rx) =
            start(MemoryStorage::default(), "http://127.0.0.1:9/run_query");
        let chat = conversation.sessions().current();

        conversation.apply_event(finished(chat, "answer to B"));
        conversation.apply_event(finished(chat, "answer to A"));

        assert_eq!(
            conversation.sessions().conversation(),
            &[Message::assistant("answer to B"), Message::assistant("answer to A")]
        );
    }

    #[tokio::test]
    async fn panicked_query_task_still_clears_pending_count() {
        let (mut conversation, _rx) =
            start(MemoryStorage::default(), "http://127.0.0.1:9/run_query");
        let chat = conversation.sessions().current();
        assert!(conversation.submit("boom"));
        assert_eq!(conversation.in_flight(), 1);

        let worker: JoinHandle<Result<QueryResponse, QueryError>> =
            tokio::spawn(async { panic!("worker crashed") });
        let crashed = worker.await;
        assert!(crashed.as_ref().is_err_and(JoinError::is_panic));
        let outcome = task_outcome(crashed);
        assert!(matches!(outcome, Err(QueryError::Transport(_))));

        conversation.apply_event(AppEvent::QueryFinished {
            submitted_in: chat,
            outcome,
        });
        assert_eq!(conversation.in_flight(), 0);
        let shown = conversation.sessions().conversation();
        assert!(shown[1].content.starts_with("Error: query task failed"));
    }

    #[tokio::test]
    async fn reply_goes_to_chat_current_at_arrival() {
        let (mut conversation, _rx) =
            start(MemoryStorage::default(), "http://127.0.0.1:9/run_query");
        let first = conversation.sessions().current();
        conversation.handle(UiCommand::NewChat);
        let second = conversation.sessions().current();

        conversation.apply_event(finished(first, "late"));

        let chats = conversation.sessions().chats();
        assert!(chats.messages(first).unwrap().is_empty());
        assert_eq!(chats.messages(second).unwrap(), &[Message::assistant("late")]);
    }

    #[tokio::test]
    async fn transport_failure_becomes_error_message() {
        let (mut conversation, _rx) =
            start(MemoryStorage::default(), "http://127.0.0.1:9/run_query");
        let chat = conversation.sessions().current();

        conversation.apply_event(AppEvent::QueryFinished {
            submitted_in: chat,
            outcome: Err(QueryError::Transport("connection refused".to_string())),
        });

        assert_eq!(
            conversation.sessions().conversation(),
            &[Message::assistant("Error: connection refused")]
        );
        assert!(conversation.sessions().chats().contains(chat));
    }

    #[tokio::test]
    async fn deleting_an_entry_does_not_select_it() {
        let (mut conversation, _rx) =
            start(MemoryStorage::default(), "http://127.0.0.1:9/run_query");
        let first = conversation.sessions().current();
        conversation.handle(UiCommand::NewChat);
        let second = conversation.sessions().current();
        conversation.handle(UiCommand::SelectChat(first));

        conversation.handle(UiCommand::DeleteChat(second));

        assert_eq!(conversation.sessions().current(), first);
        assert!(!conversation.sessions().chats().contains(second));
    }

    #[tokio::test]
    async fn stale_commands_for_missing_chats_are_ignored() {
        let (mut conversation, _rx) =
            start(MemoryStorage::default(), "http://127.0.0.1:9/run_query");
        let current = conversation.sessions().current();

        conversation.handle(UiCommand::SelectChat(ChatId(1)));
        conversation.handle(UiCommand::DeleteChat(ChatId(1)));

        assert_eq!(conversation.sessions().current(), current);
        assert_eq!(conversation.sessions().chats().len(), 1);
    }

    #[tokio::test]
    async fn theme_toggle_persists_flag() {
        let storage = MemoryStorage::default();
        let (mut conversation, _rx) = start(storage.clone(), "http://127.0.0.1:9/run_query");
        assert!(!conversation.dark_mode());

        conversation.handle(UiCommand::ToggleTheme);
        assert!(conversation.dark_mode());
        assert!(ChatStore::new(storage.clone()).dark_mode());

        let (reloaded, _rx) = start(storage, "http://127.0.0.1:9/run_query");
        assert!(reloaded.dark_mode());
    }
}
