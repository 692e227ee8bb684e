use crate::query::{QueryError, QueryResponse};
use crate::session::ChatId;

/// Results coming back from the runtime to the UI thread.
#[derive(Debug)]
pub enum AppEvent {
    QueryFinished {
        /// Chat that was current when the prompt was submitted.
        submitted_in: ChatId,
        outcome: Result<QueryResponse, QueryError>,
    },
}

/// User intents collected while rendering a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Submit(String),
    NewChat,
    SelectChat(ChatId),
    DeleteChat(ChatId),
    ToggleTheme,
}
