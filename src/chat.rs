use crate::api::{ChatMessage, CompletionClient};
use crate::config::AgConfig;
use crate::error::Result;
use crate::render::{RenderedResponse, StreamRenderer};
use crate::session::{Message, SessionStore};
use crate::spinner::{Handoff, Spinner};
use chrono::{DateTime, Utc};
use std::io::{self, IsTerminal};
use std::sync::Arc;

/// One request: the resolved prompt and where its turn is stored.
#[derive(Debug, Clone)]
pub struct Turn {
    pub model: String,
    pub session: String,
    pub prompt: String,
    pub plain: bool,
}

/// Sends `turn` with the session history, streams the answer to stdout and
/// appends the completed turn to the session.
///
/// Nothing is stored unless the whole stream arrived.
pub fn send(
    client: &CompletionClient,
    store: &SessionStore,
    config: &AgConfig,
    turn: &Turn,
) -> Result<RenderedResponse> {
    let history = store.create(&turn.session)?;
    let mut messages: Vec<ChatMessage> = history.messages.iter().map(ChatMessage::from).collect();
    messages.push(ChatMessage::user(turn.prompt.clone()));

    let runtime = tokio::runtime::Runtime::new()?;

    let asked_at = Utc::now();
    tracing::info!(
        model = %turn.model,
        session = %turn.session,
        history = history.messages.len(),
        "Sending prompt"
    );

    // Without a terminal on stderr there is no status line to hand over.
    let handoff = Arc::new(if io::stderr().is_terminal() {
        Handoff::new()
    } else {
        Handoff::yielded()
    });
    let spinner = (!handoff.has_yielded()).then(|| {
        Spinner::spawn(
            turn.model.clone(),
            Arc::clone(&handoff),
            config.spinner_interval,
            Box::new(io::stderr()),
        )
    });

    let result: Result<RenderedResponse> = runtime.block_on(async {
        let deltas = client.stream_chat(&turn.model, &messages).await?;
        StreamRenderer::new(io::stdout(), turn.plain, &handoff)
            .render(deltas)
            .await
    });
    if let Some(spinner) = spinner {
        spinner.finish();
    }
    let rendered = result?;
    tracing::debug!(lines = rendered.lines, "Response complete");

    save_turn(store, turn, asked_at, &rendered.content)?;
    Ok(rendered)
}

/// Appends the user prompt, then the answer, to the turn's session.
fn save_turn(
    store: &SessionStore,
    turn: &Turn,
    asked_at: DateTime<Utc>,
    answer: &str,
) -> Result<()> {
    let answered_at = Utc::now();
    store.append(&turn.session, Message::user(turn.prompt.clone(), asked_at))?;
    store.append(
        &turn.session,
        Message::assistant(answer, turn.model.clone(), answered_at),
    )?;
    tracing::info!(
        session = %turn.session,
        bytes = answer.len(),
        "Turn saved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use std::net::TcpListener;
    use std::time::Duration;
    use tempfile::TempDir;

    fn turn(session: &str) -> Turn {
        Turn {
            model: "m1".to_string(),
            session: session.to_string(),
            prompt: "Hi".to_string(),
            plain: true,
        }
    }

    #[test]
    fn test_save_turn_appends_user_then_assistant() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::open(temp_dir.path()).unwrap();
        let asked_at = Utc::now();

        save_turn(&store, &turn("demo"), asked_at, "Hello").unwrap();

        let messages = store.load("demo").unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Hi");
        assert_eq!(messages[0].timestamp, asked_at);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello");
        assert_eq!(messages[1].model.as_deref(), Some("m1"));
        assert!(messages[1].timestamp >= messages[0].timestamp);
    }

    #[test]
    fn test_save_turn_keeps_empty_answer() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::open(temp_dir.path()).unwrap();

        save_turn(&store, &turn("quiet"), Utc::now(), "").unwrap();

        let messages = store.load("quiet").unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "");
    }

    #[test]
    fn test_failed_request_persists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let config = AgConfig::load(temp_dir.path().to_path_buf()).unwrap();
        let store = SessionStore::open(temp_dir.path()).unwrap();

        // a port that was just released refuses connections
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = CompletionClient::new(
            "test-key",
            &format!("http://127.0.0.1:{}/v1", port),
            Duration::from_secs(2),
        )
        .unwrap();

        let result = send(&client, &store, &config, &turn("offline"));

        assert!(result.is_err());
        assert!(store.load("offline").unwrap().messages.is_empty());
    }
}
