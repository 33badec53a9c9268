//! Chat controller owning one conversation

use futures::StreamExt;

use super::accumulator::{ConversationView, GenerationSummary, StreamAccumulator};
use super::client::{rejection_detail, GenerationClient};
use super::conversation::{Conversation, ConversationError, Message};
use crate::api::GenerationRequest;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How a submission ended. Every failure has already been written into the
/// conversation as an assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank prompt, nothing sent
    Ignored,
    /// The server accepted the request and its stream was read
    Streamed(GenerationSummary),
    /// The server answered with a non-2xx status
    Rejected { status: u16 },
    /// The request never got a response
    TransportFailed,
}

/// Owns the conversation and drives one generation at a time
pub struct ChatSession {
    client: GenerationClient,
    model: String,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, ChatError> {
        Ok(Self {
            client: GenerationClient::new(endpoint)?,
            model: model.into(),
            conversation: Conversation::new(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Messages to draw; an empty conversation gets the welcome message first
    pub fn render(&mut self) -> &[Message] {
        self.conversation.ensure_welcome();
        self.conversation.messages()
    }

    pub fn clear(&mut self) -> Result<(), ChatError> {
        self.conversation.clear()?;
        Ok(())
    }

    /// Send `prompt` and stream the reply into the conversation.
    ///
    /// `view` is republished after the user message, after the reply is
    /// opened, after every text fragment and after every error notice.
    pub async fn submit(&mut self, prompt: &str, view: &mut dyn ConversationView) -> Result<SubmitOutcome, ChatError> {
        if prompt.trim().is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        self.conversation.push_user(prompt)?;
        view.publish(self.conversation.messages());

        let request = GenerationRequest::new(self.model.as_str(), prompt, true);
        let response = match self.client.send(&request).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, endpoint = %self.client.endpoint(), "Generation request failed");
                self.notify(format!("Error: {}", e), view);
                return Ok(SubmitOutcome::TransportFailed);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = rejection_detail(response).await;
            tracing::error!(status = %status, detail = %detail, "Generation rejected");
            self.notify(format!("Error: {}", detail), view);
            return Ok(SubmitOutcome::Rejected {
                status: status.as_u16(),
            });
        }

        self.conversation.begin_assistant()?;
        view.publish(self.conversation.messages());

        let mut accumulator = StreamAccumulator::new();
        let mut body = response.bytes_stream();
        let mut failure = None;

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => accumulator.feed(&bytes, &mut self.conversation, view),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let summary = match failure {
            None => {
                let summary = accumulator.finish(&mut self.conversation, view);
                self.conversation.finish_assistant();
                summary
            }
            Some(e) => {
                let summary = accumulator.abandon();
                self.conversation.finish_assistant();
                tracing::error!(error = %e, "Generation stream broke");
                self.notify(format!("Error: {}", e), view);
                summary
            }
        };

        tracing::debug!(
            fragments = summary.fragments,
            parse_errors = summary.parse_errors,
            completed = summary.completed,
            "Generation finished"
        );

        Ok(SubmitOutcome::Streamed(summary))
    }

    fn notify(&mut self, content: String, view: &mut dyn ConversationView) {
        self.conversation.push_notice(content);
        view.publish(self.conversation.messages());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::accumulator::{RecordingView, INVALID_RESPONSE_MESSAGE};
    use crate::chat::conversation::{Role, WELCOME_MESSAGE};
    use crate::test_support::{spawn_upstream, unreachable_url};
    use axum::body::{Body, Bytes};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    /// Upstream that answers /api/generate with the given chunks, one body frame each
    async fn streaming_upstream(chunks: Vec<&'static str>) -> String {
        let router = Router::new().route(
            "/api/generate",
            post(move || {
                let chunks = chunks.clone();
                async move {
                    let stream = futures::stream::iter(
                        chunks.into_iter().map(|c| Ok::<_, std::io::Error>(Bytes::from(c))),
                    );
                    Body::from_stream(stream)
                }
            }),
        );
        format!("{}/api/generate", spawn_upstream(router).await)
    }

    #[tokio::test]
    async fn test_submit_streams_reply() {
        let endpoint = streaming_upstream(vec!["{\"response\":\"Hel\"}\n{\"resp", "onse\":\"lo\"}\n"]).await;
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();
        let mut view = RecordingView::default();

        let outcome = session.submit("hi", &mut view).await.unwrap();

        let summary = match outcome {
            SubmitOutcome::Streamed(s) => s,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(summary.fragments, 2);
        assert!(summary.completed);

        let messages = session.conversation().messages();
        assert_eq!(messages, &[Message::user("hi"), Message::assistant("Hello")]);
        assert!(!session.conversation().is_generating());

        // user message, empty placeholder, then each fragment
        assert_eq!(view.snapshots.len(), 4);
        assert_eq!(view.snapshots[1][1], Message::assistant(""));
        assert_eq!(view.last().unwrap(), messages);
    }

    #[tokio::test]
    async fn test_submit_sends_generation_request() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let router = Router::new().route(
            "/api/generate",
            post(move |body: Bytes| {
                let seen = seen_clone.clone();
                async move {
                    *seen.lock().unwrap() = Some(serde_json::from_slice::<serde_json::Value>(&body).unwrap());
                    "{\"response\":\"ok\"}\n"
                }
            }),
        );
        let endpoint = format!("{}/api/generate", spawn_upstream(router).await);
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();

        session.submit("hi", &mut RecordingView::default()).await.unwrap();

        assert_eq!(
            seen.lock().unwrap().clone().unwrap(),
            serde_json::json!({"model": "llama3", "prompt": "hi", "stream": true})
        );
    }

    #[tokio::test]
    async fn test_submit_malformed_line() {
        let endpoint = streaming_upstream(vec!["{\"response\":\"a\"}\n<html>\n{\"response\":\"b\"}\n"]).await;
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();

        let outcome = session.submit("hi", &mut RecordingView::default()).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Streamed(s) if s.parse_errors == 1 && s.completed));
        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "ab");
        assert_eq!(messages[2].content, INVALID_RESPONSE_MESSAGE);
    }

    #[tokio::test]
    async fn test_submit_rejected_with_json_error() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::NOT_FOUND, r#"{"error":"model \"llama3\" not found"}"#) }),
        );
        let endpoint = format!("{}/api/generate", spawn_upstream(router).await);
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();
        let mut view = RecordingView::default();

        let outcome = session.submit("hi", &mut view).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Rejected { status: 404 });
        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], Message::assistant("Error: model \"llama3\" not found"));
        assert!(!session.conversation().is_generating());
    }

    #[tokio::test]
    async fn test_submit_rejected_through_proxy_body() {
        let router = Router::new().route(
            "/api/ollama-proxy",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    r#"{"error":"Failed to generate response","details":"{\"error\":\"oom\"}"}"#,
                )
            }),
        );
        let endpoint = format!("{}/api/ollama-proxy", spawn_upstream(router).await);
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();

        session.submit("hi", &mut RecordingView::default()).await.unwrap();

        let messages = session.conversation().messages();
        assert_eq!(messages[1].content, "Error: Failed to generate response");
    }

    #[tokio::test]
    async fn test_submit_rejected_without_json() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let endpoint = format!("{}/api/generate", spawn_upstream(router).await);
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();

        let outcome = session.submit("hi", &mut RecordingView::default()).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Rejected { status: 502 });
        assert_eq!(
            session.conversation().messages()[1].content,
            "Error: HTTP error! status: 502"
        );
    }

    #[tokio::test]
    async fn test_submit_transport_failure() {
        let endpoint = format!("{}/api/generate", unreachable_url().await);
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();

        let outcome = session.submit("hi", &mut RecordingView::default()).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::TransportFailed);
        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_submit_body_breaks_after_headers() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async {
                let stream = futures::stream::unfold(0u8, |step| async move {
                    match step {
                        0 => Some((Ok(Bytes::from("{\"response\":\"Hel\"}\n{\"resp")), 1)),
                        1 => {
                            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                            Some((Err(std::io::Error::new(std::io::ErrorKind::Other, "boom")), 2))
                        }
                        _ => None,
                    }
                });
                Body::from_stream(stream)
            }),
        );
        let endpoint = format!("{}/api/generate", spawn_upstream(router).await);
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();
        let mut view = RecordingView::default();

        let outcome = session.submit("hi", &mut view).await.unwrap();

        let summary = match outcome {
            SubmitOutcome::Streamed(s) => s,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(!summary.completed);
        assert_eq!(summary.fragments, 1);

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::assistant("Hel"));
        assert_eq!(messages[2].role, Role::Assistant);
        assert!(messages[2].content.starts_with("Error: "));
        assert_eq!(messages.iter().filter(|m| m.content.starts_with("Error: ")).count(), 1);
        assert!(!session.conversation().is_generating());
    }

    #[tokio::test]
    async fn test_blank_prompt_is_ignored() {
        let endpoint = format!("{}/api/generate", unreachable_url().await);
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();
        let mut view = RecordingView::default();

        let outcome = session.submit("  \n", &mut view).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Ignored);
        assert!(session.conversation().is_empty());
        assert!(view.snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_clear_reinstates_welcome_on_render() {
        let endpoint = streaming_upstream(vec!["{\"response\":\"x\"}\n"]).await;
        let mut session = ChatSession::new(endpoint, "llama3").unwrap();

        assert_eq!(session.render(), &[Message::assistant(WELCOME_MESSAGE)]);
        session.submit("hi", &mut RecordingView::default()).await.unwrap();
        assert_eq!(session.render().len(), 3);

        session.clear().unwrap();
        assert!(session.conversation().is_empty());
        assert_eq!(session.render(), &[Message::assistant(WELCOME_MESSAGE)]);
        assert_eq!(session.render().len(), 1);
    }
}
