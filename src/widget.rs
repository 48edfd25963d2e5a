//! The chat widget: turns a submission into a rendered user message and a
//! background exchange with the chat endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::cookie::TokenProvider;
use crate::state::{Message, Sender};
use crate::transport::{ChatTransport, OutgoingRequest};

/// Text entry holding the pending message.
pub trait InputField: Send + Sync {
    fn value(&self) -> String;
    fn clear(&self);
}

/// Append-only container of rendered messages.
pub trait TranscriptView: Send + Sync {
    fn append(&self, message: Message);
    fn scroll_to_bottom(&self);
}

#[derive(Clone)]
pub struct ChatWidget {
    input: Arc<dyn InputField>,
    view: Arc<dyn TranscriptView>,
    transport: Arc<dyn ChatTransport>,
    tokens: Arc<dyn TokenProvider>,
    in_flight: Arc<AtomicUsize>,
}

impl ChatWidget {
    pub fn new(
        input: Arc<dyn InputField>,
        view: Arc<dyn TranscriptView>,
        transport: Arc<dyn ChatTransport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            input,
            view,
            transport,
            tokens,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Submit whatever is in the input field.
    ///
    /// Whitespace-only input is ignored. Otherwise the user message is
    /// rendered, the input cleared, and the exchange spawned. The handle may
    /// be dropped; the exchange handles its own failures.
    pub fn submit(&self) -> Option<JoinHandle<()>> {
        let raw = self.input.value();
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();

        self.render_message(Sender::User, &text);
        self.input.clear();

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let widget = self.clone();
        Some(tokio::spawn(async move {
            widget.send_message(text).await;
            widget.in_flight.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    pub fn render_message(&self, sender: Sender, text: &str) {
        self.view.append(Message::new(sender, text));
        self.view.scroll_to_bottom();
    }

    /// Run one exchange and render the reply, if any. Never fails: errors are
    /// logged and leave the transcript untouched.
    pub async fn send_message(&self, text: String) {
        let token = self.tokens.csrf_token();
        if token.is_none() {
            tracing::debug!("No CSRF token available, sending without one");
        }

        let request = OutgoingRequest { message: text };
        match self.transport.exchange(&request, token.as_deref()).await {
            Ok(reply) => {
                tracing::debug!("Reply received: {:?}", reply);
                if let Some(text) = reply.reply.filter(|r| !r.is_empty()) {
                    self.render_message(Sender::Bot, &text);
                }
            }
            Err(e) => {
                tracing::error!("Chat exchange failed: {}", e);
            }
        }
    }

    /// Number of exchanges that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::StaticToken;
    use crate::transport::{ExchangeError, IncomingReply};
    use crate::view::{InputBuffer, Transcript};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Scripted transport: pops one canned outcome per exchange and records
    /// every request it saw.
    struct FakeTransport {
        outcomes: Mutex<Vec<Result<IncomingReply, ExchangeError>>>,
        seen: Mutex<Vec<(OutgoingRequest, Option<String>)>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeTransport {
        fn new(outcomes: Vec<Result<IncomingReply, ExchangeError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(outcomes: Vec<Result<IncomingReply, ExchangeError>>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(outcomes)
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn exchange(
            &self,
            request: &OutgoingRequest,
            csrf_token: Option<&str>,
        ) -> Result<IncomingReply, ExchangeError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.clone(), csrf_token.map(str::to_string)));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(IncomingReply::default()))
        }
    }

    fn reply(text: &str) -> Result<IncomingReply, ExchangeError> {
        Ok(IncomingReply {
            reply: Some(text.to_string()),
        })
    }

    fn decode_failure() -> Result<IncomingReply, ExchangeError> {
        let err = serde_json::from_str::<IncomingReply>("<html>").unwrap_err();
        Err(ExchangeError::Decode(err))
    }

    struct Harness {
        widget: ChatWidget,
        input: Arc<InputBuffer>,
        transcript: Arc<Transcript>,
        transport: Arc<FakeTransport>,
    }

    fn harness(transport: FakeTransport) -> Harness {
        let input = Arc::new(InputBuffer::new());
        let transcript = Arc::new(Transcript::new());
        let transport = Arc::new(transport);
        let widget = ChatWidget::new(
            input.clone(),
            transcript.clone(),
            transport.clone(),
            Arc::new(StaticToken(Some("abc123".to_string()))),
        );
        Harness {
            widget,
            input,
            transcript,
            transport,
        }
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let h = harness(FakeTransport::new(vec![]));

        assert!(h.widget.submit().is_none());
        h.input.set_text("   \t ");
        assert!(h.widget.submit().is_none());

        assert!(h.transcript.is_empty());
        assert_eq!(h.transport.calls(), 0);
        assert_eq!(h.input.value(), "   \t ");
    }

    #[tokio::test]
    async fn test_user_message_rendered_before_reply() {
        let gate = Arc::new(Notify::new());
        let h = harness(FakeTransport::gated(vec![reply("hi there")], gate.clone()));

        h.input.set_text("  hello ");
        let handle = h.widget.submit().unwrap();

        // Exchange is parked on the gate; only the user message is visible.
        assert_eq!(h.transcript.snapshot(), vec![Message::new(Sender::User, "hello")]);
        assert_eq!(h.input.value(), "");
        assert_eq!(h.widget.in_flight(), 1);

        gate.notify_one();
        handle.await.unwrap();

        assert_eq!(
            h.transcript.snapshot(),
            vec![
                Message::new(Sender::User, "hello"),
                Message::new(Sender::Bot, "hi there"),
            ]
        );
        assert_eq!(h.widget.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_request_carries_trimmed_text_and_token() {
        let h = harness(FakeTransport::new(vec![reply("ok")]));

        h.input.set_text(" hello\n");
        h.widget.submit().unwrap().await.unwrap();

        let seen = h.transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.message, "hello");
        assert_eq!(seen[0].1.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_reply_without_text_adds_nothing() {
        let h = harness(FakeTransport::new(vec![
            Ok(IncomingReply::default()),
            reply(""),
        ]));

        h.input.set_text("first");
        h.widget.submit().unwrap().await.unwrap();
        h.input.set_text("second");
        h.widget.submit().unwrap().await.unwrap();

        let senders: Vec<Sender> = h.transcript.snapshot().iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::User]);
    }

    #[tokio::test]
    async fn test_failure_leaves_widget_usable() {
        let h = harness(FakeTransport::new(vec![decode_failure(), reply("back again")]));

        h.input.set_text("one");
        h.widget.submit().unwrap().await.unwrap();
        assert_eq!(h.transcript.len(), 1);
        assert_eq!(h.input.value(), "");
        assert_eq!(h.widget.in_flight(), 0);

        h.input.set_text("two");
        h.widget.submit().unwrap().await.unwrap();

        assert_eq!(
            h.transcript.snapshot(),
            vec![
                Message::new(Sender::User, "one"),
                Message::new(Sender::User, "two"),
                Message::new(Sender::Bot, "back again"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_adds_no_bot_message() {
        use crate::config::Config;
        use crate::transport::HttpTransport;
        use reqwest::cookie::Jar;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config {
            server_url: format!("http://{}", addr),
            ..Config::default()
        };
        let input = Arc::new(InputBuffer::new());
        let transcript = Arc::new(Transcript::new());
        let widget = ChatWidget::new(
            input.clone(),
            transcript.clone(),
            Arc::new(HttpTransport::new(&config, Arc::new(Jar::default())).unwrap()),
            Arc::new(StaticToken::default()),
        );

        input.set_text("anyone there?");
        widget.submit().unwrap().await.unwrap();
        input.set_text("still usable");
        widget.submit().unwrap().await.unwrap();

        let senders: Vec<Sender> = transcript.snapshot().iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::User]);
        assert_eq!(widget.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_submissions_both_render() {
        let gate = Arc::new(Notify::new());
        let h = harness(FakeTransport::gated(vec![reply("r1"), reply("r2")], gate.clone()));

        h.input.set_text("a");
        let first = h.widget.submit().unwrap();
        h.input.set_text("b");
        let second = h.widget.submit().unwrap();
        assert_eq!(h.widget.in_flight(), 2);

        // Let both exchanges reach the gate before releasing them together.
        while h.transport.calls() < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_waiters();
        first.await.unwrap();
        second.await.unwrap();

        let snapshot = h.transcript.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(&snapshot[..2], &[Message::new(Sender::User, "a"), Message::new(Sender::User, "b")]);
        let mut bot: Vec<&str> = snapshot[2..].iter().map(|m| m.text.as_str()).collect();
        bot.sort();
        assert_eq!(bot, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_render_message_requests_scroll() {
        let h = harness(FakeTransport::new(vec![]));

        assert!(!h.transcript.take_scroll_request());
        h.widget.render_message(Sender::Bot, "welcome");
        assert!(h.transcript.take_scroll_request());
        assert!(!h.transcript.take_scroll_request());
    }
}
