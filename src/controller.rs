//! the chat session controller: one request/response cycle per submission.
//!
//! the controller owns the transcript and the status, and talks to the ui only
//! through [`ChatView`]. a cycle is split in two so an event-driven host can run
//! the network call elsewhere:
//!
//! - [`ChatController::begin_submit`] validates input, applies the "before the
//!   call" view changes and returns the request to send.
//! - [`ChatController::finish`] applies the success or failure path.
//!
//! [`ChatController::submit`] glues both around a transport call for hosts that
//! can simply await.

use std::sync::Arc;

use bevy::log::{debug, error, info, warn};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::status::ApiStatus;
use crate::transcript::{ChatRole, Transcript, Turn};
use crate::transport::CompletionTransport;
use crate::view::{ChatView, MessageId};
use crate::wire::{CompletionRequest, HttpReply, compose_messages, extract_reply};

/// identifies one dispatched request; replies carrying another id are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// everything needed to perform the http call for one submission.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub id: RequestId,
    pub url: String,
    pub bearer: String,
    /// serialized [`CompletionRequest`].
    pub body: String,
    pub message_count: usize,
}

/// outcome of [`ChatController::begin_submit`].
#[derive(Debug)]
pub enum Submission {
    /// blank input or a request already in flight; nothing changed.
    Ignored,
    /// failed before any network call; the failure path is already applied.
    Failed(ChatError),
    Dispatch(PendingRequest),
}

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    placeholder: MessageId,
    user_turn: Turn,
}

pub struct ChatController {
    config: Arc<ChatConfig>,
    transcript: Transcript,
    status: ApiStatus,
    status_label: String,
    in_flight: Option<InFlight>,
    next_message: usize,
    next_request: u64,
}

impl ChatController {
    pub fn new(config: impl Into<Arc<ChatConfig>>) -> Self {
        Self {
            config: config.into(),
            transcript: Transcript::new(),
            status: ApiStatus::default(),
            status_label: String::new(),
            in_flight: None,
            next_message: 0,
            next_request: 0,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn status(&self) -> ApiStatus {
        self.status
    }

    pub fn status_label(&self) -> &str {
        &self.status_label
    }

    pub fn has_credential(&self) -> bool {
        self.config.has_credential()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// set the initial status and greet. meant to run once per session: a
    /// second call greets (and records the greeting) again.
    pub fn initialize<V: ChatView + ?Sized>(&mut self, view: &mut V) {
        let status = if self.has_credential() { ApiStatus::Idle } else { ApiStatus::Missing };
        info!(target: "dinner_chat", "initialize: key_present={}", self.has_credential());
        self.set_status(status, view);

        let greeting = self.config.greeting.clone();
        self.append_message(ChatRole::Assistant, &greeting, view);
        self.transcript.push(Turn::assistant(greeting));
    }

    /// validate `raw`, show the user bubble and the placeholder, lock input and
    /// build the request.
    pub fn begin_submit<V: ChatView + ?Sized>(&mut self, raw: &str, view: &mut V) -> Submission {
        let text = raw.trim();
        if text.is_empty() {
            return Submission::Ignored;
        }
        if let Some(in_flight) = &self.in_flight {
            debug!(target: "dinner_chat", "submit ignored: request {:?} in flight", in_flight.id);
            return Submission::Ignored;
        }

        self.append_message(ChatRole::User, text, view);
        view.clear_input();
        let thinking = self.config.thinking.clone();
        let placeholder = self.append_message(ChatRole::Assistant, &thinking, view);
        view.set_input_enabled(false);
        if self.has_credential() {
            self.set_status(ApiStatus::Checking, view);
        }

        let Some(bearer) = self.config.credential().map(str::to_string) else {
            return self.fail_early(placeholder, ChatError::MissingCredential, view);
        };

        let user_turn = Turn::user(format!("{}{}", self.config.user_prefix, text));
        let messages = compose_messages(&self.config.system_prompt, &self.transcript, user_turn.clone());
        let message_count = messages.len();
        let body = match CompletionRequest::new(&self.config, messages).to_json() {
            Ok(body) => body,
            Err(err) => return self.fail_early(placeholder, err, view),
        };

        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.in_flight = Some(InFlight { id, placeholder, user_turn });
        info!(target: "dinner_chat",
            "begin_submit: request={:?} msgs={} (transcript={}) text_len={}",
            id, message_count, self.transcript.len(), text.len()
        );

        Submission::Dispatch(PendingRequest {
            id,
            url: self.config.endpoint.clone(),
            bearer,
            body,
            message_count,
        })
    }

    /// apply the reply for `id`. returns `None` when `id` is not the request in
    /// flight (stale reply, nothing changed).
    pub fn finish<V: ChatView + ?Sized>(
        &mut self,
        id: RequestId,
        result: Result<HttpReply, ChatError>,
        view: &mut V,
    ) -> Option<Result<String, ChatError>> {
        let in_flight = match self.in_flight.take() {
            Some(f) if f.id == id => f,
            other => {
                warn!(target: "dinner_chat", "finish: discarding stale reply for {:?}", id);
                self.in_flight = other;
                return None;
            }
        };

        let outcome = result.and_then(|reply| extract_reply(&reply));
        match &outcome {
            Ok(reply) => {
                info!(target: "dinner_chat", "finish: request={:?} ok reply_len={}", id, reply.len());
                view.update_message(in_flight.placeholder, reply);
                self.transcript.push(in_flight.user_turn);
                self.transcript.push(Turn::assistant(reply.clone()));
                if self.has_credential() {
                    self.set_status(ApiStatus::Ready, view);
                }
            }
            Err(err) => self.show_failure(in_flight.placeholder, err, view),
        }
        view.set_input_enabled(true);
        Some(outcome)
    }

    /// full cycle around one transport call.
    ///
    /// `None` when the input was ignored.
    pub async fn submit<V: ChatView + ?Sized>(
        &mut self,
        text: &str,
        transport: &dyn CompletionTransport,
        view: &mut V,
    ) -> Option<Result<String, ChatError>> {
        match self.begin_submit(text, view) {
            Submission::Ignored => None,
            Submission::Failed(err) => Some(Err(err)),
            Submission::Dispatch(req) => {
                let result = transport.post_json(&req.url, &req.bearer, req.body).await;
                self.finish(req.id, result, view)
            }
        }
    }

    fn fail_early<V: ChatView + ?Sized>(&mut self, placeholder: MessageId, err: ChatError, view: &mut V) -> Submission {
        self.show_failure(placeholder, &err, view);
        view.set_input_enabled(true);
        Submission::Failed(err)
    }

    fn show_failure<V: ChatView + ?Sized>(&mut self, placeholder: MessageId, err: &ChatError, view: &mut V) {
        error!(target: "dinner_chat", "chat error: {} (status={:?})", err, err.status_code());
        let message = err.to_string();
        let text = if message.trim().is_empty() { self.config.generic_failure.clone() } else { message };
        view.update_message(placeholder, &text);
        self.set_status(ApiStatus::Error, view);
    }

    fn append_message<V: ChatView + ?Sized>(&mut self, role: ChatRole, text: &str, view: &mut V) -> MessageId {
        let id = MessageId(self.next_message);
        self.next_message += 1;
        view.append_message(id, role, text);
        id
    }

    fn set_status<V: ChatView + ?Sized>(&mut self, status: ApiStatus, view: &mut V) {
        let label = self.config.labels.for_status(status).to_string();
        view.set_status(status, &label);
        self.status = status;
        self.status_label = label;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GREETING, THINKING, USER_PREFIX};
    use crate::view::ViewCommand;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// hands out canned replies in order and records every call.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<HttpReply, ChatError>>>,
        calls: Mutex<Vec<(String, String, serde_json::Value)>>,
    }

    impl ScriptedTransport {
        fn with(replies: impl IntoIterator<Item = Result<HttpReply, ChatError>>) -> Self {
            Self { replies: Mutex::new(replies.into_iter().collect()), ..Default::default() }
        }
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
    #[cfg_attr(not(target_arch = "wasm32"), async_trait)]
    impl CompletionTransport for ScriptedTransport {
        async fn post_json(&self, url: &str, bearer: &str, body: String) -> Result<HttpReply, ChatError> {
            let body = serde_json::from_str(&body).unwrap();
            self.calls.lock().unwrap().push((url.to_string(), bearer.to_string(), body));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Transport("no scripted reply".into())))
        }
    }

    fn ok_reply(text: &str) -> Result<HttpReply, ChatError> {
        let body = serde_json::json!({"choices": [{"message": {"role": "assistant", "content": text}}]});
        Ok(HttpReply::new(200, body.to_string()))
    }

    fn keyed() -> ChatController {
        ChatController::new(ChatConfig::default().with_api_key(Some("sk-test")))
    }

    fn initialized(mut c: ChatController) -> (ChatController, Vec<ViewCommand>) {
        let mut view: Vec<ViewCommand> = Vec::new();
        c.initialize(&mut view);
        (c, view)
    }

    fn appended(view: &[ViewCommand]) -> Vec<(MessageId, ChatRole, String)> {
        view.iter()
            .filter_map(|c| match c {
                ViewCommand::AppendMessage { id, role, text } => Some((*id, *role, text.clone())),
                _ => None,
            })
            .collect()
    }

    fn last_update(view: &[ViewCommand], target: MessageId) -> Option<String> {
        view.iter().rev().find_map(|c| match c {
            ViewCommand::UpdateMessage { id, text } if *id == target => Some(text.clone()),
            _ => None,
        })
    }

    #[test]
    fn initialize_with_key_is_idle_and_greets() {
        let (c, view) = initialized(keyed());
        assert_eq!(c.status(), ApiStatus::Idle);
        assert_eq!(c.transcript().turns(), &[Turn::assistant(GREETING)]);
        assert_eq!(appended(&view), vec![(MessageId(0), ChatRole::Assistant, GREETING.to_string())]);
        assert!(matches!(view[0], ViewCommand::SetStatus { status: ApiStatus::Idle, .. }));
    }

    #[test]
    fn initialize_without_key_is_missing() {
        let (c, _) = initialized(ChatController::new(ChatConfig::default()));
        assert_eq!(c.status(), ApiStatus::Missing);
        assert_eq!(c.status_label(), ChatConfig::default().labels.missing);
        assert_eq!(c.transcript().len(), 1);
    }

    #[test]
    fn initialize_twice_duplicates_greeting() {
        let (mut c, mut view) = initialized(keyed());
        c.initialize(&mut view);
        assert_eq!(c.transcript().len(), 2);
        assert_eq!(appended(&view).len(), 2);
    }

    #[test]
    fn blank_input_changes_nothing() {
        let (mut c, _) = initialized(keyed());
        let transport = ScriptedTransport::default();
        for text in ["", "   ", "\n\t "] {
            let mut view: Vec<ViewCommand> = Vec::new();
            let out = pollster::block_on(c.submit(text, &transport, &mut view));
            assert!(out.is_none());
            assert!(view.is_empty());
        }
        assert_eq!(transport.call_count(), 0);
        assert_eq!(c.status(), ApiStatus::Idle);
        assert_eq!(c.transcript().len(), 1);
    }

    #[test]
    fn submit_appends_user_and_placeholder_bubbles() {
        let (mut c, _) = initialized(keyed());
        let mut view: Vec<ViewCommand> = Vec::new();
        let Submission::Dispatch(_) = c.begin_submit("  가벼운 메뉴  ", &mut view) else {
            panic!("expected dispatch");
        };
        assert_eq!(
            view,
            vec![
                ViewCommand::AppendMessage { id: MessageId(1), role: ChatRole::User, text: "가벼운 메뉴".into() },
                ViewCommand::ClearInput,
                ViewCommand::AppendMessage { id: MessageId(2), role: ChatRole::Assistant, text: THINKING.into() },
                ViewCommand::SetInputEnabled(false),
                ViewCommand::SetStatus {
                    status: ApiStatus::Checking,
                    label: ChatConfig::default().labels.checking,
                },
            ]
        );
        // transcript only grows once the reply is in
        assert_eq!(c.transcript().len(), 1);
        assert!(c.is_in_flight());
    }

    #[test]
    fn success_updates_placeholder_and_transcript() {
        let (mut c, _) = initialized(keyed());
        let transport = ScriptedTransport::with([ok_reply("스테이크 추천드려요")]);
        let mut view: Vec<ViewCommand> = Vec::new();
        let out = pollster::block_on(c.submit("고기 요리", &transport, &mut view));

        assert_eq!(out, Some(Ok("스테이크 추천드려요".to_string())));
        assert_eq!(last_update(&view, MessageId(2)).as_deref(), Some("스테이크 추천드려요"));
        assert_eq!(
            c.transcript().turns(),
            &[
                Turn::assistant(GREETING),
                Turn::user(format!("{USER_PREFIX}고기 요리")),
                Turn::assistant("스테이크 추천드려요"),
            ]
        );
        assert_eq!(c.status(), ApiStatus::Ready);
        assert_eq!(view.last(), Some(&ViewCommand::SetInputEnabled(true)));
        assert!(!c.is_in_flight());
    }

    #[test]
    fn request_carries_settings_history_and_prefix() {
        let (mut c, _) = initialized(keyed());
        let transport = ScriptedTransport::with([ok_reply("첫 추천"), ok_reply("두 번째")]);
        let mut view: Vec<ViewCommand> = Vec::new();
        pollster::block_on(c.submit("하나", &transport, &mut view));
        pollster::block_on(c.submit("둘", &transport, &mut view));

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let (url, bearer, body) = &calls[1];
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(bearer, "sk-test");
        assert_eq!(
            body,
            &serde_json::json!({
                "model": "gpt-4o-mini",
                "temperature": 0.8,
                "max_tokens": 320,
                "messages": [
                    {"role": "system", "content": crate::config::SYSTEM_PROMPT},
                    {"role": "assistant", "content": GREETING},
                    {"role": "user", "content": "요청 내용: 하나"},
                    {"role": "assistant", "content": "첫 추천"},
                    {"role": "user", "content": "요청 내용: 둘"},
                ]
            })
        );
    }

    #[test]
    fn http_error_message_shown_and_transcript_untouched() {
        let (mut c, _) = initialized(keyed());
        let transport =
            ScriptedTransport::with([Ok(HttpReply::new(401, r#"{"error":{"message":"invalid key"}}"#))]);
        let mut view: Vec<ViewCommand> = Vec::new();
        let out = pollster::block_on(c.submit("아무거나", &transport, &mut view));

        assert_eq!(out, Some(Err(ChatError::Http { status: 401, message: "invalid key".into() })));
        assert_eq!(last_update(&view, MessageId(2)).as_deref(), Some("invalid key"));
        assert_eq!(c.status(), ApiStatus::Error);
        assert_eq!(c.transcript().len(), 1);
        assert_eq!(view.last(), Some(&ViewCommand::SetInputEnabled(true)));
    }

    #[test]
    fn server_error_without_body_names_status() {
        let (mut c, _) = initialized(keyed());
        let transport = ScriptedTransport::with([Ok(HttpReply::new(500, ""))]);
        let mut view: Vec<ViewCommand> = Vec::new();
        pollster::block_on(c.submit("아무거나", &transport, &mut view));
        assert!(last_update(&view, MessageId(2)).unwrap().contains("500"));
        assert_eq!(c.status(), ApiStatus::Error);
    }

    #[test]
    fn empty_reply_and_network_failure_take_error_path() {
        let (mut c, _) = initialized(keyed());
        let transport = ScriptedTransport::with([
            ok_reply("  "),
            Err(ChatError::Transport("connection refused".into())),
        ]);
        let mut view: Vec<ViewCommand> = Vec::new();
        let first = pollster::block_on(c.submit("a", &transport, &mut view));
        assert_eq!(first, Some(Err(ChatError::EmptyReply)));
        let second = pollster::block_on(c.submit("b", &transport, &mut view));
        assert_eq!(second, Some(Err(ChatError::Transport("connection refused".into()))));
        assert_eq!(last_update(&view, MessageId(4)).as_deref(), Some("connection refused"));
        assert_eq!(c.transcript().len(), 1);
        // session stays usable
        assert!(!c.is_in_flight());
    }

    #[test]
    fn missing_key_fails_without_network() {
        let (mut c, _) = initialized(ChatController::new(ChatConfig::default()));
        let transport = ScriptedTransport::with([ok_reply("never")]);
        let mut view: Vec<ViewCommand> = Vec::new();
        let out = pollster::block_on(c.submit("파스타", &transport, &mut view));

        assert_eq!(out, Some(Err(ChatError::MissingCredential)));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(
            last_update(&view, MessageId(2)),
            Some(ChatError::MissingCredential.to_string())
        );
        // no "checking" without a key; the badge goes straight to error
        assert!(!view.iter().any(|c| matches!(c, ViewCommand::SetStatus { status: ApiStatus::Checking, .. })));
        assert_eq!(c.status(), ApiStatus::Error);
        assert!(!c.has_credential());
        assert_eq!(c.transcript().len(), 1);
        assert_eq!(appended(&view).len(), 2);
    }

    #[test]
    fn second_submit_while_in_flight_is_ignored() {
        let (mut c, _) = initialized(keyed());
        let mut view: Vec<ViewCommand> = Vec::new();
        let Submission::Dispatch(first) = c.begin_submit("하나", &mut view) else { panic!() };
        let before = view.len();
        assert!(matches!(c.begin_submit("둘", &mut view), Submission::Ignored));
        assert_eq!(view.len(), before);

        c.finish(first.id, ok_reply("ok"), &mut view);
        assert!(matches!(c.begin_submit("둘", &mut view), Submission::Dispatch(_)));
    }

    #[test]
    fn stale_reply_is_discarded() {
        let (mut c, _) = initialized(keyed());
        let mut view: Vec<ViewCommand> = Vec::new();
        let Submission::Dispatch(req) = c.begin_submit("하나", &mut view) else { panic!() };
        let before = view.len();

        assert!(c.finish(RequestId(req.id.0 + 7), ok_reply("late"), &mut view).is_none());
        assert_eq!(view.len(), before);
        assert!(c.is_in_flight());

        assert!(c.finish(req.id, ok_reply("fresh"), &mut view).is_some());
        assert!(c.finish(req.id, ok_reply("dup"), &mut view).is_none());
        assert_eq!(c.transcript().last(), Some(&Turn::assistant("fresh")));
    }
}
