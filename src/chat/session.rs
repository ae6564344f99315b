//! Chat transcript and the send/stream lifecycle
//!
//! The worker that talks to the backend only ever reports through [`ChatMsg`];
//! this type owns history, persistence and the send lock.

use super::markdown;
use crate::api::ScreenshotDetail;
use crate::config::Settings;
use crate::error::ApiError;
use crate::store::{LocalStore, CHAT_HISTORY_KEY};
use crate::ui::{self, Notification, NotificationKind};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const ERROR_PREFIX: &str = "Sorry, an error occurred: ";
const UNREACHABLE_DETAIL: &str = "cannot reach the server, check the API URL in settings";
const SEND_FAILED_NOTICE: &str = "Send failed, check the network connection and settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.role == Role::Assistant && self.content.starts_with(ERROR_PREFIX)
    }
}

/// Everything the preview popup shows about one screenshot.
#[derive(Debug, Clone)]
pub struct ScreenshotPreview {
    pub detail: ScreenshotDetail,
    /// Byte size and detected format, when the image endpoint answered.
    pub image: Option<(usize, String)>,
}

#[derive(Debug, Clone)]
pub enum PreviewState {
    Loading(i64),
    Loaded(Box<ScreenshotPreview>),
    Failed { id: i64, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEffect {
    Send { prompt: String },
    LoadPreview { seq: u64, screenshot_id: i64 },
}

#[derive(Debug)]
pub enum ChatMsg {
    /// 2xx status received, body not read yet.
    StreamOpened,
    Chunk(String),
    Completed,
    Failed(ApiError),
    /// Always the last message of a send, whatever happened before it.
    Finished,
    PreviewLoaded {
        seq: u64,
        result: Result<ScreenshotPreview, String>,
    },
}

pub struct ChatSession {
    pub messages: Vec<ChatMessage>,
    pub settings: Settings,
    pub input: String,
    pub sending: bool,
    pub thinking: bool,
    /// Index of the assistant message being streamed into.
    streaming: Option<usize>,
    pub selected_ref: Option<usize>,
    pub preview: Option<PreviewState>,
    preview_seq: u64,
    pub notification: Option<Notification>,
    store: Option<LocalStore>,
}

impl ChatSession {
    /// Session backed by `store`; history and settings are loaded from it.
    pub fn open(store: LocalStore) -> Self {
        let messages: Vec<ChatMessage> = store.load_or_default(CHAT_HISTORY_KEY);
        let settings = Settings::load(&store);
        info!("Loaded {} chat messages", messages.len());
        let mut session = Self::in_memory(settings);
        session.messages = messages;
        session.store = Some(store);
        session
    }

    /// Session that never touches disk.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            messages: Vec::new(),
            settings,
            input: String::new(),
            sending: false,
            thinking: false,
            streaming: None,
            selected_ref: None,
            preview: None,
            preview_seq: 0,
            notification: None,
            store: None,
        }
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            store.save_logged(CHAT_HISTORY_KEY, &self.messages);
        }
    }

    pub fn is_streaming(&self, index: usize) -> bool {
        self.streaming == Some(index)
    }

    /// Prompt text for `message`: up to `history_limit` earlier turns as
    /// `role: content` lines, then the new message.
    pub fn build_prompt(&self, message: &str) -> String {
        let limit = self.settings.history_limit;
        if !self.settings.local_history_enabled || limit == 0 || self.messages.is_empty() {
            return message.to_string();
        }
        let start = self.messages.len().saturating_sub(limit);
        let mut prompt = String::new();
        for turn in &self.messages[start..] {
            prompt.push_str(turn.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
        prompt.push_str("user: ");
        prompt.push_str(message);
        prompt
    }

    /// Take the input box contents and start a send.
    pub fn submit(&mut self) -> Option<ChatEffect> {
        let message = self.input.trim().to_string();
        if message.is_empty() || self.sending {
            return None;
        }
        let prompt = self.build_prompt(&message);
        self.input.clear();
        self.messages.push(ChatMessage::user(message));
        self.persist();
        self.sending = true;
        self.thinking = self.settings.enable_thinking;
        self.selected_ref = None;
        debug!("Sending prompt of {} chars", prompt.chars().count());
        Some(ChatEffect::Send { prompt })
    }

    pub fn apply(&mut self, msg: ChatMsg) {
        match msg {
            ChatMsg::StreamOpened => self.on_stream_opened(),
            ChatMsg::Chunk(text) => self.on_chunk(&text),
            ChatMsg::Completed => self.on_complete(),
            ChatMsg::Failed(err) => self.on_failure(&err),
            ChatMsg::Finished => self.on_finished(),
            ChatMsg::PreviewLoaded { seq, result } => {
                if seq == self.preview_seq && self.preview.is_some() {
                    self.preview = Some(match result {
                        Ok(p) => PreviewState::Loaded(Box::new(p)),
                        Err(error) => PreviewState::Failed {
                            id: self.preview_id().unwrap_or_default(),
                            error,
                        },
                    });
                }
            }
        }
    }

    fn on_stream_opened(&mut self) {
        self.messages.push(ChatMessage::assistant(""));
        self.streaming = Some(self.messages.len() - 1);
        self.persist();
    }

    fn on_chunk(&mut self, text: &str) {
        self.thinking = false;
        if text.is_empty() {
            return;
        }
        let Some(msg) = self.streaming.and_then(|i| self.messages.get_mut(i)) else {
            return;
        };
        msg.content.push_str(text);
        self.persist();
    }

    fn on_complete(&mut self) {
        self.thinking = false;
        if let Some(idx) = self.streaming.take() {
            let len = self.messages.get(idx).map_or(0, |m| m.content.len());
            info!("Reply complete ({} bytes)", len);
        }
        self.persist();
    }

    fn on_failure(&mut self, err: &ApiError) {
        warn!("Chat request failed: {}", err);
        self.thinking = false;
        if let Some(idx) = self.streaming.take() {
            if idx < self.messages.len() {
                self.messages.remove(idx);
            }
        }
        let detail = if err.is_unreachable() {
            UNREACHABLE_DETAIL.to_string()
        } else {
            err.to_string()
        };
        self.messages
            .push(ChatMessage::assistant(format!("{}{}", ERROR_PREFIX, detail)));
        self.persist();
        self.notify(SEND_FAILED_NOTICE, NotificationKind::Error);
    }

    fn on_finished(&mut self) {
        // a worker that died mid-stream leaves a dangling index behind
        if self.streaming.take().is_some() {
            self.persist();
        }
        self.sending = false;
        self.thinking = false;
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
        self.selected_ref = None;
        if let Some(store) = &self.store {
            if let Err(e) = store.delete(CHAT_HISTORY_KEY) {
                warn!("Failed to delete chat history: {}", e);
            }
        }
        self.notify("History cleared", NotificationKind::Info);
    }

    pub fn save_settings(&mut self, settings: Settings) {
        self.settings = settings;
        if let Some(store) = &self.store {
            self.settings.save(store);
        }
        self.notify("Settings saved", NotificationKind::Info);
    }

    // ------------------------------------------------------------------
    // Screenshot references
    // ------------------------------------------------------------------

    /// Messages whose `screenshot:` tokens are shown as chips. The reply
    /// still streaming is excluded.
    pub fn shows_refs(&self, index: usize) -> bool {
        self.messages
            .get(index)
            .is_some_and(|m| m.role == Role::Assistant && !m.is_error() && !self.is_streaming(index))
    }

    /// Every chip in transcript order, as the renderer numbers them.
    pub fn reference_ids(&self) -> Vec<i64> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(i, _)| self.shows_refs(*i))
            .flat_map(|(_, m)| markdown::reference_ids(&m.content))
            .collect()
    }

    pub fn cycle_ref(&mut self, forward: bool) {
        let total = self.reference_ids().len();
        if total == 0 {
            self.selected_ref = None;
            return;
        }
        self.selected_ref = Some(match self.selected_ref {
            None if forward => 0,
            None => total - 1,
            Some(i) if forward => (i + 1) % total,
            Some(i) => (i + total - 1) % total,
        });
    }

    pub fn open_preview(&mut self) -> Option<ChatEffect> {
        let id = *self.reference_ids().get(self.selected_ref?)?;
        self.preview_seq += 1;
        self.preview = Some(PreviewState::Loading(id));
        Some(ChatEffect::LoadPreview {
            seq: self.preview_seq,
            screenshot_id: id,
        })
    }

    pub fn close_preview(&mut self) {
        self.preview = None;
    }

    fn preview_id(&self) -> Option<i64> {
        match self.preview.as_ref()? {
            PreviewState::Loading(id) => Some(*id),
            PreviewState::Loaded(p) => Some(p.detail.screenshot.id),
            PreviewState::Failed { id, .. } => Some(*id),
        }
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn notify(&mut self, text: impl Into<String>, kind: NotificationKind) {
        self.notification = Some(Notification::new(text, kind));
    }

    pub fn expire_notification(&mut self, now: Instant) -> bool {
        ui::expire(&mut self.notification, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::decoder::Utf8StreamDecoder;

    fn session() -> ChatSession {
        ChatSession::in_memory(Settings::default())
    }

    fn submit(s: &mut ChatSession, text: &str) -> String {
        s.input = text.to_string();
        match s.submit() {
            Some(ChatEffect::Send { prompt }) => prompt,
            other => panic!("expected send, got {:?}", other),
        }
    }

    fn reply(s: &mut ChatSession, chunks: &[&str]) {
        s.apply(ChatMsg::StreamOpened);
        for c in chunks {
            s.apply(ChatMsg::Chunk((*c).to_string()));
        }
        s.apply(ChatMsg::Completed);
        s.apply(ChatMsg::Finished);
    }

    #[test]
    fn test_submit_appends_user_before_dispatch() {
        let mut s = session();
        let prompt = submit(&mut s, "  hello ");
        assert_eq!(prompt, "hello");
        assert_eq!(s.messages, vec![ChatMessage::user("hello")]);
        assert!(s.sending);
        assert!(s.input.is_empty());

        // send control stays locked until the cleanup message
        s.input = "again".into();
        assert!(s.submit().is_none());
        s.apply(ChatMsg::StreamOpened);
        s.apply(ChatMsg::Completed);
        assert!(s.sending);
        s.apply(ChatMsg::Finished);
        assert!(!s.sending);
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut s = session();
        s.input = "   ".into();
        assert!(s.submit().is_none());
        assert!(s.messages.is_empty());
        assert!(!s.sending);
    }

    #[test]
    fn test_prompt_uses_prior_turns_only() {
        let mut s = session();
        s.settings.history_limit = 2;
        submit(&mut s, "one");
        reply(&mut s, &["first answer"]);
        let prompt = submit(&mut s, "two");
        assert_eq!(prompt, "user: one\nassistant: first answer\nuser: two");
        reply(&mut s, &["second answer"]);

        let prompt = submit(&mut s, "three");
        assert_eq!(prompt, "user: two\nassistant: second answer\nuser: three");
    }

    #[test]
    fn test_prompt_without_history() {
        let mut s = session();
        submit(&mut s, "one");
        reply(&mut s, &["a"]);
        s.settings.local_history_enabled = false;
        assert_eq!(submit(&mut s, "two"), "two");
    }

    #[test]
    fn test_stream_mutates_single_assistant_message() {
        let mut s = session();
        submit(&mut s, "q");
        assert!(s.thinking);
        s.apply(ChatMsg::StreamOpened);
        assert!(s.thinking);
        assert_eq!(s.messages.len(), 2);
        assert!(s.is_streaming(1));

        let mut decoder = Utf8StreamDecoder::new();
        for chunk in ["Hel", "lo **wor", "ld**"] {
            s.apply(ChatMsg::Chunk(decoder.push(chunk.as_bytes())));
            assert!(!s.thinking);
        }
        s.apply(ChatMsg::Completed);
        s.apply(ChatMsg::Finished);
        assert_eq!(s.messages[1], ChatMessage::assistant("Hello **world**"));
        assert!(!s.is_streaming(1));
    }

    #[test]
    fn test_failure_before_stream_leaves_user_and_error() {
        let mut s = session();
        submit(&mut s, "hello");
        s.apply(ChatMsg::Failed(ApiError::Transport("connection refused".into())));
        s.apply(ChatMsg::Finished);
        assert_eq!(s.messages.len(), 2);
        assert_eq!(s.messages[0], ChatMessage::user("hello"));
        assert!(s.messages[1].is_error());
        assert!(s.messages[1].content.contains(UNREACHABLE_DETAIL));
        assert!(!s.sending);
        assert!(matches!(
            s.notification,
            Some(Notification { kind: NotificationKind::Error, .. })
        ));
    }

    #[test]
    fn test_failure_mid_stream_drops_partial_reply() {
        let mut s = session();
        submit(&mut s, "hello");
        s.apply(ChatMsg::StreamOpened);
        s.apply(ChatMsg::Chunk("partial".into()));
        s.apply(ChatMsg::Failed(ApiError::Status {
            status: 500,
            reason: "Internal Server Error".into(),
        }));
        s.apply(ChatMsg::Finished);
        assert_eq!(s.messages.len(), 2);
        assert_eq!(s.messages[0].role, Role::User);
        assert_eq!(
            s.messages[1].content,
            "Sorry, an error occurred: API request failed: 500 Internal Server Error"
        );
        assert!(s.messages.iter().all(|m| !m.content.is_empty()));
    }

    #[test]
    fn test_history_persists_each_step() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let mut s = ChatSession::open(store.clone());
        submit(&mut s, "hi");
        let saved: Vec<ChatMessage> = store.get(CHAT_HISTORY_KEY).unwrap().unwrap();
        assert_eq!(saved, vec![ChatMessage::user("hi")]);

        s.apply(ChatMsg::StreamOpened);
        s.apply(ChatMsg::Chunk("yo".into()));
        let saved: Vec<ChatMessage> = store.get(CHAT_HISTORY_KEY).unwrap().unwrap();
        assert_eq!(saved[1], ChatMessage::assistant("yo"));

        let reopened = ChatSession::open(store.clone());
        assert_eq!(reopened.messages.len(), 2);

        s.clear_history();
        assert!(store.get::<Vec<ChatMessage>>(CHAT_HISTORY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_preview_opens_the_highlighted_chip() {
        let mut s = session();
        submit(&mut s, "which one");
        reply(&mut s, &["Use `screenshot:5` or screenshot:6"]);
        assert_eq!(s.reference_ids(), vec![6]);
        s.cycle_ref(true);
        let Some(ChatEffect::LoadPreview { screenshot_id, .. }) = s.open_preview() else {
            panic!("preview not requested");
        };
        assert_eq!(screenshot_id, 6);
    }

    #[test]
    fn test_reference_cycling_and_preview() {
        let mut s = session();
        submit(&mut s, "where");
        s.apply(ChatMsg::StreamOpened);
        s.apply(ChatMsg::Chunk("see screenshot:2-3".into()));
        // no chips while the reply is streaming
        assert!(s.reference_ids().is_empty());
        s.apply(ChatMsg::Completed);
        s.apply(ChatMsg::Finished);
        assert_eq!(s.reference_ids(), vec![2, 3]);

        s.cycle_ref(false);
        assert_eq!(s.selected_ref, Some(1));
        s.cycle_ref(true);
        assert_eq!(s.selected_ref, Some(0));

        let Some(ChatEffect::LoadPreview { seq, screenshot_id }) = s.open_preview() else {
            panic!("preview not requested");
        };
        assert_eq!(screenshot_id, 2);
        s.apply(ChatMsg::PreviewLoaded {
            seq,
            result: Err("404".into()),
        });
        assert!(matches!(s.preview, Some(PreviewState::Failed { id: 2, .. })));
        s.close_preview();
        s.apply(ChatMsg::PreviewLoaded { seq, result: Err("late".into()) });
        assert!(s.preview.is_none());
    }
}
