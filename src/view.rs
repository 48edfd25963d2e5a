//! In-memory view elements backing the terminal front end and `send` mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::state::Message;
use crate::widget::{InputField, TranscriptView};

/// Append-only list of messages plus a pending "scroll to newest" request
/// for whoever draws it.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Mutex<Vec<Message>>,
    scroll_requested: AtomicBool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns true once per scroll request.
    pub fn take_scroll_request(&self) -> bool {
        self.scroll_requested.swap(false, Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TranscriptView for Transcript {
    fn append(&self, message: Message) {
        self.lock().push(message);
    }

    fn scroll_to_bottom(&self) {
        self.scroll_requested.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct InputState {
    text: String,
    cursor: usize, // in chars, not bytes
}

/// Single-line text entry with a cursor.
#[derive(Debug, Default)]
pub struct InputBuffer {
    state: Mutex<InputState>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        let buffer = Self::new();
        buffer.set_text(text);
        buffer
    }

    /// Replace the contents and put the cursor at the end.
    pub fn set_text(&self, text: &str) {
        let mut state = self.lock();
        state.text = text.to_string();
        state.cursor = text.chars().count();
    }

    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    pub fn insert_char(&self, c: char) {
        let mut state = self.lock();
        let byte_pos = char_to_byte_index(&state.text, state.cursor);
        state.text.insert(byte_pos, c);
        state.cursor += 1;
    }

    pub fn backspace(&self) {
        let mut state = self.lock();
        if state.cursor > 0 {
            state.cursor -= 1;
            let byte_pos = char_to_byte_index(&state.text, state.cursor);
            state.text.remove(byte_pos);
        }
    }

    pub fn delete(&self) {
        let mut state = self.lock();
        if state.cursor < state.text.chars().count() {
            let byte_pos = char_to_byte_index(&state.text, state.cursor);
            state.text.remove(byte_pos);
        }
    }

    pub fn move_left(&self) {
        let mut state = self.lock();
        state.cursor = state.cursor.saturating_sub(1);
    }

    pub fn move_right(&self) {
        let mut state = self.lock();
        let char_count = state.text.chars().count();
        state.cursor = (state.cursor + 1).min(char_count);
    }

    pub fn move_home(&self) {
        self.lock().cursor = 0;
    }

    pub fn move_end(&self) {
        let mut state = self.lock();
        state.cursor = state.text.chars().count();
    }

    fn lock(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputField for InputBuffer {
    fn value(&self) -> String {
        self.lock().text.clone()
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.text.clear();
        state.cursor = 0;
    }
}
