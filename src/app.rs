use std::sync::Arc;
use ratatui::layout::Rect;
use chatbox::{ChatWidget, InputBuffer, Message, Transcript};

pub struct App {
    pub should_quit: bool,

    pub widget: ChatWidget,
    pub transcript: Arc<Transcript>,
    pub input: Arc<InputBuffer>,
    pub server_label: String,

    // Transcript scrolling
    pub scroll: u16,
    pub follow: bool, // keep the newest entry in view
    pub chat_height: u16, // inner height of the transcript pane
    pub chat_width: u16,  // inner width, for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Transcript area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(
        widget: ChatWidget,
        transcript: Arc<Transcript>,
        input: Arc<InputBuffer>,
        server_label: String,
    ) -> Self {
        Self {
            should_quit: false,
            widget,
            transcript,
            input,
            server_label,
            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            chat_area: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.widget.in_flight() > 0
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll(&self.transcript.snapshot());
        self.scroll = self.scroll.saturating_add(lines).min(max);
        self.follow = self.scroll >= max;
    }

    /// Scroll so the newest entry (and the waiting line, if any) is visible
    pub fn scroll_to_bottom(&mut self, messages: &[Message]) {
        self.scroll = self.max_scroll(messages);
        self.follow = true;
    }

    fn max_scroll(&self, messages: &[Message]) -> u16 {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        let total = transcript_lines(messages, self.chat_width, self.is_waiting());
        total.saturating_sub(visible_height)
    }
}

/// Number of wrapped lines the transcript pane needs for `messages`.
pub fn transcript_lines(messages: &[Message], width: u16, waiting: bool) -> u16 {
    // Use actual chat width for wrap calculation, default to 50 if not set
    let wrap_width = if width > 0 { width as usize } else { 50 };

    let mut total_lines: u16 = 0;

    for msg in messages {
        total_lines = total_lines.saturating_add(1); // sender label
        for line in msg.text.lines() {
            // Use character count, not byte length, for proper UTF-8 handling
            let char_count = line.chars().count();
            let wrapped = if char_count == 0 {
                1
            } else {
                char_count.div_ceil(wrap_width)
            };
            total_lines = total_lines.saturating_add(wrapped as u16);
        }
        total_lines = total_lines.saturating_add(1); // blank line after message
    }

    if waiting {
        total_lines = total_lines.saturating_add(2); // "Bot:" + "Waiting..."
    }

    total_lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox::Sender;

    #[test]
    fn test_transcript_lines_counts_labels_and_blanks() {
        let messages = vec![
            Message::new(Sender::User, "hi"),
            Message::new(Sender::Bot, "line one\nline two"),
        ];
        // user: label + 1 + blank, bot: label + 2 + blank
        assert_eq!(transcript_lines(&messages, 80, false), 7);
        assert_eq!(transcript_lines(&messages, 80, true), 9);
    }

    #[test]
    fn test_transcript_lines_wraps_by_chars() {
        let messages = vec![Message::new(Sender::Bot, "ééééééééééé")]; // 11 chars
        assert_eq!(transcript_lines(&messages, 5, false), 1 + 3 + 1);
        assert_eq!(transcript_lines(&messages, 11, false), 1 + 1 + 1);
    }

    #[test]
    fn test_transcript_lines_empty() {
        assert_eq!(transcript_lines(&[], 0, false), 0);
    }
}
