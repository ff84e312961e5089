/// On-screen message queue.
///
/// Messages are shown one at a time, first in first out. Each has its own
/// display duration; the next one is popped only when the current one
/// expires. Stage switches clear the queue.

use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_MESSAGE_DURATION: Duration = Duration::from_millis(2000);

#[derive(Clone, Debug)]
struct Message {
    text: String,
    duration: Duration,
}

#[derive(Debug, Default)]
pub struct TextSystem {
    queue: VecDeque<Message>,
    current: Option<String>,
    remaining: Duration,
}

impl TextSystem {
    pub fn new() -> Self {
        TextSystem::default()
    }

    pub fn add_message(&mut self, text: impl Into<String>, duration: Duration) {
        self.queue.push_back(Message { text: text.into(), duration });
    }

    /// Drop everything, including the message on screen.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
        self.remaining = Duration::ZERO;
    }

    /// Advance the display timer by `dt`.
    pub fn update(&mut self, dt: Duration) {
        if self.current.is_none() {
            if let Some(next) = self.queue.pop_front() {
                self.current = Some(next.text);
                self.remaining = next.duration;
                // The frame that shows a message doesn't also count against it.
                return;
            }
        }

        if self.current.is_some() {
            self.remaining = self.remaining.saturating_sub(dt);
            if self.remaining.is_zero() {
                self.current = None;
            }
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: fn(u64) -> Duration = Duration::from_millis;

    #[test]
    fn shows_messages_in_order() {
        let mut t = TextSystem::new();
        t.add_message("one", MS(100));
        t.add_message("two", MS(100));
        assert_eq!(t.current(), None);

        t.update(MS(16));
        assert_eq!(t.current(), Some("one"));
        assert_eq!(t.pending(), 1);

        t.update(MS(60));
        assert_eq!(t.current(), Some("one"));
        t.update(MS(60));
        assert_eq!(t.current(), None);

        t.update(MS(16));
        assert_eq!(t.current(), Some("two"));
    }

    #[test]
    fn clear_drops_current_and_queue() {
        let mut t = TextSystem::new();
        t.add_message("a", MS(1000));
        t.add_message("b", MS(1000));
        t.update(MS(1));
        t.clear();
        assert_eq!(t.current(), None);
        assert_eq!(t.pending(), 0);
        t.update(MS(1));
        assert_eq!(t.current(), None);
    }

    #[test]
    fn idle_update_is_harmless() {
        let mut t = TextSystem::new();
        t.update(MS(500));
        assert_eq!(t.current(), None);
    }
}
