/// Keyboard input.
///
/// Two views of the same key stream:
///   - edge events: every Press becomes at most one `InputEvent`
///     (menus, typing in the search field, jumping)
///   - held keys: Left/Right stay "held" while Press/Repeat keep arriving,
///     which drives running inside a level
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
///
/// ┌────────────────────┬─────────────┐
/// │ Key                │ Event       │
/// ├────────────────────┼─────────────┤
/// │ ↑ ↓ ← →  W S A D   │ directions  │
/// │ Enter              │ Confirm     │
/// │ Esc                │ Back        │
/// │ Q, Ctrl+C          │ Quit        │
/// │ 0-9 .  Backspace   │ search edit │
/// │ F                  │ Fastest     │
/// │ Space              │ Jump        │
/// │ Tab                │ Settings    │
/// └────────────────────┴─────────────┘

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use tracing::debug;

use crate::sim::event::{InputEvent, MoveDir};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const LEFT_KEYS: [KeyCode; 3] = [KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const RIGHT_KEYS: [KeyCode; 3] = [KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Events produced by the most recent drain_events() call, in order.
    events: Vec<InputEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Ask the terminal for Release events. Call after raw mode is on.
    pub fn enable_release_events(&mut self) -> io::Result<()> {
        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.honor_release = true;
        }
        debug!(honor_release = self.honor_release, "keyboard enhancement");
        Ok(())
    }

    pub fn restore(&self) -> io::Result<()> {
        if self.honor_release {
            execute!(io::stdout(), PopKeyboardEnhancementFlags)?;
        }
        Ok(())
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the controller tick.
    pub fn drain_events(&mut self) {
        self.events.clear();

        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.feed(key, Instant::now());
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn feed(&mut self, key: KeyEvent, now: Instant) {
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            KeyEventKind::Repeat => {
                self.last_active.insert(key.code, now);
            }
            KeyEventKind::Press => {
                self.last_active.insert(key.code, now);
                if let Some(ev) = translate(&key) {
                    self.events.push(ev);
                }
            }
        }
    }

    /// Edge events of this frame.
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Held run direction. Both or neither held → None.
    pub fn movement(&self) -> Option<MoveDir> {
        let left = self.any_held(&LEFT_KEYS);
        let right = self.any_held(&RIGHT_KEYS);
        match (left, right) {
            (true, false) => Some(MoveDir::Left),
            (false, true) => Some(MoveDir::Right),
            _ => None,
        }
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    /// Convenience: is any of these keys held?
    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }
}

/// Map one key press to an event.
pub fn translate(key: &KeyEvent) -> Option<InputEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(InputEvent::Quit),
            _ => None,
        };
    }
    let ev = match key.code {
        KeyCode::Up => InputEvent::Up,
        KeyCode::Down => InputEvent::Down,
        KeyCode::Left => InputEvent::Left,
        KeyCode::Right => InputEvent::Right,
        KeyCode::Enter => InputEvent::Confirm,
        KeyCode::Esc => InputEvent::Back,
        KeyCode::Backspace => InputEvent::Backspace,
        KeyCode::Tab => InputEvent::Settings,
        KeyCode::Char(c) => match c {
            'w' | 'W' => InputEvent::Up,
            's' | 'S' => InputEvent::Down,
            'a' | 'A' => InputEvent::Left,
            'd' | 'D' => InputEvent::Right,
            'q' | 'Q' => InputEvent::Quit,
            'f' | 'F' => InputEvent::Fastest,
            ' ' => InputEvent::Jump,
            '.' => InputEvent::Period,
            '0'..='9' => InputEvent::Digit(c as u8 - b'0'),
            _ => return None,
        },
        _ => return None,
    };
    Some(ev)
}
