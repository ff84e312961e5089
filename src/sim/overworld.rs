/// Overworld: the level-select menu.
///
/// Rows: the four levels, then "Settings", then "Level Times". Confirm on
/// "Level Times" opens a numeric search field; `F` shows the fastest run.
/// While the field is open, digits / '.' / Backspace edit it, Confirm runs
/// the search and Back closes it.

use std::time::Duration;

use crate::domain::progress::{NotificationSink, ProgressState};
use crate::domain::records::TimeRecord;
use crate::sim::event::InputEvent;
use crate::sim::stage::{Frame, Stage, StageContext, StageKind, StageRequest, StageView, LEVEL_COUNT};

pub const LEVEL_NAMES: [&str; LEVEL_COUNT] = ["First Crush", "Second Wind", "Third Try", "Last Fight"];

pub const OPTION_SETTINGS: usize = LEVEL_COUNT;
pub const OPTION_TIMES: usize = LEVEL_COUNT + 1;
pub const OPTION_COUNT: usize = LEVEL_COUNT + 2;

const INTRO: [(&str, u64); 4] = [
    ("You are a little kitten, lost in a big city...", 2000),
    ("Clear every level to find your way home.", 2000),
    ("Collect coins: every 100 of them is an extra heart.", 2500),
    ("Hearts are your lives. Be careful!", 2000),
];

pub struct Overworld {
    selection: usize,
    search_input: String,
    search_active: bool,
    show_fastest: bool,
    intro: bool,
}

impl Overworld {
    /// `selection` is usually the level played last; `intro` queues the story.
    pub fn new(selection: usize, intro: bool) -> Self {
        Overworld {
            selection: selection.min(OPTION_COUNT - 1),
            search_input: String::new(),
            search_active: false,
            show_fastest: false,
            intro,
        }
    }

    pub fn selection(&self) -> usize { self.selection }
    pub fn search_active(&self) -> bool { self.search_active }
    pub fn search_input(&self) -> &str { &self.search_input }
    pub fn show_fastest(&self) -> bool { self.show_fastest }

    /// Leaderboard line under the menu. Expects `records` already sorted.
    pub fn leaderboard_line(&self, records: &[TimeRecord]) -> Option<String> {
        let first = records.first()?;
        if self.show_fastest {
            Some(format_fastest(first))
        } else {
            let times: Vec<String> = records
                .iter()
                .map(|r| format!("L{}: {:.2}s", r.level + 1, r.time))
                .collect();
            Some(format!("Sorted Times: {}", times.join(", ")))
        }
    }

    /// The controller runs the lookup and posts the result.
    fn handle_search_key(&mut self, event: InputEvent) -> Option<StageRequest> {
        match event {
            InputEvent::Confirm => {
                let query = std::mem::take(&mut self.search_input);
                self.close_search();
                return Some(StageRequest::SearchTime(query));
            }
            InputEvent::Back => self.close_search(),
            InputEvent::Backspace => {
                self.search_input.pop();
            }
            InputEvent::Digit(d) if d < 10 => {
                self.search_input.push(char::from(b'0' + d));
            }
            InputEvent::Period => self.search_input.push('.'),
            _ => {}
        }
        None
    }

    fn close_search(&mut self) {
        self.search_active = false;
        self.search_input.clear();
    }
}

impl Stage for Overworld {
    fn kind(&self) -> StageKind {
        StageKind::Overworld
    }

    fn enter(&mut self, ctx: &mut StageContext<'_>) {
        // A level cleared this tick added its time before the switch.
        ctx.progress.sort_records();
        ctx.text.add_message("Press Enter to choose a level!", Duration::from_millis(1000));
        if self.intro {
            for (line, ms) in INTRO {
                ctx.text.add_message(line, Duration::from_millis(ms));
            }
        }
    }

    fn handle_event(&mut self, event: InputEvent, ctx: &mut StageContext<'_>) -> Option<StageRequest> {
        if self.search_active {
            return self.handle_search_key(event);
        }

        match event {
            InputEvent::Down => {
                self.selection = (self.selection + 1) % OPTION_COUNT;
            }
            InputEvent::Up => {
                self.selection = (self.selection + OPTION_COUNT - 1) % OPTION_COUNT;
            }
            InputEvent::Confirm => match self.selection {
                i if i < LEVEL_COUNT => {
                    // Locked levels stay silent, like the menu's dimmed row says.
                    if i <= ctx.progress.unlocked_level() {
                        return Some(StageRequest::EnterLevel(i));
                    }
                }
                OPTION_SETTINGS => return Some(StageRequest::OpenSettings),
                _ => {
                    self.search_active = true;
                    self.show_fastest = false;
                }
            },
            InputEvent::Fastest => {
                self.show_fastest = true;
                self.close_search();
            }
            _ => {}
        }
        None
    }

    fn run(&mut self, _frame: &Frame, ctx: &mut StageContext<'_>) -> Option<StageRequest> {
        if !ctx.progress.records().is_empty() {
            ctx.progress.sort_records();
        }
        None
    }

    fn view(&self) -> StageView<'_> {
        StageView::Overworld(self)
    }
}

// ── Leaderboard strings ──

/// Parse `query` and look it up in the leaderboard.
/// Non-numeric (or non-finite) input never reaches the store.
pub fn search_time<S: NotificationSink>(progress: &mut ProgressState<S>, query: &str) -> String {
    let value = match query.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return "Invalid input. Enter a number.".to_string(),
    };
    match progress.search(value) {
        Some(hit) => format!("Time {:.2}s found on Level {}!", value, hit.level + 1),
        None => format!("Time {:.2}s not found", value),
    }
}

pub fn fastest_time<S: NotificationSink>(progress: &mut ProgressState<S>) -> String {
    match progress.fastest() {
        Some(rec) => format_fastest(&rec),
        None => "No records".to_string(),
    }
}

fn format_fastest(rec: &TimeRecord) -> String {
    format!("Fastest Time: {:.2}s (Level {})", rec.time, rec.level + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsManager;
    use crate::sim::event::GameEvent;
    use crate::sim::stage::Progress;
    use crate::sim::text::TextSystem;
    use crate::ui::hud::Hud;

    struct Env {
        progress: Progress,
        text: TextSystem,
        settings: SettingsManager,
        events: Vec<GameEvent>,
    }

    impl Env {
        fn new() -> Self {
            Env {
                progress: ProgressState::new(Hud::new()),
                text: TextSystem::new(),
                settings: SettingsManager::in_memory(),
                events: Vec::new(),
            }
        }

        fn send(&mut self, ow: &mut Overworld, events: &[InputEvent]) -> Option<StageRequest> {
            let mut ctx = StageContext {
                progress: &mut self.progress,
                text: &mut self.text,
                settings: &mut self.settings,
                events: &mut self.events,
            };
            let mut last = None;
            for &e in events {
                if let Some(r) = ow.handle_event(e, &mut ctx) {
                    last = Some(r);
                }
            }
            last
        }

        /// Show the queued message.
        fn next_message(&mut self) -> Option<String> {
            self.text.update(Duration::from_millis(1));
            self.text.current().map(str::to_string)
        }
    }

    #[test]
    fn selection_wraps() {
        let mut env = Env::new();
        let mut ow = Overworld::new(0, false);
        env.send(&mut ow, &[InputEvent::Up]);
        assert_eq!(ow.selection(), OPTION_TIMES);
        env.send(&mut ow, &[InputEvent::Down]);
        assert_eq!(ow.selection(), 0);
    }

    #[test]
    fn confirm_on_levels_respects_unlock() {
        let mut env = Env::new();
        let mut ow = Overworld::new(0, false);
        assert_eq!(env.send(&mut ow, &[InputEvent::Confirm]), Some(StageRequest::EnterLevel(0)));
        assert_eq!(env.send(&mut ow, &[InputEvent::Down, InputEvent::Confirm]), None);

        env.progress.unlock(1);
        assert_eq!(env.send(&mut ow, &[InputEvent::Confirm]), Some(StageRequest::EnterLevel(1)));
    }

    #[test]
    fn confirm_on_settings_row() {
        let mut env = Env::new();
        let mut ow = Overworld::new(OPTION_SETTINGS, false);
        assert_eq!(env.send(&mut ow, &[InputEvent::Confirm]), Some(StageRequest::OpenSettings));
    }

    #[test]
    fn search_field_editing_and_lookup() {
        let mut env = Env::new();
        env.progress.add_level_time(9.87, 1);
        let mut ow = Overworld::new(OPTION_TIMES, false);

        env.send(&mut ow, &[InputEvent::Confirm]);
        assert!(ow.search_active());

        env.send(&mut ow, &[
            InputEvent::Digit(9),
            InputEvent::Period,
            InputEvent::Digit(8),
            InputEvent::Digit(5),
            InputEvent::Backspace,
            InputEvent::Digit(7),
            InputEvent::Down,
        ]);
        assert_eq!(ow.search_input(), "9.87");
        // Navigation keys don't move the cursor while typing.
        assert_eq!(ow.selection(), OPTION_TIMES);

        assert_eq!(
            env.send(&mut ow, &[InputEvent::Confirm]),
            Some(StageRequest::SearchTime("9.87".to_string()))
        );
        assert!(!ow.search_active());
        assert_eq!(ow.search_input(), "");
        assert_eq!(search_time(&mut env.progress, "9.87"), "Time 9.87s found on Level 2!");
    }

    #[test]
    fn empty_search_is_invalid_input() {
        let mut env = Env::new();
        let mut ow = Overworld::new(OPTION_TIMES, false);
        assert_eq!(
            env.send(&mut ow, &[InputEvent::Confirm, InputEvent::Confirm]),
            Some(StageRequest::SearchTime(String::new()))
        );
        assert_eq!(search_time(&mut env.progress, ""), "Invalid input. Enter a number.");
    }

    #[test]
    fn entering_sorts_the_leaderboard() {
        let mut env = Env::new();
        env.progress.add_level_time(12.34, 0);
        env.progress.add_level_time(9.87, 1);
        let mut ow = Overworld::new(0, false);
        let mut ctx = StageContext {
            progress: &mut env.progress,
            text: &mut env.text,
            settings: &mut env.settings,
            events: &mut env.events,
        };
        ow.enter(&mut ctx);
        assert_eq!(
            ow.leaderboard_line(env.progress.records()).as_deref(),
            Some("Sorted Times: L2: 9.87s, L1: 12.34s")
        );
    }

    #[test]
    fn back_cancels_search() {
        let mut env = Env::new();
        let mut ow = Overworld::new(OPTION_TIMES, false);
        env.send(&mut ow, &[InputEvent::Confirm, InputEvent::Digit(3), InputEvent::Back]);
        assert!(!ow.search_active());
        assert_eq!(ow.search_input(), "");
        assert_eq!(env.next_message(), None);
    }

    #[test]
    fn fastest_toggle_and_leaderboard_line() {
        let mut env = Env::new();
        let mut ow = Overworld::new(0, false);
        assert_eq!(ow.leaderboard_line(env.progress.records()), None);

        env.progress.add_level_time(12.34, 0);
        env.progress.add_level_time(9.87, 1);
        env.progress.sort_records();
        assert_eq!(
            ow.leaderboard_line(env.progress.records()).as_deref(),
            Some("Sorted Times: L2: 9.87s, L1: 12.34s")
        );

        env.send(&mut ow, &[InputEvent::Fastest]);
        assert!(ow.show_fastest());
        assert_eq!(
            ow.leaderboard_line(env.progress.records()).as_deref(),
            Some("Fastest Time: 9.87s (Level 2)")
        );

        // Opening the search field hides the fastest line again.
        ow.selection = OPTION_TIMES;
        env.send(&mut ow, &[InputEvent::Confirm]);
        assert!(!ow.show_fastest());
    }

    #[test]
    fn search_rejects_non_finite() {
        let mut env = Env::new();
        env.progress.add_level_time(1.0, 0);
        assert_eq!(search_time(&mut env.progress, "nan"), "Invalid input. Enter a number.");
        assert_eq!(search_time(&mut env.progress, "inf"), "Invalid input. Enter a number.");
        assert_eq!(search_time(&mut env.progress, " 1.0 "), "Time 1.00s found on Level 1!");
    }

    #[test]
    fn intro_is_queued_on_enter() {
        let mut env = Env::new();
        let mut ow = Overworld::new(0, true);
        let mut ctx = StageContext {
            progress: &mut env.progress,
            text: &mut env.text,
            settings: &mut env.settings,
            events: &mut env.events,
        };
        ow.enter(&mut ctx);
        assert_eq!(env.text.pending(), 1 + INTRO.len());
    }
}
