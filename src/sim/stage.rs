/// Stage controller: which screen is active and how the game ends.
///
/// ## Transition Table
///
/// ┌──────────────────┬──────────────────────────┬──────────────────────┬──────────────┐
/// │ From             │ Event                    │ Guard                │ To           │
/// ├──────────────────┼──────────────────────────┼──────────────────────┼──────────────┤
/// │ Overworld        │ enter_level(i)           │ i ≤ unlocked, i < 4  │ PlayingLevel │
/// │ PlayingLevel     │ back_to_overworld(r > 0) │ max(unl, r) > 3      │ GameComplete │
/// │ PlayingLevel     │ back_to_overworld(r > 0) │ otherwise            │ Overworld    │
/// │ PlayingLevel     │ back_to_overworld(0)     │ health -= 1          │ Overworld    │
/// │ Overworld/Level  │ open_settings            │                      │ SettingsMenu │
/// │ SettingsMenu     │ leave_settings           │                      │ Overworld    │
/// │ any (not modal)  │ health ≤ 0 (end of tick) │                      │ GameOver     │
/// │ GameOver         │ confirm                  │ reset progression    │ Overworld    │
/// │ GameComplete     │ confirm                  │                      │ (exit)       │
/// └──────────────────┴──────────────────────────┴──────────────────────┴──────────────┘
///
/// Anything else is ignored and reported as `false`.
///
/// GameOver / GameComplete are a modal sub-state layered over the last
/// stage: the stage is frozen (no `run`, no events) and only Confirm / Quit
/// are processed. The health check runs once per tick *after* the tick's
/// own transitions, so a failed level returns to the overworld first and
/// the game-over screen appears on the check that follows.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::LevelConfig;
use crate::domain::progress::ProgressState;
use crate::settings::SettingsManager;
use crate::sim::event::{GameEvent, InputEvent, MoveDir};
use crate::sim::level::Level;
use crate::sim::overworld::{self, Overworld};
use crate::sim::settings_menu::SettingsMenu;
use crate::sim::text::{TextSystem, DEFAULT_MESSAGE_DURATION};
use crate::ui::hud::Hud;

pub type Progress = ProgressState<Hud>;

pub const LEVEL_COUNT: usize = 4;
/// Highest level index; unlocking past it completes the game.
pub const LAST_LEVEL: usize = LEVEL_COUNT - 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StageKind {
    Overworld,
    PlayingLevel,
    SettingsMenu,
    GameOver,
    GameComplete,
}

/// What a stage asks the controller to do.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StageRequest {
    EnterLevel(usize),
    OpenSettings,
    BackToOverworld { unlock_reward: usize },
    LeaveSettings,
    /// Look up a typed time and post the answer as a message.
    SearchTime(String),
}

/// Per-tick input that is not an edge event.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    pub dt: Duration,
    /// Held movement direction, if any.
    pub movement: Option<MoveDir>,
}

/// Everything a stage may touch, lent for the duration of one call.
pub struct StageContext<'a> {
    pub progress: &'a mut Progress,
    pub text: &'a mut TextSystem,
    pub settings: &'a mut SettingsManager,
    pub events: &'a mut Vec<GameEvent>,
}

/// Borrowed view of the active stage, for the renderer.
pub enum StageView<'a> {
    Overworld(&'a Overworld),
    Level(&'a Level),
    Settings(&'a SettingsMenu),
}

pub trait Stage {
    fn kind(&self) -> StageKind;

    /// Called once when the stage becomes active.
    fn enter(&mut self, _ctx: &mut StageContext<'_>) {}

    fn handle_event(&mut self, event: InputEvent, ctx: &mut StageContext<'_>) -> Option<StageRequest>;

    fn run(&mut self, frame: &Frame, ctx: &mut StageContext<'_>) -> Option<StageRequest>;

    fn view(&self) -> StageView<'_>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Modal {
    GameOver,
    GameComplete,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct StageController {
    stage: Box<dyn Stage>,
    modal: Option<Modal>,
    progress: Progress,
    text: TextSystem,
    settings: SettingsManager,
    events: Vec<GameEvent>,
    level_cfg: LevelConfig,
    /// Story intro still to be shown on the next overworld.
    intro_pending: bool,
}

// ── Construction / queries ──

impl StageController {
    pub fn new(settings: SettingsManager, level_cfg: LevelConfig) -> Self {
        let mut ctl = StageController {
            stage: Box::new(Overworld::new(0, true)),
            modal: None,
            progress: ProgressState::new(Hud::new()),
            text: TextSystem::new(),
            settings,
            events: Vec::new(),
            level_cfg,
            intro_pending: false,
        };
        let mut ctx = StageContext {
            progress: &mut ctl.progress,
            text: &mut ctl.text,
            settings: &mut ctl.settings,
            events: &mut ctl.events,
        };
        ctl.stage.enter(&mut ctx);
        info!("game started");
        ctl
    }

    pub fn state(&self) -> StageKind {
        match self.modal {
            Some(Modal::GameOver) => StageKind::GameOver,
            Some(Modal::GameComplete) => StageKind::GameComplete,
            None => self.stage.kind(),
        }
    }

    pub fn stage_view(&self) -> StageView<'_> {
        self.stage.view()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn text(&self) -> &TextSystem {
        &self.text
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    /// Take the events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

// ── Transitions ──

impl StageController {
    pub fn enter_level(&mut self, index: usize) -> bool {
        if self.state() != StageKind::Overworld {
            return false;
        }
        if index >= LEVEL_COUNT || index > self.progress.unlocked_level() {
            debug!(index, unlocked = self.progress.unlocked_level(), "level locked");
            return false;
        }
        self.progress.set_current_level(index);
        let level = Level::new(index, &self.level_cfg);
        self.switch_to(Box::new(level));
        true
    }

    pub fn open_settings(&mut self) -> bool {
        if !matches!(self.state(), StageKind::Overworld | StageKind::PlayingLevel) {
            return false;
        }
        self.switch_to(Box::new(SettingsMenu::new()));
        true
    }

    pub fn leave_settings(&mut self) -> bool {
        if self.state() != StageKind::SettingsMenu {
            return false;
        }
        self.switch_to_overworld();
        true
    }

    /// Return from a level. `unlock_reward > 0` means it was cleared and names
    /// the level to unlock; 0 means the attempt failed and costs a life.
    pub fn back_to_overworld(&mut self, unlock_reward: usize) -> bool {
        if self.state() != StageKind::PlayingLevel {
            return false;
        }

        if unlock_reward > 0 {
            self.progress.unlock(unlock_reward);
            if self.progress.unlocked_level() > LAST_LEVEL {
                self.text.clear();
                self.modal = Some(Modal::GameComplete);
                self.events.push(GameEvent::GameComplete);
                info!(unlocked = self.progress.unlocked_level(), "all levels cleared");
                return true;
            }
        } else {
            self.progress.set_health(self.progress.health() - 1);
            info!(health = self.progress.health(), "level failed");
        }

        self.switch_to_overworld();
        true
    }

    /// End-of-tick health check. Returns true when it enters GameOver.
    pub fn check_health(&mut self) -> bool {
        if self.modal.is_some() || self.progress.health() > 0 {
            return false;
        }
        self.modal = Some(Modal::GameOver);
        self.events.push(GameEvent::GameOver);
        info!(health = self.progress.health(), "game over");
        true
    }

    /// Confirm on a modal screen. Outside one it does nothing.
    pub fn confirm(&mut self) -> Flow {
        match self.modal {
            Some(Modal::GameOver) => {
                self.modal = None;
                self.reset();
                self.switch_to_overworld();
                Flow::Continue
            }
            Some(Modal::GameComplete) => {
                info!("game complete, exiting");
                Flow::Exit
            }
            None => Flow::Continue,
        }
    }

    pub fn reset(&mut self) {
        self.progress.reset();
        self.intro_pending = true;
    }

    /// Returns true when the active stage was replaced.
    fn apply(&mut self, request: StageRequest) -> bool {
        let applied = match &request {
            StageRequest::EnterLevel(index) => self.enter_level(*index),
            StageRequest::OpenSettings => self.open_settings(),
            StageRequest::BackToOverworld { unlock_reward } => self.back_to_overworld(*unlock_reward),
            StageRequest::LeaveSettings => self.leave_settings(),
            StageRequest::SearchTime(query) => {
                let msg = self.search_time(query);
                self.text.add_message(msg, DEFAULT_MESSAGE_DURATION);
                return false;
            }
        };
        if !applied {
            debug!(?request, state = ?self.state(), "request ignored");
        }
        applied
    }

    fn switch_to_overworld(&mut self) {
        let intro = std::mem::take(&mut self.intro_pending);
        let overworld = Overworld::new(self.progress.current_level(), intro);
        self.switch_to(Box::new(overworld));
    }

    /// Drop the current stage and activate `next`.
    fn switch_to(&mut self, mut next: Box<dyn Stage>) {
        self.text.clear();
        info!(from = ?self.stage.kind(), to = ?next.kind(), "stage transition");
        let mut ctx = StageContext {
            progress: &mut self.progress,
            text: &mut self.text,
            settings: &mut self.settings,
            events: &mut self.events,
        };
        next.enter(&mut ctx);
        self.stage = next;
    }
}

// ── Leaderboard API ──

impl StageController {
    /// Levels record through their context; this is for callers outside a stage.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn add_level_time(&mut self, time: f64, level: usize) {
        self.progress.add_level_time(time, level);
    }

    pub fn search_time(&mut self, query: &str) -> String {
        overworld::search_time(&mut self.progress, query)
    }

    pub fn fastest_time(&mut self) -> String {
        overworld::fastest_time(&mut self.progress)
    }
}

// ── Tick ──

impl StageController {
    /// Advance one frame: route events, run the stage, then check health.
    ///
    /// Once a transition happens, the rest of the tick's input (and the run
    /// step) is withheld from the new stage; only Quit still counts.
    pub fn tick(&mut self, frame: &Frame, input: &[InputEvent]) -> Flow {
        let mut switched = false;
        for &event in input {
            if event == InputEvent::Quit {
                info!("quit requested");
                return Flow::Exit;
            }
            if switched {
                continue;
            }

            if self.modal.is_some() {
                if event == InputEvent::Confirm {
                    if self.confirm() == Flow::Exit {
                        return Flow::Exit;
                    }
                    switched = true;
                }
                continue;
            }

            let mut ctx = StageContext {
                progress: &mut self.progress,
                text: &mut self.text,
                settings: &mut self.settings,
                events: &mut self.events,
            };
            if let Some(request) = self.stage.handle_event(event, &mut ctx) {
                switched = self.apply(request);
            }
        }

        if self.modal.is_none() && !switched {
            let mut ctx = StageContext {
                progress: &mut self.progress,
                text: &mut self.text,
                settings: &mut self.settings,
                events: &mut self.events,
            };
            if let Some(request) = self.stage.run(frame, &mut ctx) {
                self.apply(request);
            }
        }

        self.text.update(frame.dt);
        self.progress.sink_mut().update(frame.dt);

        self.check_health();
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> StageController {
        StageController::new(SettingsManager::in_memory(), LevelConfig::default())
    }

    fn idle() -> Frame {
        Frame { dt: Duration::from_millis(16), movement: None }
    }

    /// Clear levels 0..n through the public transition API.
    fn clear_levels(c: &mut StageController, n: usize) {
        for i in 0..n {
            assert!(c.enter_level(i));
            assert!(c.back_to_overworld(i + 1));
        }
    }

    #[test]
    fn starts_on_overworld() {
        let c = controller();
        assert_eq!(c.state(), StageKind::Overworld);
        assert_eq!(c.progress().health(), 3);
        assert_eq!(c.progress().unlocked_level(), 0);
    }

    #[test]
    fn enter_level_respects_unlock() {
        let mut c = controller();
        assert!(!c.enter_level(1));
        assert_eq!(c.state(), StageKind::Overworld);
        assert!(c.enter_level(0));
        assert_eq!(c.state(), StageKind::PlayingLevel);
        assert_eq!(c.progress().current_level(), 0);
        // Only from the overworld.
        assert!(!c.enter_level(0));
    }

    #[test]
    fn enter_level_out_of_range() {
        let mut c = controller();
        clear_levels(&mut c, 3);
        assert!(!c.enter_level(LEVEL_COUNT));
        assert!(c.enter_level(3));
        assert_eq!(c.progress().current_level(), 3);
    }

    #[test]
    fn cleared_level_unlocks_next() {
        let mut c = controller();
        assert!(c.enter_level(0));
        assert!(c.back_to_overworld(1));
        assert_eq!(c.state(), StageKind::Overworld);
        assert_eq!(c.progress().unlocked_level(), 1);
        assert_eq!(c.progress().health(), 3);

        // Replaying an earlier level never lowers the unlock.
        assert!(c.enter_level(0));
        assert!(c.back_to_overworld(1));
        assert_eq!(c.progress().unlocked_level(), 1);
    }

    #[test]
    fn clearing_last_level_completes_game() {
        let mut c = controller();
        clear_levels(&mut c, 3);
        assert_eq!(c.progress().unlocked_level(), 3);

        assert!(c.enter_level(3));
        assert!(c.back_to_overworld(4));
        assert_eq!(c.state(), StageKind::GameComplete);
        assert_eq!(c.progress().unlocked_level(), 4);
        assert!(c.drain_events().contains(&GameEvent::GameComplete));
    }

    #[test]
    fn failed_level_costs_a_life() {
        let mut c = controller();
        assert!(c.enter_level(0));
        assert!(c.back_to_overworld(0));
        assert_eq!(c.state(), StageKind::Overworld);
        assert_eq!(c.progress().health(), 2);
        assert_eq!(c.progress().unlocked_level(), 0);
    }

    #[test]
    fn failure_never_completes_game() {
        let mut c = controller();
        clear_levels(&mut c, 3);
        assert!(c.enter_level(3));
        assert!(c.back_to_overworld(0));
        assert_eq!(c.state(), StageKind::Overworld);
    }

    #[test]
    fn back_to_overworld_only_from_level() {
        let mut c = controller();
        assert!(!c.back_to_overworld(0));
        assert_eq!(c.progress().health(), 3);
    }

    #[test]
    fn game_over_on_the_following_check() {
        let mut c = controller();
        for _ in 0..2 {
            assert!(c.enter_level(0));
            assert!(c.back_to_overworld(0));
        }
        assert_eq!(c.progress().health(), 1);

        assert!(c.enter_level(0));
        assert!(c.back_to_overworld(0));
        assert_eq!(c.progress().health(), 0);
        // The transition itself lands on the overworld...
        assert_eq!(c.state(), StageKind::Overworld);
        // ...and the tick's health check moves to game over.
        assert_eq!(c.tick(&idle(), &[]), Flow::Continue);
        assert_eq!(c.state(), StageKind::GameOver);
        assert!(c.drain_events().contains(&GameEvent::GameOver));
    }

    #[test]
    fn game_over_is_modal_and_confirm_resets() {
        let mut c = controller();
        clear_levels(&mut c, 2);
        c.add_level_time(3.5, 0);
        for _ in 0..3 {
            assert!(c.enter_level(0));
            assert!(c.back_to_overworld(0));
        }
        assert!(c.check_health());
        assert!(!c.check_health());

        // Only Confirm / Quit get through.
        c.tick(&idle(), &[InputEvent::Down, InputEvent::Back]);
        assert_eq!(c.state(), StageKind::GameOver);
        assert!(!c.enter_level(0));
        assert!(!c.open_settings());

        c.tick(&idle(), &[InputEvent::Confirm]);
        assert_eq!(c.state(), StageKind::Overworld);
        assert_eq!(c.progress().health(), 3);
        assert_eq!(c.progress().coins(), 0);
        assert_eq!(c.progress().unlocked_level(), 0);
        assert_eq!(c.progress().current_level(), 0);
        assert_eq!(c.progress().records().len(), 1);
    }

    #[test]
    fn game_complete_confirm_exits() {
        let mut c = controller();
        clear_levels(&mut c, 4);
        assert_eq!(c.state(), StageKind::GameComplete);
        assert_eq!(c.tick(&idle(), &[InputEvent::Down]), Flow::Continue);
        assert_eq!(c.state(), StageKind::GameComplete);
        assert_eq!(c.tick(&idle(), &[InputEvent::Confirm]), Flow::Exit);
    }

    #[test]
    fn settings_round_trip_has_no_penalty() {
        let mut c = controller();
        assert!(!c.leave_settings());
        assert!(c.open_settings());
        assert_eq!(c.state(), StageKind::SettingsMenu);
        assert!(!c.open_settings());
        assert!(c.leave_settings());
        assert_eq!(c.state(), StageKind::Overworld);
        assert_eq!(c.progress().health(), 3);

        assert!(c.enter_level(0));
        assert!(c.open_settings());
        assert!(c.leave_settings());
        assert_eq!(c.state(), StageKind::Overworld);
        assert_eq!(c.progress().health(), 3);
    }

    #[test]
    fn quit_exits_from_anywhere() {
        let mut c = controller();
        assert_eq!(c.tick(&idle(), &[InputEvent::Quit]), Flow::Exit);
        clear_levels(&mut c, 4);
        assert_eq!(c.tick(&idle(), &[InputEvent::Quit]), Flow::Exit);
    }

    #[test]
    fn tick_routes_events_to_overworld() {
        let mut c = controller();
        c.tick(&idle(), &[InputEvent::Confirm]);
        assert_eq!(c.state(), StageKind::PlayingLevel);
        c.tick(&idle(), &[InputEvent::Back]);
        assert_eq!(c.state(), StageKind::Overworld);
        assert_eq!(c.progress().health(), 2);
    }

    #[test]
    fn one_press_drives_only_one_stage() {
        // A gamepad A press confirms and jumps in the same tick.
        let mut c = controller();
        c.drain_events();
        c.tick(&idle(), &[InputEvent::Confirm, InputEvent::Jump]);
        assert_eq!(c.state(), StageKind::PlayingLevel);
        assert!(!c.drain_events().contains(&GameEvent::Jumped));

        // The next tick reaches the level.
        c.tick(&idle(), &[InputEvent::Jump]);
        assert!(c.drain_events().contains(&GameEvent::Jumped));
    }

    #[test]
    fn quit_still_counts_after_a_transition() {
        let mut c = controller();
        assert_eq!(c.tick(&idle(), &[InputEvent::Confirm, InputEvent::Quit]), Flow::Exit);
    }

    #[test]
    fn game_over_confirm_is_not_replayed_on_the_overworld() {
        let mut c = controller();
        for _ in 0..3 {
            assert!(c.enter_level(0));
            assert!(c.back_to_overworld(0));
        }
        assert!(c.check_health());
        c.tick(&idle(), &[InputEvent::Confirm, InputEvent::Confirm]);
        assert_eq!(c.state(), StageKind::Overworld);
    }

    #[test]
    fn search_request_posts_a_message() {
        let mut c = controller();
        c.add_level_time(9.87, 1);
        let mut seen = Vec::new();
        c.tick(&idle(), &[InputEvent::Up]);
        c.tick(&idle(), &[InputEvent::Confirm]);
        c.tick(&idle(), &[InputEvent::Digit(9), InputEvent::Period, InputEvent::Digit(8), InputEvent::Digit(7)]);
        c.tick(&idle(), &[InputEvent::Confirm]);
        // The greeting and the story intro are queued ahead of the answer.
        let slow = Frame { dt: Duration::from_millis(100), movement: None };
        for _ in 0..200 {
            if let Some(m) = c.text().current() {
                seen.push(m.to_string());
            }
            c.tick(&slow, &[]);
        }
        assert!(seen.iter().any(|m| m == "Time 9.87s found on Level 2!"));
    }

    #[test]
    fn leaderboard_strings() {
        let mut c = controller();
        assert_eq!(c.fastest_time(), "No records");
        c.add_level_time(12.34, 0);
        c.add_level_time(9.87, 1);
        c.add_level_time(9.87, 0);
        c.add_level_time(15.0, 2);
        assert_eq!(c.fastest_time(), "Fastest Time: 9.87s (Level 2)");
        assert_eq!(c.search_time("9.87"), "Time 9.87s found on Level 2!");
        assert_eq!(c.search_time("1.5"), "Time 1.50s not found");
        assert_eq!(c.search_time("abc"), "Invalid input. Enter a number.");
    }
}
