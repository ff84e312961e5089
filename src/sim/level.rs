/// Level: a one-row course run against the clock.
///
/// Course legend:
///   '.' floor   '$' coin (1)   '*' gem (20)   '^' spike   'F' flag
///
/// Held Left/Right moves at `run_speed` cells per second; Jump keeps the
/// kitten airborne for `jump_ms`. Coins are picked up when passed, in the
/// air or not. A spike under a grounded kitten costs one heart, knocks it
/// back and grants a short invulnerability. Reaching the flag records the
/// elapsed time and reports the next level as the unlock reward.

use std::time::Duration;

use tracing::debug;

use crate::config::LevelConfig;
use crate::sim::event::{GameEvent, InputEvent, MoveDir};
use crate::sim::stage::{Frame, Stage, StageContext, StageKind, StageRequest, StageView, LEVEL_COUNT};

pub const COURSES: [&str; LEVEL_COUNT] = [
    "....$..$..$...^....$$$..^...$..F",
    "..$$..^..$..^^..$$*...^..$..^...$$..F",
    "..^..$$..^^..$.*..^..$$..^^^..$..^..$$..F",
    "..$..^^..$$..^^^..*..^..$$..^^..$$$..^^^..*..^..F",
];

const KNOCKBACK: f32 = 2.0;
const INVULNERABLE: Duration = Duration::from_millis(800);

const TUTORIAL: [(&str, u64); 3] = [
    ("Arrows / A,D: run   Up / Space: jump", 3000),
    ("Jump over spikes, grab coins, reach the flag!", 3000),
    ("Esc gives up the level and costs a heart.", 2000),
];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cell {
    Floor,
    Coin,
    Gem,
    Spike,
    Flag,
}

impl Cell {
    fn from_char(c: char) -> Cell {
        match c {
            '$' => Cell::Coin,
            '*' => Cell::Gem,
            '^' => Cell::Spike,
            'F' => Cell::Flag,
            _ => Cell::Floor,
        }
    }

    fn value(self) -> u32 {
        match self {
            Cell::Coin => 1,
            Cell::Gem => 20,
            _ => 0,
        }
    }
}

pub struct Level {
    index: usize,
    course: Vec<Cell>,
    x: f32,
    elapsed: Duration,
    airborne: Duration,
    invulnerable: Duration,
    run_speed: f32,
    jump_time: Duration,
    finished: bool,
}

impl Level {
    pub fn new(index: usize, cfg: &LevelConfig) -> Self {
        let course = COURSES.get(index).copied().unwrap_or(COURSES[0]);
        Level::with_course(index, course, cfg)
    }

    pub fn with_course(index: usize, course: &str, cfg: &LevelConfig) -> Self {
        let mut course: Vec<Cell> = course.chars().map(Cell::from_char).collect();
        if course.last() != Some(&Cell::Flag) {
            course.push(Cell::Flag);
        }
        Level {
            index,
            course,
            x: 0.0,
            elapsed: Duration::ZERO,
            airborne: Duration::ZERO,
            invulnerable: Duration::ZERO,
            run_speed: cfg.run_speed,
            jump_time: Duration::from_millis(cfg.jump_ms),
            finished: false,
        }
    }

    pub fn index(&self) -> usize { self.index }
    pub fn course(&self) -> &[Cell] { &self.course }
    pub fn position(&self) -> usize { self.x as usize }
    pub fn elapsed(&self) -> Duration { self.elapsed }
    pub fn is_airborne(&self) -> bool { !self.airborne.is_zero() }
    pub fn is_invulnerable(&self) -> bool { !self.invulnerable.is_zero() }

    fn last_cell(&self) -> f32 {
        (self.course.len() - 1) as f32
    }

    /// First spike met walking from `from` to `to`, both ends included.
    fn first_spike(&self, from: usize, to: usize) -> Option<usize> {
        let is_spike = |i: &usize| self.course[*i] == Cell::Spike;
        if from <= to {
            (from..=to).find(is_spike)
        } else {
            (to..=from).rev().find(is_spike)
        }
    }

    fn collect(&mut self, from: usize, to: usize, ctx: &mut StageContext<'_>) {
        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
        for cell in &mut self.course[lo..=hi] {
            let value = cell.value();
            if value > 0 {
                *cell = Cell::Floor;
                ctx.progress.add_coins(value);
                ctx.events.push(GameEvent::CoinPicked { value });
            }
        }
    }
}

impl Stage for Level {
    fn kind(&self) -> StageKind {
        StageKind::PlayingLevel
    }

    fn enter(&mut self, ctx: &mut StageContext<'_>) {
        if self.index == 0 {
            for (line, ms) in TUTORIAL {
                ctx.text.add_message(line, Duration::from_millis(ms));
            }
        }
    }

    fn handle_event(&mut self, event: InputEvent, ctx: &mut StageContext<'_>) -> Option<StageRequest> {
        if self.finished {
            return None;
        }
        match event {
            InputEvent::Jump | InputEvent::Up => {
                if self.airborne.is_zero() {
                    self.airborne = self.jump_time;
                    ctx.events.push(GameEvent::Jumped);
                }
                None
            }
            InputEvent::Back => Some(StageRequest::BackToOverworld { unlock_reward: 0 }),
            InputEvent::Settings => Some(StageRequest::OpenSettings),
            _ => None,
        }
    }

    fn run(&mut self, frame: &Frame, ctx: &mut StageContext<'_>) -> Option<StageRequest> {
        if self.finished {
            return None;
        }
        self.elapsed += frame.dt;
        self.airborne = self.airborne.saturating_sub(frame.dt);
        self.invulnerable = self.invulnerable.saturating_sub(frame.dt);

        let before = self.position();
        let step = self.run_speed * frame.dt.as_secs_f32();
        match frame.movement {
            Some(MoveDir::Right) => self.x += step,
            Some(MoveDir::Left) => self.x -= step,
            None => {}
        }
        self.x = self.x.clamp(0.0, self.last_cell());
        let here = self.position();

        // A long frame must not carry a grounded kitten over a spike.
        let grounded = self.airborne.is_zero() && self.invulnerable.is_zero();
        let spike = if grounded { self.first_spike(before, here) } else { None };
        self.collect(before, spike.unwrap_or(here), ctx);

        if let Some(at) = spike {
            ctx.progress.set_health(ctx.progress.health() - 1);
            ctx.events.push(GameEvent::Damaged);
            self.x = (at as f32 - KNOCKBACK).max(0.0);
            self.invulnerable = INVULNERABLE;
            debug!(level = self.index, cell = at, health = ctx.progress.health(), "spike hit");
            return None;
        }

        if self.course[here] == Cell::Flag {
            self.finished = true;
            let time = self.elapsed.as_secs_f64();
            ctx.progress.add_level_time(time, self.index);
            ctx.events.push(GameEvent::LevelCleared { level: self.index, time });
            return Some(StageRequest::BackToOverworld { unlock_reward: self.index + 1 });
        }
        None
    }

    fn view(&self) -> StageView<'_> {
        StageView::Level(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::ProgressState;
    use crate::settings::SettingsManager;
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

        fn ctx(&mut self) -> StageContext<'_> {
            StageContext {
                progress: &mut self.progress,
                text: &mut self.text,
                settings: &mut self.settings,
                events: &mut self.events,
            }
        }
    }

    fn cfg() -> LevelConfig {
        LevelConfig { run_speed: 10.0, jump_ms: 300 }
    }

    /// 100 ms frames holding `dir`, until a request comes back or `max` frames pass.
    fn hold(level: &mut Level, env: &mut Env, dir: Option<MoveDir>, max: usize) -> Option<StageRequest> {
        let frame = Frame { dt: Duration::from_millis(100), movement: dir };
        for _ in 0..max {
            let mut ctx = env.ctx();
            if let Some(r) = level.run(&frame, &mut ctx) {
                return Some(r);
            }
        }
        None
    }

    #[test]
    fn courses_end_with_flag() {
        for (i, c) in COURSES.iter().enumerate() {
            let l = Level::new(i, &cfg());
            assert_eq!(l.course().last(), Some(&Cell::Flag), "course {}", c);
        }
    }

    #[test]
    fn running_to_flag_records_time_and_unlocks_next() {
        let mut env = Env::new();
        let mut level = Level::with_course(2, "..$..$*..F", &cfg());

        let req = hold(&mut level, &mut env, Some(MoveDir::Right), 50);
        assert_eq!(req, Some(StageRequest::BackToOverworld { unlock_reward: 3 }));
        assert_eq!(env.progress.coins(), 22);
        assert_eq!(env.progress.records().len(), 1);
        assert_eq!(env.progress.records()[0].level, 2);
        // 9 cells at 1 cell per 100 ms frame.
        assert!((env.progress.records()[0].time - 0.9).abs() < 1e-9);
        assert!(env.events.contains(&GameEvent::CoinPicked { value: 20 }));

        // Finished levels ignore further frames.
        assert_eq!(hold(&mut level, &mut env, Some(MoveDir::Right), 5), None);
        assert_eq!(env.progress.records().len(), 1);
    }

    #[test]
    fn standing_still_does_nothing() {
        let mut env = Env::new();
        let mut level = Level::with_course(0, "..$F", &cfg());
        assert_eq!(hold(&mut level, &mut env, None, 10), None);
        assert_eq!(level.position(), 0);
        assert_eq!(level.elapsed(), Duration::from_millis(1000));
        assert_eq!(hold(&mut level, &mut env, Some(MoveDir::Left), 3), None);
        assert_eq!(level.position(), 0);
    }

    #[test]
    fn spike_costs_a_heart_and_knocks_back() {
        let mut env = Env::new();
        let mut level = Level::with_course(0, "...^....F", &cfg());
        assert_eq!(hold(&mut level, &mut env, Some(MoveDir::Right), 3), None);
        assert_eq!(env.progress.health(), 2);
        assert_eq!(level.position(), 1);
        assert!(level.is_invulnerable());
        assert_eq!(env.events, vec![GameEvent::Damaged]);
    }

    #[test]
    fn long_frame_cannot_skip_a_spike() {
        let mut env = Env::new();
        let cfg = LevelConfig { run_speed: 6.0, jump_ms: 300 };
        let mut level = Level::with_course(0, "..^$.....F", &cfg);
        let frame = Frame { dt: Duration::from_millis(500), movement: Some(MoveDir::Right) };

        // 3 cells in one frame, over the spike on cell 2.
        assert_eq!(level.run(&frame, &mut env.ctx()), None);
        assert_eq!(env.progress.health(), 2);
        assert_eq!(level.position(), 0);
        // The coin beyond the spike is still there.
        assert_eq!(env.progress.coins(), 0);
        assert_eq!(env.events, vec![GameEvent::Damaged]);

        // Invulnerable now, so the next long frame passes the spike.
        assert_eq!(level.run(&frame, &mut env.ctx()), None);
        assert_eq!(env.progress.health(), 2);
        assert_eq!(level.position(), 3);
        assert_eq!(env.progress.coins(), 1);
    }

    #[test]
    fn jumping_clears_spikes() {
        let mut env = Env::new();
        let mut level = Level::with_course(1, "..^..F", &cfg());
        assert_eq!(hold(&mut level, &mut env, Some(MoveDir::Right), 1), None);
        {
            let mut ctx = env.ctx();
            assert_eq!(level.handle_event(InputEvent::Jump, &mut ctx), None);
            // No double jump while airborne.
            assert_eq!(level.handle_event(InputEvent::Up, &mut ctx), None);
        }
        assert!(level.is_airborne());
        let req = hold(&mut level, &mut env, Some(MoveDir::Right), 10);
        assert_eq!(req, Some(StageRequest::BackToOverworld { unlock_reward: 2 }));
        assert_eq!(env.progress.health(), 3);
        assert_eq!(env.events.iter().filter(|e| **e == GameEvent::Jumped).count(), 1);
    }

    #[test]
    fn back_forfeits_and_tab_opens_settings() {
        let mut env = Env::new();
        let mut level = Level::new(0, &cfg());
        let mut ctx = env.ctx();
        assert_eq!(
            level.handle_event(InputEvent::Back, &mut ctx),
            Some(StageRequest::BackToOverworld { unlock_reward: 0 })
        );
        assert_eq!(level.handle_event(InputEvent::Settings, &mut ctx), Some(StageRequest::OpenSettings));
    }

    #[test]
    fn first_level_queues_tutorial() {
        let mut env = Env::new();
        let mut level = Level::new(0, &cfg());
        level.enter(&mut env.ctx());
        assert_eq!(env.text.pending(), TUTORIAL.len());

        let mut env = Env::new();
        let mut level = Level::new(1, &cfg());
        level.enter(&mut env.ctx());
        assert_eq!(env.text.pending(), 0);
    }
}
