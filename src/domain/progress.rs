/// Player progression: coins, health, unlock state and the level-time store.
///
/// All mutation goes through setters so the HUD is always told:
///   - coins change  → `NotificationSink::show_coins`
///   - health change → `NotificationSink::create_hearts`
///
/// Coin overflow: every 100 coins become +1 health. Applied in a loop, so a
/// single jump of 250 coins yields +2 health and 50 coins.

use super::records::{SearchHit, TimeRecord, TimeRecordStore};

pub const INITIAL_HEALTH: i32 = 3;
pub const COINS_PER_HEALTH: u32 = 100;

/// Receiver of progression changes (the HUD in the running game).
pub trait NotificationSink {
    fn create_hearts(&mut self, health: i32);
    fn show_coins(&mut self, coins: u32);
}

pub struct ProgressState<S: NotificationSink> {
    coins: u32,
    health: i32,
    unlocked_level: usize,
    current_level: usize,
    records: TimeRecordStore,
    sink: S,
}

impl<S: NotificationSink> ProgressState<S> {
    /// Fresh session state. Fires both notifications once.
    pub fn new(sink: S) -> Self {
        let mut state = ProgressState {
            coins: 0,
            health: INITIAL_HEALTH,
            unlocked_level: 0,
            current_level: 0,
            records: TimeRecordStore::new(),
            sink,
        };
        state.reset();
        state
    }

    // ── Queries ──

    pub fn coins(&self) -> u32 { self.coins }
    pub fn health(&self) -> i32 { self.health }
    pub fn unlocked_level(&self) -> usize { self.unlocked_level }
    pub fn current_level(&self) -> usize { self.current_level }
    pub fn records(&self) -> &[TimeRecord] { self.records.records() }
    pub fn sink(&self) -> &S { &self.sink }

    pub fn sink_mut(&mut self) -> &mut S { &mut self.sink }

    // ── Setters ──

    pub fn set_coins(&mut self, value: u32) {
        self.coins = value;
        while self.coins >= COINS_PER_HEALTH {
            self.coins -= COINS_PER_HEALTH;
            self.set_health(self.health + 1);
        }
        self.sink.show_coins(self.coins);
    }

    pub fn add_coins(&mut self, amount: u32) {
        self.set_coins(self.coins.saturating_add(amount));
    }

    pub fn set_health(&mut self, value: i32) {
        self.health = value;
        self.sink.create_hearts(value);
    }

    /// Raise the unlock marker; never lowers it.
    pub fn unlock(&mut self, level: usize) {
        self.unlocked_level = self.unlocked_level.max(level);
    }

    pub fn set_current_level(&mut self, level: usize) {
        self.current_level = level;
    }

    /// Back to session-start values. The leaderboard is kept.
    pub fn reset(&mut self) {
        self.coins = 0;
        self.health = INITIAL_HEALTH;
        self.unlocked_level = 0;
        self.current_level = 0;
        self.sink.create_hearts(self.health);
        self.sink.show_coins(self.coins);
    }

    // ── Leaderboard (delegates) ──

    pub fn add_level_time(&mut self, time: f64, level: usize) {
        self.records.add_level_time(time, level);
    }

    pub fn sort_records(&mut self) {
        self.records.sort();
    }

    pub fn search(&mut self, value: f64) -> Option<SearchHit> {
        self.records.search(value)
    }

    pub fn fastest(&mut self) -> Option<TimeRecord> {
        self.records.fastest()
    }
}
