/// Heads-up display state: hearts row and a briefly shown coin counter.
///
/// This is the `NotificationSink` the progression store talks to. It holds
/// only what the renderer needs to draw; no terminal I/O happens here.
///
/// Hearts: the first `BASE_HEARTS` slots are always drawn (full or empty),
/// health above that adds bonus hearts, at most `MAX_BONUS_HEARTS` of them;
/// the rest is shown as a count.

use std::time::Duration;

use crate::domain::progress::NotificationSink;

pub const BASE_HEARTS: usize = 3;
pub const MAX_BONUS_HEARTS: usize = 5;
const COIN_DISPLAY: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Heart {
    Full,
    Empty,
    Bonus,
}

#[derive(Debug, Default)]
pub struct Hud {
    hearts: Vec<Heart>,
    /// Bonus health beyond the drawn bonus hearts.
    extra_hearts: usize,
    coin_amount: u32,
    coin_timer: Duration,
}

impl Hud {
    pub fn new() -> Self {
        Hud::default()
    }

    pub fn hearts(&self) -> &[Heart] {
        &self.hearts
    }

    pub fn extra_hearts(&self) -> usize {
        self.extra_hearts
    }

    /// Coin count while its display timer runs.
    pub fn visible_coins(&self) -> Option<u32> {
        if self.coin_timer.is_zero() { None } else { Some(self.coin_amount) }
    }

    pub fn update(&mut self, dt: Duration) {
        self.coin_timer = self.coin_timer.saturating_sub(dt);
    }
}

impl NotificationSink for Hud {
    fn create_hearts(&mut self, health: i32) {
        let health = health.max(0) as usize;
        let full = health.min(BASE_HEARTS);
        let bonus = health.saturating_sub(BASE_HEARTS);

        self.hearts.clear();
        self.hearts.extend((0..BASE_HEARTS).map(|i| if i < full { Heart::Full } else { Heart::Empty }));
        self.hearts.extend(std::iter::repeat(Heart::Bonus).take(bonus.min(MAX_BONUS_HEARTS)));
        self.extra_hearts = bonus.saturating_sub(MAX_BONUS_HEARTS);
    }

    fn show_coins(&mut self, coins: u32) {
        self.coin_amount = coins;
        self.coin_timer = COIN_DISPLAY;
    }
}
