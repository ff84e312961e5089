/// Events crossing the sim boundary.
///
/// `InputEvent` flows in: discrete, edge-triggered actions produced by the
/// keyboard/gamepad layer. `GameEvent` flows out: things the presentation
/// layer reacts to (sound effects, re-applying settings).

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputEvent {
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Back,
    Quit,
    /// Decimal digit 0-9 typed into the search field.
    Digit(u8),
    Period,
    Backspace,
    /// Show the fastest time on the overworld.
    Fastest,
    Jump,
    /// Open the settings menu from inside a level.
    Settings,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveDir {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    CoinPicked { value: u32 },
    Jumped,
    Damaged,
    LevelCleared { level: usize, time: f64 },
    GameOver,
    GameComplete,
    /// Audio/video settings changed; volumes and frame size must be re-applied.
    SettingsChanged,
}
