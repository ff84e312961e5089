/// Gamepad input using gilrs.
///
/// Produces the same `InputEvent`s as the keyboard. Button roles come from
/// the `[gamepad]` section of config.toml; defaults:
///   D-pad / Left Stick    →  directions (held Left/Right runs)
///   A / Start             →  Confirm
///   B / Select            →  Back
///   A / X                 →  Jump
///
/// A button may carry several roles; stages ignore events they don't use.

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::sim::event::{InputEvent, MoveDir};

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,
    R1,
    Start,
    Select,
}

const BTN_COUNT: usize = 8;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" => Some(Btn::L1),
            "R1" | "RB" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East => Some(Btn::B),
            Button::West => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            _ => None,
        }
    }
}

/// D-pad / stick directions, indexable.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Dir {
    Up,
    Down,
    Left,
    Right,
}

const DIRS: [(Dir, InputEvent); 4] = [
    (Dir::Up, InputEvent::Up),
    (Dir::Down, InputEvent::Down),
    (Dir::Left, InputEvent::Left),
    (Dir::Right, InputEvent::Right),
];

/// Per-button state: held (continuous) and just_pressed (edge).
#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    held: bool,
    just_pressed: bool,
}

impl BtnState {
    fn set(&mut self, held: bool) {
        if held && !self.held {
            self.just_pressed = true;
        }
        self.held = held;
    }
}

/// Role-to-button mapping (loaded from config).
struct ActionMap {
    confirm: Vec<Btn>,
    back: Vec<Btn>,
    jump: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            confirm: vec![Btn::A, Btn::Start],
            back: vec![Btn::B, Btn::Select],
            jump: vec![Btn::A, Btn::X],
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    buttons: [BtnState; BTN_COUNT],
    dpad: [BtnState; 4],
    stick: [BtnState; 4],
    stick_x: f32,
    stick_y: f32,

    action_map: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                tracing::warn!("gamepad support unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            buttons: [BtnState::default(); BTN_COUNT],
            dpad: [BtnState::default(); 4],
            stick: [BtnState::default(); 4],
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Load button roles from config. Empty or unparsable lists keep the default.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        fn parse_list(names: &[String], into: &mut Vec<Btn>) {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if !parsed.is_empty() {
                *into = parsed;
            }
        }
        parse_list(&cfg.confirm, &mut self.action_map.confirm);
        parse_list(&cfg.back, &mut self.action_map.back);
        parse_list(&cfg.jump, &mut self.action_map.jump);
    }

    pub fn update(&mut self) {
        self.clear_just_pressed();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.set_button(btn, false);
                }
                EventType::AxisChanged(axis, value, _) => match axis {
                    Axis::LeftStickX => self.stick_x = value,
                    Axis::LeftStickY => self.stick_y = value,
                    _ => {}
                },
                EventType::Connected => {
                    tracing::info!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    tracing::info!("gamepad disconnected");
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }

        self.derive_stick();
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, held: bool) {
        let dir = match gilrs_btn {
            Button::DPadUp => Some(Dir::Up),
            Button::DPadDown => Some(Dir::Down),
            Button::DPadLeft => Some(Dir::Left),
            Button::DPadRight => Some(Dir::Right),
            _ => None,
        };
        if let Some(dir) = dir {
            self.dpad[dir as usize].set(held);
        } else if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            self.buttons[btn as usize].set(held);
        }
    }

    /// Digital stick directions from the analog position.
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn derive_stick(&mut self) {
        self.stick[Dir::Left as usize].set(self.stick_x < -STICK_DEADZONE);
        self.stick[Dir::Right as usize].set(self.stick_x > STICK_DEADZONE);
        self.stick[Dir::Up as usize].set(self.stick_y > STICK_DEADZONE);
        self.stick[Dir::Down as usize].set(self.stick_y < -STICK_DEADZONE);
    }

    // ── Queries ──

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[b as usize].just_pressed)
    }

    fn dir_pressed(&self, dir: Dir) -> bool {
        self.dpad[dir as usize].just_pressed || self.stick[dir as usize].just_pressed
    }

    fn dir_held(&self, dir: Dir) -> bool {
        self.dpad[dir as usize].held || self.stick[dir as usize].held
    }

    /// Edge events of this frame, appended to `out`.
    pub fn collect_events(&self, out: &mut Vec<InputEvent>) {
        for (dir, ev) in DIRS {
            if self.dir_pressed(dir) {
                out.push(ev);
            }
        }
        if self.any_just_pressed(&self.action_map.confirm) {
            out.push(InputEvent::Confirm);
        }
        if self.any_just_pressed(&self.action_map.back) {
            out.push(InputEvent::Back);
        }
        if self.any_just_pressed(&self.action_map.jump) {
            out.push(InputEvent::Jump);
        }
    }

    pub fn movement(&self) -> Option<MoveDir> {
        match (self.dir_held(Dir::Left), self.dir_held(Dir::Right)) {
            (true, false) => Some(MoveDir::Left),
            (false, true) => Some(MoveDir::Right),
            _ => None,
        }
    }

    // ── Internal ──

    fn clear_just_pressed(&mut self) {
        for b in self.buttons.iter_mut().chain(&mut self.dpad).chain(&mut self.stick) {
            b.just_pressed = false;
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.buttons = [BtnState::default(); BTN_COUNT];
        self.dpad = [BtnState::default(); 4];
        self.stick = [BtnState::default(); 4];
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }
}
