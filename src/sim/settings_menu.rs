/// Settings menu: resolution, music toggle, two volume sliders, back.
///
/// Each row is a `MenuOption` carrying only what its kind needs. Changes go
/// straight through `SettingsManager` (which persists them) and emit
/// `GameEvent::SettingsChanged` so audio and frame size are re-applied live.

use crate::settings::SettingsManager;
use crate::sim::event::{GameEvent, InputEvent};
use crate::sim::stage::{Frame, Stage, StageContext, StageKind, StageRequest, StageView};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ToggleSetting {
    Music,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SliderSetting {
    MusicVolume,
    SfxVolume,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum MenuOption {
    Resolution,
    Toggle { label: &'static str, setting: ToggleSetting },
    Slider { label: &'static str, setting: SliderSetting, min: f32, max: f32, step: f32 },
    Back,
}

pub const OPTIONS: [MenuOption; 5] = [
    MenuOption::Resolution,
    MenuOption::Toggle { label: "Music", setting: ToggleSetting::Music },
    MenuOption::Slider {
        label: "Music Volume",
        setting: SliderSetting::MusicVolume,
        min: 0.0,
        max: 1.0,
        step: 0.1,
    },
    MenuOption::Slider {
        label: "SFX Volume",
        setting: SliderSetting::SfxVolume,
        min: 0.0,
        max: 1.0,
        step: 0.1,
    },
    MenuOption::Back,
];

impl MenuOption {
    /// Row text, e.g. "Music Volume: 50%".
    pub fn display(&self, settings: &SettingsManager) -> String {
        match *self {
            MenuOption::Resolution => format!("Resolution: {}", settings.resolution()),
            MenuOption::Toggle { label, setting } => {
                let on = toggle_value(setting, settings);
                format!("{}: {}", label, if on { "On" } else { "Off" })
            }
            MenuOption::Slider { label, setting, .. } => {
                let v = slider_value(setting, settings);
                format!("{}: {}%", label, (v * 100.0).round() as i32)
            }
            MenuOption::Back => "Back".to_string(),
        }
    }
}

fn toggle_value(setting: ToggleSetting, s: &SettingsManager) -> bool {
    match setting {
        ToggleSetting::Music => s.music_on(),
    }
}

fn set_toggle(setting: ToggleSetting, s: &mut SettingsManager, on: bool) {
    match setting {
        ToggleSetting::Music => s.set_music_on(on),
    }
}

fn slider_value(setting: SliderSetting, s: &SettingsManager) -> f32 {
    match setting {
        SliderSetting::MusicVolume => s.volume_music(),
        SliderSetting::SfxVolume => s.volume_sfx(),
    }
}

fn set_slider(setting: SliderSetting, s: &mut SettingsManager, v: f32) {
    match setting {
        SliderSetting::MusicVolume => s.set_volume_music(v),
        SliderSetting::SfxVolume => s.set_volume_sfx(v),
    }
}

pub struct SettingsMenu {
    selection: usize,
}

impl SettingsMenu {
    pub fn new() -> Self {
        SettingsMenu { selection: 0 }
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    /// Left/Right on the selected row. `dir` is -1 or +1.
    fn adjust(&mut self, dir: i8, ctx: &mut StageContext<'_>) {
        match OPTIONS[self.selection] {
            MenuOption::Resolution => {
                ctx.settings.cycle_resolution(dir > 0);
            }
            MenuOption::Slider { setting, min, max, step, .. } => {
                let current = slider_value(setting, ctx.settings);
                let next = (current + step * f32::from(dir)).clamp(min, max);
                set_slider(setting, ctx.settings, next);
            }
            MenuOption::Toggle { .. } | MenuOption::Back => return,
        }
        ctx.events.push(GameEvent::SettingsChanged);
    }
}

impl Stage for SettingsMenu {
    fn kind(&self) -> StageKind {
        StageKind::SettingsMenu
    }

    fn handle_event(&mut self, event: InputEvent, ctx: &mut StageContext<'_>) -> Option<StageRequest> {
        let n = OPTIONS.len();
        match event {
            InputEvent::Down => self.selection = (self.selection + 1) % n,
            InputEvent::Up => self.selection = (self.selection + n - 1) % n,
            InputEvent::Back => return Some(StageRequest::LeaveSettings),
            InputEvent::Confirm => match OPTIONS[self.selection] {
                MenuOption::Back => return Some(StageRequest::LeaveSettings),
                MenuOption::Toggle { setting, .. } => {
                    let on = toggle_value(setting, ctx.settings);
                    set_toggle(setting, ctx.settings, !on);
                    ctx.events.push(GameEvent::SettingsChanged);
                }
                MenuOption::Resolution | MenuOption::Slider { .. } => {}
            },
            InputEvent::Right => self.adjust(1, ctx),
            InputEvent::Left => self.adjust(-1, ctx),
            _ => {}
        }
        None
    }

    fn run(&mut self, _frame: &Frame, _ctx: &mut StageContext<'_>) -> Option<StageRequest> {
        None
    }

    fn view(&self) -> StageView<'_> {
        StageView::Settings(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::ProgressState;
    use crate::settings::Resolution;
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

        fn send(&mut self, menu: &mut SettingsMenu, events: &[InputEvent]) -> Option<StageRequest> {
            let mut ctx = StageContext {
                progress: &mut self.progress,
                text: &mut self.text,
                settings: &mut self.settings,
                events: &mut self.events,
            };
            let mut last = None;
            for &e in events {
                if let Some(r) = menu.handle_event(e, &mut ctx) {
                    last = Some(r);
                }
            }
            last
        }
    }

    #[test]
    fn resolution_row_cycles() {
        let mut env = Env::new();
        let mut menu = SettingsMenu::new();
        env.send(&mut menu, &[InputEvent::Right]);
        assert_eq!(env.settings.resolution(), Resolution(1920, 1080));
        env.send(&mut menu, &[InputEvent::Left, InputEvent::Left]);
        assert_eq!(env.settings.resolution(), Resolution(1024, 768));
        assert_eq!(env.events.len(), 3);
    }

    #[test]
    fn music_toggle_flips_on_confirm() {
        let mut env = Env::new();
        let mut menu = SettingsMenu::new();
        env.send(&mut menu, &[InputEvent::Down, InputEvent::Confirm]);
        assert!(!env.settings.music_on());
        assert_eq!(OPTIONS[1].display(&env.settings), "Music: Off");
        // Left/Right do nothing on a toggle.
        env.send(&mut menu, &[InputEvent::Right]);
        assert!(!env.settings.music_on());
        assert_eq!(env.events, vec![GameEvent::SettingsChanged]);
    }

    #[test]
    fn sliders_step_and_clamp() {
        let mut env = Env::new();
        let mut menu = SettingsMenu::new();
        env.send(&mut menu, &[InputEvent::Down, InputEvent::Down]);
        env.send(&mut menu, &[InputEvent::Right, InputEvent::Right]);
        assert_eq!(env.settings.volume_music(), 0.7);
        assert_eq!(OPTIONS[2].display(&env.settings), "Music Volume: 70%");

        env.send(&mut menu, &[InputEvent::Right; 6]);
        assert_eq!(env.settings.volume_music(), 1.0);

        env.send(&mut menu, &[InputEvent::Down]);
        env.send(&mut menu, &[InputEvent::Left; 9]);
        assert_eq!(env.settings.volume_sfx(), 0.0);
        assert_eq!(OPTIONS[3].display(&env.settings), "SFX Volume: 0%");
    }

    #[test]
    fn back_row_and_back_key_leave() {
        let mut env = Env::new();
        let mut menu = SettingsMenu::new();
        assert_eq!(env.send(&mut menu, &[InputEvent::Back]), Some(StageRequest::LeaveSettings));
        assert_eq!(
            env.send(&mut menu, &[InputEvent::Up, InputEvent::Confirm]),
            Some(StageRequest::LeaveSettings)
        );
        assert_eq!(menu.selection(), OPTIONS.len() - 1);
    }

    #[test]
    fn rows_render() {
        let s = SettingsManager::in_memory();
        let rows: Vec<String> = OPTIONS.iter().map(|o| o.display(&s)).collect();
        assert_eq!(
            rows,
            vec!["Resolution: 1280x720", "Music: On", "Music Volume: 50%", "SFX Volume: 70%", "Back"]
        );
    }
}
