/// Entry point and game loop.

mod config;
mod domain;
mod error;
mod settings;
mod sim;
mod ui;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::GameConfig;
use error::GameError;
use settings::SettingsManager;
use sim::event::{GameEvent, InputEvent};
use sim::stage::{Flow, Frame, StageController};
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Overrides the log file location.
const LOG_PATH_ENV: &str = "LONELY_KITTEN_LOG";

fn main() {
    init_logging();

    let config = GameConfig::load();
    let settings = SettingsManager::load(config.settings_file.clone());
    info!(settings = ?settings.settings(), tick_rate_ms = config.tick_rate_ms, "starting");
    let mut ctl = StageController::new(settings, config.level.clone());

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        error!("terminal init failed: {e}");
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let mut kb = InputState::new();
    if let Err(e) = kb.enable_release_events() {
        info!("release events unavailable: {e}");
    }

    let mut sound = SoundEngine::new();
    if let Some(sfx) = sound.as_mut() {
        sfx.apply_settings(ctl.settings());
    }

    let result = game_loop(&mut ctl, &mut renderer, &mut kb, sound.as_mut(), &config);

    if let Err(e) = kb.restore() {
        error!("keyboard restore failed: {e}");
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    match result {
        Ok(()) => info!("exited normally"),
        Err(e) => {
            error!("game error: {e}");
            eprintln!("Game error: {e}");
        }
    }

    println!();
    println!("Thanks for playing Lonely Kitten!");
    println!("Levels cleared: {}", ctl.progress().unlocked_level());
}

/// The terminal is in raw mode while playing, so logs go to a file.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    let path = std::env::var(LOG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| config::data_dir().join("lonely-kitten.log"));

    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
        }
        Err(_) => {
            // Nowhere safe to write: stderr would draw over the game.
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .init();
        }
    }
}

fn game_loop(
    ctl: &mut StageController,
    renderer: &mut Renderer,
    kb: &mut InputState,
    mut sound: Option<&mut SoundEngine>,
    config: &GameConfig,
) -> Result<(), GameError> {
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        info!("gamepad detected");
    }

    let tick_rate = Duration::from_millis(config.tick_rate_ms);
    let mut last_tick = Instant::now();
    // Edge events seen since the last tick.
    let mut pending: Vec<InputEvent> = Vec::with_capacity(16);

    loop {
        kb.drain_events();
        gp.update();
        pending.extend_from_slice(kb.events());
        gp.collect_events(&mut pending);

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_rate {
            let frame = Frame {
                dt: elapsed,
                movement: kb.movement().or_else(|| gp.movement()),
            };
            let flow = ctl.tick(&frame, &pending);
            pending.clear();
            last_tick = Instant::now();

            let events = ctl.drain_events();
            for event in &events {
                if let GameEvent::LevelCleared { level, time } = event {
                    let best = ctl.fastest_time();
                    info!(level = *level + 1, time = %format!("{time:.2}s"), %best, "level cleared");
                }
            }
            process_sound_events(sound.as_deref_mut(), &events, ctl.settings());

            if flow == Flow::Exit {
                break;
            }
        }

        renderer.render(ctl)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn process_sound_events(sound: Option<&mut SoundEngine>, events: &[GameEvent], settings: &SettingsManager) {
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    for event in events {
        match event {
            GameEvent::CoinPicked { value } if *value > 1 => sfx.play_gem(),
            GameEvent::CoinPicked { .. } => sfx.play_coin(),
            GameEvent::Jumped => sfx.play_jump(),
            GameEvent::Damaged => sfx.play_hurt(),
            GameEvent::LevelCleared { .. } => sfx.play_clear(),
            GameEvent::GameOver => sfx.play_game_over(),
            GameEvent::GameComplete => sfx.play_complete(),
            GameEvent::SettingsChanged => {
                sfx.apply_settings(settings);
                sfx.play_tick();
            }
        }
    }
}
