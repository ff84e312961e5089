/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Player-facing options (resolution, volumes) live in the JSON settings
/// file instead; see `settings.rs`.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tick_rate_ms: u64,
    pub settings_file: PathBuf,
    pub level: LevelConfig,
    pub gamepad: GamepadConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LevelConfig {
    /// Cells per second while Left/Right is held.
    pub run_speed: f32,
    /// Air time of one jump.
    pub jump_ms: u64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        LevelConfig {
            run_speed: default_run_speed(),
            jump_ms: default_jump_ms(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub confirm: Vec<String>,
    pub back: Vec<String>,
    pub jump: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    level: TomlLevel,
    #[serde(default)]
    gamepad: TomlGamepad,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_settings_file")]
    settings_file: String,
}

#[derive(Deserialize, Debug)]
struct TomlLevel {
    #[serde(default = "default_run_speed")]
    run_speed: f32,
    #[serde(default = "default_jump_ms")]
    jump_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_back")]
    back: Vec<String>,
    #[serde(default = "default_jump")]
    jump: Vec<String>,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }
fn default_settings_file() -> String { "data/settings.json".into() }
fn default_run_speed() -> f32 { 6.0 }
fn default_jump_ms() -> u64 { 450 }

fn default_confirm() -> Vec<String> { vec!["A".into(), "Start".into()] }
fn default_back() -> Vec<String> { vec!["B".into(), "Select".into()] }
fn default_jump() -> Vec<String> { vec!["A".into(), "X".into()] }

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            tick_rate_ms: default_tick_rate(),
            settings_file: default_settings_file(),
        }
    }
}

impl Default for TomlLevel {
    fn default() -> Self {
        TomlLevel {
            run_speed: default_run_speed(),
            jump_ms: default_jump_ms(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            confirm: default_confirm(),
            back: default_back(),
            jump: default_jump(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg)
    }

    fn from_toml(toml_cfg: TomlConfig) -> Self {
        let settings_file = PathBuf::from(&toml_cfg.general.settings_file);
        let settings_file = if settings_file.is_absolute() {
            settings_file
        } else {
            data_dir().join(settings_file)
        };

        GameConfig {
            tick_rate_ms: toml_cfg.general.tick_rate_ms.max(1),
            settings_file,
            level: LevelConfig {
                run_speed: toml_cfg.level.run_speed,
                jump_ms: toml_cfg.level.jump_ms,
            },
            gamepad: GamepadConfig {
                confirm: toml_cfg.gamepad.confirm,
                back: toml_cfg.gamepad.back,
                jump: toml_cfg.gamepad.jump,
            },
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Base directory for the settings file.
/// Exe directory when writable, else `~/.local/share/lonely-kitten`, else CWD.
pub fn data_dir() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            // System installs (/usr/games/...) are not writable.
            let test_path = parent.join(".write_test_lonely_kitten");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/lonely-kitten");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => {
                        info!("loaded {}", path.display());
                        return cfg;
                    }
                    Err(e) => {
                        warn!("config.toml parse error: {e}; using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}
