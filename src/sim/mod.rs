pub mod event;
pub mod level;
pub mod overworld;
pub mod settings_menu;
pub mod stage;
pub mod text;
