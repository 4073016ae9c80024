pub mod clipboard;
pub mod config_store;
pub mod instance;
pub mod native_window;
pub mod ui_layout;
pub mod vault;
