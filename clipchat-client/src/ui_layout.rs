use clipchat_core::NoticeLevel;

/// Window sizing in logical points.
pub const WINDOW_DEFAULT_W: f32 = 720.0;
pub const WINDOW_DEFAULT_H: f32 = 640.0;
pub const WINDOW_MIN_W: f32 = 520.0;
pub const WINDOW_MIN_H: f32 = 460.0;

pub const INPUT_ROWS: usize = 8;
pub const OUTPUT_ROWS: usize = 10;
pub const SYSTEM_PROMPT_ROWS: usize = 3;

pub const TEMPERATURE_STEP: f64 = 0.05;

pub const HOTKEY_LABEL: &str = "Ctrl+Shift+Space";
pub const SEND_SHORTCUT_LABEL: &str = "Ctrl+Enter";

/// Status line colour per notice level, as RGB.
pub fn notice_rgb(level: NoticeLevel) -> (u8, u8, u8) {
    match level {
        NoticeLevel::Info => (0x4a, 0x90, 0xd9),
        NoticeLevel::Success => (0x3c, 0xa0, 0x5a),
        NoticeLevel::Warning => (0xd9, 0x8c, 0x1f),
        NoticeLevel::Error => (0xd0, 0x3c, 0x3c),
    }
}
