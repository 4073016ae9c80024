use clipchat_core::{ClipboardAccess, ClipboardError};

/// The OS clipboard. A fresh handle is opened per operation so another app holding the
/// clipboard only fails that one call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardAccess for SystemClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        let mut clipboard = open()?;
        clipboard.get_text().map_err(map_error)
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = open()?;
        clipboard.set_text(text.to_owned()).map_err(map_error)
    }
}

fn open() -> Result<arboard::Clipboard, ClipboardError> {
    arboard::Clipboard::new().map_err(map_error)
}

fn map_error(err: arboard::Error) -> ClipboardError {
    match err {
        arboard::Error::ContentNotAvailable => ClipboardError::NoText,
        other => ClipboardError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_text_is_not_an_outage() {
        assert!(matches!(
            map_error(arboard::Error::ContentNotAvailable),
            ClipboardError::NoText
        ));
        assert!(matches!(
            map_error(arboard::Error::ClipboardOccupied),
            ClipboardError::Unavailable(_)
        ));
    }
}
