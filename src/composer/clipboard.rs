use anyhow::{anyhow, Result};

pub trait ClipboardSink: Send + Sync + 'static {
    fn write_text(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|err| anyhow!("clipboard unavailable: {err}"))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|err| anyhow!("clipboard write failed: {err}"))
    }
}
