//! Chat transport seam.
//!
//! The dispatcher only ever talks to the chat platform through
//! [`ChatTransport`]; production wires a real client, tests wire an
//! in-memory fake that records calls.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub type ChatId = i64;
pub type UserId = i64;
pub type MessageId = i64;

/// One inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Text shown to the user.
    pub label: String,
    /// Opaque callback token delivered back on press.
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Inline keyboard layout, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Lay buttons out with at most `per_row` per row.
    pub fn grid(buttons: Vec<Button>, per_row: usize) -> Self {
        let rows = buttons
            .chunks(per_row.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        Self { rows }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform asked us to back off before retrying.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("transport timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Other(String),
}

/// Outbound chat operations plus file download.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, TransportError>;

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> Result<(), TransportError>;

    async fn send_keyboard(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageId, TransportError>;

    async fn edit_keyboard(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), TransportError>;

    async fn send_photo(
        &self,
        chat: ChatId,
        caption: &str,
        png: &[u8],
    ) -> Result<MessageId, TransportError>;

    async fn delete_message(&self, chat: ChatId, message: MessageId)
        -> Result<(), TransportError>;

    /// Fetch an uploaded document's bytes by its platform file id.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_chunks_rows() {
        let buttons: Vec<Button> = (1..=7)
            .map(|i| Button::new(format!("b{i}"), format!("t{i}")))
            .collect();
        let keyboard = Keyboard::grid(buttons, 3);
        assert_eq!(keyboard.rows.len(), 3);
        assert_eq!(keyboard.rows[0].len(), 3);
        assert_eq!(keyboard.rows[2].len(), 1);
    }
}
