//! Telegram bot configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Telegram bot configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    /// Token issued by @BotFather, `<bot id>:<secret>`
    pub bot_token: String,

    /// The private supergroup members are invited to (negative id)
    pub group_chat_id: i64,
}

impl TelegramConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bot_token.is_empty() {
            return Err(ValidationError::MissingRequired("TELEGRAM_BOT_TOKEN"));
        }
        let valid_token = self
            .bot_token
            .split_once(':')
            .map(|(id, secret)| {
                !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
            })
            .unwrap_or(false);
        if !valid_token {
            return Err(ValidationError::InvalidBotToken);
        }
        if self.group_chat_id >= 0 {
            return Err(ValidationError::InvalidGroupChatId);
        }
        Ok(())
    }
}
