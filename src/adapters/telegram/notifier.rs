//! Telegram implementation of the `AccessNotifier` port.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId};

use crate::domain::foundation::ExternalUserId;
use crate::ports::{AccessNotifier, NotifierError};

/// Sends messages and manages membership of one private group.
#[derive(Clone)]
pub struct TelegramAccessNotifier {
    bot: Bot,
    group_chat_id: ChatId,
}

impl TelegramAccessNotifier {
    pub fn new(bot: Bot, group_chat_id: i64) -> Self {
        Self {
            bot,
            group_chat_id: ChatId(group_chat_id),
        }
    }
}

/// Telegram user ids are numeric; a private chat with a user has the same id.
fn telegram_user(user: &ExternalUserId) -> Result<UserId, NotifierError> {
    user.as_numeric()
        .map(UserId)
        .ok_or_else(|| NotifierError::InvalidRecipient(user.to_string()))
}

fn private_chat(user: &ExternalUserId) -> Result<ChatId, NotifierError> {
    let id = telegram_user(user)?;
    i64::try_from(id.0)
        .map(ChatId)
        .map_err(|_| NotifierError::InvalidRecipient(user.to_string()))
}

fn platform(e: teloxide::RequestError) -> NotifierError {
    NotifierError::Platform(e.to_string())
}

#[async_trait]
impl AccessNotifier for TelegramAccessNotifier {
    async fn send_message(&self, user: &ExternalUserId, text: &str) -> Result<(), NotifierError> {
        let chat = private_chat(user)?;
        self.bot
            .send_message(chat, text)
            .await
            .map_err(platform)?;
        Ok(())
    }

    async fn grant_group_access(&self, user: &ExternalUserId) -> Result<String, NotifierError> {
        let link = self
            .bot
            .create_chat_invite_link(self.group_chat_id)
            .member_limit(1)
            .name(format!("member {}", user))
            .await
            .map_err(platform)?;

        tracing::debug!(external_user_id = %user, "Created single-use invite link");
        Ok(link.invite_link)
    }

    async fn revoke_group_access(&self, user: &ExternalUserId) -> Result<(), NotifierError> {
        let user_id = telegram_user(user)?;

        // Ban removes the member; the unban lets them rejoin after resubscribing.
        self.bot
            .ban_chat_member(self.group_chat_id, user_id)
            .await
            .map_err(platform)?;
        self.bot
            .unban_chat_member(self.group_chat_id, user_id)
            .only_if_banned(true)
            .await
            .map_err(platform)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_user_maps_to_private_chat() {
        let user = ExternalUserId::from_numeric(123456789);
        assert_eq!(private_chat(&user).unwrap(), ChatId(123456789));
        assert_eq!(telegram_user(&user).unwrap(), UserId(123456789));
    }

    #[test]
    fn non_numeric_user_is_invalid_recipient() {
        let user = ExternalUserId::new("alice").unwrap();
        assert!(matches!(
            private_chat(&user),
            Err(NotifierError::InvalidRecipient(_))
        ));
    }
}
