//! Dispatcher schema for the Telegram bot.
//!
//! Parses updates into `BotCommandHandler` calls and renders the resulting
//! `BotReply` with an inline keyboard.

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, User};
use teloxide::utils::command::BotCommands;

use crate::application::handlers::{BotCommandHandler, BotReply, BotUser, ReplyAction, SUBSCRIBE_ACTION};
use crate::domain::foundation::ExternalUserId;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "sign up and see your subscription")]
    Start,
    #[command(description = "show your subscription status")]
    Status,
}

/// Creates the dispatcher schema.
///
/// The same schema is used in production and in tests.
pub fn schema(handler: Arc<BotCommandHandler>) -> UpdateHandler<HandlerError> {
    let commands = Arc::clone(&handler);
    let callbacks = handler;

    dptree::entry()
        .branch(command_handler(commands))
        .branch(callback_handler(callbacks))
}

/// Registers commands with Telegram and runs long polling until ctrl-c.
pub async fn run_dispatcher(bot: Bot, handler: Arc<BotCommandHandler>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!(error = %e, "Failed to register bot commands");
    }

    tracing::info!("Telegram dispatcher starting");
    Dispatcher::builder(bot, schema(handler))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    tracing::info!("Telegram dispatcher stopped");
}

fn command_handler(handler: Arc<BotCommandHandler>) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let handler = Arc::clone(&handler);
            async move {
                let Some(from) = msg.from.as_ref() else {
                    return Ok(());
                };
                let user = bot_user(from);
                tracing::info!(external_user_id = %user.id, command = ?cmd, "Received command");

                let reply = match cmd {
                    Command::Start => handler.start(&user).await,
                    Command::Status => handler.status(&user.id).await,
                };
                send_reply(&bot, msg.chat.id, reply).await?;
                Ok(())
            }
        },
    ))
}

fn callback_handler(handler: Arc<BotCommandHandler>) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let handler = Arc::clone(&handler);
        async move {
            bot.answer_callback_query(q.id.clone()).await?;

            if q.data.as_deref() != Some(SUBSCRIBE_ACTION) {
                tracing::debug!(data = ?q.data, "Ignoring unknown callback");
                return Ok(());
            }

            let user = bot_user(&q.from);
            tracing::info!(external_user_id = %user.id, "Subscribe requested");
            let reply = handler.subscribe(&user).await;
            send_reply(&bot, q.from.id, reply).await?;
            Ok(())
        }
    })
}

fn bot_user(from: &User) -> BotUser {
    BotUser {
        id: ExternalUserId::from_numeric(from.id.0),
        username: from.username.clone(),
        display_name: from.full_name(),
    }
}

/// Splits a reply into message text and optional keyboard.
pub fn render(reply: BotReply) -> (String, Option<InlineKeyboardMarkup>) {
    match reply.action {
        ReplyAction::None => (reply.text, None),
        ReplyAction::Subscribe => (
            reply.text,
            Some(InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::callback("Subscribe", SUBSCRIBE_ACTION),
            ]])),
        ),
        ReplyAction::OpenLink { label, url } => match reqwest::Url::parse(&url) {
            Ok(parsed) => (
                reply.text,
                Some(InlineKeyboardMarkup::new(vec![vec![
                    InlineKeyboardButton::url(label, parsed),
                ]])),
            ),
            Err(_) => (format!("{}\n\n{}", reply.text, url), None),
        },
    }
}

async fn send_reply(
    bot: &Bot,
    chat: impl Into<teloxide::types::Recipient>,
    reply: BotReply,
) -> Result<(), HandlerError> {
    let (text, keyboard) = render(reply);
    let request = bot.send_message(chat, text);
    match keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn commands_parse_lowercase() {
        assert_eq!(Command::parse("/start", "member_gate_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/status", "member_gate_bot").unwrap(), Command::Status);
        assert!(Command::parse("/unknown", "member_gate_bot").is_err());
    }

    #[test]
    fn subscribe_action_renders_callback_button() {
        let (text, keyboard) = render(BotReply {
            text: "hi".to_string(),
            action: ReplyAction::Subscribe,
        });

        assert_eq!(text, "hi");
        let button = &keyboard.unwrap().inline_keyboard[0][0];
        assert_eq!(button.text, "Subscribe");
        assert_eq!(
            button.kind,
            InlineKeyboardButtonKind::CallbackData(SUBSCRIBE_ACTION.to_string())
        );
    }

    #[test]
    fn link_action_renders_url_button() {
        let (_, keyboard) = render(BotReply {
            text: "pay".to_string(),
            action: ReplyAction::OpenLink {
                label: "Pay now".to_string(),
                url: "https://checkout.stripe.com/c/pay/cs_1".to_string(),
            },
        });

        let button = &keyboard.unwrap().inline_keyboard[0][0];
        assert!(matches!(button.kind, InlineKeyboardButtonKind::Url(_)));
    }

    #[test]
    fn unparseable_link_falls_back_to_text() {
        let (text, keyboard) = render(BotReply {
            text: "pay".to_string(),
            action: ReplyAction::OpenLink {
                label: "Pay now".to_string(),
                url: "not a url".to_string(),
            },
        });

        assert!(keyboard.is_none());
        assert!(text.ends_with("not a url"));
    }
}
