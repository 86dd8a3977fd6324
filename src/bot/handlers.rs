use crate::bot::transport::{ChatRef, ChatTransport, MessageRef};
use crate::bot::views::{DefaultDownloadView, DownloadView};
use crate::error::FlowError;
use crate::flow::SessionFlow;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{debug, error, info, warn};

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// `true` for text that should be treated as a link submission.
///
/// Commands, including ones the bot does not know, are not.
#[must_use]
pub fn is_link_candidate(text: &str) -> bool {
    !text.trim_start().starts_with('/')
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show the welcome message
    #[command(description = "Show what the bot can do.")]
    Help,
    /// Drop the current request
    #[command(description = "Cancel the current request.")]
    Cancel,
}

/// Handle `/start`, `/help` and `/cancel`
///
/// # Errors
///
/// Never fails; flow errors are reported to the user and logged.
pub async fn handle_command(
    msg: Message,
    cmd: Command,
    flow: Arc<SessionFlow>,
    transport: Arc<dyn ChatTransport>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    let chat = ChatRef(msg.chat.id.0);

    match cmd {
        Command::Start | Command::Help => {
            info!(user_id, "Welcome requested");
            if let Err(e) = transport
                .send_text(chat, DefaultDownloadView::welcome_message())
                .await
            {
                report_flow_error(transport.as_ref(), user_id, chat, &e.into()).await;
            }
        }
        Command::Cancel => {
            if let Err(e) = flow.cancel(user_id, chat).await {
                report_flow_error(transport.as_ref(), user_id, chat, &e).await;
            }
        }
    }

    respond(())
}

/// Handle a plain text message as a link submission
///
/// # Errors
///
/// Never fails; flow errors are reported to the user and logged.
pub async fn handle_text(
    msg: Message,
    flow: Arc<SessionFlow>,
    transport: Arc<dyn ChatTransport>,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return respond(());
    };
    let user_id = get_user_id_safe(&msg);
    let chat = ChatRef(msg.chat.id.0);

    if let Err(e) = flow.submit_link(user_id, chat, text).await {
        report_flow_error(transport.as_ref(), user_id, chat, &e).await;
    }

    respond(())
}

/// Handle a press on an inline button.
///
/// The selection runs in its own task: the dispatcher handles one update per
/// chat at a time, and a Cancel press must get through while a download runs.
///
/// # Errors
///
/// Never fails; flow errors are reported to the user and logged.
pub async fn handle_callback(
    q: CallbackQuery,
    flow: Arc<SessionFlow>,
    transport: Arc<dyn ChatTransport>,
) -> Result<(), teloxide::RequestError> {
    let callback_id = q.id.0.clone();
    let Some(data) = q.data.clone() else {
        answer_quietly(transport.as_ref(), &callback_id).await;
        return respond(());
    };

    let user_id = q.from.id.0.cast_signed();
    let Some((chat, message)) = q
        .message
        .as_ref()
        .map(|m| (ChatRef(m.chat().id.0), MessageRef(m.id().0)))
    else {
        // Menu too old for Telegram to tell us where it is
        debug!(user_id, "Callback without message");
        answer_quietly(transport.as_ref(), &callback_id).await;
        return respond(());
    };

    tokio::spawn(async move {
        if let Err(e) = flow
            .handle_selection(user_id, chat, message, &callback_id, &data)
            .await
        {
            report_flow_error(transport.as_ref(), user_id, chat, &e).await;
        }
    });

    respond(())
}

async fn answer_quietly(transport: &dyn ChatTransport, callback_id: &str) {
    if let Err(e) = transport.answer_callback(callback_id, None).await {
        debug!(error = %e, "Failed to answer callback query");
    }
}

/// Last-resort error handling for a single update.
///
/// Expected outcomes were already shown to the user by the flow and are only
/// logged; unexpected ones get a generic reply.
pub async fn report_flow_error(
    transport: &dyn ChatTransport,
    user_id: i64,
    chat: ChatRef,
    err: &FlowError,
) {
    if !err.is_unexpected() {
        debug!(user_id, error = %err, "Request ended");
        return;
    }

    error!(user_id, error = %err, "Unexpected error while handling update");
    if let Err(e) = transport
        .send_text(chat, DefaultDownloadView::unexpected_error())
        .await
    {
        warn!(user_id, error = %e, "Failed to send error reply");
    }
}
