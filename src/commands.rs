// src/commands.rs
//! Telegram update poller.
//!
//! One long-poll loop over `getUpdates` feeds two consumers: channel posts go
//! into the [`ChannelHistory`] buffer read by the liquidation and whale jobs,
//! and private messages are dispatched as commands behind an allow-list.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::ingest::providers::channel::ChannelHistory;
use crate::notify::telegram::{Message, Update};
use crate::notify::{Destination, OutgoingMessage, Sink, TelegramApi};
use crate::status::StatusSource;

const START_TEXT: &str = "🚀 Ethereum Tracker Bot\n\n\
Publishes to the channel:\n\
• urgent and regular ETH news\n\
• 4H candle analysis with key levels\n\
• sharp price moves\n\
• large liquidations and whale transfers\n\
• the daily altseason index\n\n\
/status shows the current price and the job schedule.";

const ACCESS_DENIED: &str = "⛔ Access denied.";
const UNKNOWN: &str = "Unknown command. Try /start or /status.";
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Unknown(String),
}

/// `/status@my_bot args` -> `Status`. `None` when the text is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.trim().split_whitespace().next()?;
    let word = word.strip_prefix('/')?;
    let name = word.split('@').next().unwrap_or(word).to_ascii_lowercase();
    Some(match name.as_str() {
        "start" | "help" => Command::Start,
        "status" => Command::Status,
        _ => Command::Unknown(name),
    })
}

/// Chats and users allowed to issue commands.
#[derive(Debug, Clone)]
pub struct AccessList {
    allowed: Vec<String>,
}

impl AccessList {
    pub fn new(admin_chat_id: &str, extra: &[String]) -> Self {
        let mut allowed = vec![admin_chat_id.trim().to_string()];
        allowed.extend(extra.iter().map(|s| s.trim().to_string()));
        allowed.retain(|s| !s.is_empty());
        Self { allowed }
    }

    pub fn permits(&self, msg: &Message) -> bool {
        let chat = msg.chat.id.to_string();
        let user = msg.from.as_ref().map(|u| u.id.to_string());
        self.allowed
            .iter()
            .any(|a| *a == chat || user.as_deref() == Some(a.as_str()))
    }
}

pub struct UpdatePoller {
    api: TelegramApi,
    replies: Arc<dyn Sink>,
    history: ChannelHistory,
    status: StatusSource,
    access: AccessList,
    wait_secs: u64,
    started_at: DateTime<Utc>,
}

impl UpdatePoller {
    pub fn new(
        api: TelegramApi,
        replies: Arc<dyn Sink>,
        history: ChannelHistory,
        status: StatusSource,
        access: AccessList,
    ) -> Self {
        Self {
            api,
            replies,
            history,
            status,
            access,
            wait_secs: 30,
            started_at: Utc::now(),
        }
    }

    pub fn with_wait_secs(mut self, wait_secs: u64) -> Self {
        self.wait_secs = wait_secs;
        self
    }

    /// Poll until `shutdown` flips. Errors back off and retry.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut offset = 0i64;
        tracing::info!("update poller started");
        loop {
            let batch = tokio::select! {
                r = self.api.get_updates(offset, self.wait_secs) => r,
                _ = shutdown.changed() => break,
            };
            match batch {
                Ok(updates) => {
                    for u in updates {
                        offset = offset.max(u.update_id + 1);
                        self.handle_update(u).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed");
                    tokio::select! {
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }
        tracing::info!("update poller stopped");
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(post) = update.channel_post.or(update.edited_channel_post) {
            self.record_post(&post);
            return;
        }
        if let Some(msg) = update.message {
            self.handle_message(&msg).await;
        }
    }

    fn record_post(&self, msg: &Message) {
        match msg.to_channel_post() {
            Some(post) => {
                tracing::debug!(chat = %post.chat, id = post.message_id, "channel post buffered");
                self.history.record(post, msg.chat.username.as_deref());
            }
            None => tracing::trace!(chat = msg.chat.id, "channel post without text"),
        }
    }

    async fn handle_message(&self, msg: &Message) {
        let Some(cmd) = msg.text.as_deref().and_then(parse_command) else {
            return;
        };
        // backlog from before startup is dropped
        if msg.date < self.started_at.timestamp() {
            tracing::debug!(chat = msg.chat.id, ?cmd, "stale command ignored");
            return;
        }
        let reply = if !self.access.permits(msg) {
            tracing::warn!(chat = msg.chat.id, ?cmd, "command from unlisted chat");
            ACCESS_DENIED.to_string()
        } else {
            tracing::info!(chat = msg.chat.id, ?cmd, "command");
            match cmd {
                Command::Start => START_TEXT.to_string(),
                Command::Status => self.status.snapshot().render_text(),
                Command::Unknown(_) => UNKNOWN.to_string(),
            }
        };
        let dest = Destination::Admin(msg.chat.id.to_string());
        if let Err(e) = self.replies.send(&dest, &OutgoingMessage::plain(reply)).await {
            tracing::warn!(error = %e, %dest, "command reply not delivered");
        }
    }
}
