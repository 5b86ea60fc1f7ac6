//! Message formatting utilities for terminal display.

use groupbuy_shared::time::{format_clock_label, timestamp_to_kst_rfc3339};

use crate::{
    domain::{ChatMessage, MessageBody, RoomInfo},
    session::SessionEvent,
};

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Message formatter for terminal display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the participant list of a room
    ///
    /// # Arguments
    ///
    /// * `info` - Room information returned by the backend
    /// * `current_user_id` - The current user's ID (to mark as "me")
    pub fn format_room_info(info: &RoomInfo, current_user_id: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{}\n", RULE));
        output.push_str("Participants:\n");

        if info.participants.is_empty() {
            output.push_str("(No participants)\n");
        } else {
            for participant in &info.participants {
                let me_suffix = if participant.user_id == current_user_id {
                    " (me)"
                } else {
                    ""
                };
                let owner_suffix = if participant.user_id == info.post_owner_id {
                    " [owner]"
                } else {
                    ""
                };
                output.push_str(&format!(
                    "{}{}{} ({})\n",
                    participant.nickname, me_suffix, owner_suffix, participant.user_id
                ));
            }
        }

        output.push_str(&format!("{}\n", RULE));
        output
    }

    /// Format a chat message
    ///
    /// Images are shown as their download URL under `media_base_url`.
    pub fn format_chat_message(message: &ChatMessage, media_base_url: &str) -> String {
        let content = match &message.body {
            MessageBody::Text(text) => text.clone(),
            MessageBody::Image(image) => format!("[image] {}", image.url(media_base_url)),
        };
        let me_suffix = if message.is_own { " (me)" } else { "" };
        let timestamp_str = timestamp_to_kst_rfc3339(message.sent_at.value());

        format!(
            "\n{}\n@{}{}: {}\nsent at {}\n{}\n",
            THIN_RULE, message.sender.display_name, me_suffix, content, timestamp_str, THIN_RULE
        )
    }

    /// Format a block of older messages loaded from history
    pub fn format_history_block(messages: &[ChatMessage], media_base_url: &str) -> String {
        let mut output = String::from("\n▲ earlier messages\n");
        for message in messages {
            let content = match &message.body {
                MessageBody::Text(text) => text.clone(),
                MessageBody::Image(image) => format!("[image] {}", image.url(media_base_url)),
            };
            output.push_str(&format!(
                "[{}] @{}: {}\n",
                format_clock_label(message.sent_at.value()),
                message.sender.display_name,
                content
            ));
        }
        output
    }

    /// Format a session notification
    ///
    /// Returns `None` for notifications whose content is shown as messages.
    pub fn format_event(event: &SessionEvent) -> Option<String> {
        let text = match event {
            SessionEvent::Connected => "* connected".to_string(),
            SessionEvent::Disconnected => "* disconnected".to_string(),
            SessionEvent::ReconnectSuggested => {
                "* connection is unstable, type /reconnect to reconnect".to_string()
            }
            SessionEvent::ConnectionFailed { attempts } => {
                format!("* could not connect after {} attempts", attempts)
            }
            SessionEvent::ExitedRoom => "* you left the room".to_string(),
            SessionEvent::PostDeleted => "* the post was deleted".to_string(),
            SessionEvent::FetchedEmptyHistory => "* no more messages".to_string(),
            SessionEvent::ReceivedBanNotification => {
                "* you were removed from this room by the post owner".to_string()
            }
            SessionEvent::ImageUploadFailed => "* failed to upload the image".to_string(),
            SessionEvent::RequestFailed(error) => format!("* {}", error.user_message()),
            SessionEvent::ChatReceived
            | SessionEvent::ChatSent
            | SessionEvent::FetchedOlderMessages { .. }
            | SessionEvent::FetchedNewerMessages { .. } => return None,
        };
        Some(format!("\n{}\n", text))
    }
}
