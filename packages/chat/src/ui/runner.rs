//! Terminal client execution logic.
//!
//! Reads lines with rustyline on a blocking thread, maps them to session
//! operations, and prints session notifications as they arrive. Reconnects
//! are handled by the session itself.

use std::{
    collections::HashSet,
    io::{self, Write},
};

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    config::ChatConfig,
    domain::{Nickname, RoomId, SessionContext, UserId},
    session::{ChatServices, ChatSession, FetchOutcome, SessionError, SessionEvent},
};

use super::{
    command::{HELP, InputCommand},
    error::ClientError,
    formatter::MessageFormatter,
};

/// Options for one terminal chat run
pub struct ClientOptions {
    pub room: RoomId,
    pub context: SessionContext,
    pub config: ChatConfig,
    pub access_token: Option<String>,
    /// Join the group buy before connecting
    pub join: bool,
}

enum Flow {
    Continue,
    Quit,
}

/// Run the terminal chat client until the user quits or leaves the room
pub async fn run_client(options: ClientOptions) -> Result<(), ClientError> {
    let ClientOptions {
        room,
        context,
        config,
        access_token,
        join,
    } = options;

    let prompt = context.nickname.to_string();
    let mut view = TimelineView::new(
        context.user_id.to_string(),
        config.media_base_url.clone(),
        prompt.clone(),
    );
    let services = ChatServices::from_config(&config, access_token);
    let (session, mut events) = ChatSession::spawn(room.clone(), context, config, services);

    if join {
        session.join_room().await?;
    } else {
        session.connect().await?;
    }

    println!(
        "\nYou are '{}' in room '{}'. Type messages and press Enter to send. /help lists commands.\n",
        prompt, room
    );

    let mut input_rx = spawn_readline(prompt);

    let result = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break Ok(());
                };
                match view.on_event(&session, event).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
            line = input_rx.recv() => {
                let Some(line) = line else {
                    // Ctrl+C / Ctrl+D
                    break Ok(());
                };
                match handle_input(&session, &view, &line).await {
                    Ok(Flow::Continue) => view.prompt(),
                    Ok(Flow::Quit) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
        }
    };

    if let Err(e) = session.close().await {
        tracing::debug!("Session already closed: {}", e);
    }
    result
}

/// Spawn a blocking thread for rustyline (synchronous readline)
fn spawn_readline(prompt: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = prompt_line(&prompt);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

async fn handle_input(
    session: &ChatSession,
    view: &TimelineView,
    line: &str,
) -> Result<Flow, ClientError> {
    match InputCommand::parse(line) {
        InputCommand::Send(text) => {
            report(session.send(text).await)?;
        }
        InputCommand::Older => {
            if let Some(FetchOutcome::Fetched(0)) = report(session.fetch_older_messages().await)? {
                println!("(every message on that page was hidden)");
            }
        }
        InputCommand::Newer => {
            report(session.fetch_newer_messages().await)?;
        }
        InputCommand::Leave => {
            report(session.leave_room().await)?;
        }
        InputCommand::Delete => {
            report(session.request_post_deletion().await)?;
        }
        InputCommand::Ban { user_id, nickname } => {
            match (UserId::try_from(user_id), Nickname::try_from(nickname)) {
                (Ok(user_id), Ok(nickname)) => {
                    report(session.ban_user(user_id, nickname).await)?;
                }
                _ => println!("usage: /ban <user-id> <name>"),
            }
        }
        InputCommand::Image(path) => match tokio::fs::read(&path).await {
            Ok(bytes) => {
                report(session.send_image(bytes).await)?;
            }
            Err(e) => println!("cannot read {}: {}", path.display(), e),
        },
        InputCommand::Reconnect => {
            if session.messages().await?.is_empty() {
                report(session.reset_and_reconnect().await)?;
            } else {
                report(session.reconnect_and_fetch_newer().await)?;
            }
        }
        InputCommand::Members => match session.room_info().await? {
            Some(info) => print!(
                "{}",
                MessageFormatter::format_room_info(&info, view.user_id.as_str())
            ),
            None => println!("room information is not loaded yet"),
        },
        InputCommand::Help => println!("{}", HELP),
        InputCommand::Quit => return Ok(Flow::Quit),
        InputCommand::Invalid(line) => println!("unknown command: {} (try /help)", line),
    }
    Ok(Flow::Continue)
}

/// Input prompt shown by rustyline and after each printed notification
fn prompt_line(nickname: &str) -> String {
    format!("{}> ", nickname)
}

/// Print a recoverable operation error and keep going
///
/// API failures are printed through their `RequestFailed` notification.
fn report<T>(result: Result<T, SessionError>) -> Result<Option<T>, ClientError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SessionError::Closed) => Err(SessionError::Closed.into()),
        Err(SessionError::Api(e)) => {
            tracing::debug!("Request failed: {}", e);
            Ok(None)
        }
        Err(e) => {
            println!("{}", e);
            Ok(None)
        }
    }
}

/// Tracks which messages have already been printed
struct TimelineView {
    user_id: String,
    media_base_url: String,
    prompt: String,
    shown: HashSet<Uuid>,
}

impl TimelineView {
    fn new(user_id: String, media_base_url: String, prompt: String) -> Self {
        Self {
            user_id,
            media_base_url,
            prompt,
            shown: HashSet::new(),
        }
    }

    /// Redisplay the input prompt after printing output
    fn prompt(&self) {
        print!("{}", prompt_line(&self.prompt));
        io::stdout().flush().ok();
    }

    async fn on_event(
        &mut self,
        session: &ChatSession,
        event: SessionEvent,
    ) -> Result<Flow, ClientError> {
        match &event {
            SessionEvent::ChatReceived
            | SessionEvent::ChatSent
            | SessionEvent::FetchedNewerMessages { .. } => self.print_unseen(session, false).await?,
            SessionEvent::FetchedOlderMessages { .. } => self.print_unseen(session, true).await?,
            _ => {}
        }

        if let Some(text) = MessageFormatter::format_event(&event) {
            print!("{}", text);
        }

        let flow = match event {
            SessionEvent::ExitedRoom | SessionEvent::PostDeleted => Flow::Quit,
            SessionEvent::ReceivedBanNotification => return Err(ClientError::Banned),
            _ => {
                self.prompt();
                Flow::Continue
            }
        };
        Ok(flow)
    }

    async fn print_unseen(
        &mut self,
        session: &ChatSession,
        as_history: bool,
    ) -> Result<(), ClientError> {
        let messages = session.messages().await?;
        let unseen: Vec<_> = messages
            .into_iter()
            .filter(|message| self.shown.insert(message.id))
            .collect();
        if unseen.is_empty() {
            return Ok(());
        }

        if as_history {
            print!(
                "{}",
                MessageFormatter::format_history_block(&unseen, &self.media_base_url)
            );
        } else {
            for message in &unseen {
                print!(
                    "{}",
                    MessageFormatter::format_chat_message(message, &self.media_base_url)
                );
            }
        }
        Ok(())
    }
}
