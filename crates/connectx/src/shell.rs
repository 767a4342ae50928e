// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `connectx chat` command implementation.
//!
//! An interactive terminal chat client. Readline runs on its own thread and
//! feeds typed lines and keystrokes into the async loop, which also listens
//! to session events, acknowledgement results and typing deadlines. Output
//! goes through rustyline's external printer so incoming messages do not
//! clobber the line being typed.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{
    Cmd, ConditionalEventHandler, DefaultEditor, Event, EventContext, EventHandler,
    ExternalPrinter, KeyCode, KeyEvent, RepeatCount,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use connectx_client::{
    ChatAction, ChatApi, ChatSession, ChatUIState, ConnectionState, SessionEvent,
    TypingIndicator, TypingNotifier, TypingSignal, WsConnector,
};
use connectx_config::ConnectxConfig;
use connectx_core::{Conversation, ConnectxError, EnrichedMessage, ServerEvent, UserId, UserSummary};

/// What the readline thread hands to the chat loop.
#[derive(Debug)]
enum Input {
    Line(String),
    Keystroke,
    Eof,
}

/// A parsed line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    List,
    Open(UserId),
    Close,
    Read(UserId),
    Status,
    Reconnect,
    Say(String),
    Usage(&'static str),
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Say(line.to_string());
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
    match (name, arg) {
        ("/quit" | "/exit", _) => Command::Quit,
        ("/help", _) => Command::Help,
        ("/list", _) => Command::List,
        ("/open", Some(user)) => Command::Open(user.into()),
        ("/open", None) => Command::Usage("/open <user>"),
        ("/close", _) => Command::Close,
        ("/read", Some(user)) => Command::Read(user.into()),
        ("/read", None) => Command::Usage("/read <user>"),
        ("/status", _) => Command::Status,
        ("/reconnect", _) => Command::Reconnect,
        (other, _) => Command::Unknown(other.to_string()),
    }
}

const HELP: &str = "\
/list              show conversations
/open <user>       open a conversation (marks it read)
/close             close the open conversation
/read <user>       mark messages from <user> as read
/status            connection and server status
/reconnect         reconnect after going offline
/quit              leave";

fn format_message(viewer: &UserId, message: &EnrichedMessage) -> String {
    let time = message.created_at.get(11..16).unwrap_or_default();
    let name = if &message.sender.id == viewer {
        "you".cyan().to_string()
    } else {
        message.sender.name.bold().to_string()
    };
    format!("{} {name}: {}", time.dimmed(), message.body)
}

fn format_conversation(conversation: &Conversation) -> String {
    let preview = conversation
        .last_message
        .as_ref()
        .map(|m| m.body.as_str())
        .unwrap_or("(no messages yet)");
    let unread = if conversation.unread_count > 0 {
        format!(" [{} unread]", conversation.unread_count).yellow().to_string()
    } else {
        String::new()
    };
    format!(
        "{} (@{}){unread}  {}",
        conversation.user.name.bold(),
        conversation.user.username,
        preview.dimmed()
    )
}

/// Forwards character keystrokes to the chat loop for typing notifications.
struct KeystrokeHandler {
    input: mpsc::UnboundedSender<Input>,
}

impl ConditionalEventHandler for KeystrokeHandler {
    fn handle(&self, evt: &Event, _: RepeatCount, _: bool, _: &EventContext) -> Option<Cmd> {
        if let Some(KeyEvent(KeyCode::Char(_), _)) = evt.get(0) {
            let _ = self.input.send(Input::Keystroke);
        }
        None
    }
}

/// Terminal output that cooperates with the active prompt when possible.
struct Output {
    printer: Option<Box<dyn ExternalPrinter + Send>>,
}

impl Output {
    fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.printer.as_mut() {
            Some(printer) => {
                if let Err(e) = printer.print(text.clone()) {
                    tracing::debug!(error = %e, "external printer failed");
                    println!("{text}");
                }
            }
            None => println!("{text}"),
        }
    }

    fn error(&mut self, err: &ConnectxError) {
        self.line(format!("{}: {err}", "error".red()));
    }
}

/// Run readline on a dedicated thread. Returns the printer for its prompt.
fn spawn_readline(
    prompt: String,
    input: mpsc::UnboundedSender<Input>,
) -> Result<Output, ConnectxError> {
    let (printer_tx, printer_rx) = std::sync::mpsc::channel();
    std::thread::Builder::new()
        .name("connectx-readline".into())
        .spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    let _ = printer_tx.send(Err(ConnectxError::Internal(format!(
                        "failed to initialize readline: {e}"
                    ))));
                    return;
                }
            };
            rl.bind_sequence(
                Event::Any,
                EventHandler::Conditional(Box::new(KeystrokeHandler {
                    input: input.clone(),
                })),
            );
            let printer: Option<Box<dyn ExternalPrinter + Send>> = rl
                .create_external_printer()
                .ok()
                .map(|p| Box::new(p) as Box<dyn ExternalPrinter + Send>);
            let _ = printer_tx.send(Ok(printer));

            loop {
                match rl.readline(&prompt) {
                    Ok(line) => {
                        let quitting = matches!(parse_command(&line), Command::Quit);
                        if !line.trim().is_empty() {
                            let _ = rl.add_history_entry(line.as_str());
                        }
                        if input.send(Input::Line(line)).is_err() || quitting {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        let _ = input.send(Input::Eof);
                        break;
                    }
                    Err(e) => {
                        eprintln!("{}: {e}", "error".red());
                        let _ = input.send(Input::Eof);
                        break;
                    }
                }
            }
        })
        .map_err(|e| ConnectxError::Internal(format!("failed to spawn readline thread: {e}")))?;

    let printer = printer_rx
        .recv()
        .map_err(|_| ConnectxError::Internal("readline thread exited early".into()))??;
    Ok(Output { printer })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

type AckResult = (u64, Result<EnrichedMessage, ConnectxError>);

/// Everything the chat loop owns.
struct Chat {
    session: ChatSession,
    api: ChatApi,
    ui: ChatUIState,
    notifier: TypingNotifier,
    indicator: TypingIndicator,
    /// Peer the outbound `typing` went to, so `stop typing` follows it.
    typing_to: Option<UserId>,
    ack_timeout: Duration,
    acks: mpsc::UnboundedSender<AckResult>,
    out: Output,
}

impl Chat {
    fn open_peer(&self) -> Option<UserId> {
        self.ui.current_chat.as_ref().map(|c| c.peer.id.clone())
    }

    fn peer_name(&self, id: &UserId) -> String {
        self.ui
            .conversation(id)
            .map(|c| c.user.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    async fn stop_typing(&mut self) {
        if let Some(peer) = self.typing_to.take() {
            let _ = self.session.send_stop_typing(&peer).await;
        }
    }

    async fn on_keystroke(&mut self) {
        let Some(peer) = self.open_peer() else { return };
        if self.notifier.keystroke(Instant::now()) == Some(TypingSignal::Start)
            && self.session.send_typing(&peer).await.is_ok()
        {
            self.typing_to = Some(peer);
        }
    }

    async fn on_deadline(&mut self) {
        let now = Instant::now();
        if self.notifier.tick(now) == Some(TypingSignal::Stop) {
            self.stop_typing().await;
        }
        for sender in self.indicator.tick(now) {
            self.ui.apply(ChatAction::TypingChanged {
                sender,
                typing: false,
            });
        }
    }

    async fn refresh_conversations(&mut self, print: bool) {
        match self.api.conversations().await {
            Ok(list) => {
                if print {
                    if list.is_empty() {
                        self.out.line("no conversations yet".dimmed().to_string());
                    }
                    for conversation in &list {
                        self.out.line(format_conversation(conversation));
                    }
                }
                self.ui.apply(ChatAction::ConversationsLoaded(list));
            }
            Err(e) => self.out.error(&e),
        }
    }

    async fn open(&mut self, peer: UserId) {
        self.stop_typing().await;
        self.notifier.message_sent();
        let history = match self.api.history(&peer).await {
            Ok(history) => history,
            Err(e) => {
                self.out.error(&e);
                return;
            }
        };
        let summary = self
            .ui
            .conversation(&peer)
            .map(|c| c.user.clone())
            .or_else(|| {
                history.first().map(|m| {
                    if m.sender.id == peer {
                        m.sender.clone()
                    } else {
                        m.receiver.clone()
                    }
                })
            })
            .unwrap_or_else(|| UserSummary::placeholder(peer.clone()));

        self.out
            .line(format!("--- {} (@{}) ---", summary.name, summary.username).bold().to_string());
        for message in &history {
            self.out.line(format_message(&self.ui.viewer, message));
        }
        self.ui.apply(ChatAction::ChatOpened {
            peer: summary,
            history,
        });
    }

    async fn say(&mut self, body: String) {
        let Some(peer) = self.open_peer() else {
            self.out.line(
                "open a conversation first with /open <user>"
                    .yellow()
                    .to_string(),
            );
            return;
        };
        if self.notifier.message_sent() == Some(TypingSignal::Stop) {
            self.stop_typing().await;
        }

        let local_id = self.ui.begin_send(&peer, &body);
        match self.session.send_message(&peer, body).await {
            Ok(pending) => {
                let acks = self.acks.clone();
                let timeout = self.ack_timeout;
                tokio::spawn(async move {
                    let _ = acks.send((local_id, pending.confirm(timeout).await));
                });
            }
            Err(e) => {
                self.out.line(format!("{} {e}", "not sent:".red()));
                self.ui.apply(ChatAction::SendFailed {
                    local_id,
                    error: e.to_string(),
                });
            }
        }
    }

    fn on_ack(&mut self, (local_id, result): AckResult) {
        match result {
            Ok(message) => self.ui.apply(ChatAction::SendConfirmed { local_id, message }),
            Err(e) => {
                self.out
                    .line(format!("{} {e}", "message not confirmed:".yellow()));
                self.ui.apply(ChatAction::SendFailed {
                    local_id,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                self.ui
                    .apply(ChatAction::ConnectionChanged(ConnectionState::Connected));
                self.out.line("connected".green().to_string());
            }
            SessionEvent::Disconnected { reason } => {
                self.indicator.on_disconnect();
                self.typing_to = None;
                self.ui
                    .apply(ChatAction::ConnectionChanged(ConnectionState::Disconnected));
                self.out
                    .line(format!("connection lost ({reason}), reconnecting").yellow().to_string());
            }
            SessionEvent::Offline => {
                self.indicator.on_disconnect();
                self.ui
                    .apply(ChatAction::ConnectionChanged(ConnectionState::Offline));
                self.out.line(
                    "offline: could not reach the server. Type /reconnect to try again."
                        .red()
                        .bold()
                        .to_string(),
                );
            }
            SessionEvent::Server(ServerEvent::PrivateMessage(message)) => {
                let sender = message.sender.id.clone();
                self.indicator.on_stop(&sender);
                let open = self.open_peer().as_ref() == Some(&sender);
                let mark = self.ui.should_mark_read(&message);
                let line = format_message(&self.ui.viewer, &message);
                self.ui.apply(ChatAction::MessageReceived(message));
                if open {
                    self.out.line(line);
                    if mark {
                        match self.api.mark_read(&sender).await {
                            Ok(_) => self.ui.apply(ChatAction::MarkedRead { sender }),
                            Err(e) => self.out.error(&e),
                        }
                    }
                } else {
                    let unread = self
                        .ui
                        .conversation(&sender)
                        .map(|c| c.unread_count)
                        .unwrap_or(1);
                    self.out.line(
                        format!("new message from {} ({unread} unread)", self.peer_name(&sender))
                            .cyan()
                            .to_string(),
                    );
                }
            }
            SessionEvent::Server(ServerEvent::Typing(notice)) => {
                let already = self.indicator.is_typing(&notice.sender, Instant::now());
                self.indicator.on_typing(notice.sender.clone(), Instant::now());
                let open = self.open_peer().as_ref() == Some(&notice.sender);
                if open && !already {
                    self.out.line(
                        format!("{} is typing...", self.peer_name(&notice.sender))
                            .dimmed()
                            .to_string(),
                    );
                }
                self.ui.apply(ChatAction::TypingChanged {
                    sender: notice.sender,
                    typing: true,
                });
            }
            SessionEvent::Server(ServerEvent::StopTyping(notice)) => {
                self.indicator.on_stop(&notice.sender);
                self.ui.apply(ChatAction::TypingChanged {
                    sender: notice.sender,
                    typing: false,
                });
            }
            // Acks and errors resolve the matching PendingSend.
            SessionEvent::Server(ServerEvent::MessageSent(_) | ServerEvent::Error(_)) => {}
        }
    }

    /// Handle one typed line. Returns false when the user quits.
    async fn on_line(&mut self, line: String) -> bool {
        match parse_command(&line) {
            Command::Quit => return false,
            Command::Help => self.out.line(HELP),
            Command::List => self.refresh_conversations(true).await,
            Command::Open(peer) => self.open(peer).await,
            Command::Close => {
                self.stop_typing().await;
                self.notifier.message_sent();
                self.ui.apply(ChatAction::ChatClosed);
            }
            Command::Read(sender) => match self.api.mark_read(&sender).await {
                Ok(count) => {
                    self.ui.apply(ChatAction::MarkedRead { sender });
                    self.out.line(format!("{count} message(s) marked as read"));
                }
                Err(e) => self.out.error(&e),
            },
            Command::Status => {
                let server = match self.api.status().await {
                    Ok(status) => status,
                    Err(e) => format!("unreachable ({e})"),
                };
                self.out.line(format!(
                    "connection: {}  server: {server}  unread: {}",
                    self.session.state(),
                    self.ui.total_unread()
                ));
            }
            Command::Reconnect => {
                if self.session.state() == ConnectionState::Offline {
                    self.session.reconnect();
                    self.out.line("reconnecting...".dimmed().to_string());
                } else {
                    self.out.line(format!("already {}", self.session.state()));
                }
            }
            Command::Say(body) if body.is_empty() => {}
            Command::Say(body) => self.say(body).await,
            Command::Usage(usage) => self.out.line(format!("usage: {usage}")),
            Command::Unknown(name) => self
                .out
                .line(format!("unknown command {name}, try /help").yellow().to_string()),
        }
        true
    }
}

/// Runs the `connectx chat` interactive client.
pub async fn run_chat(
    config: ConnectxConfig,
    user: UserId,
    token: String,
) -> Result<(), ConnectxError> {
    let client = &config.client;
    let api = ChatApi::new(&client.api_url, token.clone())?;
    let connector = Arc::new(WsConnector::new(client.server_url.clone()));
    let session = ChatSession::new(user.clone(), token, connector, client.clone());
    let mut events = session.subscribe();

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let prompt = format!("{}> ", user.as_str().green());
    let out = spawn_readline(prompt, input_tx)?;

    let (acks, mut ack_rx) = mpsc::unbounded_channel();
    let quiet = Duration::from_millis(client.typing_quiet_ms);
    let mut chat = Chat {
        session,
        api,
        ui: ChatUIState::new(user.clone()),
        notifier: TypingNotifier::new(quiet),
        indicator: TypingIndicator::new(quiet),
        typing_to: None,
        ack_timeout: Duration::from_millis(client.ack_timeout_ms),
        acks,
        out,
    };

    chat.out
        .line(format!("{} as {}", "connectx chat".bold().green(), user.as_str().bold()));
    chat.out
        .line(format!("Type {} for commands, {} to exit.", "/help".yellow(), "/quit".yellow()));
    chat.session.start();
    chat.refresh_conversations(true).await;

    loop {
        let deadline = earliest(chat.notifier.deadline(), chat.indicator.next_deadline());
        tokio::select! {
            input = input_rx.recv() => match input {
                Some(Input::Line(line)) => {
                    if !chat.on_line(line).await {
                        break;
                    }
                }
                Some(Input::Keystroke) => chat.on_keystroke().await,
                Some(Input::Eof) | None => break,
            },
            event = events.recv() => match event {
                Ok(event) => chat.on_session_event(event).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "chat display fell behind session events");
                    chat.refresh_conversations(false).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(ack) = ack_rx.recv() => chat.on_ack(ack),
            _ = sleep_until(deadline) => chat.on_deadline().await,
        }
    }

    chat.stop_typing().await;
    chat.session.shutdown().await;
    println!("{}", "bye".dimmed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectx_core::{ChatMessage, UserSummary};

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_command("  hello there "), Command::Say("hello there".into()));
    }

    #[test]
    fn commands_parse_with_arguments() {
        assert_eq!(parse_command("/open bob"), Command::Open("bob".into()));
        assert_eq!(parse_command("/read   carol "), Command::Read("carol".into()));
        assert_eq!(parse_command("/open"), Command::Usage("/open <user>"));
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/reconnect"), Command::Reconnect);
        assert_eq!(parse_command("/dance"), Command::Unknown("/dance".into()));
    }

    #[test]
    fn earliest_picks_the_sooner_deadline() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest(Some(later), Some(now)), Some(now));
        assert_eq!(earliest(None, Some(later)), Some(later));
        assert_eq!(earliest(None, None), None);
    }

    #[test]
    fn own_messages_render_as_you() {
        colored::control::set_override(false);
        let mut message = ChatMessage::new("alice".into(), "bob".into(), "hi");
        message.created_at = "2026-03-01T09:41:00.000Z".into();
        let enriched = EnrichedMessage::new(
            message,
            UserSummary::placeholder("alice".into()),
            UserSummary::placeholder("bob".into()),
        );
        assert_eq!(format_message(&"alice".into(), &enriched), "09:41 you: hi");
        assert_eq!(format_message(&"bob".into(), &enriched), "09:41 alice: hi");
    }

    #[test]
    fn conversation_line_shows_unread() {
        colored::control::set_override(false);
        let conversation = Conversation {
            user: UserSummary {
                id: "bob".into(),
                name: "Bob".into(),
                username: "bob".into(),
                profile_picture: None,
            },
            last_message: None,
            unread_count: 2,
        };
        let line = format_conversation(&conversation);
        assert!(line.contains("Bob (@bob) [2 unread]"));
        assert!(line.contains("(no messages yet)"));
    }
}
