// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side chat view state.
//!
//! [`ChatUIState`] is a plain reducer: every change arrives as a
//! [`ChatAction`] applied with [`ChatUIState::apply`], so the shell (or any
//! other front end) renders from one value and tests drive it without a
//! network.

use connectx_core::{ChatMessage, Conversation, EnrichedMessage, MessageId, UserId, UserSummary};

use crate::session::ConnectionState;

/// Delivery status of a message shown in the open conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Sent by this client, no acknowledgement yet.
    Pending,
    /// Acknowledged by the server, or received from the server.
    Confirmed,
    /// The send failed, timed out, or the link dropped first. Kept visible.
    Unconfirmed,
}

/// One line of the open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    /// Server id, known once the message is acknowledged or received.
    pub id: Option<MessageId>,
    /// Local handle of a message sent from this client.
    pub local_id: Option<u64>,
    pub sender: UserId,
    pub receiver: UserId,
    pub body: String,
    pub read: bool,
    pub created_at: Option<String>,
    pub status: DeliveryStatus,
}

impl ChatEntry {
    fn from_server(message: &EnrichedMessage) -> Self {
        Self {
            id: Some(message.id.clone()),
            local_id: None,
            sender: message.sender.id.clone(),
            receiver: message.receiver.id.clone(),
            body: message.body.clone(),
            read: message.read,
            created_at: Some(message.created_at.clone()),
            status: DeliveryStatus::Confirmed,
        }
    }
}

/// The conversation currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentChat {
    pub peer: UserSummary,
    pub messages: Vec<ChatEntry>,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    ConversationsLoaded(Vec<Conversation>),
    /// A conversation was opened and its history fetched.
    ChatOpened {
        peer: UserSummary,
        history: Vec<EnrichedMessage>,
    },
    ChatClosed,
    /// A local send was handed to the session. Use [`ChatUIState::begin_send`]
    /// to allocate `local_id`.
    MessageQueued {
        local_id: u64,
        receiver: UserId,
        body: String,
    },
    SendConfirmed {
        local_id: u64,
        message: EnrichedMessage,
    },
    SendFailed {
        local_id: u64,
        error: String,
    },
    /// A live `private message` arrived.
    MessageReceived(EnrichedMessage),
    /// Messages from `sender` were marked read on the server.
    MarkedRead { sender: UserId },
    TypingChanged { sender: UserId, typing: bool },
    ConnectionChanged(ConnectionState),
    ErrorRaised(String),
    ErrorCleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatUIState {
    pub viewer: UserId,
    pub conversations: Vec<Conversation>,
    pub current_chat: Option<CurrentChat>,
    pub connection: ConnectionState,
    pub error: Option<String>,
    next_local_id: u64,
}

impl ChatUIState {
    pub fn new(viewer: UserId) -> Self {
        Self {
            viewer,
            conversations: Vec::new(),
            current_chat: None,
            connection: ConnectionState::Disconnected,
            error: None,
            next_local_id: 1,
        }
    }

    /// Allocate a local id for a new send and record it as pending.
    pub fn begin_send(&mut self, receiver: &UserId, body: &str) -> u64 {
        let local_id = self.next_local_id;
        self.next_local_id += 1;
        self.apply(ChatAction::MessageQueued {
            local_id,
            receiver: receiver.clone(),
            body: body.to_string(),
        });
        local_id
    }

    pub fn conversation(&self, peer: &UserId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.user.id == peer)
    }

    pub fn total_unread(&self) -> u64 {
        self.conversations.iter().map(|c| c.unread_count).sum()
    }

    /// Whether a live `message` lands in the open chat unread, so the
    /// server-side flag should be cleared as well.
    pub fn should_mark_read(&self, message: &EnrichedMessage) -> bool {
        message.receiver.id == self.viewer && !message.read && self.is_open(&message.sender.id)
    }

    fn is_open(&self, peer: &UserId) -> bool {
        self.current_chat
            .as_ref()
            .is_some_and(|chat| &chat.peer.id == peer)
    }

    fn entry_mut(&mut self, local_id: u64) -> Option<&mut ChatEntry> {
        self.current_chat
            .as_mut()?
            .messages
            .iter_mut()
            .find(|entry| entry.local_id == Some(local_id))
    }

    pub fn apply(&mut self, action: ChatAction) {
        match action {
            ChatAction::ConversationsLoaded(conversations) => {
                self.conversations = conversations;
            }
            ChatAction::ChatOpened { peer, history } => {
                if let Some(conv) = self.conversations.iter_mut().find(|c| c.user.id == peer.id) {
                    conv.unread_count = 0;
                }
                self.current_chat = Some(CurrentChat {
                    peer,
                    messages: history.iter().map(ChatEntry::from_server).collect(),
                    is_typing: false,
                });
            }
            ChatAction::ChatClosed => self.current_chat = None,
            ChatAction::MessageQueued {
                local_id,
                receiver,
                body,
            } => {
                let sender = self.viewer.clone();
                if let Some(chat) = self.current_chat.as_mut()
                    && chat.peer.id == receiver
                {
                    chat.messages.push(ChatEntry {
                        id: None,
                        local_id: Some(local_id),
                        sender,
                        receiver,
                        body,
                        read: false,
                        created_at: None,
                        status: DeliveryStatus::Pending,
                    });
                }
            }
            ChatAction::SendConfirmed { local_id, message } => {
                if let Some(entry) = self.entry_mut(local_id) {
                    entry.id = Some(message.id.clone());
                    entry.created_at = Some(message.created_at.clone());
                    entry.status = DeliveryStatus::Confirmed;
                }
                self.touch_conversation(&message.receiver, message.to_chat_message(), false);
            }
            ChatAction::SendFailed { local_id, error } => {
                if let Some(entry) = self.entry_mut(local_id) {
                    entry.status = DeliveryStatus::Unconfirmed;
                }
                self.error = Some(error);
            }
            ChatAction::MessageReceived(message) => {
                let peer = message.to_chat_message().peer_of(&self.viewer).clone();
                let peer_summary = if message.sender.id == peer {
                    message.sender.clone()
                } else {
                    message.receiver.clone()
                };
                let open = self.is_open(&peer);
                if let Some(chat) = self.current_chat.as_mut()
                    && open
                {
                    if chat.messages.iter().any(|e| e.id.as_ref() == Some(&message.id)) {
                        return;
                    }
                    chat.messages.push(ChatEntry::from_server(&message));
                    if message.sender.id == peer {
                        chat.is_typing = false;
                    }
                }
                let unread = !open && message.sender.id == peer && !message.read;
                self.touch_conversation(&peer_summary, message.to_chat_message(), unread);
            }
            ChatAction::MarkedRead { sender } => {
                if let Some(conv) = self.conversations.iter_mut().find(|c| c.user.id == sender) {
                    conv.unread_count = 0;
                }
                if let Some(chat) = self.current_chat.as_mut()
                    && chat.peer.id == sender
                {
                    for entry in chat.messages.iter_mut().filter(|e| e.sender == sender) {
                        entry.read = true;
                    }
                }
            }
            ChatAction::TypingChanged { sender, typing } => {
                if let Some(chat) = self.current_chat.as_mut()
                    && chat.peer.id == sender
                {
                    chat.is_typing = typing;
                }
            }
            ChatAction::ConnectionChanged(state) => {
                self.connection = state;
                if state != ConnectionState::Connected
                    && let Some(chat) = self.current_chat.as_mut()
                {
                    chat.is_typing = false;
                    for entry in chat
                        .messages
                        .iter_mut()
                        .filter(|e| e.status == DeliveryStatus::Pending)
                    {
                        entry.status = DeliveryStatus::Unconfirmed;
                    }
                }
            }
            ChatAction::ErrorRaised(error) => self.error = Some(error),
            ChatAction::ErrorCleared => self.error = None,
        }
    }

    /// Record `last` as the newest message with `peer` and move that
    /// conversation to the top.
    fn touch_conversation(&mut self, peer: &UserSummary, last: ChatMessage, unread: bool) {
        let mut conv = match self.conversations.iter().position(|c| c.user.id == peer.id) {
            Some(index) => self.conversations.remove(index),
            None => Conversation {
                user: peer.clone(),
                last_message: None,
                unread_count: 0,
            },
        };
        conv.last_message = Some(last);
        if unread {
            conv.unread_count += 1;
        }
        self.conversations.insert(0, conv);
    }
}
