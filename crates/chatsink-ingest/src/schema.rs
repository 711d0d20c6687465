// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table and column names of the relational store.

pub const ID: &str = "id";

pub mod users {
    pub const TABLE: &str = "users";
    pub const NAME: &str = "name";
    /// Natural key: canonical sender address. Unique.
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
}

pub mod conversations {
    pub const TABLE: &str = "conversations";
    pub const TITLE: &str = "title";
    pub const TYPE: &str = "type";
    /// Natural key: gateway chat id. Unique.
    pub const WHATSAPP_CHAT_ID: &str = "whatsapp_chat_id";
    pub const EVOLUTION_INSTANCE_ID: &str = "evolution_instance_id";
    pub const CREATED_BY: &str = "created_by";

    /// Every conversation opened by the pipeline is a support thread.
    pub const SUPPORT_TYPE: &str = "support";
}

pub mod participants {
    pub const TABLE: &str = "conversation_participants";
    pub const CONVERSATION_ID: &str = "conversation_id";
    pub const USER_ID: &str = "user_id";
    pub const ROLE: &str = "role";
}

pub mod messages {
    pub const TABLE: &str = "messages";
    pub const CONTENT: &str = "content";
    pub const MSG_TYPE: &str = "msg_type";
    pub const MSG_STATUS: &str = "msg_status";
    pub const WHATSAPP_MESSAGE_ID: &str = "whatsapp_message_id";
    pub const EVOLUTION_MESSAGE_ID: &str = "evolution_message_id";
    pub const CONVERSATION_ID: &str = "conversation_id";
    pub const SENDER_ID: &str = "sender_id";
    pub const METADATA: &str = "metadata";
}
