// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned gateway payloads shared by the pipeline test suites.

use serde_json::{json, Value};

/// Inbound text "oi" from Ana, the canonical end-to-end payload.
pub fn ana_text() -> Value {
    json!({
        "key": {"remoteJid": "551199999999@s.whatsapp.net", "id": "ABC1"},
        "pushName": "Ana",
        "message": {"conversation": "oi"}
    })
}

/// The same message wrapped in the gateway's `data` envelope.
pub fn ana_text_enveloped() -> Value {
    json!({
        "event": "messages.upsert",
        "instanceId": "outer-instance",
        "data": ana_text()
    })
}

/// Image without a caption, sent by the agent side.
pub fn outbound_image() -> Value {
    json!({
        "key": {
            "remoteJid": "5511888877777@s.whatsapp.net",
            "id": "IMG7",
            "fromMe": true
        },
        "pushName": "Support Desk",
        "instanceId": "inst-2",
        "status": "DELIVERY_ACK",
        "message": {"imageMessage": {"mimetype": "image/jpeg"}}
    })
}

/// Payload with neither a chat nor a sender address.
pub fn missing_identifiers() -> Value {
    json!({
        "pushName": "Ghost",
        "message": {"conversation": "boo"}
    })
}
