// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload normalization.
//!
//! Turns a heterogeneous gateway event into exactly one [`NormalizedMessage`]
//! or a [`NormalizationError`]. Pure apart from the WARN emitted for an
//! unrecognized delivery status.

use chatsink_core::types::{DeliveryStatus, MessageType, NormalizedMessage, RawEvent};
use chatsink_core::NormalizationError;
use serde_json::Value;
use tracing::warn;

/// Suffix the gateway appends to device-qualified addresses.
pub const ADDRESS_SUFFIX: &str = "@s.whatsapp.net";

/// Display name used when the event carries none.
pub const UNKNOWN_SENDER: &str = "unknown";

/// Instance id used when neither the event nor its envelope carries one.
pub const DEFAULT_INSTANCE: &str = "default";

/// Content used when no text, caption, or description can be derived.
pub const MEDIA_PLACEHOLDER: &str = "[Media]";

/// Gateway delivery status strings and the lifecycle value each maps to.
pub const STATUS_TABLE: &[(&str, DeliveryStatus)] = &[
    ("SERVER_ACK", DeliveryStatus::Sent),
    ("SENT", DeliveryStatus::Sent),
    ("DELIVERY_ACK", DeliveryStatus::Delivered),
    ("delivered", DeliveryStatus::Delivered),
    ("READ_ACK", DeliveryStatus::Read),
    ("read", DeliveryStatus::Read),
    ("ERROR", DeliveryStatus::Failed),
    ("failed", DeliveryStatus::Failed),
    ("PENDING", DeliveryStatus::Sending),
];

/// Normalize one raw gateway event.
pub fn normalize(raw: &RawEvent) -> Result<NormalizedMessage, NormalizationError> {
    let event = unwrap_envelope(raw);

    let chat_id = first_string(&[
        path(event, &["key", "remoteJid"]),
        event.get("from"),
        event.get("to"),
    ]);
    let sender_address = first_string(&[
        path(event, &["key", "remoteJid"]),
        event.get("from"),
        event.get("sender"),
    ]);

    let (Some(chat_id), Some(sender_address)) = (chat_id, sender_address) else {
        return Err(NormalizationError::MissingIdentifiers {
            has_chat_id: chat_id.is_some(),
            has_sender: sender_address.is_some(),
        });
    };

    let sender_display_name = first_string(&[event.get("pushName"), event.get("notifyName")])
        .unwrap_or(UNKNOWN_SENDER);
    let is_outbound = path(event, &["key", "fromMe"])
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let instance_id = first_string(&[event.get("instanceId"), raw.get("instanceId")])
        .unwrap_or(DEFAULT_INSTANCE);
    let external_message_id = first_id(&[path(event, &["key", "id"]), event.get("id")]);

    Ok(NormalizedMessage {
        chat_id: chat_id.to_string(),
        sender_address: sender_address.to_string(),
        sender_canonical: canonical_address(sender_address).to_string(),
        sender_display_name: sender_display_name.to_string(),
        is_outbound,
        instance_id: instance_id.to_string(),
        message_type: classify_message_type(event),
        content: extract_content(event),
        external_message_id,
        delivery_status: map_status(event.get("status")),
    })
}

/// The message object itself: the `data` envelope when present, else the event.
pub fn unwrap_envelope(raw: &RawEvent) -> &RawEvent {
    raw.get("data").and_then(Value::as_object).unwrap_or(raw)
}

/// Strip the gateway suffix, leaving the lookup key.
pub fn canonical_address(address: &str) -> &str {
    address.strip_suffix(ADDRESS_SUFFIX).unwrap_or(address)
}

/// First sub-object presence check wins.
pub fn classify_message_type(event: &RawEvent) -> MessageType {
    let message = event.get("message").and_then(Value::as_object);
    let has = |field: &str| message.is_some_and(|m| present(m.get(field)));

    if has("imageMessage") {
        MessageType::Image
    } else if has("videoMessage") {
        MessageType::Video
    } else if has("audioMessage") || has("pttMessage") {
        MessageType::Audio
    } else if has("documentMessage") {
        MessageType::File
    } else if has("locationMessage") {
        MessageType::Location
    } else if has("contactMessage") {
        MessageType::Contact
    } else if event.get("messageType").and_then(Value::as_str) == Some("system") {
        MessageType::System
    } else {
        MessageType::Text
    }
}

/// Text, caption, synthesized description, or the media placeholder.
///
/// Message sub-fields are looked up under `message`, or on the event itself
/// when it has no `message` object.
pub fn extract_content(event: &RawEvent) -> String {
    let message = event
        .get("message")
        .and_then(Value::as_object)
        .unwrap_or(event);

    let text = first_string(&[
        message.get("conversation"),
        path(message, &["extendedTextMessage", "text"]),
        event.get("text"),
        event.get("body"),
        path(message, &["imageMessage", "caption"]),
        path(message, &["videoMessage", "caption"]),
        path(message, &["documentMessage", "caption"]),
    ]);
    if let Some(text) = text {
        return text.to_string();
    }

    if let Some(location) = message.get("locationMessage").filter(|v| present(Some(*v))) {
        return format!(
            "Location: {}, {}",
            scalar(location.get("degreesLatitude")),
            scalar(location.get("degreesLongitude"))
        );
    }

    if let Some(contact) = message.get("contactMessage").filter(|v| present(Some(*v))) {
        let who = first_string(&[contact.get("displayName"), contact.get("vcard")])
            .unwrap_or(UNKNOWN_SENDER);
        return format!("Contact: {who}");
    }

    MEDIA_PLACEHOLDER.to_string()
}

/// Map a gateway status onto the delivery lifecycle.
///
/// Absent or null is `sent` silently. Any other unrecognized value is also
/// `sent`, but logged as a classification gap.
pub fn map_status(status: Option<&Value>) -> DeliveryStatus {
    let status = match status {
        None | Some(Value::Null) => return DeliveryStatus::Sent,
        Some(status) => status,
    };

    let known = status.as_str().and_then(|s| {
        STATUS_TABLE
            .iter()
            .find(|(raw, _)| *raw == s)
            .map(|(_, mapped)| *mapped)
    });

    known.unwrap_or_else(|| {
        warn!(status = %status, "unrecognized delivery status, classification gap; using sent");
        DeliveryStatus::Sent
    })
}

fn path<'a>(object: &'a RawEvent, keys: &[&str]) -> Option<&'a Value> {
    let (last, parents) = keys.split_last()?;
    let mut current = object;
    for key in parents {
        current = current.get(*key)?.as_object()?;
    }
    current.get(*last)
}

/// Truthiness of a sub-object: present and not null/false.
fn present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null) | Some(Value::Bool(false)))
}

/// First candidate that is a non-empty string.
fn first_string<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|candidate| candidate.and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// First candidate that is a non-empty string or a number.
fn first_id(candidates: &[Option<&Value>]) -> Option<String> {
    candidates.iter().find_map(|candidate| match candidate {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNKNOWN_SENDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tracing_test::traced_test;

    fn raw(value: Value) -> RawEvent {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn ana_text_message() {
        let msg = normalize(&raw(json!({
            "key": {"remoteJid": "551199999999@s.whatsapp.net", "id": "ABC1"},
            "pushName": "Ana",
            "message": {"conversation": "oi"}
        })))
        .unwrap();

        assert_eq!(msg.chat_id, "551199999999@s.whatsapp.net");
        assert_eq!(msg.sender_address, "551199999999@s.whatsapp.net");
        assert_eq!(msg.sender_canonical, "551199999999");
        assert_eq!(msg.sender_display_name, "Ana");
        assert!(!msg.is_outbound);
        assert_eq!(msg.instance_id, DEFAULT_INSTANCE);
        assert_eq!(msg.message_type, MessageType::Text);
        assert_eq!(msg.content, "oi");
        assert_eq!(msg.external_message_id.as_deref(), Some("ABC1"));
        assert_eq!(msg.delivery_status, DeliveryStatus::Sent);
    }

    #[test]
    fn envelope_is_unwrapped_and_outer_instance_used() {
        let msg = normalize(&raw(json!({
            "event": "messages.upsert",
            "instanceId": "outer",
            "data": {
                "key": {"remoteJid": "1@s.whatsapp.net", "fromMe": true},
                "message": {"extendedTextMessage": {"text": "hello"}}
            }
        })))
        .unwrap();
        assert_eq!(msg.chat_id, "1@s.whatsapp.net");
        assert_eq!(msg.instance_id, "outer");
        assert!(msg.is_outbound);
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.sender_display_name, UNKNOWN_SENDER);
    }

    #[test]
    fn inner_instance_beats_envelope() {
        let msg = normalize(&raw(json!({
            "instanceId": "outer",
            "data": {"from": "a", "instanceId": "inner"}
        })))
        .unwrap();
        assert_eq!(msg.instance_id, "inner");
    }

    #[test]
    fn chat_id_prefers_remote_jid_over_from() {
        let msg = normalize(&raw(json!({
            "key": {"remoteJid": "jid@s.whatsapp.net"},
            "from": "from-address",
            "to": "to-address"
        })))
        .unwrap();
        assert_eq!(msg.chat_id, "jid@s.whatsapp.net");
    }

    #[test]
    fn fallback_fields_fill_in_identifiers() {
        let msg = normalize(&raw(json!({
            "to": "chat-9",
            "sender": "5511777@s.whatsapp.net",
            "notifyName": "Bia",
            "id": 42,
            "body": "from body"
        })))
        .unwrap();
        assert_eq!(msg.chat_id, "chat-9");
        assert_eq!(msg.sender_address, "5511777@s.whatsapp.net");
        assert_eq!(msg.sender_canonical, "5511777");
        assert_eq!(msg.sender_display_name, "Bia");
        assert_eq!(msg.external_message_id.as_deref(), Some("42"));
        assert_eq!(msg.content, "from body");
    }

    #[test]
    fn empty_strings_do_not_count_as_present() {
        let msg = normalize(&raw(json!({
            "key": {"remoteJid": ""},
            "from": "fallback",
            "pushName": "",
            "notifyName": "Caio"
        })))
        .unwrap();
        assert_eq!(msg.chat_id, "fallback");
        assert_eq!(msg.sender_display_name, "Caio");
    }

    #[test]
    fn missing_identifiers_is_the_only_failure() {
        let err = normalize(&raw(json!({"pushName": "Ghost"}))).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::MissingIdentifiers {
                has_chat_id: false,
                has_sender: false
            }
        );
        assert_eq!(err.reason(), "missing_identifiers");

        let err = normalize(&raw(json!({"to": "chat-only"}))).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::MissingIdentifiers {
                has_chat_id: true,
                has_sender: false
            }
        );
    }

    #[test]
    fn image_without_caption_is_media_placeholder() {
        let msg = normalize(&raw(json!({
            "key": {"remoteJid": "1@s.whatsapp.net"},
            "message": {"imageMessage": {"mimetype": "image/jpeg"}}
        })))
        .unwrap();
        assert_eq!(msg.message_type, MessageType::Image);
        assert_eq!(msg.content, MEDIA_PLACEHOLDER);
    }

    #[test]
    fn captions_become_content() {
        for (field, kind) in [
            ("imageMessage", MessageType::Image),
            ("videoMessage", MessageType::Video),
            ("documentMessage", MessageType::File),
        ] {
            let msg = normalize(&raw(json!({
                "from": "x",
                "message": {field: {"caption": "look"}}
            })))
            .unwrap();
            assert_eq!(msg.message_type, kind, "{field}");
            assert_eq!(msg.content, "look", "{field}");
        }
    }

    #[test]
    fn message_type_checks_run_in_order() {
        let cases = [
            (json!({"imageMessage": {}, "videoMessage": {}}), MessageType::Image),
            (json!({"videoMessage": {}, "audioMessage": {}}), MessageType::Video),
            (json!({"pttMessage": {}}), MessageType::Audio),
            (json!({"audioMessage": {}, "documentMessage": {}}), MessageType::Audio),
            (json!({"documentMessage": {}, "locationMessage": {}}), MessageType::File),
            (json!({"locationMessage": {}, "contactMessage": {}}), MessageType::Location),
            (json!({"contactMessage": {}}), MessageType::Contact),
            (json!({"conversation": "plain"}), MessageType::Text),
        ];
        for (message, expected) in cases {
            let event = raw(json!({"from": "x", "message": message}));
            assert_eq!(classify_message_type(&event), expected, "{event:?}");
        }

        let system = raw(json!({"from": "x", "messageType": "system"}));
        assert_eq!(classify_message_type(&system), MessageType::System);
    }

    #[test]
    fn location_and_contact_are_described() {
        let loc = raw(json!({
            "message": {"locationMessage": {"degreesLatitude": -23.55, "degreesLongitude": -46.63}}
        }));
        assert_eq!(extract_content(&loc), "Location: -23.55, -46.63");

        let contact = raw(json!({"message": {"contactMessage": {"displayName": "Dr. Lee"}}}));
        assert_eq!(extract_content(&contact), "Contact: Dr. Lee");

        let vcard = raw(json!({"message": {"contactMessage": {"vcard": "BEGIN:VCARD"}}}));
        assert_eq!(extract_content(&vcard), "Contact: BEGIN:VCARD");
    }

    #[test]
    fn event_without_message_object_is_searched_directly() {
        let event = raw(json!({"from": "x", "conversation": "top-level text"}));
        assert_eq!(extract_content(&event), "top-level text");
    }

    #[test]
    fn text_beats_caption() {
        let event = raw(json!({
            "text": "typed",
            "message": {"imageMessage": {"caption": "caption"}}
        }));
        assert_eq!(extract_content(&event), "typed");
    }

    #[test]
    fn status_table_is_complete() {
        let expected = [
            ("SERVER_ACK", DeliveryStatus::Sent),
            ("SENT", DeliveryStatus::Sent),
            ("DELIVERY_ACK", DeliveryStatus::Delivered),
            ("delivered", DeliveryStatus::Delivered),
            ("READ_ACK", DeliveryStatus::Read),
            ("read", DeliveryStatus::Read),
            ("ERROR", DeliveryStatus::Failed),
            ("failed", DeliveryStatus::Failed),
            ("PENDING", DeliveryStatus::Sending),
        ];
        for (raw_status, mapped) in expected {
            assert_eq!(map_status(Some(&json!(raw_status))), mapped, "{raw_status}");
        }
        assert_eq!(map_status(None), DeliveryStatus::Sent);
        assert_eq!(map_status(Some(&Value::Null)), DeliveryStatus::Sent);
    }

    #[test]
    #[traced_test]
    fn unknown_status_falls_back_to_sent_and_logs_gap() {
        assert_eq!(map_status(Some(&json!("PLAYED"))), DeliveryStatus::Sent);
        assert!(logs_contain("classification gap"));
        assert!(logs_contain("PLAYED"));
    }

    #[test]
    #[traced_test]
    fn absent_status_does_not_log_gap() {
        assert_eq!(map_status(None), DeliveryStatus::Sent);
        assert!(!logs_contain("classification gap"));
    }

    #[test]
    fn canonical_address_strips_only_the_suffix() {
        assert_eq!(canonical_address("5511@s.whatsapp.net"), "5511");
        assert_eq!(canonical_address("group@g.us"), "group@g.us");
        assert_eq!(canonical_address("plain"), "plain");
    }

    fn status_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            proptest::sample::select(
                STATUS_TABLE.iter().map(|(s, _)| s.to_string()).collect::<Vec<_>>()
            )
            .prop_map(Some),
            "[A-Z_]{1,12}".prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn normalize_is_deterministic(
            number in "[0-9]{8,15}",
            name in proptest::option::of("[A-Za-z ]{1,20}"),
            text in "[a-zA-Z0-9 ,.!?]{0,40}",
            from_me in any::<bool>(),
            status in status_strategy(),
            enveloped in any::<bool>(),
        ) {
            let mut inner = json!({
                "key": {"remoteJid": format!("{number}{ADDRESS_SUFFIX}"), "fromMe": from_me},
                "message": {"conversation": text},
            });
            if let Some(name) = &name {
                inner["pushName"] = json!(name);
            }
            if let Some(status) = &status {
                inner["status"] = json!(status);
            }
            let event = if enveloped { json!({"data": inner}) } else { inner };
            let event = raw(event);

            let first = normalize(&event).unwrap();
            let second = normalize(&event).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&first.sender_canonical, &number);
            prop_assert_eq!(first.is_outbound, from_me);
            prop_assert_eq!(first.message_type, MessageType::Text);
            if text.is_empty() {
                prop_assert_eq!(first.content.as_str(), MEDIA_PLACEHOLDER);
            } else {
                prop_assert_eq!(&first.content, &text);
            }
        }

        #[test]
        fn canonical_plus_suffix_restores_address(address in "[a-z0-9@.]{0,30}") {
            let canonical = canonical_address(&address);
            let restored = format!("{canonical}{ADDRESS_SUFFIX}");
            prop_assert!(canonical == address || restored == address);
        }
    }
}
