//! Built-in minimal catalog, used when the engine cannot be reached.

use std::collections::BTreeMap;

use super::{OperationDescriptor, PieceDescriptor};

type Ops<'a> = &'a [(&'a str, &'a str)];

const FALLBACK: &[(&str, &str, Ops<'static>, Ops<'static>)] = &[
    (
        "@activepieces/piece-gmail",
        "Gmail",
        &[("new-email", "New Email")],
        &[("send-email", "Send Email"), ("read-email", "Read Email")],
    ),
    (
        "@activepieces/piece-slack",
        "Slack",
        &[("new-message", "New Message")],
        &[
            ("send-channel-message", "Send Message to Channel"),
            ("send-direct-message", "Send Direct Message"),
        ],
    ),
    (
        "@activepieces/piece-google-sheets",
        "Google Sheets",
        &[("new-row-added", "New Row Added")],
        &[("insert-row", "Insert Row"), ("update-row", "Update Row")],
    ),
    (
        "@activepieces/piece-schedule",
        "Schedule",
        &[
            ("cron_expression", "Cron Expression"),
            ("every_hour", "Every Hour"),
            ("every_day", "Every Day"),
        ],
        &[],
    ),
    (
        "@activepieces/piece-webhook",
        "Webhook",
        &[("catch_request", "Catch Webhook")],
        &[],
    ),
    (
        "@activepieces/piece-http",
        "HTTP",
        &[],
        &[("send-request", "Send HTTP Request")],
    ),
    (
        "@activepieces/piece-openai",
        "OpenAI",
        &[],
        &[
            ("ask-chatgpt", "Ask ChatGPT"),
            ("generate-image", "Generate Image"),
        ],
    ),
    (
        "@activepieces/piece-notion",
        "Notion",
        &[("new-database-item", "New Database Item")],
        &[
            ("create-database-item", "Create Database Item"),
            ("update-database-item", "Update Database Item"),
        ],
    ),
    (
        "@activepieces/piece-telegram-bot",
        "Telegram Bot",
        &[("new-message", "New Message")],
        &[("send-text-message", "Send Text Message")],
    ),
    (
        "@activepieces/piece-discord",
        "Discord",
        &[("new-message", "New Message")],
        &[("send-message-webhook", "Send Message (Webhook)")],
    ),
    (
        "@activepieces/piece-airtable",
        "Airtable",
        &[("new-record", "New Record")],
        &[("create-record", "Create Record")],
    ),
    (
        "@activepieces/piece-hubspot",
        "HubSpot",
        &[("new-contact", "New Contact")],
        &[
            ("create-contact", "Create Contact"),
            ("update-contact", "Update Contact"),
        ],
    ),
    (
        "@activepieces/piece-whatsapp",
        "WhatsApp",
        &[],
        &[("send-message", "Send Message")],
    ),
    (
        "@activepieces/piece-google-calendar",
        "Google Calendar",
        &[("new-event", "New Event")],
        &[("create-event", "Create Event")],
    ),
    (
        "@activepieces/piece-google-drive",
        "Google Drive",
        &[("new-file", "New File")],
        &[("upload-file", "Upload File")],
    ),
    (
        "@activepieces/piece-linkedin",
        "LinkedIn",
        &[],
        &[("create-share-update", "Create Share Update")],
    ),
    (
        "@activepieces/piece-twitter",
        "Twitter/X",
        &[],
        &[("create-tweet", "Create Tweet")],
    ),
    (
        "@activepieces/piece-trello",
        "Trello",
        &[("new-card", "New Card")],
        &[("create-card", "Create Card")],
    ),
];

fn ops(entries: Ops<'_>) -> BTreeMap<String, OperationDescriptor> {
    entries
        .iter()
        .map(|(name, display)| {
            (
                (*name).to_string(),
                OperationDescriptor {
                    name: (*name).to_string(),
                    display_name: (*display).to_string(),
                    description: String::new(),
                },
            )
        })
        .collect()
}

pub fn pieces() -> Vec<PieceDescriptor> {
    FALLBACK
        .iter()
        .map(|(name, display, triggers, actions)| PieceDescriptor {
            name: (*name).to_string(),
            display_name: (*display).to_string(),
            version: "0.0.1".into(),
            triggers: ops(triggers),
            actions: ops(actions),
            ..PieceDescriptor::default()
        })
        .collect()
}
