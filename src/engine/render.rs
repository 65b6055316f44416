use serde::Deserialize;

use crate::transport::Activity;

pub const HERO_CARD: &str = "application/vnd.microsoft.card.hero";
pub const THUMBNAIL_CARD: &str = "application/vnd.microsoft.card.thumbnail";

/// Subset of the hero/thumbnail card schema that affects the rendered text.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ButtonCard {
    text: Option<String>,
    buttons: Vec<CardAction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CardAction {
    title: Option<String>,
}

/// Text fragment an activity contributes to the visible reply.
///
/// - Button cards (hero, thumbnail) render as `text(button1|button2|...)`,
///   judged by the first attachment only.
/// - Activities with an attachment of any other type contribute nothing.
/// - Activities without attachments contribute their text, or "" if none.
pub fn render_activity(activity: &Activity) -> Option<String> {
    let Some(attachment) = activity.attachments.first() else {
        return Some(activity.text.clone().unwrap_or_default());
    };

    match attachment.content_type.as_str() {
        HERO_CARD | THUMBNAIL_CARD => {
            let card: ButtonCard = match serde_json::from_value(attachment.content.clone()) {
                Ok(card) => card,
                Err(e) => {
                    tracing::warn!(content_type = %attachment.content_type, "Unreadable card content: {}", e);
                    return None;
                }
            };
            Some(render_button_card(&card))
        }
        other => {
            tracing::debug!(content_type = %other, "Ignoring unrecognised attachment");
            None
        }
    }
}

fn render_button_card(card: &ButtonCard) -> String {
    let titles: Vec<&str> = card
        .buttons
        .iter()
        .map(|b| b.title.as_deref().unwrap_or(""))
        .collect();
    format!(
        "{}({})",
        card.text.as_deref().unwrap_or("").trim(),
        titles.join("|")
    )
}
