// Prompt templates for each pipeline stage.
// Every builder is deterministic: the same inputs always produce the same prompt.

use shared_types::{
    BodyTypeResult, ColorResult, HistoryMessage, Intent, ReasoningSummary, SilhouetteResult,
    WardrobeContext,
};

const STYLIST_PERSONA: &str = "You are a friendly, practical personal stylist.";

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else. Do not wrap it in markdown.";

fn render_history(history: &[HistoryMessage]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut rendered = String::from("CONVERSATION SO FAR:\n");
    for turn in history {
        rendered.push_str(turn.role.as_str());
        rendered.push_str(": ");
        rendered.push_str(turn.content.trim());
        rendered.push('\n');
    }
    rendered.push('\n');
    rendered
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn intent_prompt(message: &str, history: &[HistoryMessage]) -> String {
    let labels = Intent::LABELS
        .iter()
        .map(|intent| format!("- {}", intent.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Classify the user's latest message into exactly one intent.\n\n\
         INTENTS:\n{labels}\n\n\
         Use general_chat for greetings, small talk and anything unrelated to clothing.\n\n\
         {history}USER MESSAGE:\n{message}\n\n\
         {JSON_ONLY}\n\
         Schema: {{\"intent\": \"<one of the intents>\", \"confidence\": <number between 0 and 1>}}",
        labels = labels,
        history = render_history(history),
        message = message.trim(),
        JSON_ONLY = JSON_ONLY,
    )
}

pub fn general_chat_prompt(message: &str, history: &[HistoryMessage]) -> String {
    format!(
        "{persona} Reply conversationally and briefly. If the user seems interested in \
         outfits, invite them to ask for styling help.\n\n\
         {history}USER MESSAGE:\n{message}",
        persona = STYLIST_PERSONA,
        history = render_history(history),
        message = message.trim(),
    )
}

/// Shared context for the three analysis stages.
pub fn analysis_context(message: &str, wardrobe: &WardrobeContext) -> String {
    format!(
        "USER MESSAGE:\n{}\n\nWARDROBE AND PROFILE:\n{}",
        message.trim(),
        to_json(wardrobe)
    )
}

pub fn color_prompt(context: &str) -> String {
    format!(
        "{STYLIST_PERSONA} Analyze which colors the user should wear for this request, \
         using their wardrobe and profile.\n\n{context}\n\n{JSON_ONLY}\n\
         Schema: {{\"color_direction\": string, \"combos\": [string], \"reason\": string}}"
    )
}

pub fn silhouette_prompt(context: &str) -> String {
    format!(
        "{STYLIST_PERSONA} Analyze which silhouettes and proportions suit this request, \
         using their wardrobe and profile.\n\n{context}\n\n{JSON_ONLY}\n\
         Schema: {{\"silhouette_verdict\": string, \"structures\": [string], \"notes\": string}}"
    )
}

pub fn body_type_prompt(context: &str) -> String {
    format!(
        "{STYLIST_PERSONA} Infer the user's body type from their profile and list the \
         styling rules that flatter it.\n\n{context}\n\n{JSON_ONLY}\n\
         Schema: {{\"body_type\": string, \"rules\": [string], \"application\": string}}"
    )
}

pub fn reasoning_prompt(
    color: &ColorResult,
    silhouette: &SilhouetteResult,
    body_type: &BodyTypeResult,
) -> String {
    format!(
        "Combine the three styling analyses below into one consistent direction.\n\n\
         COLOR ANALYSIS:\n{color}\n\n\
         SILHOUETTE ANALYSIS:\n{silhouette}\n\n\
         BODY TYPE ANALYSIS:\n{body_type}\n\n\
         {JSON_ONLY}\n\
         Schema: {{\"summary\": string, \"core_outfit_direction\": string, \
         \"key_color_approach\": string, \"key_silhouette_rules\": [string], \
         \"key_body_type_adaptations\": [string]}}",
        color = to_json(color),
        silhouette = to_json(silhouette),
        body_type = to_json(body_type),
        JSON_ONLY = JSON_ONLY,
    )
}

pub fn final_response_prompt(
    message: &str,
    wardrobe: &WardrobeContext,
    reasoning: &ReasoningSummary,
) -> String {
    let owned = if wardrobe.is_empty() {
        "(no wardrobe items on file; suggest generic pieces)".to_string()
    } else {
        wardrobe
            .item_names()
            .iter()
            .map(|name| format!("- {}", name))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{persona} Answer the user's request with concrete outfits.\n\n\
         USER MESSAGE:\n{message}\n\n\
         STYLING DIRECTION:\n{reasoning}\n\n\
         ITEMS THE USER OWNS:\n{owned}\n\n\
         Only use item names exactly as listed above.\n\n\
         {JSON_ONLY}\n\
         Schema: {{\"message\": string, \"outfits\": [{{\"title\": string, \"items\": [string], \
         \"why_it_works\": string}}], \"extra_tips\": [string]}}",
        persona = STYLIST_PERSONA,
        message = message.trim(),
        reasoning = to_json(reasoning),
        owned = owned,
        JSON_ONLY = JSON_ONLY,
    )
}
