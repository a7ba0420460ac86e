//! Prompt construction for story turns

use crate::schemas::gemini::{
    block_threshold, harm_category, GeminiRequest, GenerationConfig, SafetySetting,
};

const PREAMBLE: &str =
    "You are the AI that powers QuestGPT, a text-based interactive adventure game.";

const MODERATION_RULES: &str = "IMPORTANT CONTENT MODERATION INSTRUCTIONS:
1. Allow mature themes and topics including dating, romance, relationships, and non-explicit references to sex or adult activities.
2. Only filter extremely offensive language like racial slurs, extreme hate speech, or explicit graphic sexual content.
3. Be comfortable discussing dating, relationships, flirting, and adult topics in a tasteful, non-explicit way.
4. Only provide educational responses about inappropriate content when extreme slurs or hate speech are used.

If the player's command contains extreme slurs or hate speech, provide a brief educational response. Otherwise:";

const CONTINUATION_RULES: &str = "Your role is to FOLLOW THE PLAYER'S LEAD and help develop the world and characters THEY want to create. If they describe a character, setting, or plot element, incorporate it exactly as they describe. Be concise and to the point.

Important rules:
- Keep responses under 100 words unless the player specifically requests more detail
- Ask questions about what they'd like to see in the story when appropriate
- If the player wants to introduce new characters, settings, or plot elements, let them do so freely
- Present clear choices or options when the player seems unsure
- The player's creative direction always overrides any predetermined storyline

Respond now with a brief, engaging continuation based on the player's command.";

const OPENING_RULES: &str = "Your role is to FOLLOW THE PLAYER'S LEAD and help them create the adventure THEY want to experience.

Important rules:
- Keep responses under 100 words unless the player specifically requests more detail
- If the player wants to create specific characters, settings, or plot elements, incorporate them exactly as described
- If this is the first command, ask them what kind of adventure they want to create or what characters they'd like to play as
- Present clear choices and let the player know they can shape the world however they wish
- The player's creative direction always overrides any predetermined storyline

Respond now with a brief, engaging response that encourages the player to take control of their adventure.";

/// Sampling parameters for story turns
pub fn story_generation_config() -> GenerationConfig {
    GenerationConfig {
        temperature: Some(0.8),
        top_p: Some(0.95),
        top_k: Some(40),
        max_output_tokens: Some(1024),
    }
}

/// Block only high-severity content in the four configurable categories
pub fn story_safety_settings() -> Vec<SafetySetting> {
    [
        harm_category::HARASSMENT,
        harm_category::HATE_SPEECH,
        harm_category::SEXUALLY_EXPLICIT,
        harm_category::DANGEROUS_CONTENT,
    ]
    .into_iter()
    .map(|category| SafetySetting::new(category, block_threshold::BLOCK_ONLY_HIGH))
    .collect()
}

/// Render the prompt text for one turn
pub fn render_prompt(command: &str, context: Option<&str>, genre: Option<&str>) -> String {
    let header = match genre.map(str::trim).filter(|g| !g.is_empty()) {
        Some(genre) => format!("{} This is a {} adventure.", PREAMBLE, genre.to_lowercase()),
        None => PREAMBLE.to_string(),
    };

    match context.filter(|c| !c.trim().is_empty()) {
        Some(context) => format!(
            "{header}\n\nHere's the story so far:\n{context}\n\nThe player's command is: \"{command}\"\n\n{MODERATION_RULES}\n\n{CONTINUATION_RULES}"
        ),
        None => format!(
            "{header}\n\nThe player has entered the command: \"{command}\".\n\n{MODERATION_RULES}\n\n{OPENING_RULES}"
        ),
    }
}

/// Full provider request for one turn
pub fn build_story_request(command: &str, context: Option<&str>, genre: Option<&str>) -> GeminiRequest {
    GeminiRequest::from_prompt(render_prompt(command, context, genre))
        .with_generation_config(story_generation_config())
        .with_safety_settings(story_safety_settings())
}
