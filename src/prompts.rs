//! Prompts for LLM-based block translation.
//!
//! All prompt text lives here so tests can inspect it without a live
//! endpoint. The translator sends exactly one user message built by
//! [`translation_prompt`]; there is no system message.

/// Instruction prefix. `{lang}` is replaced with the display name of the
/// target language.
pub const TRANSLATION_INSTRUCTION: &str = "Translate the following academic passage into {lang}. \
Keep terminology accurate and preserve the structure of the passage. \
Output only the translation, without explanations or notes:";

/// Display name for a target-language code.
///
/// Known codes map to the language's own name; anything else is passed
/// through unchanged so callers can name a language directly
/// (`"Français"`, `"de"`).
pub fn language_name(code: &str) -> &str {
    match code {
        "zh" => "中文",
        "en" => "English",
        "ja" => "日本語",
        "ko" => "한국어",
        other => other,
    }
}

/// Build the user message sent to the LLM for one block.
pub fn translation_prompt(text: &str, target_lang: &str) -> String {
    format!(
        "{}\n\n{}",
        TRANSLATION_INSTRUCTION.replace("{lang}", language_name(target_lang)),
        text
    )
}
