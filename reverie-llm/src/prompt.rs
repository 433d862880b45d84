//! Prompt templates for roleplay replies and nonverbal cues.
//!
//! Placeholders are `{name}`; fill them with [`render_template`].

/// System prompt for a roleplay reply.
pub const ROLEPLAY_SYSTEM: &str = "You are {character_name}, follow the prompt instructions.";

/// User prompt for a roleplay reply.
pub const ROLEPLAY_USER: &str = r"You are {character_name}, a character with the personality: {personality}.
It is {current_time}. You're currently in {location}, {action}.
Your current emotional state is {emotional_state}.
You feel {internal_feeling} internally, but you're expressing {expressed_feeling}.
Your facade intensity is {facade_intensity} (0-1 scale, higher means a larger gap between internal and expressed emotions).
Your attitude is {attitude}. Reflect this in your tone and behavior.
You have the following emotional conflicts: {emotional_conflicts}.
Your tone should be {tone}.
Nonverbal cues to include: {nonverbal_cues}.
Active defense mechanisms: {active_defenses}.
You and {user_name} are {base_relationship}; right now the relationship is {relationship}.
Your last action was: {previous_action}.
Recent events: {dynamic_memory}.
Earlier today: {active_memory}.
Long-term memories: {long_term_memory}.
What you said to {user_name} recently: {user_memories}.

Respond as {character_name}, keeping your tone, attitude, and personality consistent with your emotional state.
Include a short action description in asterisks before your dialogue, incorporating the specified nonverbal cues to reflect your current mood.
Ensure your response builds on previous interactions, showing gradual emotional transitions if your mood changes.
Reflect your emotional conflicts and defense mechanisms in your dialogue and actions.
Avoid abrupt mood swings. Any change should feel natural and motivated by the context.
To ensure variety, avoid reusing the following phrases: {avoided_phrases}.
Instead, use fresh expressions like: {fresh_phrases}.

{user_name} just said: '{user_input}'";

/// Prompt asking for one fresh nonverbal cue.
pub const NONVERBAL_CUE: &str = r"Generate a unique nonverbal action for a character in the emotional state: {emotional_state}.
The action should be subtle, natural, and fit their current mood (attitude: {attitude}).
Examples: 'Taps her foot', 'Clenches her fists', 'Smiles faintly'.
Avoid actions already used recently: {recent_cues}.
Return one action as plain text.";

/// Rendered in place of an empty list.
pub const NONE: &str = "None";

/// Simple template interpolation.
///
/// Replaces `{key}` with the corresponding value, in `vars` order. Unknown
/// placeholders are left as they are.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Placeholder names still present in `text`.
#[must_use]
pub fn unrendered_placeholders(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else { break };
        let name = &after[..close];
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            found.push(name);
        }
        rest = &after[close + 1..];
    }
    found
}

/// Join `items` with `", "`, or [`NONE`] when empty.
#[must_use]
pub fn list_or_none<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return NONE.to_owned();
    }
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering_works() {
        let rendered = render_template(
            "Hello {name}, you are {role}.",
            &[("name", "Poppy"), ("role", "rivals")],
        );
        assert_eq!(rendered, "Hello Poppy, you are rivals.");
    }

    #[test]
    fn template_leaves_missing_vars() {
        let rendered = render_template("Hello {name}, {unknown}.", &[("name", "Poppy")]);
        assert_eq!(rendered, "Hello Poppy, {unknown}.");
        assert_eq!(unrendered_placeholders(&rendered), ["unknown"]);
    }

    #[test]
    fn placeholder_scan_ignores_non_identifiers() {
        assert!(unrendered_placeholders("a {} b {Not This} c {x y}").is_empty());
        assert_eq!(
            unrendered_placeholders(ROLEPLAY_SYSTEM),
            ["character_name"]
        );
    }

    #[test]
    fn empty_lists_render_as_none() {
        let empty: [&str; 0] = [];
        assert_eq!(list_or_none(&empty), "None");
        assert_eq!(list_or_none(&["a", "b"]), "a, b");
    }
}
