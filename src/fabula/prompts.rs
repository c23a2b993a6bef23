use super::types::{Genre, Style};

pub fn story_prompt(genre: &Genre, style: &Style) -> String {
    format!(
        "Analyze the mood, atmosphere, and setting of this image. Based on your analysis, \
write a compelling and evocative opening paragraph for a {genre} story in a {style} writing style. \
The tone should match the image. Do not add a title or any introductory text, just the paragraph itself.",
        genre = genre.label(),
        style = style.label(),
    )
}

/// Delivery instruction the speech backend receives ahead of the story text.
pub fn speech_instruction(style: &Style) -> &'static str {
    match style {
        Style::Suspenseful => "Say in a tense, suspenseful voice with dramatic pauses:",
        Style::Poetic => "Say in a flowing, lyrical, and emotive voice:",
        Style::Whimsical => "Say in a lighthearted, playful, and whimsical voice:",
        Style::Minimalist => "Say in a clear, direct, and understated voice:",
        Style::Descriptive => "Say in a rich, expressive, and descriptive voice:",
        Style::Romance => "Say in a warm, gentle, and romantic voice:",
        Style::Horror => "Say in a chilling, fearful voice:",
        Style::Custom(_) => "Say expressively:",
    }
}

pub fn speech_prompt(text: &str, style: &Style) -> String {
    format!("{} {}", speech_instruction(style), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_style_has_its_own_instruction() {
        let styles = [
            Style::Suspenseful,
            Style::Poetic,
            Style::Whimsical,
            Style::Minimalist,
            Style::Descriptive,
            Style::Romance,
            Style::Horror,
        ];
        let mut seen: Vec<&str> = styles.iter().map(speech_instruction).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), styles.len());
        assert!(!seen.contains(&"Say expressively:"));
    }

    #[test]
    fn unknown_style_falls_back_to_expressive() {
        let style = Style::Custom("Noir".to_string());
        assert_eq!(speech_instruction(&style), "Say expressively:");
        assert_eq!(speech_prompt("Hello.", &style), "Say expressively: Hello.");
    }

    #[test]
    fn story_prompt_names_genre_and_style() {
        let p = story_prompt(&Genre::SciFi, &Style::Minimalist);
        assert!(p.contains("Sci-Fi story"));
        assert!(p.contains("Minimalist writing style"));
    }
}
