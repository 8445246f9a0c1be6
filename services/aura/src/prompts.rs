//! Prompt construction for the companion persona

use crate::mood::Mood;

/// Which kind of turn is being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBranch {
    /// No user text, non-neutral mood: check in on the user unprompted
    ProactiveCheckIn,
    /// No user text, neutral mood: plain greeting
    Greeting,
    /// The user said something
    Reactive,
}

impl PromptBranch {
    /// Branch selection; an empty message wins over the mood
    pub fn select(mood: Mood, user_text: &str) -> Self {
        match (user_text.is_empty(), mood) {
            (true, Mood::Neutral) => PromptBranch::Greeting,
            (true, _) => PromptBranch::ProactiveCheckIn,
            (false, _) => PromptBranch::Reactive,
        }
    }
}

/// Build the prompt for one turn
pub fn build_prompt(mood: Mood, user_text: &str) -> (PromptBranch, String) {
    let branch = PromptBranch::select(mood, user_text);
    let prompt = match branch {
        PromptBranch::ProactiveCheckIn => format!(
            "You are an empathetic and uplifting chatbot named Aura.\n\
             The user is currently feeling: {mood}.\n\
             They haven't said anything yet. Start a gentle conversation to check in on them or offer a small uplifting thought.\n\
             If they are sad, you can suggest listening to a happy song.\n\
             If they are angry, you can suggest a brief calming exercise.\n\
             Keep your responses to 1-2 sentences.\n"
        ),
        PromptBranch::Greeting => "You are a friendly chatbot named Aura. \
             Greet the user warmly and ask how their day is going. Keep it short."
            .to_string(),
        PromptBranch::Reactive => format!(
            "You are an empathetic and uplifting chatbot named Aura.\n\
             The user is currently feeling: {mood}.\n\
             The user said: \"{user_text}\"\n\
             \n\
             Respond in a friendly, supportive, and concise way to uplift their mood if they seem sad, angry, or stressed.\n\
             If the user is sad, you can suggest listening to a happy song.\n\
             If the user is angry, you can suggest a brief calming exercise.\n\
             If the user is happy or neutral, just have a pleasant conversation.\n\
             Keep your responses to 1-2 sentences.\n\
             Do not explicitly say \"I am an AI\". Behave like a companion.\n"
        ),
    };
    (branch, prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_with_mood_is_proactive() {
        for mood in Mood::ALL.into_iter().filter(|m| *m != Mood::Neutral) {
            let (branch, prompt) = build_prompt(mood, "");
            assert_eq!(branch, PromptBranch::ProactiveCheckIn);
            assert!(prompt.contains(&format!("currently feeling: {}.", mood.as_str())));
            assert!(prompt.contains("happy song"));
            assert!(prompt.contains("calming exercise"));
            assert!(prompt.contains("1-2 sentences"));
        }
    }

    #[test]
    fn test_empty_text_neutral_is_greeting() {
        let (branch, prompt) = build_prompt(Mood::Neutral, "");
        assert_eq!(branch, PromptBranch::Greeting);
        assert!(prompt.contains("Greet the user warmly"));
        assert!(!prompt.contains("currently feeling"));
    }

    #[test]
    fn test_any_text_is_reactive() {
        for mood in Mood::ALL {
            let (branch, prompt) = build_prompt(mood, "I'm furious");
            assert_eq!(branch, PromptBranch::Reactive);
            assert!(prompt.contains("The user said: \"I'm furious\""));
            assert!(prompt.contains(&format!("currently feeling: {}.", mood)));
            assert!(prompt.contains("Do not explicitly say \"I am an AI\""));
        }
    }

    #[test]
    fn test_whitespace_counts_as_text() {
        assert_eq!(PromptBranch::select(Mood::Sad, " "), PromptBranch::Reactive);
    }
}
