use crate::upstream::ChatMessage;

const SUMMARIZE_SYSTEM: &str =
    "You are a helpful assistant that summarizes text into concise, clear bullet points.";

const TRANSLATE_SYSTEM: &str = "You are a professional translator between Hindi and English. \
Translate accurately and preserve the original formatting exactly, including bullet points, \
numbered lists and line breaks.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLanguage {
    English,
    Hindi,
}

impl TargetLanguage {
    pub fn detect(text: &str) -> Self {
        if contains_devanagari(text) {
            Self::English
        } else {
            Self::Hindi
        }
    }

    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Self::English),
            "hi" | "hin" | "hindi" => Some(Self::Hindi),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
        }
    }
}

pub fn contains_devanagari(text: &str) -> bool {
    text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))
}

pub fn summarize_messages(paragraphs: &[String]) -> Vec<ChatMessage> {
    let text = paragraphs.join("\n\n");
    let prompt = format!(
        "Summarize the following text as bullet points. Cover every important point; \
do not limit yourself to a fixed number of bullets. Keep each point concise.\n\n\
Use exactly this format:\n\
• First key point\n\
• Second key point\n\
• Third key point\n\n\
Text:\n{text}"
    );
    vec![ChatMessage::system(SUMMARIZE_SYSTEM), ChatMessage::user(prompt)]
}

pub fn translate_messages(text: &str, target: TargetLanguage) -> Vec<ChatMessage> {
    let prompt = format!(
        "Translate the following text to {}. Preserve all formatting: keep bullet points, \
lists and line breaks exactly as they are. Reply with the translation only.\n\n{text}",
        target.name()
    );
    vec![ChatMessage::system(TRANSLATE_SYSTEM), ChatMessage::user(prompt)]
}
