// Prompt construction and answer cleanup for explanations
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use regex::Regex;

const PREAMBLE: &str = "You are a knowledgeable assistant that explains text a reader selected on a web page. \
Be accurate and concise: answer in at most three short paragraphs of Markdown, \
and do not restate the question.";

/// Selections up to this many words are treated as a phrase.
const PHRASE_MAX_WORDS: usize = 10;
/// Selections up to this many words are treated as a passage.
const PASSAGE_MAX_WORDS: usize = 50;
/// Upper-case selections up to this many words are read as acronyms.
const ACRONYM_MAX_WORDS: usize = 3;

lazy_static! {
    /// Leading filler models like to emit before the actual answer.
    static ref BOILERPLATE: Regex = Regex::new(
        r"(?i)^(?:(?:sure|certainly|of course|absolutely)[!,.]\s*)?(?:here(?:'s|’s| is) (?:an? |the |my )?(?:explanation|breakdown|summary)[^:\n]*:|explanation:)?\s*"
    )
    .unwrap();
    static ref URL: Regex = Regex::new(r"^https?://").unwrap();
    static ref EMAIL: Regex = Regex::new(r"\S+@\S+\.\S+").unwrap();
    static ref SYMBOL: Regex = Regex::new(r"[%$@#&]").unwrap();
}

/// What a selection looks like, which decides the instruction sent with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Url,
    Email,
    Acronym,
    /// Digits mixed with `%`, `$`, `@`, `#` or `&`: prices, codes, handles.
    Coded,
    Word,
    Phrase,
    Passage,
    LongText,
}

impl SelectionKind {
    /// Classify a trimmed selection. Earlier checks win.
    pub fn classify(text: &str) -> Self {
        let words = text.split_whitespace().count();
        let upper_case = text.chars().count() > 1
            && text.chars().any(char::is_alphabetic)
            && text == text.to_uppercase();
        let has_digits = text.chars().any(|c| c.is_ascii_digit());

        if URL.is_match(text) {
            Self::Url
        } else if EMAIL.is_match(text) {
            Self::Email
        } else if upper_case && words <= ACRONYM_MAX_WORDS {
            Self::Acronym
        } else if has_digits && SYMBOL.is_match(text) {
            Self::Coded
        } else if words <= 1 {
            Self::Word
        } else if words <= PHRASE_MAX_WORDS {
            Self::Phrase
        } else if words <= PASSAGE_MAX_WORDS {
            Self::Passage
        } else {
            Self::LongText
        }
    }
}

/// Build the provider prompt for a (trimmed) selection.
pub fn build_prompt(text: &str) -> String {
    let task = match SelectionKind::classify(text) {
        SelectionKind::Url => format!(
            "Explain the URL \"{}\": what kind of website or resource it most likely points to.",
            text
        ),
        SelectionKind::Email => format!(
            "Explain the email address \"{}\": how its parts are structured and what it suggests about the sender or organization.",
            text
        ),
        SelectionKind::Acronym => format!(
            "\"{}\" looks like an acronym. Give its full form, what it stands for, and the context it is used in.",
            text
        ),
        SelectionKind::Coded => format!(
            "Explain what the text \"{}\" represents. It mixes numbers with special characters.",
            text
        ),
        SelectionKind::Word => format!(
            "Explain the term \"{}\":\n1. Definition and meaning\n2. Context of usage\n3. An example if relevant\n4. Related information worth knowing",
            text
        ),
        SelectionKind::Phrase => format!(
            "Explain the phrase \"{}\": its meaning, the context it appears in, and any useful background.",
            text
        ),
        SelectionKind::Passage => format!(
            "Explain the following passage. Summarize its main points and explain the key concepts.\n\n\"{}\"",
            text
        ),
        SelectionKind::LongText => format!(
            "Analyze the following text and provide:\n1. A clear summary of the main points\n2. Explanations of the key concepts\n3. Its context and significance\n\n\"{}\"",
            text
        ),
    };

    format!("{}\n\n{}", PREAMBLE, task)
}

/// Trim the provider's answer and drop one leading boilerplate phrase.
pub fn clean_explanation(raw: &str) -> String {
    BOILERPLATE.replace(raw.trim(), "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_kind() {
        use SelectionKind::*;

        assert_eq!(SelectionKind::classify("https://example.com/docs"), Url);
        assert_eq!(SelectionKind::classify("http://localhost:8080"), Url);
        assert_eq!(SelectionKind::classify("jane.doe@example.org"), Email);
        assert_eq!(SelectionKind::classify("NASA"), Acronym);
        assert_eq!(SelectionKind::classify("HTTP API"), Acronym);
        assert_eq!(SelectionKind::classify("$4.99 @ 20% off"), Coded);
        assert_eq!(SelectionKind::classify("#42"), Coded);
        assert_eq!(SelectionKind::classify("entropy"), Word);
        assert_eq!(SelectionKind::classify("break the ice"), Phrase);

        let passage = "word ".repeat(30);
        assert_eq!(SelectionKind::classify(passage.trim()), Passage);
        let long = "word ".repeat(51);
        assert_eq!(SelectionKind::classify(long.trim()), LongText);
    }

    #[test]
    fn test_classify_boundaries() {
        use SelectionKind::*;

        // Single characters and caseless text are not acronyms.
        assert_eq!(SelectionKind::classify("A"), Word);
        assert_eq!(SelectionKind::classify("2024"), Word);
        // Four upper-case words read as a phrase.
        assert_eq!(SelectionKind::classify("THIS IS VERY LOUD"), Phrase);
        // Symbols without digits are not codes.
        assert_eq!(SelectionKind::classify("R&D"), Acronym);
        assert_eq!(SelectionKind::classify("rock & roll"), Phrase);

        let ten = "word ".repeat(10);
        assert_eq!(SelectionKind::classify(ten.trim()), Phrase);
        let fifty = "word ".repeat(50);
        assert_eq!(SelectionKind::classify(fifty.trim()), Passage);
    }

    #[test]
    fn test_prompt_carries_selection() {
        assert!(build_prompt("entropy").contains("Explain the term \"entropy\""));
        assert!(build_prompt("NASA").contains("acronym"));
        assert!(build_prompt("https://rust-lang.org").contains("URL"));
        assert!(build_prompt("break the ice").starts_with(PREAMBLE));

        let long = "word ".repeat(60);
        assert!(build_prompt(long.trim()).contains("significance"));
    }

    #[test]
    fn test_clean_strips_boilerplate() {
        let raw = "  Sure! Here's an explanation of \"entropy\":\n\nEntropy measures disorder.  ";
        assert_eq!(clean_explanation(raw), "Entropy measures disorder.");

        assert_eq!(
            clean_explanation("Explanation: A noun."),
            "A noun."
        );
    }

    #[test]
    fn test_clean_keeps_ordinary_answers() {
        assert_eq!(
            clean_explanation("Certainty is the state of being sure."),
            "Certainty is the state of being sure."
        );
        assert_eq!(clean_explanation("   "), "");
    }
}
