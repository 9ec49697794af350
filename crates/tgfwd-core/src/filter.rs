//! Keyword filter deciding which messages a job relays.

use crate::messaging::types::MessageView;

/// Case-insensitive keyword set of a job.
///
/// Keeps the keywords as entered (for display and the audit log) alongside a
/// lower-cased copy used for matching. Blank entries and case-insensitive
/// duplicates are dropped; first spelling wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordSet {
    entries: Vec<String>,
    folded: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for kw in keywords {
            let kw = kw.as_ref().trim();
            if kw.is_empty() {
                continue;
            }
            let folded = kw.to_lowercase();
            if set.folded.contains(&folded) {
                continue;
            }
            set.entries.push(kw.to_string());
            set.folded.push(folded);
        }
        set
    }

    /// Parse a comma-separated list, as typed at the menu prompt.
    pub fn parse_csv(input: &str) -> Self {
        Self::new(input.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }
}

/// Whether `message` should be relayed by a job with `keywords`.
///
/// An empty set matches everything, including media without a caption.
/// Otherwise the message text (or caption) must contain at least one keyword
/// as a case-insensitive substring; messages without text never match.
pub fn matches<M: MessageView + ?Sized>(message: &M, keywords: &KeywordSet) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let Some(text) = message.text() else {
        return false;
    };
    let text = text.to_lowercase();
    keywords.folded.iter().any(|kw| text.contains(kw.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{media_message, text_message};

    #[test]
    fn empty_keywords_match_everything() {
        let none = KeywordSet::default();
        assert!(matches(&text_message(1, 1, "anything at all"), &none));
        assert!(matches(&text_message(1, 2, ""), &none));
        assert!(matches(&media_message(1, 3, None), &none));
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        let kws = KeywordSet::new(["urgent"]);
        assert!(matches(&text_message(1, 1, "URGENT update"), &kws));
        assert!(matches(&text_message(1, 2, "this is Urgently needed"), &kws));
        assert!(!matches(&text_message(1, 3, "hello"), &kws));
    }

    #[test]
    fn upper_case_keyword_matches_lower_case_text() {
        let kws = KeywordSet::new(["ALERT"]);
        assert!(matches(&text_message(1, 1, "red alert"), &kws));
    }

    #[test]
    fn any_keyword_is_enough() {
        let kws = KeywordSet::new(["deploy", "rollback"]);
        assert!(matches(&text_message(1, 1, "starting rollback now"), &kws));
        assert!(!matches(&text_message(1, 2, "coffee break"), &kws));
    }

    #[test]
    fn media_without_caption_never_matches_keywords() {
        let kws = KeywordSet::new(["urgent"]);
        assert!(!matches(&media_message(1, 1, None), &kws));
        assert!(matches(&media_message(1, 2, Some("urgent photo")), &kws));
    }

    #[test]
    fn keyword_set_drops_blanks_and_duplicates() {
        let kws = KeywordSet::parse_csv(" urgent, ,URGENT,news ,");
        assert_eq!(kws.as_slice(), &["urgent".to_string(), "news".to_string()]);
        assert!(KeywordSet::parse_csv(" , ").is_empty());
    }
}
