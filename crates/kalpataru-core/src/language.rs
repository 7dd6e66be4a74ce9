//! Script-range language heuristic and emoji sanitizing.
//!
//! Two output modes share this module: a fine language tag sent to the chat
//! backend, and a coarse speech locale used to pick a synthesis voice. Neither
//! is real language identification; a mixed-script string resolves to the
//! first script that matches in priority order.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{LanguageTag, SpeechLocale};

/// Script ranges tested in priority order. First match wins.
static SCRIPT_PATTERNS: LazyLock<Vec<(Regex, LanguageTag)>> = LazyLock::new(|| {
    let patterns: Vec<(&str, LanguageTag)> = vec![
        // Devanagari letters अ..ह
        (r"[\x{0905}-\x{0939}]", LanguageTag::Hindi),
        // Bengali independent vowels অ..ঔ
        (r"[\x{0985}-\x{0994}]", LanguageTag::Bengali),
        // Tamil letters அ..ஹ
        (r"[\x{0B85}-\x{0BB9}]", LanguageTag::Tamil),
        // Thai ก..๙
        (r"[\x{0E01}-\x{0E59}]", LanguageTag::Thai),
        // CJK unified ideographs 一..龯
        (r"[\x{4E00}-\x{9FAF}]", LanguageTag::Chinese),
        // Cyrillic А..я
        (r"[\x{0410}-\x{044F}]", LanguageTag::Russian),
        // Arabic أ..ي
        (r"[\x{0623}-\x{064A}]", LanguageTag::Arabic),
    ];
    patterns
        .into_iter()
        .map(|(pat, tag)| (Regex::new(pat).expect("Invalid script regex"), tag))
        .collect()
});

static NON_ASCII_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\x00-\x7F]").unwrap());

/// A pictograph plus any presentation selector, skin tone, keycap or
/// ZWJ-joined continuation that belongs to the same glyph.
static EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\p{Emoji_Presentation}\p{Extended_Pictographic}](?:\x{FE0F}|\x{20E3}|\p{Emoji_Modifier}|\x{200D}[\p{Emoji_Presentation}\p{Extended_Pictographic}])*",
    )
    .unwrap()
});

/// Map text to a language tag by sniffing Unicode script ranges.
///
/// Returns [`LanguageTag::English`] when no known script is present.
pub fn detect_script_language(text: &str) -> LanguageTag {
    SCRIPT_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, tag)| *tag)
        .unwrap_or_default()
}

/// Coarse locale for speech synthesis: any non-ASCII codepoint selects the
/// Hindi voice, otherwise the Indian English voice.
pub fn speech_locale(text: &str) -> SpeechLocale {
    if NON_ASCII_RE.is_match(text) {
        SpeechLocale::HindiIndia
    } else {
        SpeechLocale::EnglishIndia
    }
}

/// Remove emoji and pictographic codepoints, leaving all other text intact.
pub fn strip_emoji(text: &str) -> String {
    EMOJI_RE.replace_all(text, "").into_owned()
}
