//! Transcript metrics engine
//!
//! Pure, deterministic functions over a finished transcript. An empty
//! transcript is valid input and yields neutral values.
//!
//! Known approximations:
//! - `talk_time_ratio` counts messages, not seconds spoken.
//! - `sentiment_score` is a bag-of-keywords polarity ratio, not a model.

use crate::models::SessionMetrics;
use crate::transcript::{plain_text, word_count, TranscriptMessage};
use once_cell::sync::Lazy;
use regex::Regex;

/// Speaker substrings (lowercase) that identify the trainee's own turns
const TRAINEE_SPEAKER_MARKERS: &[&str] = &["user", "you", "speaker_1"];

const FILLER_PHRASES: &[&str] = &[
    "um",
    "uh",
    "er",
    "ah",
    "like",
    "you know",
    "sort of",
    "kind of",
    "i mean",
    "actually",
    "basically",
    "literally",
    "totally",
    "right?",
    "okay so",
];

const POSITIVE_WORDS: &[&str] = &[
    "great",
    "excellent",
    "good",
    "perfect",
    "wonderful",
    "happy",
    "interested",
    "yes",
    "definitely",
    "absolutely",
    "love",
    "amazing",
    "fantastic",
    "helpful",
    "agree",
    "thanks",
];

const NEGATIVE_WORDS: &[&str] = &[
    "no",
    "not",
    "bad",
    "terrible",
    "problem",
    "issue",
    "concern",
    "expensive",
    "difficult",
    "worried",
    "unfortunately",
    "disappointed",
    "hate",
    "never",
    "wrong",
];

static FILLER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| compile_patterns(FILLER_PHRASES));
static POSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| compile_patterns(POSITIVE_WORDS));
static NEGATIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| compile_patterns(NEGATIVE_WORDS));

/// Build case-insensitive, word-boundary-delimited patterns
///
/// A boundary assertion is only added on an edge that is a word character, so
/// punctuation-bearing entries such as `right?` still match before a space.
fn compile_patterns(phrases: &[&str]) -> Vec<Regex> {
    phrases
        .iter()
        .map(|phrase| {
            let starts_word = phrase.chars().next().map_or(false, is_word_char);
            let ends_word = phrase.chars().last().map_or(false, is_word_char);
            let pattern = format!(
                "(?i){}{}{}",
                if starts_word { r"\b" } else { "" },
                regex::escape(phrase),
                if ends_word { r"\b" } else { "" },
            );
            Regex::new(&pattern).expect("keyword patterns are escaped literals")
        })
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn count_matches(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().map(|re| re.find_iter(text).count()).sum()
}

/// Share of messages spoken by the trainee, in [0, 1]
pub fn talk_time_ratio(transcript: &[TranscriptMessage]) -> f64 {
    if transcript.is_empty() {
        return 0.0;
    }

    let trainee_messages = transcript
        .iter()
        .filter(|m| {
            let speaker = m.speaker.to_lowercase();
            TRAINEE_SPEAKER_MARKERS.iter().any(|marker| speaker.contains(marker))
        })
        .count();

    trainee_messages as f64 / transcript.len() as f64
}

/// Total filler-phrase occurrences across the whole transcript
///
/// Each phrase is counted independently; overlaps between different phrases
/// are not deduplicated.
pub fn filler_words_count(transcript: &[TranscriptMessage]) -> u32 {
    count_matches(&FILLER_PATTERNS, &plain_text(transcript)) as u32
}

/// Lexical polarity in [0, 1]; 0.5 when no keyword matches
pub fn sentiment_score(transcript: &[TranscriptMessage]) -> f64 {
    let text = plain_text(transcript);
    let positive = count_matches(&POSITIVE_PATTERNS, &text);
    let negative = count_matches(&NEGATIVE_PATTERNS, &text);

    if positive + negative == 0 {
        return 0.5;
    }

    positive as f64 / (positive + negative) as f64
}

/// Words per minute, rounded; 0 without a positive duration
pub fn speaking_pace_wpm(transcript: &[TranscriptMessage], duration_seconds: Option<f64>) -> u32 {
    let duration = match duration_seconds {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => return 0,
    };

    let words = word_count(&plain_text(transcript));
    (words as f64 / (duration / 60.0)).round() as u32
}

/// All four metrics together
pub fn generate_metrics(
    transcript: &[TranscriptMessage],
    duration_seconds: Option<f64>,
) -> SessionMetrics {
    SessionMetrics {
        talk_time_ratio: talk_time_ratio(transcript),
        filler_words_count: filler_words_count(transcript),
        speaking_pace_wpm: speaking_pace_wpm(transcript, duration_seconds),
        sentiment_score: sentiment_score(transcript),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(speaker: &str, message: &str) -> TranscriptMessage {
        TranscriptMessage::new(speaker, message)
    }

    /// Five messages, three from the trainee, no fillers, no sentiment keywords
    fn neutral_call() -> Vec<TranscriptMessage> {
        vec![
            msg("user", "Hello this is Sam from Acme calling about your order"),
            msg("client", "Hi Sam what can I do for you today"),
            msg("user", "I wanted to walk through the renewal options with you"),
            msg("client", "Sure go ahead"),
            msg("user", "The annual plan includes support and training"),
        ]
    }

    #[test]
    fn test_empty_transcript_neutral_values() {
        let metrics = generate_metrics(&[], Some(120.0));
        assert_eq!(metrics.talk_time_ratio, 0.0);
        assert_eq!(metrics.filler_words_count, 0);
        assert_eq!(metrics.speaking_pace_wpm, 0);
        assert_eq!(metrics.sentiment_score, 0.5);
    }

    #[test]
    fn test_neutral_call_metrics() {
        let transcript = neutral_call();
        let metrics = generate_metrics(&transcript, Some(185.0));

        assert_eq!(metrics.talk_time_ratio, 0.6);
        assert_eq!(metrics.filler_words_count, 0);
        assert_eq!(metrics.sentiment_score, 0.5);

        let words = word_count(&plain_text(&transcript)) as f64;
        assert_eq!(metrics.speaking_pace_wpm, (words / (185.0 / 60.0)).round() as u32);
    }

    #[test]
    fn test_metrics_deterministic() {
        let transcript = neutral_call();
        assert_eq!(
            generate_metrics(&transcript, Some(90.0)),
            generate_metrics(&transcript, Some(90.0))
        );
    }

    #[test]
    fn test_talk_time_speaker_markers_case_insensitive() {
        let transcript = vec![
            msg("USER", "a"),
            msg("You", "b"),
            msg("Speaker_1", "c"),
            msg("agent", "d"),
        ];
        assert_eq!(talk_time_ratio(&transcript), 0.75);
    }

    #[test]
    fn test_talk_time_ratio_bounds() {
        let all_trainee = vec![msg("user", "x"), msg("user", "y")];
        let none_trainee = vec![msg("client", "x")];
        assert_eq!(talk_time_ratio(&all_trainee), 1.0);
        assert_eq!(talk_time_ratio(&none_trainee), 0.0);
    }

    #[test]
    fn test_filler_words_word_boundaries() {
        // "umbrella" and "unlike" must not count
        let transcript = vec![msg("user", "Um, I took my umbrella, unlike you know who")];
        // "Um" + "you know"
        assert_eq!(filler_words_count(&transcript), 2);
    }

    #[test]
    fn test_filler_multi_word_and_punctuated() {
        let transcript = vec![
            msg("user", "It is sort of expensive, right? I mean, basically fine"),
        ];
        // "sort of", "right?", "i mean", "basically"
        assert_eq!(filler_words_count(&transcript), 4);
    }

    #[test]
    fn test_filler_overlaps_not_deduplicated() {
        // "kind of like" → "kind of" and "like" both count
        let transcript = vec![msg("user", "it was kind of like that")];
        assert_eq!(filler_words_count(&transcript), 2);
    }

    #[test]
    fn test_filler_count_monotone_under_concatenation() {
        let first = vec![msg("user", "um so basically yes")];
        let mut combined = first.clone();
        combined.push(msg("client", "uh huh, like I said"));
        assert!(filler_words_count(&combined) >= filler_words_count(&first));
    }

    #[test]
    fn test_messages_joined_with_space_for_phrase_matching() {
        // "you" ends one message and "know" starts the next
        let transcript = vec![msg("user", "do you"), msg("user", "know")];
        assert_eq!(filler_words_count(&transcript), 1);
    }

    #[test]
    fn test_sentiment_ratio() {
        let transcript = vec![msg("client", "Great product, but the price is a problem")];
        assert_eq!(sentiment_score(&transcript), 0.5);

        let transcript = vec![msg("client", "Excellent, definitely interested. Not now though")];
        assert_eq!(sentiment_score(&transcript), 0.75);
    }

    #[test]
    fn test_sentiment_neutral_without_keywords() {
        let transcript = vec![msg("client", "The meeting is on Tuesday")];
        assert_eq!(sentiment_score(&transcript), 0.5);
    }

    #[test]
    fn test_sentiment_word_boundaries() {
        // "nothing", "note", "goodbye" must not match "no", "not", "good"
        let transcript = vec![msg("client", "nothing to note, goodbye")];
        assert_eq!(sentiment_score(&transcript), 0.5);
    }

    #[test]
    fn test_pace_zero_for_non_positive_duration() {
        let transcript = neutral_call();
        assert_eq!(speaking_pace_wpm(&transcript, None), 0);
        assert_eq!(speaking_pace_wpm(&transcript, Some(0.0)), 0);
        assert_eq!(speaking_pace_wpm(&transcript, Some(-30.0)), 0);
    }

    #[test]
    fn test_pace_rounding() {
        // 10 words in 30 seconds = 20 wpm
        let transcript = vec![msg("user", "one two three four five six seven eight nine ten")];
        assert_eq!(speaking_pace_wpm(&transcript, Some(30.0)), 20);
        // 10 words in 45 seconds = 13.33 → 13
        assert_eq!(speaking_pace_wpm(&transcript, Some(45.0)), 13);
    }
}
