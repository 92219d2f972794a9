//! Inline stage directions embedded in narration text.
//!
//! Narration may contain tags such as `{nod}`, `{happy}` or `{wait:500}`.
//! [`parse_inline`] splits the text into alternating text and action tokens.
//! Only the closed set of [`Action`] names is recognised; any other brace
//! group stays in the text. Full-width braces are folded to ASCII and
//! zero-width characters are removed before matching.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Every stage direction the player understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Nod,
    Wave,
    WaveL,
    WaveR,
    PointL,
    PointR,
    Bow,
    LookSlide,
    LookAudience,
    Happy,
    Angry,
    Surprised,
    Neutral,
    Sad,
    Wait,
    Present,
    OpenArms,
    Emphasize,
    Agree,
    Disagree,
    Think,
}

impl Action {
    pub const ALL: [Action; 21] = [
        Action::Nod,
        Action::Wave,
        Action::WaveL,
        Action::WaveR,
        Action::PointL,
        Action::PointR,
        Action::Bow,
        Action::LookSlide,
        Action::LookAudience,
        Action::Happy,
        Action::Angry,
        Action::Surprised,
        Action::Neutral,
        Action::Sad,
        Action::Wait,
        Action::Present,
        Action::OpenArms,
        Action::Emphasize,
        Action::Agree,
        Action::Disagree,
        Action::Think,
    ];

    /// Tag name as written in scripts.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Nod => "nod",
            Action::Wave => "wave",
            Action::WaveL => "waveL",
            Action::WaveR => "waveR",
            Action::PointL => "pointL",
            Action::PointR => "pointR",
            Action::Bow => "bow",
            Action::LookSlide => "lookSlide",
            Action::LookAudience => "lookAudience",
            Action::Happy => "happy",
            Action::Angry => "angry",
            Action::Surprised => "surprised",
            Action::Neutral => "neutral",
            Action::Sad => "sad",
            Action::Wait => "wait",
            Action::Present => "present",
            Action::OpenArms => "openArms",
            Action::Emphasize => "emphasize",
            Action::Agree => "agree",
            Action::Disagree => "disagree",
            Action::Think => "think",
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.name() == name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recognised tag together with the exact text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTag {
    pub action: Action,
    pub duration_ms: Option<u32>,
    /// Matched source text, e.g. `{ wait : 0500 }`.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Action(ActionTag),
}

impl Token {
    /// Source text of this token; concatenating all tokens rebuilds the
    /// normalized input.
    pub fn source(&self) -> &str {
        match self {
            Token::Text(t) => t,
            Token::Action(tag) => &tag.raw,
        }
    }
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    let names = Action::ALL.map(|a| a.name()).join("|");
    Regex::new(&format!(r"\{{\s*({names})\s*(?::\s*([0-9]{{2,5}}))?\s*\}}"))
        .expect("inline action pattern is valid")
});

/// Fold full-width braces to ASCII and drop zero-width characters.
pub fn normalize_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .map(|c| match c {
            '\u{FF5B}' => '{',
            '\u{FF5D}' => '}',
            other => other,
        })
        .collect()
}

/// Lazy tokenizer over normalized narration text.
#[derive(Debug, Clone)]
pub struct InlineTokens {
    text: String,
    pos: usize,
    pending: Option<ActionTag>,
}

impl InlineTokens {
    /// The normalized text being tokenized.
    pub fn normalized(&self) -> &str {
        &self.text
    }
}

impl Iterator for InlineTokens {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(tag) = self.pending.take() {
            return Some(Token::Action(tag));
        }
        while self.pos < self.text.len() {
            let Some(caps) = TAG_RE.captures_at(&self.text, self.pos) else {
                let tail = self.text[self.pos..].to_string();
                self.pos = self.text.len();
                return Some(Token::Text(tail));
            };
            let whole = caps.get(0)?;
            let tag = ActionTag {
                action: Action::from_name(&caps[1])?,
                duration_ms: caps.get(2).and_then(|m| m.as_str().parse().ok()),
                raw: whole.as_str().to_string(),
            };
            let before = &self.text[self.pos..whole.start()];
            self.pos = whole.end();
            if before.is_empty() {
                return Some(Token::Action(tag));
            }
            let text = before.to_string();
            self.pending = Some(tag);
            return Some(Token::Text(text));
        }
        None
    }
}

/// Split narration into text and action tokens. Empty text runs are omitted.
pub fn parse_inline(input: &str) -> InlineTokens {
    InlineTokens {
        text: normalize_text(input),
        pos: 0,
        pending: None,
    }
}

static LEFTOVER_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}\n]{1,50}\}").expect("leftover tag pattern is valid"));

/// Text actually sent to speech synthesis: unrecognised brace groups are
/// dropped and the result trimmed.
pub fn speakable_text(text: &str) -> String {
    LEFTOVER_TAG_RE.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<Token> {
        parse_inline(input).collect()
    }

    fn action(action: Action, duration_ms: Option<u32>, raw: &str) -> Token {
        Token::Action(ActionTag {
            action,
            duration_ms,
            raw: raw.to_string(),
        })
    }

    #[test]
    fn plain_text_is_one_token() {
        assert_eq!(collect("Hello there."), vec![Token::Text("Hello there.".into())]);
        assert_eq!(
            collect("He\u{200B}llo\u{FEFF}"),
            vec![Token::Text("Hello".into())]
        );
        assert!(collect("").is_empty());
    }

    #[test]
    fn splits_text_and_actions() {
        assert_eq!(
            collect("Hello {nod} world{bow}"),
            vec![
                Token::Text("Hello ".into()),
                action(Action::Nod, None, "{nod}"),
                Token::Text(" world".into()),
                action(Action::Bow, None, "{bow}"),
            ]
        );
    }

    #[test]
    fn wait_with_duration() {
        assert_eq!(collect("{wait:500}"), vec![action(Action::Wait, Some(500), "{wait:500}")]);
        assert_eq!(
            collect("a{ wait : 01200 }b"),
            vec![
                Token::Text("a".into()),
                action(Action::Wait, Some(1200), "{ wait : 01200 }"),
                Token::Text("b".into()),
            ]
        );
    }

    #[test]
    fn out_of_grammar_durations_stay_literal() {
        assert_eq!(collect("{wait:5}"), vec![Token::Text("{wait:5}".into())]);
        assert_eq!(collect("{nod:123456}"), vec![Token::Text("{nod:123456}".into())]);
    }

    #[test]
    fn full_width_digits_are_not_durations() {
        assert_eq!(
            collect("a{nod:５００}b"),
            vec![Token::Text("a{nod:５００}b".into())]
        );
        assert_eq!(
            collect("{wait:٣٠٠}"),
            vec![Token::Text("{wait:٣٠٠}".into())]
        );
    }

    #[test]
    fn unknown_tags_are_text() {
        assert_eq!(collect("{dance} ok"), vec![Token::Text("{dance} ok".into())]);
    }

    #[test]
    fn longer_names_sharing_a_prefix() {
        assert_eq!(
            collect("{waveL}{wave}{waveR:900}"),
            vec![
                action(Action::WaveL, None, "{waveL}"),
                action(Action::Wave, None, "{wave}"),
                action(Action::WaveR, Some(900), "{waveR:900}"),
            ]
        );
    }

    #[test]
    fn full_width_braces_are_folded() {
        assert_eq!(
            collect("はい\u{FF5B}nod\u{FF5D}"),
            vec![Token::Text("はい".into()), action(Action::Nod, None, "{nod}")]
        );
    }

    #[test]
    fn tokens_rebuild_normalized_input() {
        let inputs = [
            "Hello {nod} and {dance}{wait:250}.",
            "\u{FF5B}happy\u{FF5D}x\u{200C}y{think:800}",
            "{{nod}}",
            "no tags",
        ];
        for input in inputs {
            let tokens = parse_inline(input);
            let normalized = tokens.normalized().to_string();
            let rebuilt: String = tokens.map(|t| t.source().to_string()).collect();
            assert_eq!(rebuilt, normalized, "input: {input}");
        }
    }

    #[test]
    fn parsing_is_repeatable() {
        let text = "One {nod} two {wait:300} three";
        assert_eq!(collect(text), collect(text));
    }

    #[test]
    fn action_names_round_trip() {
        for a in Action::ALL {
            assert_eq!(Action::from_name(a.name()), Some(a));
        }
        assert_eq!(Action::from_name("nop"), None);
    }

    #[test]
    fn speakable_text_drops_leftover_tags() {
        assert_eq!(speakable_text("  {dance} Hello "), "Hello");
        assert_eq!(speakable_text("{unknown}"), "");
    }
}
