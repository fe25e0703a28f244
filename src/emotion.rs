//! Scene mood guessed from clip filenames.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Sad,
    Happy,
    Tense,
    Calm,
    Angry,
    Neutral,
}

impl Emotion {
    /// Keyword emotions in tie-break order.
    pub const KEYWORDS: [Emotion; 5] = [
        Emotion::Sad,
        Emotion::Happy,
        Emotion::Tense,
        Emotion::Calm,
        Emotion::Angry,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Sad => "sad",
            Emotion::Happy => "happy",
            Emotion::Tense => "tense",
            Emotion::Calm => "calm",
            Emotion::Angry => "angry",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Count keyword hits across `filenames` (case-insensitive, at most one hit
/// per keyword per name) and return the most frequent emotion.
pub fn detect_emotion<'a, I>(filenames: I) -> Emotion
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = [0_usize; Emotion::KEYWORDS.len()];
    for name in filenames {
        let name = name.to_lowercase();
        for (count, emotion) in counts.iter_mut().zip(Emotion::KEYWORDS) {
            if name.contains(emotion.label()) {
                *count += 1;
            }
        }
    }

    let (best, count) = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best });
    if count == 0 {
        Emotion::Neutral
    } else {
        Emotion::KEYWORDS[best]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_frequent_keyword_wins() {
        let names = ["music_calm.wav", "dialogue_angry.wav", "sfx_calm_wind.wav"];
        assert_eq!(detect_emotion(names), Emotion::Calm);
    }

    #[test]
    fn ties_go_to_keyword_order() {
        assert_eq!(detect_emotion(["TENSE_hit.wav", "happy_theme.wav"]), Emotion::Happy);
    }

    #[test]
    fn no_keywords_is_neutral() {
        assert_eq!(detect_emotion(["dialogue_01.wav"]), Emotion::Neutral);
        assert_eq!(detect_emotion(std::iter::empty()), Emotion::Neutral);
    }

    #[test]
    fn one_name_can_hit_several_emotions() {
        let e = detect_emotion(["sad_and_angry.wav", "angry_end.wav"]);
        assert_eq!(e, Emotion::Angry);
        assert_eq!(e.to_string(), "angry");
    }
}
