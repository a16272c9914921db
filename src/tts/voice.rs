//! Voice catalogue parsing and selection.
//!
//! Selection order: a voice for the target language that looks feminine,
//! then any voice for the target language, then `None` (engine default).
//! Languages are compared on their primary subtag, so `ja-JP`, `ja_JP` and
//! `ja` all match.

/// Name fragments that mark a voice as feminine when the engine does not
/// report a gender.
const FEMININE_NAMES: &[&str] = &[
    "female", "kyoko", "o-ren", "ayumi", "haruka", "misaki", "nanami", "sumire",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

/// One entry of a synthesiser's voice catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Identifier passed back to the engine (`-v <id>`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Language tag as reported by the engine.
    pub language: String,
    pub gender: Option<Gender>,
}

impl Voice {
    pub fn is_feminine(&self) -> bool {
        if self.gender == Some(Gender::Female) {
            return true;
        }
        let name = self.name.to_lowercase();
        FEMININE_NAMES.iter().any(|n| name.contains(n))
    }

    pub fn speaks(&self, language: &str) -> bool {
        primary_subtag(&self.language) == primary_subtag(language)
    }
}

/// Lower-cased primary subtag of a BCP-47-ish tag (`ja_JP` → `ja`).
pub fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Pick the best voice for `language`, or `None` to use the engine default.
pub fn select_voice<'a>(voices: &'a [Voice], language: &str) -> Option<&'a Voice> {
    voices
        .iter()
        .find(|v| v.speaks(language) && v.is_feminine())
        .or_else(|| voices.iter().find(|v| v.speaks(language)))
}

// ---------------------------------------------------------------------------
// Catalogue parsers
// ---------------------------------------------------------------------------

/// Parse `espeak-ng --voices` output:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  ja              --/M      Japanese           jpx/ja
/// ```
pub fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let gender = match cols[2].rsplit('/').next() {
                Some("F") => Some(Gender::Female),
                Some("M") => Some(Gender::Male),
                _ => None,
            };
            Some(Voice {
                id: cols.get(4).unwrap_or(&cols[3]).to_string(),
                name: cols[3].to_string(),
                language: cols[1].to_string(),
                gender,
            })
        })
        .collect()
}

/// Parse macOS `say -v '?'` output:
///
/// ```text
/// Kyoko               ja_JP    # こんにちは、私の名前はKyokoです。
/// ```
pub fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, language) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || language.is_empty() {
                return None;
            }
            Some(Voice {
                id: name.to_string(),
                name: name.to_string(),
                language: language.to_string(),
                gender: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, language: &str, gender: Option<Gender>) -> Voice {
        Voice {
            id: name.into(),
            name: name.into(),
            language: language.into(),
            gender,
        }
    }

    #[test]
    fn feminine_language_match_wins() {
        let voices = vec![
            voice("Otoya", "ja_JP", None),
            voice("Samantha", "en_US", None),
            voice("Kyoko", "ja_JP", None),
        ];
        assert_eq!(select_voice(&voices, "ja-JP").map(|v| v.name.as_str()), Some("Kyoko"));
    }

    #[test]
    fn any_language_match_is_second_choice() {
        let voices = vec![voice("Samantha", "en_US", None), voice("Otoya", "ja_JP", None)];
        assert_eq!(select_voice(&voices, "ja-JP").map(|v| v.name.as_str()), Some("Otoya"));
    }

    #[test]
    fn no_language_match_uses_engine_default() {
        let voices = vec![voice("Haruka-like", "en_US", Some(Gender::Female))];
        assert!(select_voice(&voices, "ja-JP").is_none());
        assert!(select_voice(&[], "ja-JP").is_none());
    }

    #[test]
    fn gender_flag_counts_as_feminine() {
        assert!(voice("Generic", "ja", Some(Gender::Female)).is_feminine());
        assert!(!voice("Generic", "ja", Some(Gender::Male)).is_feminine());
        assert!(voice("Microsoft Nanami Online", "ja-JP", None).is_feminine());
    }

    #[test]
    fn primary_subtag_normalises_separators() {
        assert_eq!(primary_subtag("ja_JP"), "ja");
        assert_eq!(primary_subtag("JA-jp"), "ja");
        assert_eq!(primary_subtag("en"), "en");
    }

    #[test]
    fn espeak_catalogue_is_parsed() {
        let out = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
                   5  ja              --/M      Japanese           jpx/ja\n \
                   5  en-us           --/F      English_(America)  gmw/en-US           (en 2)\n";
        let voices = parse_espeak_voices(out);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].id, "jpx/ja");
        assert_eq!(voices[0].language, "ja");
        assert_eq!(voices[0].gender, Some(Gender::Male));
        assert_eq!(voices[1].gender, Some(Gender::Female));
    }

    #[test]
    fn say_catalogue_is_parsed_with_spaced_names() {
        let out = "Kyoko               ja_JP    # こんにちは、私の名前はKyokoです。\n\
                   Eddy (German (Germany)) de_DE    # Hallo!\n";
        let voices = parse_say_voices(out);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].name, "Kyoko");
        assert_eq!(voices[0].language, "ja_JP");
        assert_eq!(voices[1].name, "Eddy (German (Germany))");
        assert_eq!(voices[1].language, "de_DE");
    }
}
