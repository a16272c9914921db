use crate::config::CommandConfig;

/// Result of classifying one transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sleep,
    EndSession,
    Wake,
    Repeat,
    /// Not a command; the transcript is a query for the remote model.
    None,
}

/// Substring matcher over the configured vocabulary.
///
/// Matching is on the lower-cased, trimmed transcript, in priority order
/// sleep, end-session, wake, repeat.  Blank phrases never match.
#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    sleep: Vec<String>,
    end_session: Vec<String>,
    wake: Vec<String>,
    repeat: Vec<String>,
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

fn mentions(text: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|p| text.contains(p.as_str()))
}

impl CommandInterpreter {
    pub fn new(config: &CommandConfig) -> Self {
        Self {
            sleep: phrases(&[&config.sleep, &config.sleep_alt]),
            end_session: phrases(&[&config.end_session, &config.end_session_alt]),
            wake: phrases(&[&config.wake]),
            repeat: phrases(&[&config.repeat, &config.repeat_alt]),
        }
    }

    pub fn classify(&self, transcript: &str) -> Command {
        let text = transcript.trim().to_lowercase();
        if text.is_empty() {
            Command::None
        } else if mentions(&text, &self.sleep) {
            Command::Sleep
        } else if mentions(&text, &self.end_session) {
            Command::EndSession
        } else if mentions(&text, &self.wake) {
            Command::Wake
        } else if mentions(&text, &self.repeat) {
            Command::Repeat
        } else {
            Command::None
        }
    }

    /// Whether `transcript` contains a sleep, end-session or wake phrase.
    ///
    /// A handled transcript containing one of these is not remembered as
    /// processed, so saying the same command again is acted on again.
    pub fn mentions_lifecycle(&self, transcript: &str) -> bool {
        let text = transcript.trim().to_lowercase();
        mentions(&text, &self.sleep)
            || mentions(&text, &self.end_session)
            || mentions(&text, &self.wake)
    }
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new(&CommandConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> CommandInterpreter {
        CommandInterpreter::default()
    }

    #[test]
    fn plain_query_is_none() {
        assert_eq!(interp().classify("今日の天気を教えて"), Command::None);
        assert_eq!(interp().classify("   "), Command::None);
    }

    #[test]
    fn each_phrase_is_recognised() {
        let i = interp();
        assert_eq!(i.classify("スリープ"), Command::Sleep);
        assert_eq!(i.classify("ストップして"), Command::Sleep);
        assert_eq!(i.classify("終了"), Command::EndSession);
        assert_eq!(i.classify("じゃあ、さようなら"), Command::EndSession);
        assert_eq!(i.classify("起動"), Command::Wake);
        assert_eq!(i.classify("もう一度"), Command::Repeat);
        assert_eq!(i.classify("繰り返して"), Command::Repeat);
    }

    #[test]
    fn sleep_wins_over_everything() {
        assert_eq!(interp().classify("終了 スリープ 起動"), Command::Sleep);
        assert_eq!(interp().classify("起動して終了"), Command::EndSession);
        assert_eq!(interp().classify("起動してもう一度"), Command::Wake);
    }

    #[test]
    fn matching_ignores_case_and_padding() {
        let cfg = CommandConfig {
            wake: "Hello Bot".into(),
            ..CommandConfig::default()
        };
        let i = CommandInterpreter::new(&cfg);
        assert_eq!(i.classify("  well HELLO bot there "), Command::Wake);
    }

    #[test]
    fn blank_phrase_never_matches() {
        let cfg = CommandConfig {
            repeat_alt: "  ".into(),
            ..CommandConfig::default()
        };
        assert_eq!(CommandInterpreter::new(&cfg).classify("何か"), Command::None);
    }

    #[test]
    fn lifecycle_words_exclude_repeat() {
        let i = interp();
        assert!(i.mentions_lifecycle("スリープ"));
        assert!(i.mentions_lifecycle("終了"));
        assert!(i.mentions_lifecycle("起動"));
        assert!(!i.mentions_lifecycle("もう一度"));
        assert!(!i.mentions_lifecycle("こんにちは"));
    }
}
