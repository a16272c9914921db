//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides the keys it names.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ChatProvider
// ---------------------------------------------------------------------------

/// Selects which remote chat backend answers user queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatProvider {
    /// Google Gemini `generateContent` REST API (supports web grounding).
    Gemini,
    /// Any OpenAI-compatible `/v1/chat/completions` endpoint (OpenAI, Groq,
    /// Ollama, LM Studio …).  Never returns citations.
    OpenAiCompatible,
}

impl Default for ChatProvider {
    fn default() -> Self {
        Self::Gemini
    }
}

// ---------------------------------------------------------------------------
// ChatConfig
// ---------------------------------------------------------------------------

/// Default system instruction: a patient assistant for visually-impaired
/// users that answers concisely in Japanese and summarises real results when
/// asked about current events.
const DEFAULT_SYSTEM_INSTRUCTION: &str = "あなたは視覚に障がいのあるユーザーのための、親切で忍耐強いAIアシスタントです。回答は簡潔かつ明確に、日本語でお願いします。ユーザーが「今日のニュース」や特定のトピックに関する最新情報など、リアルタイムの情報や具体的な事実を尋ねた場合、単に質問の形式を繰り返すのではなく、実際に情報を検索し、具体的な内容を要約して提供してください。例えば、「今日のニュースは〇〇です」のようなプレースホルダーやテンプレートではなく、実際のニュースのヘッドラインや概要を述べるようにしてください。";

/// Settings for the remote chat service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Which backend to use.
    pub provider: ChatProvider,
    /// Base URL of the API endpoint.
    ///
    /// - Gemini: `https://generativelanguage.googleapis.com`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key.  When `None` or empty the environment is consulted, see
    /// [`ChatConfig::resolved_api_key`].
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Maximum seconds to wait for a reply before timing out.
    pub timeout_secs: u64,
    /// Ask the backend to ground replies with web search and return citations.
    pub web_grounding: bool,
    /// Fixed system instruction attached to every session.
    pub system_instruction: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatProvider::default(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            model: "gemini-2.5-flash".into(),
            temperature: 0.7,
            timeout_secs: 30,
            web_grounding: true,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.into(),
        }
    }
}

impl ChatConfig {
    /// Environment variables consulted, in order, when no key is configured.
    pub fn key_env_vars(&self) -> &'static [&'static str] {
        match self.provider {
            ChatProvider::Gemini => &["GEMINI_API_KEY", "API_KEY"],
            ChatProvider::OpenAiCompatible => &["OPENAI_API_KEY", "API_KEY"],
        }
    }

    /// The credential to use: the configured key when non-empty, otherwise
    /// the first non-empty environment variable from
    /// [`key_env_vars`](Self::key_env_vars).
    pub fn resolved_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as [`resolved_api_key`](Self::resolved_api_key) with an explicit
    /// environment lookup (useful for tests).
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
        self.key_env_vars()
            .iter()
            .filter_map(|name| lookup(name))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper-backed continuous recogniser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model file stem (`<models_dir>/ggml-<model>.bin`).
    pub model: String,
    /// Speech language as an ISO-639-1 code, or `"auto"`.
    pub language: String,
    /// RMS threshold above which a 30 ms frame counts as speech.
    pub vad_threshold: f32,
    /// Silence (ms) after speech that finalises the current phrase.
    pub phrase_end_ms: u64,
    /// Interval (ms) between interim transcriptions while speech continues.
    pub interim_interval_ms: u64,
    /// Seconds without any speech after which the recogniser gives up.
    pub no_speech_timeout_secs: u64,
    /// Hard cap on a single phrase; longer speech is finalised early.
    pub max_phrase_secs: f32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "small".into(),
            language: "ja".into(),
            vad_threshold: 0.01,
            phrase_end_ms: 700,
            interim_interval_ms: 800,
            no_speech_timeout_secs: 8,
            max_phrase_secs: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the process-backed speech synthesiser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Synthesiser executable: `espeak-ng`, `espeak` or `say` (macOS).
    pub program: String,
    /// BCP-47 language tag of the spoken output.
    pub language: String,
    /// Explicit voice name; `None` picks one automatically.
    pub voice: Option<String>,
    /// Speaking rate in words per minute.
    pub rate: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".into(),
            language: "ja-JP".into(),
            voice: None,
            rate: 175,
        }
    }
}

// ---------------------------------------------------------------------------
// InteractionConfig
// ---------------------------------------------------------------------------

/// Timing and matching knobs of the interaction controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Quiet period after the last transcript update before it is acted on.
    pub debounce_ms: u64,
    /// Delay between the end of a prompt and restarting capture, so the
    /// recogniser does not hear the prompt itself.
    pub capture_restart_delay_ms: u64,
    /// Case-insensitive substrings that mark a capture error as a
    /// microphone permission / hardware failure.
    pub device_error_patterns: Vec<String>,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            capture_restart_delay_ms: 150,
            device_error_patterns: [
                "microphone",
                "denied",
                "not-allowed",
                "audio-capture",
                "マイク",
                "音声キャプチャ",
                "拒否",
                "許可されていません",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandConfig
// ---------------------------------------------------------------------------

/// The spoken control vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub wake: String,
    pub sleep: String,
    pub sleep_alt: String,
    pub repeat: String,
    pub repeat_alt: String,
    pub end_session: String,
    pub end_session_alt: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            wake: "起動".into(),
            sleep: "スリープ".into(),
            sleep_alt: "ストップ".into(),
            repeat: "もう一度".into(),
            repeat_alt: "繰り返して".into(),
            end_session: "終了".into(),
            end_session_alt: "さようなら".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Status lines, chat notices and spoken prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub booting: String,
    pub welcome: String,
    pub mic_on: String,
    pub sleeping: String,
    pub sleep_confirmation: String,
    pub session_ended: String,
    pub processing: String,
    pub speaking: String,
    pub generating: String,
    pub remote_error: String,
    pub no_response: String,
    pub empty_response: String,
    pub nothing_to_repeat: String,
    pub speech_unsupported: String,
    pub microphone_error: String,
    pub no_api_key: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            booting: "初期化中...".into(),
            welcome: "タップして会話を開始してください。".into(),
            mic_on: "マイクオン。話し終えたらタップしてください。".into(),
            sleeping: "聞き取りが停止しました。タップして再開してください。".into(),
            sleep_confirmation: "わかりました、聞き取りを停止します。".into(),
            session_ended:
                "セッションが終了しました。新しいセッションを開始するにはタップしてください。"
                    .into(),
            processing: "リクエストを処理中です...".into(),
            speaking: "応答を読み上げています...".into(),
            generating: "AIが応答を生成中です...".into(),
            remote_error:
                "申し訳ありません、AIとの接続で問題が発生しました。もう一度お試しください。".into(),
            no_response: "AIから応答がありませんでした。".into(),
            empty_response: "AIからの応答が空でした。".into(),
            nothing_to_repeat: "繰り返す内容がありません。".into(),
            speech_unsupported: "この環境では音声コマンドがサポートされていません。マイクと音声合成エンジンを確認してください。".into(),
            microphone_error: "マイクにアクセスできませんでした。権限を確認してください。".into(),
            no_api_key: "APIキーが設定されていません。アプリケーションは機能できません。".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Whether the global hotkey listener is started at all.
    pub enabled: bool,
    /// Key that acts as the single "tap" button (e.g. `"F9"`).
    pub tap_key: String,
    /// Key that toggles suspend / resume (backgrounding).
    pub suspend_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tap_key: "F9".into(),
            suspend_key: "F10".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial window position `(x, y)`.  `None` lets the window manager
    /// decide.
    pub window_position: Option<(f32, f32)>,
    /// Initial inner size `(width, height)`.
    pub window_size: (f32, f32),
    /// Keep the window above all other windows.
    pub always_on_top: bool,
    /// Side length of the round action button.
    pub button_size: f32,
    /// TTF/OTF font with Japanese glyphs, tried before egui's built-in fonts.
    pub font_path: Option<PathBuf>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            window_size: (420.0, 720.0),
            always_on_top: false,
            button_size: 220.0,
            font_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_chat::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote chat service settings.
    pub chat: ChatConfig,
    /// Continuous recogniser settings.
    pub stt: SttConfig,
    /// Speech synthesiser settings.
    pub tts: TtsConfig,
    /// Controller timing and error matching.
    pub interaction: InteractionConfig,
    /// Spoken control vocabulary.
    pub commands: CommandConfig,
    /// Prompts and notices.
    pub messages: Messages,
    /// Global hotkey bindings.
    pub hotkey: HotkeyConfig,
    /// Window appearance.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
