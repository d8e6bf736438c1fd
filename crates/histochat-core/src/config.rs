use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HistochatError, Result};
use crate::types::View;

/// Top-level configuration for histochat.
///
/// Loaded from `~/.histochat/config.toml` by default. Every section has
/// defaults, so an empty file (or no file) yields a runnable configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistochatConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub menu: MenuConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl HistochatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HistochatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HistochatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Switch every collaborator to its in-process implementation.
    pub fn force_offline(&mut self) {
        self.graph.provider = GraphProvider::InMemory;
        self.llm.provider = LlmProvider::Offline;
        self.embedding.provider = EmbeddingProvider::Hashing;
        self.voice.provider = SpeechProvider::Offline;
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// Called once at startup; the server refuses to start on failure.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(invalid("server.request_timeout_secs must be non-zero"));
        }
        if self.chat.max_message_length == 0 {
            return Err(invalid("chat.max_message_length must be non-zero"));
        }
        if self.chat.session_timeout_minutes == 0 {
            return Err(invalid("chat.session_timeout_minutes must be non-zero"));
        }
        if self.rag.top_k == 0 {
            return Err(invalid("rag.top_k must be non-zero"));
        }
        if self.rag.candidate_limit < self.rag.top_k {
            return Err(invalid("rag.candidate_limit must be >= rag.top_k"));
        }
        if !(-1.0..=1.0).contains(&self.rag.min_similarity) {
            return Err(invalid("rag.min_similarity must be within [-1, 1]"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid("llm.temperature must be within [0, 2]"));
        }
        if self.embedding.dimensions == 0 {
            return Err(invalid("embedding.dimensions must be non-zero"));
        }
        if self.voice.enabled && self.voice.max_audio_bytes == 0 {
            return Err(invalid("voice.max_audio_bytes must be non-zero"));
        }
        self.menu.validate()?;
        self.theme.validate()?;
        Ok(())
    }
}

fn invalid(msg: &str) -> HistochatError {
    HistochatError::Config(msg.to_string())
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Timeout applied to every outbound collaborator request.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            log_level: "info".to_string(),
            request_timeout_secs: 60,
        }
    }
}

// =============================================================================
// Persona (static page content)
// =============================================================================

/// Who the assistant talks about, and the copy shown on each view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Page title shown above the menu.
    pub title: String,
    pub figure_name: String,
    /// Heading of the Home view's info section.
    pub heading: String,
    pub description: Vec<String>,
    pub hint: String,
    pub image_url: String,
    pub image_caption: String,
    pub input_placeholder: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            title: "Chat With Me On Chhatrapati Shivaji Maharaj".to_string(),
            figure_name: "Chhatrapati Shivaji Maharaj".to_string(),
            heading: "Chhatrapati Shivaji Maharaj AI Chatbot".to_string(),
            description: vec![
                "This chatbot is dedicated to providing information about the life, \
                 achievements, and legacy of Chhatrapati Shivaji Maharaj. Feel free to ask \
                 any questions related to his history, military strategies, governance, \
                 and more."
                    .to_string(),
            ],
            hint: "Use the Chat option in the menu to start interacting with the chatbot."
                .to_string(),
            image_url: "https://img.freepik.com/premium-vector/shivaji-maharaj-shaniwar-wada-fort-maharashtra-vector_1076263-676.jpg".to_string(),
            image_caption: "Chhatrapati Shivaji Maharaj".to_string(),
            input_placeholder: "Ask a question to the document assistant".to_string(),
        }
    }
}

// =============================================================================
// Theme
// =============================================================================

/// Colors for one kind of chat bubble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BubbleStyle {
    pub background: String,
    pub text: String,
}

/// Declarative page theme.
///
/// Only the fields listed here are recognized; unknown keys are rejected at
/// load time so a typo cannot silently fall back to a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    pub background_image_url: String,
    pub text_color: String,
    pub heading_color: String,
    pub info_heading_color: String,
    pub info_text_color: String,
    pub input_border_color: String,
    pub border_radius_px: u16,
    pub user_bubble: BubbleStyle,
    pub assistant_bubble: BubbleStyle,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            background_image_url: "https://imgcdn.stablediffusionweb.com/2024/4/7/5f283b4a-5ef3-4a3a-8386-f3a1e812a324.jpg".to_string(),
            text_color: "white".to_string(),
            heading_color: "white".to_string(),
            info_heading_color: "orange".to_string(),
            info_text_color: "white".to_string(),
            input_border_color: "#b0bec5".to_string(),
            border_radius_px: 10,
            user_bubble: BubbleStyle {
                background: "#e3f2fd".to_string(),
                text: "black".to_string(),
            },
            assistant_bubble: BubbleStyle {
                background: "black".to_string(),
                text: "white".to_string(),
            },
        }
    }
}

impl ThemeConfig {
    fn validate(&self) -> Result<()> {
        let colors = [
            ("theme.text_color", &self.text_color),
            ("theme.heading_color", &self.heading_color),
            ("theme.info_heading_color", &self.info_heading_color),
            ("theme.info_text_color", &self.info_text_color),
            ("theme.input_border_color", &self.input_border_color),
            ("theme.user_bubble.background", &self.user_bubble.background),
            ("theme.user_bubble.text", &self.user_bubble.text),
            (
                "theme.assistant_bubble.background",
                &self.assistant_bubble.background,
            ),
            ("theme.assistant_bubble.text", &self.assistant_bubble.text),
        ];
        for (field, value) in colors {
            if !is_css_color(value) {
                return Err(HistochatError::Config(format!(
                    "{} is not a recognized color: '{}'",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

/// Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb(...)`, `rgba(...)`
/// and bare named colors.
pub fn is_css_color(value: &str) -> bool {
    let v = value.trim();
    if let Some(hex) = v.strip_prefix('#') {
        return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    let lower = v.to_ascii_lowercase();
    if lower.starts_with("rgb(") || lower.starts_with("rgba(") {
        return lower.ends_with(')');
    }
    !v.is_empty() && v.chars().all(|c| c.is_ascii_alphabetic())
}

// =============================================================================
// Menu
// =============================================================================

/// Menu layout direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuOrientation {
    Horizontal,
    Vertical,
}

/// One entry of the navigation menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuItem {
    pub view: View,
    pub label: String,
    pub icon: String,
}

/// Menu styling knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MenuStyles {
    pub container_padding_px: u16,
    pub icon_color: String,
    pub icon_font_size_px: u16,
    pub link_color: String,
    pub link_font_size_px: u16,
    pub selected_background: String,
    pub selected_color: String,
}

impl Default for MenuStyles {
    fn default() -> Self {
        Self {
            container_padding_px: 15,
            icon_color: "gray".to_string(),
            icon_font_size_px: 18,
            link_color: "orange".to_string(),
            link_font_size_px: 16,
            selected_background: "grey".to_string(),
            selected_color: "white".to_string(),
        }
    }
}

/// Declarative navigation menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MenuConfig {
    pub title: String,
    pub icon: String,
    pub orientation: MenuOrientation,
    pub default_view: View,
    pub items: Vec<MenuItem>,
    pub styles: MenuStyles,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            title: "Main Menu".to_string(),
            icon: "cast".to_string(),
            orientation: MenuOrientation::Horizontal,
            default_view: View::Home,
            items: vec![
                MenuItem {
                    view: View::Home,
                    label: "Home".to_string(),
                    icon: "house".to_string(),
                },
                MenuItem {
                    view: View::Chat,
                    label: "Chat".to_string(),
                    icon: "chat".to_string(),
                },
            ],
            styles: MenuStyles::default(),
        }
    }
}

impl MenuConfig {
    fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(invalid("menu.items must not be empty"));
        }
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.label.trim().is_empty() {
                return Err(invalid("menu.items labels must not be empty"));
            }
            if !seen.insert(item.view) {
                return Err(HistochatError::Config(format!(
                    "menu.items lists view '{}' more than once",
                    item.view
                )));
            }
        }
        if !seen.contains(&self.default_view) {
            return Err(HistochatError::Config(format!(
                "menu.default_view '{}' is not one of menu.items",
                self.default_view
            )));
        }
        for (field, value) in [
            ("menu.styles.icon_color", &self.styles.icon_color),
            ("menu.styles.link_color", &self.styles.link_color),
            ("menu.styles.selected_background", &self.styles.selected_background),
            ("menu.styles.selected_color", &self.styles.selected_color),
        ] {
            if !is_css_color(value) {
                return Err(HistochatError::Config(format!(
                    "{} is not a recognized color: '{}'",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Chat sessions
// =============================================================================

/// Chat session limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum question length in characters.
    pub max_message_length: usize,
    /// Idle minutes after which a session is discarded.
    pub session_timeout_minutes: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            session_timeout_minutes: 60,
        }
    }
}

// =============================================================================
// Retrieval-augmented generation
// =============================================================================

/// Knowledge-graph chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Facts kept after similarity ranking.
    pub top_k: usize,
    /// Facts fetched from the graph before ranking.
    pub candidate_limit: usize,
    /// Cosine similarity floor for a fact to be used as context.
    pub min_similarity: f32,
    /// Prior messages passed to the model with each question.
    pub history_turns: usize,
    /// Rewrite follow-up questions into standalone questions before retrieval.
    pub condense_question: bool,
    pub system_prompt: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            candidate_limit: 50,
            min_similarity: 0.05,
            history_turns: 6,
            condense_question: true,
            system_prompt: "You are a knowledgeable historian. Answer questions about \
                            Chhatrapati Shivaji Maharaj using the provided context. If the \
                            context does not contain the answer, say that you do not know."
                .to_string(),
        }
    }
}

/// Graph store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphProvider {
    Neo4j,
    InMemory,
}

/// Graph store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub provider: GraphProvider,
    /// Neo4j HTTP endpoint, e.g. `http://localhost:7474`.
    pub uri: String,
    pub database: String,
    pub username: String,
    /// Environment variable holding the Neo4j password.
    pub password_env: String,
    /// JSON file of facts loaded into the in-memory store.
    pub seed_path: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            provider: GraphProvider::Neo4j,
            uri: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password_env: "NEO4J_PASSWORD".to_string(),
            seed_path: None,
        }
    }
}

/// Language model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat-completions endpoint.
    OpenAi,
    Offline,
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_base: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 512,
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// HuggingFace Inference API feature extraction.
    HuggingFace,
    /// Feature-hashed bag of words, computed in process.
    Hashing,
}

/// Embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub api_base: String,
    pub model: String,
    pub api_key_env: String,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::HuggingFace,
            api_base: "https://api-inference.huggingface.co".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            api_key_env: "HF_API_TOKEN".to_string(),
            dimensions: 384,
        }
    }
}

// =============================================================================
// Voice
// =============================================================================

/// Speech backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechProvider {
    /// OpenAI-compatible `/audio/transcriptions` and `/audio/speech`.
    OpenAi,
    Offline,
}

/// Which chain answers spoken questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceAnswerPath {
    /// Plain language model call without retrieval or history.
    Direct,
    /// The knowledge-graph chain used for typed questions.
    Graph,
}

/// Push-to-talk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub provider: SpeechProvider,
    pub api_base: String,
    pub api_key_env: String,
    pub stt_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub language: String,
    /// Directory holding synthesized speech files.
    pub audio_dir: String,
    /// Largest accepted push-to-talk upload.
    pub max_audio_bytes: usize,
    /// Minutes a synthesized file stays downloadable.
    pub audio_ttl_minutes: u32,
    pub answer_path: VoiceAnswerPath,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: SpeechProvider::OpenAi,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            language: "en".to_string(),
            audio_dir: "~/.histochat/audio".to_string(),
            max_audio_bytes: 10 * 1024 * 1024,
            audio_ttl_minutes: 30,
            answer_path: VoiceAnswerPath::Direct,
        }
    }
}

// =============================================================================
// LangSmith tracing environment
// =============================================================================

/// What to do when `LANGSMITH_API_KEY` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LangsmithKeyPolicy {
    /// Export the literal string `"None"`.
    Preserve,
    /// Leave the variable absent.
    Unset,
    /// Refuse to start.
    Require,
}

/// LangSmith tracing variables exported at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub langsmith_key_policy: LangsmithKeyPolicy,
    pub tracing_v2: bool,
    pub endpoint: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            langsmith_key_policy: LangsmithKeyPolicy::Preserve,
            tracing_v2: true,
            endpoint: "https://api.smith.langchain.com".to_string(),
        }
    }
}
