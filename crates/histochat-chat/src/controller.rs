//! Chat controller: owns sessions, routes between views and dispatches
//! typed and spoken questions to the chains.

use std::sync::Arc;

use histochat_core::config::{HistochatConfig, MenuConfig, PersonaConfig};
use histochat_core::types::{ChatMessage, View};
use histochat_rag::QuestionChain;
use histochat_voice::{AudioArtifact, AudioStore, SpeechToText, TextToSpeech, VoiceError};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ChatError;
use crate::session::{ChatSession, SessionManager, SessionSummary};
use crate::view::{ChatView, HomeView, MenuView, RenderedView};

/// Collaborators of the push-to-talk path.
pub struct VoicePipeline {
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    /// Chain answering spoken questions.
    pub responder: Arc<dyn QuestionChain>,
    pub store: Arc<AudioStore>,
    pub max_audio_bytes: usize,
}

/// Outcome of a typed question: the two messages appended to history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextExchange {
    pub question: ChatMessage,
    pub answer: ChatMessage,
    pub history_len: usize,
}

/// Outcome of a spoken question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceExchange {
    pub question: String,
    pub response: String,
    pub audio: AudioArtifact,
    pub download_name: String,
}

pub struct ChatController {
    sessions: SessionManager,
    chain: Arc<dyn QuestionChain>,
    voice: Option<VoicePipeline>,
    persona: PersonaConfig,
    menu: MenuConfig,
    max_message_length: usize,
}

impl ChatController {
    /// Build a controller. `voice` is `None` when push-to-talk is disabled.
    pub fn new(
        config: &HistochatConfig,
        chain: Arc<dyn QuestionChain>,
        voice: Option<VoicePipeline>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(
                config.chat.session_timeout_minutes,
                config.menu.default_view,
            ),
            chain,
            voice,
            persona: config.persona.clone(),
            menu: config.menu.clone(),
            max_message_length: config.chat.max_message_length,
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice.is_some()
    }

    // -- Sessions --

    pub fn create_session(&self) -> Result<ChatSession, ChatError> {
        self.sessions.create()
    }

    pub fn end_session(&self, id: Uuid) -> Result<(), ChatError> {
        self.sessions.end(id)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, ChatError> {
        self.sessions.list()
    }

    pub fn history(&self, id: Uuid) -> Result<Vec<ChatMessage>, ChatError> {
        self.sessions.history(id)
    }

    // -- Views --

    pub fn menu(&self, selected: View) -> MenuView {
        MenuView::new(&self.menu, selected)
    }

    /// Static informational view. Never consults a chain.
    pub fn render_home(&self, id: Uuid) -> Result<HomeView, ChatError> {
        self.sessions.snapshot(id)?;
        Ok(HomeView::new(&self.persona, &self.menu))
    }

    /// Image pane plus chat pane with the session's history.
    pub fn render_chat(&self, id: Uuid) -> Result<ChatView, ChatError> {
        let history = self.sessions.history(id)?;
        Ok(ChatView::new(
            &self.persona,
            &self.menu,
            history,
            self.voice_enabled(),
        ))
    }

    /// Record `view` as the session's current view and render it.
    pub fn select_view(&self, id: Uuid, view: View) -> Result<RenderedView, ChatError> {
        let session = self.sessions.set_view(id, view)?;
        Ok(match view {
            View::Home => RenderedView::Home(HomeView::new(&self.persona, &self.menu)),
            View::Chat => RenderedView::Chat(ChatView::new(
                &self.persona,
                &self.menu,
                session.history,
                self.voice_enabled(),
            )),
        })
    }

    // -- Questions --

    /// Answer a typed question and append the pair to history.
    ///
    /// Nothing is appended when validation or the chain fails.
    pub async fn handle_text_question(
        &self,
        id: Uuid,
        question: &str,
    ) -> Result<TextExchange, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if question.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }

        let history = self.sessions.history(id)?;
        let answer = self.chain.ask(question, &history).await.map_err(|e| {
            error!(session = %id, error = %e, "Question chain failed");
            ChatError::Chain(e)
        })?;

        let question = ChatMessage::user(question);
        let answer = ChatMessage::assistant(answer);
        let history_len =
            self.sessions
                .append_exchange(id, question.clone(), answer.clone())?;
        info!(session = %id, history_len, "Answered typed question");
        Ok(TextExchange {
            question,
            answer,
            history_len,
        })
    }

    /// Transcribe, answer, synthesize and store a spoken question.
    ///
    /// History is read by the responder but never modified.
    pub async fn handle_voice_question(
        &self,
        id: Uuid,
        audio: &[u8],
        mime: &str,
    ) -> Result<VoiceExchange, ChatError> {
        let voice = self.voice.as_ref().ok_or(ChatError::VoiceDisabled)?;
        if audio.len() > voice.max_audio_bytes {
            return Err(VoiceError::AudioTooLarge {
                size: audio.len(),
                max: voice.max_audio_bytes,
            }
            .into());
        }
        let history = self.sessions.history(id)?;

        let transcription = voice.stt.transcribe(audio, mime).await.map_err(|e| {
            warn!(session = %id, stt = voice.stt.name(), error = %e, "Transcription failed");
            ChatError::Voice(e)
        })?;
        let question = transcription.text.trim().to_string();
        if question.is_empty() {
            return Err(ChatError::NoSpeech);
        }

        let response = voice.responder.ask(&question, &history).await.map_err(|e| {
            error!(session = %id, error = %e, "Voice responder failed");
            ChatError::Chain(e)
        })?;

        let speech = voice.tts.synthesize(&response).await.map_err(|e| {
            warn!(session = %id, tts = voice.tts.name(), error = %e, "Synthesis failed");
            ChatError::Voice(e)
        })?;
        let artifact = voice.store.save(&speech).await?;
        info!(
            session = %id,
            audio = %artifact.id,
            bytes = artifact.size,
            "Answered spoken question"
        );

        Ok(VoiceExchange {
            question,
            response,
            download_name: artifact.download_name(),
            audio: artifact,
        })
    }

    /// Stored speech for download.
    pub async fn audio(&self, audio_id: Uuid) -> Result<(AudioArtifact, Vec<u8>), ChatError> {
        let voice = self.voice.as_ref().ok_or(ChatError::VoiceDisabled)?;
        Ok(voice.store.load(audio_id).await?)
    }

    /// Drop expired sessions and audio. Returns `(sessions, audio files)` removed.
    pub async fn purge_expired(&self) -> Result<(usize, usize), ChatError> {
        let sessions = self.sessions.purge_expired()?;
        let audio = match &self.voice {
            Some(voice) => voice.store.purge_expired().await?,
            None => 0,
        };
        Ok((sessions, audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use histochat_core::types::ChatRole;
    use histochat_rag::RagError;
    use histochat_voice::{
        AudioFormat, OfflineTextToSpeech, SynthesizedSpeech, Transcription,
    };

    /// Answers every question with a fixed reply and records what it saw.
    struct StubChain {
        reply: String,
        calls: AtomicUsize,
        seen_history: Mutex<Vec<usize>>,
    }

    impl StubChain {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                seen_history: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuestionChain for StubChain {
        async fn ask(&self, _question: &str, history: &[ChatMessage]) -> Result<String, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_history.lock().unwrap().push(history.len());
            Ok(self.reply.clone())
        }
    }

    struct FailingChain;

    #[async_trait]
    impl QuestionChain for FailingChain {
        async fn ask(&self, _: &str, _: &[ChatMessage]) -> Result<String, RagError> {
            Err(RagError::Llm("upstream 500".to_string()))
        }
    }

    struct StubStt(&'static str);

    #[async_trait]
    impl SpeechToText for StubStt {
        fn name(&self) -> &str {
            "stub"
        }

        async fn transcribe(&self, _: &[u8], _: &str) -> Result<Transcription, VoiceError> {
            Ok(Transcription {
                text: self.0.to_string(),
                language: "en".to_string(),
            })
        }
    }

    struct FailingTts;

    #[async_trait]
    impl TextToSpeech for FailingTts {
        fn name(&self) -> &str {
            "failing"
        }

        async fn synthesize(&self, _: &str) -> Result<SynthesizedSpeech, VoiceError> {
            Err(VoiceError::Synthesis("quota exceeded".to_string()))
        }
    }

    struct Mp3Tts;

    #[async_trait]
    impl TextToSpeech for Mp3Tts {
        fn name(&self) -> &str {
            "mp3"
        }

        async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, VoiceError> {
            Ok(SynthesizedSpeech {
                bytes: text.as_bytes().to_vec(),
                format: AudioFormat::Mp3,
            })
        }
    }

    fn controller(chain: Arc<dyn QuestionChain>) -> ChatController {
        ChatController::new(&HistochatConfig::default(), chain, None)
    }

    async fn voice_controller(
        dir: &std::path::Path,
        stt: &'static str,
        tts: Arc<dyn TextToSpeech>,
        responder: Arc<dyn QuestionChain>,
    ) -> ChatController {
        let store = AudioStore::open(dir, Duration::from_secs(600)).await.unwrap();
        let voice = VoicePipeline {
            stt: Arc::new(StubStt(stt)),
            tts,
            responder,
            store: Arc::new(store),
            max_audio_bytes: 1024,
        };
        ChatController::new(&HistochatConfig::default(), StubChain::new("X"), Some(voice))
    }

    #[tokio::test]
    async fn test_history_alternates_for_n_questions() {
        let chain = StubChain::new("X");
        let ctrl = controller(chain.clone());
        let id = ctrl.create_session().unwrap().id;

        for n in 1..=5 {
            ctrl.handle_text_question(id, &format!("question {}", n))
                .await
                .unwrap();
            let history = ctrl.history(id).unwrap();
            assert_eq!(history.len(), 2 * n);
            for (i, msg) in history.iter().enumerate() {
                let expected = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
                assert_eq!(msg.role, expected);
            }
            assert_eq!(history[2 * n - 2].content, format!("question {}", n));
        }
        // The chain sees the history as it was before each question.
        assert_eq!(*chain.seen_history.lock().unwrap(), vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn test_stub_chain_history_contents() {
        let ctrl = controller(StubChain::new("X"));
        let id = ctrl.create_session().unwrap().id;
        ctrl.handle_text_question(id, "A").await.unwrap();
        ctrl.handle_text_question(id, "B").await.unwrap();

        let pairs: Vec<(ChatRole, String)> = ctrl
            .history(id)
            .unwrap()
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (ChatRole::User, "A".to_string()),
                (ChatRole::Assistant, "X".to_string()),
                (ChatRole::User, "B".to_string()),
                (ChatRole::Assistant, "X".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_question_appends_nothing() {
        let chain = StubChain::new("X");
        let ctrl = controller(chain.clone());
        let id = ctrl.create_session().unwrap().id;

        for blank in ["", "   ", "\n\t"] {
            let err = ctrl.handle_text_question(id, blank).await.unwrap_err();
            assert!(matches!(err, ChatError::EmptyMessage));
        }
        assert!(ctrl.history(id).unwrap().is_empty());
        assert_eq!(chain.calls(), 0);
    }

    #[tokio::test]
    async fn test_too_long_question_rejected() {
        let ctrl = controller(StubChain::new("X"));
        let id = ctrl.create_session().unwrap().id;
        let max = HistochatConfig::default().chat.max_message_length;

        let err = ctrl
            .handle_text_question(id, &"a".repeat(max + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(m) if m == max));
        assert!(ctrl.handle_text_question(id, &"a".repeat(max)).await.is_ok());
    }

    #[tokio::test]
    async fn test_chain_failure_appends_nothing() {
        let ctrl = controller(Arc::new(FailingChain));
        let id = ctrl.create_session().unwrap().id;
        let err = ctrl.handle_text_question(id, "Who?").await.unwrap_err();
        assert!(err.is_collaborator_failure());
        assert!(ctrl.history(id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let ctrl = controller(StubChain::new("X"));
        let id = Uuid::new_v4();
        assert!(matches!(
            ctrl.handle_text_question(id, "A").await,
            Err(ChatError::SessionNotFound(_))
        ));
        assert!(matches!(ctrl.render_home(id), Err(ChatError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_home_never_invokes_chain() {
        let chain = StubChain::new("X");
        let ctrl = controller(chain.clone());
        let id = ctrl.create_session().unwrap().id;

        let rendered = ctrl.select_view(id, View::Home).unwrap();
        assert_eq!(rendered.view(), View::Home);
        ctrl.render_home(id).unwrap();
        assert_eq!(chain.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_renders_without_prior_question() {
        let chain = StubChain::new("X");
        let ctrl = controller(chain.clone());
        let id = ctrl.create_session().unwrap().id;

        match ctrl.select_view(id, View::Chat).unwrap() {
            RenderedView::Chat(view) => {
                assert!(view.chat.messages.is_empty());
                assert!(!view.chat.voice_enabled);
            }
            other => panic!("expected chat view, got {:?}", other),
        }
        assert_eq!(chain.calls(), 0);
        assert_eq!(ctrl.list_sessions().unwrap()[0].current_view, View::Chat);
    }

    #[tokio::test]
    async fn test_views_switch_both_ways() {
        let ctrl = controller(StubChain::new("X"));
        let id = ctrl.create_session().unwrap().id;
        ctrl.handle_text_question(id, "A").await.unwrap();

        assert_eq!(ctrl.select_view(id, View::Chat).unwrap().view(), View::Chat);
        assert_eq!(ctrl.select_view(id, View::Home).unwrap().view(), View::Home);
        assert_eq!(ctrl.render_chat(id).unwrap().chat.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_voice_path_produces_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl = voice_controller(
            tmp.path(),
            "hello",
            Arc::new(OfflineTextToSpeech),
            StubChain::new("hi"),
        )
        .await;
        let id = ctrl.create_session().unwrap().id;

        let exchange = ctrl
            .handle_voice_question(id, b"opus-bytes", "audio/webm")
            .await
            .unwrap();
        assert_eq!(exchange.question, "hello");
        assert_eq!(exchange.response, "hi");
        assert!(exchange.audio.path.exists());
        assert!(exchange.audio.size > 0);

        let (artifact, bytes) = ctrl.audio(exchange.audio.id).await.unwrap();
        assert_eq!(artifact.id, exchange.audio.id);
        assert_eq!(bytes.len(), artifact.size);
        // Voice exchanges leave the typed history alone.
        assert!(ctrl.history(id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_voice_download_name_is_speech_mp3() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl =
            voice_controller(tmp.path(), "hello", Arc::new(Mp3Tts), StubChain::new("hi")).await;
        let id = ctrl.create_session().unwrap().id;
        let exchange = ctrl
            .handle_voice_question(id, b"x", "audio/webm")
            .await
            .unwrap();
        assert_eq!(exchange.download_name, "speech.mp3");
    }

    #[tokio::test]
    async fn test_concurrent_voice_requests_get_distinct_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl = Arc::new(
            voice_controller(tmp.path(), "hello", Arc::new(Mp3Tts), StubChain::new("hi")).await,
        );
        let id = ctrl.create_session().unwrap().id;

        let a = {
            let ctrl = ctrl.clone();
            tokio::spawn(async move { ctrl.handle_voice_question(id, b"1", "audio/webm").await })
        };
        let b = {
            let ctrl = ctrl.clone();
            tokio::spawn(async move { ctrl.handle_voice_question(id, b"2", "audio/webm").await })
        };
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_ne!(a.audio.id, b.audio.id);
        assert_ne!(a.audio.path, b.audio.path);
    }

    #[tokio::test]
    async fn test_voice_no_speech() {
        let tmp = tempfile::tempdir().unwrap();
        let responder = StubChain::new("hi");
        let ctrl =
            voice_controller(tmp.path(), "   ", Arc::new(Mp3Tts), responder.clone()).await;
        let id = ctrl.create_session().unwrap().id;
        let err = ctrl
            .handle_voice_question(id, b"x", "audio/webm")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NoSpeech));
        assert_eq!(responder.calls(), 0);
    }

    #[tokio::test]
    async fn test_voice_synthesis_failure_is_collaborator_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl =
            voice_controller(tmp.path(), "hello", Arc::new(FailingTts), StubChain::new("hi"))
                .await;
        let id = ctrl.create_session().unwrap().id;
        let err = ctrl
            .handle_voice_question(id, b"x", "audio/webm")
            .await
            .unwrap_err();
        assert!(err.is_collaborator_failure());
    }

    #[tokio::test]
    async fn test_voice_upload_too_large() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl =
            voice_controller(tmp.path(), "hello", Arc::new(Mp3Tts), StubChain::new("hi")).await;
        let id = ctrl.create_session().unwrap().id;
        let err = ctrl
            .handle_voice_question(id, &[0u8; 2048], "audio/webm")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::Voice(VoiceError::AudioTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_voice_disabled() {
        let ctrl = controller(StubChain::new("X"));
        let id = ctrl.create_session().unwrap().id;
        assert!(matches!(
            ctrl.handle_voice_question(id, b"x", "audio/webm").await,
            Err(ChatError::VoiceDisabled)
        ));
        assert!(matches!(
            ctrl.audio(Uuid::new_v4()).await,
            Err(ChatError::VoiceDisabled)
        ));
    }

    #[tokio::test]
    async fn test_end_session_and_purge() {
        let ctrl = controller(StubChain::new("X"));
        let id = ctrl.create_session().unwrap().id;
        ctrl.end_session(id).unwrap();
        assert!(ctrl.list_sessions().unwrap().is_empty());
        assert_eq!(ctrl.purge_expired().await.unwrap(), (0, 0));
    }
}
