//! Builds the collaborators named in the configuration and the controller
//! that owns them.

use std::sync::Arc;
use std::time::Duration;

use histochat_chat::{ChatController, VoicePipeline};
use histochat_core::config::{
    expand_home, EmbeddingConfig, EmbeddingProvider, GraphConfig, GraphProvider, LlmConfig,
    LlmProvider, SpeechProvider, VoiceAnswerPath,
};
use histochat_core::env::secret_from_env;
use histochat_core::{HistochatConfig, HistochatError};
use histochat_rag::{
    DirectResponder, DynEmbeddingService, GraphStore, HashingEmbedding, HuggingFaceEmbedding,
    InMemoryGraph, KnowledgeGraphChain, LanguageModel, Neo4jHttpStore, OfflineModel,
    OpenAiChatModel, QuestionChain,
};
use histochat_voice::{
    AudioStore, OfflineSpeechToText, OfflineTextToSpeech, OpenAiSpeechClient, SpeechToText,
    TextToSpeech,
};

pub fn build_graph(
    config: &GraphConfig,
    timeout: Duration,
) -> Result<Arc<dyn GraphStore>, HistochatError> {
    match config.provider {
        GraphProvider::Neo4j => {
            let password = secret_from_env(&config.password_env);
            if password.is_none() {
                tracing::warn!(var = %config.password_env, "Neo4j password not set");
            }
            let store = Neo4jHttpStore::new(
                &config.uri,
                &config.database,
                &config.username,
                password,
                timeout,
            )?;
            tracing::info!(uri = %config.uri, database = %config.database, "Using Neo4j graph");
            Ok(Arc::new(store))
        }
        GraphProvider::InMemory => {
            let graph = match &config.seed_path {
                Some(path) => InMemoryGraph::from_json_file(&expand_home(path))?,
                None => InMemoryGraph::sample()?,
            };
            tracing::info!(facts = graph.len(), "Using in-memory graph");
            Ok(Arc::new(graph))
        }
    }
}

pub fn build_embedder(
    config: &EmbeddingConfig,
    timeout: Duration,
) -> Result<Arc<dyn DynEmbeddingService>, HistochatError> {
    match config.provider {
        EmbeddingProvider::HuggingFace => {
            let service = HuggingFaceEmbedding::new(
                &config.api_base,
                &config.model,
                secret_from_env(&config.api_key_env),
                config.dimensions,
                timeout,
            )?;
            tracing::info!(model = %config.model, "Using HuggingFace embeddings");
            Ok(Arc::new(service))
        }
        EmbeddingProvider::Hashing => {
            tracing::info!(dimensions = config.dimensions, "Using hashing embeddings");
            Ok(Arc::new(HashingEmbedding::new(config.dimensions)))
        }
    }
}

pub fn build_model(
    config: &LlmConfig,
    timeout: Duration,
) -> Result<Arc<dyn LanguageModel>, HistochatError> {
    match config.provider {
        LlmProvider::OpenAi => {
            let api_key = secret_from_env(&config.api_key_env);
            if api_key.is_none() {
                tracing::warn!(var = %config.api_key_env, "Language model API key not set");
            }
            let model = OpenAiChatModel::new(
                &config.api_base,
                &config.model,
                api_key,
                config.temperature,
                config.max_tokens,
                timeout,
            )?;
            tracing::info!(model = %config.model, "Using OpenAI-compatible chat model");
            Ok(Arc::new(model))
        }
        LlmProvider::Offline => {
            tracing::info!("Using offline language model");
            Ok(Arc::new(OfflineModel))
        }
    }
}

/// Build the push-to-talk pipeline, or `None` when voice is disabled.
pub async fn build_voice(
    config: &HistochatConfig,
    model: Arc<dyn LanguageModel>,
    graph_chain: Arc<dyn QuestionChain>,
    timeout: Duration,
) -> Result<Option<VoicePipeline>, HistochatError> {
    let voice = &config.voice;
    if !voice.enabled {
        tracing::info!("Voice input disabled");
        return Ok(None);
    }

    let stt: Arc<dyn SpeechToText>;
    let tts: Arc<dyn TextToSpeech>;
    match voice.provider {
        SpeechProvider::OpenAi => {
            let client = Arc::new(OpenAiSpeechClient::new(
                voice,
                secret_from_env(&voice.api_key_env),
                timeout,
            )?);
            stt = client.clone();
            tts = client;
        }
        SpeechProvider::Offline => {
            stt = Arc::new(OfflineSpeechToText::new(voice.language.clone()));
            tts = Arc::new(OfflineTextToSpeech);
        }
    }

    let responder: Arc<dyn QuestionChain> = match voice.answer_path {
        VoiceAnswerPath::Direct => {
            Arc::new(DirectResponder::new(model, config.rag.system_prompt.clone()))
        }
        VoiceAnswerPath::Graph => graph_chain,
    };

    let ttl = Duration::from_secs(u64::from(voice.audio_ttl_minutes) * 60);
    let store = AudioStore::open(expand_home(&voice.audio_dir), ttl).await?;
    tracing::info!(
        stt = stt.name(),
        tts = tts.name(),
        audio_dir = %store.dir().display(),
        "Voice input enabled"
    );

    Ok(Some(VoicePipeline {
        stt,
        tts,
        responder,
        store: Arc::new(store),
        max_audio_bytes: voice.max_audio_bytes,
    }))
}

/// Build every collaborator and the chat controller.
pub async fn build_controller(config: &HistochatConfig) -> Result<ChatController, HistochatError> {
    let timeout = Duration::from_secs(config.server.request_timeout_secs);

    let graph = build_graph(&config.graph, timeout)?;
    let embedder = build_embedder(&config.embedding, timeout)?;
    let model = build_model(&config.llm, timeout)?;

    let chain: Arc<dyn QuestionChain> = Arc::new(KnowledgeGraphChain::new(
        graph,
        embedder,
        model.clone(),
        config.rag.clone(),
    ));
    let voice = build_voice(config, model, chain.clone(), timeout).await?;

    Ok(ChatController::new(config, chain, voice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn offline_config(audio_dir: &std::path::Path) -> HistochatConfig {
        let mut config = HistochatConfig::default();
        config.force_offline();
        config.voice.audio_dir = audio_dir.to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_in_memory_graph_from_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"[{"subject": "Akbar", "relation": "FOUNDED", "object": "Fatehpur Sikri"}]"#,
        )
        .unwrap();

        let config = GraphConfig {
            provider: GraphProvider::InMemory,
            seed_path: Some(file.path().to_string_lossy().to_string()),
            ..GraphConfig::default()
        };
        let graph = build_graph(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(graph.name(), "in-memory");
    }

    #[test]
    fn test_missing_seed_file_is_an_error() {
        let config = GraphConfig {
            provider: GraphProvider::InMemory,
            seed_path: Some("/definitely/not/here.json".to_string()),
            ..GraphConfig::default()
        };
        assert!(matches!(
            build_graph(&config, Duration::from_secs(1)),
            Err(HistochatError::Graph(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_controller_answers() {
        let tmp = tempfile::tempdir().unwrap();
        let config = offline_config(tmp.path());
        let controller = build_controller(&config).await.unwrap();
        assert!(controller.voice_enabled());

        let session = controller.create_session().unwrap();
        let exchange = controller
            .handle_text_question(session.id, "Where was Shivaji born?")
            .await
            .unwrap();
        assert!(exchange.answer.content.contains("Shivneri"));

        let spoken = controller
            .handle_voice_question(session.id, b"hello there", "text/plain")
            .await
            .unwrap();
        assert_eq!(spoken.download_name, "speech.wav");
    }

    #[tokio::test]
    async fn test_voice_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = offline_config(tmp.path());
        config.voice.enabled = false;
        let controller = build_controller(&config).await.unwrap();
        assert!(!controller.voice_enabled());
    }
}
