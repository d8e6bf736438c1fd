//! Chat session controller for histochat.
//!
//! Owns per-session chat histories, routes between the Home and Chat views,
//! and dispatches typed and spoken questions to the question chains.

pub mod controller;
pub mod error;
pub mod session;
pub mod view;

pub use controller::{ChatController, TextExchange, VoiceExchange, VoicePipeline};
pub use error::ChatError;
pub use session::{ChatSession, SessionManager, SessionSummary};
pub use view::{ChatPane, ChatView, HomeView, ImagePane, MenuView, PaneLayout, RenderedView};
