//! View models for the Home and Chat views.
//!
//! These are plain serializable records; the browser client owns the
//! widgets and styling.

use histochat_core::config::{MenuConfig, MenuItem, MenuOrientation, PersonaConfig};
use histochat_core::types::{ChatMessage, View};
use serde::Serialize;

/// Width ratio of the image pane to the chat pane.
pub const IMAGE_PANE_RATIO: u8 = 1;
pub const CHAT_PANE_RATIO: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuView {
    pub title: String,
    pub icon: String,
    pub orientation: MenuOrientation,
    pub selected: View,
    pub items: Vec<MenuItem>,
}

impl MenuView {
    pub fn new(menu: &MenuConfig, selected: View) -> Self {
        Self {
            title: menu.title.clone(),
            icon: menu.icon.clone(),
            orientation: menu.orientation,
            selected,
            items: menu.items.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeView {
    pub title: String,
    pub heading: String,
    pub description: Vec<String>,
    pub hint: String,
    pub menu: MenuView,
}

impl HomeView {
    pub fn new(persona: &PersonaConfig, menu: &MenuConfig) -> Self {
        Self {
            title: persona.title.clone(),
            heading: persona.heading.clone(),
            description: persona.description.clone(),
            hint: persona.hint.clone(),
            menu: MenuView::new(menu, View::Home),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaneLayout {
    pub image: u8,
    pub chat: u8,
}

impl Default for PaneLayout {
    fn default() -> Self {
        Self {
            image: IMAGE_PANE_RATIO,
            chat: CHAT_PANE_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePane {
    pub url: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPane {
    pub messages: Vec<ChatMessage>,
    pub input_placeholder: String,
    pub voice_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatView {
    pub title: String,
    pub menu: MenuView,
    pub layout: PaneLayout,
    pub image: ImagePane,
    pub chat: ChatPane,
}

impl ChatView {
    pub fn new(
        persona: &PersonaConfig,
        menu: &MenuConfig,
        history: Vec<ChatMessage>,
        voice_enabled: bool,
    ) -> Self {
        Self {
            title: persona.title.clone(),
            menu: MenuView::new(menu, View::Chat),
            layout: PaneLayout::default(),
            image: ImagePane {
                url: persona.image_url.clone(),
                caption: persona.image_caption.clone(),
            },
            chat: ChatPane {
                messages: history,
                input_placeholder: persona.input_placeholder.clone(),
                voice_enabled,
            },
        }
    }
}

/// Result of selecting a view, tagged by view name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum RenderedView {
    Home(HomeView),
    Chat(ChatView),
}

impl RenderedView {
    pub fn view(&self) -> View {
        match self {
            RenderedView::Home(_) => View::Home,
            RenderedView::Chat(_) => View::Chat,
        }
    }
}
