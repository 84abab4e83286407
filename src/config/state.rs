// src/config/state.rs
use super::options::AppOptions;
use crate::record::SourceId;

/// What the central panel shows for the active source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Snapshot,
    Diff,
}

#[derive(Clone, Debug)]
pub struct GuiState {
    /// Active source tab
    pub source: SourceId,
    pub view: View,

    /// Page bound typed into the crawl box
    pub pages: i64,

    pub window_w: u32,
    pub window_h: u32,
}

impl Default for GuiState {
    fn default() -> Self {
        Self {
            source: SourceId::Static,
            view: View::Snapshot,
            pages: crate::config::consts::DEFAULT_PAGES,
            window_w: 1100,
            window_h: 700,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub options: AppOptions,
    pub gui: GuiState,
}
