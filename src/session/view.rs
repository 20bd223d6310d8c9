use crate::settings::ReaderSettings;
use crate::speech::SpeechState;
use serde::Serialize;
use ts_rs::TS;

/// Everything the hosting surface renders.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReaderSnapshot {
    pub settings: ReaderSettings,
    pub progress: ProgressView,
    pub speech: SpeechView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProgressView {
    pub percentage: u8,
    pub auto_scrolling: bool,
    /// Auto-scroll is halted by a manual scroll and resumes on toggle.
    pub paused_by_user: bool,
    pub last_scroll_was_user: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SpeechView {
    pub state: SpeechState,
    pub current_chunk_index: usize,
    pub total_chunks: usize,
}
