//! Scroll surface the session drives.

use crate::progress::ScrollGeometry;
use crate::settings::ReaderSettings;
use anyhow::{Context, Result};
use std::io::Write;

pub trait Viewport {
    fn geometry(&self) -> ScrollGeometry;

    /// Move to `offset` (clamped) and report the resulting geometry, which
    /// the runtime feeds back as the scroll event.
    fn scroll_to(&mut self, offset: f32) -> Result<ScrollGeometry>;

    /// Re-layout for new display settings.
    fn apply_settings(&mut self, settings: &ReaderSettings) -> Result<ScrollGeometry>;
}

/// Headless viewport over plain text: one row per source line, each row
/// printed to `out` the first time it scrolls into view.
pub struct TextViewport<W> {
    rows: Vec<String>,
    row_height: f32,
    viewport_height: f32,
    offset: f32,
    revealed: usize,
    out: W,
}

impl<W: Write> TextViewport<W> {
    pub fn new(text: &str, viewport_height: f32, row_height: f32, out: W) -> Self {
        Self {
            rows: text.lines().map(str::to_string).collect(),
            row_height: row_height.max(1.0),
            viewport_height: viewport_height.max(1.0),
            offset: 0.0,
            revealed: 0,
            out,
        }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    fn content_height(&self) -> f32 {
        self.rows.len() as f32 * self.row_height
    }

    fn reveal(&mut self) -> Result<()> {
        let bottom = self.offset + self.viewport_height;
        let visible = ((bottom / self.row_height).ceil() as usize).min(self.rows.len());
        while self.revealed < visible {
            writeln!(self.out, "{}", self.rows[self.revealed]).context("Writing text row")?;
            self.revealed += 1;
        }
        self.out.flush().context("Flushing text output")
    }
}

impl<W: Write> Viewport for TextViewport<W> {
    fn geometry(&self) -> ScrollGeometry {
        ScrollGeometry::new(self.offset, self.content_height(), self.viewport_height)
    }

    fn scroll_to(&mut self, offset: f32) -> Result<ScrollGeometry> {
        self.offset = offset.clamp(0.0, self.geometry().max_offset());
        self.reveal()?;
        Ok(self.geometry())
    }

    fn apply_settings(&mut self, settings: &ReaderSettings) -> Result<ScrollGeometry> {
        let top_row = self.offset / self.row_height;
        self.row_height = (settings.font_size as f32 * settings.line_height).max(1.0);
        self.offset = (top_row * self.row_height).clamp(0.0, self.geometry().max_offset());
        self.reveal()?;
        Ok(self.geometry())
    }
}
