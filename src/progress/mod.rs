//! Reading progress and the timer-paced auto-scroll driver.

mod driver;

pub use driver::{AutoScrollDriver, DriverMode, ScrollEffect};

use crate::config::AppConfig;
use std::time::Duration;

/// Smallest scrollable range used as the percentage denominator.
const MIN_SCROLL_RANGE: f32 = 1.0;

/// Scroll position and extents along the reading axis, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollGeometry {
    pub offset: f32,
    pub content_extent: f32,
    pub viewport_extent: f32,
}

impl ScrollGeometry {
    pub fn new(offset: f32, content_extent: f32, viewport_extent: f32) -> Self {
        let sanitize = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            offset: sanitize(offset),
            content_extent: sanitize(content_extent),
            viewport_extent: sanitize(viewport_extent),
        }
    }

    /// Largest reachable offset.
    pub fn max_offset(&self) -> f32 {
        (self.content_extent - self.viewport_extent).max(0.0)
    }

    pub fn fits_viewport(&self) -> bool {
        self.content_extent <= self.viewport_extent
    }

    pub fn with_offset(self, offset: f32) -> Self {
        Self::new(offset, self.content_extent, self.viewport_extent)
    }
}

/// Reading progress in whole percent, always within `0..=100`.
pub fn percentage(geometry: &ScrollGeometry) -> u8 {
    if geometry.fits_viewport() {
        return 100;
    }
    let range = (geometry.content_extent - geometry.viewport_extent).max(MIN_SCROLL_RANGE);
    let ratio = (geometry.offset / range * 100.0).round();
    if ratio.is_finite() {
        ratio.clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

/// Timing knobs for the auto-scroll driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPacing {
    pub base_interval_ms: u64,
    pub interval_step_ms: u64,
    pub min_interval_ms: u64,
    pub tick_increment_px: f32,
    pub user_scroll_window: Duration,
}

impl Default for ScrollPacing {
    fn default() -> Self {
        ScrollPacing::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScrollPacing {
    fn from(config: &AppConfig) -> Self {
        ScrollPacing {
            base_interval_ms: config.base_interval_ms,
            interval_step_ms: config.interval_step_ms,
            min_interval_ms: config.min_interval_ms.max(1),
            tick_increment_px: config.tick_increment_px,
            user_scroll_window: Duration::from_millis(config.user_scroll_window_ms),
        }
    }
}

/// `base - (level - 1) * step`, floored at the configured minimum.
pub fn tick_interval(level: u8, pacing: &ScrollPacing) -> Duration {
    let level = crate::settings::clamp_speed(level);
    let reduction = u64::from(level - 1).saturating_mul(pacing.interval_step_ms);
    let millis = pacing
        .base_interval_ms
        .saturating_sub(reduction)
        .max(pacing.min_interval_ms);
    Duration::from_millis(millis)
}
