use super::{ScrollGeometry, ScrollPacing, percentage, tick_interval};
use crate::settings::clamp_speed;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Tolerance when matching a reported offset against the last tick's target.
const ECHO_TOLERANCE_PX: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    Manual,
    AutoScrolling,
    /// Auto-scroll was halted because the reader scrolled by hand.
    PausedByUser,
}

/// Side effects requested by the driver; the runtime owns the real timer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollEffect {
    ScheduleTicks { generation: u64, interval: Duration },
    CancelTicks,
    ScrollTo(f32),
    Progress(u8),
}

/// Tracks reading progress and paces auto-scroll ticks.
///
/// Every start, stop and user interruption bumps `generation`; ticks carry
/// the generation they were scheduled under and stale ones are dropped.
#[derive(Debug, Clone)]
pub struct AutoScrollDriver {
    pacing: ScrollPacing,
    mode: DriverMode,
    generation: u64,
    speed: u8,
    geometry: ScrollGeometry,
    percentage: u8,
    pending_echo: Option<f32>,
    last_user_scroll: Option<Instant>,
}

impl AutoScrollDriver {
    pub fn new(pacing: ScrollPacing, speed: u8) -> Self {
        Self {
            pacing,
            mode: DriverMode::Manual,
            generation: 0,
            speed: clamp_speed(speed),
            geometry: ScrollGeometry::default(),
            percentage: 0,
            pending_echo: None,
            last_user_scroll: None,
        }
    }

    pub fn mode(&self) -> DriverMode {
        self.mode
    }

    pub fn is_auto_scrolling(&self) -> bool {
        self.mode == DriverMode::AutoScrolling
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    #[cfg(test)]
    pub fn geometry(&self) -> ScrollGeometry {
        self.geometry
    }

    /// Whether a manual scroll happened within the user-scroll window.
    pub fn recently_scrolled_by_user(&self, now: Instant) -> bool {
        self.last_user_scroll
            .is_some_and(|at| now.saturating_duration_since(at) < self.pacing.user_scroll_window)
    }

    /// When the current user-scroll window closes, if one is open.
    pub fn user_scroll_window_end(&self, now: Instant) -> Option<Instant> {
        self.last_user_scroll
            .map(|at| at + self.pacing.user_scroll_window)
            .filter(|end| *end > now)
    }

    /// Layout changed without the reader scrolling (resize, font change).
    pub fn on_resize(&mut self, geometry: ScrollGeometry) -> Vec<ScrollEffect> {
        self.geometry = geometry;
        self.refresh_progress().into_iter().collect()
    }

    /// The viewport reported a scroll position.
    pub fn on_scroll(&mut self, geometry: ScrollGeometry, now: Instant) -> Vec<ScrollEffect> {
        let echo = self
            .pending_echo
            .take()
            .is_some_and(|target| (target - geometry.offset).abs() <= ECHO_TOLERANCE_PX);
        self.geometry = geometry;

        let mut effects = Vec::new();
        if !echo {
            self.last_user_scroll = Some(now);
            if self.mode == DriverMode::AutoScrolling {
                self.generation += 1;
                self.mode = DriverMode::PausedByUser;
                info!(
                    offset = geometry.offset,
                    generation = self.generation,
                    "Manual scroll interrupted auto-scroll"
                );
                effects.push(ScrollEffect::CancelTicks);
            }
        }
        effects.extend(self.refresh_progress());
        effects
    }

    pub fn start(&mut self) -> Vec<ScrollEffect> {
        self.generation += 1;
        self.mode = DriverMode::AutoScrolling;
        let interval = tick_interval(self.speed, &self.pacing);
        info!(
            speed = self.speed,
            interval_ms = interval.as_millis() as u64,
            generation = self.generation,
            "Auto-scroll started"
        );
        vec![
            ScrollEffect::CancelTicks,
            ScrollEffect::ScheduleTicks {
                generation: self.generation,
                interval,
            },
        ]
    }

    /// Safe to call in any mode.
    pub fn stop(&mut self) -> Vec<ScrollEffect> {
        let was_running = self.mode == DriverMode::AutoScrolling;
        self.generation += 1;
        self.mode = DriverMode::Manual;
        if was_running {
            info!(generation = self.generation, "Auto-scroll stopped");
        }
        vec![ScrollEffect::CancelTicks]
    }

    pub fn toggle(&mut self) -> Vec<ScrollEffect> {
        if self.is_auto_scrolling() {
            self.stop()
        } else {
            self.start()
        }
    }

    /// New speed level; a running driver is rescheduled at the new interval.
    pub fn set_speed(&mut self, level: u8) -> Vec<ScrollEffect> {
        let level = clamp_speed(level);
        if level == self.speed {
            return Vec::new();
        }
        self.speed = level;
        if self.is_auto_scrolling() {
            self.start()
        } else {
            Vec::new()
        }
    }

    pub fn on_tick(&mut self, generation: u64) -> Vec<ScrollEffect> {
        if generation != self.generation || !self.is_auto_scrolling() {
            debug!(
                generation,
                current = self.generation,
                "Ignoring stale auto-scroll tick"
            );
            return Vec::new();
        }

        let target = (self.geometry.offset + self.pacing.tick_increment_px)
            .min(self.geometry.max_offset());
        self.geometry = self.geometry.with_offset(target);
        self.pending_echo = Some(target);

        let mut effects = vec![ScrollEffect::ScrollTo(target)];
        effects.extend(self.refresh_progress());
        if self.percentage >= 100 {
            self.generation += 1;
            self.mode = DriverMode::Manual;
            info!(generation = self.generation, "Auto-scroll reached the end");
            effects.push(ScrollEffect::CancelTicks);
        }
        effects
    }

    fn refresh_progress(&mut self) -> Option<ScrollEffect> {
        let pct = percentage(&self.geometry);
        if pct == self.percentage {
            return None;
        }
        self.percentage = pct;
        Some(ScrollEffect::Progress(pct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> AutoScrollDriver {
        let mut driver = AutoScrollDriver::new(ScrollPacing::default(), 2);
        driver.on_resize(ScrollGeometry::new(0.0, 1000.0, 500.0));
        driver
    }

    fn scheduled_generation(effects: &[ScrollEffect]) -> u64 {
        effects
            .iter()
            .find_map(|effect| match effect {
                ScrollEffect::ScheduleTicks { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("ticks scheduled")
    }

    #[test]
    fn ticks_advance_offset_and_progress() {
        let mut driver = driver();
        let generation = scheduled_generation(&driver.start());
        let effects = driver.on_tick(generation);
        assert_eq!(effects[0], ScrollEffect::ScrollTo(1.0));
        let mut previous = driver.percentage();
        for _ in 0..200 {
            driver.on_tick(generation);
            assert!(driver.percentage() >= previous);
            previous = driver.percentage();
        }
        assert!((driver.geometry().offset - 201.0).abs() < 1e-3);
    }

    #[test]
    fn echo_of_tick_is_not_a_user_scroll() {
        let mut driver = driver();
        let now = Instant::now();
        let generation = scheduled_generation(&driver.start());
        driver.on_tick(generation);
        let effects = driver.on_scroll(ScrollGeometry::new(1.0, 1000.0, 500.0), now);
        assert!(!effects.contains(&ScrollEffect::CancelTicks));
        assert!(driver.is_auto_scrolling());
        assert!(!driver.recently_scrolled_by_user(now));
    }

    #[test]
    fn user_scroll_halts_and_cancels_ticks() {
        let mut driver = driver();
        let now = Instant::now();
        let generation = scheduled_generation(&driver.start());
        driver.on_tick(generation);
        let effects = driver.on_scroll(ScrollGeometry::new(320.0, 1000.0, 500.0), now);
        assert_eq!(effects[0], ScrollEffect::CancelTicks);
        assert_eq!(driver.mode(), DriverMode::PausedByUser);
        assert!(driver.on_tick(generation).is_empty());
        assert!(driver.recently_scrolled_by_user(now + Duration::from_millis(1999)));
        assert!(!driver.recently_scrolled_by_user(now + Duration::from_millis(2000)));
        assert_eq!(
            driver.user_scroll_window_end(now),
            Some(now + Duration::from_millis(2000))
        );
        assert_eq!(driver.user_scroll_window_end(now + Duration::from_millis(2000)), None);
    }

    #[test]
    fn toggle_resumes_after_user_pause() {
        let mut driver = driver();
        driver.start();
        driver.on_scroll(ScrollGeometry::new(50.0, 1000.0, 500.0), Instant::now());
        let effects = driver.toggle();
        assert!(driver.is_auto_scrolling());
        let generation = scheduled_generation(&effects);
        assert_eq!(driver.on_tick(generation)[0], ScrollEffect::ScrollTo(51.0));
    }

    #[test]
    fn reaching_the_end_stops() {
        let mut driver = AutoScrollDriver::new(ScrollPacing::default(), 5);
        driver.on_resize(ScrollGeometry::new(495.0, 1000.0, 500.0));
        let generation = scheduled_generation(&driver.start());
        let effects = driver.on_tick(generation);
        assert_eq!(effects[0], ScrollEffect::ScrollTo(496.0));
        assert!(driver.is_auto_scrolling());
        driver.on_tick(generation);
        let effects = driver.on_tick(generation);
        assert_eq!(effects[0], ScrollEffect::ScrollTo(498.0));
        assert!(effects.contains(&ScrollEffect::Progress(100)));
        assert_eq!(effects.last(), Some(&ScrollEffect::CancelTicks));
        assert_eq!(driver.mode(), DriverMode::Manual);
        assert!(driver.on_tick(generation).is_empty());
    }

    #[test]
    fn offset_never_passes_the_end() {
        let mut driver = AutoScrollDriver::new(ScrollPacing::default(), 5);
        driver.on_resize(ScrollGeometry::new(1999.6, 3000.0, 1000.0));
        let generation = scheduled_generation(&driver.start());
        assert_eq!(driver.on_tick(generation)[0], ScrollEffect::ScrollTo(2000.0));
    }

    #[test]
    fn short_content_finishes_on_first_tick() {
        let mut driver = AutoScrollDriver::new(ScrollPacing::default(), 2);
        driver.on_resize(ScrollGeometry::new(0.0, 200.0, 500.0));
        assert_eq!(driver.percentage(), 100);
        let generation = scheduled_generation(&driver.start());
        let effects = driver.on_tick(generation);
        assert_eq!(effects.last(), Some(&ScrollEffect::CancelTicks));
        assert!(!driver.is_auto_scrolling());
    }

    #[test]
    fn restart_invalidates_previous_schedule() {
        let mut driver = driver();
        let first = scheduled_generation(&driver.start());
        let second = scheduled_generation(&driver.start());
        assert_ne!(first, second);
        assert!(driver.on_tick(first).is_empty());
        assert!(!driver.on_tick(second).is_empty());
    }

    #[test]
    fn stop_is_safe_when_idle() {
        let mut driver = driver();
        assert_eq!(driver.stop(), vec![ScrollEffect::CancelTicks]);
        assert_eq!(driver.stop(), vec![ScrollEffect::CancelTicks]);
        assert_eq!(driver.mode(), DriverMode::Manual);
    }

    #[test]
    fn speed_change_reschedules_only_while_running() {
        let mut driver = driver();
        assert!(driver.set_speed(4).is_empty());
        let generation = scheduled_generation(&driver.start());
        let effects = driver.set_speed(1);
        assert!(effects.contains(&ScrollEffect::ScheduleTicks {
            generation: generation + 1,
            interval: Duration::from_millis(100),
        }));
        assert!(driver.set_speed(1).is_empty());
    }
}
