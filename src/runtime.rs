//! Executes session effects against the platform: viewport, speech engine
//! and timers. Events are handled strictly one at a time from a single
//! channel, so the session never sees concurrent mutation.

use crate::progress::ScrollEffect;
use crate::session::{Effect, ReaderSnapshot, ReadingSession, SessionEvent};
use crate::speech::{Notice, NoticeLevel, SpeechEffect, SpeechErrorKind, SpeechService, UtteranceCallback};
use crate::store::KeyValueStore;
use crate::viewport::Viewport;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// The hosting surface.
pub trait Host {
    fn render(&mut self, snapshot: &ReaderSnapshot);
    fn notify(&mut self, notice: &Notice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

enum Wake {
    Event(Option<SessionEvent>),
    /// `last_scroll_was_user` just expired; the host needs a fresh snapshot.
    UserScrollWindowClosed,
}

pub struct Runtime<S, V, T, H> {
    session: ReadingSession<S>,
    viewport: V,
    speech: T,
    host: H,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    scroll_ticker: Option<JoinHandle<()>>,
    keepalive_ticker: Option<JoinHandle<()>>,
    stop_when_idle: bool,
    last_snapshot: Option<ReaderSnapshot>,
}

impl<S, V, T, H> Runtime<S, V, T, H>
where
    S: KeyValueStore,
    V: Viewport,
    T: SpeechService,
    H: Host,
{
    pub fn new(session: ReadingSession<S>, viewport: V, speech: T, host: H) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session,
            viewport,
            speech,
            host,
            events_tx,
            events_rx,
            scroll_ticker: None,
            keepalive_ticker: None,
            stop_when_idle: false,
            last_snapshot: None,
        }
    }

    /// Return once neither auto-scroll nor narration is running and no
    /// events are pending.
    pub fn stop_when_idle(mut self, enabled: bool) -> Self {
        self.stop_when_idle = enabled;
        self
    }

    pub fn sender(&self) -> UnboundedSender<SessionEvent> {
        self.events_tx.clone()
    }

    pub async fn run(mut self) -> ReaderSnapshot {
        let voices = if self.speech.is_supported() {
            self.speech.list_voices()
        } else {
            Vec::new()
        };
        let mut flow = self.dispatch(SessionEvent::VoicesLoaded(voices));
        let opening = self.session.open();
        for effect in opening {
            if self.run_effect(effect) == Flow::Exit {
                flow = Flow::Exit;
            }
        }
        self.publish();

        while flow == Flow::Continue {
            let event = match self.session.user_scroll_expiry(now()) {
                Some(expiry) => tokio::select! {
                    event = self.events_rx.recv() => Wake::Event(event),
                    _ = time::sleep_until(Instant::from_std(expiry)) => Wake::UserScrollWindowClosed,
                },
                None => Wake::Event(self.events_rx.recv().await),
            };
            let event = match event {
                Wake::Event(Some(event)) => event,
                Wake::Event(None) => break,
                Wake::UserScrollWindowClosed => {
                    debug!("User scroll window closed");
                    self.publish();
                    continue;
                }
            };
            flow = self.dispatch(event);
            if self.stop_when_idle && self.session.is_idle() && self.events_rx.is_empty() {
                info!("Session idle; stopping");
                break;
            }
        }

        self.cancel_scroll_ticker();
        self.cancel_keepalive_ticker();
        if let Err(err) = self.speech.cancel() {
            warn!("Failed to cancel speech on exit: {err:#}");
        }
        self.session.snapshot(now())
    }

    fn dispatch(&mut self, event: SessionEvent) -> Flow {
        let effects = self.session.reduce(event, now());
        let mut flow = Flow::Continue;
        for effect in effects {
            if self.run_effect(effect) == Flow::Exit {
                flow = Flow::Exit;
            }
        }
        self.publish();
        flow
    }

    fn run_effect(&mut self, effect: Effect) -> Flow {
        match effect {
            Effect::Scroll(effect) => self.run_scroll_effect(effect),
            Effect::Speech(effect) => self.run_speech_effect(effect),
            Effect::ApplySettings(settings) => match self.viewport.apply_settings(&settings) {
                Ok(geometry) => self.send(SessionEvent::Resized(geometry)),
                Err(err) => warn!("Failed to apply settings to viewport: {err:#}"),
            },
            Effect::Exit => return Flow::Exit,
        }
        Flow::Continue
    }

    fn run_scroll_effect(&mut self, effect: ScrollEffect) {
        match effect {
            ScrollEffect::ScheduleTicks {
                generation,
                interval,
            } => {
                self.cancel_scroll_ticker();
                self.scroll_ticker = Some(self.spawn_ticker(interval, move || {
                    SessionEvent::ScrollTick { generation }
                }));
            }
            ScrollEffect::CancelTicks => self.cancel_scroll_ticker(),
            ScrollEffect::ScrollTo(offset) => match self.viewport.scroll_to(offset) {
                Ok(geometry) => self.send(SessionEvent::Scrolled(geometry)),
                Err(err) => warn!(offset, "Viewport scroll failed: {err:#}"),
            },
            ScrollEffect::Progress(percentage) => debug!(percentage, "Reading progress"),
        }
    }

    fn run_speech_effect(&mut self, effect: SpeechEffect) {
        match effect {
            SpeechEffect::Cancel => {
                if let Err(err) = self.speech.cancel() {
                    warn!("Speech cancel failed: {err:#}");
                }
            }
            SpeechEffect::Speak(utterance) => {
                let callback = UtteranceCallback::new(self.events_tx.clone(), &utterance);
                let chunk = utterance.chunk_index;
                if let Err(err) = self.speech.speak(utterance, callback.clone()) {
                    warn!(chunk, "Speech service rejected utterance: {err:#}");
                    callback.fail(SpeechErrorKind::Failed(format!("{err:#}")));
                }
            }
            SpeechEffect::Pause => {
                if let Err(err) = self.speech.pause() {
                    warn!("Speech pause failed: {err:#}");
                }
            }
            SpeechEffect::Resume => {
                if let Err(err) = self.speech.resume() {
                    warn!("Speech resume failed: {err:#}");
                }
            }
            SpeechEffect::KeepAlive => {
                if let Err(err) = self.speech.pause().and_then(|()| self.speech.resume()) {
                    warn!("Speech keep-alive failed: {err:#}");
                }
            }
            SpeechEffect::ScheduleKeepAlive {
                generation,
                interval,
            } => {
                self.cancel_keepalive_ticker();
                self.keepalive_ticker = Some(self.spawn_ticker(interval, move || {
                    SessionEvent::KeepAliveTick { generation }
                }));
            }
            SpeechEffect::CancelKeepAlive => self.cancel_keepalive_ticker(),
            SpeechEffect::Notify(notice) => {
                match notice.level {
                    NoticeLevel::Info | NoticeLevel::Success => info!(message = %notice.message, "Notice"),
                    NoticeLevel::Warning => warn!(message = %notice.message, "Notice"),
                    NoticeLevel::Error => error!(message = %notice.message, "Notice"),
                }
                self.host.notify(&notice);
            }
        }
    }

    /// Periodic timer feeding `make_event()` into the event channel. The
    /// first tick fires one full `interval` after scheduling.
    fn spawn_ticker(
        &self,
        interval: Duration,
        make_event: impl Fn() -> SessionEvent + Send + 'static,
    ) -> JoinHandle<()> {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(make_event()).is_err() {
                    break;
                }
            }
        })
    }

    fn cancel_scroll_ticker(&mut self) {
        if let Some(handle) = self.scroll_ticker.take() {
            handle.abort();
        }
    }

    fn cancel_keepalive_ticker(&mut self) {
        if let Some(handle) = self.keepalive_ticker.take() {
            handle.abort();
        }
    }

    fn send(&self, event: SessionEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("Event channel closed");
        }
    }

    fn publish(&mut self) {
        let snapshot = self.session.snapshot(now());
        if self.last_snapshot.as_ref() != Some(&snapshot) {
            self.host.render(&snapshot);
            self.last_snapshot = Some(snapshot);
        }
    }
}

/// Wall-clock instant that follows tokio's (possibly paused) test clock.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}
