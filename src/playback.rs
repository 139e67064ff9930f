use crate::{EnrichedSample, PlaybackError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::{debug, trace, warn};

/// Timer period at rate 1.0.
pub const BASE_TICK_PERIOD: Duration = Duration::from_millis(100);
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);
pub const MAX_TICK_PERIOD: Duration = Duration::from_secs(3600);

const CLOCK_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const NO_TIME: &str = "--:--:--";

/// Receives cursor changes, e.g. to move the position marker on a map.
///
/// Called synchronously from inside the controller, in registration order.
pub trait PlaybackObserver: Send {
    fn cursor_changed(&mut self, cursor: usize, sample: &EnrichedSample);

    fn playing_changed(&mut self, _playing: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Paused,
    Playing,
}

/// What the owner of the recurring timer has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Unchanged,
    /// (Re)start the timer with this period.
    Start(Duration),
    Stop,
}

/// Cursor state machine over a shared, read-only sample sequence.
///
/// Starts Paused at cursor 0. Only `seek`, `reset`, `tick` and `load` move the
/// cursor; a rejected call leaves every field as it was.
pub struct Playback {
    samples: Arc<[EnrichedSample]>,
    cursor: usize,
    state: PlayState,
    rate: f64,
    observers: Vec<Box<dyn PlaybackObserver>>,
}

impl Playback {
    pub fn new(samples: impl Into<Arc<[EnrichedSample]>>) -> Result<Self, PlaybackError> {
        let samples = samples.into();
        if samples.is_empty() {
            return Err(PlaybackError::EmptySequence);
        }
        Ok(Playback {
            samples,
            cursor: 0,
            state: PlayState::Paused,
            rate: 1.0,
            observers: Vec::new(),
        })
    }

    pub fn subscribe(&mut self, observer: Box<dyn PlaybackObserver>) {
        self.observers.push(observer);
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Never true: construction rejects empty sequences.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Highest valid cursor, the scrubber's maximum.
    pub fn extent(&self) -> usize {
        self.samples.len() - 1
    }

    pub fn samples(&self) -> &Arc<[EnrichedSample]> {
        &self.samples
    }

    pub fn current(&self) -> &EnrichedSample {
        &self.samples[self.cursor]
    }

    pub fn period(&self) -> Duration {
        period_for_rate(self.rate)
    }

    pub fn readout(&self) -> TransportReadout {
        TransportReadout::new(&self.samples, self.cursor)
    }

    /// Moves the cursor and always leaves playback Paused.
    pub fn seek(&mut self, index: usize) -> Result<TimerCommand, PlaybackError> {
        if index >= self.samples.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            });
        }

        let command = self.stop();
        self.cursor = index;
        debug!(cursor = index, "seek");
        self.notify_cursor();
        Ok(command)
    }

    pub fn reset(&mut self) -> Result<TimerCommand, PlaybackError> {
        self.seek(0)
    }

    pub fn play(&mut self) -> TimerCommand {
        if self.is_playing() {
            return TimerCommand::Unchanged;
        }
        self.state = PlayState::Playing;
        debug!(rate = self.rate, "play");
        self.notify_playing();
        TimerCommand::Start(self.period())
    }

    pub fn pause(&mut self) -> TimerCommand {
        let command = self.stop();
        if command == TimerCommand::Stop {
            debug!(cursor = self.cursor, "pause");
        }
        command
    }

    /// Changes the rate; a running timer is restarted with the new period.
    pub fn set_rate(&mut self, rate: f64) -> Result<TimerCommand, PlaybackError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlaybackError::InvalidRate(rate));
        }

        self.rate = rate;
        let period = self.period();
        if period == MIN_TICK_PERIOD || period == MAX_TICK_PERIOD {
            warn!(rate, ?period, "tick period clamped");
        }
        debug!(rate, ?period, "rate changed");

        if self.is_playing() {
            Ok(TimerCommand::Start(period))
        } else {
            Ok(TimerCommand::Unchanged)
        }
    }

    /// Advances to the next sample, wrapping to the start. Does nothing while Paused.
    pub fn tick(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.cursor = (self.cursor + 1) % self.samples.len();
        trace!(cursor = self.cursor, "tick");
        self.notify_cursor();
        true
    }

    /// Swaps in another track's sequence: Paused, cursor back at 0, rate kept.
    pub fn load(
        &mut self,
        samples: impl Into<Arc<[EnrichedSample]>>,
    ) -> Result<TimerCommand, PlaybackError> {
        let samples = samples.into();
        if samples.is_empty() {
            return Err(PlaybackError::EmptySequence);
        }

        let command = self.stop();
        self.samples = samples;
        self.cursor = 0;
        debug!(points = self.samples.len(), "sequence replaced");
        self.notify_cursor();
        Ok(command)
    }

    fn stop(&mut self) -> TimerCommand {
        if !self.is_playing() {
            return TimerCommand::Unchanged;
        }
        self.state = PlayState::Paused;
        self.notify_playing();
        TimerCommand::Stop
    }

    fn notify_cursor(&mut self) {
        let sample = &self.samples[self.cursor];
        for observer in &mut self.observers {
            observer.cursor_changed(self.cursor, sample);
        }
    }

    fn notify_playing(&mut self) {
        let playing = self.is_playing();
        for observer in &mut self.observers {
            observer.playing_changed(playing);
        }
    }
}

impl fmt::Debug for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playback")
            .field("len", &self.samples.len())
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .field("rate", &self.rate)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// `BASE_TICK_PERIOD / rate`, kept within `[MIN_TICK_PERIOD, MAX_TICK_PERIOD]`.
pub fn period_for_rate(rate: f64) -> Duration {
    Duration::try_from_secs_f64(BASE_TICK_PERIOD.as_secs_f64() / rate)
        .unwrap_or(MAX_TICK_PERIOD)
        .clamp(MIN_TICK_PERIOD, MAX_TICK_PERIOD)
}

/// Display values for the transport control, for the sample under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReadout {
    pub cursor: usize,
    pub extent: usize,
    pub time: String,
    pub speed_kmh: String,
    pub elevation_m: String,
    pub distance_km: String,
    pub first_time: String,
    pub last_time: String,
}

impl TransportReadout {
    /// Readout for `cursor`, or `None` when it is past the end of `samples`.
    pub fn at(samples: &[EnrichedSample], cursor: usize) -> Option<Self> {
        (cursor < samples.len()).then(|| Self::new(samples, cursor))
    }

    // `cursor` must index into a non-empty `samples`.
    pub(crate) fn new(samples: &[EnrichedSample], cursor: usize) -> Self {
        let sample = &samples[cursor];
        TransportReadout {
            cursor,
            extent: samples.len() - 1,
            time: clock_label(sample.time),
            speed_kmh: format!("{:.1}", sample.speed_kmh()),
            elevation_m: sample
                .elevation
                .map(|ele| format!("{}", (ele + 0.5).floor() as i64))
                .unwrap_or_else(|| "0".to_string()),
            distance_km: format!("{:.2}", sample.cumulative_distance_m / 1000.0),
            first_time: clock_label(samples[0].time),
            last_time: clock_label(samples[samples.len() - 1].time),
        }
    }
}

impl fmt::Display for TransportReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}  {} km/h  {} m  {} km",
            self.cursor, self.extent, self.time, self.speed_kmh, self.elevation_m, self.distance_km
        )
    }
}

/// `HH:MM:SS` in the timestamp's own offset.
fn clock_label(time: Option<OffsetDateTime>) -> String {
    time.and_then(|t| t.format(CLOCK_FORMAT).ok())
        .unwrap_or_else(|| NO_TIME.to_string())
}
