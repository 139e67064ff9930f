use crate::playback::{Playback, PlaybackObserver, TimerCommand, TransportReadout};
use crate::{EnrichedSample, PlaybackError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

struct Shared {
    playback: Playback,
    // Bumped on every timer stop/restart; a ticker only acts while its epoch is current.
    epoch: u64,
}

/// Drives a [`Playback`] with a recurring timer on a tokio runtime.
///
/// Every mutation of the playback state, including the timer's own ticks, goes
/// through one mutex. Stopping the timer bumps the epoch under that mutex, so
/// once `pause`, `seek`, `set_rate`, `load` or `drop` has returned no stale
/// tick can move the cursor.
pub struct Player {
    shared: Arc<Mutex<Shared>>,
    runtime: Handle,
    ticker: Option<JoinHandle<()>>,
}

impl Player {
    pub fn new(playback: Playback, runtime: Handle) -> Self {
        Player {
            shared: Arc::new(Mutex::new(Shared { playback, epoch: 0 })),
            runtime,
            ticker: None,
        }
    }

    pub fn with_samples(
        samples: impl Into<Arc<[EnrichedSample]>>,
        runtime: Handle,
    ) -> Result<Self, PlaybackError> {
        Ok(Self::new(Playback::new(samples)?, runtime))
    }

    pub fn subscribe(&self, observer: Box<dyn PlaybackObserver>) {
        lock(&self.shared).playback.subscribe(observer);
    }

    pub fn play(&mut self) {
        let _ = self.transition(|playback| Ok(playback.play()));
    }

    pub fn pause(&mut self) {
        let _ = self.transition(|playback| Ok(playback.pause()));
    }

    pub fn seek(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.transition(|playback| playback.seek(index))
    }

    pub fn reset(&mut self) -> Result<(), PlaybackError> {
        self.transition(Playback::reset)
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<(), PlaybackError> {
        self.transition(|playback| playback.set_rate(rate))
    }

    /// Replaces the sequence, e.g. when another track is opened. Any running timer is cancelled.
    pub fn load(&mut self, samples: impl Into<Arc<[EnrichedSample]>>) -> Result<(), PlaybackError> {
        let samples = samples.into();
        self.transition(move |playback| playback.load(samples))
    }

    pub fn cursor(&self) -> usize {
        lock(&self.shared).playback.cursor()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.shared).playback.is_playing()
    }

    pub fn rate(&self) -> f64 {
        lock(&self.shared).playback.rate()
    }

    pub fn readout(&self) -> TransportReadout {
        lock(&self.shared).playback.readout()
    }

    fn transition(
        &mut self,
        op: impl FnOnce(&mut Playback) -> Result<TimerCommand, PlaybackError>,
    ) -> Result<(), PlaybackError> {
        let shared = Arc::clone(&self.shared);
        let mut guard = lock(&shared);

        match op(&mut guard.playback)? {
            TimerCommand::Unchanged => {}
            TimerCommand::Stop => {
                guard.epoch += 1;
                self.cancel_ticker();
            }
            TimerCommand::Start(period) => {
                guard.epoch += 1;
                self.cancel_ticker();
                self.ticker = Some(self.spawn_ticker(period, guard.epoch));
            }
        }
        Ok(())
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn spawn_ticker(&self, period: Duration, epoch: u64) -> JoinHandle<()> {
        debug!(?period, epoch, "starting playback timer");
        let state: Weak<Mutex<Shared>> = Arc::downgrade(&self.shared);

        self.runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;

                let Some(shared) = state.upgrade() else {
                    break;
                };
                let advanced = {
                    let mut guard = lock(&shared);
                    guard.epoch == epoch && guard.playback.tick()
                };
                if !advanced {
                    break;
                }
            }
        })
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        lock(&self.shared).epoch += 1;
        self.cancel_ticker();
    }
}

// The guarded state is consistent after every statement, so a poisoned lock is still usable.
fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
