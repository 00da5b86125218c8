//! Playback and navigation over a composited frame sequence.
//!
//! The controller owns all viewer state. Time is passed in explicitly, so the
//! event loop decides when to call [`Controller::poll`] (see
//! [`Controller::next_deadline`]) and tests can drive it with synthetic instants.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::compositor::CompositedFrame;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// Handle of the armed auto-advance timer. Dropping it cancels the timer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScheduledTick {
    fires_at: Instant,
}

impl ScheduledTick {
    pub fn fires_at(&self) -> Instant {
        self.fires_at
    }
}

/// Identifies one load request. Only the most recent ticket may commit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug)]
pub struct ViewerState {
    frames: Vec<CompositedFrame>,
    current_index: usize,
    play_state: PlayState,
    /// Filmstrip offset in thumbnail slots; follows the current frame.
    film_scroll: usize,
}

impl ViewerState {
    fn empty() -> Self {
        ViewerState {
            frames: Vec::new(),
            current_index: 0,
            play_state: PlayState::Stopped,
            film_scroll: 0,
        }
    }

    pub fn frames(&self) -> &[CompositedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_frame(&self) -> Option<&CompositedFrame> {
        self.frames.get(self.current_index)
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }

    pub fn film_scroll(&self) -> usize {
        self.film_scroll
    }
}

pub struct Controller {
    state: ViewerState,
    timer: Option<ScheduledTick>,
    default_delay: Duration,
    generation: u64,
    message: Option<String>,
}

impl Controller {
    pub fn new(default_delay: Duration) -> Self {
        Controller {
            state: ViewerState::empty(),
            timer: None,
            default_delay,
            generation: 0,
            message: None,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn timer(&self) -> Option<ScheduledTick> {
        self.timer
    }

    /// When the event loop must call `poll` next, if playing.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.fires_at)
    }

    /// Display time of frame `index`. A zero delay means "viewer default".
    pub fn frame_delay(&self, index: usize) -> Duration {
        match self.state.frames.get(index).map(|f| f.delay_ms) {
            Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
            _ => self.default_delay,
        }
    }

    /// Moves to `index`, clamped to the sequence. Returns whether the frame changed.
    pub fn set_current_index(&mut self, index: usize, now: Instant) -> bool {
        if self.state.is_empty() {
            return false;
        }

        let index = index.min(self.state.len() - 1);
        let changed = index != self.state.current_index;
        self.move_to(index);
        if self.state.is_playing() {
            self.arm(now);
        }
        changed
    }

    pub fn seek(&mut self, index: usize, now: Instant) -> bool {
        self.set_current_index(index, now)
    }

    /// Single step forward; stays put on the last frame.
    pub fn next(&mut self, now: Instant) -> bool {
        let index = self.state.current_index;
        if index + 1 >= self.state.len() {
            return false;
        }
        self.set_current_index(index + 1, now)
    }

    /// Single step back; stays put on the first frame.
    pub fn prev(&mut self, now: Instant) -> bool {
        let index = self.state.current_index;
        if index == 0 {
            return false;
        }
        self.set_current_index(index - 1, now)
    }

    pub fn first(&mut self, now: Instant) -> bool {
        self.set_current_index(0, now)
    }

    pub fn last(&mut self, now: Instant) -> bool {
        self.set_current_index(usize::MAX, now)
    }

    pub fn toggle_play(&mut self, now: Instant) -> PlayState {
        match self.state.play_state {
            PlayState::Playing => self.stop(),
            PlayState::Stopped if !self.state.is_empty() => {
                self.state.play_state = PlayState::Playing;
                self.arm(now);
                debug!(index = self.state.current_index, "playback started");
            }
            PlayState::Stopped => {}
        }
        self.state.play_state
    }

    pub fn stop(&mut self) {
        if self.state.is_playing() {
            debug!(index = self.state.current_index, "playback stopped");
        }
        self.state.play_state = PlayState::Stopped;
        self.timer = None;
    }

    /// Fires the timer if it is due: advances one frame (wrapping to the
    /// first) and re-arms with the new frame's delay. Returns whether the
    /// frame changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(timer) = self.timer else {
            return false;
        };
        if now < timer.fires_at || !self.state.is_playing() {
            return false;
        }

        let next = (self.state.current_index + 1) % self.state.len();
        self.move_to(next);
        self.arm(now);
        true
    }

    /// Starts a new load and stops playback. Any ticket handed out earlier
    /// becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.stop();
        self.generation += 1;
        LoadTicket { generation: self.generation }
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Replaces the whole sequence, unless a newer load was started since
    /// `ticket` was issued. Resets to the first frame, stopped.
    pub fn finish_load(&mut self, ticket: LoadTicket, frames: Vec<CompositedFrame>) -> bool {
        if !self.is_current(ticket) {
            warn!(stale = ticket.generation, current = self.generation, "discarding superseded load");
            return false;
        }

        info!(frames = frames.len(), "sequence loaded");
        self.stop();
        self.state = ViewerState {
            frames,
            ..ViewerState::empty()
        };
        self.message = None;
        true
    }

    /// Records a failed load. The active sequence stays as it was.
    pub fn fail_load(&mut self, ticket: LoadTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let message = message.into();
        warn!(%message, "load failed");
        self.message = Some(message);
        true
    }

    /// The pending user-visible notification, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn dismiss_message(&mut self) {
        self.message = None;
    }

    fn move_to(&mut self, index: usize) {
        self.state.current_index = index;
        self.state.film_scroll = index;
    }

    fn arm(&mut self, now: Instant) {
        let delay = self.frame_delay(self.state.current_index);
        self.timer = Some(ScheduledTick { fires_at: now + delay });
    }
}

impl Default for Controller {
    fn default() -> Self {
        Controller::new(DEFAULT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::gif::DisposalCode;

    fn frames(delays: &[u32]) -> Vec<CompositedFrame> {
        delays
            .iter()
            .map(|&delay_ms| CompositedFrame {
                bitmap: Bitmap::transparent(1, 1),
                delay_ms,
                disposal: DisposalCode::None,
            })
            .collect()
    }

    fn loaded(delays: &[u32]) -> Controller {
        let mut controller = Controller::default();
        let ticket = controller.begin_load();
        assert!(controller.finish_load(ticket, frames(delays)));
        controller
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_stopped_at_first_frame() {
        let controller = loaded(&[10, 20]);
        assert_eq!(controller.state().play_state(), PlayState::Stopped);
        assert_eq!(controller.state().current_index(), 0);
        assert!(controller.next_deadline().is_none());
    }

    #[test]
    fn set_current_index_clamps() {
        let now = Instant::now();
        let mut controller = loaded(&[10, 20, 30]);
        assert!(controller.set_current_index(99, now));
        assert_eq!(controller.state().current_index(), 2);
        assert!(!controller.set_current_index(2, now));
        assert_eq!(controller.state().film_scroll(), 2);
    }

    #[test]
    fn stepping_stops_at_the_ends() {
        let now = Instant::now();
        let mut controller = loaded(&[10, 20]);
        assert!(!controller.prev(now));
        assert_eq!(controller.state().current_index(), 0);
        assert!(controller.next(now));
        assert!(!controller.next(now));
        assert_eq!(controller.state().current_index(), 1);
        assert!(controller.prev(now));
        assert_eq!(controller.state().current_index(), 0);
    }

    #[test]
    fn toggle_on_empty_sequence_stays_stopped() {
        let now = Instant::now();
        let mut controller = Controller::default();
        assert_eq!(controller.toggle_play(now), PlayState::Stopped);
        assert!(controller.timer().is_none());
        assert!(!controller.next(now));
        assert!(!controller.set_current_index(3, now));
    }

    #[test]
    fn playback_uses_each_frames_own_delay_and_wraps() {
        let t0 = Instant::now();
        let mut controller = loaded(&[50, 200, 30]);
        assert_eq!(controller.toggle_play(t0), PlayState::Playing);
        assert_eq!(controller.next_deadline(), Some(t0 + ms(50)));

        assert!(!controller.poll(t0 + ms(49)));
        assert!(controller.poll(t0 + ms(50)));
        assert_eq!(controller.state().current_index(), 1);
        assert_eq!(controller.next_deadline(), Some(t0 + ms(250)));

        assert!(controller.poll(t0 + ms(250)));
        assert_eq!(controller.state().current_index(), 2);
        assert!(controller.poll(t0 + ms(280)));
        assert_eq!(controller.state().current_index(), 0);
    }

    #[test]
    fn zero_delay_falls_back_to_default() {
        let t0 = Instant::now();
        let mut controller = loaded(&[0, 0]);
        controller.toggle_play(t0);
        assert_eq!(controller.next_deadline(), Some(t0 + DEFAULT_DELAY));

        let mut custom = Controller::new(ms(40));
        let ticket = custom.begin_load();
        custom.finish_load(ticket, frames(&[0]));
        assert_eq!(custom.frame_delay(0), ms(40));
    }

    #[test]
    fn stopping_cancels_the_timer() {
        let t0 = Instant::now();
        let mut controller = loaded(&[10, 10]);
        controller.toggle_play(t0);
        assert_eq!(controller.toggle_play(t0), PlayState::Stopped);
        assert!(controller.timer().is_none());
        assert!(!controller.poll(t0 + ms(1000)));
        assert_eq!(controller.state().current_index(), 0);
    }

    #[test]
    fn seeking_while_playing_rearms_with_new_frame_delay() {
        let t0 = Instant::now();
        let mut controller = loaded(&[10, 500]);
        controller.toggle_play(t0);
        controller.seek(1, t0 + ms(5));
        assert_eq!(controller.next_deadline(), Some(t0 + ms(505)));
    }

    #[test]
    fn new_load_resets_state() {
        let t0 = Instant::now();
        let mut controller = loaded(&[10, 10, 10]);
        controller.set_current_index(2, t0);
        controller.toggle_play(t0);

        let ticket = controller.begin_load();
        assert!(controller.finish_load(ticket, frames(&[10])));
        assert_eq!(controller.state().current_index(), 0);
        assert_eq!(controller.state().film_scroll(), 0);
        assert_eq!(controller.state().play_state(), PlayState::Stopped);
        assert!(controller.timer().is_none());
    }

    #[test]
    fn stale_load_is_discarded() {
        let mut controller = Controller::default();
        let old = controller.begin_load();
        let new = controller.begin_load();

        assert!(controller.finish_load(new, frames(&[10, 10])));
        assert!(!controller.finish_load(old, frames(&[10])));
        assert_eq!(controller.state().len(), 2);
        assert!(!controller.fail_load(old, "late failure"));
        assert!(controller.message().is_none());
    }

    #[test]
    fn starting_a_load_stops_playback() {
        let t0 = Instant::now();
        let mut controller = loaded(&[10, 10, 10]);
        controller.toggle_play(t0);

        let ticket = controller.begin_load();
        assert_eq!(controller.state().play_state(), PlayState::Stopped);
        assert_eq!(controller.next_deadline(), None);
        assert!(!controller.poll(t0 + ms(50)));
        assert_eq!(controller.state().current_index(), 0);

        assert!(controller.fail_load(ticket, "bad header"));
        assert_eq!(controller.state().play_state(), PlayState::Stopped);
        assert_eq!(controller.next_deadline(), None);
    }

    #[test]
    fn failed_load_keeps_previous_sequence() {
        let mut controller = loaded(&[10, 10]);
        let ticket = controller.begin_load();
        assert!(controller.fail_load(ticket, "bad header"));
        assert_eq!(controller.state().len(), 2);
        assert_eq!(controller.message(), Some("bad header"));
        controller.dismiss_message();
        assert!(controller.message().is_none());
    }

    #[test]
    fn empty_load_is_valid() {
        let mut controller = loaded(&[10]);
        let ticket = controller.begin_load();
        assert!(controller.finish_load(ticket, Vec::new()));
        assert!(controller.state().is_empty());
        assert!(controller.state().current_frame().is_none());
    }
}
