//! Playback clock: playhead, frame timing, looping and reverse
//!
//! Pure transport state. The controller decides *whether* the playhead may move
//! (data readiness, decode mode); the clock decides *where* it moves and which
//! notification that movement triggers.
//!
//! # Timing Model
//!
//! Each frame has a fixed duration (1/fps seconds). `accumulate(dt)` adds
//! `dt * speed` to the on-screen time while playing; once it reaches the frame
//! duration the frame is due. At most one frame advances per tick, so a stalled
//! frame is never skipped: lateness is paid back one tick at a time.
//!
//! After a load the counter is parked at a negative value. While negative it does
//! not accumulate; presenting the first frame resets it to zero so the first frame
//! gets its full duration on screen.
//!
//! # Boundaries
//!
//! - Looping, forward past N-1: wrap to 0, or with reverse-at-loop bounce to N-1 and run backwards
//! - Looping, backward past 0: bounce to 0 and run forward (reverse-at-loop), else wrap to N-1
//! - Not looping: arriving at the last frame in the direction of travel stops playback
//!   and reports `Ended` once; pushing past it clamps without a second report

use log::debug;

/// Counter value that marks "present the current frame before timing starts"
const FORCE_PRESENT: f32 = -1.0;

/// Playback mode, fixed for the life of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PlaybackMode {
    /// Background workers; the playhead waits for data
    Deferred,
    /// No workers; decode happens inline with advance/seek
    Immediate,
}

impl PlaybackMode {
    pub fn from_workers(workers: usize) -> Self {
        if workers == 0 {
            PlaybackMode::Immediate
        } else {
            PlaybackMode::Deferred
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackMode::Deferred => "deferred",
            PlaybackMode::Immediate => "immediate",
        }
    }
}

/// Notification triggered by a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    None,
    Looped,
    Ended,
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    num_frames: usize,
    frame_duration: f32,
    speed: f32,
    looping: bool,
    reverse_at_loop: bool,
    reversing: bool,
    playing: bool,
    current: usize,
    previous: Option<usize>,
    on_screen_time: f32,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(false)
    }
}

impl PlaybackClock {
    pub fn new(reverse_at_loop: bool) -> Self {
        Self {
            num_frames: 0,
            frame_duration: 1.0 / 24.0,
            speed: 1.0,
            looping: true,
            reverse_at_loop,
            reversing: false,
            playing: false,
            current: 0,
            previous: None,
            on_screen_time: 0.0,
        }
    }

    /// Start over on a freshly loaded sequence. Keeps loop, speed and play state.
    pub fn reset(&mut self, num_frames: usize, frame_duration: f32) {
        self.num_frames = num_frames;
        self.frame_duration = frame_duration;
        self.current = 0;
        self.previous = None;
        self.reversing = false;
        self.on_screen_time = FORCE_PRESENT;
    }

    // === Accessors ===

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn previous(&self) -> Option<usize> {
        self.previous
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn frame_duration(&self) -> f32 {
        self.frame_duration
    }

    pub fn set_frame_duration(&mut self, frame_duration: f32) {
        self.frame_duration = frame_duration;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn reverse_at_loop(&self) -> bool {
        self.reverse_at_loop
    }

    pub fn set_reverse_at_loop(&mut self, reverse_at_loop: bool) {
        self.reverse_at_loop = reverse_at_loop;
    }

    pub fn is_reversing(&self) -> bool {
        self.reversing
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn on_screen_time(&self) -> f32 {
        self.on_screen_time
    }

    /// Sequence length in seconds at 1x speed
    pub fn duration(&self) -> f32 {
        self.num_frames as f32 * self.frame_duration
    }

    // === Timing ===

    /// True while waiting for the first frame after a load
    pub fn is_forced(&self) -> bool {
        self.on_screen_time < 0.0
    }

    /// Start timing the current frame (called when it is first presented)
    pub fn clear_force(&mut self) {
        if self.is_forced() {
            self.on_screen_time = 0.0;
        }
    }

    /// Add elapsed tick time while playing
    pub fn accumulate(&mut self, dt: f32) {
        if self.playing && !self.is_forced() {
            self.on_screen_time += dt * self.speed;
        }
    }

    /// Current frame has been on screen long enough
    pub fn is_due(&self) -> bool {
        self.playing && self.on_screen_time >= self.frame_duration
    }

    /// Looping policy allows leaving the current frame
    pub fn can_advance(&self) -> bool {
        self.looping || self.current != self.end_index()
    }

    /// Pay for the frame that is about to be left
    pub fn consume_frame_time(&mut self) {
        self.on_screen_time -= self.frame_duration;
    }

    /// Last frame in the current direction of travel
    fn end_index(&self) -> usize {
        if self.reversing { 0 } else { self.num_frames.saturating_sub(1) }
    }

    // === Transport ===

    /// Move the playhead one frame in the current direction
    pub fn step(&mut self) -> Crossing {
        if self.num_frames == 0 {
            return Crossing::None;
        }

        let from = self.current;
        let next = if self.reversing {
            from as i64 - 1
        } else {
            from as i64 + 1
        };

        let (index, crossing) = self.handle_looping(next);
        self.previous = Some(from);
        self.current = index;

        if crossing == Crossing::None
            && !self.looping
            && index == self.end_index()
            && index != from
        {
            self.playing = false;
            debug!("Reached last frame {}, playback stopped", index);
            return Crossing::Ended;
        }
        crossing
    }

    /// Resolve an out-of-range index produced by a step
    fn handle_looping(&mut self, next: i64) -> (usize, Crossing) {
        let last = self.num_frames - 1;

        if next >= self.num_frames as i64 {
            if !self.looping {
                self.playing = false;
                return (last, Crossing::None);
            }
            if self.reverse_at_loop {
                self.reversing = true;
                return (last, Crossing::Looped);
            }
            return (0, Crossing::Looped);
        }

        if next < 0 {
            if !self.looping {
                self.playing = false;
                return (0, Crossing::None);
            }
            if self.reverse_at_loop {
                self.reversing = false;
                return (0, Crossing::Looped);
            }
            return (last, Crossing::Looped);
        }

        (next as usize, Crossing::None)
    }

    /// Jump to `frame`, clamped to [0, N). Returns the resulting index.
    pub fn seek(&mut self, frame: i64) -> usize {
        if self.num_frames == 0 {
            return 0;
        }
        let last = (self.num_frames - 1) as i64;
        let target = frame.clamp(0, last) as usize;
        if target as i64 != frame {
            debug!("Seek to {} out of range, clamped to {}", frame, target);
        }

        self.previous = Some(self.current);
        self.current = target;
        self.on_screen_time = 0.0;
        target
    }

    /// Frame index for a normalized position: floor(pos * (N-1))
    pub fn frame_for_position(&self, pos: f32) -> usize {
        if self.num_frames < 2 {
            return 0;
        }
        let last = (self.num_frames - 1) as f64;
        ((pos.clamp(0.0, 1.0) as f64) * last).floor() as usize
    }

    /// Normalized playhead position in [0, 1]
    pub fn position(&self) -> f32 {
        if self.num_frames < 2 {
            return 0.0;
        }
        self.current as f32 / (self.num_frames - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(n: usize, looping: bool, reverse_at_loop: bool) -> PlaybackClock {
        let mut c = PlaybackClock::new(reverse_at_loop);
        c.reset(n, 0.1);
        c.set_looping(looping);
        c.set_playing(true);
        c
    }

    #[test]
    fn test_reset_forces_presentation() {
        let mut c = clock(5, true, false);
        assert!(c.is_forced());
        c.accumulate(1.0);
        assert!(!c.is_due());

        c.clear_force();
        assert_eq!(c.on_screen_time(), 0.0);
        c.accumulate(0.1);
        assert!(c.is_due());
    }

    #[test]
    fn test_speed_scales_time() {
        let mut c = clock(5, true, false);
        c.clear_force();
        c.set_speed(2.0);
        c.accumulate(0.05);
        assert!(c.is_due());
    }

    #[test]
    fn test_paused_clock_does_not_accumulate() {
        let mut c = clock(5, true, false);
        c.clear_force();
        c.set_playing(false);
        c.accumulate(1.0);
        assert_eq!(c.on_screen_time(), 0.0);
        assert!(!c.is_due());
    }

    #[test]
    fn test_loop_wraps_to_start() {
        let mut c = clock(3, true, false);
        assert_eq!(c.step(), Crossing::None);
        assert_eq!(c.step(), Crossing::None);
        assert_eq!(c.current(), 2);
        assert_eq!(c.step(), Crossing::Looped);
        assert_eq!(c.current(), 0);
        assert!(c.is_playing());
    }

    #[test]
    fn test_one_loop_event_per_crossing() {
        let mut c = clock(4, true, false);
        let loops = (0..12).filter(|_| c.step() == Crossing::Looped).count();
        assert_eq!(loops, 3);
    }

    #[test]
    fn test_reverse_at_loop_bounces() {
        let mut c = clock(3, true, true);
        c.step();
        c.step();
        assert_eq!(c.step(), Crossing::Looped);
        assert_eq!(c.current(), 2);
        assert!(c.is_reversing());

        assert_eq!(c.step(), Crossing::None);
        assert_eq!(c.current(), 1);
        assert_eq!(c.step(), Crossing::None);
        assert_eq!(c.current(), 0);

        assert_eq!(c.step(), Crossing::Looped);
        assert_eq!(c.current(), 0);
        assert!(!c.is_reversing());
        assert_eq!(c.step(), Crossing::None);
        assert_eq!(c.current(), 1);
    }

    #[test]
    fn test_no_loop_stops_at_end_once() {
        let mut c = clock(3, false, false);
        assert_eq!(c.step(), Crossing::None);
        assert!(c.can_advance());
        assert_eq!(c.step(), Crossing::Ended);
        assert_eq!(c.current(), 2);
        assert!(!c.is_playing());
        assert!(!c.can_advance());

        // Manual push past the end clamps silently
        assert_eq!(c.step(), Crossing::None);
        assert_eq!(c.current(), 2);
    }

    #[test]
    fn test_seek_clamps() {
        let mut c = clock(5, true, false);
        assert_eq!(c.seek(3), 3);
        assert_eq!(c.seek(99), 4);
        assert_eq!(c.seek(-7), 0);
        assert_eq!(c.previous(), Some(4));
        assert_eq!(c.on_screen_time(), 0.0);
    }

    #[test]
    fn test_position_round_trip() {
        for n in [2usize, 3, 7, 100, 1001] {
            let mut c = clock(n, true, false);
            for k in 0..=20 {
                let p = k as f32 / 20.0;
                let frame = c.frame_for_position(p);
                c.seek(frame as i64);
                assert!(c.current() < n);
                let tol = 1.0 / (n - 1) as f32 + 1e-6;
                assert!((c.position() - p).abs() <= tol, "n={} p={} got {}", n, p, c.position());
            }
        }
    }

    #[test]
    fn test_duration() {
        let c = clock(50, true, false);
        assert!((c.duration() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_mode_from_workers() {
        assert_eq!(PlaybackMode::from_workers(0), PlaybackMode::Immediate);
        assert_eq!(PlaybackMode::from_workers(3), PlaybackMode::Deferred);
    }
}
