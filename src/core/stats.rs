//! Playback status shared with other threads
//!
//! The tick thread owns all playback state; it publishes a snapshot here once per
//! tick so a UI or logging thread can read diagnostics without touching the controller.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Lock-free status counters, written by the tick thread
#[derive(Debug, Default)]
pub struct PlaybackStatus {
    current_frame: AtomicUsize,
    num_frames: AtomicUsize,
    outstanding: AtomicUsize,
    fullness: AtomicU32,    // f32 bits
    avg_load_ms: AtomicU32, // f32 bits
    playing: AtomicBool,
    frames_presented: AtomicU64,
}

impl PlaybackStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(
        &self,
        current_frame: usize,
        num_frames: usize,
        outstanding: usize,
        fullness: f32,
        avg_load_ms: f32,
        playing: bool,
    ) {
        self.current_frame.store(current_frame, Ordering::Relaxed);
        self.num_frames.store(num_frames, Ordering::Relaxed);
        self.outstanding.store(outstanding, Ordering::Relaxed);
        self.fullness.store(fullness.to_bits(), Ordering::Relaxed);
        self.avg_load_ms.store(avg_load_ms.to_bits(), Ordering::Relaxed);
        self.playing.store(playing, Ordering::Relaxed);
    }

    pub fn record_presented(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame.load(Ordering::Relaxed)
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames.load(Ordering::Relaxed)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    pub fn fullness(&self) -> f32 {
        f32::from_bits(self.fullness.load(Ordering::Relaxed))
    }

    pub fn avg_load_ms(&self) -> f32 {
        f32::from_bits(self.avg_load_ms.load(Ordering::Relaxed))
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented.load(Ordering::Relaxed)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "frame {}/{} | {} | buffer {:.0}% | {} in flight | avg {:.1}ms | {} presented",
            self.current_frame(),
            self.num_frames(),
            if self.is_playing() { "playing" } else { "paused" },
            self.fullness() * 100.0,
            self.outstanding(),
            self.avg_load_ms(),
            self.frames_presented()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_publish_and_read_from_other_thread() {
        let status = Arc::new(PlaybackStatus::new());
        status.publish(3, 10, 2, 0.5, 12.5, true);
        status.record_presented();

        let reader = Arc::clone(&status);
        let (frame, fullness, presented) = thread::spawn(move || {
            (reader.current_frame(), reader.fullness(), reader.frames_presented())
        })
        .join()
        .unwrap();

        assert_eq!(frame, 3);
        assert_eq!(fullness, 0.5);
        assert_eq!(presented, 1);
    }

    #[test]
    fn test_summary() {
        let status = PlaybackStatus::new();
        status.publish(1, 4, 0, 0.25, 3.0, false);
        let s = status.summary();
        assert!(s.contains("frame 1/4"));
        assert!(s.contains("paused"));
        assert!(s.contains("25%"));
    }
}
