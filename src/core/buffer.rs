//! Look-ahead buffer: window arithmetic, occupancy tracking and eviction
//!
//! The buffer window is `[playhead, playhead + window)` modulo the frame count.
//! Everything outside it is fair game for eviction; everything inside it is what
//! the loader pool tries to keep decoded.
//!
//! # Fullness
//!
//! Fraction of the window that is presentable, smoothed with an exponential
//! average so a single noisy tick can't flip the spawn throttle back and forth.

use log::debug;
use std::ops::Range;

use crate::entities::{FrameTable, TextureHandle};

/// Exponential smoothing factor for the fullness metric
pub const FULLNESS_SMOOTHING: f32 = 0.1;

/// Split `[start, start + len)` mod `n` into at most two linear ranges
pub fn wrapped_ranges(start: usize, len: usize, n: usize) -> (Range<usize>, Option<Range<usize>>) {
    if n == 0 || len == 0 {
        return (0..0, None);
    }
    let start = start % n;
    let len = len.min(n);
    let end = start + len;
    if end <= n {
        (start..end, None)
    } else {
        (start..n, Some(0..end - n))
    }
}

/// Bounded look-ahead window and its smoothed occupancy
#[derive(Debug, Clone)]
pub struct BufferManager {
    window: usize,
    fullness: f32,
}

impl BufferManager {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            fullness: 0.0,
        }
    }

    /// Configured window size (frames)
    pub fn window(&self) -> usize {
        self.window
    }

    /// Window size actually usable for a sequence of `n` frames
    pub fn effective_window(&self, n: usize) -> usize {
        self.window.min(n)
    }

    /// Window covers the whole sequence (no throttling, nothing out of window)
    pub fn spans(&self, n: usize) -> bool {
        self.window >= n
    }

    /// Smoothed fullness in [0, 1]
    pub fn fullness(&self) -> f32 {
        self.fullness
    }

    pub fn reset(&mut self) {
        self.fullness = 0.0;
    }

    /// Index ranges inside the window
    pub fn window_ranges(&self, playhead: usize, n: usize) -> (Range<usize>, Option<Range<usize>>) {
        wrapped_ranges(playhead, self.effective_window(n), n)
    }

    /// Index ranges outside the window
    pub fn outside_ranges(&self, playhead: usize, n: usize) -> (Range<usize>, Option<Range<usize>>) {
        let w = self.effective_window(n);
        wrapped_ranges(playhead + w, n - w, n)
    }

    /// True if `idx` lies in `[playhead, playhead + window)` mod n
    pub fn contains(&self, idx: usize, playhead: usize, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        (idx % n + n - playhead % n) % n < self.effective_window(n)
    }

    /// Recompute occupancy for this tick and fold it into the smoothed value
    pub fn update_fullness(&mut self, table: &FrameTable, playhead: usize) -> f32 {
        let n = table.len();
        let w = self.effective_window(n);
        if w == 0 {
            return self.fullness;
        }

        let (first, second) = self.window_ranges(playhead, n);
        let ranges: Vec<Range<usize>> = std::iter::once(first).chain(second).collect();
        let sample = table.count_presentable(&ranges) as f32 / w as f32;

        self.fullness += FULLNESS_SMOOTHING * (sample - self.fullness);
        self.fullness
    }

    /// Release every ready/active record outside the window. Returns how many were evicted.
    pub fn evict_out_of_window(&self, table: &FrameTable, playhead: usize) -> usize {
        let n = table.len();
        let (first, second) = self.outside_ranges(playhead, n);

        let evicted = first
            .chain(second.into_iter().flatten())
            .filter(|&i| table.record(i).evict())
            .count();

        if evicted > 0 {
            debug!(
                "Evicted {} frames outside window [{}, +{}) of gen {}",
                evicted,
                playhead,
                self.effective_window(n),
                table.generation()
            );
        }
        evicted
    }

    /// Flush every record, including GPU residency. Returns handles to free.
    pub fn evict_all(&mut self, table: &FrameTable) -> Vec<TextureHandle> {
        let handles: Vec<TextureHandle> = table.iter().filter_map(|r| r.flush()).collect();
        self.fullness = 0.0;
        debug!(
            "Flushed all frames of gen {} ({} textures released)",
            table.generation(),
            handles.len()
        );
        handles
    }
}
