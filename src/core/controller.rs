//! Sequence controller: public playback API
//!
//! Owns one generation ring, the loader pool, the buffer window and the clock,
//! and drives all of them from a single cooperative `update(dt)` tick.
//!
//! # Tick Order
//!
//! 1. Poll finished decodes
//! 2. Accumulate `dt * speed` while playing
//! 3. Advance one frame if due, the current frame has been presented, and looping allows
//! 4. Present the frame under the playhead if it is ready and not yet shown
//! 5. Refresh smoothed fullness
//! 6. Dispatch prefetch work (deferred mode)
//!
//! # Modes
//!
//! Worker count > 0 selects deferred mode: the playhead waits for data and never
//! drops a frame. Zero workers selects immediate mode: `advance` and `seek` decode
//! the target frame inline and block until it is ready.
//!
//! # Lifecycle
//!
//! Configuration is fixed by the first successful `load`. Loading again moves to a
//! new generation; old tasks finish into the old table. Dropping the controller
//! blocks until every task of every retained generation has finished.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::System;

use super::buffer::BufferManager;
use super::clock::{Crossing, PlaybackClock, PlaybackMode};
use super::error::SequenceError;
use super::event_bus::{ControllerId, EventBus, EventInfo, SequenceEnded, SequenceLooped};
use super::generations::GenerationRing;
use super::loader_pool::LoaderPool;
use super::stats::PlaybackStatus;
use crate::config::PlayerConfig;
use crate::entities::{Decode, Decoder, FramePayload, FrameTable, LoadState, Presenter, TextureHandle};
use crate::utils::list_frames;

/// Minimum number of files a sequence needs
pub const MIN_FRAMES: usize = 2;

pub struct SequenceController {
    id: ControllerId,
    config: PlayerConfig,
    mode: PlaybackMode,
    decoder: Decoder,
    pool: Option<LoaderPool>, // Created by the first load, config is locked from then on
    ring: GenerationRing,
    buffer: BufferManager,
    clock: PlaybackClock,
    presenter: Option<Box<dyn Presenter>>,
    event_bus: EventBus,
    status: Arc<PlaybackStatus>,
    source: Option<PathBuf>,

    presented: Option<(u64, usize)>, // (generation, frame) last handed to presentation
    current_texture: Option<TextureHandle>,
    frame_size: Option<(usize, usize)>,
    data_changed: bool,
}

impl std::fmt::Debug for SequenceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceController")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("source", &self.source)
            .field("current", &self.clock.current())
            .field("num_frames", &self.clock.num_frames())
            .field("pool", &self.pool)
            .finish()
    }
}

impl Default for SequenceController {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceController {
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default())
    }

    pub fn with_config(config: PlayerConfig) -> Self {
        let mut clock = PlaybackClock::new(config.reverse_at_loop);
        clock.set_looping(config.loop_enabled);
        if config.playback_speed > 0.0 && config.playback_speed.is_finite() {
            clock.set_speed(config.playback_speed);
        }

        Self {
            id: ControllerId::new(),
            mode: PlaybackMode::from_workers(config.workers),
            decoder: Decoder::from_mode(config.decode_mode),
            pool: None,
            ring: GenerationRing::new(),
            buffer: BufferManager::new(config.buffer_frames),
            clock,
            presenter: None,
            event_bus: EventBus::new(),
            status: Arc::new(PlaybackStatus::new()),
            source: None,
            presented: None,
            current_texture: None,
            frame_size: None,
            data_changed: false,
            config,
        }
    }

    // === Configuration ===

    /// Set worker count, buffer window, texture caching and reverse-at-loop.
    ///
    /// Must precede the first `load`; afterwards the values are fixed.
    pub fn configure(
        &mut self,
        workers: usize,
        buffer_frames: usize,
        persist_gpu_cache: bool,
        reverse_at_loop: bool,
    ) -> Result<(), SequenceError> {
        if self.pool.is_some() {
            warn!("configure() ignored: sequence already loaded");
            return Err(SequenceError::ConfigLocked);
        }
        self.config.workers = workers;
        self.config.buffer_frames = buffer_frames;
        self.config.persist_gpu_cache = persist_gpu_cache;
        self.config.reverse_at_loop = reverse_at_loop;

        self.mode = PlaybackMode::from_workers(workers);
        self.buffer = BufferManager::new(buffer_frames);
        self.clock.set_reverse_at_loop(reverse_at_loop);

        info!(
            "Configured: {} mode, {} workers, buffer {} frames, persist_gpu={}, reverse_at_loop={}",
            self.mode.label(),
            workers,
            self.buffer.window(),
            persist_gpu_cache,
            reverse_at_loop
        );
        Ok(())
    }

    /// Replace the decode strategy (before the first `load` only)
    pub fn set_decoder(&mut self, decoder: Decoder) -> Result<(), SequenceError> {
        if self.pool.is_some() {
            return Err(SequenceError::ConfigLocked);
        }
        debug!("Decoder set to {}", decoder.label());
        self.decoder = decoder;
        Ok(())
    }

    pub fn set_presenter(&mut self, presenter: Box<dyn Presenter>) {
        self.presenter = Some(presenter);
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    // === Loading ===

    /// Load the image sequence at `path` (directory or glob) played at `fps`.
    ///
    /// On error the previously loaded sequence, if any, keeps playing untouched.
    pub fn load(&mut self, path: impl AsRef<Path>, fps: f32) -> Result<(), SequenceError> {
        let path = path.as_ref();
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(SequenceError::InvalidFrameRate(fps));
        }

        let extensions = self.decoder.extensions().to_vec();
        let paths = list_frames(path, &extensions)?;
        if paths.len() < MIN_FRAMES {
            warn!(
                "Not enough frames in {} ({} found)",
                path.display(),
                paths.len()
            );
            return Err(SequenceError::NotEnoughFrames {
                path: path.to_path_buf(),
                found: paths.len(),
            });
        }

        if self.pool.is_none() {
            self.pool = Some(LoaderPool::new(self.config.workers, self.decoder.clone())?);
        }

        if let Some(old) = self.ring.active().cloned() {
            let handles: Vec<TextureHandle> = old.iter().filter_map(|r| r.flush()).collect();
            self.release_textures(handles);
        }

        let num_frames = paths.len();
        let table = self.ring.advance(paths);
        self.source = Some(path.to_path_buf());
        self.clock.reset(num_frames, 1.0 / fps);
        self.buffer.reset();
        self.presented = None;
        self.frame_size = None;
        self.data_changed = false;

        info!(
            "Loaded {} frames from {} at {} fps (gen {}, {} mode)",
            num_frames,
            path.display(),
            fps,
            table.generation(),
            self.mode.label()
        );

        match self.mode {
            PlaybackMode::Immediate => self.load_immediate(&table, None, 0),
            PlaybackMode::Deferred => self.dispatch(&table),
        }
        self.publish_status();
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.ring.active().is_some()
    }

    // === Tick ===

    /// Run one tick. `dt` is the elapsed host time in seconds.
    pub fn update(&mut self, dt: f32) {
        self.data_changed = false;
        let Some(table) = self.ring.active().cloned() else {
            return;
        };

        if let Some(pool) = self.pool.as_mut() {
            pool.poll();
        }

        self.clock.accumulate(dt);

        let shown = self.presented == Some((table.generation(), self.clock.current()));
        if shown && self.clock.is_due() && self.clock.can_advance() {
            self.clock.consume_frame_time();
            self.advance(&table);
        }

        self.present(&table);
        self.buffer.update_fullness(&table, self.clock.current());

        if self.mode == PlaybackMode::Deferred {
            self.dispatch(&table);
        }
        self.publish_status();
    }

    /// Move the playhead one frame and handle what it leaves behind
    fn advance(&mut self, table: &Arc<FrameTable>) {
        let prev = self.clock.current();
        let crossing = self.clock.step();
        let current = self.clock.current();

        match self.mode {
            PlaybackMode::Deferred => {
                if current != prev {
                    let record = table.record(prev);
                    if record.has_payload() {
                        record.evict();
                    }
                    self.buffer.evict_out_of_window(table, current);
                }
            }
            PlaybackMode::Immediate => self.load_immediate(table, Some(prev), current),
        }

        match crossing {
            Crossing::Looped => {
                debug!("Sequence looped at frame {}", current);
                self.event_bus.emit(SequenceLooped(self.event_info()));
            }
            Crossing::Ended => {
                info!("Sequence ended at frame {}", current);
                self.event_bus.emit(SequenceEnded(self.event_info()));
            }
            Crossing::None => {}
        }
    }

    /// Decode `target` inline, dropping the frame the playhead left
    fn load_immediate(&mut self, table: &FrameTable, prev: Option<usize>, target: usize) {
        let record = table.record(target);
        if prev == Some(target) && record.has_payload() {
            return;
        }
        if let Some(prev) = prev.filter(|&p| p != target) {
            table.record(prev).evict();
        }
        if self.config.persist_gpu_cache && record.is_gpu_loaded() {
            return;
        }
        if let Some(pool) = self.pool.as_mut() {
            pool.load_now(table, target);
        }
    }

    /// Hand the frame under the playhead to the presenter, once per frame
    fn present(&mut self, table: &FrameTable) {
        let idx = self.clock.current();
        let key = (table.generation(), idx);
        if self.presented == Some(key) {
            return;
        }

        let persist = self.config.persist_gpu_cache;
        let record = table.record(idx);

        if self.mode == PlaybackMode::Immediate
            && record.state() == LoadState::NotLoaded
            && !(persist && record.is_gpu_loaded())
        {
            if let Some(pool) = self.pool.as_mut() {
                pool.load_now(table, idx);
            }
        }

        let texture = match record.gpu() {
            Some(handle) if persist => Some(handle),
            _ => {
                if !record.state().is_ready() {
                    return;
                }
                let Some(payload) = record.payload() else {
                    return;
                };
                let handle = self
                    .presenter
                    .as_mut()
                    .and_then(|p| p.upload(idx, &payload));
                if let (true, Some(h)) = (persist, handle) {
                    record.set_gpu(h);
                    record.release_payload();
                }
                if let Some(size) = payload.resolution() {
                    self.frame_size = Some(size);
                }
                handle
            }
        };

        // Persistent textures belong to their records, the rest is ours to free
        if !persist {
            if let Some(old) = self.current_texture.take().filter(|&old| Some(old) != texture) {
                if let Some(p) = self.presenter.as_mut() {
                    p.release(old);
                }
            }
        }
        self.current_texture = texture;

        record.mark_active();
        self.presented = Some(key);
        self.data_changed = true;
        self.clock.clear_force();
        self.status.record_presented();
    }

    fn dispatch(&mut self, table: &Arc<FrameTable>) {
        if let Some(pool) = self.pool.as_mut() {
            pool.dispatch(
                table,
                self.clock.current(),
                &self.buffer,
                self.config.persist_gpu_cache,
            );
        }
    }

    fn release_textures(&mut self, mut handles: Vec<TextureHandle>) {
        if let Some(current) = self.current_texture.take() {
            if !handles.contains(&current) {
                handles.push(current);
            }
        }
        if let Some(p) = self.presenter.as_mut() {
            for handle in handles {
                p.release(handle);
            }
        }
    }

    fn publish_status(&self) {
        self.status.publish(
            self.clock.current(),
            self.clock.num_frames(),
            self.outstanding_tasks(),
            self.buffer.fullness(),
            self.avg_load_ms(),
            self.clock.is_playing(),
        );
    }

    fn event_info(&self) -> EventInfo {
        EventInfo {
            controller: self.id,
            sequence_path: self.source.clone().unwrap_or_default(),
            frame_size: self.frame_size,
            frame_duration: self.clock.frame_duration(),
        }
    }

    // === Transport ===

    pub fn play(&mut self) {
        if !self.is_loaded() {
            debug!("play() ignored: nothing loaded");
            return;
        }
        self.clock.set_playing(true);
        self.publish_status();
    }

    pub fn pause(&mut self) {
        if !self.is_loaded() {
            return;
        }
        self.clock.set_playing(false);
        self.publish_status();
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.config.loop_enabled = looping;
        self.clock.set_looping(looping);
    }

    /// Speed multiplier, must be > 0
    pub fn set_playback_speed(&mut self, speed: f32) {
        if !(speed > 0.0 && speed.is_finite()) {
            warn!("Ignoring playback speed {}", speed);
            return;
        }
        self.config.playback_speed = speed;
        self.clock.set_speed(speed);
    }

    /// Change the frame rate of the loaded sequence
    pub fn set_playback_framerate(&mut self, fps: f32) {
        if !(fps > 0.0 && fps.is_finite()) {
            warn!("Ignoring frame rate {}", fps);
            return;
        }
        self.clock.set_frame_duration(1.0 / fps);
    }

    /// Jump to `frame`, clamped to the sequence
    pub fn seek_to_frame(&mut self, frame: i64) {
        let Some(table) = self.ring.active().cloned() else {
            debug!("seek ignored: nothing loaded");
            return;
        };

        let prev = self.clock.current();
        let target = self.clock.seek(frame);

        match self.mode {
            PlaybackMode::Deferred => {
                self.buffer.evict_out_of_window(&table, target);
                self.dispatch(&table);
            }
            PlaybackMode::Immediate => self.load_immediate(&table, Some(prev), target),
        }
        self.present(&table);
        self.publish_status();
    }

    /// Jump to a normalized position in [0, 1]
    pub fn set_position(&mut self, pos: f32) {
        let frame = self.clock.frame_for_position(pos);
        self.seek_to_frame(frame as i64);
    }

    /// Step one frame in the current direction regardless of timing
    pub fn advance_one_frame(&mut self) {
        let Some(table) = self.ring.active().cloned() else {
            return;
        };
        self.advance(&table);
        self.present(&table);
        if self.mode == PlaybackMode::Deferred {
            self.dispatch(&table);
        }
        self.publish_status();
    }

    /// Drop every decoded frame and texture of the active sequence
    pub fn erase_all_cache(&mut self) {
        let Some(table) = self.ring.active().cloned() else {
            return;
        };
        let handles = self.buffer.evict_all(&table);
        self.release_textures(handles);
        self.presented = None;

        match self.mode {
            PlaybackMode::Immediate => self.load_immediate(&table, None, self.clock.current()),
            PlaybackMode::Deferred => self.dispatch(&table),
        }
        info!("Cache erased (gen {})", table.generation());
        self.publish_status();
    }

    // === Accessors ===

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn sequence_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn current_frame(&self) -> usize {
        self.clock.current()
    }

    pub fn num_frames(&self) -> usize {
        self.clock.num_frames()
    }

    /// Normalized playhead position in [0, 1]
    pub fn position(&self) -> f32 {
        self.clock.position()
    }

    /// Sequence length in seconds at 1x speed
    pub fn duration(&self) -> f32 {
        self.clock.duration()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.clock.is_looping()
    }

    pub fn is_reversing(&self) -> bool {
        self.clock.is_reversing()
    }

    pub fn playback_speed(&self) -> f32 {
        self.clock.speed()
    }

    /// A new frame was presented during the last tick.
    ///
    /// Cleared at the start of every `update`, so a frame presented by `seek_to_frame`
    /// or `advance_one_frame` is only reported until the next tick.
    pub fn data_changed(&self) -> bool {
        self.data_changed
    }

    /// Decoded payload of the frame under the playhead
    pub fn current_payload(&self) -> Option<Arc<FramePayload>> {
        let table = self.ring.active()?;
        table.get(self.clock.current())?.payload()
    }

    /// Texture returned by the presenter for the frame on screen
    pub fn current_texture(&self) -> Option<TextureHandle> {
        self.current_texture
    }

    /// Resolution of the last presented frame
    pub fn frame_size(&self) -> Option<(usize, usize)> {
        self.frame_size
    }

    pub fn frame_states(&self) -> Vec<LoadState> {
        self.ring.active().map(|t| t.states()).unwrap_or_default()
    }

    pub fn generation(&self) -> Option<u64> {
        self.ring.active().map(|t| t.generation())
    }

    pub fn outstanding_tasks(&self) -> usize {
        self.pool.as_ref().map(|p| p.outstanding_count()).unwrap_or(0)
    }

    pub fn avg_load_ms(&self) -> f32 {
        self.pool.as_ref().map(|p| p.avg_load_ms()).unwrap_or(0.0)
    }

    pub fn fullness(&self) -> f32 {
        self.buffer.fullness()
    }

    pub fn buffer_window(&self) -> usize {
        self.buffer.window()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Status counters readable from any thread
    pub fn status(&self) -> Arc<PlaybackStatus> {
        Arc::clone(&self.status)
    }

    /// Bytes held by decoded payloads of the active sequence
    pub fn resident_bytes(&self) -> usize {
        self.ring.active().map(|t| t.resident_bytes()).unwrap_or(0)
    }

    /// One-line diagnostics: mode, occupancy, decode latency, tasks in flight
    pub fn status_line(&self) -> String {
        format!(
            "{} | frame {}/{} | buffer {:.0}% of {} | avg decode {:.1}ms | {} tasks",
            self.mode.label(),
            self.clock.current(),
            self.clock.num_frames(),
            self.buffer.fullness() * 100.0,
            self.buffer.effective_window(self.clock.num_frames()),
            self.avg_load_ms(),
            self.outstanding_tasks()
        )
    }

    /// One glyph per frame (`.` not loaded, `o` loading, `R` ready, `A` active),
    /// playhead wrapped in brackets
    pub fn state_strip(&self) -> String {
        let current = self.clock.current();
        let mut strip = String::new();
        for (i, state) in self.frame_states().into_iter().enumerate() {
            if i == current {
                strip.push('[');
                strip.push(state.glyph());
                strip.push(']');
            } else {
                strip.push(state.glyph());
            }
        }
        strip
    }

    // === Capacity ===

    /// Memory needed to keep the whole sequence decoded: one representative frame
    /// times the frame count. Decodes frame 0 if nothing is resident yet.
    pub fn estimate_memory_bytes(&self) -> Result<u64, SequenceError> {
        let table = self.ring.active().ok_or(SequenceError::NotLoaded)?;

        let resident = table
            .iter()
            .filter_map(|r| r.payload())
            .find(|p| !p.is_empty())
            .map(|p| p.mem());

        let per_frame = match resident {
            Some(bytes) => bytes,
            None => {
                let path = table.record(0).path();
                debug!("Capacity query: decoding {}", path.display());
                self.decoder
                    .decode(path)
                    .map_err(|e| SequenceError::CapacityQuery {
                        reason: format!("cannot decode {}", path.display()),
                        source: Some(e),
                    })?
                    .mem()
            }
        };

        if per_frame == 0 {
            return Err(SequenceError::CapacityQuery {
                reason: "representative frame is empty".into(),
                source: None,
            });
        }
        Ok(per_frame as u64 * table.len() as u64)
    }

    /// Whether the whole sequence fits in currently available system memory
    pub fn fits_in_memory(&self) -> Result<bool, SequenceError> {
        let needed = self.estimate_memory_bytes()?;
        let mut sys = System::new();
        sys.refresh_memory();
        let available = sys.available_memory();
        debug!("Capacity: need {} bytes, {} available", needed, available);
        Ok(needed <= available)
    }
}

impl Drop for SequenceController {
    fn drop(&mut self) {
        let pending = self.ring.pending_tasks();
        if pending > 0 {
            info!("Waiting for {} decode tasks before shutdown", pending);
        }
        self.ring.drain_all();

        // Older generations gave their textures back on load
        if let Some(table) = self.ring.active().cloned() {
            let handles = table.iter().filter_map(|r| r.flush()).collect();
            self.release_textures(handles);
        }
        // Pool drops next and joins the worker threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{FrameError, PixelBuffer, PixelImage};
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct FlatDecoder;

    impl Decode for FlatDecoder {
        fn decode(&self, _path: &Path) -> Result<FramePayload, FrameError> {
            Ok(FramePayload::Pixels(PixelImage {
                width: 4,
                height: 2,
                channels: 3,
                buffer: PixelBuffer::U8(vec![7; 24]),
            }))
        }

        fn extensions(&self) -> &[&'static str] {
            &["png"]
        }
    }

    fn sequence_dir(n: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..n {
            fs::write(dir.path().join(format!("frame_{:04}.png", i)), b"stub").unwrap();
        }
        dir
    }

    fn controller(workers: usize, buffer: usize) -> SequenceController {
        let mut c = SequenceController::new();
        c.configure(workers, buffer, false, false).unwrap();
        c.set_decoder(Decoder::custom(Arc::new(FlatDecoder))).unwrap();
        c
    }

    /// Tick until `cond` holds or the timeout expires
    fn tick_until(c: &mut SequenceController, dt: f32, cond: impl Fn(&SequenceController) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            c.update(dt);
            if cond(c) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_configure_locked_after_load() {
        let dir = sequence_dir(3);
        let mut c = controller(1, 2);
        c.load(dir.path(), 24.0).unwrap();
        assert!(matches!(c.configure(2, 2, false, false), Err(SequenceError::ConfigLocked)));
        assert!(matches!(
            c.set_decoder(Decoder::custom(Arc::new(FlatDecoder))),
            Err(SequenceError::ConfigLocked)
        ));
    }

    #[test]
    fn test_invalid_frame_rate() {
        let dir = sequence_dir(3);
        let mut c = controller(1, 2);
        assert!(matches!(c.load(dir.path(), 0.0), Err(SequenceError::InvalidFrameRate(_))));
        assert!(!c.is_loaded());
    }

    #[test]
    fn test_play_without_sequence_is_noop() {
        let mut c = controller(1, 2);
        c.play();
        assert!(!c.is_playing());
        c.update(0.1);
        c.seek_to_frame(3);
        assert_eq!(c.current_frame(), 0);
    }

    #[test]
    fn test_speed_must_be_positive() {
        let mut c = controller(1, 2);
        c.set_playback_speed(2.0);
        c.set_playback_speed(0.0);
        c.set_playback_speed(-1.0);
        c.set_playback_speed(f32::NAN);
        assert_eq!(c.playback_speed(), 2.0);
    }

    #[test]
    fn test_first_frame_sets_data_changed() {
        let dir = sequence_dir(4);
        let mut c = controller(2, 2);
        c.load(dir.path(), 10.0).unwrap();
        assert!(tick_until(&mut c, 0.0, |c| c.data_changed()));
        assert_eq!(c.current_frame(), 0);
        assert_eq!(c.frame_size(), Some((4, 2)));

        // Nothing new on the next tick while paused
        c.update(0.0);
        assert!(!c.data_changed());
    }

    #[test]
    fn test_capacity_estimate() {
        let dir = sequence_dir(5);
        let mut c = controller(0, 2);
        assert!(matches!(c.estimate_memory_bytes(), Err(SequenceError::NotLoaded)));
        c.load(dir.path(), 10.0).unwrap();
        assert_eq!(c.estimate_memory_bytes().unwrap(), 24 * 5);
    }

    #[test]
    fn test_status_line_and_strip() {
        let dir = sequence_dir(3);
        let mut c = controller(0, 2);
        c.load(dir.path(), 10.0).unwrap();
        c.update(0.0);
        assert!(c.status_line().starts_with("immediate"));
        assert_eq!(c.state_strip(), "[A]..");
        assert_eq!(c.status().num_frames(), 3);
    }

    #[test]
    fn test_erase_all_cache_reloads_current() {
        let dir = sequence_dir(4);
        let mut c = controller(2, 4);
        c.load(dir.path(), 10.0).unwrap();
        assert!(tick_until(&mut c, 0.0, |c| c.frame_states().iter().all(|s| s.is_ready())));

        c.erase_all_cache();
        assert!(c.resident_bytes() == 0 || c.outstanding_tasks() > 0);
        assert!(tick_until(&mut c, 0.0, |c| c.data_changed()));
        assert_eq!(c.current_frame(), 0);
    }

    struct BrokenDecoder;

    impl Decode for BrokenDecoder {
        fn decode(&self, path: &Path) -> Result<FramePayload, FrameError> {
            Err(FrameError::Image(format!("{}: truncated", path.display())))
        }

        fn extensions(&self) -> &[&'static str] {
            &["png"]
        }
    }

    #[test]
    fn test_capacity_query_reports_decode_failure() {
        let dir = sequence_dir(3);
        let mut c = SequenceController::new();
        c.configure(0, 2, false, false).unwrap();
        c.set_decoder(Decoder::custom(Arc::new(BrokenDecoder))).unwrap();
        c.load(dir.path(), 10.0).unwrap();

        // Frame 0 failed inline: ready but empty, so nothing can stand in for it
        assert_eq!(c.frame_states()[0], LoadState::ReadyForPresentation);
        match c.estimate_memory_bytes() {
            Err(SequenceError::CapacityQuery { source: Some(FrameError::Image(_)), .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(c.fits_in_memory().is_err());
    }

    #[test]
    fn test_seek_reports_data_until_next_tick() {
        let dir = sequence_dir(5);
        let mut c = controller(0, 2);
        c.load(dir.path(), 10.0).unwrap();
        c.update(0.0);

        c.seek_to_frame(3);
        assert!(c.data_changed());
        assert_eq!(c.current_frame(), 3);

        c.update(0.0);
        assert!(!c.data_changed());
        assert_eq!(c.current_frame(), 3);
    }
}
