//! Presentation collaborator interface.
//!
//! The engine never uploads or draws anything itself. Hosts implement `Presenter`
//! to turn a decoded payload into a display-ready resource (a GPU texture, a
//! framebuffer blit, a file on disk). All calls happen on the tick thread.

use super::frame::{FramePayload, TextureHandle};

pub trait Presenter {
    /// Make `payload` (frame `frame` of the active sequence) displayable.
    ///
    /// Returns a handle when the resource can be reused later. With a persistent
    /// texture cache the handle is stored on the frame record and the CPU payload
    /// is released.
    fn upload(&mut self, frame: usize, payload: &FramePayload) -> Option<TextureHandle>;

    /// Free a resource previously returned by `upload`
    fn release(&mut self, _handle: TextureHandle) {}
}
