//! Commands sent from the scheduling thread to the audio thread via ring buffer.

use crate::tone::ClickTone;

/// Commands sent from the scheduling thread to the audio thread via ring buffer.
#[derive(Debug, Clone, Copy)]
pub enum AudioCommand {
    /// Start a click on an absolute output frame. A frame already in the past
    /// starts on the next rendered frame.
    Schedule { start_frame: u64, tone: ClickTone },

    /// Set master volume (0.0 to 1.0).
    SetVolume(f32),
}
