//! Sound boundary: notify filters fire cues at a collaborator without
//! waiting on playback.

use tracing::debug;

/// What a notify filter asks the host to play.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundCue {
    pub sound: String,
    pub volume: f32,
    pub pitch: f32,
}

/// Platform playback collaborator. Implementations must not block the
/// processing thread; dispatch is fire-and-forget.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, cue: &SoundCue);
}

/// Drops cues on the floor, logging them. Useful for headless hosts and
/// tests.
#[derive(Debug, Default)]
pub struct NullSoundPlayer;

impl SoundPlayer for NullSoundPlayer {
    fn play(&self, cue: &SoundCue) {
        debug!(target: "sound", sound = %cue.sound, volume = cue.volume, pitch = cue.pitch, "discarding cue");
    }
}
