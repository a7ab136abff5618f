//! The ordered, side-effecting filter pipeline.
//!
//! Filters come in four closed variants — Replace, Color, Notify and
//! Forward — assembled from enabled configuration entries into a
//! [`FilterChain`]. Replace filters rewrite the accumulator text, Color
//! filters pick a highlight color (last writer wins), Notify filters fire
//! sound cues, and Forward filters hand the line to bound match
//! processors, any of which can terminate the pipeline.

pub mod chain;
pub mod filter;
pub mod processor;
pub mod sound;

pub use chain::{FilterChain, Outcome};
pub use filter::{ColorFilter, Filter, ForwardFilter, ForwardSignal, NotifyFilter, ReplaceFilter};
pub use processor::{MatchProcessor, ProcessorId, ProcessorRegistry};
pub use sound::{NullSoundPlayer, SoundCue, SoundPlayer};
