//! From narration text and rendered frames to a timed composition.
//!
//! - [`script`] splits generated narration into sentences.
//! - [`narration`] synthesizes and measures one clip per sentence.
//! - [`composer`] lays frames, subtitles and audio on a single timeline.
//! - [`encoder`] hands the timeline to a video encoder.

pub mod composer;
pub mod encoder;
pub mod errors;
pub mod narration;
pub mod script;

pub use composer::{ComposerSettings, CompositionInput, TimedComposition, compose};
pub use errors::{CompositionError, EncodeError, NarrationError, SynthesisError};
pub use narration::{NarrationClip, Narrator, RetryPolicy, SpeechSynthesizer};
