//! Sentence-by-sentence speech synthesis with an on-disk clip cache.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_utils::artifact;
use tracing::{debug, info, instrument, warn};

use crate::errors::{NarrationError, SynthesisError};

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Writes speech for `text` to `output`.
    async fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<(), SynthesisError>;

    /// Duration of an audio file in seconds.
    async fn measure(&self, clip: &Path) -> Result<f64, SynthesisError>;
}

/// One narrated sentence and its measured length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationClip {
    pub index: usize,
    pub text: String,
    pub path: PathBuf,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(3000),
        }
    }
}

/// File name of clip `index`: `00.mp3`, `01.mp3`, ...
pub fn clip_file_name(index: usize) -> String {
    format!("{index:02}.mp3")
}

pub struct Narrator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: String,
    policy: RetryPolicy,
    audio_dir: PathBuf,
}

impl Narrator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice: impl Into<String>,
        policy: RetryPolicy,
        audio_dir: impl Into<PathBuf>,
    ) -> Result<Self, NarrationError> {
        if policy.max_attempts == 0 {
            return Err(NarrationError::InvalidSetting(
                "max_retries must be at least 1".into(),
            ));
        }
        Ok(Self {
            synthesizer,
            voice: voice.into(),
            policy,
            audio_dir: audio_dir.into(),
        })
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Synthesizes every sentence in order and measures it.
    ///
    /// Clips already on disk are reused. Any clip that still fails after the
    /// retry budget fails the whole narration.
    #[instrument(skip_all, fields(sentences = sentences.len(), voice = %self.voice))]
    pub async fn narrate(&self, sentences: &[String]) -> Result<Vec<NarrationClip>, NarrationError> {
        tokio::fs::create_dir_all(&self.audio_dir).await?;

        let mut clips = Vec::with_capacity(sentences.len());
        for (index, text) in sentences.iter().enumerate() {
            let path = self.audio_dir.join(clip_file_name(index));
            if artifact::is_complete(&path).await {
                debug!(index, "narration clip cached");
            } else {
                self.synthesize_with_retry(index, text, &path).await?;
            }

            let duration = self
                .synthesizer
                .measure(&path)
                .await
                .map_err(|source| NarrationError::Measure {
                    path: path.clone(),
                    source,
                })?;
            if !duration.is_finite() || duration < 0.0 {
                return Err(NarrationError::InvalidDuration { path, duration });
            }
            clips.push(NarrationClip {
                index,
                text: text.clone(),
                path,
                duration,
            });
        }

        info!(clips = clips.len(), "narration ready");
        Ok(clips)
    }

    async fn synthesize_with_retry(&self, index: usize, text: &str, path: &Path) -> Result<(), NarrationError> {
        let partial = artifact::partial_path(path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.synthesizer.synthesize(text, &self.voice, &partial).await {
                Ok(()) => artifact::promote(&partial, path).await.map_err(SynthesisError::from),
                Err(e) => Err(e),
            };
            let error = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            let _ = artifact::discard(&partial).await;
            if attempt >= self.policy.max_attempts {
                return Err(NarrationError::Exhausted {
                    index,
                    attempts: attempt,
                    last_error: error,
                });
            }
            warn!(index, attempt, error = %error, "speech synthesis failed; retrying");
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_names_are_two_digit() {
        assert_eq!(clip_file_name(0), "00.mp3");
        assert_eq!(clip_file_name(7), "07.mp3");
        assert_eq!(clip_file_name(123), "123.mp3");
    }

    #[test]
    fn default_policy_is_three_attempts_three_seconds() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay, Duration::from_secs(3));
    }
}
