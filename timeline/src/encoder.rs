//! Hand-off of a composed timeline to a video encoder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use shared_utils::artifact;
use tracing::info;

use crate::{composer::TimedComposition, errors::EncodeError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeSettings {
    pub fps: u32,
    pub codec: String,
    pub threads: u32,
    pub width: u32,
    pub height: u32,
}

/// Produces a single output file from a composition.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// File name the encoder writes inside a run's output directory.
    fn output_file_name(&self) -> &str;

    async fn encode(
        &self,
        composition: &TimedComposition,
        settings: &EncodeSettings,
        output: &Path,
    ) -> Result<(), EncodeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    Written(PathBuf),
    /// The output already existed and `force` was not set.
    Skipped(PathBuf),
}

/// Runs `encoder` unless `output` already exists (or `force` is set).
pub async fn encode_unless_exists(
    encoder: &dyn VideoEncoder,
    composition: &TimedComposition,
    settings: &EncodeSettings,
    output: &Path,
    force: bool,
) -> Result<EncodeOutcome, EncodeError> {
    if !force && artifact::is_complete(output).await {
        info!(output = %output.display(), "output already exists, skipping encode");
        return Ok(EncodeOutcome::Skipped(output.to_path_buf()));
    }
    encoder.encode(composition, settings, output).await?;
    info!(output = %output.display(), "encoded");
    Ok(EncodeOutcome::Written(output.to_path_buf()))
}

#[derive(Serialize)]
struct Manifest<'a> {
    settings: &'a EncodeSettings,
    composition: &'a TimedComposition,
}

/// Writes the composition and settings as pretty JSON for an external encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestEncoder;

pub const MANIFEST_FILE_NAME: &str = "composition.json";

#[async_trait]
impl VideoEncoder for ManifestEncoder {
    fn output_file_name(&self) -> &str {
        MANIFEST_FILE_NAME
    }

    async fn encode(
        &self,
        composition: &TimedComposition,
        settings: &EncodeSettings,
        output: &Path,
    ) -> Result<(), EncodeError> {
        let body = serde_json::to_vec_pretty(&Manifest {
            settings,
            composition,
        })?;
        let partial = artifact::partial_path(output);
        tokio::fs::write(&partial, body).await?;
        artifact::promote(&partial, output).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::{SubtitleEntry, VisualEntry, VisualKind};

    fn settings() -> EncodeSettings {
        EncodeSettings {
            fps: 24,
            codec: "libx264".into(),
            threads: 4,
            width: 1920,
            height: 1080,
        }
    }

    fn composition() -> TimedComposition {
        TimedComposition {
            visuals: vec![VisualEntry {
                kind: VisualKind::Chart,
                asset: PathBuf::from("kline_0000_0000_0001.png"),
                start: 0.0,
                end: 4.2,
                opacity: 1.0,
            }],
            subtitles: vec![SubtitleEntry {
                text: "hello".into(),
                start: 0.0,
                end: 4.2,
            }],
            audio: vec![],
            title_caption: None,
            duration: 4.2,
        }
    }

    #[tokio::test]
    async fn manifest_is_written_then_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join(ManifestEncoder.output_file_name());

        let first = encode_unless_exists(&ManifestEncoder, &composition(), &settings(), &output, false)
            .await
            .unwrap();
        assert_eq!(first, EncodeOutcome::Written(output.clone()));

        let json: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&output).await.unwrap()).unwrap();
        assert_eq!(json["settings"]["codec"], "libx264");
        assert_eq!(json["composition"]["visuals"][0]["kind"], "chart");
        assert_eq!(json["composition"]["duration"], 4.2);

        let second = encode_unless_exists(&ManifestEncoder, &composition(), &settings(), &output, false)
            .await
            .unwrap();
        assert_eq!(second, EncodeOutcome::Skipped(output.clone()));

        let forced = encode_unless_exists(&ManifestEncoder, &composition(), &settings(), &output, true)
            .await
            .unwrap();
        assert_eq!(forced, EncodeOutcome::Written(output));
    }
}
