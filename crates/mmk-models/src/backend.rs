//! Generation backend identities and their fixed parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// Frame rate assumed when showing a frame count as seconds.
pub const DISPLAY_FRAME_RATE: f64 = 24.0;

/// How a backend wants the output shape expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectMode {
    /// Forward the caller's aspect ratio string as-is.
    PassThrough,
    /// Translate to a fixed pixel resolution.
    Resolution,
}

/// The generation backend a deployment is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One blocking call that returns the finished asset (Replicate).
    SynchronousRun,
    /// Submit to a provider queue and follow status updates (fal).
    QueuedSubscribe,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::SynchronousRun => "synchronous_run",
            BackendKind::QueuedSubscribe => "queued_subscribe",
        }
    }

    /// Frame count used when the request leaves it unset.
    pub fn default_frames(&self) -> u32 {
        match self {
            BackendKind::SynchronousRun => 97,
            BackendKind::QueuedSubscribe => 121,
        }
    }

    /// Frame counts the provider accepts.
    pub fn frame_range(&self) -> RangeInclusive<u32> {
        match self {
            BackendKind::SynchronousRun => 49..=193,
            BackendKind::QueuedSubscribe => 9..=161,
        }
    }

    /// Clamp a frame count into [`Self::frame_range`].
    pub fn clamp_frames(&self, frames: u32) -> u32 {
        let range = self.frame_range();
        frames.clamp(*range.start(), *range.end())
    }

    /// Frame rate sent to the provider, if it takes one.
    pub fn frame_rate(&self) -> Option<u32> {
        match self {
            BackendKind::SynchronousRun => None,
            BackendKind::QueuedSubscribe => Some(24),
        }
    }

    /// Constant negative prompt. Not user-editable.
    pub fn negative_prompt(&self) -> &'static str {
        match self {
            BackendKind::SynchronousRun => "low quality, worst quality, deformed, distorted",
            BackendKind::QueuedSubscribe => {
                "worst quality, inconsistent motion, blurry, jittery, distorted"
            }
        }
    }

    pub fn aspect_mode(&self) -> AspectMode {
        match self {
            BackendKind::SynchronousRun => AspectMode::PassThrough,
            BackendKind::QueuedSubscribe => AspectMode::Resolution,
        }
    }

    /// Whether a request without an image is rejected up front.
    pub fn requires_image(&self) -> bool {
        matches!(self, BackendKind::QueuedSubscribe)
    }

    /// Whether the image must be uploaded and referenced by URL.
    pub fn requires_staging(&self) -> bool {
        matches!(self, BackendKind::QueuedSubscribe)
    }

    /// Whether `steps`/`cfg_scale` are forwarded.
    pub fn supports_tuning(&self) -> bool {
        matches!(self, BackendKind::SynchronousRun)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendParseError;

    /// Accepts the variant name or the provider behind it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synchronous_run" | "replicate" => Ok(BackendKind::SynchronousRun),
            "queued_subscribe" | "fal" => Ok(BackendKind::QueuedSubscribe),
            _ => Err(BackendParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown video backend: {0}")]
pub struct BackendParseError(String);

/// Frame count as seconds, rounded to one decimal. Display only.
pub fn frames_to_display_seconds(frames: u32) -> f64 {
    (frames as f64 / DISPLAY_FRAME_RATE * 10.0).round() / 10.0
}
