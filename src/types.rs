use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::channels::ChannelRecord;
use crate::emit::GuideWriter;
use crate::error::Result;
use crate::pipeline::RunContext;

/// One provider-reported broadcast slot before normalization.
///
/// Only the channel id, start time and raw title are always present;
/// everything else is filled in as far as the provider reports it. Slots
/// live exactly long enough to be normalized into a [`Programme`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScheduleEntry {
    pub channel_id: String,
    pub start: NaiveDateTime,
    /// Present only for providers that supply explicit intervals; start-only
    /// slots get their end from the next slot's start (see the zipper).
    pub end: Option<NaiveDateTime>,
    pub title: String,
    /// Pre-split subtitle, for providers that report it as its own field.
    pub subtitle: Option<String>,
    pub category: Option<String>,
    pub episode: Option<String>,
    /// Pre-detected rebroadcast flag; otherwise recovered from the title.
    pub rebroadcast: Option<bool>,
    /// Minimum viewing age; 0 or absent means unrestricted.
    pub rating: Option<u32>,
    pub description: Option<String>,
    /// Comma-joined credit lists in the provider's own form.
    pub actors: Option<String>,
    pub producers: Option<String>,
    pub icon_url: Option<String>,
}

impl RawScheduleEntry {
    /// A start-only slot with just a title; providers fill the rest in.
    pub fn new(channel_id: &str, start: NaiveDateTime, title: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            start,
            end: None,
            title: title.to_string(),
            subtitle: None,
            category: None,
            episode: None,
            rebroadcast: None,
            rating: None,
            description: None,
            actors: None,
            producers: None,
            icon_url: None,
        }
    }
}

/// The two output encodings of an episode indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeNum {
    /// The provider's native, human-facing form.
    pub onscreen: String,
    /// Zero-based `season.episode.part/total` form.
    pub xmltv_ns: String,
}

/// The unified, provider-agnostic schedule record ready for emission.
/// All times share the fixed +09:00 offset of the source providers.
#[derive(Debug, Clone, Serialize)]
pub struct Programme {
    pub channel_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub actors: Vec<String>,
    pub producers: Vec<String>,
    /// Raw provider genre label, passed through unmodified.
    pub category: String,
    /// Canonical translated content type; empty when no table entry matched.
    pub content_type: String,
    pub episode: Option<EpisodeNum>,
    pub rebroadcast: bool,
    pub rating: u32,
    pub icon_url: Option<String>,
}

/// Core trait every schedule source must implement.
#[async_trait::async_trait(?Send)]
pub trait EpgSource {
    /// The source tag this adapter serves (`KT`, `WAVVE`, ...).
    fn name(&self) -> &'static str;

    /// Fetch, normalize and emit every schedule slot this source can
    /// supply for the given catalog records. Fetch and parse failures are
    /// logged and degrade; only I/O errors on the output escape.
    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()>;
}
