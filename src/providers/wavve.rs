use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::channels::{self, ChannelRecord};
use crate::constants;
use crate::emit::{unescape_text, GuideWriter};
use crate::enrich::ProgramDetailCache;
use crate::error::Result;
use crate::normalize::title::TitleRule;
use crate::pipeline::{self, RunContext};
use crate::types::{EpgSource, RawScheduleEntry};

const EPG_URL: &str = "https://apis.pooq.co.kr/live/epgs";
const PROGRAM_URL: &str = "https://apis.pooq.co.kr/vod/programs-contentid";
const CONTENTS_URL: &str = "https://apis.pooq.co.kr/vod/contents";
const REFERER: &str = "https://www.wavve.com/schedule/index.html";

/// WAVVE: one EPG feed for the whole window, explicit intervals, plus a
/// per-program detail lookup memoized through the run's detail cache.
pub struct WavveSource {
    api_key: String,
}

/// Enrichment payload for one WAVVE program id.
#[derive(Debug, Clone)]
struct WavveDetail {
    description: String,
    category: String,
    icon_url: Option<String>,
    actors: String,
}

impl WavveSource {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
        }
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.api_key.clone()),
            ("credential", "none".to_string()),
            ("device", "pc".to_string()),
            ("drm", "wm".to_string()),
            ("partner", "pooq".to_string()),
            ("pooqzone", "none".to_string()),
            ("region", "kor".to_string()),
            ("targetage", "auto".to_string()),
        ]
    }
}

#[async_trait(?Send)]
impl EpgSource for WavveSource {
    fn name(&self) -> &'static str {
        constants::WAVVE
    }

    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()> {
        info!("WAVVE: fetching the EPG window for {} channels", channels.len());

        let mut params = self.base_params();
        params.push(("genre", "all".to_string()));
        params.push(("limit", "100".to_string()));
        params.push(("offset", "0".to_string()));
        params.push((
            "startdatetime",
            format!("{} 00:00", ctx.today.format("%Y-%m-%d")),
        ));
        params.push((
            "enddatetime",
            format!(
                "{} 24:00",
                (ctx.today + Duration::days(i64::from(ctx.days) - 1)).format("%Y-%m-%d")
            ),
        ));

        let data = ctx.fetcher.get_json(EPG_URL, &params, REFERER).await?;
        let live_channels = data["list"].as_array().cloned().unwrap_or_default();

        let discovered: Vec<Value> = live_channels
            .iter()
            .map(|ch| {
                json!({
                    "WAVVE Name": ch["channelname"],
                    "Icon_url": format!("https://{}", ch["channelimage"].as_str().unwrap_or_default()),
                    "Source": constants::WAVVE,
                    "ServiceId": ch["channelid"],
                })
            })
            .collect();
        channels::dump_discovered(constants::WAVVE, &discovered);

        // The detail cache lives for this source's whole run.
        let mut cache: ProgramDetailCache<WavveDetail> = ProgramDetailCache::new();

        for channel in channels {
            let Some(live) = live_channels
                .iter()
                .find(|ch| ch["channelid"].as_str() == Some(channel.service_id.as_str()))
            else {
                warn!(
                    "WAVVE: no EPG for service id {} ({}), skipping",
                    channel.service_id,
                    channel.name.as_deref().unwrap_or("?")
                );
                continue;
            };

            // The catalog record wins over the live feed where it speaks.
            let channel_id = channel
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("wavve|{}", channel.service_id));
            let channel_name = channel
                .name
                .clone()
                .unwrap_or_else(|| live["channelname"].as_str().unwrap_or_default().trim().to_string());
            let channel_icon = channel.icon_url.clone().unwrap_or_else(|| {
                format!("https://{}", live["channelimage"].as_str().unwrap_or_default())
            });
            out.write_channel(&channel_id, &[channel_name.clone()], Some(&channel_icon))?;

            let mut entries = Vec::new();
            for program in live["list"].as_array().into_iter().flatten() {
                match self.to_entry(ctx, &channel_id, program, &mut cache).await {
                    Some(entry) => entries.push(entry),
                    None => {
                        error!("WAVVE: unparseable program on {channel_name}: {program}");
                    }
                }
            }
            pipeline::emit_paired(entries, TitleRule::Wavve, out)?;
        }

        info!("WAVVE: EPG done, {} detail lookups cached", cache.len());
        Ok(())
    }
}

impl WavveSource {
    async fn to_entry(
        &self,
        ctx: &RunContext,
        channel_id: &str,
        program: &Value,
        cache: &mut ProgramDetailCache<WavveDetail>,
    ) -> Option<RawScheduleEntry> {
        debug!("{}", program["title"]);
        let start =
            NaiveDateTime::parse_from_str(program["starttime"].as_str()?, "%Y-%m-%d %H:%M").ok()?;
        let end =
            NaiveDateTime::parse_from_str(program["endtime"].as_str()?, "%Y-%m-%d %H:%M").ok()?;

        // Programme titles arrive escaped, unlike the channel names.
        let title = unescape_text(program["title"].as_str().unwrap_or_default());
        let mut entry = RawScheduleEntry::new(channel_id, start, title.trim());
        entry.end = Some(end);
        entry.rating = match &program["targetage"] {
            Value::String(age) if age == "n" => Some(0),
            Value::String(age) => Some(age.parse().unwrap_or(0)),
            Value::Number(age) => Some(age.as_u64().unwrap_or(0) as u32),
            _ => Some(0),
        };

        let program_id = program["programid"].as_str().unwrap_or_default().trim();
        let detail = cache
            .get_or_fetch(program_id, || self.fetch_detail(ctx, program_id))
            .await;
        if let Some(detail) = detail {
            if !detail.description.is_empty() {
                entry.description = Some(detail.description.clone());
            }
            if !detail.category.is_empty() {
                entry.category = Some(detail.category.clone());
            }
            if !detail.actors.is_empty() {
                entry.actors = Some(detail.actors.clone());
            }
            entry.icon_url = detail.icon_url.clone();
        }
        Some(entry)
    }

    /// The enrichment collaborator: program id to content id to content
    /// details. Failures are reported as `None` and end up negatively
    /// cached.
    async fn fetch_detail(&self, ctx: &RunContext, program_id: &str) -> Option<WavveDetail> {
        let referer = format!("https://www.wavve.com/player/vod?programid={program_id}");
        let params = self.base_params();

        let url = format!("{PROGRAM_URL}/{program_id}");
        let content = match ctx.fetcher.get_json(&url, &params, &referer).await {
            Ok(content) => content,
            Err(e) => {
                error!("WAVVE: content id lookup failed for {program_id}: {e}");
                return None;
            }
        };
        let content_id = content["contentid"].as_str()?.trim().to_string();

        let url = format!("{CONTENTS_URL}/{content_id}");
        let detail = match ctx.fetcher.get_json(&url, &params, &referer).await {
            Ok(detail) => detail,
            Err(e) => {
                error!("WAVVE: detail lookup failed for {program_id}: {e}");
                return None;
            }
        };

        // Strip carriage returns and inline breaks from the synopsis.
        let description = detail["programsynopsis"]
            .as_str()
            .unwrap_or_default()
            .lines()
            .map(|line| line.replace("<br>", "\n").trim().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let actors = detail["actors"]["list"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|actor| actor["text"].as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        Some(WavveDetail {
            description,
            category: detail["genretext"].as_str().unwrap_or_default().trim().to_string(),
            icon_url: detail["programposterimage"]
                .as_str()
                .map(str::trim)
                .filter(|poster| !poster.is_empty())
                .map(|poster| format!("https://{poster}")),
            actors,
        })
    }
}
