use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::channels::{self, ChannelRecord};
use crate::constants;
use crate::emit::GuideWriter;
use crate::error::{EpgError, Result};
use crate::normalize::title::TitleRule;
use crate::pipeline::{self, RunContext};
use crate::types::{EpgSource, RawScheduleEntry};

const SCHEDULE_URL: &str = "https://api.tving.com/v2/media/schedules";
const REFERER: &str = "https://www.tving.com/schedule/main.do";
const IMAGE_BASE: &str = "https://image.tving.com";

/// TVING: paged schedule API swept in 3-hour windows, explicit intervals.
pub struct TvingSource {
    api_key: String,
}

impl TvingSource {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
        }
    }

    fn base_params(&self, date: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("pageNo", "1".to_string()),
            ("pageSize", "20".to_string()),
            ("order", "chno".to_string()),
            ("scope", "all".to_string()),
            ("adult", "all".to_string()),
            ("free", "all".to_string()),
            ("broadDate", date.format("%Y%m%d").to_string()),
            ("broadcastDate", date.format("%Y%m%d").to_string()),
            ("startBroadTime", "030000".to_string()),
            ("endBroadTime", "060000".to_string()),
            ("screenCode", "CSSD0100".to_string()),
            ("networkCode", "CSND0900".to_string()),
            ("osCode", "CSOD0900".to_string()),
            ("teleCode", "CSCD0900".to_string()),
            ("apiKey", self.api_key.clone()),
        ]
    }
}

/// Viewing-grade codes for programmes (`CPTG`) and movies (`CMMG`).
fn grade_rating(code: &str) -> u32 {
    match code {
        "CPTG0100" | "CMMG0100" => 0,
        "CPTG0200" => 7,
        "CPTG0300" | "CMMG0200" => 12,
        "CPTG0400" | "CMMG0300" => 15,
        "CPTG0500" | "CMMG0400" => 19,
        _ => 0,
    }
}

fn set_param(params: &mut Vec<(&'static str, String)>, key: &'static str, value: String) {
    match params.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => params.push((key, value)),
    }
}

/// Channel artwork by descending preference.
fn channel_image(item: &Value) -> Option<String> {
    let images = item["image"].as_array()?;
    for code in ["CAIC1600", "CAIC0100", "CAIC0400"] {
        if let Some(image) = images.iter().find(|img| img["code"].as_str() == Some(code)) {
            let url = image["url"].as_str().or_else(|| image["url2"].as_str())?;
            return Some(format!("{IMAGE_BASE}{url}"));
        }
    }
    None
}

#[async_trait(?Send)]
impl EpgSource for TvingSource {
    fn name(&self) -> &'static str {
        constants::TVING
    }

    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()> {
        info!("TVING: fetching schedules for {} channels", channels.len());

        // Discovery sweep over the current window, for the catalog dump
        // and the availability check.
        let mut params = self.base_params(ctx.today);
        let now = chrono::Local::now();
        set_param(&mut params, "startBroadTime", format!("{:02}0000", now.hour()));
        set_param(
            &mut params,
            "endBroadTime",
            format!("{:02}0000", (now + Duration::hours(3)).hour()),
        );
        let live_channels = self.fetch_pages(ctx, &params).await?;

        let discovered: Vec<Value> = live_channels
            .iter()
            .filter(|ch| !ch["schedules"].is_null())
            .map(|ch| {
                json!({
                    "TVING Name": ch["channel_name"]["ko"],
                    "Icon_url": channel_image(ch),
                    "Source": constants::TVING,
                    "ServiceId": ch["channel_code"],
                })
            })
            .collect();
        channels::dump_discovered(constants::TVING, &discovered);

        let mut requested = Vec::new();
        for channel in channels {
            let known = live_channels
                .iter()
                .any(|ch| ch["channel_code"].as_str() == Some(channel.service_id.as_str()));
            if known {
                requested.push(channel);
            } else {
                warn!(
                    "TVING: service id {} ({}) is not in the live catalog, skipping",
                    channel.service_id,
                    channel.name.as_deref().unwrap_or("?")
                );
            }
        }
        if requested.is_empty() {
            return Ok(());
        }

        set_param(
            &mut params,
            "channelCode",
            requested
                .iter()
                .map(|c| c.service_id.trim().to_string())
                .collect::<Vec<_>>()
                .join(","),
        );

        // Sweep the whole window: the API caps a request at three hours.
        let mut merged: Vec<(String, Value)> = Vec::new();
        for k in 0..ctx.days {
            let day = ctx.today + Duration::days(i64::from(k));
            set_param(&mut params, "broadDate", day.format("%Y%m%d").to_string());
            set_param(&mut params, "broadcastDate", day.format("%Y%m%d").to_string());
            for window in 0..8 {
                set_param(&mut params, "startBroadTime", format!("{:02}0000", window * 3));
                set_param(&mut params, "endBroadTime", format!("{:02}0000", window * 3 + 3));
                let page = match self.fetch_pages(ctx, &params).await {
                    Ok(page) => page,
                    Err(e) => {
                        error!("TVING: schedule fetch failed for {day} window {window}: {e}");
                        continue;
                    }
                };
                for channel in page {
                    let Some(code) = channel["channel_code"].as_str().map(str::to_string) else {
                        continue;
                    };
                    match merged.iter_mut().find(|(known, _)| *known == code) {
                        Some((_, existing)) => {
                            if let Some(more) = channel["schedules"].as_array() {
                                match existing["schedules"].as_array_mut() {
                                    Some(schedules) => schedules.extend(more.iter().cloned()),
                                    None => existing["schedules"] = Value::Array(more.clone()),
                                }
                            }
                        }
                        None => merged.push((code, channel)),
                    }
                }
            }
        }

        for channel in &requested {
            let Some((_, live)) = merged
                .iter()
                .find(|(code, _)| *code == channel.service_id)
            else {
                warn!(
                    "TVING: no EPG for service id {} ({}), skipping",
                    channel.service_id,
                    channel.name.as_deref().unwrap_or("?")
                );
                continue;
            };

            let channel_id = channel
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("tving|{}", channel.service_id));
            let channel_name = channel.name.clone().unwrap_or_else(|| {
                live["channel_name"]["ko"].as_str().unwrap_or_default().trim().to_string()
            });
            let channel_icon = channel.icon_url.clone().or_else(|| channel_image(live));
            out.write_channel(&channel_id, &[channel_name], channel_icon.as_deref())?;

            let entries = live["schedules"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|schedule| to_entry(&channel_id, schedule))
                .collect();
            pipeline::emit_paired(entries, TitleRule::Verbatim, out)?;
        }

        info!("TVING: EPG done for {} channels", requested.len());
        Ok(())
    }
}

impl TvingSource {
    /// Follows `has_more` pagination until the window is exhausted.
    async fn fetch_pages(&self, ctx: &RunContext, params: &[(&'static str, String)]) -> Result<Vec<Value>> {
        let mut params = params.to_vec();
        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            set_param(&mut params, "pageNo", page.to_string());
            let data = ctx.fetcher.get_json(SCHEDULE_URL, &params, REFERER).await?;
            if data["header"]["status"].as_i64() != Some(200) {
                return Err(EpgError::Provider {
                    message: format!("unexpected TVING status: {}", data["header"]["status"]),
                });
            }
            if let Some(items) = data["body"]["result"].as_array() {
                results.extend(items.iter().cloned());
            }
            if data["body"]["has_more"].as_str() == Some("Y") {
                page += 1;
            } else {
                return Ok(results);
            }
        }
    }
}

fn to_entry(channel_id: &str, schedule: &Value) -> Option<RawScheduleEntry> {
    let start = parse_compact(&schedule["broadcast_start_time"])?;
    let end = parse_compact(&schedule["broadcast_end_time"])?;

    // Movies and programmes carry the same fields under different keys.
    let is_movie = !schedule["movie"].is_null();
    let item = if is_movie { &schedule["movie"] } else { &schedule["program"] };

    let title = item["name"]["ko"].as_str().unwrap_or_default();
    let mut entry = RawScheduleEntry::new(channel_id, start, title);
    entry.end = Some(end);
    entry.rebroadcast = Some(schedule["rerun_yn"].as_str() == Some("Y"));
    entry.rating = Some(grade_rating(item["grade_code"].as_str().unwrap_or_default()));
    entry.subtitle = item["name"]["en"]
        .as_str()
        .map(str::to_string)
        .filter(|name| !name.is_empty());
    entry.category = item["category1_name"]["ko"].as_str().map(str::to_string);
    entry.actors = join_names(&item["actor"]);
    entry.producers = join_names(&item["director"]);

    let poster_code = if is_movie { "CAIM2100" } else { "CAIP0900" };
    entry.icon_url = item["image"].as_array().and_then(|images| {
        images
            .iter()
            .find(|img| img["code"].as_str() == Some(poster_code))
            .and_then(|img| img["url"].as_str())
            .map(|url| format!("{IMAGE_BASE}{url}"))
    });

    let synopsis_key = if is_movie { "story" } else { "synopsis" };
    let mut description = item[synopsis_key]["ko"].as_str().unwrap_or_default().to_string();
    if !schedule["episode"].is_null() {
        let frequency = schedule["episode"]["frequency"].as_i64().unwrap_or(0);
        if frequency != 0 {
            entry.episode = Some(frequency.to_string());
        }
        description = schedule["episode"]["synopsis"]["ko"]
            .as_str()
            .unwrap_or_default()
            .to_string();
    }
    entry.description = Some(description).filter(|desc| !desc.is_empty());

    Some(entry)
}

fn parse_compact(value: &Value) -> Option<NaiveDateTime> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    NaiveDateTime::parse_from_str(text.trim(), "%Y%m%d%H%M%S").ok()
}

fn join_names(value: &Value) -> Option<String> {
    value
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(|name| name.as_str())
                .collect::<Vec<_>>()
                .join(",")
        })
        .filter(|joined| !joined.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn programme_schedules_map_with_episode_and_grade() {
        let schedule = json!({
            "broadcast_start_time": 20260806200000i64,
            "broadcast_end_time": 20260806210000i64,
            "rerun_yn": "N",
            "movie": null,
            "program": {
                "name": {"ko": "금요드라마", "en": "Friday Drama"},
                "grade_code": "CPTG0400",
                "category1_name": {"ko": "드라마"},
                "actor": ["김배우", "이배우"],
                "director": ["박감독"],
                "image": [{"code": "CAIP0900", "url": "/poster.jpg"}],
                "synopsis": {"ko": "프로그램 줄거리"}
            },
            "episode": {
                "frequency": 5,
                "synopsis": {"ko": "5회 줄거리"}
            }
        });
        let entry = to_entry("21", &schedule).unwrap();
        assert_eq!(entry.title, "금요드라마");
        assert_eq!(entry.subtitle.as_deref(), Some("Friday Drama"));
        assert_eq!(entry.episode.as_deref(), Some("5"));
        assert_eq!(entry.rating, Some(15));
        assert_eq!(entry.rebroadcast, Some(false));
        assert_eq!(entry.description.as_deref(), Some("5회 줄거리"));
        assert_eq!(entry.icon_url.as_deref(), Some("https://image.tving.com/poster.jpg"));
        assert_eq!(entry.actors.as_deref(), Some("김배우,이배우"));
    }

    #[test]
    fn movie_schedules_use_the_movie_fields() {
        let schedule = json!({
            "broadcast_start_time": "20260806220000",
            "broadcast_end_time": "20260807003000",
            "rerun_yn": "Y",
            "movie": {
                "name": {"ko": "주말의 명화", "en": ""},
                "grade_code": "CMMG0400",
                "category1_name": {"ko": "영화"},
                "actor": [],
                "director": [],
                "image": [{"code": "CAIM2100", "url": "/movie.jpg"}],
                "story": {"ko": "영화 줄거리"}
            },
            "episode": null
        });
        let entry = to_entry("22", &schedule).unwrap();
        assert_eq!(entry.title, "주말의 명화");
        assert_eq!(entry.subtitle, None);
        assert_eq!(entry.episode, None);
        assert_eq!(entry.rating, Some(19));
        assert_eq!(entry.rebroadcast, Some(true));
        assert_eq!(entry.description.as_deref(), Some("영화 줄거리"));
        assert_eq!(entry.icon_url.as_deref(), Some("https://image.tving.com/movie.jpg"));
    }

    #[test]
    fn zeroth_episode_is_no_episode() {
        let schedule = json!({
            "broadcast_start_time": "20260806060000",
            "broadcast_end_time": "20260806063000",
            "rerun_yn": "N",
            "movie": null,
            "program": {"name": {"ko": "아침 체조", "en": ""}, "grade_code": "CPTG0100"},
            "episode": {"frequency": 0, "synopsis": {"ko": ""}}
        });
        let entry = to_entry("23", &schedule).unwrap();
        assert_eq!(entry.episode, None);
        assert_eq!(entry.rating, Some(0));
    }
}
