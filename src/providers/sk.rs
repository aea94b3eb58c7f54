use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::channels::{self, ChannelRecord};
use crate::constants;
use crate::emit::GuideWriter;
use crate::error::{EpgError, Result};
use crate::normalize::title::TitleRule;
use crate::pipeline::{self, RunContext};
use crate::types::{EpgSource, RawScheduleEntry};

const DATA_URL: &str = "http://mapp.btvplus.co.kr/sideMenu/live/IFGetData.do";
const REFERER: &str = "http://mapp.btvplus.co.kr/channelFavor.do";
const ICON_URL: &str = "http://mapp.btvplus.co.kr/data/btvplus/admobd/channelLogo/nsepg_{}.png";

/// B tv plus: one JSON feed for all channels per day, explicit intervals.
pub struct SkSource;

/// Numeric genre codes used by the Btv schedule feed.
fn genre_name(code: &str) -> Option<&'static str> {
    Some(match code {
        "1" => "드라마",
        "2" => "영화",
        "4" => "만화",
        "8" => "스포츠",
        "9" => "교육",
        "11" => "홈쇼핑",
        "13" => "예능",
        "14" => "시사/다큐",
        "15" => "음악",
        "16" => "라이프",
        "17" => "교양",
        "18" => "뉴스",
        _ => return None,
    })
}

#[async_trait(?Send)]
impl EpgSource for SkSource {
    fn name(&self) -> &'static str {
        constants::SK
    }

    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()> {
        info!("SK: fetching schedules for {} channels", channels.len());

        let available = match self.fetch_catalog(ctx).await {
            Ok(services) => services,
            Err(e) => {
                error!("SK: channel catalog fetch failed, falling back to the requested list: {e}");
                channels.iter().map(|c| c.service_id.clone()).collect()
            }
        };

        // Remove unavailable channels in advance; the detail request asks
        // for every remaining channel at once.
        let mut requested = Vec::new();
        for channel in channels {
            if available.contains(&channel.service_id) {
                requested.push(channel);
            } else {
                warn!(
                    "SK: service id {} ({}) is not in the live catalog, skipping",
                    channel.service_id,
                    channel.name.as_deref().unwrap_or("?")
                );
            }
        }
        if requested.is_empty() {
            return Ok(());
        }

        let service_ids = requested
            .iter()
            .map(|c| c.service_id.trim().to_string())
            .collect::<Vec<_>>()
            .join("|");

        for k in 0..ctx.days {
            let day = ctx.today + Duration::days(i64::from(k));
            let form = [
                ("variable", "IF_LIVECHART_DETAIL".to_string()),
                ("o_date", day.format("%Y%m%d").to_string()),
                ("svc_ids", service_ids.clone()),
            ];
            let services = match self.request_services(ctx, &form).await {
                Ok(services) => services,
                Err(e) => {
                    error!("SK: schedule fetch failed on {day}: {e}");
                    continue;
                }
            };

            for channel in &requested {
                let programs = services.iter().find_map(|service| {
                    (service["ID_SVC"].as_str() == Some(channel.service_id.as_str()))
                        .then(|| service["EventInfoArray"].as_array())
                        .flatten()
                });
                match programs {
                    Some(programs) => {
                        let channel_id = channel.id.map(|id| id.to_string()).unwrap_or_default();
                        let entries = programs
                            .iter()
                            .filter_map(|program| to_entry(&channel_id, program))
                            .collect();
                        pipeline::emit_paired(entries, TitleRule::Wavve, out)?;
                    }
                    None => warn!(
                        "SK: no EPG on {} for service id {} ({})",
                        day.format("%Y%m%d"),
                        channel.service_id,
                        channel.name.as_deref().unwrap_or("?")
                    ),
                }
            }
        }

        info!("SK: EPG done for {}/{} channels", requested.len(), channels.len());
        Ok(())
    }
}

impl SkSource {
    async fn fetch_catalog(&self, ctx: &RunContext) -> Result<Vec<String>> {
        let form = [("variable", "IF_LIVECHART_ALL".to_string())];
        let services = self.request_services(ctx, &form).await?;

        let mut discovered = Vec::new();
        let mut available = Vec::new();
        for service in &services {
            let Some(service_id) = service["ID_SVC"].as_str() else { continue };
            discovered.push(json!({
                "SK Name": service["NM_CH"],
                "SKCh": service["NO_CH"]
                    .as_str()
                    .and_then(|n| n.parse::<i64>().ok())
                    .or_else(|| service["NO_CH"].as_i64()),
                "Icon_url": ICON_URL.replace("{}", service_id),
                "Source": constants::SK,
                "ServiceId": service_id,
            }));
            available.push(service_id.to_string());
        }
        channels::dump_discovered(constants::SK, &discovered);
        Ok(available)
    }

    /// One feed request; the envelope's `result` decides success.
    async fn request_services(&self, ctx: &RunContext, form: &[(&str, String)]) -> Result<Vec<Value>> {
        let data = ctx.fetcher.post_form_json(DATA_URL, form, REFERER).await?;
        let ok = data["result"]
            .as_str()
            .map(|result| result.eq_ignore_ascii_case("ok"))
            .unwrap_or(false);
        if !ok {
            return Err(EpgError::Provider {
                message: format!("unexpected Btv response: {}", data["reason"]),
            });
        }
        Ok(data["ServiceInfoArray"].as_array().cloned().unwrap_or_default())
    }
}

fn to_entry(channel_id: &str, program: &Value) -> Option<RawScheduleEntry> {
    // Truncated subtitles arrive as `...` where their closing `>` was.
    let title = program["NM_TITLE"]
        .as_str()
        .unwrap_or_default()
        .replace("...", ">");
    let start = parse_compact(&program["DT_EVNT_START"])?;
    let end = parse_compact(&program["DT_EVNT_END"])?;

    let mut entry = RawScheduleEntry::new(channel_id, start, title.trim());
    entry.end = Some(end);
    entry.description = program["NM_SYNOP"]
        .as_str()
        .map(str::to_string)
        .filter(|synopsis| !synopsis.is_empty());
    if let Some(info) = program["AdditionalInfoArray"].get(0) {
        entry.actors = clean_credits(info["NM_ACT"].as_str());
        entry.producers = clean_credits(info["NM_DIRECTOR"].as_str());
    }
    let genre_code = match &program["CD_GENRE"] {
        Value::String(code) => code.clone(),
        Value::Number(code) => code.to_string(),
        _ => String::new(),
    };
    entry.category = genre_name(&genre_code).map(str::to_string);
    entry.rating = program["CD_RATING"]
        .as_str()
        .and_then(|rating| rating.parse().ok())
        .or_else(|| program["CD_RATING"].as_u64().map(|rating| rating as u32));
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

fn clean_credits(raw: Option<&str>) -> Option<String> {
    raw.map(|list| {
        list.replace("...", "")
            .trim_matches(|c: char| c == ',' || c == ' ')
            .to_string()
    })
    .filter(|list| !list.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feed_programs_map_to_paired_entries() {
        let program = json!({
            "NM_TITLE": "전원일기 (3회) <귀로...",
            "DT_EVNT_START": "20260806210000",
            "DT_EVNT_END": "20260806220000",
            "NM_SYNOP": "시골 마을 이야기",
            "CD_GENRE": "1",
            "CD_RATING": "15",
            "AdditionalInfoArray": [{"NM_ACT": "최불암, 김혜자...", "NM_DIRECTOR": ", "}]
        });
        let entry = to_entry("3", &program).unwrap();
        assert_eq!(entry.title, "전원일기 (3회) <귀로>");
        assert!(entry.end.is_some());
        assert_eq!(entry.category.as_deref(), Some("드라마"));
        assert_eq!(entry.rating, Some(15));
        assert_eq!(entry.actors.as_deref(), Some("최불암, 김혜자"));
        assert_eq!(entry.producers, None);
        assert_eq!(entry.description.as_deref(), Some("시골 마을 이야기"));
    }

    #[test]
    fn unknown_genre_codes_leave_the_category_empty() {
        let program = json!({
            "NM_TITLE": "바둑교실",
            "DT_EVNT_START": "20260806060000",
            "DT_EVNT_END": "20260806070000",
            "CD_GENRE": "99"
        });
        let entry = to_entry("3", &program).unwrap();
        assert_eq!(entry.category, None);
        assert_eq!(entry.rating, None);
    }

    #[test]
    fn slots_with_unparseable_times_are_rejected() {
        let program = json!({
            "NM_TITLE": "뉴스",
            "DT_EVNT_START": "nonsense",
            "DT_EVNT_END": "20260806070000"
        });
        assert!(to_entry("3", &program).is_none());
    }
}
