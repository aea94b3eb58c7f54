use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use serde_json::json;
use tracing::{error, info, warn};

use crate::channels::{self, ChannelRecord};
use crate::constants;
use crate::emit::{unescape_text, GuideWriter};
use crate::error::Result;
use crate::normalize::title::TitleRule;
use crate::pipeline::{self, RunContext};
use crate::providers::text_excluding;
use crate::types::{EpgSource, RawScheduleEntry};

const SCHEDULE_URL: &str = "http://m.skbroadband.com/content/realtime/Channel_List.do";
const CHANNEL_LIST_URL: &str = "https://m.skbroadband.com/content/realtime/Realtime_List_Ajax.do";
const REFERER: &str = "http://m.skbroadband.com/content/realtime/Channel_List.do";

// The schedule page interleaves badges and unescaped angle brackets with
// the programme names; these run over the raw markup before parsing.
static COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<!--(.*?)-->").unwrap());
static ROUND_FLAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="round_flag flag(?:02|03|04|09|10|11|12)">(.*?)</span>"#).unwrap()
});
static CONT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<p class="cont">(.*)"#).unwrap());
static TIT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<p class="tit">(.*)"#).unwrap());

/// B tv mobile: daily schedule lists per channel, start times only.
pub struct SkbSource;

#[async_trait(?Send)]
impl EpgSource for SkbSource {
    fn name(&self) -> &'static str {
        constants::SKB
    }

    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()> {
        info!("SKB: fetching schedules for {} channels", channels.len());

        let available = match self.fetch_catalog(ctx).await {
            Ok(services) => services,
            Err(e) => {
                error!("SKB: channel catalog fetch failed, falling back to the requested list: {e}");
                channels.iter().map(|c| c.service_id.clone()).collect()
            }
        };

        for channel in channels {
            if !available.contains(&channel.service_id) {
                warn!(
                    "SKB: service id {} ({}) is not in the live catalog, skipping",
                    channel.service_id,
                    channel.name.as_deref().unwrap_or("?")
                );
                continue;
            }
            let mut entries = Vec::new();
            for k in 0..ctx.days {
                let day = ctx.today + Duration::days(i64::from(k));
                match self.fetch_day(ctx, channel, day).await {
                    Ok(Some(day_entries)) => entries.extend(day_entries),
                    Ok(None) => {
                        warn!(
                            "SKB: no EPG for service id {} ({}), skipping the channel",
                            channel.service_id,
                            channel.name.as_deref().unwrap_or("?")
                        );
                        break;
                    }
                    Err(e) => error!(
                        "SKB: schedule fetch failed for {} on {}: {}",
                        channel.service_id, day, e
                    ),
                }
            }
            pipeline::emit_start_only(entries, TitleRule::Skb, out)?;
        }
        Ok(())
    }
}

impl SkbSource {
    async fn fetch_catalog(&self, ctx: &RunContext) -> Result<Vec<String>> {
        let form = [
            ("package_name", "PM50305785".to_string()),
            ("pack", "18".to_string()),
        ];
        let data = ctx
            .fetcher
            .post_form_json(CHANNEL_LIST_URL, &form, REFERER)
            .await?;

        let mut discovered = Vec::new();
        let mut services = Vec::new();
        for row in data.as_array().into_iter().flatten() {
            if row["depth"].as_str() != Some("2") {
                continue;
            }
            let Some(service_id) = row["c_menu"].as_str() else { continue };
            discovered.push(json!({
                "SKB Name": row["m_name"],
                "SKBCh": row["ch_no"]
                    .as_str()
                    .and_then(|n| n.parse::<i64>().ok())
                    .or_else(|| row["ch_no"].as_i64()),
                "Source": constants::SKB,
                "ServiceId": service_id,
            }));
            services.push(service_id.to_string());
        }
        channels::dump_discovered(constants::SKB, &discovered);
        Ok(services)
    }

    async fn fetch_day(
        &self,
        ctx: &RunContext,
        channel: &ChannelRecord,
        day: NaiveDate,
    ) -> Result<Option<Vec<RawScheduleEntry>>> {
        let params = [
            ("key_depth2", channel.service_id.clone()),
            ("key_depth3", day.format("%Y%m%d").to_string()),
        ];
        let body = ctx.fetcher.get_text(SCHEDULE_URL, &params, REFERER).await?;
        let body = preclean(&body);

        let document = Html::parse_document(&body);
        let row_selector = Selector::parse("div#uiScheduleTabContent li.list").unwrap();
        let time_selector = Selector::parse("p.time").unwrap();
        let cont_selector = Selector::parse("p.cont").unwrap();
        let rating_selector = Selector::parse("i.hide").unwrap();

        let rows: Vec<_> = document.select(&row_selector).collect();
        if rows.is_empty() {
            return Ok(None);
        }

        let channel_id = channel.id.map(|id| id.to_string()).unwrap_or_default();
        let mut entries = Vec::new();
        for row in rows {
            let time_text = row
                .select(&time_selector)
                .next()
                .map(|p| p.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let slot_time = format!("{day} {time_text}");
            let Ok(start) = NaiveDateTime::parse_from_str(&slot_time, "%Y-%m-%d %H:%M") else {
                warn!("SKB: unparseable slot time {slot_time:?}, skipping");
                continue;
            };

            let rating = row
                .select(&rating_selector)
                .next()
                .map(|i| i.text().collect::<String>().replace("세 이상", "").trim().to_string())
                .and_then(|text| text.parse().ok())
                .unwrap_or(0);

            let title = row
                .select(&cont_selector)
                .next()
                .map(|cell| text_excluding(cell, |el| el.name() == "span").trim().to_string())
                .unwrap_or_default();

            let mut entry = RawScheduleEntry::new(&channel_id, start, &title);
            entry.rating = Some(rating);
            entries.push(entry);
        }
        Ok(Some(entries))
    }
}

/// Strips badges and re-escapes the programme-name lines so that stray
/// `<`/`>` inside titles survive the HTML parse.
fn preclean(body: &str) -> String {
    let body = COMMENTS.replace_all(body, "");
    let body = ROUND_FLAGS.replace_all(&body, "");
    let body = body.replace(r#"<strong class="hide">프로그램 안내</strong>"#, "");
    let body = CONT_LINE.replace_all(&body, reescape_line);
    let body = TIT_LINE.replace_all(&body, reescape_line);
    body.into_owned()
}

fn reescape_line(caps: &Captures) -> String {
    let content = unescape_text(&caps[1]);
    let content = content.replace('<', "&lt;").replace('>', "&gt;");
    format!(r#"<p class="cont">{}"#, content.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preclean_reescapes_angle_brackets_in_programme_names() {
        let body = r#"<li class="list"><p class="time">21:00</p><p class="cont">보고싶다(5회)<귀향>"#;
        let cleaned = preclean(body);
        assert!(cleaned.contains(r#"<p class="cont">보고싶다(5회)&lt;귀향&gt;"#));
    }

    #[test]
    fn preclean_drops_flag_badges_and_comments() {
        let body = concat!(
            r#"<!-- header --><span class="round_flag flag02">HD</span>"#,
            "\n",
            r#"<p class="tit">영화 극장판"#,
            "\n</p>"
        );
        let cleaned = preclean(body);
        assert!(!cleaned.contains("round_flag"));
        assert!(!cleaned.contains("header"));
        // tit lines are rewritten to cont lines, matching the row parser.
        assert!(cleaned.contains(r#"<p class="cont">영화 극장판"#));
    }
}
