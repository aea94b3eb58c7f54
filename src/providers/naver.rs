use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use scraper::{Html, Selector};
use tracing::{error, info, warn};

use crate::channels::ChannelRecord;
use crate::constants;
use crate::emit::{unescape_text, GuideWriter};
use crate::error::{EpgError, Result};
use crate::normalize::title::TitleRule;
use crate::pipeline::{self, RunContext};
use crate::types::{EpgSource, RawScheduleEntry};

const URL: &str = "https://m.search.naver.com/p/csearch/content/nqapirender.nhn";
const REFERER: &str =
    "https://m.search.naver.com/search.naver?where=m&query=%ED%8E%B8%EC%84%B1%ED%91%9C";

/// Naver mobile search: per-channel daily schedules as JSON-wrapped HTML
/// fragments, start times only.
pub struct NaverSource;

#[async_trait(?Send)]
impl EpgSource for NaverSource {
    fn name(&self) -> &'static str {
        constants::NAVER
    }

    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()> {
        info!("NAVER: fetching schedules for {} channels", channels.len());

        for channel in channels {
            let mut entries = Vec::new();
            for k in 0..ctx.days {
                let day = ctx.today + Duration::days(i64::from(k));
                match self.fetch_day(ctx, channel, day).await {
                    Ok(day_entries) => entries.extend(day_entries),
                    Err(e) => error!(
                        "NAVER: schedule fetch failed for {} on {}: {}",
                        channel.service_id, day, e
                    ),
                }
            }
            pipeline::emit_start_only(entries, TitleRule::Verbatim, out)?;
        }
        Ok(())
    }
}

impl NaverSource {
    async fn fetch_day(
        &self,
        ctx: &RunContext,
        channel: &ChannelRecord,
        day: NaiveDate,
    ) -> Result<Vec<RawScheduleEntry>> {
        let params = [
            ("key", "SingleChannelDailySchedule".to_string()),
            ("where", "m".to_string()),
            ("pkid", "66".to_string()),
            ("u1", channel.service_id.clone()),
            ("u2", day.format("%Y%m%d").to_string()),
        ];
        let data = ctx.fetcher.get_json(URL, &params, REFERER).await?;

        let status = data["statusCode"].as_str().unwrap_or_default();
        if !status.eq_ignore_ascii_case("success") {
            return Err(EpgError::Provider {
                message: format!(
                    "unexpected Naver response for {}: {status}",
                    channel.service_id
                ),
            });
        }

        let fragment = data["dataHtml"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let document = Html::parse_document(&fragment);
        let row_selector = Selector::parse("li.list").unwrap();
        let cell_selector = Selector::parse("div").unwrap();
        let rebroadcast_selector = Selector::parse("span.re").unwrap();

        let channel_id = channel.id.map(|id| id.to_string()).unwrap_or_default();
        let mut entries = Vec::new();
        for row in document.select(&row_selector) {
            let cells: Vec<_> = row.select(&cell_selector).collect();
            if cells.len() < 5 {
                continue;
            }
            let time_text = cells[1].text().collect::<String>().trim().to_string();
            let slot_time = format!("{day} {time_text}");
            let Ok(start) = NaiveDateTime::parse_from_str(&slot_time, "%Y-%m-%d %H:%M") else {
                warn!("NAVER: unparseable slot time {slot_time:?}, skipping");
                continue;
            };

            let title = unescape_text(cells[4].text().collect::<String>().trim());
            let mut entry = RawScheduleEntry::new(&channel_id, start, &title);
            entry.rebroadcast = Some(cells[3].select(&rebroadcast_selector).next().is_some());
            entry.subtitle = cells
                .get(5)
                .map(|cell| cell.text().collect::<String>().trim().to_string());
            entry.rating = Some(0);
            entries.push(entry);
        }
        Ok(entries)
    }
}
