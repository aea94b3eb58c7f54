use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use scraper::{Html, Selector};
use tracing::{error, info, warn};

use crate::channels::ChannelRecord;
use crate::constants;
use crate::emit::GuideWriter;
use crate::error::Result;
use crate::normalize::title::TitleRule;
use crate::pipeline::{self, RunContext};
use crate::providers::text_excluding;
use crate::types::{EpgSource, RawScheduleEntry};

const SCHEDULE_URL: &str = "http://www.uplus.co.kr/css/chgi/chgi/RetrieveTvSchedule.hpi";
const REFERER: &str = "http://www.uplus.co.kr/css/chgi/chgi/RetrieveTvContentsMFamily.hpi";

/// U+ tv: daily schedule tables per channel, start times only.
pub struct LgSource;

#[async_trait(?Send)]
impl EpgSource for LgSource {
    fn name(&self) -> &'static str {
        constants::LG
    }

    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()> {
        info!("LG: fetching schedules for {} channels", channels.len());

        for channel in channels {
            let mut entries = Vec::new();
            for k in 0..ctx.days {
                let day = ctx.today + Duration::days(i64::from(k));
                match self.fetch_day(ctx, channel, day).await {
                    Ok(Some(day_entries)) => entries.extend(day_entries),
                    Ok(None) => {
                        // No schedule today means no schedule tomorrow either.
                        warn!(
                            "LG: no EPG for service id {} ({}), skipping the channel",
                            channel.service_id,
                            channel.name.as_deref().unwrap_or("?")
                        );
                        break;
                    }
                    Err(e) => error!(
                        "LG: schedule fetch failed for {} on {}: {}",
                        channel.service_id, day, e
                    ),
                }
            }
            pipeline::emit_start_only(entries, TitleRule::Lg, out)?;
        }
        Ok(())
    }
}

impl LgSource {
    /// One channel-day of slots; `None` when the channel has no schedule
    /// page at all.
    async fn fetch_day(
        &self,
        ctx: &RunContext,
        channel: &ChannelRecord,
        day: NaiveDate,
    ) -> Result<Option<Vec<RawScheduleEntry>>> {
        let form = [
            ("chnlCd", channel.service_id.clone()),
            ("evntCmpYmd", day.format("%Y%m%d").to_string()),
        ];
        let body = ctx
            .fetcher
            .post_form_text(SCHEDULE_URL, &form, REFERER)
            .await?;

        // `<재>` would otherwise parse as a markup tag and vanish; the
        // truncation artifacts confuse the title pattern.
        let body = body
            .replace("<재>", "&lt;재&gt;")
            .replace(" [..", "")
            .replace(" (..", "");

        let document = Html::parse_document(&body);
        let row_selector = Selector::parse("table tbody tr").unwrap();
        let cell_selector = Selector::parse("td").unwrap();
        let rating_selector = Selector::parse("span.tag.cte_all").unwrap();

        let rows: Vec<_> = document.select(&row_selector).collect();
        if rows.is_empty() {
            return Ok(None);
        }

        let channel_id = channel.id.map(|id| id.to_string()).unwrap_or_default();
        let mut entries = Vec::new();
        for row in rows {
            let cells: Vec<_> = row.select(&cell_selector).collect();
            if cells.len() < 3 {
                continue;
            }
            let time_text = cells[0].text().collect::<String>().trim().to_string();
            let slot_time = format!("{day} {time_text}");
            let Ok(start) = NaiveDateTime::parse_from_str(&slot_time, "%Y-%m-%d %H:%M") else {
                warn!("LG: unparseable slot time {slot_time:?}, skipping");
                continue;
            };

            let rating_text = cells[1]
                .select(&rating_selector)
                .next()
                .map(|span| span.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let rating = if rating_text == "All" {
                0
            } else {
                rating_text.parse().unwrap_or(0)
            };

            // The badge group also holds the rating span; drop it from the
            // title text.
            let title = text_excluding(cells[1], |el| {
                el.name() == "span" && el.classes().any(|class| class == "tagGroup")
            })
            .trim()
            .to_string();

            let mut entry = RawScheduleEntry::new(&channel_id, start, &title);
            entry.category = Some(cells[2].text().collect::<String>().trim().to_string());
            entry.rating = Some(rating);
            entries.push(entry);
        }
        Ok(Some(entries))
    }
}
