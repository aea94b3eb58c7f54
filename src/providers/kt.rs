use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;
use tracing::{error, info, warn};

use crate::channels::{self, ChannelRecord};
use crate::constants;
use crate::emit::GuideWriter;
use crate::error::Result;
use crate::normalize::title::TitleRule;
use crate::pipeline::{self, RunContext};
use crate::types::{EpgSource, RawScheduleEntry};

const SCHEDULE_URL: &str = "https://tv.kt.com/tv/channel/pSchedule.asp";
const CHANNEL_LIST_URL: &str = "https://tv.kt.com/tv/channel/pChList.asp";
const REFERER: &str = "https://tv.kt.com/";

static RATING_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([\d,]+)").unwrap());

/// olleh tv: daily schedule tables per channel, start times only.
pub struct KtSource;

#[async_trait(?Send)]
impl EpgSource for KtSource {
    fn name(&self) -> &'static str {
        constants::KT
    }

    async fn collect(
        &self,
        ctx: &RunContext,
        channels: &[ChannelRecord],
        out: &mut GuideWriter,
    ) -> Result<()> {
        info!("KT: fetching schedules for {} channels", channels.len());

        let available = match self.fetch_catalog(ctx).await {
            Ok(services) => services,
            Err(e) => {
                error!("KT: channel catalog fetch failed, falling back to the requested list: {e}");
                channels.iter().map(|c| c.service_id.clone()).collect()
            }
        };

        for channel in channels {
            if !available.contains(&channel.service_id) {
                warn!(
                    "KT: service id {} ({}) is not in the live catalog, skipping",
                    channel.service_id,
                    channel.name.as_deref().unwrap_or("?")
                );
                continue;
            }
            let mut entries = Vec::new();
            for k in 0..ctx.days {
                let day = ctx.today + Duration::days(i64::from(k));
                match self.fetch_day(ctx, channel, day).await {
                    Ok(day_entries) => entries.extend(day_entries),
                    Err(e) => error!(
                        "KT: schedule fetch failed for {} on {}: {}",
                        channel.service_id, day, e
                    ),
                }
            }
            pipeline::emit_start_only(entries, TitleRule::Verbatim, out)?;
        }
        Ok(())
    }
}

impl KtSource {
    /// Dumps the live channel list and returns the available service ids.
    async fn fetch_catalog(&self, ctx: &RunContext) -> Result<Vec<String>> {
        let form = [
            ("ch_type", "3".to_string()),
            ("parent_menu_id", "0".to_string()),
        ];
        let body = ctx
            .fetcher
            .post_form_text(CHANNEL_LIST_URL, &form, REFERER)
            .await?;
        let document = Html::parse_document(&body);
        let selector = Selector::parse("li > a span.ch").unwrap();

        let mut discovered = Vec::new();
        let mut services = Vec::new();
        for span in document.select(&selector) {
            let text = span.text().collect::<String>();
            let decoded = urlencoding::decode(text.trim())
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| text.trim().to_string());
            let mut parts = decoded.split_whitespace();
            let Some(number) = parts.next() else { continue };
            let name = parts.collect::<Vec<_>>().join(" ");
            discovered.push(json!({
                "KT Name": name,
                "KTCh": number.parse::<i64>().ok(),
                "Source": constants::KT,
                "ServiceId": number,
            }));
            services.push(number.to_string());
        }
        channels::dump_discovered(constants::KT, &discovered);
        Ok(services)
    }

    async fn fetch_day(
        &self,
        ctx: &RunContext,
        channel: &ChannelRecord,
        day: NaiveDate,
    ) -> Result<Vec<RawScheduleEntry>> {
        let form = [
            ("ch_type", "3".to_string()),
            ("view_type", "1".to_string()),
            ("service_ch_no", channel.service_id.clone()),
            ("seldate", day.format("%Y%m%d").to_string()),
        ];
        let body = ctx
            .fetcher
            .post_form_text(SCHEDULE_URL, &form, REFERER)
            .await?;

        let channel_id = channel.id.map(|id| id.to_string()).unwrap_or_default();
        let document = Html::parse_document(&body);
        let row_selector = Selector::parse("tbody tr").unwrap();
        let cell_selector = Selector::parse("td").unwrap();
        let p_selector = Selector::parse("p").unwrap();
        let img_selector = Selector::parse("img[alt]").unwrap();

        let mut entries = Vec::new();
        for row in document.select(&row_selector) {
            let cells: Vec<_> = row.select(&cell_selector).collect();
            if cells.len() < 4 {
                continue;
            }
            let hour = cells[0].text().collect::<String>().trim().to_string();
            // The minute, programme and category columns line up row-wise.
            for ((minute, programme), category) in cells[1]
                .select(&p_selector)
                .zip(cells[2].select(&p_selector))
                .zip(cells[3].select(&p_selector))
            {
                let minute_text = minute.text().collect::<String>().trim().to_string();
                let slot_time = format!("{day} {hour}:{minute_text}");
                let Ok(start) = NaiveDateTime::parse_from_str(&slot_time, "%Y-%m-%d %H:%M") else {
                    warn!("KT: unparseable slot time {slot_time:?}, skipping");
                    continue;
                };
                let title = programme
                    .text()
                    .collect::<String>()
                    .replace("방송중 ", "")
                    .trim()
                    .to_string();
                let mut rating = 0;
                for img in programme.select(&img_selector) {
                    if let Some(alt) = img.value().attr("alt") {
                        if let Some(caps) = RATING_PREFIX.captures(alt) {
                            rating = caps[1].replace(',', "").parse().unwrap_or(0);
                        }
                    }
                }
                let mut entry = RawScheduleEntry::new(&channel_id, start, &title);
                entry.category = Some(category.text().collect::<String>().trim().to_string());
                entry.rating = Some(rating);
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}
