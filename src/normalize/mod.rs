pub mod category;
pub mod episode;
pub mod title;
pub mod zipper;

use tracing::warn;

use crate::types::{Programme, RawScheduleEntry};
use title::TitleRule;

/// Builds a canonical programme from one raw provider slot.
///
/// No inner failure escapes this boundary: unmatched title patterns, bad
/// episode indicators and unknown genres all degrade to empty facets.
/// Returns `None` only when the slot carries no end time, which cannot
/// happen for slots that went through the zipper.
pub fn to_programme(entry: RawScheduleEntry, rule: TitleRule) -> Option<Programme> {
    let end = match entry.end {
        Some(end) => end,
        None => {
            warn!(channel = %entry.channel_id, title = %entry.title, "slot has no end time, dropping");
            return None;
        }
    };

    let facets = rule.parse(&entry.title);
    // Facets the provider reported as their own fields win over anything
    // recovered from the title string.
    let subtitle = entry.subtitle.unwrap_or(facets.subtitle);
    let episode_raw = entry.episode.unwrap_or(facets.episode);
    let rebroadcast = entry.rebroadcast.unwrap_or(facets.rebroadcast);

    let (title, subtitle) = title::split_part_marker(&facets.title, &subtitle);

    let category = entry.category.unwrap_or_default();

    Some(Programme {
        channel_id: entry.channel_id,
        start: entry.start,
        end,
        title,
        subtitle,
        description: entry.description.unwrap_or_default(),
        actors: split_credits(entry.actors),
        producers: split_credits(entry.producers),
        content_type: category::content_type(&category).to_string(),
        category,
        episode: episode::encode_episode(&episode_raw),
        rebroadcast,
        rating: entry.rating.unwrap_or(0),
        icon_url: entry.icon_url,
    })
}

/// Splits a comma-joined credit list, dropping blanks.
fn split_credits(joined: Option<String>) -> Vec<String> {
    joined
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(title: &str) -> RawScheduleEntry {
        let start = NaiveDate::from_ymd_opt(2026, 8, 6)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let mut entry = RawScheduleEntry::new("7", start, title);
        entry.end = Some(start + chrono::Duration::hours(1));
        entry
    }

    #[test]
    fn title_facets_flow_into_the_programme() {
        let programme = to_programme(entry("드라마 제목 (3회) <서브타이틀> (재)"), TitleRule::Wavve).unwrap();
        assert_eq!(programme.title, "드라마 제목");
        assert_eq!(programme.subtitle, "서브타이틀");
        assert_eq!(programme.episode.as_ref().unwrap().onscreen, "3");
        assert!(programme.rebroadcast);
    }

    #[test]
    fn provider_reported_fields_win_over_title_facets() {
        let mut raw = entry("저녁 뉴스");
        raw.subtitle = Some("수도권".to_string());
        raw.rebroadcast = Some(true);
        raw.episode = Some("11".to_string());
        let programme = to_programme(raw, TitleRule::Verbatim).unwrap();
        assert_eq!(programme.subtitle, "수도권");
        assert!(programme.rebroadcast);
        assert_eq!(programme.episode.unwrap().xmltv_ns, "0.10.0/0");
    }

    #[test]
    fn part_marker_splits_for_every_provider() {
        let programme = to_programme(entry("주말의 명화 2부"), TitleRule::Verbatim).unwrap();
        assert_eq!(programme.title, "주말의 명화");
        assert_eq!(programme.subtitle, "2부");
    }

    #[test]
    fn category_is_carried_raw_alongside_the_mapped_type() {
        let mut raw = entry("다큐 공감");
        raw.category = Some("시사/다큐".to_string());
        let programme = to_programme(raw, TitleRule::Verbatim).unwrap();
        assert_eq!(programme.category, "시사/다큐");
        assert_eq!(programme.content_type, "Documentary");
    }

    #[test]
    fn slots_without_an_end_time_are_dropped() {
        let mut raw = entry("마지막 슬롯");
        raw.end = None;
        assert!(to_programme(raw, TitleRule::Verbatim).is_none());
    }

    #[test]
    fn credit_lists_split_and_drop_blanks() {
        let mut raw = entry("영화");
        raw.actors = Some("김배우, 이배우, ".to_string());
        let programme = to_programme(raw, TitleRule::Verbatim).unwrap();
        assert_eq!(programme.actors, ["김배우", "이배우"]);
        assert!(programme.producers.is_empty());
    }
}
