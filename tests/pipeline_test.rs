use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};

use epg_scraper::config::{AppConfig, EpisodeSystem, OutputMode, Overrides};
use epg_scraper::emit::{EmitOptions, XmltvWriter};
use epg_scraper::normalize::title::TitleRule;
use epg_scraper::pipeline;
use epg_scraper::types::RawScheduleEntry;

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 8, 6)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn options() -> EmitOptions {
    EmitOptions {
        episode_system: EpisodeSystem::Onscreen,
        append_episode: false,
        append_rebroadcast: false,
        verbose_description: false,
    }
}

#[test]
fn start_only_slots_pair_and_lose_the_last() -> Result<()> {
    let entries = vec![
        RawScheduleEntry::new("5", at(6, 0), "아침 뉴스"),
        RawScheduleEntry::new("5", at(7, 30), "생활 정보"),
        RawScheduleEntry::new("5", at(9, 0), "아침 드라마 (8회)"),
        RawScheduleEntry::new("5", at(9, 40), "다음날 첫 방송"),
    ];
    let mut writer = XmltvWriter::new(Vec::new(), options());
    pipeline::emit_start_only(entries, TitleRule::Wavve, &mut writer)?;
    let xml = String::from_utf8(writer.into_inner())?;

    assert_eq!(xml.matches("<programme ").count(), 3);
    // Each slot ends where the next begins.
    assert!(xml.contains("start=\"20260806060000 +0900\" stop=\"20260806073000 +0900\""));
    assert!(xml.contains("start=\"20260806073000 +0900\" stop=\"20260806090000 +0900\""));
    assert!(xml.contains("start=\"20260806090000 +0900\" stop=\"20260806094000 +0900\""));
    // The sentinel slot exists only to close the previous interval.
    assert!(!xml.contains("다음날 첫 방송"));
    // Title facets survived the trip.
    assert!(xml.contains("<title lang=\"kr\">아침 드라마</title>"));
    assert!(xml.contains("<episode-num system=\"onscreen\">8</episode-num>"));
    Ok(())
}

#[test]
fn single_slot_channels_emit_nothing() -> Result<()> {
    let entries = vec![RawScheduleEntry::new("5", at(6, 0), "외딴 슬롯")];
    let mut writer = XmltvWriter::new(Vec::new(), options());
    pipeline::emit_start_only(entries, TitleRule::Verbatim, &mut writer)?;
    assert!(writer.into_inner().is_empty());
    Ok(())
}

#[test]
fn out_of_order_input_is_not_silently_fixed() -> Result<()> {
    // The zipper trusts the provider ordering; a slot that starts after
    // its successor yields an inverted interval, which the emitter drops.
    let entries = vec![
        RawScheduleEntry::new("5", at(9, 0), "늦은 슬롯"),
        RawScheduleEntry::new("5", at(6, 0), "이른 슬롯"),
        RawScheduleEntry::new("5", at(10, 0), "마지막 슬롯"),
    ];
    let mut writer = XmltvWriter::new(Vec::new(), options());
    pipeline::emit_start_only(entries, TitleRule::Verbatim, &mut writer)?;
    let xml = String::from_utf8(writer.into_inner())?;
    assert!(!xml.contains("늦은 슬롯"));
    assert!(xml.contains("이른 슬롯"));
    Ok(())
}

#[test]
fn paired_slots_skip_the_zipper() -> Result<()> {
    let mut entry = RawScheduleEntry::new("9", at(20, 0), "단편 영화");
    entry.end = Some(at(21, 30));
    let mut writer = XmltvWriter::new(Vec::new(), options());
    pipeline::emit_paired(vec![entry], TitleRule::Verbatim, &mut writer)?;
    let xml = String::from_utf8(writer.into_inner())?;
    assert_eq!(xml.matches("<programme ").count(), 1);
    assert!(xml.contains("stop=\"20260806213000 +0900\""));
    Ok(())
}

#[test]
fn config_file_and_cli_merge_in_precedence_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("epg.toml");
    std::fs::write(
        &config_path,
        r#"
isp = "KT"
channels = "1-20"
days = 3

[output]
mode = "file"
xml_file = "guide.xml"

[format]
episode_system = "xmltv_ns"
verbose_description = true

[fetch]
delay_ms = 250
timeout_seconds = 5
"#,
    )?;

    let cfg = AppConfig::resolve(&Overrides {
        config: config_path.clone(),
        days: Some(5),
        channels: Some("7-9".to_string()),
        ..Overrides::default()
    })?;

    // CLI wins where it speaks, the file fills the rest.
    assert_eq!(cfg.days, 5);
    assert_eq!(cfg.channels, "7-9");
    assert_eq!(cfg.output, OutputMode::File);
    assert_eq!(cfg.xml_file.to_str(), Some("guide.xml"));
    assert_eq!(cfg.episode_system, EpisodeSystem::XmltvNs);
    assert!(cfg.verbose_description);
    assert!(cfg.append_episode);
    assert_eq!(cfg.fetch.delay_ms, 250);
    assert_eq!(cfg.fetch.timeout_seconds, 5);
    Ok(())
}

#[test]
fn out_of_range_days_are_a_fatal_config_error() -> Result<()> {
    let result = AppConfig::resolve(&Overrides {
        days: Some(0),
        ..Overrides::default()
    });
    assert!(result.is_err());
    let result = AppConfig::resolve(&Overrides {
        days: Some(8),
        ..Overrides::default()
    });
    assert!(result.is_err());
    Ok(())
}

#[test]
fn missing_config_file_falls_back_to_defaults() -> Result<()> {
    let cfg = AppConfig::resolve(&Overrides {
        config: std::path::PathBuf::from("/nonexistent/epg.toml"),
        ..Overrides::default()
    })?;
    assert_eq!(cfg.days, 2);
    assert_eq!(cfg.channels, "*");
    assert_eq!(cfg.output, OutputMode::Display);
    assert_eq!(cfg.episode_system, EpisodeSystem::Onscreen);
    assert_eq!(cfg.fetch.delay_ms, 1000);
    Ok(())
}

#[test]
fn channel_catalog_loads_and_groups_by_source() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Channel.json");
    std::fs::write(
        &path,
        r#"[
            {"Id": 1, "Name": "공영1", "Source": "KT", "ServiceId": 9, "KTCh": 9, "KT Name": "공영1TV"},
            {"Id": 2, "Name": "공영2", "Source": "LG", "ServiceId": "502"},
            {"Name": "웨이브채널", "Source": "WAVVE", "ServiceId": "W01"}
        ]"#,
    )?;

    let catalog = epg_scraper::channels::Catalog::load(&path)?;
    assert_eq!(catalog.records.len(), 3);
    assert_eq!(catalog.ids(), vec![1, 2]);
    assert_eq!(catalog.of_source("KT").len(), 1);
    assert_eq!(catalog.of_source("WAVVE")[0].service_id, "W01");
    Ok(())
}
