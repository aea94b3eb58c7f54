use std::io::Write;

use chrono::NaiveDate;
use metrics::counter;

use crate::emit::XmltvWriter;
use crate::error::Result;
use crate::fetch::HttpFetcher;
use crate::normalize::title::TitleRule;
use crate::normalize::{self, zipper};
use crate::types::RawScheduleEntry;

/// Everything a source adapter needs for one run.
pub struct RunContext {
    /// First day of the fetch window, provider-local time.
    pub today: NaiveDate,
    /// Days of schedule to fetch, including `today`.
    pub days: u32,
    pub fetcher: HttpFetcher,
}

/// Emits a channel's start-only slots: the slots are paired into intervals
/// first (the final slot is lost to the pairing), then normalized and
/// written.
pub fn emit_start_only<W: Write>(
    entries: Vec<RawScheduleEntry>,
    rule: TitleRule,
    out: &mut XmltvWriter<W>,
) -> Result<()> {
    emit_paired(zipper::pair_intervals(entries), rule, out)
}

/// Emits slots that already carry explicit intervals.
pub fn emit_paired<W: Write>(
    entries: Vec<RawScheduleEntry>,
    rule: TitleRule,
    out: &mut XmltvWriter<W>,
) -> Result<()> {
    for entry in entries {
        counter!("epg_raw_entries_total").increment(1);
        if let Some(programme) = normalize::to_programme(entry, rule) {
            out.write_programme(&programme)?;
        }
    }
    Ok(())
}
