use crate::types::RawScheduleEntry;

/// Pairs start-only slots into intervals: each slot's end time is the next
/// slot's start time.
///
/// The input must already be in ascending start order per channel; this
/// function does not sort. N slots yield N-1 paired slots — the final slot
/// has no successor to supply its end and is dropped. Callers who need the
/// last slot covered must append a sentinel (e.g. the first slot of the
/// following day) before pairing.
pub fn pair_intervals(entries: Vec<RawScheduleEntry>) -> Vec<RawScheduleEntry> {
    if entries.len() < 2 {
        return Vec::new();
    }
    let mut paired = Vec::with_capacity(entries.len() - 1);
    let mut iter = entries.into_iter().peekable();
    while let Some(mut entry) = iter.next() {
        match iter.peek() {
            Some(next) => {
                entry.end = Some(next.start);
                paired.push(entry);
            }
            None => break,
        }
    }
    paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn slot(hour: u32, title: &str) -> RawScheduleEntry {
        let start = NaiveDate::from_ymd_opt(2026, 8, 6)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        RawScheduleEntry::new("1", start, title)
    }

    #[test]
    fn n_slots_yield_n_minus_one_intervals() {
        let paired = pair_intervals(vec![slot(6, "뉴스"), slot(7, "드라마"), slot(9, "영화")]);
        assert_eq!(paired.len(), 2);
        assert_eq!(paired[0].title, "뉴스");
        assert_eq!(paired[0].end, Some(paired[1].start));
        assert_eq!(paired[1].title, "드라마");
        assert_eq!(paired[1].end.unwrap(), slot(9, "").start);
    }

    #[test]
    fn each_end_is_the_next_start() {
        let input: Vec<_> = (0..8).map(|h| slot(h, "slot")).collect();
        let starts: Vec<_> = input.iter().map(|e| e.start).collect();
        let paired = pair_intervals(input);
        assert_eq!(paired.len(), 7);
        for (i, entry) in paired.iter().enumerate() {
            assert_eq!(entry.end, Some(starts[i + 1]));
        }
    }

    #[test]
    fn short_inputs_yield_nothing() {
        assert!(pair_intervals(Vec::new()).is_empty());
        assert!(pair_intervals(vec![slot(6, "외딴 슬롯")]).is_empty());
    }
}
