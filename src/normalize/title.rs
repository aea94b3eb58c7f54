use once_cell::sync::Lazy;
use regex::Regex;

/// Decomposed facets of a raw provider title string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleFacets {
    pub title: String,
    pub subtitle: String,
    /// Raw episode indicator, digits and commas; empty when absent.
    pub episode: String,
    pub rebroadcast: bool,
}

// One anchored pattern per provider surface syntax. Each must match the
// entire string; with every facet optional that always succeeds in
// practice, but an unmatched input still degrades to title-only.
static LG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s?(?:\[.*?\])?(.*?)(?:\[(.*)\])?\s?(?:\(([\d,]+)회\))?\s?(<재>)?$").unwrap()
});
static SKB_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)(?:\(([\d,]+)회\))?(?:<(.*)>)?(?:\((재)\))?$").unwrap());
static WAVVE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)(?:\s*[(<]([\d,회]+)[)>])?(?:\s*<([^<]*?)>)?(?:\s*\((재)\))?$").unwrap()
});
static PART_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*) \(?(\d+부)\)?$").unwrap());

/// Provider-specific surface syntax for title strings.
///
/// All providers encode the same four facets; only the markers differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRule {
    /// `제목 [부제] (3회) <재>` — LG U+ schedule cells.
    Lg,
    /// `제목(3회)<부제>(재)` — SK Broadband schedule cells.
    Skb,
    /// `제목 (3회) <부제>(재)` — WAVVE titles and SK Btv feed titles.
    Wavve,
    /// The title is already bare; no facets are encoded in it.
    Verbatim,
}

impl TitleRule {
    pub fn parse(&self, raw: &str) -> TitleFacets {
        match self {
            TitleRule::Lg => split_facets(&LG_PATTERN, raw, Groups { subtitle: 2, episode: 3, rebroadcast: 4 }, false),
            TitleRule::Skb => split_facets(&SKB_PATTERN, raw, Groups { subtitle: 3, episode: 2, rebroadcast: 4 }, false),
            TitleRule::Wavve => split_facets(&WAVVE_PATTERN, raw, Groups { subtitle: 3, episode: 2, rebroadcast: 4 }, true),
            TitleRule::Verbatim => TitleFacets {
                title: raw.trim().to_string(),
                ..TitleFacets::default()
            },
        }
    }
}

struct Groups {
    subtitle: usize,
    episode: usize,
    rebroadcast: usize,
}

fn split_facets(pattern: &Regex, raw: &str, groups: Groups, strip_count_marker: bool) -> TitleFacets {
    let Some(caps) = pattern.captures(raw) else {
        // Unmatched input keeps the whole string as the title.
        return TitleFacets {
            title: raw.trim().to_string(),
            ..TitleFacets::default()
        };
    };
    let group = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };
    let mut episode = group(groups.episode);
    if strip_count_marker {
        episode = episode.replace('회', "");
        if episode == "0" {
            // A 0th episode carries no signal.
            episode.clear();
        }
    }
    TitleFacets {
        title: group(1),
        subtitle: group(groups.subtitle),
        episode,
        rebroadcast: caps.get(groups.rebroadcast).is_some(),
    }
}

/// Splits a trailing `<base> <digits>부` season/part marker out of a title.
///
/// Runs after the provider-specific decomposition, for every provider: the
/// marker moves to the front of the subtitle and the title is truncated to
/// the base.
pub fn split_part_marker(title: &str, subtitle: &str) -> (String, String) {
    match PART_MARKER.captures(title) {
        Some(caps) => {
            let base = caps[1].trim().to_string();
            let subtitle = format!("{} {}", &caps[2], subtitle).trim().to_string();
            (base, subtitle)
        }
        None => (title.to_string(), subtitle.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wavve_rule_decomposes_all_four_facets() {
        let facets = TitleRule::Wavve.parse("드라마 제목 (3회) <서브타이틀> (재)");
        assert_eq!(facets.title, "드라마 제목");
        assert_eq!(facets.episode, "3");
        assert_eq!(facets.subtitle, "서브타이틀");
        assert!(facets.rebroadcast);
    }

    #[test]
    fn wavve_rule_strips_the_count_marker_and_zero() {
        assert_eq!(TitleRule::Wavve.parse("음악캠프 <12회>").episode, "12");
        assert_eq!(TitleRule::Wavve.parse("음악캠프 (0회)").episode, "");
    }

    #[test]
    fn lg_rule_handles_leading_tag_and_bracket_subtitle() {
        let facets = TitleRule::Lg.parse("[HD] 수목드라마 [외전] (12회) <재>");
        assert_eq!(facets.title, "수목드라마");
        assert_eq!(facets.subtitle, "외전");
        assert_eq!(facets.episode, "12");
        assert!(facets.rebroadcast);
    }

    #[test]
    fn skb_rule_decomposes_unspaced_markers() {
        let facets = TitleRule::Skb.parse("남자의 자격(3회)<밴드의 탄생>(재)");
        assert_eq!(facets.title, "남자의 자격");
        assert_eq!(facets.episode, "3");
        assert_eq!(facets.subtitle, "밴드의 탄생");
        assert!(facets.rebroadcast);
    }

    #[test]
    fn bare_titles_pass_through_unscathed() {
        for rule in [TitleRule::Lg, TitleRule::Skb, TitleRule::Wavve, TitleRule::Verbatim] {
            let facets = rule.parse("아침마당");
            assert_eq!(facets.title, "아침마당");
            assert_eq!(facets.subtitle, "");
            assert_eq!(facets.episode, "");
            assert!(!facets.rebroadcast);
        }
    }

    #[test]
    fn part_marker_moves_to_the_subtitle() {
        assert_eq!(
            split_part_marker("미니시리즈 2부", ""),
            ("미니시리즈".to_string(), "2부".to_string())
        );
        assert_eq!(
            split_part_marker("미니시리즈 (2부)", "에필로그"),
            ("미니시리즈".to_string(), "2부 에필로그".to_string())
        );
    }

    #[test]
    fn titles_without_a_part_marker_are_untouched() {
        assert_eq!(
            split_part_marker("6시 내고향", "부안편"),
            ("6시 내고향".to_string(), "부안편".to_string())
        );
    }
}
