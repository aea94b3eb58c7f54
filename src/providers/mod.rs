pub mod kt;
pub mod lg;
pub mod naver;
pub mod sk;
pub mod skb;
pub mod tving;
pub mod wavve;

use scraper::ElementRef;

use crate::config::AppConfig;
use crate::constants;
use crate::types::EpgSource;

/// Instantiates the adapter for a source tag, `None` for unknown tags.
pub fn create_source(name: &str, cfg: &AppConfig) -> Option<Box<dyn EpgSource>> {
    match name {
        constants::KT => Some(Box::new(kt::KtSource)),
        constants::LG => Some(Box::new(lg::LgSource)),
        constants::SK => Some(Box::new(sk::SkSource)),
        constants::SKB => Some(Box::new(skb::SkbSource)),
        constants::NAVER => Some(Box::new(naver::NaverSource)),
        constants::WAVVE => Some(Box::new(wavve::WavveSource::new(&cfg.wavve_api_key))),
        constants::TVING => Some(Box::new(tving::TvingSource::new(&cfg.tving_api_key))),
        _ => None,
    }
}

/// Text content of an element, skipping every descendant element matched
/// by `skip`. scraper offers no node removal, so badge spans and the like
/// are excluded at collection time instead.
pub(crate) fn text_excluding<F>(cell: ElementRef, skip: F) -> String
where
    F: Fn(&scraper::node::Element) -> bool,
{
    let mut out = String::new();
    for node in cell.descendants() {
        if let Some(text) = node.value().as_text() {
            let mut skipped = false;
            for ancestor in node.ancestors() {
                if ancestor.id() == cell.id() {
                    break;
                }
                if let Some(element) = ancestor.value().as_element() {
                    if skip(element) {
                        skipped = true;
                        break;
                    }
                }
            }
            if !skipped {
                out.push_str(&text.text);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn create_source_knows_every_source_tag() {
        let cfg = crate::config::AppConfig::resolve(&crate::config::Overrides::default()).unwrap();
        for tag in constants::CATALOG_SOURCES.iter().chain(constants::LIVE_SOURCES.iter()) {
            let source = create_source(tag, &cfg).unwrap();
            assert_eq!(source.name(), *tag);
        }
        assert!(create_source("CABLE", &cfg).is_none());
    }

    #[test]
    fn text_excluding_drops_badge_spans() {
        let html = Html::parse_fragment(
            r#"<div>주말연속극 <span class="tagGroup"><span class="tag cte_all">15</span></span> [최종회]</div>"#,
        );
        let cell = html
            .select(&Selector::parse("div").unwrap())
            .next()
            .unwrap();
        let text = text_excluding(cell, |el| {
            el.name() == "span" && el.classes().any(|c| c == "tagGroup")
        });
        assert_eq!(text.trim(), "주말연속극  [최종회]".trim());
    }
}
