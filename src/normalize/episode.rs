use crate::types::EpisodeNum;

/// Encodes a raw episode indicator into its onscreen and `xmltv_ns` forms.
///
/// The indicator may be a digit string or a comma-joined list, in which
/// case the first token counts. A literal `0` carries no signal in this
/// domain and yields no episode information at all; so does anything that
/// does not resolve to a number.
pub fn encode_episode(raw: &str) -> Option<EpisodeNum> {
    let first = raw.split(',').next().unwrap_or_default().trim();
    if first.is_empty() || first == "0" {
        return None;
    }
    let number: i64 = first.parse().ok()?;
    Some(EpisodeNum {
        onscreen: first.to_string(),
        // Sources never report seasons or multi-part structure, so the
        // season and part components stay fixed.
        xmltv_ns: format!("0.{}.0/0", number - 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_number_yields_both_encodings() {
        let episode = encode_episode("3").unwrap();
        assert_eq!(episode.onscreen, "3");
        assert_eq!(episode.xmltv_ns, "0.2.0/0");
    }

    #[test]
    fn zero_is_suppressed_entirely() {
        assert!(encode_episode("0").is_none());
    }

    #[test]
    fn comma_joined_indicator_falls_back_to_the_leading_token() {
        let episode = encode_episode("12,외").unwrap();
        assert_eq!(episode.onscreen, "12");
        assert_eq!(episode.xmltv_ns, "0.11.0/0");
    }

    #[test]
    fn non_numeric_indicator_yields_nothing() {
        assert!(encode_episode("외전").is_none());
        assert!(encode_episode("").is_none());
    }
}
