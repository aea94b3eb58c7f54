use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{EpgError, Result};

/// One record of the channel catalog file (`Channel.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Catalog-wide channel id; records without one cannot be selected.
    #[serde(rename = "Id", default)]
    pub id: Option<i64>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "ServiceId", deserialize_with = "string_or_number")]
    pub service_id: String,
    #[serde(rename = "Icon_url", default)]
    pub icon_url: Option<String>,
    /// Per-ISP channel numbers and names (`KTCh`, `KT Name`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Some providers report service ids as numbers, some as strings.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "ServiceId must be a string or number, got {other}"
        ))),
    }
}

/// The channel catalog for one run.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub records: Vec<ChannelRecord>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EpgError::Config(format!(
                "failed to read channel file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let records: Vec<ChannelRecord> = serde_json::from_str(&raw)?;
        Ok(Self { records })
    }

    /// Every catalog-wide channel id present in the file.
    pub fn ids(&self) -> Vec<i64> {
        self.records.iter().filter_map(|r| r.id).collect()
    }

    pub fn of_source(&self, source: &str) -> Vec<ChannelRecord> {
        self.records
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect()
    }
}

/// Expands a channel range expression into the sorted set of selected ids.
///
/// Tokens: `N` exact, `A-B` bounded, `-B` open-low, `A-` open-high, `*`
/// everything; tokens union, later tokens never remove. Open ends clamp to
/// the catalog's id bounds. Malformed tokens are operator input, so they
/// are fatal configuration errors, not data to skip.
pub fn select_channels(expr: &str, ids: &[i64]) -> Result<Vec<String>> {
    let min_id = *ids
        .iter()
        .min()
        .ok_or_else(|| EpgError::Config("channel catalog has no usable ids".to_string()))?;
    let max_id = *ids.iter().max().unwrap_or(&min_id);

    let mut marks = vec![false; (max_id - min_id + 1) as usize];
    let expr = expr.trim().trim_matches('"').trim_matches('\'');
    for token in expr.split(',') {
        let token = token.trim();
        let (mut first, mut last) = (min_id, max_id);
        if token != "*" {
            let ends: Vec<&str> = token.split('-').collect();
            match ends[..] {
                [single] => {
                    first = parse_channel_id(single)?;
                    last = first;
                }
                [low, high] => {
                    if !low.trim().is_empty() {
                        first = parse_channel_id(low)?;
                    }
                    if !high.trim().is_empty() {
                        last = parse_channel_id(high)?;
                    }
                }
                _ => {
                    return Err(EpgError::Config(format!(
                        "invalid channel range token: {token}"
                    )))
                }
            }
        }
        first = first.max(min_id);
        last = last.min(max_id);
        for id in first..=last {
            marks[(id - min_id) as usize] = true;
        }
    }

    Ok(marks
        .iter()
        .enumerate()
        .filter(|(_, marked)| **marked)
        .map(|(offset, _)| (min_id + offset as i64).to_string())
        .collect())
}

fn parse_channel_id(token: &str) -> Result<i64> {
    token
        .trim()
        .parse()
        .map_err(|_| EpgError::Config(format!("invalid channel id: {token:?}")))
}

/// Writes the channels discovered from a provider's live catalog to
/// `Channel_<SOURCE>.json`, prefixed with a header record carrying the
/// dump time. Failures only warn; the dump is a convenience artifact.
pub fn dump_discovered(source: &str, channels: &[Value]) {
    let path = format!("Channel_{source}.json");
    let header = serde_json::json!({
        "last update": chrono::Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
        "total": channels.len(),
    });
    let mut records = Vec::with_capacity(channels.len() + 1);
    records.push(header);
    records.extend(channels.iter().cloned());
    match serde_json::to_string_pretty(&records) {
        Ok(body) => {
            if let Err(e) = fs::write(&path, body) {
                warn!("failed to write {path}: {e}");
            }
        }
        Err(e) => warn!("failed to serialize {path}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Vec<i64> {
        (1..=12).collect()
    }

    #[test]
    fn range_expression_unions_all_token_forms() {
        let selected = select_channels("-3,5,7-9,11-", &domain()).unwrap();
        assert_eq!(selected, ["1", "2", "3", "5", "7", "8", "9", "11", "12"]);
    }

    #[test]
    fn wildcard_selects_the_full_domain() {
        let selected = select_channels("*", &domain()).unwrap();
        assert_eq!(selected.len(), 12);
        assert_eq!(selected.first().map(String::as_str), Some("1"));
        assert_eq!(selected.last().map(String::as_str), Some("12"));
    }

    #[test]
    fn open_ends_clamp_to_catalog_bounds() {
        let selected = select_channels("-100", &domain()).unwrap();
        assert_eq!(selected.len(), 12);
        let selected = select_channels("0-2", &domain()).unwrap();
        assert_eq!(selected, ["1", "2"]);
    }

    #[test]
    fn double_separator_is_a_config_error() {
        assert!(matches!(
            select_channels("1-2-3", &domain()),
            Err(EpgError::Config(_))
        ));
    }

    #[test]
    fn non_numeric_token_is_a_config_error() {
        assert!(select_channels("abc", &domain()).is_err());
        assert!(select_channels("", &domain()).is_err());
    }

    #[test]
    fn later_tokens_add_but_never_remove() {
        let selected = select_channels("5,5,4-6", &domain()).unwrap();
        assert_eq!(selected, ["4", "5", "6"]);
    }

    #[test]
    fn catalog_parses_mixed_service_id_types() {
        let raw = r#"[
            {"Id": 1, "Name": "공영1", "Source": "KT", "ServiceId": 9, "KTCh": 9, "KT Name": "공영1TV"},
            {"Source": "WAVVE", "ServiceId": "K01", "Name": "공영1"}
        ]"#;
        let records: Vec<ChannelRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(records[0].service_id, "9");
        assert_eq!(records[0].id, Some(1));
        assert_eq!(records[1].service_id, "K01");
        assert_eq!(records[1].id, None);
        assert_eq!(
            records[0].extra.get("KT Name").and_then(|v| v.as_str()),
            Some("공영1TV")
        );
    }
}
