/// Source name constants to ensure consistency across the codebase.
/// These are the `Source` tags used in the channel catalog file.

pub const KT: &str = "KT";
pub const LG: &str = "LG";
pub const SK: &str = "SK";
pub const SKB: &str = "SKB";
pub const NAVER: &str = "NAVER";
pub const WAVVE: &str = "WAVVE";
pub const TVING: &str = "TVING";

/// Sources whose channel elements come from the catalog file and whose
/// channels are gated by the range selection.
pub const CATALOG_SOURCES: [&str; 5] = [KT, LG, SK, SKB, NAVER];

/// Sources that publish their own live channel list; the range selection
/// does not apply to them.
pub const LIVE_SOURCES: [&str; 2] = [WAVVE, TVING];

/// Browser User-Agent sent with every provider request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/77.0.3865.90 Safari/537.36";

/// Published API keys the streaming providers embed in their web players.
/// Overridable via `WAVVE_API_KEY` / `TVING_API_KEY` or the config file.
pub const DEFAULT_WAVVE_API_KEY: &str = "E5F3E0D30947AA5440556471321BB6D9";
pub const DEFAULT_TVING_API_KEY: &str = "1e7952d0917d6aab1f0293a063697610";
