use clap::ValueEnum;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::constants;
use crate::emit::EmitOptions;
use crate::error::{EpgError, Result};

/// ISP whose channel numbers and names are added to the channel elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[value(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum Isp {
    All,
    Kt,
    Lg,
    Sk,
}

impl Isp {
    /// The key prefix this ISP uses in the channel catalog (`KTCh`,
    /// `KT Name`, ...), or `None` for `ALL`.
    pub fn catalog_key(&self) -> Option<&'static str> {
        match self {
            Isp::All => None,
            Isp::Kt => Some("KT"),
            Isp::Lg => Some("LG"),
            Isp::Sk => Some("SK"),
        }
    }
}

/// Which episode-num encoding the emitter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeSystem {
    Onscreen,
    XmltvNs,
}

/// Where the generated guide goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Display,
    File,
    Socket,
}

/// HTTP behavior shared by every provider adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Courtesy delay after every request, success or failure.
    pub delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            timeout_seconds: 15,
        }
    }
}

/// Fully resolved run configuration, immutable for the whole run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub isp: Isp,
    /// Channel range expression, e.g. `-3,5,7-9,11-`.
    pub channels: String,
    /// Days of schedule to fetch, 1-7.
    pub days: u32,
    pub output: OutputMode,
    pub xml_file: PathBuf,
    pub xml_socket: PathBuf,
    /// Base URL for channel icons; empty keeps the catalog's own icons.
    pub icon_url: String,
    pub episode_system: EpisodeSystem,
    pub append_episode: bool,
    pub append_rebroadcast: bool,
    pub verbose_description: bool,
    pub fetch: FetchConfig,
    pub wavve_api_key: String,
    pub tving_api_key: String,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: PathBuf,
    pub isp: Option<Isp>,
    pub channels: Option<String>,
    pub days: Option<u32>,
    pub output: Option<OutputMode>,
    pub xml_file: Option<PathBuf>,
    pub xml_socket: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    isp: Option<Isp>,
    channels: Option<String>,
    days: Option<u32>,
    output: OutputSection,
    format: FormatSection,
    fetch: FetchConfig,
    providers: ProvidersSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputSection {
    mode: Option<OutputMode>,
    xml_file: Option<PathBuf>,
    xml_socket: Option<PathBuf>,
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FormatSection {
    episode_system: EpisodeSystem,
    append_episode: bool,
    append_rebroadcast: bool,
    verbose_description: bool,
}

impl Default for FormatSection {
    fn default() -> Self {
        Self {
            episode_system: EpisodeSystem::Onscreen,
            append_episode: true,
            append_rebroadcast: true,
            verbose_description: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProvidersSection {
    wavve_api_key: Option<String>,
    tving_api_key: Option<String>,
}

impl AppConfig {
    /// Resolves the run configuration: command line over config file over
    /// built-in defaults.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let file = if overrides.config.exists() {
            let raw = fs::read_to_string(&overrides.config).map_err(|e| {
                EpgError::Config(format!(
                    "failed to read config file '{}': {}",
                    overrides.config.display(),
                    e
                ))
            })?;
            toml::from_str::<FileConfig>(&raw)?
        } else {
            FileConfig::default()
        };

        let days = overrides.days.or(file.days).unwrap_or(2);
        if !(1..=7).contains(&days) {
            return Err(EpgError::Config(format!(
                "days must be between 1 and 7, got {days}"
            )));
        }

        let output = overrides
            .output
            .or(file.output.mode)
            .unwrap_or(OutputMode::Display);

        Ok(Self {
            isp: overrides.isp.or(file.isp).unwrap_or(Isp::All),
            channels: overrides
                .channels
                .clone()
                .or(file.channels)
                .unwrap_or_else(|| "*".to_string()),
            days,
            output,
            xml_file: overrides
                .xml_file
                .clone()
                .or(file.output.xml_file)
                .unwrap_or_else(|| PathBuf::from("xmltv.xml")),
            xml_socket: overrides
                .xml_socket
                .clone()
                .or(file.output.xml_socket)
                .unwrap_or_else(|| PathBuf::from("xmltv.sock")),
            icon_url: file.output.icon_url.unwrap_or_default(),
            episode_system: file.format.episode_system,
            append_episode: file.format.append_episode,
            append_rebroadcast: file.format.append_rebroadcast,
            verbose_description: file.format.verbose_description,
            fetch: file.fetch,
            wavve_api_key: std::env::var("WAVVE_API_KEY")
                .ok()
                .or(file.providers.wavve_api_key)
                .unwrap_or_else(|| constants::DEFAULT_WAVVE_API_KEY.to_string()),
            tving_api_key: std::env::var("TVING_API_KEY")
                .ok()
                .or(file.providers.tving_api_key)
                .unwrap_or_else(|| constants::DEFAULT_TVING_API_KEY.to_string()),
        })
    }

    /// The emit-time slice of the configuration.
    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            episode_system: self.episode_system,
            append_episode: self.append_episode,
            append_rebroadcast: self.append_rebroadcast,
            verbose_description: self.verbose_description,
        }
    }
}
