use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde_json::Value;
use tracing::{error, info};

use epg_scraper::channels::{self, Catalog, ChannelRecord};
use epg_scraper::config::{AppConfig, Isp, OutputMode, Overrides};
use epg_scraper::constants;
use epg_scraper::emit::{self, GuideWriter, XmltvWriter};
use epg_scraper::error::Result;
use epg_scraper::fetch::HttpFetcher;
use epg_scraper::pipeline::RunContext;
use epg_scraper::{logging, providers};

#[derive(Parser)]
#[command(name = "epg_scraper")]
#[command(about = "Korean broadcast/streaming EPG to XMLTV aggregator")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, default_value = "epg.toml")]
    config: PathBuf,

    /// Channel catalog file path
    #[arg(long, default_value = "Channel.json")]
    channelfile: PathBuf,

    /// Log level for the console and file logs
    #[arg(long, value_enum, default_value = "INFO")]
    loglevel: LogLevel,

    /// ISP to take channel numbers and names from
    #[arg(short, long, value_enum)]
    isp: Option<Isp>,

    /// Channel ids as a range expression, e.g. -3,5,7-9,11-
    #[arg(short, long)]
    channels: Option<String>,

    /// Days of schedule to fetch (1-7)
    #[arg(long)]
    days: Option<u32>,

    /// Print the generated guide to stdout
    #[arg(short, long, group = "output")]
    display: bool,

    /// Write the generated guide to a file
    #[arg(
        short,
        long,
        group = "output",
        value_name = "XMLTVFILE",
        num_args = 0..=1,
        default_missing_value = "xmltv.xml"
    )]
    outfile: Option<PathBuf>,

    /// Send the generated guide to a unix socket
    #[arg(
        short,
        long,
        group = "output",
        value_name = "XMLTVSOCK",
        num_args = 0..=1,
        default_missing_value = "xmltv.sock"
    )]
    socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let output = if self.display {
            Some(OutputMode::Display)
        } else if self.outfile.is_some() {
            Some(OutputMode::File)
        } else if self.socket.is_some() {
            Some(OutputMode::Socket)
        } else {
            None
        };
        Overrides {
            config: self.config.clone(),
            isp: self.isp,
            channels: self.channels.clone(),
            days: self.days,
            output,
            xml_file: self.outfile.clone(),
            xml_socket: self.socket.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.loglevel.as_directive());

    let cfg = match AppConfig::resolve(&cli.overrides()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&cli.channelfile, &cfg).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(channel_file: &Path, cfg: &AppConfig) -> Result<()> {
    let catalog = Catalog::load(channel_file)?;
    let selected = channels::select_channels(&cfg.channels, &catalog.ids())?;

    let ctx = RunContext {
        today: chrono::Local::now().date_naive(),
        days: cfg.days,
        fetcher: HttpFetcher::new(&cfg.fetch)?,
    };

    let mut writer: GuideWriter = XmltvWriter::new(emit::open_sink(cfg)?, cfg.emit_options());
    writer.write_header()?;

    // Channel elements for the catalog-driven sources, then their
    // programmes; the range selection gates both.
    let mut per_source: HashMap<String, Vec<ChannelRecord>> = HashMap::new();
    for record in &catalog.records {
        if !constants::CATALOG_SOURCES.contains(&record.source.as_str()) {
            continue;
        }
        let Some(id) = record.id else { continue };
        if !selected.contains(&id.to_string()) {
            continue;
        }
        let icon = channel_icon(record, cfg);
        writer.write_channel(&id.to_string(), &display_names(record, cfg.isp), icon.as_deref())?;
        per_source
            .entry(record.source.clone())
            .or_default()
            .push(record.clone());
    }

    for source in constants::CATALOG_SOURCES {
        let channels = per_source.remove(source).unwrap_or_default();
        if channels.is_empty() {
            continue;
        }
        collect_source(source, cfg, &ctx, channels, &mut writer).await?;
    }

    // The streaming sources publish their own channel lists and are not
    // gated by the range selection.
    for source in constants::LIVE_SOURCES {
        let channels = catalog.of_source(source);
        if channels.is_empty() {
            continue;
        }
        collect_source(source, cfg, &ctx, channels, &mut writer).await?;
    }

    writer.finish()?;
    info!("guide generation finished");
    Ok(())
}

async fn collect_source(
    source: &str,
    cfg: &AppConfig,
    ctx: &RunContext,
    channels: Vec<ChannelRecord>,
    writer: &mut GuideWriter,
) -> Result<()> {
    let Some(provider) = providers::create_source(source, cfg) else {
        return Ok(());
    };
    // Provider failures leave a partial guide, never a dead run.
    if let Err(e) = provider.collect(ctx, &channels, writer).await {
        error!("{source}: collection failed: {e}");
    }
    Ok(())
}

/// Display-name variants for one channel element: the catalog name alone
/// for `ALL`, plus the ISP's own name and number when a specific ISP is
/// chosen and the catalog knows the channel there.
fn display_names(record: &ChannelRecord, isp: Isp) -> Vec<String> {
    let channel_name = record.name.clone().unwrap_or_default();
    match isp.catalog_key() {
        None => vec![channel_name],
        Some(key) => {
            let number = record
                .extra
                .get(&format!("{key}Ch"))
                .filter(|value| !value.is_null())
                .map(value_to_string);
            match number {
                Some(number) => {
                    let isp_name = record
                        .extra
                        .get(&format!("{key} Name"))
                        .and_then(|value| value.as_str())
                        .unwrap_or_default()
                        .to_string();
                    vec![
                        channel_name,
                        isp_name.clone(),
                        number.clone(),
                        format!("{number} {isp_name}"),
                    ]
                }
                None => Vec::new(),
            }
        }
    }
}

fn channel_icon(record: &ChannelRecord, cfg: &AppConfig) -> Option<String> {
    if cfg.icon_url.is_empty() {
        record.icon_url.clone()
    } else {
        record
            .id
            .map(|id| format!("{}/{}.png", cfg.icon_url, id))
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
