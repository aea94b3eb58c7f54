use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::{AppConfig, EpisodeSystem, OutputMode};
use crate::error::{EpgError, Result};
use crate::types::Programme;

/// Escapes the XML character entities (`&`, `<`, `>`) in free text.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reverses [`escape_text`], for providers that deliver pre-escaped text.
pub fn unescape_text(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());

/// Emit-time options distilled from the run configuration.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub episode_system: EpisodeSystem,
    /// Append ` (N회)` to titles of slots with an episode number.
    pub append_episode: bool,
    /// Append ` (재)` to titles of rebroadcast slots.
    pub append_rebroadcast: bool,
    /// Synthesize a description block and credits.
    pub verbose_description: bool,
}

/// Serializes canonical programmes into the XMLTV guide document.
pub struct XmltvWriter<W: Write> {
    out: W,
    opts: EmitOptions,
}

/// The writer over the run's dynamically chosen output sink.
pub type GuideWriter = XmltvWriter<Box<dyn Write>>;

impl<W: Write> XmltvWriter<W> {
    pub fn new(out: W, opts: EmitOptions) -> Self {
        Self { out, opts }
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(self.out, "<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n")?;
        writeln!(
            self.out,
            "<tv generator-info-name=\"epg_scraper {}\">",
            env!("CARGO_PKG_VERSION")
        )?;
        Ok(())
    }

    pub fn write_channel(
        &mut self,
        id: &str,
        display_names: &[String],
        icon: Option<&str>,
    ) -> Result<()> {
        writeln!(self.out, "  <channel id=\"{}\">", escape_text(id))?;
        for name in display_names {
            writeln!(
                self.out,
                "    <display-name>{}</display-name>",
                escape_text(name)
            )?;
        }
        if let Some(icon) = icon {
            if !icon.is_empty() {
                writeln!(self.out, "    <icon src=\"{}\" />", escape_text(icon))?;
            }
        }
        writeln!(self.out, "  </channel>")?;
        Ok(())
    }

    /// Serializes one programme block.
    ///
    /// Slots whose end does not lie strictly after their start are dropped
    /// here with a warning; providers occasionally report such intervals.
    pub fn write_programme(&mut self, programme: &Programme) -> Result<()> {
        if programme.end <= programme.start {
            warn!(
                channel = %programme.channel_id,
                title = %programme.title,
                start = %programme.start,
                stop = %programme.end,
                "dropping programme with non-positive interval"
            );
            counter!("epg_programmes_dropped_total").increment(1);
            return Ok(());
        }

        let mut title = programme.title.clone();
        if let Some(episode) = &programme.episode {
            if self.opts.append_episode {
                title = format!("{} ({}회)", title, episode.onscreen);
            }
        }
        if programme.rebroadcast && self.opts.append_rebroadcast {
            title = format!("{} (재)", title);
        }

        let rating = if programme.rating == 0 {
            "전체 관람가".to_string()
        } else {
            format!("{}세 이상 관람가", programme.rating)
        };

        writeln!(
            self.out,
            "  <programme start=\"{} +0900\" stop=\"{} +0900\" channel=\"{}\">",
            programme.start.format("%Y%m%d%H%M%S"),
            programme.end.format("%Y%m%d%H%M%S"),
            escape_text(&programme.channel_id)
        )?;
        writeln!(self.out, "    <title lang=\"kr\">{}</title>", escape_text(&title))?;
        if !programme.subtitle.is_empty() {
            writeln!(
                self.out,
                "    <sub-title lang=\"kr\">{}</sub-title>",
                escape_text(&programme.subtitle)
            )?;
        }
        if self.opts.verbose_description {
            let desc = self.compose_description(programme, &title, &rating);
            writeln!(self.out, "    <desc lang=\"kr\">{}</desc>", escape_text(&desc))?;
            if !programme.actors.is_empty() || !programme.producers.is_empty() {
                writeln!(self.out, "    <credits>")?;
                for actor in &programme.actors {
                    writeln!(self.out, "      <actor>{}</actor>", escape_text(actor))?;
                }
                for producer in &programme.producers {
                    writeln!(self.out, "      <producer>{}</producer>", escape_text(producer))?;
                }
                writeln!(self.out, "    </credits>")?;
            }
        }
        if !programme.category.is_empty() {
            writeln!(
                self.out,
                "    <category lang=\"kr\">{}</category>",
                escape_text(&programme.category)
            )?;
        }
        if !programme.content_type.is_empty() {
            writeln!(
                self.out,
                "    <category lang=\"en\">{}</category>",
                programme.content_type
            )?;
        }
        if let Some(episode) = &programme.episode {
            match self.opts.episode_system {
                EpisodeSystem::XmltvNs => writeln!(
                    self.out,
                    "    <episode-num system=\"xmltv_ns\">{}</episode-num>",
                    episode.xmltv_ns
                )?,
                EpisodeSystem::Onscreen => writeln!(
                    self.out,
                    "    <episode-num system=\"onscreen\">{}</episode-num>",
                    escape_text(&episode.onscreen)
                )?,
            }
        }
        if programme.rebroadcast {
            writeln!(self.out, "    <previously-shown />")?;
        }
        writeln!(self.out, "    <rating system=\"KMRB\">")?;
        writeln!(self.out, "      <value>{rating}</value>")?;
        writeln!(self.out, "    </rating>")?;
        if let Some(icon) = &programme.icon_url {
            if !icon.is_empty() {
                writeln!(self.out, "    <icon src=\"{}\" />", escape_text(icon))?;
            }
        }
        writeln!(self.out, "  </programme>")?;
        counter!("epg_programmes_emitted_total").increment(1);
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        writeln!(self.out, "</tv>")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// The verbose description block: the display title followed by one
    /// Korean-labelled line per known facet, then the provider synopsis.
    fn compose_description(&self, programme: &Programme, display_title: &str, rating: &str) -> String {
        let mut desc = display_title.to_string();
        if !programme.subtitle.is_empty() {
            desc.push_str(&format!("\n부제 : {}", programme.subtitle));
        }
        if programme.rebroadcast && self.opts.append_rebroadcast {
            desc.push_str("\n방송 : 재방송");
        }
        if let Some(episode) = &programme.episode {
            desc.push_str(&format!("\n회차 : {}회", episode.onscreen));
        }
        if !programme.category.is_empty() {
            desc.push_str(&format!("\n장르 : {}", programme.category));
        }
        if !programme.actors.is_empty() {
            desc.push_str(&format!("\n출연 : {}", programme.actors.join(",")));
        }
        if !programme.producers.is_empty() {
            desc.push_str(&format!("\n제작 : {}", programme.producers.join(",")));
        }
        desc.push_str(&format!("\n등급 : {rating}"));
        if !programme.description.is_empty() {
            desc.push_str(&format!("\n{}", programme.description));
        }
        MULTI_SPACE.replace_all(&desc, " ").into_owned()
    }
}

/// Opens the configured output sink behind one `Write` object.
pub fn open_sink(cfg: &AppConfig) -> Result<Box<dyn Write>> {
    match cfg.output {
        OutputMode::Display => Ok(Box::new(io::stdout())),
        OutputMode::File => {
            let file = File::create(&cfg.xml_file)?;
            Ok(Box::new(BufWriter::new(file)))
        }
        OutputMode::Socket => open_socket(&cfg.xml_socket),
    }
}

#[cfg(unix)]
fn open_socket(path: &Path) -> Result<Box<dyn Write>> {
    use std::os::unix::net::UnixStream;
    let stream = UnixStream::connect(path).map_err(|e| {
        EpgError::Config(format!(
            "cannot connect to output socket {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
fn open_socket(_path: &Path) -> Result<Box<dyn Write>> {
    Err(EpgError::Config(
        "socket output is only available on unix platforms".to_string(),
    ))
}
