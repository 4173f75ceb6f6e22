//! Video resolution: turning a page URL into direct stream URLs.
//!
//! The heavy lifting is done by an external yt-dlp compatible program. This
//! module only spawns it, honours cancellation, and normalizes its
//! `--dump-single-json` output into [`MediaInfo`].

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ResolveError;

/// One downloadable variant of a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    pub resolution: String,
    pub format: String,
    pub stream_url: String,
}

impl StreamFormat {
    pub fn new(
        resolution: impl Into<String>,
        format: impl Into<String>,
        stream_url: impl Into<String>,
    ) -> Self {
        Self {
            resolution: resolution.into(),
            format: format.into(),
            stream_url: stream_url.into(),
        }
    }
}

/// Metadata returned by a resolver. `formats` keeps the resolver's order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub title: String,
    pub formats: Vec<StreamFormat>,
}

/// External capability that resolves a URL into stream formats.
///
/// Implementations must watch `cancel` at every suspension point and return
/// [`ResolveError::Cancelled`] once it fires.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, url: &str, cancel: &CancellationToken)
    -> Result<MediaInfo, ResolveError>;
}

/// Picks the stream for a request.
///
/// Exact (resolution, format) match first, then the first entry with the
/// requested format regardless of resolution. Order of `formats` decides ties.
pub fn select_stream<'a>(
    formats: &'a [StreamFormat],
    resolution: &str,
    format: &str,
) -> Result<&'a StreamFormat, ResolveError> {
    formats
        .iter()
        .find(|f| f.resolution == resolution && f.format == format)
        .or_else(|| formats.iter().find(|f| f.format == format))
        .ok_or_else(|| ResolveError::FormatNotFound {
            resolution: resolution.to_string(),
            format: format.to_string(),
        })
}

/// Resolver backed by `yt-dlp --dump-single-json`.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
    fallback: Option<String>,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            fallback: None,
        }
    }

    /// Program tried when the primary one cannot be started at all.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        if !fallback.is_empty() && fallback != self.program {
            self.fallback = Some(fallback);
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn(program: &str, url: &str) -> io::Result<Child> {
        Command::new(program)
            .args([
                "--dump-single-json",
                "--skip-download",
                "--no-warnings",
                "--no-playlist",
                url,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }

    fn spawn_with_fallback(&self, url: &str) -> Result<Child, ResolveError> {
        match Self::spawn(&self.program, url) {
            Ok(child) => Ok(child),
            Err(err) => {
                let Some(fallback) = &self.fallback else {
                    return Err(ResolveError::Unavailable(format!("{}: {err}", self.program)));
                };
                warn!(
                    program = %self.program,
                    fallback = %fallback,
                    error = %err,
                    "primary resolver failed to start, trying fallback"
                );
                Self::spawn(fallback, url)
                    .map_err(|err| ResolveError::Unavailable(format!("{fallback}: {err}")))
            }
        }
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<MediaInfo, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let child = self.spawn_with_fallback(url)?;
        debug!(url, "resolver started");

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|err| ResolveError::Program(format!("waiting for resolver: {err}")))?,
            _ = cancel.cancelled() => {
                debug!(url, "resolver cancelled");
                return Err(ResolveError::Cancelled);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(url, stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_media_info(&stdout)
    }
}

fn classify_failure(url: &str, stderr: &str) -> ResolveError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("unsupported url") || lowered.contains("is not a valid url") {
        return ResolveError::InvalidUrl(url.to_string());
    }
    let message = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no error output");
    ResolveError::Program(message.to_string())
}

/// Subset of yt-dlp's single-video JSON that matters for stream selection.
#[derive(Debug, Deserialize)]
struct DumpedInfo {
    title: Option<String>,
    fulltitle: Option<String>,
    #[serde(default)]
    formats: Vec<DumpedFormat>,
    // Single-format extractors put the stream at the top level.
    url: Option<String>,
    ext: Option<String>,
    height: Option<i64>,
    format_note: Option<String>,
    vcodec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DumpedFormat {
    url: Option<String>,
    ext: Option<String>,
    height: Option<i64>,
    format_note: Option<String>,
    vcodec: Option<String>,
}

/// Converts resolver JSON into [`MediaInfo`], dropping formats with no URL.
pub fn parse_media_info(json: &str) -> Result<MediaInfo, ResolveError> {
    let info: DumpedInfo =
        serde_json::from_str(json).map_err(|err| ResolveError::Parse(err.to_string()))?;

    let mut formats: Vec<StreamFormat> = info
        .formats
        .iter()
        .filter_map(|f| {
            let url = f.url.as_deref().filter(|u| !u.is_empty())?;
            let ext = f.ext.as_deref().filter(|e| !e.is_empty())?;
            Some(StreamFormat::new(
                resolution_label(f.format_note.as_deref(), f.height, f.vcodec.as_deref()),
                ext,
                url,
            ))
        })
        .collect();

    if formats.is_empty() {
        if let (Some(url), Some(ext)) = (info.url.as_deref(), info.ext.as_deref()) {
            formats.push(StreamFormat::new(
                resolution_label(info.format_note.as_deref(), info.height, info.vcodec.as_deref()),
                ext,
                url,
            ));
        }
    }

    let title = info
        .fulltitle
        .or(info.title)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "untitled".to_string());

    Ok(MediaInfo { title, formats })
}

/// "720p" style label. Prefers the note (`720p60` -> `720p`), then the height.
fn resolution_label(note: Option<&str>, height: Option<i64>, vcodec: Option<&str>) -> String {
    if vcodec == Some("none") {
        return "audio".to_string();
    }
    if let Some(note) = note {
        let digits: String = note.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() && note[digits.len()..].starts_with('p') {
            return format!("{digits}p");
        }
    }
    match height {
        Some(h) if h > 0 => format!("{h}p"),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Resolver returning a canned outcome and recording the URLs it saw.
    pub(crate) struct StaticResolver {
        outcome: Result<MediaInfo, ResolveError>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl StaticResolver {
        pub(crate) fn ok(title: &str, formats: Vec<StreamFormat>) -> Self {
            Self {
                outcome: Ok(MediaInfo {
                    title: title.to_string(),
                    formats,
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: ResolveError) -> Self {
            Self {
                outcome: Err(error),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Resolver for StaticResolver {
        async fn resolve(
            &self,
            url: &str,
            cancel: &CancellationToken,
        ) -> Result<MediaInfo, ResolveError> {
            self.calls.lock().push(url.to_string());
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            self.outcome.clone()
        }
    }
}
