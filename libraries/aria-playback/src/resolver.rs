//! Stream resolvers
//!
//! Turn a track's media reference into something the backend can open.

use aria_core::{AriaError, MediaId, StreamResolver, StreamSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

/// Media id is already a path or URL
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectResolver;

#[async_trait]
impl StreamResolver for DirectResolver {
    async fn resolve(&self, media_id: &MediaId) -> aria_core::Result<StreamSource> {
        if media_id.is_blank() {
            return Err(AriaError::invalid_track("empty media id"));
        }
        Ok(source_from_url(media_id.as_str()))
    }
}

/// Resolves YouTube Music ids to direct audio URLs with `yt-dlp`
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: PathBuf,
    watch_base: String,
    timeout: Duration,
}

impl YtDlpResolver {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    const FORMAT: &'static str = "bestaudio[ext=m4a]/bestaudio";

    /// Use `yt-dlp` from `PATH`
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            watch_base: "https://music.youtube.com/watch?v=".to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Page URL handed to yt-dlp
    pub fn watch_url(&self, media_id: &MediaId) -> String {
        format!("{}{}", self.watch_base, media_id.as_str())
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, media_id: &MediaId) -> aria_core::Result<StreamSource> {
        if media_id.is_blank() {
            return Err(AriaError::invalid_track("empty media id"));
        }

        let mut command = Command::new(&self.program);
        command
            .args(["--format", Self::FORMAT, "--get-url", "--no-playlist"])
            .arg(self.watch_url(media_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                AriaError::resolution(format!(
                    "yt-dlp timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                AriaError::resolution(format!(
                    "failed to run {}: {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or("no output").trim();
            return Err(AriaError::resolution(format!(
                "yt-dlp exited with {}: {reason}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = first_line(&stdout)
            .ok_or_else(|| AriaError::resolution(format!("yt-dlp returned no URL for {media_id}")))?;

        let source = source_from_url(url);
        tracing::debug!(%media_id, url = source.log_label(), expires_at = ?source.expires_at, "Stream resolved");
        Ok(source)
    }
}

fn first_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Wrap a URL, reading its `expire` query parameter when present
pub fn source_from_url(url: &str) -> StreamSource {
    let source = StreamSource::new(url);
    match expiry_of(url) {
        Some(expires_at) => source.with_expiry(expires_at),
        None => source,
    }
}

fn expiry_of(url: &str) -> Option<DateTime<Utc>> {
    let parsed = Url::parse(url).ok()?;
    let (_, value) = parsed.query_pairs().find(|(key, _)| key == "expire")?;
    let seconds = value.parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0)
}
