/// Track and stream source types
use super::{MediaId, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A playable track
///
/// Identity and display metadata are fixed once created. Metadata
/// enrichment happens outside the engine and produces a new `Track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// External identity
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub mood: Option<String>,
    pub bpm: Option<u32>,
    /// Reference handed to the stream resolver; `None` means unplayable
    pub media_id: Option<MediaId>,
    pub duration_secs: u32,
    pub thumbnail_url: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl Track {
    /// Create a track with the required display fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(id),
            title: title.into(),
            artist: artist.into(),
            album: None,
            genre: None,
            mood: None,
            bpm: None,
            media_id: None,
            duration_secs: 0,
            thumbnail_url: None,
            added_at: Utc::now(),
        }
    }

    /// Set the playable-source reference
    pub fn with_media_id(mut self, media_id: MediaId) -> Self {
        self.media_id = Some(media_id);
        self
    }

    /// Set the duration in seconds
    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Set the album name
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Media reference if present and not blank
    pub fn playable_media(&self) -> Option<&MediaId> {
        self.media_id.as_ref().filter(|m| !m.is_blank())
    }

    pub fn is_playable(&self) -> bool {
        self.playable_media().is_some()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_secs))
    }

    /// "Artist - Title" label used in logs and the CLI
    pub fn display_name(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

/// A time-limited playable source returned by a resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    /// URL or local path understood by the playback backend
    pub url: String,
    /// When the URL stops being valid, if the resolver knows
    pub expires_at: Option<DateTime<Utc>>,
}

impl StreamSource {
    /// Source with no known expiry
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the source has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// URL shortened for logging; signed stream URLs are long and noisy
    pub fn log_label(&self) -> &str {
        let end = self
            .url
            .char_indices()
            .nth(100)
            .map_or(self.url.len(), |(i, _)| i);
        &self.url[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn track_without_media_is_not_playable() {
        let track = Track::new("1", "Song", "Artist");
        assert!(!track.is_playable());

        let blank = Track::new("2", "Song", "Artist").with_media_id(MediaId::new(""));
        assert!(!blank.is_playable());

        let ok = Track::new("3", "Song", "Artist").with_media_id(MediaId::new("abc"));
        assert_eq!(ok.playable_media().map(MediaId::as_str), Some("abc"));
    }

    #[test]
    fn display_name_formats() {
        assert_eq!(Track::new("1", "Song", "Artist").display_name(), "Artist - Song");
        assert_eq!(Track::new("1", "Song", "").display_name(), "Song");
    }

    #[test]
    fn track_serde_round_trip_keeps_fields() {
        let track = Track::new("1", "Song", "Artist")
            .with_media_id(MediaId::new("abc"))
            .with_duration(215)
            .with_album("Album");
        let json = serde_json::to_string(&track).unwrap();
        let back: Track = serde_json::from_str(&json).unwrap();
        assert_eq!(back, track);
        assert_eq!(back.duration(), Duration::from_secs(215));
    }

    #[test]
    fn source_expiry() {
        let now = Utc::now();
        let source = StreamSource::new("https://example.invalid/a").with_expiry(now);
        assert!(source.is_expired_at(now));
        assert!(!source.is_expired_at(now - ChronoDuration::seconds(1)));
        assert!(!StreamSource::new("x").is_expired_at(now));
    }

    #[test]
    fn log_label_truncates_long_urls() {
        let url = format!("https://example.invalid/{}", "a".repeat(300));
        let source = StreamSource::new(url);
        assert_eq!(source.log_label().len(), 100);
    }
}
