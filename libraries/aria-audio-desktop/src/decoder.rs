//! Streaming decoder producing 44.1 kHz interleaved stereo
//!
//! Symphonia reads the container and decodes packets; every sample format
//! is normalized to f32 and folded to stereo (mono is duplicated, extra
//! channels are averaged into left and right). Sources at other rates go
//! through a chunked rubato resampler that carries partial chunks over to
//! the next packet and flushes them at end of stream.

use crate::error::{DesktopError, Result};
use aria_audio::pcm;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::core::units::Time;
use url::Url;

/// Input chunk for the resampler, 0.1 s of source audio
const RESAMPLE_CHUNK_DIVISOR: u32 = 10;

/// Where a backend reads a stream from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Remote(Url),
}

impl SourceLocation {
    /// Classify a resolved URL or plain path
    pub fn parse(location: &str) -> Result<Self> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(DesktopError::Open("empty location".to_string()));
        }

        match Url::parse(trimmed) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::File)
                .map_err(|()| DesktopError::Open(format!("bad file URL: {trimmed}"))),
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            // Windows drive letters parse as a one-letter scheme.
            Ok(url) if url.scheme().len() > 1 => Err(DesktopError::Open(format!(
                "unsupported scheme: {}",
                url.scheme()
            ))),
            _ => Ok(Self::File(PathBuf::from(trimmed))),
        }
    }

    /// Extension hint for the prober
    pub fn extension_hint(&self) -> Option<String> {
        match self {
            Self::File(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase),
            Self::Remote(url) => {
                let from_mime = url
                    .query_pairs()
                    .find(|(key, _)| key == "mime")
                    .and_then(|(_, mime)| match mime.as_ref() {
                        "audio/mp4" => Some("m4a".to_string()),
                        "audio/webm" => Some("webm".to_string()),
                        "audio/mpeg" => Some("mp3".to_string()),
                        _ => None,
                    });
                from_mime.or_else(|| {
                    Path::new(url.path())
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(str::to_lowercase)
                })
            }
        }
    }

    /// Open the bytes behind this location
    ///
    /// Remote sources are downloaded whole before decoding starts.
    pub fn open(&self, http: &reqwest::blocking::Client) -> Result<Box<dyn MediaSource>> {
        match self {
            Self::File(path) => {
                let file = File::open(path).map_err(|e| {
                    DesktopError::Open(format!("{}: {e}", path.display()))
                })?;
                Ok(Box::new(file))
            }
            Self::Remote(url) => {
                let response = http
                    .get(url.clone())
                    .send()
                    .and_then(reqwest::blocking::Response::error_for_status)
                    .map_err(|e| DesktopError::Fetch(e.to_string()))?;
                let bytes = response
                    .bytes()
                    .map_err(|e| DesktopError::Fetch(e.to_string()))?;
                tracing::debug!(bytes = bytes.len(), host = ?url.host_str(), "Downloaded stream");
                Ok(Box::new(Cursor::new(bytes.to_vec())))
            }
        }
    }
}

/// Decoder for one stream, yielding 44.1 kHz interleaved stereo f32
pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    source_rate: u32,
    duration: Option<Duration>,
    resampler: Option<StreamResampler>,
    scratch: Vec<f32>,
    /// Source frames to discard after a seek landed before its target
    skip_frames: u64,
    eof: bool,
}

impl StreamDecoder {
    /// Probe `source` and prepare its default audio track
    pub fn new(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DesktopError::Decode(format!("failed to probe stream: {e}")))?;
        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| DesktopError::Decode("no audio track".to_string()))?;
        let track_id = track.id;
        let source_rate = track.codec_params.sample_rate.unwrap_or(pcm::SAMPLE_RATE);
        let duration = track
            .codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / f64::from(source_rate)));

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DesktopError::Decode(format!("unsupported codec: {e}")))?;

        let resampler = if source_rate == pcm::SAMPLE_RATE {
            None
        } else {
            Some(StreamResampler::new(source_rate, pcm::SAMPLE_RATE)?)
        };

        tracing::debug!(
            source_rate,
            resampling = resampler.is_some(),
            duration = ?duration,
            "Opened stream"
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            source_rate,
            duration,
            resampler,
            scratch: Vec::new(),
            skip_frames: 0,
            eof: false,
        })
    }

    /// Open a location, downloading remote sources first
    pub fn open(location: &SourceLocation, http: &reqwest::blocking::Client) -> Result<Self> {
        let source = location.open(http)?;
        Self::new(source, location.extension_hint().as_deref())
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Append the next decoded block to `out`
    ///
    /// Returns `false` once the stream is exhausted and everything buffered
    /// has been flushed. A block may be empty while the resampler gathers a
    /// full chunk.
    pub fn next_block(&mut self, out: &mut Vec<f32>) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.eof = true;
                    if let Some(resampler) = self.resampler.as_mut() {
                        resampler.flush(out)?;
                    }
                    return Ok(!out.is_empty());
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.scratch.clear();
                    to_stereo_f32(decoded, &mut self.scratch);
                    self.trim_seek_preroll();
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!(error = e, "Skipping corrupt packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            match self.resampler.as_mut() {
                Some(resampler) => resampler.push(&self.scratch, out)?,
                None => out.extend_from_slice(&self.scratch),
            }
            return Ok(true);
        }
    }

    fn trim_seek_preroll(&mut self) {
        if self.skip_frames == 0 {
            return;
        }
        let frames = (self.scratch.len() / pcm::CHANNELS) as u64;
        let skipped = self.skip_frames.min(frames);
        self.scratch.drain(..skipped as usize * pcm::CHANNELS);
        self.skip_frames -= skipped;
    }

    /// Jump to `position`
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(
                        position.as_secs(),
                        f64::from(position.subsec_nanos()) / 1e9,
                    ),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| DesktopError::Decode(format!("seek failed: {e}")))?;
        self.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.decoder.reset();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
        self.eof = false;
        Ok(())
    }
}

/// Chunked sinc resampler for interleaved stereo
struct StreamResampler {
    inner: SincFixedIn<f32>,
    /// Deinterleaved input not yet processed
    pending: [Vec<f32>; pcm::CHANNELS],
}

impl StreamResampler {
    fn new(from: u32, to: u32) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let chunk = (from / RESAMPLE_CHUNK_DIVISOR).max(1) as usize;
        let inner = SincFixedIn::<f32>::new(
            f64::from(to) / f64::from(from),
            1.0,
            params,
            chunk,
            pcm::CHANNELS,
        )
        .map_err(|e| DesktopError::Resample(e.to_string()))?;

        Ok(Self {
            inner,
            pending: [Vec::with_capacity(chunk * 2), Vec::with_capacity(chunk * 2)],
        })
    }

    fn push(&mut self, interleaved: &[f32], out: &mut Vec<f32>) -> Result<()> {
        for frame in interleaved.chunks_exact(pcm::CHANNELS) {
            self.pending[0].push(frame[0]);
            self.pending[1].push(frame[1]);
        }

        loop {
            let needed = self.inner.input_frames_next();
            if self.pending[0].len() < needed {
                return Ok(());
            }
            let chunk = [&self.pending[0][..needed], &self.pending[1][..needed]];
            let resampled = self
                .inner
                .process(&chunk[..], None)
                .map_err(|e| DesktopError::Resample(e.to_string()))?;
            interleave(&resampled, out);
            for channel in &mut self.pending {
                channel.drain(..needed);
            }
        }
    }

    fn flush(&mut self, out: &mut Vec<f32>) -> Result<()> {
        if self.pending[0].is_empty() {
            return Ok(());
        }
        let rest = [&self.pending[0][..], &self.pending[1][..]];
        let resampled = self
            .inner
            .process_partial(Some(&rest[..]), None)
            .map_err(|e| DesktopError::Resample(e.to_string()))?;
        interleave(&resampled, out);
        for channel in &mut self.pending {
            channel.clear();
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
        for channel in &mut self.pending {
            channel.clear();
        }
    }
}

fn interleave(channels: &[Vec<f32>], out: &mut Vec<f32>) {
    let frames = channels.first().map_or(0, Vec::len);
    out.reserve(frames * pcm::CHANNELS);
    for i in 0..frames {
        out.push(channels[0][i]);
        out.push(channels.get(1).map_or(channels[0][i], |right| right[i]));
    }
}

/// Fold any channel layout to interleaved stereo
fn fold_to_stereo<T, F>(buf: &AudioBuffer<T>, normalize: F, out: &mut Vec<f32>)
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    out.reserve(frames * pcm::CHANNELS);

    match channels {
        0 => {}
        1 => {
            for &sample in buf.chan(0) {
                let value = normalize(sample);
                out.push(value);
                out.push(value);
            }
        }
        2 => {
            for (&left, &right) in buf.chan(0).iter().zip(buf.chan(1)) {
                out.push(normalize(left));
                out.push(normalize(right));
            }
        }
        _ => {
            // Even channels feed the left, odd channels the right.
            let left_count = channels.div_ceil(2) as f32;
            let right_count = (channels / 2) as f32;
            for frame in 0..frames {
                let mut left = 0.0;
                let mut right = 0.0;
                for ch in 0..channels {
                    let value = normalize(buf.chan(ch)[frame]);
                    if ch % 2 == 0 {
                        left += value;
                    } else {
                        right += value;
                    }
                }
                out.push(left / left_count);
                out.push(right / right_count);
            }
        }
    }
}

fn to_stereo_f32(decoded: AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => fold_to_stereo(&buf, |s| s, out),
        AudioBufferRef::F64(buf) => fold_to_stereo(&buf, |s| s as f32, out),
        AudioBufferRef::S8(buf) => fold_to_stereo(&buf, |s| f32::from(s) / 128.0, out),
        AudioBufferRef::S16(buf) => fold_to_stereo(&buf, |s| f32::from(s) / 32768.0, out),
        AudioBufferRef::S24(buf) => fold_to_stereo(&buf, |s| s.inner() as f32 / 8_388_608.0, out),
        AudioBufferRef::S32(buf) => fold_to_stereo(&buf, |s| s as f32 / 2_147_483_648.0, out),
        AudioBufferRef::U8(buf) => fold_to_stereo(&buf, |s| (f32::from(s) - 128.0) / 128.0, out),
        AudioBufferRef::U16(buf) => {
            fold_to_stereo(&buf, |s| (f32::from(s) - 32768.0) / 32768.0, out);
        }
        AudioBufferRef::U24(buf) => {
            fold_to_stereo(&buf, |s| (s.inner() as f32 - 8_388_608.0) / 8_388_608.0, out);
        }
        AudioBufferRef::U32(buf) => {
            fold_to_stereo(&buf, |s| ((f64::from(s) - 2_147_483_648.0) / 2_147_483_648.0) as f32, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parsing() {
        assert_eq!(
            SourceLocation::parse("/music/a.flac").unwrap(),
            SourceLocation::File(PathBuf::from("/music/a.flac"))
        );
        assert!(matches!(
            SourceLocation::parse("https://example.com/a.mp3").unwrap(),
            SourceLocation::Remote(_)
        ));
        assert!(matches!(
            SourceLocation::parse("file:///tmp/a.wav").unwrap(),
            SourceLocation::File(_)
        ));
        assert!(SourceLocation::parse("   ").is_err());
        assert!(SourceLocation::parse("ftp://example.com/a.mp3").is_err());
    }

    #[test]
    fn test_extension_hints() {
        let remote = SourceLocation::parse(
            "https://rr1.googlevideo.com/videoplayback?expire=1&mime=audio%2Fmp4",
        )
        .unwrap();
        assert_eq!(remote.extension_hint().as_deref(), Some("m4a"));

        let file = SourceLocation::parse("/music/Song.FLAC").unwrap();
        assert_eq!(file.extension_hint().as_deref(), Some("flac"));
    }

    #[test]
    fn test_resampler_output_length_tracks_ratio() {
        let mut resampler = StreamResampler::new(48_000, 44_100).unwrap();
        let one_second = vec![0.1f32; 48_000 * 2];
        let mut out = Vec::new();

        for block in one_second.chunks(1152 * 2) {
            resampler.push(block, &mut out).unwrap();
        }
        resampler.flush(&mut out).unwrap();

        let frames = out.len() / 2;
        assert_eq!(out.len() % 2, 0);
        assert!((44_100 - 2_000..=44_100 + 6_000).contains(&frames), "got {frames} frames");
    }

    #[test]
    fn test_interleave_duplicates_mono() {
        let mut out = Vec::new();
        interleave(&[vec![0.5, -0.5]], &mut out);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
    }
}
