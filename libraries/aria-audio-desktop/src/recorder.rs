//! Microphone recording to WAV
//!
//! The cpal input callback converts to S16 into a buffer taken from a
//! fixed pool and `try_send`s it into a bounded channel. When the writer
//! falls behind and no buffer is free the block is dropped and counted
//! instead of blocking or allocating. A writer thread drains the channel
//! with `recv_timeout`, polling a cancel flag between reads, hands each
//! buffer back to the pool and finalizes the WAV on stop.

use crate::error::{DesktopError, Result};
use aria_audio::pcm;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use hound::{SampleFormat as WavSampleFormat, WavSpec, WavWriter};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Chunks buffered between the input callback and the writer
const CHUNK_CAPACITY: usize = 64;

/// Initial capacity of each pooled chunk, in samples
const CHUNK_SAMPLES: usize = 4096;

/// How often the writer checks the cancel flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Format of every recording
pub fn wav_spec() -> WavSpec {
    WavSpec {
        channels: pcm::CHANNELS as u16,
        sample_rate: pcm::SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: WavSampleFormat::Int,
    }
}

/// Input side of the chunk pool, owned by the cpal callback
pub struct InputFeed {
    chunks: Sender<Vec<i16>>,
    spare: Receiver<Vec<i16>>,
    dropped: Arc<AtomicU64>,
}

impl InputFeed {
    /// Build a feed with `buffers` pooled chunks
    ///
    /// Returns the feed, the receiver the writer drains, and the sender the
    /// writer returns spent chunks on.
    pub fn new(buffers: usize) -> (Self, Receiver<Vec<i16>>, Sender<Vec<i16>>) {
        let (chunk_tx, chunk_rx) = bounded(buffers);
        let (spare_tx, spare_rx) = bounded(buffers);
        for _ in 0..buffers {
            let _ = spare_tx.try_send(Vec::with_capacity(CHUNK_SAMPLES));
        }

        let feed = Self {
            chunks: chunk_tx,
            spare: spare_rx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (feed, chunk_rx, spare_tx)
    }

    /// Shared counter of samples that never reached the writer
    pub fn dropped(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Queue one callback's worth of samples without blocking
    pub fn push(&self, samples: impl ExactSizeIterator<Item = i16>) {
        let count = samples.len() as u64;
        let Ok(mut chunk) = self.spare.try_recv() else {
            self.dropped.fetch_add(count, Ordering::Relaxed);
            return;
        };

        chunk.clear();
        chunk.extend(samples);
        if self.chunks.try_send(chunk).is_err() {
            self.dropped.fetch_add(count, Ordering::Relaxed);
        }
    }
}

/// Drain `chunks` into `writer` until cancelled or the feed goes away
///
/// Spent chunks go back to the pool through `spare`. Chunks already queued
/// when the flag is raised are still written. Returns the number of samples
/// written.
pub fn write_wav<W: Write + Seek>(
    chunks: &Receiver<Vec<i16>>,
    spare: &Sender<Vec<i16>>,
    cancel: &AtomicBool,
    mut writer: WavWriter<W>,
) -> Result<u64> {
    let mut written = 0u64;
    let mut write_chunk = |chunk: Vec<i16>, writer: &mut WavWriter<W>| -> Result<()> {
        for sample in &chunk {
            writer.write_sample(*sample)?;
        }
        written += chunk.len() as u64;
        // Fails only once the feed is gone.
        let _ = spare.try_send(chunk);
        Ok(())
    };

    loop {
        match chunks.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => write_chunk(chunk, &mut writer)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if cancel.load(Ordering::Acquire) {
            while let Ok(chunk) = chunks.try_recv() {
                write_chunk(chunk, &mut writer)?;
            }
            break;
        }
    }

    writer.finalize()?;
    Ok(written)
}

/// An in-progress recording from the default input device
pub struct Recorder {
    path: PathBuf,
    cancel: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    writer: Option<JoinHandle<Result<u64>>>,
    /// Dropping this stops the input stream thread
    stream_shutdown: Option<Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Start recording to `path`
    ///
    /// # Errors
    /// Fails if the file cannot be created or there is no usable input
    /// device.
    pub fn start(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = WavWriter::create(&path, wav_spec())?;

        let (feed, chunk_rx, spare_tx) = InputFeed::new(CHUNK_CAPACITY);
        let dropped = feed.dropped();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let stream_thread = thread::Builder::new()
            .name("aria-input".to_string())
            .spawn(move || {
                let stream = match build_input_stream(feed) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| DesktopError::Thread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = stream_thread.join();
                return Err(DesktopError::Thread(
                    "input thread exited during setup".to_string(),
                ));
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let writer_cancel = Arc::clone(&cancel);
        let writer = thread::Builder::new()
            .name("aria-recorder".to_string())
            .spawn(move || write_wav(&chunk_rx, &spare_tx, &writer_cancel, writer))
            .map_err(|e| DesktopError::Thread(e.to_string()))?;

        tracing::info!(path = %path.display(), "Recording started");
        Ok(Self {
            path,
            cancel,
            dropped,
            writer: Some(writer),
            stream_shutdown: Some(shutdown_tx),
            stream_thread: Some(stream_thread),
        })
    }

    /// Destination file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True until `stop` is called
    pub fn is_recording(&self) -> bool {
        self.writer.is_some() && !self.cancel.load(Ordering::Acquire)
    }

    /// Samples lost because the writer fell behind
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop recording and finalize the file
    pub fn stop(mut self) -> Result<PathBuf> {
        let samples = self.finish()?;
        let samples_per_sec = u64::from(pcm::SAMPLE_RATE) * pcm::CHANNELS as u64;
        let dropped = self.dropped_samples();
        if dropped > 0 {
            tracing::warn!(
                path = %self.path.display(),
                dropped_samples = dropped,
                dropped_ms = dropped * 1000 / samples_per_sec,
                "Recording lost audio, writer fell behind"
            );
        }
        tracing::info!(
            path = %self.path.display(),
            seconds = samples / samples_per_sec,
            "Recording saved"
        );
        Ok(self.path.clone())
    }

    fn finish(&mut self) -> Result<u64> {
        self.stream_shutdown.take();
        if let Some(thread) = self.stream_thread.take() {
            let _ = thread.join();
        }

        self.cancel.store(true, Ordering::Release);
        match self.writer.take() {
            Some(writer) => writer
                .join()
                .map_err(|_| DesktopError::Recording("writer thread panicked".to_string()))?,
            None => Ok(0),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "Recording did not finalize cleanly");
        }
    }
}

fn build_input_stream(feed: InputFeed) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(DesktopError::DeviceNotFound)?;

    let format = device
        .supported_input_configs()?
        .filter(|range| {
            usize::from(range.channels()) == pcm::CHANNELS
                && range.min_sample_rate() <= pcm::SAMPLE_RATE
                && range.max_sample_rate() >= pcm::SAMPLE_RATE
        })
        .map(|range| range.sample_format())
        .find(|format| matches!(format, SampleFormat::F32 | SampleFormat::I16))
        .ok_or_else(|| {
            DesktopError::Device(format!(
                "no {} Hz stereo f32/i16 input format",
                pcm::SAMPLE_RATE
            ))
        })?;

    let config = StreamConfig {
        channels: pcm::CHANNELS as u16,
        sample_rate: pcm::SAMPLE_RATE,
        buffer_size: BufferSize::Default,
    };
    let on_error = |err: cpal::StreamError| tracing::error!(error = %err, "Input stream error");

    let stream = match format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                feed.push(data.iter().copied());
            },
            on_error,
            None,
        )?,
        _ => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                feed.push(data.iter().map(|s| pcm::f32_to_s16(*s)));
            },
            on_error,
            None,
        )?,
    };

    stream.play()?;
    Ok(stream)
}
