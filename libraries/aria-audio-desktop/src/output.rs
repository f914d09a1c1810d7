/// CPAL output device fed through a lock-free ring
use crate::error::{DesktopError, Result};
use aria_audio::{pcm, OutputDevice};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Ring capacity, in seconds of audio
const RING_SECONDS: f32 = 0.5;

/// Default output device at 44.1 kHz stereo
///
/// **Architecture**: a dedicated thread owns the CPAL `Stream` (it is not
/// `Send` on every platform) and keeps it alive until this device is
/// dropped. PCM crosses to the device callback through an `rtrb` ring;
/// [`OutputDevice::write`] pushes what fits and never blocks.
pub struct CpalOutputDevice {
    producer: rtrb::Producer<i16>,
    /// Dropping this ends the stream thread
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutputDevice {
    /// Open the default output device
    ///
    /// # Errors
    /// Returns an error if there is no output device or it rejects
    /// 44.1 kHz stereo.
    pub fn open() -> Result<Self> {
        let capacity = (pcm::SAMPLE_RATE as f32 * RING_SECONDS) as usize * pcm::CHANNELS;
        let (producer, consumer) = rtrb::RingBuffer::<i16>::new(capacity);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("aria-output".to_string())
            .spawn(move || Self::stream_thread_run(consumer, &ready_tx, &shutdown_rx))
            .map_err(|e| DesktopError::Thread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                producer,
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(DesktopError::Thread("output thread exited during setup".to_string()))
            }
        }
    }

    /// Free space in the ring, in samples
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    fn stream_thread_run(
        consumer: rtrb::Consumer<i16>,
        ready: &Sender<Result<()>>,
        shutdown: &Receiver<()>,
    ) {
        let stream = match build_output_stream(consumer) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(()));
        tracing::info!("Output stream started");

        // Only returns once the device is dropped.
        let _ = shutdown.recv();
        drop(stream);
        tracing::debug!("Output stream stopped");
    }
}

impl OutputDevice for CpalOutputDevice {
    fn write(&mut self, bytes: &[u8]) -> aria_audio::Result<usize> {
        let frames = pcm::frame_count(bytes).min(self.producer.slots() / pcm::CHANNELS);
        let len = frames * pcm::BYTES_PER_FRAME;

        for sample in bytes[..len].chunks_exact(pcm::BYTES_PER_SAMPLE) {
            // Slots were counted above, so the push cannot fail.
            let _ = self
                .producer
                .push(i16::from_ne_bytes([sample[0], sample[1]]));
        }
        Ok(len)
    }
}

impl Drop for CpalOutputDevice {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Pick a stereo 44.1 kHz format the device supports, preferring f32
fn select_format(device: &Device) -> Result<SampleFormat> {
    let mut formats: Vec<SampleFormat> = device
        .supported_output_configs()?
        .filter(|range| {
            usize::from(range.channels()) == pcm::CHANNELS
                && range.min_sample_rate() <= pcm::SAMPLE_RATE
                && range.max_sample_rate() >= pcm::SAMPLE_RATE
        })
        .map(|range| range.sample_format())
        .collect();

    formats.sort_by_key(|format| match format {
        SampleFormat::F32 => 0,
        SampleFormat::I16 => 1,
        _ => 2,
    });

    match formats.first() {
        Some(format @ (SampleFormat::F32 | SampleFormat::I16)) => Ok(*format),
        _ => Err(DesktopError::Device(format!(
            "no {} Hz stereo f32/i16 output format",
            pcm::SAMPLE_RATE
        ))),
    }
}

fn build_output_stream(mut consumer: rtrb::Consumer<i16>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(DesktopError::DeviceNotFound)?;
    let format = select_format(&device)?;

    let config = StreamConfig {
        channels: pcm::CHANNELS as u16,
        sample_rate: pcm::SAMPLE_RATE,
        buffer_size: BufferSize::Default,
    };
    let on_error = |err: cpal::StreamError| tracing::error!(error = %err, "Output stream error");

    let stream = match format {
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    *out = consumer.pop().unwrap_or(0);
                }
            },
            on_error,
            None,
        )?,
        _ => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    *out = consumer.pop().map_or(0.0, |s| f32::from(s) / 32768.0);
                }
            },
            on_error,
            None,
        )?,
    };

    stream.play()?;
    Ok(stream)
}
