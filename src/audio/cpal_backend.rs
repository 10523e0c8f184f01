// cpal-based capture backend
// This code interacts with hardware and is exercised by integration use,
// not unit tests; the engine's loops are tested against mock sources.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapRb,
};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use super::{AudioFrame, CaptureBackend, CaptureError, FrameSource};
use crate::audio_constants::{CAPTURE_RING_SAMPLES, FRAME_POLL_INTERVAL_MS, FRAME_SIZE, SAMPLE_RATE};
use crate::{debug, warn};

type RingProducer = ringbuf::HeapProd<i16>;
type RingConsumer = ringbuf::HeapCons<i16>;

/// Capture backend using cpal for platform audio input
///
/// Each `open` binds a fresh input stream to the default input device at
/// the engine sample rate. The stream delivers samples through a
/// lock-free SPSC ring; `CpalFrameSource` assembles fixed-size frames on
/// the reading thread.
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Try to find a supported input config covering the engine sample rate
fn find_config_with_sample_rate(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig, CaptureError> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("input configs unavailable: {}", e)))?;

    let mut saw_any = false;
    for range in configs {
        saw_any = true;
        if range.channels() == 0 {
            continue;
        }
        let min_rate = range.min_sample_rate().0;
        let max_rate = range.max_sample_rate().0;
        if min_rate <= target_rate && target_rate <= max_rate {
            return Ok(range.with_sample_rate(SampleRate(target_rate)));
        }
    }

    if !saw_any {
        return Err(CaptureError::DeviceUnavailable(
            "device reports no input configurations".to_string(),
        ));
    }
    Err(CaptureError::DeviceUnavailable(format!(
        "no input config supports {} Hz",
        target_rate
    )))
}

/// State moved into the audio callback
struct CallbackState {
    producer: RingProducer,
    channels: usize,
    overflow_warned: bool,
}

impl CallbackState {
    /// Push the first channel of an interleaved i16 chunk into the ring
    fn push_mono(&mut self, samples: &[i16]) {
        // Scratch reused across calls would need allocation anyway for
        // the downmix; chunk sizes are small (a few ms of audio).
        let mono: Vec<i16> = samples.iter().step_by(self.channels).copied().collect();
        let pushed = self.producer.push_slice(&mono);
        if pushed < mono.len() && !self.overflow_warned {
            self.overflow_warned = true;
            warn!("[capture] Ring buffer overflow, dropping samples (consumer stalled)");
        }
    }
}

impl CaptureBackend for CpalBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable("no default input device".to_string())
        })?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());

        let supported = find_config_with_sample_rate(&device, SAMPLE_RATE)?;
        let channels = supported.channels() as usize;
        if channels == 0 {
            return Err(CaptureError::DeviceUnavailable(
                "device reports zero input channels".to_string(),
            ));
        }
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        debug!(
            "[capture] Opening '{}' at {} Hz, {} channel(s), {:?}",
            device_name, SAMPLE_RATE, channels, sample_format
        );

        let ring = HeapRb::<i16>::new(CAPTURE_RING_SAMPLES);
        let (producer, consumer) = ring.split();
        let mut state = CallbackState {
            producer,
            channels,
            overflow_warned: false,
        };

        let (error_tx, error_rx): (Sender<String>, Receiver<String>) = mpsc::channel();
        let err_tx = error_tx.clone();
        let err_fn = move |e: cpal::StreamError| {
            let _ = err_tx.send(e.to_string());
        };

        let stream = match sample_format {
            cpal::SampleFormat::I16 => device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _| state.push_mono(data),
                    err_fn,
                    None,
                )
                .map_err(|e| CaptureError::Stream(e.to_string()))?,
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        let converted: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        state.push_mono(&converted);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CaptureError::Stream(e.to_string()))?,
            cpal::SampleFormat::U16 => device
                .build_input_stream(
                    &config,
                    move |data: &[u16], _| {
                        let converted: Vec<i16> =
                            data.iter().map(|&s| (s as i32 - 32768) as i16).collect();
                        state.push_mono(&converted);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CaptureError::Stream(e.to_string()))?,
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        Ok(Box::new(CpalFrameSource {
            _stream: stream,
            consumer,
            pending: Vec::with_capacity(FRAME_SIZE * 2),
            error_rx,
        }))
    }
}

/// Frame assembly over a live cpal stream
///
/// Reads stay on the opening thread; the stream is closed when the
/// source is dropped.
struct CpalFrameSource {
    _stream: cpal::Stream,
    consumer: RingConsumer,
    pending: Vec<i16>,
    error_rx: Receiver<String>,
}

impl FrameSource for CpalFrameSource {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, CaptureError> {
        let deadline = Instant::now() + timeout;
        let mut scratch = [0i16; FRAME_SIZE];

        loop {
            if let Ok(msg) = self.error_rx.try_recv() {
                return Err(CaptureError::Stream(msg));
            }

            let popped = self.consumer.pop_slice(&mut scratch);
            if popped > 0 {
                self.pending.extend_from_slice(&scratch[..popped]);
            }

            if self.pending.len() >= FRAME_SIZE {
                let samples: Vec<i16> = self.pending.drain(..FRAME_SIZE).collect();
                return Ok(Some(AudioFrame::new(samples)));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(FRAME_POLL_INTERVAL_MS));
        }
    }
}
