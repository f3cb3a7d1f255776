//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::resample::Resampler;
use crate::traits::{AudioError, AudioOutput};

/// CPAL output fed with mono samples through a lock-free ring.
///
/// The device callback converts to the device rate, duplicates each sample
/// to every output channel and plays silence on underrun.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    source_rate: u32,
    stream: Option<Stream>,
    producer: HeapProd<f32>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default device at `sample_rate`, or at the device's default
    /// rate with resampling when it can't run at `sample_rate`.
    pub fn new(sample_rate: u32) -> Result<(Self, HeapCons<f32>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let exact = device
            .supported_output_configs()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?
            .filter(|range| range.sample_format() == SampleFormat::F32)
            .find(|range| {
                range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
            });
        let config: StreamConfig = match exact {
            Some(range) => range.with_sample_rate(SampleRate(sample_rate)).into(),
            None => {
                let fallback = device
                    .default_output_config()
                    .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
                if fallback.sample_format() != SampleFormat::F32 {
                    return Err(AudioError::UnsupportedRate(sample_rate));
                }
                info!(
                    source_rate = sample_rate,
                    device_rate = fallback.sample_rate().0,
                    "resampling to device rate"
                );
                fallback.into()
            }
        };

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio device opened"
        );

        // About 100ms of audio
        let rb = HeapRb::<f32>::new((sample_rate as usize / 10).max(1));
        let (producer, consumer) = rb.split();

        let output = Self {
            device,
            config,
            source_rate: sample_rate,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
        };

        Ok((output, consumer))
    }

    /// Build and start the audio stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<f32>) -> Result<(), AudioError> {
        let running = self.running.clone();
        let channels = self.config.channels as usize;
        let mut resampler = Resampler::new(self.source_rate, self.config.sample_rate.0);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for frame in data.chunks_mut(channels) {
                        let sample =
                            resampler.next_sample(|| consumer.try_pop().unwrap_or(0.0));
                        frame.fill(sample);
                    }
                },
                |err| error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);

        Ok(())
    }

    /// Rate the device actually runs at.
    pub fn device_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Write a single sample, spinning until the ring buffer has room.
    pub fn write_spin(&mut self, sample: f32) {
        while self.producer.try_push(sample).is_err() {
            std::hint::spin_loop();
        }
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.source_rate
    }

    fn write(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.write_spin(sample);
        }
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
