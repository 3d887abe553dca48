//! Real microphone capture via cpal.
//!
//! Opens the configured input device with its preferred stream config and
//! converts to mono at the target rate inside the callback, so the buffer
//! always holds samples Whisper can consume directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use typewisp_core::config::AudioConfig;
use typewisp_core::error::{Result, TypewispError};

use crate::convert::{downmix_to_mono, resample_linear};
use crate::{AudioBuffer, AudioInput, InputStream};

/// Wrapper to move a `cpal::Stream` into a `Box<dyn InputStream>`.
///
/// `cpal::Stream` carries a `!Send` marker on some hosts.
struct SendStream(cpal::Stream);

// SAFETY: the stream handle is only ever paused and dropped from the thread
// that owns the CaptureHandle. Sample delivery runs on cpal's own audio
// thread and touches only the shared AudioBuffer, never the handle.
unsafe impl Send for SendStream {}

struct CpalStream {
    stream: Option<SendStream>,
    active: Arc<AtomicBool>,
}

impl InputStream for CpalStream {
    fn close(&mut self) {
        self.active.store(false, Ordering::Relaxed);
        if let Some(SendStream(stream)) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!(error = %e, "Failed to pause input stream before drop");
            }
        }
    }
}

/// Microphone input backed by the default cpal host.
#[derive(Debug, Clone)]
pub struct CpalInput {
    config: AudioConfig,
}

impl CpalInput {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    fn select_device(&self, host: &cpal::Host) -> Result<cpal::Device> {
        let Some(wanted) = self.config.device.as_deref() else {
            return host
                .default_input_device()
                .ok_or_else(|| TypewispError::Capture("No default input device found".into()));
        };

        let devices: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| TypewispError::Capture(format!("Failed to enumerate devices: {e}")))?
            .collect();

        // A bare number selects by index, anything else by name substring.
        if let Ok(index) = wanted.trim().parse::<usize>() {
            return devices.into_iter().nth(index).ok_or_else(|| {
                TypewispError::Capture(format!("Audio device index {index} out of range"))
            });
        }

        let wanted_lower = wanted.to_lowercase();
        devices
            .into_iter()
            .find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&wanted_lower))
                    .unwrap_or(false)
            })
            .ok_or_else(|| TypewispError::Capture(format!("Audio device '{wanted}' not found")))
    }
}

impl AudioInput for CpalInput {
    fn name(&self) -> String {
        self.config
            .device
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn open(&self, buffer: AudioBuffer) -> Result<Box<dyn InputStream>> {
        let host = cpal::default_host();
        let device = self.select_device(&host)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        // Many devices reject arbitrary rates, so record at the device's own
        // config and convert in the callback.
        let stream_config = match device.default_input_config() {
            Ok(supported) => cpal::StreamConfig {
                channels: supported.channels(),
                sample_rate: supported.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            Err(e) => {
                debug!(error = %e, "Could not query default config, using configured format");
                cpal::StreamConfig {
                    channels: self.config.channels,
                    sample_rate: cpal::SampleRate(self.config.sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                }
            }
        };

        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;
        let target_rate = self.config.sample_rate;
        let needs_conversion = device_rate != target_rate || device_channels != 1;

        let active = Arc::new(AtomicBool::new(true));
        let callback_active = Arc::clone(&active);
        let error_active = Arc::clone(&active);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !callback_active.load(Ordering::Relaxed) {
                        return;
                    }
                    if !needs_conversion {
                        buffer.push(data);
                        return;
                    }
                    let mono = downmix_to_mono(data, device_channels);
                    buffer.push(&resample_linear(&mono, device_rate, target_rate));
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_active.store(false, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| TypewispError::Capture(format!("Failed to build audio stream: {e}")))?;

        stream
            .play()
            .map_err(|e| TypewispError::Capture(format!("Failed to start audio stream: {e}")))?;

        info!(
            device = %device_name,
            device_rate,
            device_channels,
            target_rate,
            "Microphone stream opened"
        );

        Ok(Box::new(CpalStream {
            stream: Some(SendStream(stream)),
            active,
        }))
    }
}

/// Enumerate input devices as `(index, name)` pairs.
///
/// The index is what `[audio] device` accepts as a numeric selector.
pub fn list_devices() -> Result<Vec<(usize, String)>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| TypewispError::Capture(format!("Failed to enumerate devices: {e}")))?;
    Ok(devices
        .enumerate()
        .map(|(i, d)| (i, d.name().unwrap_or_else(|_| "unknown".to_string())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_falls_back_to_default() {
        let input = CpalInput::new(AudioConfig::default());
        assert_eq!(input.name(), "default");
        assert_eq!(input.sample_rate(), 16000);

        let named = CpalInput::new(AudioConfig {
            device: Some("USB".into()),
            ..AudioConfig::default()
        });
        assert_eq!(named.name(), "USB");
    }
}
