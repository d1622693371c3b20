//! # Microphone Capture Module
//!
//! Real-time audio input via CPAL. Capture is the scoped resource behind the
//! pitch sampler: it is acquired once, on explicit user action, and held for
//! the session lifetime. Frames of a fixed size are shipped over a crossbeam
//! channel to the analysis worker; multi-channel devices are downmixed to
//! mono in the stream callback.

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Samples per analysis frame (~46 ms at 44.1 kHz).
///
/// Large enough for the pitch estimator to see a couple of periods of a low
/// singing voice, small enough to keep feedback latency under a poll tick.
pub const FRAME_SIZE: usize = 2048;

/// Sample rate capture and playback setup aim for.
pub(crate) const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Opens the default input device and starts streaming analysis frames.
///
/// Each frame sent on `sender` is exactly [`FRAME_SIZE`] mono samples.
/// Frames are dropped, not queued, when the receiver falls behind.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Live stream handle and its actual rate
/// * `Err(e)` - No device, no usable f32 config, or the stream failed
pub fn start_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device available"))?;

    eprintln!("[AUDIO] Using input device: {}", device.name()?);

    let ranges = device.supported_input_configs()?.collect::<Vec<_>>();
    let range = pick_f32_config(ranges)
        .ok_or_else(|| anyhow!("input device offers no f32 configuration"))?;

    // Clamp the target into the range the device actually supports.
    let rate = TARGET_SAMPLE_RATE.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    let config: cpal::StreamConfig = range.with_sample_rate(cpal::SampleRate(rate)).into();
    let channels = config.channels as usize;

    eprintln!("[AUDIO] Capturing at {rate} Hz, {channels} channel(s)");

    let err_fn = |err| eprintln!("[AUDIO] Stream error: {err}");

    // Accumulates downmixed samples until a full frame is available.
    let mut pending: Vec<f32> = Vec::with_capacity(FRAME_SIZE * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels <= 1 {
                pending.extend_from_slice(data);
            } else {
                // Average interleaved channels down to mono.
                pending.extend(
                    data.chunks_exact(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }

            while pending.len() >= FRAME_SIZE {
                let frame: Vec<f32> = pending.drain(..FRAME_SIZE).collect();
                // A full channel just means analysis is behind; drop the frame.
                let _ = sender.try_send(frame);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, rate))
}

/// Picks the f32 configuration whose supported rate range sits closest to
/// the target rate. Fewer channels win ties, so capture can skip the
/// downmix where possible. Shared with playback's output selection.
pub(crate) fn pick_f32_config(
    ranges: Vec<SupportedStreamConfigRange>,
) -> Option<SupportedStreamConfigRange> {
    ranges
        .into_iter()
        .filter(|r| r.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|r| {
            let below = r.min_sample_rate().0.saturating_sub(TARGET_SAMPLE_RATE);
            let above = TARGET_SAMPLE_RATE.saturating_sub(r.max_sample_rate().0);
            let distance = below.max(above);
            (distance, r.channels())
        })
}
