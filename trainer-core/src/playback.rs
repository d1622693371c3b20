//! # Sequence Playback Module
//!
//! Synthesized reference playback of a target sequence: one sine tone per
//! note at a fixed duration with a short gap between notes, rendered on a
//! CPAL output stream. Short linear attack and release ramps keep note
//! boundaries click-free.
//!
//! Playback runs on its own worker thread (the stream handle stays where it
//! was created) and reports completion exactly once through the returned
//! handle.

use std::f32::consts::TAU;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio;
use crate::sequence::TargetSequence;

/// Sounding length of each note.
pub const NOTE_DURATION: Duration = Duration::from_millis(400);

/// Silent gap between consecutive notes.
pub const NOTE_GAP: Duration = Duration::from_millis(100);

/// Attack/release ramp length in seconds.
const RAMP_SECONDS: f32 = 0.01;

/// Output level of the synthesized tones.
const AMPLITUDE: f32 = 0.2;

/// A running playback of one sequence.
///
/// Dropping the handle cancels playback and releases the output stream.
#[derive(Debug)]
pub struct PlaybackHandle {
    done_rx: Receiver<()>,
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
    total: Duration,
}

impl PlaybackHandle {
    /// True once the whole sequence has been rendered. Reports completion
    /// at most once; callers drop the handle after seeing it.
    pub fn is_finished(&self) -> bool {
        self.done_rx.try_recv().is_ok()
    }

    /// Total wall-clock length of the scheduled sequence.
    pub fn duration(&self) -> Duration {
        self.total
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Starts playing `sequence` on the default output device.
///
/// Returns once the stream is confirmed playing, so a handle in hand means
/// audio is actually running. Errors (no device, no f32 output config,
/// stream failure) are reported here and nothing keeps running.
pub fn play(sequence: &TargetSequence) -> Result<PlaybackHandle> {
    let frequencies: Vec<f32> = sequence.notes().iter().map(|n| n.frequency()).collect();
    let slot = NOTE_DURATION + NOTE_GAP;
    let total = slot * frequencies.len() as u32;

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let (status_tx, status_rx) = crossbeam_channel::bounded(1);

    let worker =
        thread::spawn(move || run_worker(frequencies, done_tx, shutdown_rx, status_tx));

    match status_rx.recv() {
        Ok(Ok(())) => {
            eprintln!("[PLAYBACK] Sequence started ({:.1}s)", total.as_secs_f32());
            Ok(PlaybackHandle {
                done_rx,
                shutdown_tx,
                worker: Some(worker),
                total,
            })
        }
        Ok(Err(e)) => {
            let _ = worker.join();
            Err(e)
        }
        Err(_) => {
            let _ = worker.join();
            Err(anyhow!("playback worker exited before reporting status"))
        }
    }
}

/// Worker body: owns the output stream for the lifetime of the playback.
fn run_worker(
    frequencies: Vec<f32>,
    done_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
    status_tx: Sender<Result<()>>,
) {
    let (finished_tx, finished_rx) = crossbeam_channel::bounded::<()>(1);

    let stream = match open_output_stream(frequencies, done_tx, finished_tx) {
        Ok(stream) => {
            let _ = status_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = status_tx.send(Err(e));
            return;
        }
    };

    // Hold the stream until the schedule runs out or the handle is dropped.
    crossbeam_channel::select! {
        recv(finished_rx) -> _ => {}
        recv(shutdown_rx) -> _ => {}
    }

    if let Err(e) = stream.pause() {
        eprintln!("[PLAYBACK] Error pausing stream: {e}");
    }
    drop(stream);
}

/// Builds and starts the output stream rendering the note schedule.
fn open_output_stream(
    frequencies: Vec<f32>,
    done_tx: Sender<()>,
    finished_tx: Sender<()>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no audio output device available"))?;

    eprintln!("[PLAYBACK] Using output device: {}", device.name()?);

    let ranges = device.supported_output_configs()?.collect::<Vec<_>>();
    let range = audio::pick_f32_config(ranges)
        .ok_or_else(|| anyhow!("output device offers no f32 configuration"))?;
    let rate = audio::TARGET_SAMPLE_RATE.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    let config: cpal::StreamConfig = range.with_sample_rate(cpal::SampleRate(rate)).into();
    let channels = config.channels as usize;

    let rate_f = rate as f32;
    let slot_samples = ((NOTE_DURATION + NOTE_GAP).as_secs_f32() * rate_f) as usize;
    let note_samples = (NOTE_DURATION.as_secs_f32() * rate_f) as usize;
    let ramp_samples = ((RAMP_SECONDS * rate_f) as usize).max(1);
    let total_samples = slot_samples * frequencies.len();

    let mut clock: usize = 0;
    let mut done_sent = false;

    let err_fn = |err| eprintln!("[PLAYBACK] Stream error: {err}");

    let stream = device.build_output_stream(
        &config,
        move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in out.chunks_mut(channels) {
                let value = if clock < total_samples {
                    let slot = clock / slot_samples;
                    let offset = clock % slot_samples;
                    if offset < note_samples {
                        let t = offset as f32 / rate_f;
                        let env = ramp(offset, note_samples, ramp_samples);
                        AMPLITUDE * env * (TAU * frequencies[slot] * t).sin()
                    } else {
                        0.0 // inter-note gap
                    }
                } else {
                    if !done_sent {
                        done_sent = true;
                        let _ = done_tx.try_send(());
                        let _ = finished_tx.try_send(());
                    }
                    0.0
                };
                for sample in frame.iter_mut() {
                    *sample = value;
                }
                clock += 1;
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

/// Linear attack/release envelope over one note.
fn ramp(offset: usize, note_samples: usize, ramp_samples: usize) -> f32 {
    let attack = offset as f32 / ramp_samples as f32;
    let release = (note_samples - offset) as f32 / ramp_samples as f32;
    attack.min(release).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_rises_holds_and_falls() {
        let note = 1000;
        let ramp_len = 100;
        assert_eq!(ramp(0, note, ramp_len), 0.0);
        assert_eq!(ramp(50, note, ramp_len), 0.5);
        assert_eq!(ramp(500, note, ramp_len), 1.0);
        assert!((ramp(950, note, ramp_len) - 0.5).abs() < 1e-6);
        assert!(ramp(999, note, ramp_len) < 0.011);
    }
}
