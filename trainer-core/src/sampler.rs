//! # Pitch Sampler Module
//!
//! The pull-style pitch query behind the matcher's polling loop. Connecting
//! spawns a worker thread that owns the capture stream, runs the pitch
//! estimator over every frame, and publishes readings on a channel; the
//! driver asks for the most recent reading once per poll tick.
//!
//! Connecting is explicit and fallible (microphone permission, missing
//! hardware) and is never retried automatically; that is the caller's user
//! to ask.

use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::Reading;
use crate::{audio, pitch};

/// Minimum frame RMS for the estimator to consider a frame audible.
const AMPLITUDE_THRESHOLD: f32 = 0.01;

/// A connected microphone pitch source.
///
/// Dropping the sampler shuts the worker down and releases the capture
/// stream.
#[derive(Debug)]
pub struct PitchSampler {
    readings_rx: Receiver<Reading>,
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl PitchSampler {
    /// Acquires the microphone and starts the analysis worker.
    ///
    /// Blocks briefly while the device opens so that acquisition failures
    /// are reported to the caller rather than logged in a thread nobody
    /// watches.
    pub fn connect() -> Result<Self> {
        let (readings_tx, readings_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (status_tx, status_rx) = crossbeam_channel::bounded(1);

        let worker = thread::spawn(move || run_worker(readings_tx, shutdown_rx, status_tx));

        match status_rx.recv() {
            Ok(Ok(())) => {
                eprintln!("[SAMPLER] Worker running");
                Ok(Self {
                    readings_rx,
                    shutdown_tx,
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(anyhow!("pitch worker exited before reporting status"))
            }
        }
    }

    /// Returns the most recent reading, draining anything older.
    ///
    /// An empty channel means no frame has finished analysis since the last
    /// poll; that is reported as [`Reading::Unvoiced`], not an error. A dead
    /// worker is an error the caller should log and treat as a skipped tick.
    pub fn latest(&self) -> Result<Reading> {
        let mut newest = None;
        loop {
            match self.readings_rx.try_recv() {
                Ok(reading) => newest = Some(reading),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(anyhow!("pitch worker stopped"));
                }
            }
        }
        Ok(newest.unwrap_or(Reading::Unvoiced))
    }
}

impl Drop for PitchSampler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        eprintln!("[SAMPLER] Disconnected");
    }
}

/// Worker body: owns the capture stream, turns frames into readings.
///
/// The stream is created inside the thread because CPAL stream handles are
/// not generally sendable across threads.
fn run_worker(
    readings_tx: Sender<Reading>,
    shutdown_rx: Receiver<()>,
    status_tx: Sender<Result<()>>,
) {
    let (frames_tx, frames_rx) = crossbeam_channel::unbounded::<Vec<f32>>();

    let (stream, sample_rate) = match audio::start_capture(frames_tx) {
        Ok(pair) => {
            let _ = status_tx.send(Ok(()));
            pair
        }
        Err(e) => {
            let _ = status_tx.send(Err(e));
            return;
        }
    };

    loop {
        crossbeam_channel::select! {
            recv(frames_rx) -> frame => match frame {
                Ok(frame) => {
                    let reading = analyze_frame(&frame, sample_rate);
                    if readings_tx.send(reading).is_err() {
                        // Receiver gone: the sampler was dropped without a
                        // shutdown signal reaching us first.
                        break;
                    }
                }
                Err(_) => {
                    eprintln!("[SAMPLER] Capture channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => break,
        }
    }

    if let Err(e) = stream.pause() {
        eprintln!("[SAMPLER] Error pausing stream: {e}");
    }
    drop(stream);
}

/// Runs the estimator over one frame and refines audible results against the
/// frame's spectrum.
fn analyze_frame(frame: &[f32], sample_rate: u32) -> Reading {
    match pitch::detect(frame, sample_rate, AMPLITUDE_THRESHOLD) {
        Some((rough_hz, _clarity)) => {
            let magnitudes = pitch::magnitude_spectrum(frame);
            let hz = pitch::refine(&magnitudes, rough_hz, sample_rate).unwrap_or(rough_hz);
            Reading::Voiced(hz)
        }
        None => Reading::Unvoiced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn analyze_frame_labels_tone_and_silence() {
        let sample_rate = 44_100;
        let tone: Vec<f32> = (0..audio::FRAME_SIZE)
            .map(|i| 0.4 * (TAU * 330.0 * i as f32 / sample_rate as f32).sin())
            .collect();

        match analyze_frame(&tone, sample_rate) {
            Reading::Voiced(hz) => assert!((hz - 330.0).abs() < 5.0, "got {hz}"),
            Reading::Unvoiced => panic!("tone frame classified as unvoiced"),
        }

        let silence = vec![0.0; audio::FRAME_SIZE];
        assert_eq!(analyze_frame(&silence, sample_rate), Reading::Unvoiced);
    }
}
