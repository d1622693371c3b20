//! # Solfège Trainer GUI
//!
//! Desktop front end for the ear-training exercise: a staff showing the
//! target melody, three action buttons (connect microphone, play sequence,
//! start matching) and a single feedback line.
//!
//! ## Architecture
//! - **Main thread**: Iced application; all matcher state lives here
//! - **Worker threads**: capture/analysis and playback, owned by
//!   trainer-core handles and communicated with over channels
//! - **Polling**: one 200 ms timer subscription drives both the matcher
//!   samples and the playback-finished check; it only runs while there is
//!   something to poll, so restarting can never stack timers

mod ui;

use iced::{self, Element, Subscription, Theme};
use trainer_core::matcher::{Feedback, MatchSession, Phase};
use trainer_core::playback::{self, PlaybackHandle};
use trainer_core::sampler::PitchSampler;
use trainer_core::sequence::TargetSequence;
use ui::main_display::create_main_view;

/// Picks the practice melody for this run.
///
/// An optional command-line argument names a JSON sequence file (the format
/// written by `TargetSequence::save_to_file`); anything else falls back to
/// the built-in melody.
fn startup_sequence() -> TargetSequence {
    let Some(path) = std::env::args().nth(1) else {
        return TargetSequence::default_melody();
    };
    match TargetSequence::load_from_file(&path) {
        Ok(seq) if !seq.is_empty() => {
            eprintln!("[MAIN] Loaded practice melody from {path}");
            seq
        }
        Ok(_) => {
            eprintln!("[MAIN] {path} holds an empty melody; using the built-in one");
            TargetSequence::default_melody()
        }
        Err(e) => {
            eprintln!("[MAIN] Could not load {path}: {e:#}; using the built-in melody");
            TargetSequence::default_melody()
        }
    }
}

/// Main entry point for the trainer application.
pub fn main() -> iced::Result {
    eprintln!("[MAIN] Starting Solfège Trainer...");
    let result = iced::application("Solfège Trainer", TrainerApp::update, TrainerApp::view)
        .subscription(TrainerApp::subscription)
        .theme(TrainerApp::theme)
        .run();
    eprintln!("[MAIN] Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    /// "Connect microphone" was pressed
    ConnectMic,
    /// "Play sequence" was pressed
    PlaySequence,
    /// "Start matching" was pressed
    StartMatching,
    /// Poll timer fired: feed the matcher, check playback
    Tick,
}

/// Visual state of the feedback line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTone {
    Neutral,
    Correct,
    Incorrect,
}

/// Derived enable/disable state for the three user actions.
///
/// This is a pure projection of the session phase plus the sampler and
/// playback flags; the buttons never carry authoritative state of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub connect_enabled: bool,
    pub play_enabled: bool,
    pub match_enabled: bool,
}

/// Computes which actions are currently allowed.
///
/// Playback and matching are mutually exclusive; matching additionally
/// requires a connected microphone; connecting is a one-shot that stays
/// available until it succeeds.
pub fn project_controls(mic_connected: bool, playback_active: bool, phase: Phase) -> Controls {
    let awaiting = matches!(phase, Phase::Awaiting(_));
    Controls {
        connect_enabled: !mic_connected,
        play_enabled: !playback_active && !awaiting,
        match_enabled: mic_connected && !playback_active && !awaiting,
    }
}

/// Main application state.
pub struct TrainerApp {
    /// The melody being practiced; fixed for the lifetime of the app run.
    sequence: TargetSequence,
    /// The matching state machine. Owns position and phase.
    session: MatchSession,
    /// Connected microphone pitch source, once the user granted it.
    sampler: Option<PitchSampler>,
    /// Running reference playback, while any.
    playback: Option<PlaybackHandle>,
    /// Feedback line contents.
    feedback: String,
    feedback_tone: FeedbackTone,
}

impl Default for TrainerApp {
    fn default() -> Self {
        let sequence = startup_sequence();
        let session = MatchSession::new(sequence.clone());
        Self {
            sequence,
            session,
            sampler: None,
            playback: None,
            feedback: "Connect the microphone to get started.".to_string(),
            feedback_tone: FeedbackTone::Neutral,
        }
    }
}

impl TrainerApp {
    pub fn sequence(&self) -> &TargetSequence {
        &self.sequence
    }

    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    pub fn feedback(&self) -> (&str, FeedbackTone) {
        (&self.feedback, self.feedback_tone)
    }

    pub fn controls(&self) -> Controls {
        project_controls(
            self.sampler.is_some(),
            self.playback.is_some(),
            self.session.phase(),
        )
    }

    fn set_feedback(&mut self, message: impl Into<String>, tone: FeedbackTone) {
        self.feedback = message.into();
        self.feedback_tone = tone;
    }

    fn update(&mut self, message: Message) {
        match message {
            Message::ConnectMic => {
                if self.sampler.is_some() {
                    return;
                }
                match PitchSampler::connect() {
                    Ok(sampler) => {
                        self.sampler = Some(sampler);
                        self.set_feedback(
                            "🎤 Microphone connected. Play the sequence or start matching.",
                            FeedbackTone::Neutral,
                        );
                    }
                    Err(e) => {
                        eprintln!("[MAIN] Microphone connection failed: {e:#}");
                        self.set_feedback(
                            format!("❌ Could not open the microphone: {e}"),
                            FeedbackTone::Incorrect,
                        );
                    }
                }
            }
            Message::PlaySequence => {
                if !self.controls().play_enabled {
                    return;
                }
                match playback::play(&self.sequence) {
                    Ok(handle) => {
                        self.playback = Some(handle);
                        self.set_feedback("Playing the sequence...", FeedbackTone::Neutral);
                    }
                    Err(e) => {
                        eprintln!("[MAIN] Playback failed to start: {e:#}");
                        self.set_feedback(
                            format!("❌ Could not start playback: {e}"),
                            FeedbackTone::Incorrect,
                        );
                    }
                }
            }
            Message::StartMatching => {
                if !self.controls().match_enabled {
                    return;
                }
                self.session.start();
                match self.session.expected() {
                    Some(first) => self.set_feedback(
                        format!("Start singing! First note: {first}"),
                        FeedbackTone::Neutral,
                    ),
                    // Empty sequence: completed on the spot.
                    None => self.set_feedback(
                        "✅ Sequence complete! Excellent work.",
                        FeedbackTone::Correct,
                    ),
                }
            }
            Message::Tick => {
                self.poll_playback();
                self.poll_matcher();
            }
        }
    }

    /// Checks whether a running playback has finished.
    fn poll_playback(&mut self) {
        let finished = self.playback.as_ref().is_some_and(|p| p.is_finished());
        if finished {
            self.playback = None;
            self.set_feedback(
                "Ready to start matching. Sing the sequence!",
                FeedbackTone::Neutral,
            );
        }
    }

    /// Pulls one pitch reading and feeds it to the session.
    ///
    /// A failed read is a skipped tick: logged, nothing else changes.
    fn poll_matcher(&mut self) {
        if !self.session.is_awaiting() {
            return;
        }
        let Some(sampler) = &self.sampler else {
            return;
        };
        let reading = match sampler.latest() {
            Ok(reading) => reading,
            Err(e) => {
                eprintln!("[MAIN] Pitch read failed, skipping tick: {e}");
                return;
            }
        };
        if let Some(event) = self.session.on_sample(reading.into()) {
            self.apply_feedback(event);
        }
    }

    /// Maps a matcher feedback event onto the feedback line.
    fn apply_feedback(&mut self, event: Feedback) {
        match event {
            Feedback::Waiting { expected } => self.set_feedback(
                format!("🔇 Target: {expected}. Waiting for your voice..."),
                FeedbackTone::Neutral,
            ),
            Feedback::Correct { next, .. } => self.set_feedback(
                format!("✅ Correct. Next: {next}"),
                FeedbackTone::Correct,
            ),
            Feedback::Incorrect { expected, detected } => {
                let detected = detected
                    .map(|n| n.label())
                    .unwrap_or_else(|| "no pitch".to_string());
                self.set_feedback(
                    format!("❌ Target: {expected}. Detected: {detected}. Try again."),
                    FeedbackTone::Incorrect,
                );
            }
            Feedback::Completed { .. } => self.set_feedback(
                "✅ Sequence complete! Excellent work.",
                FeedbackTone::Correct,
            ),
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(self)
    }

    /// One timer drives everything that needs polling. When nothing does,
    /// there is no timer at all.
    fn subscription(&self) -> Subscription<Message> {
        if self.playback.is_some() || self.session.is_awaiting() {
            iced::time::every(trainer_core::matcher::POLL_INTERVAL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_follow_phase_and_resources() {
        // Nothing connected: only the microphone action is available
        // for matching purposes; playback is allowed.
        let c = project_controls(false, false, Phase::Idle);
        assert!(c.connect_enabled && c.play_enabled && !c.match_enabled);

        // Microphone connected, idle: everything available except reconnect.
        let c = project_controls(true, false, Phase::Idle);
        assert!(!c.connect_enabled && c.play_enabled && c.match_enabled);

        // Playback running: matching and replay blocked.
        let c = project_controls(true, true, Phase::Idle);
        assert!(!c.play_enabled && !c.match_enabled);

        // Matching running: playback and rematch blocked.
        let c = project_controls(true, false, Phase::Awaiting(3));
        assert!(!c.play_enabled && !c.match_enabled);

        // Completed: back to both available.
        let c = project_controls(true, false, Phase::Completed);
        assert!(c.play_enabled && c.match_enabled);
    }
}
