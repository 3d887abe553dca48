//! Humanized keystroke emission.
//!
//! A [`TypingEmulator`] types one [`TypingJob`] character by character
//! through the input capability. The delay after each character is the base
//! delay for the configured words-per-minute, scaled by a random jitter
//! factor, with longer pauses after punctuation and an occasional hesitation.
//! Cancellation is checked before every character and interrupts the sleep
//! between characters.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use typewisp_core::config::TypingConfig;
use typewisp_core::error::{InjectionError, Result, TypewispError};
use typewisp_core::types::WindowId;

use crate::capability::InputCapability;
use crate::events::{DictationEvent, EventSender};

/// Characters per word when converting words-per-minute to a keystroke rate.
pub const AVG_CHARS_PER_WORD: f64 = 5.0;

const PUNCTUATION: [char; 6] = ['.', ',', '!', '?', ';', ':'];

// =============================================================================
// Profile
// =============================================================================

/// Validated typing cadence parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TypingProfile {
    pub wpm: f64,
    pub jitter: (f64, f64),
    pub punctuation_pause: (f64, f64),
    /// `None` disables hesitations.
    pub hesitation_every: Option<(u32, u32)>,
    pub hesitation_factor: f64,
}

impl TypingProfile {
    /// Validate the `[typing]` config section.
    ///
    /// The punctuation pause must start above the jitter range so a pause
    /// after punctuation is always longer than any ordinary keystroke gap.
    pub fn from_config(config: &TypingConfig) -> Result<Self> {
        let invalid = |msg: String| Err(TypewispError::Config(format!("[typing] {msg}")));

        if !config.wpm.is_finite() || config.wpm <= 0.0 {
            return invalid(format!("wpm must be positive, got {}", config.wpm));
        }
        let bounds = [
            ("jitter_min", config.jitter_min),
            ("jitter_max", config.jitter_max),
            ("punctuation_pause_min", config.punctuation_pause_min),
            ("punctuation_pause_max", config.punctuation_pause_max),
            ("hesitation_factor", config.hesitation_factor),
        ];
        if let Some((name, value)) = bounds.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{name} must be a finite number, got {value}"));
        }
        if config.jitter_min <= 0.0 || config.jitter_min > config.jitter_max {
            return invalid(format!(
                "jitter range {}..{} is invalid",
                config.jitter_min, config.jitter_max
            ));
        }
        if config.punctuation_pause_min > config.punctuation_pause_max {
            return invalid(format!(
                "punctuation pause range {}..{} is inverted",
                config.punctuation_pause_min, config.punctuation_pause_max
            ));
        }
        if config.punctuation_pause_min <= config.jitter_max {
            return invalid(format!(
                "punctuation_pause_min ({}) must exceed jitter_max ({})",
                config.punctuation_pause_min, config.jitter_max
            ));
        }
        if config.hesitation_factor < 0.0 {
            return invalid("hesitation_factor must not be negative".into());
        }

        let hesitation_every = match (config.hesitation_every_min, config.hesitation_every_max) {
            (0, _) => None,
            (min, max) if min <= max => Some((min, max)),
            (min, max) => {
                return invalid(format!("hesitation range {min}..{max} is inverted"));
            }
        };

        Ok(Self {
            wpm: config.wpm,
            jitter: (config.jitter_min, config.jitter_max),
            punctuation_pause: (config.punctuation_pause_min, config.punctuation_pause_max),
            hesitation_every,
            hesitation_factor: config.hesitation_factor,
        })
    }

    /// Seconds between keystrokes before jitter: `60 / (wpm * 5)`.
    pub fn base_delay_secs(&self) -> f64 {
        60.0 / (self.wpm * AVG_CHARS_PER_WORD)
    }
}

/// Per-job delay generator.
pub struct Cadence {
    profile: TypingProfile,
    rng: StdRng,
    until_hesitation: Option<u32>,
}

impl Cadence {
    pub fn new(profile: TypingProfile, mut rng: StdRng) -> Self {
        let until_hesitation = profile
            .hesitation_every
            .map(|(min, max)| rng.gen_range(min..=max));
        Self {
            profile,
            rng,
            until_hesitation,
        }
    }

    pub fn seeded(profile: TypingProfile, seed: u64) -> Self {
        Self::new(profile, StdRng::seed_from_u64(seed))
    }

    /// Delay to wait after typing `ch`.
    pub fn delay_after(&mut self, ch: char) -> Duration {
        let base = self.profile.base_delay_secs();
        let (jmin, jmax) = self.profile.jitter;
        let mut secs = base * self.rng.gen_range(jmin..=jmax);

        if PUNCTUATION.contains(&ch) {
            let (pmin, pmax) = self.profile.punctuation_pause;
            secs += base * self.rng.gen_range(pmin..=pmax);
        }

        if let Some(remaining) = self.until_hesitation.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                secs += base * self.profile.hesitation_factor;
                if let Some((min, max)) = self.profile.hesitation_every {
                    *remaining = self.rng.gen_range(min..=max);
                }
            }
        }

        Duration::from_secs_f64(secs)
    }
}

// =============================================================================
// Jobs and reports
// =============================================================================

/// An in-progress emission of a transcript.
#[derive(Debug, Clone)]
pub struct TypingJob {
    pub id: Uuid,
    text: Vec<char>,
    cursor: usize,
    /// Window the text is meant for. When set, typing stops as soon as
    /// another window has focus.
    pub target_window: Option<WindowId>,
}

impl TypingJob {
    pub fn new(text: &str, target_window: Option<WindowId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.chars().collect(),
            cursor: 0,
            target_window,
        }
    }

    /// Index of the next character to emit.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.text.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingOutcome {
    Completed,
    Cancelled,
    FocusLost,
}

/// What happened to a typing job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingReport {
    pub job_id: Uuid,
    /// Characters typed as-is.
    pub emitted: usize,
    /// Characters typed through an ASCII substitute.
    pub translated: usize,
    /// Characters dropped because the backend could not type them.
    pub skipped: usize,
    /// Characters consumed from the job; the rest were never attempted.
    pub cursor: usize,
    pub outcome: TypingOutcome,
}

/// Best-effort ASCII stand-ins for characters keyboards often lack.
pub fn ascii_substitute(ch: char) -> Option<&'static str> {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => Some("'"),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => Some("\""),
        '\u{2013}' | '\u{2212}' => Some("-"),
        '\u{2014}' => Some("--"),
        '\u{2026}' => Some("..."),
        '\u{00A0}' | '\u{2009}' | '\u{202F}' => Some(" "),
        '\u{00AB}' | '\u{00BB}' => Some("\""),
        _ => None,
    }
}

// =============================================================================
// Emulator
// =============================================================================

pub struct TypingEmulator {
    input: Arc<dyn InputCapability>,
    profile: TypingProfile,
    seed: Option<u64>,
}

enum Keystroke {
    Emitted,
    Translated,
    Skipped,
    FocusLost,
}

impl TypingEmulator {
    pub fn new(input: Arc<dyn InputCapability>, profile: TypingProfile) -> Self {
        Self {
            input,
            profile,
            seed: None,
        }
    }

    /// Use a fixed RNG seed so delays are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Type the job until it completes, is cancelled, or loses focus.
    pub async fn emit(&self, mut job: TypingJob, cancel: CancellationToken) -> TypingReport {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut cadence = Cadence::new(self.profile.clone(), rng);
        let mut report = TypingReport {
            job_id: job.id,
            emitted: 0,
            translated: 0,
            skipped: 0,
            cursor: 0,
            outcome: TypingOutcome::Completed,
        };

        tracing::debug!(job_id = %job.id, chars = job.len(), "Typing job started");

        while !job.is_finished() {
            if cancel.is_cancelled() {
                report.outcome = TypingOutcome::Cancelled;
                break;
            }
            if self.focus_lost(&job) {
                report.outcome = TypingOutcome::FocusLost;
                break;
            }

            let ch = job.text[job.cursor];
            match self.type_char(ch) {
                Keystroke::Emitted => report.emitted += 1,
                Keystroke::Translated => report.translated += 1,
                Keystroke::Skipped => report.skipped += 1,
                Keystroke::FocusLost => {
                    report.outcome = TypingOutcome::FocusLost;
                    break;
                }
            }
            job.cursor += 1;

            if job.is_finished() {
                break;
            }
            let delay = cadence.delay_after(ch);
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }

        report.cursor = job.cursor;
        tracing::info!(
            job_id = %job.id,
            emitted = report.emitted,
            translated = report.translated,
            skipped = report.skipped,
            remaining = job.len() - job.cursor,
            outcome = ?report.outcome,
            "Typing job finished"
        );
        report
    }

    /// Run the job on its own task and report `TypingFinished` when done.
    pub fn spawn(
        self,
        job: TypingJob,
        cancel: CancellationToken,
        events: EventSender,
    ) -> JoinHandle<()> {
        let job_id = job.id;
        tokio::spawn(async move {
            let work = tokio::spawn(async move { self.emit(job, cancel).await });
            // A panicked job is still reported.
            let report = match work.await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Typing task failed");
                    TypingReport {
                        job_id,
                        emitted: 0,
                        translated: 0,
                        skipped: 0,
                        cursor: 0,
                        outcome: TypingOutcome::Cancelled,
                    }
                }
            };
            if events.send(DictationEvent::TypingFinished(report)).await.is_err() {
                tracing::debug!("Orchestrator gone before typing finished");
            }
        })
    }

    fn focus_lost(&self, job: &TypingJob) -> bool {
        let Some(target) = job.target_window.as_ref() else {
            return false;
        };
        match self.input.foreground_window() {
            Some(current) if &current != target => {
                tracing::info!(target = %target, current = %current, "Focus left target window");
                true
            }
            _ => false,
        }
    }

    fn type_char(&self, ch: char) -> Keystroke {
        match self.input.inject_keystroke(ch) {
            Ok(()) => Keystroke::Emitted,
            Err(InjectionError::Unsupported(_)) => match ascii_substitute(ch) {
                // The whole substitute goes out before the next cancellation
                // check.
                Some(substitute) => {
                    let mut typed_any = false;
                    for sub in substitute.chars() {
                        match self.input.inject_keystroke(sub) {
                            Ok(()) => typed_any = true,
                            Err(InjectionError::FocusLost) => return Keystroke::FocusLost,
                            Err(e) => tracing::debug!(error = %e, "Substitute keystroke failed"),
                        }
                    }
                    if typed_any {
                        Keystroke::Translated
                    } else {
                        Keystroke::Skipped
                    }
                }
                None => {
                    tracing::debug!(ch = ?ch, "Skipping unsupported character");
                    Keystroke::Skipped
                }
            },
            Err(InjectionError::FocusLost) => Keystroke::FocusLost,
            Err(InjectionError::Backend(e)) => {
                tracing::warn!(ch = ?ch, error = %e, "Keystroke failed, skipping character");
                Keystroke::Skipped
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
