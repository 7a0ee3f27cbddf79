//! Test controller
//!
//! Owns the tone engine, the calibration flow, the threshold engine and all
//! pacing state, and processes commands from the frontend through a single
//! crossbeam channel. Delayed follow-ups go through one [`Scheduler`]; what a
//! timer does is decided from the controller's state when it fires.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use earcheck::audio::{
    open_default_output, Ear, LevelMapper, OutputFactory, PulseRequest, ToneEngine, ToneEvent,
};
use earcheck::error::TestError;
use earcheck::procedure::{
    CalibrationBaseline, CalibrationFlow, CatchPlan, Presentation, ResponseOutcome, TestOutcome,
    ThresholdEngine, ToneAction,
};
use earcheck::report::Report;

use crate::config::controller::{COMMAND_CAPACITY, POLL_MS};
use crate::config::messages;
use crate::data::{unix_timestamp, ProgressStore, SavedProgress, Settings};
use crate::error::{AppError, Result};

use super::hooks::{Hooks, Milestone, Notification};
use super::scheduler::{Scheduler, Timer};
use super::state::{CalibrationView, ResumeOffer, Stage, TestCommand, TestSnapshot};

/// What happens when the post-answer pause ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterTransition {
    /// Same stimulus, next presentation plays straight away
    PresentAgain,
    /// New stimulus, wait for the user to press play
    AwaitPlay,
    /// Last stimulus done
    Finish,
}

/// Everything the controller needs from its host
pub struct ControllerOptions {
    pub settings: Settings,
    /// `None` disables checkpointing
    pub store: Option<ProgressStore>,
    pub output: OutputFactory,
    pub hooks: Hooks,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            store: None,
            output: open_default_output,
            hooks: Hooks::default(),
        }
    }
}

pub struct TestController {
    cmd_rx: Receiver<TestCommand>,
    shared_state: Arc<Mutex<TestSnapshot>>,
    settings: Settings,
    mapper: LevelMapper,
    store: Option<ProgressStore>,
    hooks: Hooks,
    tone: ToneEngine,
    scheduler: Scheduler<Timer>,

    stage: Stage,
    calibration: CalibrationFlow,
    baseline: CalibrationBaseline,
    engine: Option<ThresholdEngine>,
    saved: Option<SavedProgress>,

    countdown: Option<u8>,
    transition: Option<AfterTransition>,
    /// Id of the presentation currently sounding
    pending_tone: Option<u64>,
    next_tone_id: u64,
    audio_available: bool,

    warning: Option<String>,
    milestone: Option<String>,
    inactivity_nudge: bool,
    outcome: Option<TestOutcome>,
    report: Option<Report>,
    last_error: Option<String>,
}

impl TestController {
    pub fn new(
        cmd_rx: Receiver<TestCommand>,
        shared_state: Arc<Mutex<TestSnapshot>>,
        options: ControllerOptions,
    ) -> Result<Self> {
        let ControllerOptions {
            settings,
            store,
            output,
            hooks,
        } = options;
        settings.validate()?;

        let tone = ToneEngine::with_output(output)?;
        let total = settings.sequence().len();
        let saved = store.as_ref().and_then(|s| s.load_resumable(total));

        let mut controller = Self {
            cmd_rx,
            shared_state,
            mapper: settings.level_mapper(),
            settings,
            store,
            hooks,
            audio_available: tone.is_output_available(),
            tone,
            scheduler: Scheduler::new(),
            stage: if saved.is_some() {
                Stage::ResumePrompt
            } else {
                Stage::Welcome
            },
            calibration: CalibrationFlow::new(),
            baseline: CalibrationBaseline::default(),
            engine: None,
            saved,
            countdown: None,
            transition: None,
            pending_tone: None,
            next_tone_id: 0,
            warning: None,
            milestone: None,
            inactivity_nudge: false,
            outcome: None,
            report: None,
            last_error: None,
        };
        controller.publish();
        Ok(controller)
    }

    /// Run the controller event loop (blocking, call from a dedicated thread)
    pub fn run(&mut self) {
        let poll = Duration::from_millis(POLL_MS);
        loop {
            let wait = self
                .scheduler
                .next_deadline()
                .map(|d| d.saturating_duration_since(Instant::now()).min(poll))
                .unwrap_or(poll);

            match self.cmd_rx.recv_timeout(wait) {
                Ok(cmd) => {
                    if self.handle_command(cmd, Instant::now()) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.poll_tone_events();
            self.fire_due(Instant::now());
            self.publish();
        }

        self.tone.stop();
        self.publish();
    }

    // --- Commands ---

    /// Handle a single command. Returns true if the loop should exit.
    pub fn handle_command(&mut self, cmd: TestCommand, now: Instant) -> bool {
        debug!(?cmd, stage = %self.stage, "command");
        // Any key press counts as the user gesture that may revive the output
        if !self.audio_available {
            self.tone.resume();
        }

        match cmd {
            TestCommand::Shutdown => return true,
            TestCommand::Start => self.start_calibration(),
            TestCommand::Resume => self.resume_saved(now),
            TestCommand::StartFresh => self.start_fresh(),
            TestCommand::ToggleCalibrationTone => {
                if self.stage == Stage::Calibrating {
                    let action = self.calibration.toggle_tone();
                    self.apply_calibration(action);
                }
            }
            TestCommand::RaiseLevel | TestCommand::LowerLevel => {
                if self.stage == Stage::Calibrating {
                    let change = if cmd == TestCommand::RaiseLevel {
                        self.calibration.raise()
                    } else {
                        self.calibration.lower()
                    };
                    match change {
                        Ok(change) => {
                            self.apply_tone_action(change.tone);
                            if change.max_warning {
                                self.show_warning(messages::MAX_LEVEL_WARNING, now);
                            } else if change.clear_warning {
                                self.warning = None;
                                self.scheduler.cancel(Timer::ClearWarning);
                            }
                        }
                        Err(e) => debug!("ignored: {}", e),
                    }
                }
            }
            TestCommand::ConfirmLevel => {
                if self.stage == Stage::Calibrating {
                    let action = self.calibration.confirm();
                    self.apply_calibration(action);
                    if self.calibration.is_complete() {
                        self.baseline = self.calibration.baseline();
                        info!(
                            left = ?self.baseline.left,
                            right = ?self.baseline.right,
                            "calibration complete"
                        );
                        self.stage = Stage::Preparing;
                        self.scheduler.schedule_after(
                            Timer::PreparingDone,
                            now,
                            self.settings.pacing.preparing(),
                        );
                    }
                }
            }
            TestCommand::PlayTone => self.play_tone(now),
            TestCommand::Respond { heard } => self.respond(heard, now),
            TestCommand::Restart => {
                if matches!(self.stage, Stage::Results | Stage::Processing) {
                    self.reset();
                }
            }
        }
        false
    }

    fn start_calibration(&mut self) {
        if self.stage != Stage::Welcome {
            return;
        }
        self.calibration = CalibrationFlow::new();
        let action = self.calibration.begin();
        self.apply_calibration(action);
        self.stage = Stage::Calibrating;
    }

    fn resume_saved(&mut self, now: Instant) {
        if self.stage != Stage::ResumePrompt {
            return;
        }
        let Some(saved) = self.saved.take() else {
            self.stage = Stage::Welcome;
            return;
        };
        match saved.restore(self.settings.staircase, self.settings.sequence()) {
            Ok(engine) => {
                info!(index = engine.index(), "resuming saved session");
                self.baseline = saved.calibration_baseline;
                self.engine = Some(engine);
                self.stage = Stage::Testing;
                self.show_milestone(messages::RESUMING, now);
                self.arm_inactivity_nudge(now);
            }
            Err(e) => {
                warn!("Saved progress does not fit the current settings: {}", e);
                self.discard_checkpoint();
                self.last_error = Some(e.to_string());
                self.stage = Stage::Welcome;
            }
        }
    }

    fn start_fresh(&mut self) {
        if self.stage != Stage::ResumePrompt {
            return;
        }
        self.saved = None;
        self.discard_checkpoint();
        self.stage = Stage::Welcome;
    }

    fn play_tone(&mut self, now: Instant) {
        if self.stage != Stage::Testing
            || self.countdown.is_some()
            || self.transition.is_some()
            || self.pending_tone.is_some()
        {
            return;
        }
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let first = !engine.tone_played();

        self.warning = None;
        self.inactivity_nudge = false;
        self.scheduler.cancel(Timer::InactivityNudge);

        let ticks = self.settings.pacing.countdown_ticks;
        if first && ticks > 0 {
            self.countdown = Some(ticks);
            self.scheduler
                .schedule_after(Timer::CountdownTick, now, self.settings.pacing.countdown_tick());
        } else {
            self.present_next();
        }
    }

    fn respond(&mut self, heard: bool, now: Instant) {
        if self.stage != Stage::Testing || self.transition.is_some() {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let outcome = match engine.respond(heard) {
            Ok(outcome) => outcome,
            Err(TestError::PrematureResponse) => {
                self.show_warning(messages::PREMATURE_RESPONSE, now);
                return;
            }
            Err(e) => {
                debug!("ignored response: {}", e);
                return;
            }
        };

        self.warning = None;
        let after = match &outcome {
            ResponseOutcome::CatchTrial { .. } | ResponseOutcome::Continue { .. } => {
                AfterTransition::PresentAgain
            }
            ResponseOutcome::Resolved { result, .. } => {
                let left_done = result.ear == Ear::Left && engine.ear_complete(Ear::Left);
                let final_next = engine.on_last_stimulus();
                self.save_checkpoint();
                if left_done {
                    self.show_milestone(messages::LEFT_EAR_DONE, now);
                } else if final_next {
                    self.show_milestone(messages::FINAL_TONE_NEXT, now);
                }
                AfterTransition::AwaitPlay
            }
            ResponseOutcome::Finished { .. } => {
                self.show_milestone(messages::ASSESSMENT_DONE, now);
                AfterTransition::Finish
            }
        };
        self.transition = Some(after);
        self.scheduler
            .schedule_after(Timer::Transition, now, self.settings.pacing.transition());
    }

    // --- Timers ---

    /// Handle every timer due at `now`
    pub fn fire_due(&mut self, now: Instant) {
        while let Some(timer) = self.scheduler.pop_due(now) {
            self.on_timer(timer, now);
        }
    }

    fn on_timer(&mut self, timer: Timer, now: Instant) {
        match timer {
            Timer::CountdownTick => match self.countdown {
                Some(n) if n > 1 => {
                    self.countdown = Some(n - 1);
                    self.scheduler.schedule_after(
                        Timer::CountdownTick,
                        now,
                        self.settings.pacing.countdown_tick(),
                    );
                }
                Some(_) => {
                    self.countdown = None;
                    self.present_next();
                }
                None => {}
            },
            Timer::Transition => match self.transition.take() {
                Some(AfterTransition::PresentAgain) => self.present_next(),
                Some(AfterTransition::AwaitPlay) => self.arm_inactivity_nudge(now),
                Some(AfterTransition::Finish) => self.enter_processing(now),
                None => {}
            },
            Timer::PreparingDone => {
                if self.stage == Stage::Preparing {
                    self.start_testing(now);
                }
            }
            Timer::ProcessingDone => {
                if self.stage == Stage::Processing {
                    self.report = self.outcome.as_ref().map(Report::from_outcome);
                    self.stage = Stage::Results;
                }
            }
            Timer::ClearWarning => self.warning = None,
            Timer::ClearMilestone => self.milestone = None,
            Timer::InactivityNudge => {
                let idle = self.stage == Stage::Testing
                    && self.countdown.is_none()
                    && self.engine.as_ref().is_some_and(|e| !e.tone_played());
                if idle {
                    self.inactivity_nudge = true;
                }
            }
        }
    }

    fn start_testing(&mut self, now: Instant) {
        let sequence = self.settings.sequence();
        let plan = CatchPlan::random(
            &sequence,
            self.settings.catch_trials_per_ear,
            &mut rand::rng(),
        );
        debug!(catch_trials = ?plan.indices().collect::<Vec<_>>(), "catch plan");
        match ThresholdEngine::new(self.settings.staircase, sequence, plan) {
            Ok(engine) => {
                self.engine = Some(engine);
                self.stage = Stage::Testing;
                self.show_milestone(messages::CALIBRATION_DONE, now);
                self.arm_inactivity_nudge(now);
                self.hooks
                    .notify(Notification::Milestone(Milestone::TestStarted));
            }
            Err(e) => {
                warn!("Cannot start test: {}", e);
                self.last_error = Some(e.to_string());
                self.stage = Stage::Welcome;
            }
        }
    }

    fn enter_processing(&mut self, now: Instant) {
        self.stage = Stage::Processing;
        self.inactivity_nudge = false;
        self.scheduler.cancel(Timer::InactivityNudge);
        self.discard_checkpoint();

        self.outcome = self
            .engine
            .as_ref()
            .and_then(|e| e.outcome(self.baseline, unix_timestamp()));
        if let Some(outcome) = &self.outcome {
            info!(
                false_positive_rate = outcome.false_positive_rate,
                reliable = outcome.reliable,
                "test finished"
            );
            self.hooks
                .notify(Notification::Milestone(Milestone::TestFinished));
            self.hooks
                .notify(Notification::ResultsReady(Box::new(outcome.clone())));
        }
        self.scheduler
            .schedule_after(Timer::ProcessingDone, now, self.settings.pacing.processing());
    }

    fn arm_inactivity_nudge(&mut self, now: Instant) {
        self.inactivity_nudge = false;
        self.scheduler.schedule_after(
            Timer::InactivityNudge,
            now,
            self.settings.pacing.inactivity_nudge(),
        );
    }

    fn show_warning(&mut self, text: &str, now: Instant) {
        self.warning = Some(text.to_string());
        self.scheduler
            .schedule_after(Timer::ClearWarning, now, self.settings.pacing.warning());
    }

    fn show_milestone(&mut self, text: &str, now: Instant) {
        self.milestone = Some(text.to_string());
        self.scheduler
            .schedule_after(Timer::ClearMilestone, now, self.settings.pacing.milestone());
    }

    // --- Tone output ---

    fn present_next(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match engine.next_presentation() {
            Ok(presentation) => self.send_presentation(presentation),
            Err(e) => debug!("no presentation: {}", e),
        }
    }

    fn send_presentation(&mut self, presentation: Presentation) {
        self.next_tone_id += 1;
        let id = self.next_tone_id;
        let request = PulseRequest {
            frequency_hz: presentation.stimulus.frequency_hz,
            gain: self.mapper.to_gain(presentation.level_db),
            ear: presentation.stimulus.ear,
            silent: presentation.silent,
            timing: self.settings.tone_timing(),
        };
        self.tone.present(id, request);
        self.pending_tone = Some(id);
    }

    /// Drain tone engine events
    fn poll_tone_events(&mut self) {
        while let Some(event) = self.tone.try_recv_event() {
            self.handle_tone_event(event);
        }
    }

    pub fn handle_tone_event(&mut self, event: ToneEvent) {
        match event {
            ToneEvent::Finished { id } => {
                if self.pending_tone != Some(id) {
                    return;
                }
                self.pending_tone = None;
                if let Some(engine) = self.engine.as_mut() {
                    if let Err(e) = engine.tone_finished() {
                        debug!("stale tone completion: {}", e);
                    }
                }
            }
            ToneEvent::OutputUnavailable(reason) => {
                warn!("Audio output unavailable: {}", reason);
                self.audio_available = false;
            }
            ToneEvent::OutputRestored => {
                info!("Audio output restored");
                self.audio_available = true;
            }
        }
    }

    fn apply_calibration(&mut self, action: earcheck::error::Result<ToneAction>) {
        match action {
            Ok(action) => self.apply_tone_action(action),
            Err(e) => debug!("ignored: {}", e),
        }
    }

    fn apply_tone_action(&mut self, action: ToneAction) {
        match action {
            ToneAction::None => {}
            ToneAction::Start {
                frequency_hz,
                ear,
                level_db,
            } => self
                .tone
                .start_steady(frequency_hz, self.mapper.to_gain(level_db), ear),
            ToneAction::SetLevel(level_db) => self.tone.set_steady_gain(self.mapper.to_gain(level_db)),
            ToneAction::Stop => self.tone.stop(),
        }
    }

    // --- Persistence ---

    fn save_checkpoint(&mut self) {
        let (Some(store), Some(engine)) = (&self.store, &self.engine) else {
            return;
        };
        let progress = SavedProgress::capture(engine, self.baseline, unix_timestamp());
        if let Err(e) = store.save(&progress) {
            warn!("Failed to save progress: {}", e);
        }
    }

    fn discard_checkpoint(&mut self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!("Failed to clear saved progress: {}", e);
            }
        }
    }

    fn reset(&mut self) {
        self.tone.stop();
        self.scheduler.clear();
        self.stage = Stage::Welcome;
        self.calibration = CalibrationFlow::new();
        self.baseline = CalibrationBaseline::default();
        self.engine = None;
        self.countdown = None;
        self.transition = None;
        self.pending_tone = None;
        self.warning = None;
        self.milestone = None;
        self.inactivity_nudge = false;
        self.outcome = None;
        self.report = None;
        self.last_error = None;
    }

    // --- Snapshot ---

    pub fn snapshot(&self) -> TestSnapshot {
        let in_calibration = matches!(self.stage, Stage::Calibrating | Stage::Preparing);
        TestSnapshot {
            stage: self.stage,
            calibration: in_calibration.then(|| CalibrationView {
                step: self.calibration.step(),
                level_db: self.calibration.level_db(),
                tone_playing: self.calibration.is_tone_playing(),
                baseline: self.calibration.baseline(),
            }),
            engine: self.engine.as_ref().map(|e| e.snapshot()),
            resume_offer: self.saved.as_ref().map(|s| ResumeOffer {
                progress_index: s.progress_index,
                total: self.settings.sequence().len(),
                saved_at: s.timestamp,
            }),
            countdown: self.countdown,
            tone_playing: self.pending_tone.is_some(),
            transitioning: self.transition.is_some(),
            warning: self.warning.clone(),
            milestone: self.milestone.clone(),
            inactivity_nudge: self.inactivity_nudge,
            exit_warning: self.stage.exit_warning(),
            audio_available: self.audio_available,
            outcome: self.outcome.clone(),
            report: self.report.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        let mut state = self.shared_state.lock().unwrap_or_else(|e| e.into_inner());
        *state = snapshot;
    }
}

/// Frontend side of a controller running on its own thread
pub struct ControllerHandle {
    cmd_tx: Sender<TestCommand>,
    shared_state: Arc<Mutex<TestSnapshot>>,
    thread: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Build a controller and start it on a `test-controller` thread
    pub fn spawn(options: ControllerOptions) -> Result<Self> {
        let (cmd_tx, cmd_rx) = bounded(COMMAND_CAPACITY);
        let shared_state = Arc::new(Mutex::new(TestSnapshot::default()));
        let mut controller = TestController::new(cmd_rx, shared_state.clone(), options)?;

        let thread = thread::Builder::new()
            .name("test-controller".into())
            .spawn(move || controller.run())
            .map_err(|e| AppError::Config(format!("Failed to spawn controller thread: {}", e)))?;

        Ok(Self {
            cmd_tx,
            shared_state,
            thread: Some(thread),
        })
    }

    pub fn send(&self, cmd: TestCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    /// Latest published state
    pub fn snapshot(&self) -> TestSnapshot {
        self.shared_state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stop the controller and wait for its thread
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let _ = self.cmd_tx.send(TestCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
