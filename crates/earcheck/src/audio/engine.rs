//! Tone engine
//!
//! Runs tone output on a dedicated thread, accepting commands via crossbeam
//! channels and emitting events back. Exactly one source sounds at a time:
//! every `Present`/`StartSteady` first stops whatever is playing.
//!
//! Presentation timing is kept by the engine thread, not by the audio
//! device, so `ToneEvent::Finished` fires on schedule even when no device is
//! available. An unavailable device is retried on the next user gesture
//! (`Present`, `StartSteady` or `Resume`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::config::audio::ENGINE_POLL_MS;
use crate::error::{Result, TestError};

use super::output::{open_default_output, open_null_output, OutputFactory, ToneOutput};
use super::tone::{PulseTrain, SteadyGain, SteadyTone};
use super::types::{Ear, PulseRequest, ToneCommand, ToneEvent};

/// Tone engine that manages output on a dedicated thread
pub struct ToneEngine {
    cmd_tx: Sender<ToneCommand>,
    event_rx: Receiver<ToneEvent>,
    output_available: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ToneEngine {
    /// Create an engine on the default audio device.
    ///
    /// Never fails because of the device: without one, tones run silently.
    pub fn new() -> Result<Self> {
        Self::with_output(open_default_output)
    }

    /// Create an engine that keeps timing but produces no sound
    pub fn headless() -> Result<Self> {
        Self::with_output(open_null_output)
    }

    /// Create an engine with a custom output factory.
    ///
    /// Blocks until the engine thread has attempted to open the output.
    pub fn with_output(factory: OutputFactory) -> Result<Self> {
        let (cmd_tx, cmd_rx) = bounded::<ToneCommand>(16);
        let (event_tx, event_rx) = unbounded::<ToneEvent>();
        let (init_tx, init_rx) = bounded::<()>(1);

        let output_available = Arc::new(AtomicBool::new(false));
        let output_available_thread = output_available.clone();

        let thread = thread::Builder::new()
            .name("tone-engine".to_string())
            .spawn(move || {
                Self::run(cmd_rx, event_tx, init_tx, factory, output_available_thread);
            })
            .map_err(|e| TestError::Audio(format!("Failed to spawn tone thread: {}", e)))?;

        init_rx
            .recv()
            .map_err(|_| TestError::Audio("Tone thread terminated during init".to_string()))?;

        Ok(Self {
            cmd_tx,
            event_rx,
            output_available,
            thread: Some(thread),
        })
    }

    /// Send a command to the engine
    pub fn send(&self, cmd: ToneCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    /// Present a pulse train; `ToneEvent::Finished { id }` follows its duration
    pub fn present(&self, id: u64, request: PulseRequest) {
        self.send(ToneCommand::Present { id, request });
    }

    /// Start the continuous calibration tone
    pub fn start_steady(&self, frequency_hz: u32, gain: f32, ear: Ear) {
        self.send(ToneCommand::StartSteady {
            frequency_hz,
            gain,
            ear,
        });
    }

    /// Change the continuous tone's level
    pub fn set_steady_gain(&self, gain: f32) {
        self.send(ToneCommand::SetSteadyGain(gain));
    }

    /// Silence output
    pub fn stop(&self) {
        self.send(ToneCommand::Stop);
    }

    /// Retry an unavailable output device
    pub fn resume(&self) {
        self.send(ToneCommand::Resume);
    }

    /// Whether a real output is currently open
    pub fn is_output_available(&self) -> bool {
        self.output_available.load(Ordering::SeqCst)
    }

    /// Non-blocking poll for the next event
    pub fn try_recv_event(&self) -> Option<ToneEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get a reference to the event receiver for use with `select!`
    pub fn event_receiver(&self) -> &Receiver<ToneEvent> {
        &self.event_rx
    }

    /// Graceful shutdown (consumes self)
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let _ = self.cmd_tx.send(ToneCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// The engine's main loop, running on the dedicated thread
    fn run(
        cmd_rx: Receiver<ToneCommand>,
        event_tx: Sender<ToneEvent>,
        init_tx: Sender<()>,
        factory: OutputFactory,
        output_available: Arc<AtomicBool>,
    ) {
        // Open output on this thread (cpal streams may be !Send)
        let mut output: Option<Box<dyn ToneOutput>> = match factory() {
            Ok(out) => {
                info!(backend = out.name(), "tone output opened");
                output_available.store(true, Ordering::SeqCst);
                Some(out)
            }
            Err(e) => {
                warn!("tone output unavailable, tones will be silent: {}", e);
                let _ = event_tx.try_send(ToneEvent::OutputUnavailable(e.to_string()));
                None
            }
        };
        let _ = init_tx.send(());

        let mut steady_gain: Option<SteadyGain> = None;
        let mut pending: Option<(u64, Instant)> = None;

        loop {
            if let Some((id, deadline)) = pending {
                if Instant::now() >= deadline {
                    pending = None;
                    // Completions are never dropped; the controller waits on them
                    if event_tx.send(ToneEvent::Finished { id }).is_err() {
                        break;
                    }
                }
            }

            let timeout = match pending {
                Some((_, deadline)) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::from_millis(ENGINE_POLL_MS),
            };

            match cmd_rx.recv_timeout(timeout) {
                Ok(cmd) => match cmd {
                    ToneCommand::Present { id, request } => {
                        Self::ensure_output(&mut output, factory, &event_tx, &output_available);
                        steady_gain = None;
                        if let Some(out) = output.as_mut() {
                            out.stop();
                            out.play(PulseTrain::new(&request));
                        }
                        debug!(
                            id,
                            frequency_hz = request.frequency_hz,
                            ear = %request.ear,
                            silent = request.silent,
                            "presenting"
                        );
                        let now = Instant::now();
                        let deadline = now
                            .checked_add(request.timing.total_duration())
                            .unwrap_or(now);
                        pending = Some((id, deadline));
                    }
                    ToneCommand::StartSteady {
                        frequency_hz,
                        gain,
                        ear,
                    } => {
                        Self::ensure_output(&mut output, factory, &event_tx, &output_available);
                        pending = None;
                        let handle = SteadyGain::new(gain);
                        if let Some(out) = output.as_mut() {
                            out.stop();
                            out.start_steady(SteadyTone::new(frequency_hz, ear, handle.clone()));
                        }
                        steady_gain = Some(handle);
                    }
                    ToneCommand::SetSteadyGain(gain) => {
                        if let Some(handle) = &steady_gain {
                            handle.set(gain);
                        }
                    }
                    ToneCommand::Stop => {
                        pending = None;
                        steady_gain = None;
                        if let Some(out) = output.as_mut() {
                            out.stop();
                        }
                    }
                    ToneCommand::Resume => {
                        Self::ensure_output(&mut output, factory, &event_tx, &output_available);
                    }
                    ToneCommand::Shutdown => {
                        if let Some(out) = output.as_mut() {
                            out.stop();
                        }
                        break;
                    }
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Reopen the output if it is missing. Failures stay silent.
    fn ensure_output(
        output: &mut Option<Box<dyn ToneOutput>>,
        factory: OutputFactory,
        event_tx: &Sender<ToneEvent>,
        output_available: &AtomicBool,
    ) {
        if output.is_some() {
            return;
        }
        match factory() {
            Ok(out) => {
                info!(backend = out.name(), "tone output restored");
                output_available.store(true, Ordering::SeqCst);
                *output = Some(out);
                let _ = event_tx.try_send(ToneEvent::OutputRestored);
            }
            Err(e) => debug!("tone output still unavailable: {}", e),
        }
    }
}

impl Drop for ToneEngine {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone::ToneTiming;
    use std::sync::atomic::AtomicUsize;

    const WAIT: Duration = Duration::from_secs(2);

    fn short_request(silent: bool) -> PulseRequest {
        PulseRequest {
            frequency_hz: 1000,
            gain: 0.2,
            ear: Ear::Left,
            silent,
            timing: ToneTiming {
                pulses: 2,
                pulse: Duration::from_millis(20),
                gap: Duration::from_millis(10),
                ramp: Duration::from_millis(2),
            },
        }
    }

    fn failing_output() -> Result<Box<dyn ToneOutput>> {
        Err(TestError::Audio("no device".to_string()))
    }

    static FLAKY_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn flaky_output() -> Result<Box<dyn ToneOutput>> {
        if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(TestError::Audio("suspended".to_string()))
        } else {
            open_null_output()
        }
    }

    #[test]
    fn headless_engine_reports_available_output() {
        let engine = ToneEngine::headless().unwrap();
        assert!(engine.is_output_available());
        engine.shutdown();
    }

    #[test]
    fn presentation_finishes_after_its_duration() {
        let engine = ToneEngine::headless().unwrap();
        let started = Instant::now();
        engine.present(1, short_request(false));
        let event = engine.event_receiver().recv_timeout(WAIT).unwrap();
        assert_eq!(event, ToneEvent::Finished { id: 1 });
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn completions_survive_an_idle_receiver() {
        let engine = ToneEngine::headless().unwrap();
        let mut request = short_request(false);
        request.timing.pulses = 0;
        for id in 1..=100 {
            engine.present(id, request);
        }
        let ids: Vec<u64> = (0..100)
            .map(|_| match engine.event_receiver().recv_timeout(WAIT).unwrap() {
                ToneEvent::Finished { id } => id,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(ids, (1..=100).collect::<Vec<u64>>());
    }

    #[test]
    fn silent_presentation_finishes_too() {
        let engine = ToneEngine::headless().unwrap();
        engine.present(9, short_request(true));
        let event = engine.event_receiver().recv_timeout(WAIT).unwrap();
        assert_eq!(event, ToneEvent::Finished { id: 9 });
    }

    #[test]
    fn new_presentation_replaces_pending_one() {
        let engine = ToneEngine::headless().unwrap();
        engine.present(1, short_request(false));
        engine.present(2, short_request(false));
        let event = engine.event_receiver().recv_timeout(WAIT).unwrap();
        assert_eq!(event, ToneEvent::Finished { id: 2 });
        assert!(engine
            .event_receiver()
            .recv_timeout(Duration::from_millis(150))
            .is_err());
    }

    #[test]
    fn stop_cancels_pending_presentation() {
        let engine = ToneEngine::headless().unwrap();
        engine.present(1, short_request(false));
        engine.stop();
        assert!(engine
            .event_receiver()
            .recv_timeout(Duration::from_millis(200))
            .is_err());
    }

    #[test]
    fn steady_tone_does_not_emit_finished() {
        let engine = ToneEngine::headless().unwrap();
        engine.start_steady(1000, 0.1, Ear::Right);
        engine.set_steady_gain(0.2);
        assert!(engine
            .event_receiver()
            .recv_timeout(Duration::from_millis(100))
            .is_err());
        engine.stop();
    }

    #[test]
    fn missing_device_is_reported_once_and_timing_still_runs() {
        let engine = ToneEngine::with_output(failing_output).unwrap();
        assert!(!engine.is_output_available());
        let event = engine.event_receiver().recv_timeout(WAIT).unwrap();
        assert!(matches!(event, ToneEvent::OutputUnavailable(_)));

        engine.present(4, short_request(false));
        let event = engine.event_receiver().recv_timeout(WAIT).unwrap();
        assert_eq!(event, ToneEvent::Finished { id: 4 });
    }

    #[test]
    fn device_recovers_on_next_gesture() {
        let engine = ToneEngine::with_output(flaky_output).unwrap();
        let first = engine.event_receiver().recv_timeout(WAIT).unwrap();
        assert!(matches!(first, ToneEvent::OutputUnavailable(_)));

        engine.resume();
        let event = engine.event_receiver().recv_timeout(WAIT).unwrap();
        assert_eq!(event, ToneEvent::OutputRestored);
        assert!(engine.is_output_available());
    }

    #[test]
    fn drop_shuts_down_thread() {
        let engine = ToneEngine::headless().unwrap();
        engine.present(1, short_request(false));
        drop(engine);
    }
}
