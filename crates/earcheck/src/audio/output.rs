//! Output backends
//!
//! The tone engine renders through a `ToneOutput`. With the `playback`
//! feature the default output is a rodio sink on the system's default
//! device; otherwise (or when the device can't be opened) tones are dropped
//! and only their timing is honoured.

use crate::error::{Result, TestError};

use super::tone::{PulseTrain, SteadyTone};

/// A sink for synthesized tones. At most one source sounds at a time.
pub trait ToneOutput {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Replace whatever is sounding with a pulse train
    fn play(&mut self, train: PulseTrain);

    /// Replace whatever is sounding with a continuous tone
    fn start_steady(&mut self, tone: SteadyTone);

    /// Silence and release the current source
    fn stop(&mut self);
}

/// Opens an output on the engine thread (device handles may be !Send)
pub type OutputFactory = fn() -> Result<Box<dyn ToneOutput>>;

/// Output that discards audio
#[derive(Debug, Default)]
pub struct NullOutput;

impl ToneOutput for NullOutput {
    fn name(&self) -> &'static str {
        "null"
    }

    fn play(&mut self, _train: PulseTrain) {}

    fn start_steady(&mut self, _tone: SteadyTone) {}

    fn stop(&mut self) {}
}

/// Factory for a [`NullOutput`]
pub fn open_null_output() -> Result<Box<dyn ToneOutput>> {
    Ok(Box::new(NullOutput))
}

/// Open the platform's default audio output
#[cfg(feature = "playback")]
pub fn open_default_output() -> Result<Box<dyn ToneOutput>> {
    Ok(Box::new(rodio_output::RodioOutput::open()?))
}

/// Open the platform's default audio output
#[cfg(not(feature = "playback"))]
pub fn open_default_output() -> Result<Box<dyn ToneOutput>> {
    Err(TestError::Audio(
        "built without the `playback` feature".to_string(),
    ))
}

#[cfg(feature = "playback")]
mod rodio_output {
    use rodio::{OutputStream, OutputStreamBuilder, Sink};

    use super::{PulseTrain, Result, SteadyTone, TestError, ToneOutput};

    /// rodio sink on the default device
    pub struct RodioOutput {
        // `sink` must be declared before `stream` so it drops first
        sink: Sink,
        _stream: OutputStream,
    }

    impl RodioOutput {
        pub fn open() -> Result<Self> {
            let mut stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| TestError::Audio(format!("Failed to open audio output: {}", e)))?;
            stream.log_on_drop(false);
            let sink = Sink::connect_new(stream.mixer());
            Ok(Self {
                sink,
                _stream: stream,
            })
        }
    }

    impl ToneOutput for RodioOutput {
        fn name(&self) -> &'static str {
            "rodio"
        }

        fn play(&mut self, train: PulseTrain) {
            self.sink.stop();
            self.sink.append(train);
            self.sink.play();
        }

        fn start_steady(&mut self, tone: SteadyTone) {
            self.sink.stop();
            self.sink.append(tone);
            self.sink.play();
        }

        fn stop(&mut self) {
            self.sink.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone::{SteadyGain, ToneTiming};
    use crate::audio::types::{Ear, PulseRequest};

    #[test]
    fn null_output_accepts_everything() {
        let mut output = open_null_output().unwrap();
        assert_eq!(output.name(), "null");
        output.play(PulseTrain::new(&PulseRequest {
            frequency_hz: 1000,
            gain: 0.5,
            ear: Ear::Left,
            silent: false,
            timing: ToneTiming::default(),
        }));
        output.start_steady(SteadyTone::new(1000, Ear::Right, SteadyGain::new(0.1)));
        output.stop();
    }

    #[cfg(not(feature = "playback"))]
    #[test]
    fn default_output_unavailable_without_playback() {
        let err = open_default_output().err().unwrap();
        assert!(err.to_string().contains("playback"));
    }
}
