//! Real-time Morse (CW) receiver.
//!
//! Spectrum frames go in, characters and word gaps come out. The `cw` module
//! is the decoding pipeline; `audio` supplies frames from a microphone or a
//! recording; `config` persists the tuning surface between runs.

pub mod audio;
pub mod config;
pub mod cw;
pub mod error;
pub mod logging;
pub mod transcript;

pub use config::Settings;
pub use cw::{CwEngine, DecodeEvent, EngineConfig, EventSink, GapMarker, SpectrumFrame};
pub use error::{CwError, CwResult};
pub use transcript::Transcript;
