//! Two-state frame-rate switch driven by the latest presence state.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PresenceMode {
    MacroOnly,
    MicroOnly,
    MicroIfMacro,
    MicroAndMacro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Absence,
    MacroPresence,
    MicroPresence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Low,
    High,
}

type Reconfigure = Box<dyn FnMut(FrameRate) + Send>;

pub struct FrameRateOptimizer {
    mode: PresenceMode,
    current: FrameRate,
    reconfigure: Reconfigure,
    switches: usize,
}

impl FrameRateOptimizer {
    pub fn new<F>(mode: PresenceMode, reconfigure: F) -> Self
    where
        F: FnMut(FrameRate) + Send + 'static,
    {
        let current = match mode {
            PresenceMode::MacroOnly | PresenceMode::MicroIfMacro => FrameRate::Low,
            PresenceMode::MicroOnly | PresenceMode::MicroAndMacro => FrameRate::High,
        };
        Self {
            mode,
            current,
            reconfigure: Box::new(reconfigure),
            switches: 0,
        }
    }

    pub fn current(&self) -> FrameRate {
        self.current
    }

    pub fn switches(&self) -> usize {
        self.switches
    }

    /// Picks the rate for `state` and reconfigures the sensor if it changed.
    pub fn optimize(&mut self, state: PresenceState) -> FrameRate {
        let requested = match self.mode {
            PresenceMode::MicroIfMacro => match state {
                PresenceState::MacroPresence => match self.current {
                    FrameRate::Low => FrameRate::High,
                    FrameRate::High => FrameRate::Low,
                },
                PresenceState::Absence => FrameRate::Low,
                PresenceState::MicroPresence => self.current,
            },
            PresenceMode::MicroOnly | PresenceMode::MicroAndMacro => FrameRate::High,
            PresenceMode::MacroOnly => FrameRate::Low,
        };

        if requested != self.current {
            log::info!("frame rate {:?} -> {:?} on {:?}", self.current, requested, state);
            self.current = requested;
            self.switches += 1;
            (self.reconfigure)(requested);
        }
        self.current
    }
}
