//! Offload classes and how function names map onto them.

use serde::{Deserialize, Serialize};

/// Kind of offload target. Both speak the same wire protocol and differ
/// only in the reserved port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffloadClass {
    /// Function runs on a SmartNIC.
    LambdaNic,
    /// Function runs on a bare-metal worker.
    BareMetal,
}

impl OffloadClass {
    pub const ALL: [OffloadClass; 2] = [OffloadClass::LambdaNic, OffloadClass::BareMetal];

    /// Substring of a function name that selects this class.
    pub fn marker(self) -> &'static str {
        match self {
            OffloadClass::LambdaNic => "lambdanic",
            OffloadClass::BareMetal => "baremetal",
        }
    }

    /// UDP port offload nodes listen on for this class.
    pub fn port(self) -> u16 {
        match self {
            OffloadClass::LambdaNic => 4369,
            OffloadClass::BareMetal => 10000,
        }
    }

    /// Class selected by `function`, if its name carries a marker.
    pub fn for_function(function: &str) -> Option<OffloadClass> {
        Self::ALL.into_iter().find(|class| function.contains(class.marker()))
    }
}

/// Port used per offload class. Defaults to each class's reserved port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffloadPorts {
    pub lambdanic: u16,
    pub baremetal: u16,
}

impl OffloadPorts {
    pub fn port(&self, class: OffloadClass) -> u16 {
        match class {
            OffloadClass::LambdaNic => self.lambdanic,
            OffloadClass::BareMetal => self.baremetal,
        }
    }
}

impl Default for OffloadPorts {
    fn default() -> Self {
        Self {
            lambdanic: OffloadClass::LambdaNic.port(),
            baremetal: OffloadClass::BareMetal.port(),
        }
    }
}
