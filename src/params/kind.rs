//! Experiment families and their default inner-loop settings

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Robot-design experiment family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentKind {
    /// Voxel soft robots, GA outer loop, PPO inner loop
    #[default]
    Evogym,
    /// Graph-grammar designs, MCTS outer loop, MPC inner loop
    Robogrammar,
    /// 2D modular robots, evolutionary outer loop, controller evolution inner loop
    Gymrem2d,
    /// 3D modular robots, evolutionary outer loop, controller evolution inner loop
    Jorgenrem,
    /// Coupled Bayesian optimization of morphology and gait
    Tholiao,
}

impl ExperimentKind {
    pub fn all() -> &'static [ExperimentKind] {
        &[
            ExperimentKind::Evogym,
            ExperimentKind::Robogrammar,
            ExperimentKind::Gymrem2d,
            ExperimentKind::Jorgenrem,
            ExperimentKind::Tholiao,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            ExperimentKind::Evogym => "evogym",
            ExperimentKind::Robogrammar => "robogrammar",
            ExperimentKind::Gymrem2d => "gymrem2d",
            ExperimentKind::Jorgenrem => "jorgenrem",
            ExperimentKind::Tholiao => "tholiao",
        }
    }

    /// Inner iterations per outer evaluation at proportion 1.0
    pub fn default_inner_quantity(self) -> u64 {
        match self {
            ExperimentKind::Evogym => 1000,
            ExperimentKind::Robogrammar => 64,
            ExperimentKind::Gymrem2d => 320,
            ExperimentKind::Jorgenrem => 32,
            ExperimentKind::Tholiao => 16,
        }
    }

    /// Environment steps per inner iteration at proportion 1.0
    pub fn default_inner_length(self) -> u64 {
        match self {
            ExperimentKind::Evogym => 128,
            ExperimentKind::Robogrammar => 128,
            ExperimentKind::Gymrem2d => 100,
            ExperimentKind::Jorgenrem => 100,
            ExperimentKind::Tholiao => 400,
        }
    }

    /// Environment step budget of one experiment run
    pub fn default_max_frames(self) -> u64 {
        match self {
            ExperimentKind::Evogym => 32_032_000,
            ExperimentKind::Robogrammar => 262_144_000,
            ExperimentKind::Gymrem2d => 16_000_000,
            ExperimentKind::Jorgenrem => 8_000_000,
            ExperimentKind::Tholiao => 1_600_000,
        }
    }

    pub fn env_name(self) -> &'static str {
        match self {
            ExperimentKind::Evogym => "Walker-v0",
            ExperimentKind::Robogrammar => "FlatTerrainTask",
            ExperimentKind::Gymrem2d => "ModularER_2D",
            ExperimentKind::Jorgenrem => "ModularER_3D",
            ExperimentKind::Tholiao => "VREP_Hexapod",
        }
    }

    /// Default inner quantities compared by a tuning batch
    pub fn tuning_inner_quantities(self) -> Vec<u64> {
        match self {
            ExperimentKind::Gymrem2d => vec![20, 80, 320, 1280],
            ExperimentKind::Jorgenrem => vec![1, 8, 32, 128, 512],
            other => {
                let q = other.default_inner_quantity();
                vec![(q / 4).max(1), q, q * 4]
            }
        }
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExperimentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ExperimentKind::all()
            .iter()
            .copied()
            .find(|k| k.name() == lower)
            .ok_or_else(|| {
                format!(
                    "Unknown experiment '{}', expected one of: {}",
                    s,
                    ExperimentKind::all()
                        .iter()
                        .map(|k| k.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}
