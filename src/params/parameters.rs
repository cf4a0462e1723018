//! Parameters of a single experiment run

use serde::{Deserialize, Serialize};

use super::kind::ExperimentKind;

/// Everything an experiment process needs to know about its run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub kind: ExperimentKind,
    /// Position in the parameter grid (`None` for tuning runs)
    pub index: Option<usize>,
    pub seed: u64,
    pub default_inner_quantity: u64,
    pub default_inner_length: u64,
    pub inner_quantity_proportion: f64,
    pub inner_length_proportion: f64,
    pub max_frames: u64,
    pub env_name: String,
    /// Replaces the derived result file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_name_override: Option<String>,
}

impl Parameters {
    /// Parameters at proportion 1.0 with the family's defaults
    pub fn defaults(kind: ExperimentKind, seed: u64) -> Self {
        Self {
            kind,
            index: None,
            seed,
            default_inner_quantity: kind.default_inner_quantity(),
            default_inner_length: kind.default_inner_length(),
            inner_quantity_proportion: 1.0,
            inner_length_proportion: 1.0,
            max_frames: kind.default_max_frames(),
            env_name: kind.env_name().to_string(),
            result_name_override: None,
        }
    }

    /// Parameter-tuning run: full proportions, custom default inner quantity
    pub fn tuning(kind: ExperimentKind, seed: u64, default_inner_quantity: u64) -> Self {
        Self {
            default_inner_quantity,
            result_name_override: Some(format!(
                "paramtuning_{}_{}",
                default_inner_quantity, seed
            )),
            ..Self::defaults(kind, seed)
        }
    }

    /// Inner iterations per outer evaluation
    pub fn inner_quantity(&self) -> u64 {
        scaled(self.default_inner_quantity, self.inner_quantity_proportion)
    }

    /// Environment steps per inner iteration
    pub fn inner_length(&self) -> u64 {
        scaled(self.default_inner_length, self.inner_length_proportion)
    }

    /// File stem of this run's result log
    pub fn result_file_name(&self) -> String {
        if let Some(name) = &self.result_name_override {
            return name.clone();
        }
        format!(
            "{}_{}_{}_{}_{}",
            self.kind, self.max_frames, self.inner_quantity_proportion,
            self.inner_length_proportion, self.seed
        )
    }

    /// Multi-line description for the operator
    pub fn describe(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Experiment:                {}\n", self.kind));
        if let Some(index) = self.index {
            out.push_str(&format!("Index:                     {}\n", index));
        }
        out.push_str(&format!("Environment:               {}\n", self.env_name));
        out.push_str(&format!("Seed:                      {}\n", self.seed));
        out.push_str(&format!("Max frames:                {}\n", self.max_frames));
        out.push_str(&format!(
            "Inner quantity:            {} ({} x {})\n",
            self.inner_quantity(),
            self.default_inner_quantity,
            self.inner_quantity_proportion
        ));
        out.push_str(&format!(
            "Inner length:              {} ({} x {})\n",
            self.inner_length(),
            self.default_inner_length,
            self.inner_length_proportion
        ));
        out.push_str(&format!("Result file:               {}.txt", self.result_file_name()));
        out
    }
}

fn scaled(default: u64, proportion: f64) -> u64 {
    ((default as f64 * proportion).round() as u64).max(1)
}
