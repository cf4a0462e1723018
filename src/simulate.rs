//! Synthetic nested optimization for exercising the tracker end-to-end
//!
//! Outer loop: random search over a small morphology vector. A share of
//! candidates, given by the tracker's survival schedule, are mutations of
//! the best morphology so far instead of fresh samples.
//! Inner loop: hill climbing of a single controller gain for that morphology,
//! one tracker step per simulated environment step.
//!
//! Cheap enough to stand in for a real experiment process in batch runs.

use std::path::PathBuf;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::Serialize;

use crate::error::Result;
use crate::params::Parameters;
use crate::timing::Clock;
use crate::tracker::{NestedOptimization, ObservationOutcome};

const MORPHOLOGY_DIM: usize = 4;
const MUTATION_STEP: f64 = 0.1;

/// Why a synthetic run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEnd {
    /// Step budget used up; the process should exit with status 0
    BudgetExhausted { evaluations: u64 },
    /// Stopped by the evaluation cap
    EvaluationLimit { evaluations: u64 },
}

#[derive(Debug, Serialize)]
struct BestArtifact<'a> {
    evaluation: u64,
    objective: f64,
    morphology: &'a [f64],
    controller_gain: f64,
}

/// Outer random search with an inner hill climber
pub struct SyntheticExperiment {
    rng: Xoshiro256StarStar,
    target: [f64; MORPHOLOGY_DIM],
    elite: Option<[f64; MORPHOLOGY_DIM]>,
    inner_quantity: u64,
    inner_length: u64,
    reeval_quantity: u64,
    reeval_length: u64,
    max_evaluations: Option<u64>,
    artifact_dir: Option<PathBuf>,
    artifact_name: String,
}

impl SyntheticExperiment {
    pub fn new(params: &Parameters) -> Self {
        let mut rng = Xoshiro256StarStar::seed_from_u64(params.seed);
        let mut target = [0.0; MORPHOLOGY_DIM];
        for t in target.iter_mut() {
            *t = rng.gen_range(-1.0..1.0);
        }

        Self {
            rng,
            target,
            elite: None,
            inner_quantity: params.inner_quantity(),
            inner_length: params.inner_length(),
            reeval_quantity: params.default_inner_quantity.max(1),
            reeval_length: params.default_inner_length.max(1),
            max_evaluations: None,
            artifact_dir: None,
            artifact_name: params.result_file_name(),
        }
    }

    /// Stop after this many outer evaluations even if budget remains
    pub fn with_max_evaluations(mut self, max: u64) -> Self {
        self.max_evaluations = Some(max);
        self
    }

    /// Write best-candidate artifacts into `dir` when the tracker asks for one
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Run until the tracker reports budget exhaustion or the evaluation cap
    pub fn run<C: Clock + Clone>(
        &mut self,
        no: &mut NestedOptimization<C>,
    ) -> Result<SimulationEnd> {
        loop {
            if let Some(max) = self.max_evaluations {
                if no.evaluation() >= max {
                    return Ok(SimulationEnd::EvaluationLimit {
                        evaluations: no.evaluation(),
                    });
                }
            }

            let morphology = self.sample_morphology(no.percent_survival());
            let (objective, gain) =
                self.train_controller(&morphology, self.inner_quantity, self.inner_length, no);

            match no.record_outer_observation(objective)? {
                ObservationOutcome::BudgetExhausted => {
                    return Ok(SimulationEnd::BudgetExhausted {
                        evaluations: no.evaluation(),
                    })
                }
                ObservationOutcome::Continue => {}
                ObservationOutcome::ReevaluationRequired => {
                    self.elite = Some(morphology);
                    let (reevaluated, gain) = self.train_controller(
                        &morphology,
                        self.reeval_quantity,
                        self.reeval_length,
                        no,
                    );
                    no.record_reeval_observation(reevaluated)?;
                    if no.take_visualization_request() {
                        self.save_artifact(no.evaluation(), reevaluated, &morphology, gain);
                    }
                }
            }
            log::debug!("Outer evaluation {} gain {:.3}", no.evaluation(), gain);
        }
    }

    /// Mutate the elite with probability `survival`, otherwise sample fresh
    fn sample_morphology(&mut self, survival: f64) -> [f64; MORPHOLOGY_DIM] {
        if let Some(elite) = self.elite {
            if self.rng.gen_bool(survival.clamp(0.0, 1.0)) {
                let mut m = elite;
                for v in m.iter_mut() {
                    *v = (*v + self.rng.gen_range(-MUTATION_STEP..MUTATION_STEP))
                        .clamp(-1.0, 1.0);
                }
                return m;
            }
        }

        let mut m = [0.0; MORPHOLOGY_DIM];
        for v in m.iter_mut() {
            *v = self.rng.gen_range(-1.0..1.0);
        }
        m
    }

    fn morphology_quality(&self, morphology: &[f64; MORPHOLOGY_DIM]) -> f64 {
        -morphology
            .iter()
            .zip(self.target.iter())
            .map(|(m, t)| (m - t) * (m - t))
            .sum::<f64>()
    }

    /// Hill-climb the controller gain; returns best objective and its gain
    fn train_controller<C: Clock + Clone>(
        &mut self,
        morphology: &[f64; MORPHOLOGY_DIM],
        iterations: u64,
        length: u64,
        no: &mut NestedOptimization<C>,
    ) -> (f64, f64) {
        let optimum = morphology[0];
        let base = self.morphology_quality(morphology);
        let mut gain: f64 = 0.0;
        let mut best = base - (gain - optimum).powi(2);

        for _ in 0..iterations {
            let candidate = gain + self.rng.gen_range(-0.1..0.1);
            for _ in 0..length {
                no.advance_step();
            }
            let value = base - (candidate - optimum).powi(2);
            if value > best {
                best = value;
                gain = candidate;
            }
            no.advance_inner_iteration();
        }
        (best, gain)
    }

    fn save_artifact(
        &self,
        evaluation: u64,
        objective: f64,
        morphology: &[f64; MORPHOLOGY_DIM],
        gain: f64,
    ) {
        let Some(dir) = &self.artifact_dir else {
            return;
        };
        let artifact = BestArtifact {
            evaluation,
            objective,
            morphology,
            controller_gain: gain,
        };
        let path = dir.join(format!("{}_best.ron", self.artifact_name));
        let result = ron::ser::to_string_pretty(&artifact, Default::default())
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(&path, text).map_err(|e| e.to_string()));
        match result {
            Ok(()) => log::info!("Saved best candidate to {}", path.display()),
            Err(e) => log::warn!("Failed to save best candidate {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ExperimentKind;
    use crate::timing::ManualClock;
    use crate::tracker::{percent_survival, read_log, Level, ResultFileMode, TrackerMode};

    fn small_params() -> Parameters {
        let mut params = Parameters::defaults(ExperimentKind::Jorgenrem, 11);
        params.default_inner_quantity = 4;
        params.default_inner_length = 5;
        params.max_frames = 2_000;
        params
    }

    fn tracker(dir: &tempfile::TempDir, max_frames: u64) -> NestedOptimization<ManualClock> {
        NestedOptimization::with_clock(
            dir.path().join("sim.txt"),
            max_frames,
            TrackerMode::Standard,
            ResultFileMode::Truncate,
            ManualClock::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_runs_until_budget_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let params = small_params();
        let mut no = tracker(&dir, params.max_frames);
        let end = SyntheticExperiment::new(&params).run(&mut no).unwrap();

        assert!(matches!(end, SimulationEnd::BudgetExhausted { .. }));
        assert!(no.budget_exhausted());
        assert!(!no.reevaluation_required());

        let rows = read_log(no.result_path()).unwrap();
        assert!(rows.iter().any(|r| r.level == Level::Reeval));
        // Outer best never decreases
        let outer: Vec<f64> = rows
            .iter()
            .filter(|r| r.level == Level::Outer)
            .map(|r| r.f_best)
            .collect();
        assert!(outer.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_evaluation_limit() {
        let dir = tempfile::tempdir().unwrap();
        let params = small_params();
        let mut no = tracker(&dir, u64::MAX);
        let end = SyntheticExperiment::new(&params)
            .with_max_evaluations(5)
            .run(&mut no)
            .unwrap();
        assert_eq!(end, SimulationEnd::EvaluationLimit { evaluations: 5 });
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let params = small_params();
        let mut a = tracker(&dir_a, params.max_frames);
        let mut b = tracker(&dir_b, params.max_frames);
        SyntheticExperiment::new(&params).run(&mut a).unwrap();
        SyntheticExperiment::new(&params).run(&mut b).unwrap();
        assert_eq!(a.f_best(), b.f_best());
        assert_eq!(a.evaluation(), b.evaluation());
    }

    #[test]
    fn test_survival_share_controls_elite_mutations() {
        let params = small_params();
        let mut experiment = SyntheticExperiment::new(&params);
        let elite = [0.5; MORPHOLOGY_DIM];
        experiment.elite = Some(elite);

        let near_elite = |m: &[f64; MORPHOLOGY_DIM]| {
            m.iter()
                .zip(elite.iter())
                .all(|(a, b)| (a - b).abs() <= MUTATION_STEP)
        };
        let mut count = |survival: f64| {
            (0..1000)
                .filter(|_| near_elite(&experiment.sample_morphology(survival)))
                .count()
        };

        let early = count(percent_survival(0, 1000));
        let late = count(percent_survival(1000, 1000));
        assert!((500..=700).contains(&early), "early mutations: {}", early);
        assert!(late <= 2, "late mutations: {}", late);
    }

    #[test]
    fn test_artifact_written_for_new_best() {
        let dir = tempfile::tempdir().unwrap();
        let params = small_params();
        let mut no = tracker(&dir, params.max_frames);
        SyntheticExperiment::new(&params)
            .with_artifact_dir(dir.path())
            .run(&mut no)
            .unwrap();
        let artifact = dir
            .path()
            .join(format!("{}_best.ron", params.result_file_name()));
        assert!(artifact.exists());
    }
}
