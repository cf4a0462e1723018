//! Progress tracking for an outer search wrapped around an inner training loop
//!
//! One [`NestedOptimization`] lives for the whole experiment process. The
//! inner loop reports every environment step, the outer loop reports every
//! evaluated candidate. When an outer observation beats the best so far the
//! tracker switches to reevaluation: primary time stops, reevaluation time
//! starts, and steps are counted separately until the reevaluated objective
//! comes back.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::params::Parameters;
use crate::timing::{format_duration, Clock, Stopwatch, SystemClock};

use super::record::{Level, LogRecord};
use super::result_log::{ResultFileMode, ResultLog};

/// Which stopwatch is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RunningPrimary,
    RunningReeval,
}

/// How often reevaluations ask for a visualization artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerMode {
    /// Only when the reevaluated objective is a new best
    #[default]
    Standard,
    /// After every reevaluation
    SaveAll,
}

/// Result of recording an outer-loop observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationOutcome {
    /// Keep searching
    Continue,
    /// New outer best: run a reevaluation, then call
    /// [`NestedOptimization::record_reeval_observation`]
    ReevaluationRequired,
    /// Step budget used up. Nothing was logged; the caller should flush
    /// and exit with status 0.
    BudgetExhausted,
}

/// Result of recording a reevaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReevalOutcome {
    pub new_best: bool,
    pub visualization_required: bool,
}

/// Nested-optimization progress tracker
#[derive(Debug)]
pub struct NestedOptimization<C: Clock + Clone = SystemClock> {
    sw: Stopwatch<C>,
    sw_reeval: Stopwatch<C>,
    f_observed: f64,
    f_best: f64,
    f_reeval_observed: f64,
    f_reeval_best: f64,
    step: u64,
    reevaluating_steps: u64,
    iteration: u64,
    evaluation: u64,
    phase: Phase,
    max_frames: u64,
    mode: TrackerMode,
    visualization_required: bool,
    log: ResultLog,
}

impl NestedOptimization<SystemClock> {
    /// Tracker logging to `result_path` with a budget of `max_frames` steps
    pub fn new(
        result_path: impl AsRef<Path>,
        max_frames: u64,
        mode: TrackerMode,
        file_mode: ResultFileMode,
    ) -> Result<Self> {
        Self::with_clock(result_path, max_frames, mode, file_mode, SystemClock::new())
    }

    /// Tracker for one experiment run, logging to
    /// `{results_dir}/{result_file_name}.txt`
    pub fn for_parameters(
        results_dir: impl AsRef<Path>,
        params: &Parameters,
        mode: TrackerMode,
        file_mode: ResultFileMode,
    ) -> Result<Self> {
        let path = results_dir
            .as_ref()
            .join(format!("{}.txt", params.result_file_name()));
        Self::new(path, params.max_frames, mode, file_mode)
    }
}

impl<C: Clock + Clone> NestedOptimization<C> {
    pub fn with_clock(
        result_path: impl AsRef<Path>,
        max_frames: u64,
        mode: TrackerMode,
        file_mode: ResultFileMode,
        clock: C,
    ) -> Result<Self> {
        let log = ResultLog::open(result_path.as_ref(), file_mode)?;

        let sw = Stopwatch::with_clock(clock.clone());
        let mut sw_reeval = Stopwatch::with_clock(clock);
        sw_reeval.pause();

        Ok(Self {
            sw,
            sw_reeval,
            f_observed: f64::NEG_INFINITY,
            f_best: f64::NEG_INFINITY,
            f_reeval_observed: f64::NEG_INFINITY,
            f_reeval_best: f64::NEG_INFINITY,
            step: 0,
            reevaluating_steps: 0,
            iteration: 0,
            evaluation: 0,
            phase: Phase::RunningPrimary,
            max_frames,
            mode,
            visualization_required: false,
            log,
        })
    }

    /// Count one inner-loop environment step
    pub fn advance_step(&mut self) {
        match self.phase {
            Phase::RunningPrimary => self.step += 1,
            Phase::RunningReeval => self.reevaluating_steps += 1,
        }
    }

    /// Count one inner-training checkpoint
    pub fn advance_inner_iteration(&mut self) {
        self.iteration += 1;
    }

    /// Record the objective of one outer-loop evaluation.
    ///
    /// The row is written before any state changes, so a failed write
    /// leaves the tracker as it was.
    pub fn record_outer_observation(&mut self, value: f64) -> Result<ObservationOutcome> {
        check_objective(value)?;

        let evaluation = self.evaluation + 1;
        if self.budget_exhausted() {
            self.f_observed = value;
            self.evaluation = evaluation;
            log::info!("Finished at {} frames.", self.max_frames);
            return Ok(ObservationOutcome::BudgetExhausted);
        }

        let new_best = value > self.f_best;
        let f_best = if new_best { value } else { self.f_best };
        self.log
            .append_record(&self.record(Level::Outer, evaluation, f_best, value))?;

        self.f_observed = value;
        self.evaluation = evaluation;
        let outcome = if new_best {
            self.f_best = value;
            self.enter_reeval();
            log::info!("Best found (level 2): {}", value);
            ObservationOutcome::ReevaluationRequired
        } else {
            ObservationOutcome::Continue
        };

        self.log_progress("outer", value);
        Ok(outcome)
    }

    /// Record the re-measured objective of the candidate that triggered
    /// the current reevaluation, then return to the primary phase
    pub fn record_reeval_observation(&mut self, value: f64) -> Result<ReevalOutcome> {
        check_objective(value)?;
        if self.phase != Phase::RunningReeval {
            return Err(TrackerError::NotReevaluating);
        }

        let new_best = value > self.f_reeval_best;
        let f_reeval_best = if new_best { value } else { self.f_reeval_best };
        self.log.append_record(&self.record(
            Level::Reeval,
            self.evaluation,
            f_reeval_best,
            value,
        ))?;

        self.f_reeval_observed = value;
        self.f_reeval_best = f_reeval_best;
        if new_best {
            log::info!("Best found (level 3): {}", value);
        }
        if new_best || self.mode == TrackerMode::SaveAll {
            self.visualization_required = true;
        }
        self.leave_reeval();
        self.log_progress("reeval", value);

        Ok(ReevalOutcome {
            new_best,
            visualization_required: self.visualization_required,
        })
    }

    fn enter_reeval(&mut self) {
        self.phase = Phase::RunningReeval;
        self.sw.pause();
        self.sw_reeval.resume();
        self.debug_check_stopwatches();
    }

    fn leave_reeval(&mut self) {
        self.phase = Phase::RunningPrimary;
        self.sw_reeval.pause();
        self.sw.resume();
        self.debug_check_stopwatches();
    }

    fn debug_check_stopwatches(&self) {
        debug_assert_ne!(
            self.sw.is_paused(),
            self.sw_reeval.is_paused(),
            "exactly one stopwatch must be running"
        );
        debug_assert_eq!(self.sw.is_paused(), self.phase == Phase::RunningReeval);
    }

    fn record(&self, level: Level, evaluation: u64, f_best: f64, f: f64) -> LogRecord {
        LogRecord {
            level,
            evaluation,
            f_best,
            f,
            time: self.elapsed(),
            time_including_reeval: self.elapsed_including_reeval(),
            step: self.step,
            step_including_reeval: self.step + self.reevaluating_steps,
        }
    }

    fn log_progress(&self, what: &str, value: f64) {
        let left = self
            .estimated_time_left()
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());
        log::info!(
            "{} observation {}, progress: {:.4}, elapsed: {}, time left: {}",
            what,
            value,
            self.progress_fraction(),
            format_duration(self.elapsed()),
            left
        );
    }

    /// True once more steps were taken than the budget allows
    pub fn budget_exhausted(&self) -> bool {
        self.step > self.max_frames
    }

    /// True while a reevaluation result is outstanding
    pub fn reevaluation_required(&self) -> bool {
        self.phase == Phase::RunningReeval
    }

    /// Consume the pending request for a visualization artifact
    pub fn take_visualization_request(&mut self) -> bool {
        std::mem::take(&mut self.visualization_required)
    }

    /// Fraction of the step budget used by primary steps
    pub fn progress_fraction(&self) -> f64 {
        if self.max_frames == 0 {
            return 1.0;
        }
        self.step as f64 / self.max_frames as f64
    }

    /// Primary seconds still needed at the current rate, if any progress was made
    pub fn estimated_time_left(&self) -> Option<f64> {
        let fraction = self.progress_fraction();
        if fraction <= 0.0 {
            return None;
        }
        let elapsed = self.elapsed();
        Some((elapsed / fraction - elapsed).max(0.0))
    }

    /// Share of the population that survives a GA generation at the current
    /// point of the budget
    pub fn percent_survival(&self) -> f64 {
        percent_survival(self.step, self.max_frames)
    }

    /// Append free-form text to the result log
    pub fn print_to_result_file(&self, text: &str) -> Result<()> {
        self.log.append_raw(text)
    }

    /// Handle for appending from another thread
    pub fn log_handle(&self) -> ResultLog {
        self.log.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn reevaluating_steps(&self) -> u64 {
        self.reevaluating_steps
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn evaluation(&self) -> u64 {
        self.evaluation
    }

    pub fn max_frames(&self) -> u64 {
        self.max_frames
    }

    pub fn f_best(&self) -> f64 {
        self.f_best
    }

    pub fn f_observed(&self) -> f64 {
        self.f_observed
    }

    pub fn f_reeval_best(&self) -> f64 {
        self.f_reeval_best
    }

    pub fn f_reeval_observed(&self) -> f64 {
        self.f_reeval_observed
    }

    /// Primary stopwatch seconds
    pub fn elapsed(&self) -> f64 {
        self.sw.elapsed()
    }

    /// Reevaluation stopwatch seconds
    pub fn elapsed_reeval(&self) -> f64 {
        self.sw_reeval.elapsed()
    }

    pub fn elapsed_including_reeval(&self) -> f64 {
        self.sw.elapsed() + self.sw_reeval.elapsed()
    }

    pub fn result_path(&self) -> &Path {
        self.log.path()
    }
}

fn check_objective(value: f64) -> Result<()> {
    if value.is_nan() {
        return Err(TrackerError::InvalidObjective { value });
    }
    Ok(())
}

/// Survival share falling linearly from 0.6 at step 0 to 0.0 at the budget
pub fn percent_survival(step: u64, max_frames: u64) -> f64 {
    const HIGH: f64 = 0.6;
    if max_frames <= 1 {
        return 0.0;
    }
    let remaining = max_frames as f64 - step as f64 - 1.0;
    (remaining / (max_frames as f64 - 1.0) * HIGH).clamp(0.0, HIGH)
}
