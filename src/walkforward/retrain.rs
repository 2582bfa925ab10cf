//! Retraining cadence.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::model::ModelCapabilities;
use crate::series::{TimeSeries, Timestamp};

/// What a retrain predicate gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct RetrainContext<'a> {
    pub iteration: usize,
    pub prediction_time: Timestamp,
    pub train_series: &'a TimeSeries,
    /// Present only when the predicate asked for past covariates.
    pub past_covariates: Option<&'a TimeSeries>,
    /// Future covariates strictly before the prediction point, present only when the
    /// predicate asked for them.
    pub future_covariates: Option<&'a TimeSeries>,
}

type PredicateFn = dyn Fn(&RetrainContext<'_>) -> bool + Send + Sync;

/// User-supplied retrain decision.
#[derive(Clone)]
pub struct RetrainPredicate {
    func: Arc<PredicateFn>,
    past_covariates: bool,
    future_covariates: bool,
}

impl RetrainPredicate {
    pub fn new(func: impl Fn(&RetrainContext<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self {
            func: Arc::new(func),
            past_covariates: false,
            future_covariates: false,
        }
    }

    /// Pass the past covariate window to the predicate.
    pub fn with_past_covariates(mut self) -> Self {
        self.past_covariates = true;
        self
    }

    /// Pass the future covariate window to the predicate.
    pub fn with_future_covariates(mut self) -> Self {
        self.future_covariates = true;
        self
    }

    pub fn wants_past_covariates(&self) -> bool {
        self.past_covariates
    }

    pub fn wants_future_covariates(&self) -> bool {
        self.future_covariates
    }

    fn call(&self, ctx: &RetrainContext<'_>) -> bool {
        let ctx = RetrainContext {
            past_covariates: ctx.past_covariates.filter(|_| self.past_covariates),
            future_covariates: ctx.future_covariates.filter(|_| self.future_covariates),
            ..*ctx
        };
        (self.func)(&ctx)
    }
}

impl fmt::Debug for RetrainPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrainPredicate")
            .field("past_covariates", &self.past_covariates)
            .field("future_covariates", &self.future_covariates)
            .finish_non_exhaustive()
    }
}

/// When to refit the model during a walk-forward run.
///
/// A model that has never been fit is always fit, whatever the policy.
#[derive(Debug, Clone, Default)]
pub enum RetrainPolicy {
    #[default]
    Always,
    Never,
    /// Refit at iterations `0, k, 2k, ...`.
    EveryN(usize),
    Predicate(RetrainPredicate),
}

impl RetrainPolicy {
    pub fn predicate(func: impl Fn(&RetrainContext<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(RetrainPredicate::new(func))
    }

    /// Refit every iteration.
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always | Self::EveryN(1))
    }

    /// Check the policy against what the model supports.
    pub fn validate(&self, model: &str, capabilities: &ModelCapabilities) -> Result<()> {
        if let Self::EveryN(0) = self {
            return Err(ForecastError::InvalidRetrain(
                "retrain interval must be at least 1".to_string(),
            ));
        }
        if !self.is_always() && !capabilities.retrain_optional {
            return Err(ForecastError::RetrainRequired(model.to_string()));
        }
        Ok(())
    }

    /// Whether to refit before forecasting from `ctx`.
    pub fn should_retrain(&self, ctx: &RetrainContext<'_>, fitted: bool) -> bool {
        if !fitted {
            return true;
        }
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::EveryN(k) => *k > 0 && ctx.iteration % k == 0,
            Self::Predicate(p) => p.call(ctx),
        }
    }
}

impl From<bool> for RetrainPolicy {
    fn from(retrain: bool) -> Self {
        if retrain {
            Self::Always
        } else {
            Self::Never
        }
    }
}

impl From<usize> for RetrainPolicy {
    /// `0` means never, `1` always, `k` every k-th iteration.
    fn from(k: usize) -> Self {
        match k {
            0 => Self::Never,
            1 => Self::Always,
            k => Self::EveryN(k),
        }
    }
}

/// Retrain setting as written in configuration files: `true`/`false` or an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrainSetting {
    Flag(bool),
    Every(usize),
}

impl Default for RetrainSetting {
    fn default() -> Self {
        Self::Flag(true)
    }
}

impl From<RetrainSetting> for RetrainPolicy {
    fn from(setting: RetrainSetting) -> Self {
        match setting {
            RetrainSetting::Flag(flag) => flag.into(),
            RetrainSetting::Every(k) => k.into(),
        }
    }
}
