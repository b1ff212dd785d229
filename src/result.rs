// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Outcomes of executing a [`Feature`] and its parts.
//!
//! Results form a strict containment hierarchy:
//! [`FeatureResult`] ⊇ [`ScenarioResult`] ⊇ [`StepResult`]. [`Stats`] are
//! always derived from the [`StepResult`]s and never stored.
//!
//! [`Feature`]: crate::Feature

use std::time::Duration;

use derive_more::with_trait::Display;
use serde::{ser::SerializeStruct as _, Serialize, Serializer};

use crate::{feature::Step, http::Response};

/// Status of a [`StepResult`], [`ScenarioResult`] or [`FeatureResult`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Completed successfully.
    #[display("passed")]
    Passed,

    /// Completed with an error.
    #[display("failed")]
    Failed,

    /// Not executed.
    #[display("skipped")]
    Skipped,

    /// Currently executing.
    #[display("running")]
    Running,

    /// Not started yet.
    #[display("pending")]
    Pending,
}

/// Outcome of a single [`Step`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepResult {
    /// Executed [`Step`].
    pub step: Step,

    /// [`Status`] of the execution.
    pub status: Status,

    /// Error message, if the [`Step`] failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall time the handler took.
    #[serde(serialize_with = "millis")]
    pub duration: Duration,

    /// HTTP [`Response`] produced by this [`Step`], if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,

    /// Lines printed by this [`Step`], joined with `\n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print_output: Option<String>,

    /// Base64-encoded PNG captured by this [`Step`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl StepResult {
    /// Creates a not executed [`StepResult`].
    #[must_use]
    pub fn skipped(step: Step) -> Self {
        Self::new(step, Status::Skipped)
    }

    /// Creates a [`StepResult`] with the given [`Status`] and no outputs.
    #[must_use]
    pub fn new(step: Step, status: Status) -> Self {
        Self {
            step,
            status,
            error: None,
            duration: Duration::ZERO,
            response: None,
            print_output: None,
            screenshot: None,
        }
    }
}

/// Outcome of a single concrete [`Scenario`] run.
///
/// [`Scenario`]: crate::feature::Scenario
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioResult {
    /// Name of the [`Scenario`], with [`Examples`] values for outlines.
    ///
    /// [`Examples`]: crate::feature::Examples
    /// [`Scenario`]: crate::feature::Scenario
    pub name: String,

    /// [`StepResult`]s of background and scenario steps, in execution order.
    pub steps: Vec<StepResult>,

    /// [`Status`] of the run.
    pub status: Status,

    /// Wall time of the run, hooks included.
    #[serde(serialize_with = "millis")]
    pub duration: Duration,

    /// Error of a failed before/after scenario hook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_error: Option<String>,
}

impl ScenarioResult {
    /// Creates a not executed [`ScenarioResult`] out of the given `steps`.
    #[must_use]
    pub fn skipped(name: impl Into<String>, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            name: name.into(),
            steps: steps.into_iter().map(StepResult::skipped).collect(),
            status: Status::Skipped,
            duration: Duration::ZERO,
            hook_error: None,
        }
    }

    /// Derives a [`Status`] out of the given [`StepResult`]s and hook state.
    ///
    /// Failure dominates skipping, which dominates passing.
    #[must_use]
    pub fn derive_status(steps: &[StepResult], hook_failed: bool) -> Status {
        if hook_failed || steps.iter().any(|s| s.status == Status::Failed) {
            Status::Failed
        } else if steps.iter().any(|s| s.status == Status::Skipped) {
            Status::Skipped
        } else {
            Status::Passed
        }
    }

    /// [`Stats`] of this [`ScenarioResult`]'s [`StepResult`]s.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.steps.iter().map(|s| s.status).collect()
    }
}

/// Outcome of a whole [`Feature`] run.
///
/// [`Feature`]: crate::Feature
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureResult {
    /// Name of the [`Feature`].
    ///
    /// [`Feature`]: crate::Feature
    pub name: String,

    /// [`ScenarioResult`]s, one per concrete run, in execution order.
    pub scenarios: Vec<ScenarioResult>,

    /// [`Status`] of the run.
    pub status: Status,

    /// Wall time of the run.
    pub duration: Duration,
}

impl FeatureResult {
    /// Derives a [`Status`] out of the given [`ScenarioResult`]s.
    #[must_use]
    pub fn derive_status(scenarios: &[ScenarioResult]) -> Status {
        if scenarios.iter().any(|s| s.status == Status::Failed) {
            Status::Failed
        } else if scenarios.iter().any(|s| s.status == Status::Skipped) {
            Status::Skipped
        } else {
            Status::Passed
        }
    }

    /// [`Stats`] summed over every [`StepResult`] of this [`FeatureResult`].
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.scenarios
            .iter()
            .flat_map(|sc| &sc.steps)
            .map(|s| s.status)
            .collect()
    }

    /// [`Stats`] of [`ScenarioResult`]s themselves.
    #[must_use]
    pub fn scenario_stats(&self) -> Stats {
        self.scenarios.iter().map(|s| s.status).collect()
    }
}

impl Serialize for FeatureResult {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        let mut st = ser.serialize_struct("FeatureResult", 5)?;
        st.serialize_field("name", &self.name)?;
        st.serialize_field("scenarios", &self.scenarios)?;
        st.serialize_field("status", &self.status)?;
        st.serialize_field("duration", &as_millis(self.duration))?;
        st.serialize_field("stats", &self.stats())?;
        st.end()
    }
}

/// Execution statistics of [`Step`]s (or [`Scenario`]s).
///
/// [`Scenario`]: crate::feature::Scenario
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    /// Number of passed items.
    pub passed: usize,

    /// Number of skipped items.
    pub skipped: usize,

    /// Number of failed items.
    pub failed: usize,
}

impl Stats {
    /// Returns total number of items these [`Stats`] have been collected for.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.skipped + self.failed
    }

    /// Records a single item of the given [`Status`].
    ///
    /// [`Status::Running`] and [`Status::Pending`] are not final and are not
    /// counted.
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Passed => self.passed += 1,
            Status::Skipped => self.skipped += 1,
            Status::Failed => self.failed += 1,
            Status::Running | Status::Pending => {}
        }
    }
}

impl FromIterator<Status> for Stats {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut stats = Self::default();
        for status in iter {
            stats.record(status);
        }
        stats
    }
}

impl Serialize for Stats {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        let mut st = ser.serialize_struct("Stats", 4)?;
        st.serialize_field("total", &self.total())?;
        st.serialize_field("passed", &self.passed)?;
        st.serialize_field("failed", &self.failed)?;
        st.serialize_field("skipped", &self.skipped)?;
        st.end()
    }
}

fn as_millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn millis<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_f64(as_millis(*d))
}
