// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Progress [`Event`]s emitted while executing a [`Feature`].
//!
//! [`Feature`]: crate::Feature

use serde::Serialize;

use crate::{
    parser::ParseError,
    result::{FeatureResult, StepResult},
};

/// Progress of a [`Session`] run, emitted strictly in execution order.
///
/// [`Session`]: crate::Session
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Source failed to parse, so nothing has been executed.
    ParseFailed {
        /// Errors found in the source.
        errors: Vec<ParseError>,
    },

    /// Execution of a feature started.
    #[serde(rename_all = "camelCase")]
    Started {
        /// Name of the feature.
        feature_name: String,
    },

    /// Concrete scenario started.
    ScenarioStarted {
        /// Name of the scenario, with examples values for outlines.
        name: String,

        /// Index of the scenario's result in [`FeatureResult::scenarios`].
        index: usize,
    },

    /// Step finished, or was skipped.
    #[serde(rename_all = "camelCase")]
    Step {
        /// Outcome of the step.
        result: StepResult,

        /// Index of the owning scenario's result in
        /// [`FeatureResult::scenarios`].
        scenario_index: usize,
    },

    /// Execution finished.
    Done {
        /// Outcome of the whole feature.
        result: FeatureResult,
    },

    /// Execution couldn't proceed.
    Error {
        /// Description of the problem.
        message: String,
    },

    /// Execution finished after a cancellation request.
    Cancelled,
}

impl Event {
    /// Indicates whether this [`Event`] terminates a run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ParseFailed { .. }
                | Self::Done { .. }
                | Self::Error { .. }
                | Self::Cancelled,
        )
    }
}
