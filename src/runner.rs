// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution engine running [`Feature`]s against a step [`Registry`].

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    rc::Rc,
    time::Instant,
};

use async_trait::async_trait;
use futures::FutureExt as _;
use tokio_util::sync::CancellationToken;

use crate::{
    event::Event,
    feature::{Feature, Scenario, Step},
    plugin,
    result::{FeatureResult, ScenarioResult, Status, StepResult},
    step::{self, Args, Registry},
    Context,
};

/// Per-scenario lifecycle hooks invoked by a [`Runner`].
///
/// Both hooks may mutate the [`Registry`], which is never done while a step
/// is executing.
#[async_trait(?Send)]
pub trait Hooks {
    /// Invoked on a fresh [`Context`] before the first step of a scenario.
    ///
    /// # Errors
    ///
    /// Failing makes every step of the scenario skipped and the scenario
    /// failed.
    async fn before_scenario(
        &mut self,
        ctx: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), plugin::Error> {
        _ = (ctx, registry);
        Ok(())
    }

    /// Invoked after the last step of a scenario, even if some step failed or
    /// the run has been cancelled.
    ///
    /// # Errors
    ///
    /// Failing makes the scenario failed.
    async fn after_scenario(
        &mut self,
        ctx: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), plugin::Error> {
        _ = (ctx, registry);
        Ok(())
    }
}

#[async_trait(?Send)]
impl Hooks for () {}

/// Execution engine.
///
/// Scenarios run strictly sequentially, each against its own fresh
/// [`Context`], and steps of a scenario run strictly in document order.
#[derive(Debug)]
pub struct Runner<H = ()> {
    /// Step [`Definition`]s to match step text against.
    ///
    /// [`Definition`]: step::Definition
    registry: Registry,

    /// Scenario lifecycle [`Hooks`].
    hooks: H,

    /// Cancellation signal of the run.
    cancel: CancellationToken,
}

impl Runner {
    /// Creates a new [`Runner`] over the given [`Registry`] without any
    /// [`Hooks`].
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            hooks: (),
            cancel: CancellationToken::new(),
        }
    }
}

impl<H: Hooks> Runner<H> {
    /// Replaces the [`Hooks`] of this [`Runner`].
    #[must_use]
    pub fn with_hooks<Hk: Hooks>(self, hooks: Hk) -> Runner<Hk> {
        Runner {
            registry: self.registry,
            hooks,
            cancel: self.cancel,
        }
    }

    /// Makes this [`Runner`] observe the given cancellation `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replaces the cancellation token this [`Runner`] observes.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Returns the cancellation token this [`Runner`] observes.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the step [`Registry`].
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the step [`Registry`] for modification.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Returns the [`Hooks`].
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Returns the [`Hooks`] for modification.
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Returns the step [`Registry`] and the [`Hooks`] together, for
    /// modification.
    pub fn parts_mut(&mut self) -> (&mut Registry, &mut H) {
        (&mut self.registry, &mut self.hooks)
    }

    /// Splits this [`Runner`] into its [`Registry`] and [`Hooks`].
    #[must_use]
    pub fn into_parts(self) -> (Registry, H) {
        (self.registry, self.hooks)
    }

    /// Runs the given [`Feature`], reporting progress to `on_event`.
    ///
    /// Every concrete scenario (outlines expanded) gets exactly one
    /// [`ScenarioResult`] holding one [`StepResult`] per background and
    /// scenario step, even when the run is cancelled midway.
    ///
    /// Only [`Event::ScenarioStarted`] and [`Event::Step`] are emitted.
    pub async fn run(
        &mut self,
        feature: &Feature,
        mut on_event: impl FnMut(Event),
    ) -> FeatureResult {
        let start = Instant::now();
        let background = feature.background_steps();
        let mut scenarios = Vec::with_capacity(feature.count_scenarios());

        for scenario in feature.scenarios.iter().flat_map(Scenario::expand) {
            if self.cancel.is_cancelled() {
                tracing::debug!(scenario = %scenario.name, "skipping cancelled");
                scenarios.push(ScenarioResult::skipped(
                    scenario.name,
                    background.iter().cloned().chain(scenario.steps),
                ));
                continue;
            }

            let index = scenarios.len();
            on_event(Event::ScenarioStarted {
                name: scenario.name.clone(),
                index,
            });
            let result = self
                .run_scenario(background, scenario, index, &mut on_event)
                .await;
            scenarios.push(result);
        }

        let status = FeatureResult::derive_status(&scenarios);
        tracing::debug!(feature = %feature.name, %status, "feature finished");
        FeatureResult {
            name: feature.name.clone(),
            scenarios,
            status,
            duration: start.elapsed(),
        }
    }

    /// Runs a single concrete [`Scenario`].
    async fn run_scenario(
        &mut self,
        background: &[Step],
        scenario: Scenario,
        index: usize,
        on_event: &mut impl FnMut(Event),
    ) -> ScenarioResult {
        tracing::debug!(scenario = %scenario.name, index, "scenario started");
        let start = Instant::now();
        let mut ctx = Context::new(self.cancel.clone());

        let before = AssertUnwindSafe(
            self.hooks.before_scenario(&mut ctx, &mut self.registry),
        )
        .catch_unwind()
        .await;
        let mut hook_error = hook_outcome(before).err();
        if let Some(e) = &hook_error {
            tracing::warn!(scenario = %scenario.name, "before hook failed: {e}");
        }

        let mut halted = hook_error.is_some();
        let steps = background.iter().cloned().chain(scenario.steps);
        let mut results = Vec::with_capacity(steps.size_hint().0);
        for step in steps {
            let result = if halted || self.cancel.is_cancelled() {
                StepResult::skipped(step)
            } else {
                let res = self.run_step(&mut ctx, step).await;
                halted = res.status != Status::Passed;
                res
            };
            on_event(Event::Step {
                result: result.clone(),
                scenario_index: index,
            });
            results.push(result);
        }

        let after = AssertUnwindSafe(
            self.hooks.after_scenario(&mut ctx, &mut self.registry),
        )
        .catch_unwind()
        .await;
        if let Err(e) = hook_outcome(after) {
            tracing::warn!(scenario = %scenario.name, "after hook failed: {e}");
            _ = hook_error.get_or_insert(e);
        }

        let status = ScenarioResult::derive_status(&results, hook_error.is_some());
        tracing::debug!(scenario = %scenario.name, %status, "scenario finished");
        ScenarioResult {
            name: scenario.name,
            steps: results,
            status,
            duration: start.elapsed(),
            hook_error,
        }
    }

    /// Matches and executes a single [`Step`].
    async fn run_step(&self, ctx: &mut Context, step: Step) -> StepResult {
        let start = Instant::now();

        let outcome = match self.registry.find(&step.text) {
            Some(m) => {
                let handler = Rc::clone(&m.definition.handler);
                let args = Args {
                    text: step.text.clone(),
                    captures: m.captures,
                    docstring: step.docstring.clone(),
                    table: step.table.clone(),
                };
                AssertUnwindSafe(handler(ctx, args))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|p| {
                        Err(step::Error::Panicked {
                            message: panic_message(&*p),
                        })
                    })
            }
            None => Err(step::Error::Unmatched {
                text: step.text.clone(),
            }),
        };

        let mut result = StepResult::new(step, Status::Passed);
        result.duration = start.elapsed();
        match outcome {
            Ok(()) => {
                tracing::debug!(step = %result.step.text, "step passed");
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(step = %result.step.text, "step cancelled");
                result.status = Status::Skipped;
            }
            Err(e) => {
                tracing::warn!(step = %result.step.text, "step failed: {e}");
                result.status = Status::Failed;
                result.error = Some(e.to_string());
            }
        }

        let prints = ctx.take_prints();
        if !prints.is_empty() {
            result.print_output = Some(prints.join("\n"));
        }
        result.response = ctx.take_fresh_response();
        result.screenshot = ctx.take_screenshot();
        result
    }
}

/// Flattens a possibly panicked hook outcome into an error message.
fn hook_outcome(
    res: Result<Result<(), plugin::Error>, Box<dyn Any + Send>>,
) -> Result<(), String> {
    match res {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(p) => Err(format!("Hook panicked: {}", panic_message(&*p))),
    }
}

/// Extracts a human-readable message out of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "Unknown panic payload".to_owned()
    }
}
