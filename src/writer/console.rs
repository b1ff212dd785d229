// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Human-readable progress [`Writer`].

use std::{io, time::Duration};

use async_trait::async_trait;
use itertools::Itertools as _;

use crate::{
    event::Event,
    result::{FeatureResult, Stats, Status, StepResult},
};

use super::{
    out::{Coloring, Styles, WriteStrExt as _},
    Writer,
};

/// [`Writer`] printing progress and a summary in a human-readable form.
#[derive(Debug)]
pub struct Console<Out: io::Write = io::Stdout> {
    /// [`io::Write`] implementor to output into.
    output: Out,

    /// [`Styles`] of the output.
    styles: Styles,
}

impl Console {
    /// Creates a new [`Console`] [`Writer`] outputting into [`io::stdout()`].
    #[must_use]
    pub fn stdout(coloring: Coloring) -> Self {
        Self::new(io::stdout(), coloring)
    }
}

impl<Out: io::Write> Console<Out> {
    /// Creates a new [`Console`] [`Writer`] outputting into the given
    /// `output`.
    #[must_use]
    pub fn new(output: Out, coloring: Coloring) -> Self {
        Self {
            output,
            styles: Styles::new(coloring),
        }
    }

    /// Returns the underlying output.
    #[must_use]
    pub fn into_inner(self) -> Out {
        self.output
    }

    fn step(&mut self, res: &StepResult) -> io::Result<()> {
        let line = format!("{} {}", res.step.keyword, res.step.text);
        let line = match res.status {
            Status::Passed => self.styles.ok(format!("✔  {line}")),
            Status::Failed => self.styles.err(format!("✘  {line}")),
            Status::Skipped | Status::Running | Status::Pending => {
                self.styles.skipped(format!("-  {line}"))
            }
        };
        self.output.write_line(format!("   {line}"))?;

        if let Some(err) = &res.error {
            let err = err.lines().map(|l| format!("        {l}")).join("\n");
            self.output.write_line(self.styles.err(err))?;
        }
        if let Some(printed) = &res.print_output {
            for l in printed.lines() {
                self.output.write_line(format!("        {l}"))?;
            }
        }
        if let Some(resp) = &res.response {
            self.output.write_line(format!(
                "        HTTP {} {} ({})",
                resp.status,
                resp.status_text,
                humantime::format_duration(resp.time),
            ))?;
        }
        if let Some(shot) = &res.screenshot {
            self.output.write_line(format!(
                "        [screenshot, {} base64 bytes]",
                shot.len(),
            ))?;
        }
        Ok(())
    }

    fn summary(&mut self, res: &FeatureResult) -> io::Result<()> {
        let scenarios = res.scenario_stats();
        let steps = res.stats();
        self.output.write_line("")?;
        self.output.write_line(self.styles.bold("[Summary]"))?;
        let line = format!("{} scenarios ({})", scenarios.total(), self.stats(scenarios));
        self.output.write_line(line)?;
        let line = format!("{} steps ({})", steps.total(), self.stats(steps));
        self.output.write_line(line)?;
        self.output.write_line(format!(
            "Finished in {}",
            humantime::format_duration(millis(res.duration)),
        ))
    }

    fn stats(&self, stats: Stats) -> String {
        [
            (stats.passed, "passed", &self.styles.ok),
            (stats.failed, "failed", &self.styles.err),
            (stats.skipped, "skipped", &self.styles.skipped),
        ]
        .into_iter()
        .filter(|(n, ..)| *n > 0)
        .map(|(n, what, style)| {
            let s = format!("{n} {what}");
            if self.styles.is_present {
                style.apply_to(s).force_styling(true).to_string()
            } else {
                s
            }
        })
        .join(", ")
    }
}

/// Truncates the given [`Duration`] to whole milliseconds.
fn millis(d: Duration) -> Duration {
    Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[async_trait(?Send)]
impl<Out: io::Write> Writer for Console<Out> {
    async fn handle_event(&mut self, ev: &Event) -> io::Result<()> {
        match ev {
            Event::ParseFailed { errors } => {
                for e in errors {
                    let line = format!("Failed to parse: {e}");
                    self.output.write_line(self.styles.err(line))?;
                }
            }
            Event::Started { feature_name } => {
                let line = format!("Feature: {feature_name}");
                self.output.write_line(self.styles.bold(line))?;
            }
            Event::ScenarioStarted { name, .. } => {
                let line = format!(" Scenario: {name}");
                self.output.write_line(self.styles.header(line))?;
            }
            Event::Step { result, .. } => self.step(result)?,
            Event::Done { result } => self.summary(result)?,
            Event::Error { message } => {
                self.output.write_line(self.styles.err(message.as_str()))?;
            }
            Event::Cancelled => {
                self.output.write_line(self.styles.skipped("Cancelled"))?;
            }
        }
        self.output.flush()
    }
}
