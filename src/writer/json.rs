// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! JSON report [`Writer`].

use std::io;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    event::Event,
    parser::ParseError,
    result::{FeatureResult, Stats},
};

use super::Writer;

/// [`Writer`] collecting finished features and writing them as a single JSON
/// report into an [`io::Write`] implementor once [finished].
///
/// Cancelled runs don't make it into the report.
///
/// [finished]: Writer::finish
#[derive(Debug)]
pub struct Json<Out: io::Write> {
    /// [`io::Write`] implementor to output the report into.
    output: Out,

    /// Finished features.
    features: Vec<FeatureResult>,

    /// Errors of the sources that failed to parse.
    parse_errors: Vec<ParseError>,

    /// Messages of [`Event::Error`]s.
    errors: Vec<String>,
}

/// Shape of the written report.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    features: &'a [FeatureResult],
    stats: Stats,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    parse_errors: &'a [ParseError],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    errors: &'a [String],
}

impl<Out: io::Write> Json<Out> {
    /// Creates a new [`Json`] [`Writer`] outputting the report into the given
    /// `output`.
    #[must_use]
    pub const fn new(output: Out) -> Self {
        Self {
            output,
            features: Vec::new(),
            parse_errors: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[async_trait(?Send)]
impl<Out: io::Write> Writer for Json<Out> {
    async fn handle_event(&mut self, ev: &Event) -> io::Result<()> {
        match ev {
            Event::Done { result } => self.features.push(result.clone()),
            Event::ParseFailed { errors } => {
                self.parse_errors.extend(errors.iter().cloned());
            }
            Event::Error { message } => self.errors.push(message.clone()),
            Event::Started { .. }
            | Event::ScenarioStarted { .. }
            | Event::Step { .. }
            | Event::Cancelled => {}
        }
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        let report = Report {
            features: &self.features,
            stats: self
                .features
                .iter()
                .flat_map(|f| &f.scenarios)
                .flat_map(|sc| &sc.steps)
                .map(|st| st.status)
                .collect(),
            parse_errors: &self.parse_errors,
            errors: &self.errors,
        };
        serde_json::to_writer_pretty(&mut self.output, &report)?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use crate::{
        feature::{Keyword, Step},
        result::{ScenarioResult, Status, StepResult},
    };

    use super::*;

    #[tokio::test]
    async fn writes_report_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let result = FeatureResult {
            name: "Users".into(),
            scenarios: vec![ScenarioResult {
                name: "fetch".into(),
                steps: vec![StepResult::new(Step::new(Keyword::Given, "pass"), Status::Passed)],
                status: Status::Passed,
                duration: Duration::from_millis(3),
                hook_error: None,
            }],
            status: Status::Passed,
            duration: Duration::from_millis(3),
        };
        let mut json = Json::new(fs::File::create(&path).unwrap());

        json.handle_event(&Event::Done { result }).await.unwrap();
        json.handle_event(&Event::Error { message: "Could not read x".into() })
            .await
            .unwrap();
        json.finish().await.unwrap();
        drop(json);

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report["features"][0]["name"], "Users");
        assert_eq!(report["features"][0]["status"], "passed");
        assert_eq!(report["stats"]["passed"], 1);
        assert_eq!(report["stats"]["total"], 1);
        assert_eq!(report["errors"][0], "Could not read x");
        assert!(report.get("parseErrors").is_none());
    }
}
