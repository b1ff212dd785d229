// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI options of the `stepdriver` binary.
//!
//! [`Opts`] provide filtering based on [`Regex`] or [tag expressions][1],
//! and the [`browser::Config`] tweaks.
//!
//! [1]: https://cucumber.io/docs/cucumber/api#tag-expressions

use std::{path::PathBuf, time::Duration};

use gherkin::tagexpr::TagOperation;
use regex::Regex;

use crate::{browser, feature::Filter, writer::Coloring};

pub use clap::{Args, Parser};

/// Root CLI (command line interface) of the `stepdriver` binary.
#[derive(clap::Parser, Clone, Debug)]
#[command(
    name = "stepdriver",
    about = "Run feature files against HTTP APIs and live web pages"
)]
pub struct Opts {
    /// `.feature` files, or directories to look for them in.
    #[arg(value_name = "path", default_value = "features")]
    pub inputs: Vec<PathBuf>,

    /// Regex to filter scenarios by their name.
    #[arg(
        id = "name",
        long = "name",
        short = 'n',
        value_name = "regex",
        visible_alias = "scenario-name"
    )]
    pub re_filter: Option<Regex>,

    /// Tag expression to filter scenarios by.
    ///
    /// Note: Tags from Feature and Scenario are merged together on
    /// filtering, so be careful about conflicting tags on different levels.
    #[arg(
        id = "tags",
        long = "tags",
        short = 't',
        value_name = "tagexpr",
        conflicts_with = "name"
    )]
    pub tags_filter: Option<TagOperation>,

    /// Browser automation options.
    #[command(flatten)]
    pub browser: BrowserOpts,

    /// Path to write a JSON report to.
    #[arg(long, value_name = "path")]
    pub json: Option<PathBuf>,

    /// Coloring policy for a console output.
    #[arg(long, value_name = "auto|always|never", default_value = "auto")]
    pub color: Coloring,

    /// Directory of user scripts to list.
    ///
    /// Scripts are only listed, as no script engine is bundled.
    #[arg(long, value_name = "dir")]
    pub scripts: Option<PathBuf>,
}

/// CLI options of the browser automation.
#[derive(clap::Args, Clone, Debug)]
pub struct BrowserOpts {
    /// Remote debugging endpoint of the browser, either `http://` or `ws://`.
    #[arg(long, value_name = "url", default_value = browser::DEFAULT_ENDPOINT)]
    pub cdp_endpoint: String,

    /// Time an action waits for its element to appear.
    #[arg(long, value_name = "duration", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Interval between element lookups while waiting.
    #[arg(long, value_name = "duration", value_parser = humantime::parse_duration)]
    pub poll_interval: Option<Duration>,
}

impl Opts {
    /// Builds the scenario [`Filter`] out of these [`Opts`].
    #[must_use]
    pub fn filter(&self) -> Filter {
        Filter {
            name: self.re_filter.clone(),
            tags: self.tags_filter.clone(),
        }
    }
}

impl BrowserOpts {
    /// Builds the [`browser::Config`] out of these [`BrowserOpts`], keeping
    /// defaults for the omitted values.
    #[must_use]
    pub fn config(&self) -> browser::Config {
        let defaults = browser::Config::default();
        browser::Config {
            endpoint: self.cdp_endpoint.clone(),
            element_timeout: self.timeout.unwrap_or(defaults.element_timeout),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            ..defaults
        }
    }
}
