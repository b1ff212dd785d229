// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Structured [`Feature`] model the [`Runner`] executes.
//!
//! The model is produced by the [`parser`] out of [`gherkin`] source and is
//! immutable once built: [`Scenario Outline`][1]s are never executed directly,
//! but are [expanded](Scenario::expand) into concrete [`Scenario`]s instead.
//!
//! [`Runner`]: crate::Runner
//! [`parser`]: crate::parser
//! [1]: https://cucumber.io/docs/gherkin/reference#scenario-outline

use std::{iter, vec};

use derive_more::with_trait::Display;
use either::Either;
use gherkin::tagexpr::TagOperation;
use itertools::Itertools as _;
use lazy_regex::regex;
use regex::Regex;
use serde::Serialize;

use crate::tag::Ext as _;

/// Parsed `.feature` file.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Feature {
    /// Name of this [`Feature`].
    pub name: String,

    /// Free-form description following the `Feature:` line.
    pub description: String,

    /// Tags of this [`Feature`], without the leading `@`.
    pub tags: Vec<String>,

    /// Steps to run before every [`Scenario`].
    pub background: Option<Background>,

    /// [`Scenario`]s in declaration order.
    pub scenarios: Vec<Scenario>,

    /// Source line of the `Feature:` keyword.
    pub line: usize,
}

impl Feature {
    /// Returns [`Background`] [`Step`]s, if any.
    #[must_use]
    pub fn background_steps(&self) -> &[Step] {
        self.background.as_ref().map_or(&[], |bg| bg.steps.as_slice())
    }

    /// Counts concrete [`Scenario`]s of this [`Feature`], with outlines
    /// counted once per [`Examples`] row.
    #[must_use]
    pub fn count_scenarios(&self) -> usize {
        self.scenarios.iter().map(Scenario::count_runs).sum()
    }

    /// Retains only [`Scenario`]s satisfying the given `filter`.
    ///
    /// [`Scenario`] tags are merged with [`Feature`] ones when evaluating a
    /// [`TagOperation`].
    #[must_use]
    pub fn filtered(mut self, filter: &Filter) -> Self {
        let feature_tags = self.tags.clone();
        self.scenarios.retain(|sc| filter.matches(&feature_tags, sc));
        self
    }
}

/// Criteria to select [`Scenario`]s to run.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    /// [`Regex`] the [`Scenario`] name has to match.
    pub name: Option<Regex>,

    /// Tag expression the merged tags have to satisfy.
    pub tags: Option<TagOperation>,
}

impl Filter {
    /// Indicates whether the given [`Scenario`] passes this [`Filter`].
    #[must_use]
    pub fn matches(&self, feature_tags: &[String], scenario: &Scenario) -> bool {
        let name_ok = self
            .name
            .as_ref()
            .map_or(true, |re| re.is_match(&scenario.name));
        let tags_ok = self.tags.as_ref().map_or(true, |op| {
            op.eval(
                scenario
                    .tags
                    .iter()
                    .chain(scenario.examples.iter().flat_map(|ex| &ex.tags))
                    .chain(feature_tags),
            )
        });
        name_ok && tags_ok
    }
}

/// Steps shared by every [`Scenario`] of a [`Feature`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Background {
    /// Name of this [`Background`] (usually empty).
    pub name: String,

    /// [`Step`]s of this [`Background`].
    pub steps: Vec<Step>,

    /// Source line of the `Background:` keyword.
    pub line: usize,
}

/// Single test case of a [`Feature`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Scenario {
    /// Name of this [`Scenario`].
    pub name: String,

    /// Tags of this [`Scenario`], without the leading `@`.
    pub tags: Vec<String>,

    /// [`Step`]s of this [`Scenario`].
    pub steps: Vec<Step>,

    /// [`Examples`] tables, making this [`Scenario`] an outline when
    /// non-empty.
    pub examples: Vec<Examples>,

    /// Source line of the `Scenario:` keyword.
    pub line: usize,
}

impl Scenario {
    /// Indicates whether this [`Scenario`] is an outline.
    #[must_use]
    pub fn is_outline(&self) -> bool {
        !self.examples.is_empty()
    }

    /// Number of concrete runs this [`Scenario`] expands into.
    #[must_use]
    pub fn count_runs(&self) -> usize {
        if self.is_outline() {
            self.examples.iter().map(|ex| ex.rows.len()).sum()
        } else {
            1
        }
    }

    /// Expands [`Scenario Outline`][1] [`Examples`].
    ///
    /// So this one:
    /// ```gherkin
    /// Scenario Outline: fetch
    ///   Given url 'http://localhost/items/<id>'
    ///   When method GET
    ///   Then status <code>
    ///
    ///   Examples:
    ///     | id | code |
    ///     | 1  | 200  |
    ///     | 2  | 404  |
    /// ```
    ///
    /// Is expanded into `fetch (1, 200)` and `fetch (2, 404)` with `<id>` and
    /// `<code>` substituted in every step text, doc string and table cell.
    /// Placeholders not named in the header are left untouched.
    ///
    /// A non-outline [`Scenario`] yields itself only.
    ///
    /// [1]: https://cucumber.io/docs/gherkin/reference#scenario-outline
    pub fn expand(
        &self,
    ) -> Either<iter::Once<Self>, vec::IntoIter<Self>> {
        if !self.is_outline() {
            return Either::Left(iter::once(self.clone()));
        }

        let expanded = self
            .examples
            .iter()
            .flat_map(|ex| ex.rows.iter().map(move |row| (ex, row)))
            .map(|(ex, row)| {
                let fill = |s: &str| substitute(s, &ex.header, row);
                Self {
                    name: format!("{} ({})", self.name, row.iter().join(", ")),
                    tags: self
                        .tags
                        .iter()
                        .chain(&ex.tags)
                        .cloned()
                        .collect(),
                    steps: self
                        .steps
                        .iter()
                        .map(|step| Step {
                            text: fill(&step.text),
                            docstring: step.docstring.as_deref().map(|d| fill(d)),
                            table: step.table.as_ref().map(|t| {
                                t.iter()
                                    .map(|r| r.iter().map(|c| fill(c)).collect())
                                    .collect()
                            }),
                            ..step.clone()
                        })
                        .collect(),
                    examples: Vec::new(),
                    line: self.line,
                }
            })
            .collect::<Vec<_>>();

        Either::Right(expanded.into_iter())
    }
}

/// Replaces `<placeholder>`s in the given `input` with the `row` values of the
/// matching `header` columns.
fn substitute(input: &str, header: &[String], row: &[String]) -> String {
    regex!(r"<([^<>\s]+)>")
        .replace_all(input, |cap: &regex::Captures<'_>| {
            let name = &cap[1];
            header.iter().position(|h| h == name).map_or_else(
                || cap[0].to_owned(),
                |i| row.get(i).cloned().unwrap_or_default(),
            )
        })
        .into_owned()
}

/// [`Examples`][1] table of a [`Scenario Outline`][2].
///
/// [1]: https://cucumber.io/docs/gherkin/reference#examples
/// [2]: https://cucumber.io/docs/gherkin/reference#scenario-outline
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Examples {
    /// Name of this [`Examples`] block.
    pub name: String,

    /// Tags of this [`Examples`] block, merged into expanded [`Scenario`]s.
    pub tags: Vec<String>,

    /// Header row naming the placeholders.
    pub header: Vec<String>,

    /// Data rows, one expanded [`Scenario`] each.
    pub rows: Vec<Vec<String>>,

    /// Source line of the `Examples:` keyword.
    pub line: usize,
}

/// Keyword a [`Step`] starts with.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
pub enum Keyword {
    /// `Given`
    Given,

    /// `When`
    When,

    /// `Then`
    Then,

    /// `And`
    And,

    /// `But`
    But,

    /// `*`
    #[display("*")]
    #[serde(rename = "*")]
    Any,
}

impl From<&str> for Keyword {
    fn from(s: &str) -> Self {
        match s.trim() {
            "Given" => Self::Given,
            "When" => Self::When,
            "Then" => Self::Then,
            "And" => Self::And,
            "But" => Self::But,
            _ => Self::Any,
        }
    }
}

/// Single [`Step`][1] of a [`Scenario`] or [`Background`].
///
/// [1]: https://cucumber.io/docs/gherkin/reference#steps
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Step {
    /// [`Keyword`] of this [`Step`].
    pub keyword: Keyword,

    /// Text following the [`Keyword`], matched against step definitions.
    pub text: String,

    /// Attached doc string, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,

    /// Attached data table, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<Vec<String>>>,

    /// Source line of this [`Step`].
    pub line: usize,
}

impl Step {
    /// Creates a new [`Step`] with the given [`Keyword`] and `text`.
    #[must_use]
    pub fn new(keyword: Keyword, text: impl Into<String>) -> Self {
        Self {
            keyword,
            text: text.into(),
            docstring: None,
            table: None,
            line: 0,
        }
    }

    /// Attaches a doc string to this [`Step`].
    #[must_use]
    pub fn with_docstring(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }
}
