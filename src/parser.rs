// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Adapter turning [`gherkin`] source text into a [`Feature`].

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::with_trait::{Display, Error};
use lazy_regex::regex_captures;
use serde::Serialize;

use crate::feature::{Background, Examples, Feature, Keyword, Scenario, Step};

/// Error of parsing `.feature` source.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq, Serialize)]
#[display("{message} ({line}:{column})")]
pub struct ParseError {
    /// Human-readable description.
    #[error(not(source))]
    pub message: String,

    /// 1-based line the error was detected at.
    pub line: usize,

    /// 1-based column the error was detected at.
    pub column: usize,
}

impl ParseError {
    /// Builds a [`ParseError`] out of a raw parser message, extracting the
    /// `line:column` position from it when present.
    fn from_message(message: String) -> Self {
        let (line, column) = regex_captures!(r"(\d+):(\d+)", &message)
            .and_then(|(_, l, c)| Some((l.parse().ok()?, c.parse().ok()?)))
            .unwrap_or((1, 1));
        Self { message, line, column }
    }
}

/// Parses the given `source` into a [`Feature`].
///
/// # Errors
///
/// If the `source` isn't a valid [`gherkin`] document.
pub fn parse(source: impl AsRef<str>) -> Result<Feature, Vec<ParseError>> {
    let mut source = source.as_ref().to_owned();
    if !source.ends_with('\n') {
        source.push('\n');
    }
    if source.trim().is_empty() {
        return Err(vec![ParseError {
            message: "No feature found in document".into(),
            line: 1,
            column: 1,
        }]);
    }

    gherkin::Feature::parse(&source, gherkin::GherkinEnv::default())
        .map(Feature::from)
        .map_err(|e| vec![ParseError::from_message(e.to_string())])
}

/// Reads and parses the `.feature` file at the given `path`.
///
/// # Errors
///
/// If the file cannot be read, or isn't a valid [`gherkin`] document.
pub fn parse_path(path: impl AsRef<Path>) -> Result<Feature, Vec<ParseError>> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e: io::Error| {
        vec![ParseError {
            message: format!("Could not read {}: {e}", path.display()),
            line: 0,
            column: 0,
        }]
    })?;
    parse(source)
}

/// Expands the given `path` into the `.feature` files to run: a file is
/// taken as is, a directory is walked recursively.
///
/// Files are returned sorted by path.
///
/// # Errors
///
/// If the directory walk cannot be set up.
pub fn feature_files(
    path: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, globwalk::GlobError> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![path.to_owned()]);
    }
    let mut files = globwalk::GlobWalkerBuilder::new(path, "*.feature")
        .case_insensitive(true)
        .build()?
        .filter_map(Result::ok)
        .map(globwalk::DirEntry::into_path)
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

impl From<gherkin::Feature> for Feature {
    fn from(f: gherkin::Feature) -> Self {
        let mut background = f.background.map(Background::from);
        let mut scenarios =
            f.scenarios.into_iter().map(Scenario::from).collect::<Vec<_>>();
        for rule in f.rules {
            if let Some(bg) = rule.background {
                background = Some(bg.into());
            }
            scenarios.extend(rule.scenarios.into_iter().map(Scenario::from));
        }

        Self {
            name: f.name,
            description: f.description.unwrap_or_default().trim().to_owned(),
            tags: f.tags,
            background,
            scenarios,
            line: f.position.line,
        }
    }
}

impl From<gherkin::Background> for Background {
    fn from(bg: gherkin::Background) -> Self {
        Self {
            name: bg.name,
            steps: bg.steps.into_iter().map(Step::from).collect(),
            line: bg.position.line,
        }
    }
}

impl From<gherkin::Scenario> for Scenario {
    fn from(sc: gherkin::Scenario) -> Self {
        Self {
            name: sc.name,
            tags: sc.tags,
            steps: sc.steps.into_iter().map(Step::from).collect(),
            examples: sc.examples.into_iter().map(Examples::from).collect(),
            line: sc.position.line,
        }
    }
}

impl From<gherkin::Examples> for Examples {
    fn from(ex: gherkin::Examples) -> Self {
        let mut rows = ex.table.map(|t| t.rows).unwrap_or_default();
        let header = if rows.is_empty() { Vec::new() } else { rows.remove(0) };
        Self {
            name: ex.name.unwrap_or_default(),
            tags: ex.tags,
            header,
            rows,
            line: ex.position.line,
        }
    }
}

impl From<gherkin::Step> for Step {
    fn from(st: gherkin::Step) -> Self {
        Self {
            keyword: Keyword::from(st.keyword.as_str()),
            text: st.value,
            docstring: st.docstring,
            table: st.table.map(|t| t.rows),
            line: st.position.line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
@api
Feature: Users
  Checks the users endpoint.

  Background:
    Given url 'http://localhost/users'

  Scenario: list
    When method GET
    Then status 200

  Scenario Outline: one
    Given param id = '<id>'
    When method GET
    Then match response == """
      {"id": <id>}
      """

    Examples:
      | id |
      | 1  |
      | 2  |
"#;

    #[test]
    fn parses_structure() {
        let feature = parse(SOURCE).unwrap();

        assert_eq!(feature.name, "Users");
        assert_eq!(feature.description, "Checks the users endpoint.");
        assert_eq!(feature.tags, ["api"]);
        assert_eq!(feature.background_steps().len(), 1);
        assert_eq!(feature.scenarios.len(), 2);
        assert_eq!(feature.count_scenarios(), 3);
    }

    #[test]
    fn parses_steps() {
        let feature = parse(SOURCE).unwrap();
        let list = &feature.scenarios[0];

        assert_eq!(list.steps[0].keyword, Keyword::When);
        assert_eq!(list.steps[0].text, "method GET");
        assert_eq!(list.steps[1].text, "status 200");
        assert!(list.steps[0].line > 0);
    }

    #[test]
    fn parses_examples() {
        let feature = parse(SOURCE).unwrap();
        let outline = &feature.scenarios[1];

        assert_eq!(outline.examples[0].header, ["id"]);
        assert_eq!(outline.examples[0].rows, [["1"], ["2"]]);
        assert!(outline.steps[2].docstring.is_some());
    }

    #[test]
    fn rejects_garbage() {
        let errors = parse("this is not gherkin at all").unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].line >= 1);
    }

    #[test]
    fn rejects_empty_source() {
        let errors = parse("   ").unwrap_err();

        assert_eq!(errors[0].message, "No feature found in document");
    }

    #[test]
    fn finds_feature_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.feature", "nested/a.FEATURE", "notes.md"] {
            fs::write(dir.path().join(name), SOURCE).unwrap();
        }

        let files = feature_files(dir.path()).unwrap();

        assert_eq!(
            files,
            [dir.path().join("b.feature"), dir.path().join("nested/a.FEATURE")],
        );
        assert_eq!(
            feature_files(dir.path().join("b.feature")).unwrap(),
            [dir.path().join("b.feature")],
        );
    }

    #[test]
    fn extracts_position_from_message() {
        let err = ParseError::from_message("error at 4:7: expected x".into());

        assert_eq!((err.line, err.column), (4, 7));
    }
}
