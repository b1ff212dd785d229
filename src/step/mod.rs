// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step [`Definition`]s and the [`Registry`] matching step text against them.
//!
//! - [`registry`]: ordered [`Definition`]s storage with first-match lookup
//! - [`error`]: [`Error`]s a step handler may fail with

pub mod error;
pub mod registry;

use std::{collections::HashMap, fmt, rc::Rc};

use derive_more::with_trait::Debug;
use futures::future::LocalBoxFuture;
use regex::Regex;

use crate::Context;

pub use self::{
    error::Error,
    registry::{Match, Registry},
};

/// Asynchronous step handler.
///
/// Implemented for every suitable [`Fn`] closure, so a handler is usually
/// written as:
/// ```rust
/// # use futures::FutureExt as _;
/// # use stepdriver::step::{Args, Error};
/// # use stepdriver::Context;
/// fn handler(
///     ctx: &mut Context,
///     args: Args,
/// ) -> futures::future::LocalBoxFuture<'_, Result<(), Error>> {
///     async move {
///         ctx.print(args.group(0)?);
///         Ok(())
///     }
///     .boxed_local()
/// }
/// ```
pub trait StepFn:
    for<'a> Fn(&'a mut Context, Args) -> LocalBoxFuture<'a, Result<(), Error>>
{
}

impl<F> StepFn for F where
    F: for<'a> Fn(&'a mut Context, Args) -> LocalBoxFuture<'a, Result<(), Error>>
{
}

/// Shared pointer to a [`StepFn`].
pub type Handler = Rc<dyn StepFn>;

/// Step definition: a [`Regex`] pattern, its [`Handler`] and metadata.
#[derive(Clone, Debug)]
pub struct Definition {
    /// [`Regex`] the whole step text has to match.
    pub pattern: Regex,

    /// [`Definition::pattern`] anchored at both ends.
    #[debug(skip)]
    whole: Regex,

    /// [`Handler`] invoked on a match.
    #[debug("{:p}", Rc::as_ptr(handler))]
    pub handler: Handler,

    /// Human-readable description.
    pub description: Option<String>,

    /// Tag of whoever contributed this [`Definition`], used for bulk
    /// [unregistering](Registry::unregister_by_source).
    pub source: Option<String>,
}

impl Definition {
    /// Creates a new [`Definition`] out of the given `pattern` and `handler`.
    #[must_use]
    pub fn new<F>(pattern: &Regex, handler: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut Context,
                Args,
            ) -> LocalBoxFuture<'a, Result<(), Error>>
            + 'static,
    {
        let whole = Regex::new(&format!("^(?:{})$", pattern.as_str()))
            .unwrap_or_else(|_| pattern.clone());
        Self {
            pattern: pattern.clone(),
            whole,
            handler: Rc::new(handler),
            description: None,
            source: None,
        }
    }

    /// Attaches a human-readable description to this [`Definition`].
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Tags this [`Definition`] with the given `source`.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Matches the whole `text` against this [`Definition::pattern`].
    pub(crate) fn captures<'t>(&self, text: &'t str) -> Option<regex::Captures<'t>> {
        self.whole.captures(text)
    }

    /// Extracts [`Captures`] out of a [`Definition::captures()`] match.
    pub(crate) fn extract(&self, caps: &regex::Captures<'_>) -> Captures {
        Captures::from_regex(&self.whole, caps)
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)?;
        if let Some(desc) = &self.description {
            write!(f, " ({desc})")?;
        }
        Ok(())
    }
}

/// Groups captured by a [`Definition::pattern`] match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Captures {
    /// Positional groups, excluding the whole match.
    ///
    /// [`None`] for a group that didn't participate in the match.
    pub groups: Vec<Option<String>>,

    /// Named groups.
    pub params: HashMap<String, String>,
}

impl Captures {
    /// Extracts [`Captures`] of the given [`regex::Captures`].
    #[must_use]
    pub fn from_regex(re: &Regex, caps: &regex::Captures<'_>) -> Self {
        let groups = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_owned()))
            .collect();
        let params = re
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name).map(|m| (name.to_owned(), m.as_str().to_owned()))
            })
            .collect();
        Self { groups, params }
    }
}

/// Arguments a [`Handler`] is invoked with.
#[derive(Clone, Debug, Default)]
pub struct Args {
    /// Full text of the matched step.
    pub text: String,

    /// [`Captures`] of the step text.
    pub captures: Captures,

    /// Doc string attached to the step, if any.
    pub docstring: Option<String>,

    /// Data table attached to the step, if any.
    pub table: Option<Vec<Vec<String>>>,
}

impl Args {
    /// Returns the positional group at `index`.
    ///
    /// # Errors
    ///
    /// If there is no such group, or it didn't participate in the match.
    pub fn group(&self, index: usize) -> Result<&str, Error> {
        self.captures
            .groups
            .get(index)
            .and_then(Option::as_deref)
            .ok_or_else(|| Error::missing(format!("capture group #{index}")))
    }

    /// Returns the positional group at `index`, if it participated in the
    /// match.
    #[must_use]
    pub fn opt_group(&self, index: usize) -> Option<&str> {
        self.captures.groups.get(index).and_then(Option::as_deref)
    }

    /// Returns the named group.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.captures.params.get(name).map(String::as_str)
    }

    /// Returns the attached doc string.
    ///
    /// # Errors
    ///
    /// If the step has no doc string.
    pub fn docstring(&self) -> Result<&str, Error> {
        self.docstring.as_deref().ok_or_else(|| {
            Error::missing(format!("'{}' step requires a doc string", self.text))
        })
    }
}
