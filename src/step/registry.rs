// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Ordered storage of step [`Definition`]s.

use std::slice;

use super::{Captures, Definition};

/// Ordered collection of step [`Definition`]s.
///
/// Lookup scans [`Definition`]s in registration order and the first one
/// matching wins, so more specific patterns have to be registered before the
/// generic ones they are meant to shadow.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    /// [`Definition`]s in registration order.
    definitions: Vec<Definition>,
}

/// Result of a successful [`Registry::find()`].
#[derive(Clone, Debug)]
pub struct Match<'me> {
    /// Matched [`Definition`].
    pub definition: &'me Definition,

    /// Groups captured out of the step text.
    pub captures: Captures,
}

impl Registry {
    /// Creates a new empty [`Registry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the given [`Definition`].
    pub fn register(&mut self, definition: Definition) {
        tracing::trace!(pattern = %definition.pattern, "registering step");
        self.definitions.push(definition);
    }

    /// Appends all the given [`Definition`]s preserving their order.
    pub fn register_all(
        &mut self,
        definitions: impl IntoIterator<Item = Definition>,
    ) {
        for def in definitions {
            self.register(def);
        }
    }

    /// Removes every [`Definition`] tagged with the given `source`, returning
    /// how many were removed.
    pub fn unregister_by_source(&mut self, source: &str) -> usize {
        let before = self.definitions.len();
        self.definitions
            .retain(|def| def.source.as_deref() != Some(source));
        let removed = before - self.definitions.len();
        if removed > 0 {
            tracing::debug!(source, removed, "unregistered steps");
        }
        removed
    }

    /// Removes all [`Definition`]s.
    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    /// Number of registered [`Definition`]s.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Indicates whether this [`Registry`] has no [`Definition`]s.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterates over [`Definition`]s in registration order.
    pub fn iter(&self) -> slice::Iter<'_, Definition> {
        self.definitions.iter()
    }

    /// Finds the first [`Definition`] whose pattern matches the whole `text`.
    ///
    /// Patterns are implicitly anchored, so a pattern matching only a part of
    /// the `text` is not considered a match.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<Match<'_>> {
        self.definitions.iter().find_map(|def| {
            let caps = def.captures(text)?;
            Some(Match {
                definition: def,
                captures: def.extract(&caps),
            })
        })
    }
}

impl<'me> IntoIterator for &'me Registry {
    type Item = &'me Definition;
    type IntoIter = slice::Iter<'me, Definition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use futures::{future::LocalBoxFuture, FutureExt as _};
    use regex::Regex;

    use crate::{
        step::{Args, Error},
        Context,
    };

    use super::*;

    fn noop<'a>(
        _: &'a mut Context,
        _: Args,
    ) -> LocalBoxFuture<'a, Result<(), Error>> {
        async { Ok(()) }.boxed_local()
    }

    fn def(pattern: &str) -> Definition {
        Definition::new(&Regex::new(pattern).unwrap(), noop)
    }

    #[test]
    fn first_match_wins() {
        let mut registry = Registry::new();
        registry.register(def(r"^def (\w+) = eval$").describe("eval"));
        registry.register(def(r"^def (\w+) = (.+)$").describe("generic"));

        let m = registry.find("def x = eval").unwrap();
        assert_eq!(m.definition.description.as_deref(), Some("eval"));

        let m = registry.find("def x = 42").unwrap();
        assert_eq!(m.definition.description.as_deref(), Some("generic"));
        assert_eq!(
            m.captures.groups,
            [Some("x".to_owned()), Some("42".to_owned())],
        );
    }

    #[test]
    fn requires_whole_text_match() {
        let mut registry = Registry::new();
        registry.register(def(r"status \d+"));

        assert!(registry.find("status 200").is_some());
        assert!(registry.find("the status 200 is fine").is_none());
    }

    #[test]
    fn alternation_matches_whole_text() {
        let mut registry = Registry::new();
        registry.register(def(r"a|ab"));
        registry.register(def(r"(x)|(xy)"));

        assert!(registry.find("ab").is_some());
        assert!(registry.find("abc").is_none());
        let m = registry.find("xy").unwrap();
        assert_eq!(m.captures.groups, [None, Some("xy".to_owned())]);
    }

    #[test]
    fn unmatched_is_none() {
        let mut registry = Registry::new();
        registry.register(def(r"^url (.+)$"));

        assert!(registry.find("method GET").is_none());
    }

    #[test]
    fn unregisters_by_source() {
        let mut registry = Registry::new();
        registry.register_all([
            def("^a$").source("script-custom"),
            def("^b$"),
            def("^c$").source("script-custom"),
        ]);

        assert_eq!(registry.unregister_by_source("script-custom"), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.find("b").is_some());
        assert_eq!(registry.unregister_by_source("script-custom"), 0);

        registry.clear();
        assert!(registry.is_empty());
    }
}
