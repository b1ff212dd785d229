// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Evaluation of [`TagOperation`]s against [`Scenario`] tags.
//!
//! [`Scenario`]: crate::feature::Scenario

use gherkin::tagexpr::TagOperation;
use sealed::sealed;

/// Extension of a [`TagOperation`] allowing to evaluate it.
#[sealed]
pub trait Ext {
    /// Evaluates this [`TagOperation`] for the given `tags`.
    ///
    /// Tags are compared ignoring a leading `@` on either side.
    #[must_use]
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone;
}

#[sealed]
impl Ext for TagOperation {
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        match self {
            Self::And(l, r) => l.eval(tags.clone()) && r.eval(tags),
            Self::Or(l, r) => l.eval(tags.clone()) || r.eval(tags),
            Self::Not(t) => !t.eval(tags),
            Self::Tag(t) => {
                let wanted = t.trim_start_matches('@');
                tags.into_iter()
                    .any(|tag| tag.as_ref().trim_start_matches('@') == wanted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_expressions() {
        let tags = ["api", "smoke"];

        let op: TagOperation = "@smoke and not @wip".parse().unwrap();
        assert!(op.eval(tags));

        let op: TagOperation = "@ui or @wip".parse().unwrap();
        assert!(!op.eval(tags));
    }
}
