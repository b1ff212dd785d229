// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Plugin`] with the HTTP, assertion and variable steps.

use async_trait::async_trait;

use crate::{step::Definition, steps};

use super::Plugin;

/// Source tag of the [`BuiltinPlugin`] step [`Definition`]s.
pub const SOURCE: &str = "built-in-http";

/// [`Plugin`] providing the `url`/`method`/`status`, `match` and
/// `def`/`print` steps.
///
/// Its `def` step accepts any expression, so [`Plugin`]s with more specific
/// `def ... = ...` steps have to be loaded before this one.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinPlugin;

#[async_trait(?Send)]
impl Plugin for BuiltinPlugin {
    fn id(&self) -> &str {
        SOURCE
    }

    fn name(&self) -> &str {
        "Built-in HTTP"
    }

    fn step_definitions(&self) -> Vec<Definition> {
        steps::http::definitions()
            .into_iter()
            .chain(steps::assertion::definitions())
            .chain(steps::variable::definitions())
            .map(|def| def.source(SOURCE))
            .collect()
    }
}
