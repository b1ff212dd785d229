// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step [`Definition`]s of the bundled [`Plugin`]s.
//!
//! Each module exposes a `definitions()` function returning its
//! [`Definition`]s in matching priority order.
//!
//! [`Definition`]: crate::step::Definition
//! [`Plugin`]: crate::plugin::Plugin

pub mod assertion;
pub mod browser;
pub mod http;
pub mod script;
pub mod variable;

use crate::{
    step::{self, Args},
    value, Context,
};

/// Returns the captured group at `index`, unquoted and with `#{path}` tokens
/// substituted.
pub(crate) fn text_arg(
    ctx: &Context,
    args: &Args,
    index: usize,
) -> Result<String, step::Error> {
    Ok(ctx.interpolate(value::unquote(args.group(index)?)))
}

/// Matches the given step `text` in the `registry` and executes it.
#[cfg(test)]
pub(crate) async fn exec(
    ctx: &mut Context,
    registry: &step::Registry,
    text: &str,
    docstring: Option<&str>,
) -> Result<(), step::Error> {
    let m = registry
        .find(text)
        .ok_or_else(|| step::Error::Unmatched { text: text.into() })?;
    let handler = std::rc::Rc::clone(&m.definition.handler);
    let args = Args {
        text: text.into(),
        captures: m.captures,
        docstring: docstring.map(Into::into),
        table: None,
    };
    handler(ctx, args).await
}
