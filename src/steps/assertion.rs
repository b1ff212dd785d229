// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `match` assertion steps.

use futures::{future::LocalBoxFuture, FutureExt as _};
use lazy_regex::{regex, regex_is_match};
use serde_json::Value;

use crate::{
    assertion::{self, deep_match},
    step::{self, Args, Definition},
    Context,
};

/// Step [`Definition`]s of this module.
#[must_use]
pub fn definitions() -> Vec<Definition> {
    vec![
        Definition::new(regex!(r"^match\s+(.+?)\s*==\s*(.+)$"), equals)
            .describe("Assert a value deeply equals an expression"),
        Definition::new(regex!(r"^match\s+(.+?)\s+contains\s+(.+)$"), contains)
            .describe("Assert a value contains an expression"),
        Definition::new(regex!(r"^match\s+(.+?)\s*!=\s*null$"), not_null)
            .describe("Assert a value is present and not null"),
    ]
}

/// Resolves the expected side of a `match`: a bare variable path yields the
/// variable, anything else is parsed as an [`assertion`] expression.
fn expected(ctx: &Context, raw: &str) -> Value {
    let raw = raw.trim();
    let is_path = regex_is_match!(r"^[A-Za-z_]\w*(\.\w+|\[\d+\])*$", raw)
        && !matches!(raw, "null" | "true" | "false");
    is_path
        .then(|| ctx.lookup(raw))
        .flatten()
        .unwrap_or_else(|| assertion::parse(raw))
}

fn equals<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let actual = ctx.lookup(args.group(0)?);
        let expected = expected(ctx, args.group(1)?);
        deep_match(actual.as_ref(), &expected, false).map_err(step::Error::assertion)
    }
    .boxed_local()
}

fn contains<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let actual = ctx.lookup(args.group(0)?);
        let expected = expected(ctx, args.group(1)?);
        deep_match(actual.as_ref(), &expected, true).map_err(step::Error::assertion)
    }
    .boxed_local()
}

fn not_null<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let path = args.group(0)?;
        match ctx.lookup(path) {
            Some(v) if !v.is_null() => Ok(()),
            actual => Err(step::Error::assertion(format!(
                "Expected \"{path}\" to not be null but it was {}",
                actual.map_or_else(|| "nothing".to_owned(), |v| v.to_string()),
            ))),
        }
    }
    .boxed_local()
}
