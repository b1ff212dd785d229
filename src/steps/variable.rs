// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `def` and `print` steps.

use futures::{future::LocalBoxFuture, FutureExt as _};
use lazy_regex::regex;
use serde_json::Value;

use crate::{
    assertion,
    step::{self, Args, Definition},
    Context,
};

/// Step [`Definition`]s of this module.
#[must_use]
pub fn definitions() -> Vec<Definition> {
    vec![
        Definition::new(regex!(r"^def\s+(\w+)\s*=\s*(.+)$"), def)
            .describe("Define a variable from an expression"),
        Definition::new(regex!(r"^print\s+(.+)$"), print).describe("Print a value"),
    ]
}

/// Evaluates a variable expression: a response or variable path, a relaxed
/// JSON literal, or a (possibly quoted) string.
pub(crate) fn resolve(ctx: &Context, expr: &str) -> Value {
    let expr = expr.trim();
    ctx.lookup(expr).unwrap_or_else(|| assertion::parse(expr))
}

fn def<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let name = args.group(0)?;
        let expr = args.group(1)?;
        if expr.trim() == "eval" {
            return Err(step::Error::other(format!(
                "'def {name} = eval' requires a script engine",
            )));
        }
        let value = resolve(ctx, expr);
        _ = ctx.variables.insert(name.to_owned(), value);
        Ok(())
    }
    .boxed_local()
}

fn print<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let line = match resolve(ctx, args.group(0)?) {
            Value::String(s) => s,
            v @ (Value::Array(_) | Value::Object(_)) => serde_json::to_string_pretty(&v)?,
            v => v.to_string(),
        };
        ctx.print(line);
        Ok(())
    }
    .boxed_local()
}
