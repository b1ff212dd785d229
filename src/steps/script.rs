// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scripting steps: `eval`, `def x = eval` and `script '<name>'`.

use std::rc::Rc;

use futures::FutureExt as _;
use lazy_regex::regex;

use crate::{
    plugin::script::{Engine, Error, Scripts},
    step::{self, Definition},
};

/// Step [`Definition`]s executing code with the given `engine`, with named
/// scripts looked up in `scripts`.
///
/// `def x = eval` goes before any generic `def` step, so it has to be
/// registered first.
#[must_use]
pub fn definitions(engine: &Rc<dyn Engine>, scripts: &Scripts) -> Vec<Definition> {
    let eval_engine = Rc::clone(engine);
    let def_engine = Rc::clone(engine);
    let script_engine = Rc::clone(engine);
    let scripts = Rc::clone(scripts);

    vec![
        Definition::new(regex!(r"^def\s+(\w+)\s*=\s*eval$"), move |ctx, args| {
            let engine = Rc::clone(&def_engine);
            async move {
                let code = args.docstring.as_deref().ok_or_else(|| {
                    step::Error::missing("'def ... = eval' step requires a doc string")
                })?;
                let value = engine.execute(code, ctx).await?;
                _ = ctx.variables.insert(args.group(0)?.to_owned(), value);
                Ok(())
            }
            .boxed_local()
        })
        .describe("Execute a script and capture its result into a variable"),
        Definition::new(regex!(r"^eval$"), move |ctx, args| {
            let engine = Rc::clone(&eval_engine);
            async move {
                let code = args.docstring.as_deref().ok_or_else(|| {
                    step::Error::other("'eval' step requires a doc string with script code")
                })?;
                _ = engine.execute(code, ctx).await?;
                Ok(())
            }
            .boxed_local()
        })
        .describe("Execute an inline script"),
        Definition::new(regex!(r"^script\s+'([^']+)'$"), move |ctx, args| {
            let engine = Rc::clone(&script_engine);
            let scripts = Rc::clone(&scripts);
            async move {
                let name = args.group(0)?;
                let code = scripts
                    .borrow()
                    .iter()
                    .find(|s| s.name == name && s.enabled)
                    .map(|s| s.code.clone())
                    .ok_or_else(|| Error::NotFound { name: name.to_owned() })?;
                _ = engine.execute(&code, ctx).await?;
                Ok(())
            }
            .boxed_local()
        })
        .describe("Execute a stored script by name"),
    ]
}
