// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `browser ...` steps driving a [`Client`].
//!
//! [`Client`]: crate::browser::Client

use std::rc::Rc;

use futures::{future::LocalBoxFuture, FutureExt as _};
use lazy_regex::regex;
use serde_json::Value;

use crate::{
    browser::{self, Launcher},
    step::{self, Args, Definition},
    value, Context,
};

use super::text_arg;

/// Step [`Definition`]s of this module, launching [`browser::Client`]s with
/// the given [`Launcher`].
#[must_use]
pub fn definitions(launcher: &Rc<Launcher>) -> Vec<Definition> {
    let launcher = Rc::clone(launcher);

    vec![
        Definition::new(regex!(r"^browser\s+open\s+(.+)$"), move |ctx, args| {
            let launcher = Rc::clone(&launcher);
            async move {
                let url = text_arg(ctx, &args, 0)?;
                if ctx.browser.is_none() {
                    let client = launcher.launch(ctx.cancellation().clone()).await?;
                    ctx.browser = Some(client);
                }
                _ = ctx.browser()?.open_tab(&url).await?;
                Ok(())
            }
            .boxed_local()
        })
        .describe("Open a new tab and navigate to URL"),
        Definition::new(regex!(r"^browser\s+navigate\s+to\s+(.+)$"), navigate)
            .describe("Navigate current tab to URL"),
        Definition::new(regex!(r"^browser\s+click\s+(.+)$"), click)
            .describe("Click an element"),
        Definition::new(regex!(r#"^browser\s+fill\s+('(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|.+?)\s+with\s+(.+)$"#), fill)
            .describe("Type text into an input element"),
        Definition::new(regex!(r#"^browser\s+text\s+('(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|.+?)\s*==\s*(.+)$"#), text_equals)
            .describe("Assert element text equals expected value"),
        Definition::new(
            regex!(r#"^browser\s+text\s+('(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|.+?)\s+contains\s+(.+)$"#),
            text_contains,
        )
        .describe("Assert element text contains expected value"),
        Definition::new(regex!(r"^browser\s+visible\s+(.+)$"), visible)
            .describe("Assert element is visible"),
        Definition::new(regex!(r"^browser\s+not\s+visible\s+(.+)$"), not_visible)
            .describe("Assert element is not visible"),
        Definition::new(regex!(r"^browser\s+screenshot$"), screenshot)
            .describe("Capture page screenshot"),
        Definition::new(regex!(r"^browser\s+wait\s+for\s+(.+)$"), wait_for)
            .describe("Wait for element to appear"),
        Definition::new(regex!(r#"^browser\s+select\s+('(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|.+?)\s+value\s+(.+)$"#), select)
            .describe("Select a dropdown option"),
        Definition::new(regex!(r"^browser\s+check\s+(.+)$"), check)
            .describe("Check a checkbox"),
        Definition::new(regex!(r"^browser\s+uncheck\s+(.+)$"), uncheck)
            .describe("Uncheck a checkbox"),
        Definition::new(regex!(r"^browser\s+press\s+(.+)$"), press)
            .describe("Press a keyboard key"),
        Definition::new(regex!(r"^browser\s+close$"), close)
            .describe("Close browser tab and detach"),
        Definition::new(regex!(r"^def\s+(\w+)\s*=\s*browser\s+text\s+(.+)$"), def_text)
            .describe("Capture element text into a variable"),
        Definition::new(
            regex!(r"^def\s+(\w+)\s*=\s*browser\s+value\s+(.+)$"),
            def_value,
        )
        .describe("Capture input value into a variable"),
    ]
}

fn navigate<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let url = text_arg(ctx, &args, 0)?;
        ctx.browser()?.navigate(&url).await?;
        Ok(())
    }
    .boxed_local()
}

fn click<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        ctx.browser()?.click(&selector).await?;
        Ok(())
    }
    .boxed_local()
}

fn fill<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        let value = text_arg(ctx, &args, 1)?;
        ctx.browser()?.fill(&selector, &value).await?;
        Ok(())
    }
    .boxed_local()
}

fn text_equals<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        let expected = text_arg(ctx, &args, 1)?;
        let actual = ctx.browser()?.text(&selector).await?;
        if actual != expected {
            return Err(step::Error::assertion(format!(
                "Expected text \"{expected}\" but got \"{actual}\"",
            )));
        }
        Ok(())
    }
    .boxed_local()
}

fn text_contains<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        let expected = text_arg(ctx, &args, 1)?;
        let actual = ctx.browser()?.text(&selector).await?;
        if !actual.contains(&expected) {
            return Err(step::Error::assertion(format!(
                "Expected text to contain \"{expected}\" but got \"{actual}\"",
            )));
        }
        Ok(())
    }
    .boxed_local()
}

/// Waits for the element to reach the `visible` state, reporting a timeout
/// as an assertion failure with the given `message`.
async fn expect_visibility(
    ctx: &mut Context,
    selector: &str,
    visible: bool,
    message: &str,
) -> Result<(), step::Error> {
    match ctx.browser()?.wait_for_visibility(selector, visible).await {
        Ok(()) => Ok(()),
        Err(browser::Error::Timeout { .. }) => {
            Err(step::Error::assertion(format!("{message}: {selector}")))
        }
        Err(e) => Err(e.into()),
    }
}

fn visible<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        expect_visibility(ctx, &selector, true, "Element is not visible").await
    }
    .boxed_local()
}

fn not_visible<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        expect_visibility(ctx, &selector, false, "Element should not be visible").await
    }
    .boxed_local()
}

fn screenshot<'a>(
    ctx: &'a mut Context,
    _: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let data = ctx.browser()?.screenshot().await?;
        ctx.set_screenshot(data);
        Ok(())
    }
    .boxed_local()
}

fn wait_for<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        _ = ctx.browser()?.wait_for(&selector).await?;
        Ok(())
    }
    .boxed_local()
}

fn select<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        let value = text_arg(ctx, &args, 1)?;
        ctx.browser()?.select(&selector, &value).await?;
        Ok(())
    }
    .boxed_local()
}

fn check<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        ctx.browser()?.check(&selector).await?;
        Ok(())
    }
    .boxed_local()
}

fn uncheck<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 0)?;
        ctx.browser()?.uncheck(&selector).await?;
        Ok(())
    }
    .boxed_local()
}

fn press<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        // Keys are never interpolated.
        let key = value::unquote(args.group(0)?).to_owned();
        ctx.browser()?.press(&key).await?;
        Ok(())
    }
    .boxed_local()
}

fn close<'a>(ctx: &'a mut Context, _: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        ctx.browser()?.close_tab().await?;
        ctx.browser = None;
        Ok(())
    }
    .boxed_local()
}

fn def_text<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 1)?;
        let text = ctx.browser()?.text(&selector).await?;
        _ = ctx
            .variables
            .insert(args.group(0)?.to_owned(), Value::String(text));
        Ok(())
    }
    .boxed_local()
}

fn def_value<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let selector = text_arg(ctx, &args, 1)?;
        let value = ctx.browser()?.value(&selector).await?;
        _ = ctx
            .variables
            .insert(args.group(0)?.to_owned(), Value::String(value));
        Ok(())
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use crate::{browser::Config, step::Registry, steps::exec};

    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_all(definitions(&Rc::new(Launcher::new(Config::default()))));
        registry
    }

    #[test]
    fn patterns_resolve_to_expected_steps() {
        let registry = registry();

        for (text, description) in [
            ("browser open 'https://example.com'", "Open a new tab and navigate to URL"),
            ("browser not visible '#spinner'", "Assert element is not visible"),
            ("browser visible '#spinner'", "Assert element is visible"),
            ("browser text 'h1' == 'Hello'", "Assert element text equals expected value"),
            ("browser text 'h1' contains 'ell'", "Assert element text contains expected value"),
            ("browser select '#country' value 'NZ'", "Select a dropdown option"),
            ("def title = browser text 'h1'", "Capture element text into a variable"),
            ("browser close", "Close browser tab and detach"),
        ] {
            let m = registry.find(text).unwrap_or_else(|| panic!("unmatched: {text}"));
            assert_eq!(m.definition.description.as_deref(), Some(description));
        }
    }

    #[test]
    fn quoted_selectors_may_contain_separators() {
        let registry = registry();

        for (text, selector, arg) in [
            ("browser text 'a == b' == 'x'", "'a == b'", "'x'"),
            (r#"browser text "x contains y" contains 'y'"#, r#""x contains y""#, "'y'"),
            ("browser fill 'input[title=\"with\"]' with 'ann'", "'input[title=\"with\"]'", "'ann'"),
            ("browser select 'select.value' value 'NZ'", "'select.value'", "'NZ'"),
            (r#"browser text button "Save" == 'Save'"#, r#"button "Save""#, "'Save'"),
        ] {
            let m = registry.find(text).unwrap_or_else(|| panic!("unmatched: {text}"));
            assert_eq!(
                m.captures.groups,
                [Some(selector.to_owned()), Some(arg.to_owned())],
                "{text}",
            );
        }
    }

    #[tokio::test]
    async fn actions_require_open_session() {
        let registry = registry();
        let mut ctx = Context::new(CancellationToken::new());

        let err = exec(&mut ctx, &registry, "browser click '#go'", None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No debugger session, use 'browser open' first");
    }
}
