// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HTTP request building and execution steps.

use futures::{future::LocalBoxFuture, FutureExt as _};
use lazy_regex::regex;
use reqwest::Method;
use serde_json::Value;

use crate::{
    step::{self, Args, Definition},
    Context,
};

use super::text_arg;

/// Step [`Definition`]s of this module.
#[must_use]
pub fn definitions() -> Vec<Definition> {
    vec![
        Definition::new(regex!(r"^url\s+(.+)$"), url).describe("Set the request URL"),
        Definition::new(
            regex!(r"(?i)^method\s+(GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS)$"),
            method,
        )
        .describe("Execute the request with the given method"),
        Definition::new(regex!(r"^header\s+(.+?)\s*=\s*(.+)$"), header)
            .describe("Set a request header"),
        Definition::new(regex!(r"^param\s+(.+?)\s*=\s*(.+)$"), param)
            .describe("Set a query parameter"),
        Definition::new(regex!(r"^request\s+(.+)$"), request)
            .describe("Set an inline request body"),
        Definition::new(regex!(r"^request$"), request_docstring)
            .describe("Set the request body from the doc string"),
        Definition::new(regex!(r"^status\s+(\d+)$"), status)
            .describe("Assert the response status code"),
    ]
}

/// Parses a request body as JSON, keeping it as a string otherwise.
fn body(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn url<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        ctx.request.url = text_arg(ctx, &args, 0)?;
        Ok(())
    }
    .boxed_local()
}

fn header<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let name = text_arg(ctx, &args, 0)?;
        let value = text_arg(ctx, &args, 1)?;
        _ = ctx.request.headers.insert(name, value);
        Ok(())
    }
    .boxed_local()
}

fn param<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let name = text_arg(ctx, &args, 0)?;
        let value = text_arg(ctx, &args, 1)?;
        _ = ctx.request.params.insert(name, value);
        Ok(())
    }
    .boxed_local()
}

fn request<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let raw = ctx.interpolate(args.group(0)?.trim());
        ctx.request.body = Some(body(raw));
        Ok(())
    }
    .boxed_local()
}

fn request_docstring<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let raw = ctx.interpolate(args.docstring()?.trim());
        ctx.request.body = Some(body(raw));
        Ok(())
    }
    .boxed_local()
}

fn method<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let name = args.group(0)?.to_ascii_uppercase();
        ctx.request.method = Method::from_bytes(name.as_bytes())
            .map_err(|e| step::Error::other(e.to_string()))?;

        let cancel = ctx.cancellation().clone();
        let response = ctx.request.send(&cancel).await?;
        ctx.set_response(response);
        Ok(())
    }
    .boxed_local()
}

fn status<'a>(
    ctx: &'a mut Context,
    args: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        let expected = args
            .group(0)?
            .parse::<u16>()
            .map_err(|e| step::Error::other(format!("Invalid status code: {e}")))?;
        let actual = ctx
            .response()
            .ok_or_else(|| {
                step::Error::assertion(
                    "No response available. Did you execute a request with 'method'?",
                )
            })?
            .status;
        if actual != expected {
            return Err(step::Error::assertion(format!(
                "Expected status {expected} but got {actual}",
            )));
        }
        Ok(())
    }
    .boxed_local()
}
