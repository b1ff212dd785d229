// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! BDD runner executing [Gherkin] features against HTTP APIs and live web
//! pages.
//!
//! A [`Session`] parses a feature, and its [`Runner`] executes every
//! scenario step by step, matching step text against the step
//! [`Registry`] populated by the loaded [`Plugin`]s:
//! - [`BuiltinPlugin`]: HTTP requests, `match` assertions, variables;
//! - [`BrowserPlugin`]: browser automation over the Chrome DevTools
//!   Protocol, with an ambiguity-tolerant [`Selector`] language and
//!   auto-waiting;
//! - [`ScriptPlugin`]: steps backed by a pluggable script [`Engine`].
//!
//! ```rust,no_run
//! # use stepdriver::{browser, Session};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut session = Session::new();
//! session.load_defaults(browser::Config::default()).await.unwrap();
//! let result = session
//!     .execute(
//!         "Feature: Health\n  Scenario: up\n    \
//!          Given url 'http://localhost:8080/health'\n    \
//!          When method GET\n    \
//!          Then status 200\n",
//!     )
//!     .await;
//! # _ = result;
//! # }
//! ```
//!
//! [Gherkin]: https://cucumber.io/docs/gherkin/reference
//! [`Engine`]: plugin::script::Engine
//! [`Registry`]: step::Registry
//! [`Selector`]: browser::Selector

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod assertion;
pub mod browser;
pub mod cli;
pub mod context;
pub mod event;
pub mod feature;
pub mod http;
pub mod parser;
pub mod plugin;
pub mod result;
pub mod runner;
pub mod session;
pub mod step;
pub mod steps;
pub mod tag;
pub mod value;
pub mod writer;

#[doc(inline)]
pub use self::{
    context::Context,
    event::Event,
    feature::{Feature, Filter},
    plugin::{BrowserPlugin, BuiltinPlugin, Plugin, ScriptPlugin},
    result::{FeatureResult, ScenarioResult, Stats, Status, StepResult},
    runner::{Hooks, Runner},
    session::{CancelHandle, Session, Summary},
    writer::Writer,
};
