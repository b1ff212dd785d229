// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Command surface over the execution engine: `parse`, `execute` and
//! `cancel`, with progress reported as a stream of [`Event`]s.

use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    browser,
    event::Event,
    feature::{Feature, Filter},
    parser::{self, ParseError},
    plugin::{self, BrowserPlugin, BuiltinPlugin, Manager, Plugin},
    result::FeatureResult,
    step::Registry,
    Runner,
};

/// Outcome of a successful [`Session::parse`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Name of the parsed feature.
    pub feature_name: String,

    /// Number of concrete scenarios, with outlines counted once per examples
    /// row.
    pub scenario_count: usize,
}

/// Thread-safe handle cancelling the run currently in progress in a
/// [`Session`].
///
/// Cancelling when nothing runs is a no-op, and doesn't affect later runs.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<Mutex<CancellationToken>>);

impl CancelHandle {
    /// Requests cancellation of the current run.
    pub fn cancel(&self) {
        self.current().cancel();
    }

    /// Replaces the token of the current run with a fresh one.
    fn renew(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current() = token.clone();
        token
    }

    fn current(&self) -> MutexGuard<'_, CancellationToken> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Execution session: a step [`Registry`] populated by loaded [`Plugin`]s,
/// running features one at a time.
#[derive(Debug)]
pub struct Session {
    /// Engine running the features, with the [`Manager`] as its hooks.
    runner: Runner<Manager>,

    /// Subscribers receiving [`Event`]s.
    subscribers: Vec<mpsc::UnboundedSender<Event>>,

    /// Cancellation of the current run.
    cancel: CancelHandle,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a new [`Session`] without any [`Plugin`]s loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runner: Runner::new(Registry::new()).with_hooks(Manager::new()),
            subscribers: Vec::new(),
            cancel: CancelHandle::default(),
        }
    }

    /// Loads the [`BrowserPlugin`] with the given [`browser::Config`] followed
    /// by the [`BuiltinPlugin`].
    ///
    /// A [`ScriptPlugin`], if any, should be loaded before calling this, so
    /// its `def x = eval` step shadows the generic `def` one.
    ///
    /// # Errors
    ///
    /// If any of them is loaded already.
    ///
    /// [`ScriptPlugin`]: plugin::ScriptPlugin
    pub async fn load_defaults(
        &mut self,
        browser: browser::Config,
    ) -> Result<(), plugin::Error> {
        self.load_plugin(BrowserPlugin::new(browser)).await?;
        self.load_plugin(BuiltinPlugin).await
    }

    /// Loads the given [`Plugin`], registering its steps after the already
    /// registered ones.
    ///
    /// # Errors
    ///
    /// See [`Manager::load`].
    pub async fn load_plugin<P: Plugin + 'static>(
        &mut self,
        plugin: P,
    ) -> Result<(), plugin::Error> {
        let (registry, manager) = self.runner.parts_mut();
        manager.load(plugin, registry).await
    }

    /// Unloads the [`Plugin`] with the given `id`, unregistering the steps it
    /// tagged with its id.
    ///
    /// Returns `false` if no such [`Plugin`] is loaded.
    ///
    /// # Errors
    ///
    /// See [`Manager::unload`].
    pub async fn unload_plugin(&mut self, id: &str) -> Result<bool, plugin::Error> {
        let (registry, manager) = self.runner.parts_mut();
        let removed = registry.unregister_by_source(id);
        tracing::debug!(plugin = %id, removed, "plugin steps unregistered");
        manager.unload(id).await
    }

    /// Ids of the loaded [`Plugin`]s, in load order.
    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.runner.hooks().loaded()
    }

    /// Returns the step [`Registry`].
    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.runner.registry()
    }

    /// Subscribes to [`Event`]s of the following runs.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Returns a [`CancelHandle`] of this [`Session`], usable from any thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancels the run in progress, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Parses the given `source` without executing it.
    ///
    /// # Errors
    ///
    /// If the `source` is malformed.
    pub fn parse(&self, source: &str) -> Result<Summary, Vec<ParseError>> {
        parser::parse(source).map(|f| Summary {
            scenario_count: f.count_scenarios(),
            feature_name: f.name,
        })
    }

    /// Parses and executes the given `source`.
    ///
    /// Emits [`Event::ParseFailed`] and returns [`None`] if the `source` is
    /// malformed.
    pub async fn execute(&mut self, source: &str) -> Option<FeatureResult> {
        self.execute_filtered(source, &Filter::default()).await
    }

    /// Parses and executes the given `source`, running only the scenarios
    /// passing the given [`Filter`].
    ///
    /// Emits [`Event::ParseFailed`] and returns [`None`] if the `source` is
    /// malformed.
    pub async fn execute_filtered(
        &mut self,
        source: &str,
        filter: &Filter,
    ) -> Option<FeatureResult> {
        match parser::parse(source) {
            Ok(feature) => Some(self.run(&feature.filtered(filter)).await),
            Err(errors) => {
                tracing::warn!(errors = errors.len(), "feature failed to parse");
                self.emit(Event::ParseFailed { errors });
                None
            }
        }
    }

    /// Reads and executes the `.feature` file at the given `path`.
    ///
    /// Emits [`Event::Error`] and returns [`None`] if the file cannot be read.
    pub async fn execute_path(
        &mut self,
        path: impl AsRef<Path>,
        filter: &Filter,
    ) -> Option<FeatureResult> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(source) => self.execute_filtered(&source, filter).await,
            Err(e) => {
                self.emit(Event::Error {
                    message: format!("Could not read {}: {e}", path.display()),
                });
                None
            }
        }
    }

    /// Executes an already parsed [`Feature`].
    ///
    /// Emits [`Event::Started`], the progress [`Event`]s and finally either
    /// [`Event::Done`] or, if the run has been cancelled,
    /// [`Event::Cancelled`].
    pub async fn run(&mut self, feature: &Feature) -> FeatureResult {
        let token = self.cancel.renew();
        self.runner.set_cancellation(token.clone());

        tracing::debug!(feature = %feature.name, "execution started");
        self.emit(Event::Started {
            feature_name: feature.name.clone(),
        });

        let subscribers = &mut self.subscribers;
        let result = self
            .runner
            .run(feature, |ev| broadcast(subscribers, ev))
            .await;

        if token.is_cancelled() {
            tracing::info!(feature = %feature.name, "execution cancelled");
            self.emit(Event::Cancelled);
        } else {
            self.emit(Event::Done {
                result: result.clone(),
            });
        }
        result
    }

    /// Unloads every [`Plugin`].
    ///
    /// # Errors
    ///
    /// See [`Manager::destroy`].
    pub async fn destroy(&mut self) -> Result<(), plugin::Error> {
        self.runner.hooks_mut().destroy().await
    }

    fn emit(&mut self, ev: Event) {
        broadcast(&mut self.subscribers, ev);
    }
}

/// Sends the given [`Event`] to every live subscriber, forgetting the gone
/// ones.
fn broadcast(subscribers: &mut Vec<mpsc::UnboundedSender<Event>>, ev: Event) {
    subscribers.retain(|tx| tx.send(ev.clone()).is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE: &str = "\
Feature: Summary
  Scenario: plain
    Given print 'x'

  Scenario Outline: outlined
    Given print '<v>'

    Examples:
      | v |
      | 1 |
      | 2 |
";

    #[test]
    fn parse_summarizes() {
        let session = Session::new();

        let summary = session.parse(FEATURE).unwrap();

        assert_eq!(
            summary,
            Summary {
                feature_name: "Summary".into(),
                scenario_count: 3,
            },
        );
        assert!(session.parse("not gherkin at all").is_err());
    }

    #[test]
    fn cancel_handle_renews() {
        let handle = CancelHandle::default();
        let first = handle.renew();

        handle.cancel();
        let second = handle.renew();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn unparsable_source_emits_parse_failed() {
        let mut session = Session::new();
        let mut rx = session.subscribe();

        assert!(session.execute("this is not gherkin at all").await.is_none());

        assert!(matches!(rx.recv().await, Some(Event::ParseFailed { .. })));
    }

    #[tokio::test]
    async fn default_plugins_load_in_order() {
        let mut session = Session::new();

        session.load_defaults(browser::Config::default()).await.unwrap();

        assert_eq!(
            session.plugins().collect::<Vec<_>>(),
            ["browser-cdp", "built-in-http"],
        );
        assert!(session.unload_plugin("browser-cdp").await.unwrap());
        assert!(session.registry().find("browser close").is_none());
        assert!(session.registry().find("status 200").is_some());
    }
}
