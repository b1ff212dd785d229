// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Plugin`]s contributing step definitions and scenario hooks, and their
//! [`Manager`].
//!
//! - [`builtin`]: HTTP, assertion and variable steps
//! - [`browser`]: browser automation steps
//! - [`script`]: steps backed by an embedded [`script::Engine`]

pub mod browser;
pub mod builtin;
pub mod script;

use async_trait::async_trait;
use derive_more::{Debug, Display, Error, From};
use linked_hash_map::LinkedHashMap;

use crate::{
    runner::Hooks,
    step::{Definition, Registry},
    Context,
};

pub use self::{browser::BrowserPlugin, builtin::BuiltinPlugin, script::ScriptPlugin};

/// Error of a [`Plugin`] operation.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// [`Plugin`] with the same id is loaded already.
    #[display("Plugin \"{id}\" is already loaded")]
    #[from(ignore)]
    AlreadyLoaded {
        /// Id of the [`Plugin`].
        #[error(not(source))]
        id: String,
    },

    /// Browser automation failed.
    #[display("{_0}")]
    Browser(crate::browser::Error),

    /// Script failed.
    #[display("{_0}")]
    Script(script::Error),

    /// Any other failure.
    #[display("{_0}")]
    #[from(ignore)]
    Other(#[error(not(source))] String),
}

/// Unit of step definitions and scenario hooks.
///
/// Every hook defaults to doing nothing.
#[async_trait(?Send)]
pub trait Plugin {
    /// Unique id of this [`Plugin`].
    fn id(&self) -> &str;

    /// Human-readable name of this [`Plugin`].
    fn name(&self) -> &str;

    /// Prepares this [`Plugin`] before its step definitions are pulled.
    ///
    /// # Errors
    ///
    /// Failing prevents the [`Plugin`] from being loaded.
    async fn initialize(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Step [`Definition`]s this [`Plugin`] contributes on loading.
    fn step_definitions(&self) -> Vec<Definition>;

    /// Invoked before every scenario.
    ///
    /// # Errors
    ///
    /// Failing fails the scenario without running its steps.
    async fn before_scenario(
        &mut self,
        ctx: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), Error> {
        _ = (ctx, registry);
        Ok(())
    }

    /// Invoked after every scenario, whatever its outcome.
    ///
    /// # Errors
    ///
    /// Failing fails the scenario.
    async fn after_scenario(
        &mut self,
        ctx: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), Error> {
        _ = (ctx, registry);
        Ok(())
    }

    /// Releases resources of this [`Plugin`] on unloading.
    ///
    /// # Errors
    ///
    /// If releasing fails. The [`Plugin`] is unloaded anyway.
    async fn destroy(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Loaded [`Plugin`]s, in load order.
///
/// Fans the scenario [`Hooks`] out to every loaded [`Plugin`].
#[derive(Debug, Default)]
pub struct Manager {
    #[debug("{:?}", plugins.keys().collect::<Vec<_>>())]
    plugins: LinkedHashMap<String, Box<dyn Plugin>>,
}

impl Manager {
    /// Creates a new empty [`Manager`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the given [`Plugin`] and registers its step
    /// [`Definition`]s in the `registry`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyLoaded`] if a [`Plugin`] with the same id is loaded,
    ///   leaving the `registry` untouched.
    /// - If [`Plugin::initialize`] fails.
    pub async fn load<P: Plugin + 'static>(
        &mut self,
        mut plugin: P,
        registry: &mut Registry,
    ) -> Result<(), Error> {
        let id = plugin.id().to_owned();
        if self.plugins.contains_key(&id) {
            return Err(Error::AlreadyLoaded { id });
        }

        plugin.initialize().await?;
        let definitions = plugin.step_definitions();
        tracing::info!(
            plugin = %id,
            name = plugin.name(),
            steps = definitions.len(),
            "plugin loaded",
        );
        registry.register_all(definitions);
        _ = self.plugins.insert(id, Box::new(plugin));
        Ok(())
    }

    /// Destroys and removes the [`Plugin`] with the given `id`.
    ///
    /// Returns `false` if no such [`Plugin`] is loaded.
    ///
    /// # Errors
    ///
    /// If [`Plugin::destroy`] fails. The [`Plugin`] is removed anyway.
    pub async fn unload(&mut self, id: &str) -> Result<bool, Error> {
        let Some(mut plugin) = self.plugins.remove(id) else {
            return Ok(false);
        };
        tracing::info!(plugin = %id, "plugin unloaded");
        plugin.destroy().await.map(|()| true)
    }

    /// Ids of the loaded [`Plugin`]s, in load order.
    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Indicates whether a [`Plugin`] with the given `id` is loaded.
    #[must_use]
    pub fn is_loaded(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    /// Unloads every [`Plugin`].
    ///
    /// # Errors
    ///
    /// With the first [`Plugin::destroy`] failure, after unloading all.
    pub async fn destroy(&mut self) -> Result<(), Error> {
        let ids = self.plugins.keys().cloned().collect::<Vec<_>>();
        let mut first = None;
        for id in ids {
            if let Err(e) = self.unload(&id).await {
                tracing::warn!(plugin = %id, "destroying failed: {e}");
                _ = first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

#[async_trait(?Send)]
impl Hooks for Manager {
    async fn before_scenario(
        &mut self,
        ctx: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), Error> {
        for plugin in self.plugins.iter_mut().map(|(_, p)| p) {
            plugin.before_scenario(ctx, registry).await?;
        }
        Ok(())
    }

    async fn after_scenario(
        &mut self,
        ctx: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), Error> {
        let mut first = None;
        for (id, plugin) in self.plugins.iter_mut() {
            if let Err(e) = plugin.after_scenario(ctx, registry).await {
                tracing::warn!(plugin = %id, "after-scenario hook failed: {e}");
                _ = first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}
