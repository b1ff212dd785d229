// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scripting [`Plugin`] over a pluggable embedded script [`Engine`].
//!
//! User [`Script`]s are executed before every scenario and may register
//! custom steps through the [`Engine`]. Those are registered under the
//! [`CUSTOM_SOURCE`] tag and removed again after the scenario.

use std::{cell::RefCell, fmt, fs, io, path::PathBuf, rc::Rc};

use async_trait::async_trait;
use derive_more::{Display, Error};
use serde_json::Value;

use crate::{
    step::{Definition, Registry},
    steps, Context,
};

use super::Plugin;

/// Source tag of the [`ScriptPlugin`] own step [`Definition`]s.
pub const SOURCE: &str = "script";

/// Tag of the step [`Definition`]s registered by scripts.
pub const CUSTOM_SOURCE: &str = "script-custom";

/// Error of a script execution.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum Error {
    /// Script doesn't compile.
    #[display("Script syntax error: {message}")]
    Syntax {
        /// Description reported by the [`Engine`].
        #[error(not(source))]
        message: String,
    },

    /// Script failed while running.
    #[display("Script error: {message}")]
    Runtime {
        /// Description reported by the [`Engine`].
        #[error(not(source))]
        message: String,
    },

    /// Script was aborted by a cancellation.
    #[display("Script execution cancelled")]
    Cancelled,

    /// No script with such name.
    #[display("Script not found: {name}")]
    NotFound {
        /// Name of the script.
        #[error(not(source))]
        name: String,
    },
}

/// Embedded script interpreter.
#[async_trait(?Send)]
pub trait Engine: fmt::Debug {
    /// Executes the given `code` against the `ctx`, returning its result.
    ///
    /// Implementations must observe [`Context::cancellation`] at a bounded
    /// interval of executed instructions and fail with [`Error::Cancelled`]
    /// once it fires.
    ///
    /// # Errors
    ///
    /// If the `code` doesn't compile, fails or is cancelled.
    async fn execute(&self, code: &str, ctx: &mut Context) -> Result<Value, Error>;

    /// Drains step [`Definition`]s registered by executed scripts.
    fn take_custom_steps(&self) -> Vec<Definition>;

    /// Forgets step [`Definition`]s registered by executed scripts.
    fn clear_custom_steps(&self) {
        _ = self.take_custom_steps();
    }
}

/// Named user script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    /// Name the script is invoked by.
    pub name: String,

    /// Source code.
    pub code: String,

    /// Whether the script runs before every scenario.
    pub enabled: bool,
}

/// Source of user [`Script`]s.
pub trait Store: fmt::Debug {
    /// Loads all the [`Script`]s.
    ///
    /// # Errors
    ///
    /// If loading fails.
    fn scripts(&self) -> io::Result<Vec<Script>>;
}

impl Store for Vec<Script> {
    fn scripts(&self) -> io::Result<Vec<Script>> {
        Ok(self.clone())
    }
}

/// [`Store`] reading every file with the given extension in a directory as
/// an enabled [`Script`] named after the file stem.
#[derive(Clone, Debug)]
pub struct Directory {
    /// Directory to read.
    pub path: PathBuf,

    /// Extension of the script files, all files if [`None`].
    pub extension: Option<String>,
}

impl Store for Directory {
    fn scripts(&self) -> io::Result<Vec<Script>> {
        let mut scripts = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ext) = &self.extension {
                if path.extension().and_then(|e| e.to_str()) != Some(ext.as_str()) {
                    continue;
                }
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            scripts.push(Script {
                name: name.to_owned(),
                code: fs::read_to_string(&path)?,
                enabled: true,
            });
        }
        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scripts)
    }
}

/// Shared list of the loaded [`Script`]s.
pub type Scripts = Rc<RefCell<Vec<Script>>>;

/// [`Plugin`] providing the `eval`, `def x = eval` and `script '<name>'`
/// steps, and the custom steps registered by user [`Script`]s.
#[derive(Debug)]
pub struct ScriptPlugin {
    engine: Rc<dyn Engine>,
    store: Box<dyn Store>,
    scripts: Scripts,
}

impl ScriptPlugin {
    /// Creates a new [`ScriptPlugin`] executing [`Script`]s of the given
    /// `store` with the given `engine`.
    #[must_use]
    pub fn new(engine: impl Engine + 'static, store: impl Store + 'static) -> Self {
        Self {
            engine: Rc::new(engine),
            store: Box::new(store),
            scripts: Scripts::default(),
        }
    }

    /// Currently loaded [`Script`]s.
    #[must_use]
    pub fn scripts(&self) -> Vec<Script> {
        self.scripts.borrow().clone()
    }

    /// Reloads [`Script`]s from the [`Store`].
    ///
    /// # Errors
    ///
    /// If loading fails, keeping the previously loaded [`Script`]s.
    pub fn reload(&self) -> Result<(), super::Error> {
        let loaded = self
            .store
            .scripts()
            .map_err(|e| super::Error::Other(format!("Failed to load scripts: {e}")))?;
        tracing::debug!(count = loaded.len(), "scripts loaded");
        *self.scripts.borrow_mut() = loaded;
        Ok(())
    }
}

#[async_trait(?Send)]
impl Plugin for ScriptPlugin {
    fn id(&self) -> &str {
        SOURCE
    }

    fn name(&self) -> &str {
        "Scripting"
    }

    async fn initialize(&mut self) -> Result<(), super::Error> {
        self.reload()
    }

    fn step_definitions(&self) -> Vec<Definition> {
        steps::script::definitions(&self.engine, &self.scripts)
            .into_iter()
            .map(|def| def.source(SOURCE))
            .collect()
    }

    async fn before_scenario(
        &mut self,
        ctx: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), super::Error> {
        _ = registry.unregister_by_source(CUSTOM_SOURCE);
        self.engine.clear_custom_steps();

        let enabled = self
            .scripts
            .borrow()
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect::<Vec<_>>();
        for script in enabled {
            match self.engine.execute(&script.code, ctx).await {
                Ok(_) => {}
                Err(Error::Cancelled) => {
                    tracing::debug!(script = %script.name, "user script cancelled");
                    return Ok(());
                }
                Err(e) => tracing::warn!(script = %script.name, "user script failed: {e}"),
            }
        }

        let custom = self
            .engine
            .take_custom_steps()
            .into_iter()
            .map(|def| {
                let description = format!("Script custom step: {}", def.pattern);
                let def = def.source(CUSTOM_SOURCE);
                if def.description.is_some() {
                    def
                } else {
                    def.describe(description)
                }
            })
            .collect::<Vec<_>>();
        tracing::debug!(count = custom.len(), "custom steps registered");
        registry.register_all(custom);
        Ok(())
    }

    async fn after_scenario(
        &mut self,
        _: &mut Context,
        registry: &mut Registry,
    ) -> Result<(), super::Error> {
        _ = registry.unregister_by_source(CUSTOM_SOURCE);
        self.engine.clear_custom_steps();
        Ok(())
    }
}
