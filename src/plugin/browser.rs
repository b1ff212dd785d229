// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Plugin`] with the `browser ...` steps.

use std::rc::Rc;

use async_trait::async_trait;

use crate::{
    browser::{Config, Launcher},
    step::{Definition, Registry},
    steps, Context,
};

use super::{Error, Plugin};

/// Source tag of the [`BrowserPlugin`] step [`Definition`]s.
pub const SOURCE: &str = "browser-cdp";

/// [`Plugin`] driving a browser over the Chrome DevTools Protocol.
///
/// The browser session opened by a scenario is detached after it, while the
/// connection to the browser itself is kept until the [`Plugin`] is
/// destroyed.
#[derive(Debug)]
pub struct BrowserPlugin {
    launcher: Rc<Launcher>,
}

impl BrowserPlugin {
    /// Creates a new [`BrowserPlugin`] connecting with the given [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_launcher(Launcher::new(config))
    }

    /// Creates a new [`BrowserPlugin`] over the given [`Launcher`].
    #[must_use]
    pub fn with_launcher(launcher: Launcher) -> Self {
        Self { launcher: Rc::new(launcher) }
    }
}

#[async_trait(?Send)]
impl Plugin for BrowserPlugin {
    fn id(&self) -> &str {
        SOURCE
    }

    fn name(&self) -> &str {
        "Browser (CDP)"
    }

    fn step_definitions(&self) -> Vec<Definition> {
        steps::browser::definitions(&self.launcher)
            .into_iter()
            .map(|def| def.source(SOURCE))
            .collect()
    }

    async fn after_scenario(
        &mut self,
        ctx: &mut Context,
        _: &mut Registry,
    ) -> Result<(), Error> {
        if let Some(mut client) = ctx.browser.take() {
            client.detach().await;
        }
        Ok(())
    }

    async fn destroy(&mut self) -> Result<(), Error> {
        self.launcher.disconnect();
        Ok(())
    }
}
