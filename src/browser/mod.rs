// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Browser automation over the Chrome DevTools Protocol.
//!
//! - [`transport`]: CDP message [`Transport`] and its WebSocket [`Connection`]
//! - [`client`]: [`Client`] driving a single tab, with auto-waiting actions
//! - [`selector`]: [`Selector`] language and its compiler
//! - [`a11y`]: accessibility roles and accessible names
//! - [`keys`]: key names for `press`

pub mod a11y;
pub mod client;
pub mod error;
pub mod keys;
pub mod selector;
pub mod transport;

use std::{cell::RefCell, rc::Rc, time::Duration};

use smart_default::SmartDefault;
use tokio_util::sync::CancellationToken;

pub use self::{
    client::{Client, State},
    error::Error,
    keys::Key,
    selector::{Resolution, Selector},
    transport::{Connection, Transport},
};

/// Default debugging endpoint of a locally running browser.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9222";

/// Configuration of a [`Client`].
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// Debugging endpoint: either an `http://` one to discover the browser
    /// WebSocket URL from, or a `ws://` URL to connect to directly.
    #[default(String::from(DEFAULT_ENDPOINT))]
    pub endpoint: String,

    /// Time an action waits for its element to appear.
    #[default(Duration::from_secs(10))]
    pub element_timeout: Duration,

    /// Interval between element lookups while waiting.
    #[default(Duration::from_millis(150))]
    pub poll_interval: Duration,

    /// Interval between document ready state checks while waiting for a
    /// page load.
    #[default(Duration::from_millis(100))]
    pub load_poll_interval: Duration,

    /// Delay after a click before checking whether it started a navigation.
    #[default(Duration::from_millis(300))]
    pub navigation_settle: Duration,

    /// Time a single CDP command may wait for its reply.
    #[default(Duration::from_secs(30))]
    pub command_timeout: Duration,
}

/// Factory of [`Client`]s sharing a single lazily established [`Transport`].
#[derive(Debug)]
pub struct Launcher {
    /// [`Config`] of the produced [`Client`]s.
    config: Config,

    /// Established [`Transport`], if any.
    transport: RefCell<Option<Rc<dyn Transport>>>,
}

impl Launcher {
    /// Creates a new [`Launcher`] connecting to the [`Config::endpoint`] on
    /// first use.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: RefCell::new(None),
        }
    }

    /// Creates a new [`Launcher`] over an already established [`Transport`].
    #[must_use]
    pub fn with_transport(config: Config, transport: Rc<dyn Transport>) -> Self {
        Self {
            config,
            transport: RefCell::new(Some(transport)),
        }
    }

    /// [`Config`] of the produced [`Client`]s.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Produces a new detached [`Client`] observing the given `cancel` token,
    /// connecting to the browser if not connected yet.
    ///
    /// # Errors
    ///
    /// If connecting fails.
    pub async fn launch(&self, cancel: CancellationToken) -> Result<Client, Error> {
        let existing = self.transport.borrow().clone();
        let transport = match existing {
            Some(t) => t,
            None => {
                let conn = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    c = Connection::connect(&self.config) => c?,
                };
                let t: Rc<dyn Transport> = Rc::new(conn);
                *self.transport.borrow_mut() = Some(Rc::clone(&t));
                tracing::info!(endpoint = %self.config.endpoint, "connected to browser");
                t
            }
        };
        Ok(Client::new(transport, self.config.clone()).with_cancellation(cancel))
    }

    /// Drops the established [`Transport`], so the next [`Launcher::launch`]
    /// reconnects.
    pub fn disconnect(&self) {
        if self.transport.borrow_mut().take().is_some() {
            tracing::debug!("disconnected from browser");
        }
    }
}
