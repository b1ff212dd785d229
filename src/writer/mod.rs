// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for outputting [`Event`]s.

pub mod console;
pub mod json;
pub mod out;
pub mod tee;

use std::io;

use async_trait::async_trait;
use sealed::sealed;

use crate::event::Event;

#[doc(inline)]
pub use self::{
    console::Console,
    json::Json,
    out::{Coloring, Styles},
    tee::Tee,
};

/// Writer of [`Event`]s to some output.
#[async_trait(?Send)]
pub trait Writer {
    /// Handles the given [`Event`].
    ///
    /// # Errors
    ///
    /// If writing to the output fails.
    async fn handle_event(&mut self, ev: &Event) -> io::Result<()>;

    /// Flushes whatever is still buffered once no more [`Event`]s will come.
    ///
    /// # Errors
    ///
    /// If writing to the output fails.
    async fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[async_trait(?Send)]
impl<W: Writer> Writer for Option<W> {
    async fn handle_event(&mut self, ev: &Event) -> io::Result<()> {
        match self {
            Some(w) => w.handle_event(ev).await,
            None => Ok(()),
        }
    }

    async fn finish(&mut self) -> io::Result<()> {
        match self {
            Some(w) => w.finish().await,
            None => Ok(()),
        }
    }
}

/// Extension of [`Writer`] allowing its composition.
#[sealed]
pub trait Ext: Writer + Sized {
    /// Passes [`Event`]s both to this [`Writer`] and the `other` one.
    ///
    /// See [`Tee`] for more information.
    #[must_use]
    fn tee<W: Writer>(self, other: W) -> Tee<Self, W>;
}

#[sealed]
impl<T: Writer + Sized> Ext for T {
    fn tee<W: Writer>(self, other: W) -> Tee<Self, W> {
        Tee::new(self, other)
    }
}
