// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Passing [`Event`]s to multiple [`Writer`]s.

use std::io;

use async_trait::async_trait;

use crate::event::Event;

use super::Writer;

/// Wrapper passing [`Event`]s to the `left` and then to the `right`
/// [`Writer`].
///
/// Both [`Writer`]s see every [`Event`], even if one of them fails; the first
/// failure is reported.
#[derive(Clone, Debug)]
pub struct Tee<L, R> {
    /// Left [`Writer`].
    left: L,

    /// Right [`Writer`].
    right: R,
}

impl<L, R> Tee<L, R> {
    /// Creates a new [`Tee`] [`Writer`] passing [`Event`]s both to the `left`
    /// and `right` [`Writer`]s.
    #[must_use]
    pub const fn new(left: L, right: R) -> Self {
        Self { left, right }
    }

    /// Splits this [`Tee`] back into its [`Writer`]s.
    #[must_use]
    pub fn into_inner(self) -> (L, R) {
        (self.left, self.right)
    }
}

#[async_trait(?Send)]
impl<L: Writer, R: Writer> Writer for Tee<L, R> {
    async fn handle_event(&mut self, ev: &Event) -> io::Result<()> {
        let left = self.left.handle_event(ev).await;
        let right = self.right.handle_event(ev).await;
        left.and(right)
    }

    async fn finish(&mut self) -> io::Result<()> {
        let left = self.left.finish().await;
        let right = self.right.finish().await;
        left.and(right)
    }
}
