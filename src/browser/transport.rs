// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Chrome DevTools Protocol message [`Transport`].

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use derive_more::with_trait::Debug;
use futures::{stream::SplitSink, SinkExt as _, StreamExt as _};
use serde_json::{json, Value};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use super::{Config, Error};

/// Carrier of CDP commands.
///
/// Commands are addressed either to the browser itself (no `session`) or to
/// an attached target's flattened session.
#[async_trait(?Send)]
pub trait Transport: fmt::Debug {
    /// Sends a command and awaits its result.
    ///
    /// # Errors
    ///
    /// If the command is rejected or the transport fails.
    async fn send(
        &self,
        session: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, Error>;
}

type Sink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, Error>>>>>;

/// WebSocket connection to a browser's debugging endpoint.
#[derive(Debug)]
pub struct Connection {
    /// Writing half of the socket.
    #[debug(skip)]
    sink: tokio::sync::Mutex<Sink>,

    /// Commands awaiting their replies, by id.
    #[debug(skip)]
    pending: Pending,

    /// Id of the next command.
    next_id: AtomicU64,

    /// Time a command may wait for its reply.
    command_timeout: Duration,

    /// Task dispatching replies.
    #[debug(skip)]
    reader: JoinHandle<()>,
}

impl Connection {
    /// Connects to the [`Config::endpoint`].
    ///
    /// A `ws://` endpoint is used as is, while an `http://` one is asked for
    /// its `webSocketDebuggerUrl` first.
    ///
    /// # Errors
    ///
    /// If the endpoint cannot be discovered or connected to.
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let url = if config.endpoint.starts_with("ws://")
            || config.endpoint.starts_with("wss://")
        {
            config.endpoint.clone()
        } else {
            discover(&config.endpoint).await?
        };
        tracing::debug!(%url, "connecting to browser");

        let (ws, _) = connect_async(url.as_str()).await?;
        let (sink, mut stream) = ws.split();
        let pending = Pending::default();

        let replies = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => dispatch(&replies, &text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("browser connection failed: {e}");
                        break;
                    }
                }
            }
            for (_, tx) in lock(&replies).drain() {
                _ = tx.send(Err(Error::Closed));
            }
        });

        Ok(Self {
            sink: tokio::sync::Mutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            command_timeout: config.command_timeout,
            reader,
        })
    }
}

#[async_trait(?Send)]
impl Transport for Connection {
    async fn send(
        &self,
        session: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut msg = json!({ "id": id, "method": method, "params": params });
        if let Some(s) = session {
            msg["sessionId"] = s.into();
        }

        let (tx, rx) = oneshot::channel();
        _ = lock(&self.pending).insert(id, tx);
        tracing::trace!(id, method, "sending CDP command");

        let sent = self.sink.lock().await.send(Message::Text(msg.to_string())).await;
        if let Err(e) = sent {
            _ = lock(&self.pending).remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                _ = lock(&self.pending).remove(&id);
                Err(Error::CommandTimeout {
                    method: method.to_owned(),
                    timeout: self.command_timeout,
                })
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Asks an HTTP debugging `endpoint` for its browser WebSocket URL.
async fn discover(endpoint: &str) -> Result<String, Error> {
    let version = reqwest::get(format!("{}/json/version", endpoint.trim_end_matches('/')))
        .await?
        .json::<Value>()
        .await?;
    version
        .get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| Error::Protocol {
            code: 0,
            message: format!("no `webSocketDebuggerUrl` reported by {endpoint}"),
        })
}

/// Routes a reply to the command awaiting it. Events are ignored.
fn dispatch(pending: &Pending, text: &str) {
    let msg = match serde_json::from_str::<Value>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!("skipping malformed CDP message: {e}");
            return;
        }
    };
    let Some(id) = msg.get("id").and_then(Value::as_u64) else {
        tracing::trace!(method = ?msg.get("method"), "CDP event");
        return;
    };
    let Some(tx) = lock(pending).remove(&id) else {
        return;
    };
    let reply = match msg.get("error") {
        Some(e) => Err(Error::protocol(e)),
        None => Ok(msg.get("result").cloned().unwrap_or(Value::Null)),
    };
    _ = tx.send(reply);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_replies_by_id() {
        let pending = Pending::default();
        let (ok_tx, mut ok_rx) = oneshot::channel();
        let (err_tx, mut err_rx) = oneshot::channel();
        _ = lock(&pending).insert(1, ok_tx);
        _ = lock(&pending).insert(2, err_tx);

        dispatch(&pending, r#"{"method":"Page.loadEventFired","params":{}}"#);
        dispatch(&pending, r#"{"id":2,"error":{"code":-1,"message":"nope"}}"#);
        dispatch(&pending, r#"{"id":1,"result":{"value":3}}"#);

        assert_eq!(ok_rx.try_recv().unwrap().unwrap(), json!({"value": 3}));
        assert!(matches!(
            err_rx.try_recv().unwrap(),
            Err(Error::Protocol { code: -1, .. }),
        ));
        assert!(lock(&pending).is_empty());
    }
}
