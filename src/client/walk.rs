//! Walk engine: iterative subtree traversal with GETNEXT or GETBULK.
//!
//! Each round requests the lexicographic successors of the last OID
//! received; the stream ends cleanly on endOfMibView, on any agent
//! error-status, on an empty response, or when the agent leaves the
//! requested subtree. One quirk is preserved from long-standing client
//! behavior: when the very first varbind of the first round falls
//! outside the subtree, the root may name a scalar leaf, so the walk
//! degrades to a plain GET on the root and yields at most that one
//! varbind.

#![allow(clippy::type_complexity)]

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use super::Client;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;

/// How [`Client::walk`](super::Client::walk) chooses its request type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkMode {
    /// GETNEXT for V1, GETBULK for V2c/V3 (default).
    #[default]
    Auto,
    /// Always GETNEXT (slower, maximally compatible).
    GetNext,
    /// Always GETBULK (errors on V1).
    GetBulk,
}

/// The request a walk round issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundKind {
    /// Plain GET, used only by the leaf-root fallback.
    Get,
    GetNext,
    GetBulk { max_repetitions: i32 },
}

/// Async stream of the varbinds in a subtree.
///
/// Created by [`Client::walk`], [`Client::walk_getnext`], or
/// [`Client::bulk_walk`].
impl<T: Transport> std::fmt::Debug for Walk<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walk")
            .field("root", &self.root)
            .field("kind", &self.kind)
            .field("current", &self.current)
            .finish()
    }
}

pub struct Walk<T: Transport> {
    client: Client<T>,
    root: Oid,
    kind: RoundKind,
    /// Start OID for the next round (last OID received).
    current: Oid,
    /// Start OID of the round currently buffered, for the
    /// strictly-increasing check.
    request_start: Oid,
    /// Abort on OIDs that are not strictly greater than the request
    /// start. Cleared by the `"c"` application option.
    check_increasing: bool,
    max_results: Option<usize>,
    count: usize,
    rounds: usize,
    /// Degraded to a single GET on the root (leaf-OID case).
    fallback: bool,
    buffer: Vec<VarBind>,
    idx: usize,
    done: bool,
    pending: Option<Pin<Box<dyn std::future::Future<Output = Result<Pdu>> + Send>>>,
}

impl<T: Transport> Walk<T> {
    pub(super) fn new(
        client: Client<T>,
        root: Oid,
        kind: RoundKind,
        check_increasing: bool,
        max_results: Option<usize>,
    ) -> Self {
        // An empty root falls back to the IANA internet arc: it covers
        // both standard and vendor branches and is the shortest OID that
        // is valid for BER encoding
        let root = if root.is_empty() {
            crate::oid!(1, 3, 6, 1)
        } else {
            root
        };

        Self {
            client,
            current: root.clone(),
            request_start: root.clone(),
            root,
            kind,
            check_increasing,
            max_results,
            count: 0,
            rounds: 0,
            fallback: false,
            buffer: Vec::new(),
            idx: 0,
            done: false,
            pending: None,
        }
    }

    /// The (normalized) root of this walk.
    pub fn root(&self) -> &Oid {
        &self.root
    }
}

impl<T: Transport + 'static> Walk<T> {
    /// Get the next varbind, or `None` when the walk is complete.
    pub async fn next(&mut self) -> Option<Result<VarBind>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Collect every remaining varbind.
    pub async fn collect(mut self) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result?);
        }
        Ok(results)
    }
}

impl<T: Transport + 'static> Stream for Walk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            if let Some(max) = self.max_results {
                if self.count >= max {
                    self.done = true;
                    return Poll::Ready(None);
                }
            }

            // Drain the buffered round
            if self.idx < self.buffer.len() {
                let i = self.idx;
                self.idx += 1;
                let vb = self.buffer[i].clone();

                // endOfMibView / noSuchObject / noSuchInstance all mark
                // the end of useful data
                if vb.value.is_exception() {
                    tracing::debug!(
                        target: "snmpkit::walk",
                        value = %vb.value,
                        "walk terminated on exception value"
                    );
                    self.done = true;
                    return Poll::Ready(None);
                }

                if !vb.oid.is_descendant_of(&self.root) {
                    // First varbind of the first round out of range: the
                    // root was probably a leaf scalar, so retry as a
                    // plain GET on it
                    if self.rounds == 1 && i == 0 && !self.fallback {
                        tracing::debug!(
                            target: "snmpkit::walk",
                            root = %self.root,
                            "first result outside subtree, retrying root as a plain GET"
                        );
                        self.fallback = true;
                        self.buffer.clear();
                        self.idx = 0;
                        self.current = self.root.clone();
                        continue;
                    }

                    // The fallback GET answered for the root itself
                    if vb.oid == self.root && vb.value != Value::NoSuchInstance {
                        self.count += 1;
                        self.done = true;
                        return Poll::Ready(Some(Ok(vb)));
                    }

                    tracing::debug!(
                        target: "snmpkit::walk",
                        oid = %vb.oid,
                        root = %self.root,
                        "walk left the requested subtree"
                    );
                    self.done = true;
                    return Poll::Ready(None);
                }

                // A result that does not advance past the request start
                // would loop forever against a misbehaving agent
                if self.check_increasing && vb.oid <= self.request_start {
                    self.done = true;
                    return Poll::Ready(Some(Err(Error::NonIncreasingOid {
                        previous: self.request_start.clone(),
                        current: vb.oid,
                    })));
                }

                self.count += 1;
                return Poll::Ready(Some(Ok(vb)));
            }

            // Buffer exhausted: issue the next round
            if self.pending.is_none() {
                let client = self.client.clone();
                let oid = self.current.clone();
                let kind = if self.fallback {
                    RoundKind::Get
                } else {
                    self.kind
                };
                self.request_start = self.current.clone();
                self.pending = Some(Box::pin(async move { client.walk_round(kind, oid).await }));
            }

            let pending = self.pending.as_mut().unwrap();
            match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => {
                    self.pending = None;
                    match result {
                        Ok(pdu) => {
                            self.rounds += 1;

                            // Any agent error-status ends the walk
                            // cleanly, with the reason logged
                            if pdu.error_status != 0 {
                                tracing::debug!(
                                    target: "snmpkit::walk",
                                    status = %pdu.error_status_enum(),
                                    "walk terminated with agent error-status"
                                );
                                self.done = true;
                                return Poll::Ready(None);
                            }

                            if pdu.varbinds.is_empty() {
                                tracing::debug!(
                                    target: "snmpkit::walk",
                                    "walk terminated on empty response"
                                );
                                self.done = true;
                                return Poll::Ready(None);
                            }

                            // The next round starts from the last OID of
                            // this one
                            self.current = pdu
                                .varbinds
                                .last()
                                .expect("varbinds checked non-empty")
                                .oid
                                .clone();
                            self.buffer = pdu.varbinds;
                            self.idx = 0;
                        }
                        Err(e) => {
                            self.done = true;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
            }
        }
    }
}
