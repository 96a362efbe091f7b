// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-node exclusive install locks
//!
//! Installs of the same node must never interleave, while installs of
//! different nodes run fully in parallel. The lock table maps node ids to the
//! session currently holding them. A held lock is represented by a
//! [`NodeLock`], which releases itself when dropped, so a session cannot leave
//! a node locked however it exits.

use node_install_types::NodeUuid;
use slog::Logger;
use slog::debug;
use slog::o;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("node {node_id} is already locked by session {holder}")]
    AlreadyLocked { node_id: NodeUuid, holder: String },
}

/// Counters describing lock table activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockStats {
    pub acquired: u64,
    pub released: u64,
    pub held: usize,
}

#[derive(Debug, Default)]
struct LockTableInner {
    // node -> correlation id of the session holding it
    held: BTreeMap<NodeUuid, String>,
    acquired: u64,
    released: u64,
}

/// Table of exclusive install locks keyed by node id.
///
/// Cloning the table yields another handle to the same set of locks.
#[derive(Clone, Debug)]
pub struct NodeLockTable {
    log: Logger,
    inner: Arc<Mutex<LockTableInner>>,
}

impl NodeLockTable {
    pub fn new(log: &Logger) -> Self {
        Self {
            log: log.new(o!("component" => "NodeLockTable")),
            inner: Arc::new(Mutex::new(LockTableInner::default())),
        }
    }

    /// Take the install lock for `node_id` on behalf of the session
    /// identified by `holder`.
    ///
    /// Fails immediately, without waiting, if any session (including one with
    /// the same `holder`) already holds the lock.
    pub fn acquire(
        &self,
        node_id: NodeUuid,
        holder: &str,
    ) -> Result<NodeLock, LockError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(current) = inner.held.get(&node_id) {
            debug!(
                self.log, "node lock contended";
                "node_id" => %node_id,
                "holder" => current,
                "requested_by" => holder,
            );
            return Err(LockError::AlreadyLocked {
                node_id,
                holder: current.clone(),
            });
        }
        inner.held.insert(node_id, holder.to_owned());
        inner.acquired += 1;
        debug!(
            self.log, "node lock acquired";
            "node_id" => %node_id,
            "holder" => holder,
        );
        Ok(NodeLock {
            node_id,
            log: self.log.clone(),
            inner: Arc::clone(&self.inner),
            released: false,
        })
    }

    /// Returns true if some session currently holds the lock for `node_id`.
    pub fn is_locked(&self, node_id: NodeUuid) -> bool {
        self.inner.lock().unwrap().held.contains_key(&node_id)
    }

    pub fn stats(&self) -> LockStats {
        let inner = self.inner.lock().unwrap();
        LockStats {
            acquired: inner.acquired,
            released: inner.released,
            held: inner.held.len(),
        }
    }
}

/// A held install lock.
///
/// The lock is released by [`NodeLock::release`] or when this is dropped,
/// whichever comes first.
#[derive(Debug)]
pub struct NodeLock {
    node_id: NodeUuid,
    log: Logger,
    inner: Arc<Mutex<LockTableInner>>,
    released: bool,
}

impl NodeLock {
    pub fn node_id(&self) -> NodeUuid {
        self.node_id
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut inner = self.inner.lock().unwrap();
        inner.held.remove(&self.node_id);
        inner.released += 1;
        debug!(self.log, "node lock released"; "node_id" => %self.node_id);
    }
}

impl Drop for NodeLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}
