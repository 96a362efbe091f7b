// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Audit events emitted over the course of an install session

use async_trait::async_trait;
use node_install_types::NodeUuid;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    InstallStarted,
    InstallFinished,
    InstallFailed { message: String },
    PlaybookStarted,
    PlaybookFinished,
}

/// Identifies which node and which session an [`AuditEvent`] belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditContext {
    pub node_id: NodeUuid,
    pub node_name: String,
    pub correlation_id: String,
}

/// Receives audit events.
///
/// Logging an audit event is best-effort: an install never fails because its
/// audit trail could not be written, so `log` has no error to return.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, event: AuditEvent, context: &AuditContext);
}
