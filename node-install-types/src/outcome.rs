// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;
use serde::Serialize;

/// Terminal result of one provisioning run against a node.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunOutcome {
    /// Everything was applied.
    Complete,
    /// Some steps ran on the node but the run did not finish.
    Incomplete,
    /// Nothing was applied.
    Failed,
    /// Everything was applied and the node is rebooting to pick it up.
    Reboot,
}

impl RunOutcome {
    /// Returns true if the node actually executed part of the run.
    ///
    /// The node's kernel command line is recorded as stored exactly when this
    /// is true.
    pub fn ran_on_node(&self) -> bool {
        match self {
            RunOutcome::Complete
            | RunOutcome::Incomplete
            | RunOutcome::Reboot => true,
            RunOutcome::Failed => false,
        }
    }

    /// Returns true if the node should be treated as freshly reinstalled.
    pub fn reinstalled(&self) -> bool {
        matches!(self, RunOutcome::Complete | RunOutcome::Reboot)
    }
}
