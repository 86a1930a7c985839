//! Global cut assembly
//!
//! Each peer's report covers only its own balance and inbound channels. A
//! [`GlobalCut`] combines the reports of every peer for one epoch. Because
//! channels are FIFO, the sum over the cut equals the total resources in the
//! network when the epoch started.

use serde::Serialize;

use crate::error::{Result, SimError};
use crate::simulation::Simulation;
use crate::snapshot::SnapshotReport;
use crate::types::EpochId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalCut {
    pub epoch: EpochId,
    /// One report per peer, in peer id order
    pub reports: Vec<SnapshotReport>,
}

impl GlobalCut {
    /// Collect every peer's report for `epoch`. `None` until all have reported.
    pub fn assemble(sim: &Simulation, epoch: EpochId) -> Option<Self> {
        let reports = sim
            .peer_ids()
            .into_iter()
            .map(|peer| sim.report(peer, epoch).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { epoch, reports })
    }

    /// Sum of the balances captured at epoch start
    pub fn recorded_balances(&self) -> i64 {
        self.reports.iter().map(SnapshotReport::recorded_balance).sum()
    }

    /// Sum of every recorded channel entry
    pub fn in_transit(&self) -> i64 {
        self.reports.iter().map(SnapshotReport::in_transit).sum()
    }

    pub fn total(&self) -> i64 {
        self.recorded_balances() + self.in_transit()
    }

    /// Check the cut against the resources known to exist in the network
    pub fn verify(&self, expected: i64) -> Result<()> {
        let actual = self.total();
        if actual != expected {
            return Err(SimError::CutMismatch {
                epoch: self.epoch,
                expected,
                actual,
            });
        }
        Ok(())
    }
}
