// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Single-use result channel between a worker and its run.

use tokio::sync::oneshot;

use crate::metrics::WorkerResult;

/// Create a connected sender/receiver pair.
pub fn result_channel() -> (ResultSender, ResultReceiver) {
    let (tx, rx) = oneshot::channel();
    (ResultSender(tx), ResultReceiver(rx))
}

/// Worker side. Sending consumes it, so at most one result is delivered.
#[derive(Debug)]
pub struct ResultSender(oneshot::Sender<WorkerResult>);

impl ResultSender {
    /// Hand the result to the run. Returns `false` if the run is gone.
    pub fn send(self, result: WorkerResult) -> bool {
        self.0.send(result).is_ok()
    }
}

/// Run side.
#[derive(Debug)]
pub struct ResultReceiver(oneshot::Receiver<WorkerResult>);

impl ResultReceiver {
    /// Non-blocking receive.
    ///
    /// `None` if nothing was sent yet or the sender was dropped unsent.
    pub fn try_take(&mut self) -> Option<WorkerResult> {
        self.0.try_recv().ok()
    }
}
