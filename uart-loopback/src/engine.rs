// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Provides the loopback transfer between the two queues of a port.
//!
//! The engine consumes from the transmit queue and produces into the
//! receive queue. It keeps no state of its own: every transfer is computed
//! from the queue indices at the time it runs. Notifying the host about the
//! outcome is left to the [port](../port/index.html).

use std::cmp;

use crate::queue::{Consumer, Producer};

/// Outcome of a single transfer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes copied from the transmit queue to the receive queue.
    pub moved: usize,
    /// Transmit bytes that stayed queued because the receive queue was full.
    pub held_back: usize,
}

impl Transfer {
    /// Returns whether some transmit data could not be looped back.
    pub fn is_stalled(&self) -> bool {
        self.held_back > 0
    }
}

/// Copies pending transmit data into the receive queue.
pub struct TransferEngine<'a> {
    tx: &'a mut Consumer,
    rx: &'a mut Producer,
}

impl<'a> TransferEngine<'a> {
    /// Creates an engine over the consumer side of the transmit queue and
    /// the producer side of the receive queue.
    pub fn new(tx: &'a mut Consumer, rx: &'a mut Producer) -> Self {
        TransferEngine { tx, rx }
    }

    /// Moves as much pending transmit data as the receive queue can take.
    ///
    /// Transmit bytes are only consumed once the receive queue accepted
    /// them, so whatever does not fit stays pending for the next run.
    pub fn run(&mut self) -> Transfer {
        let pending = self.tx.pending_count();
        if pending == 0 {
            return Transfer::default();
        }

        let chunk = self.tx.peek(cmp::min(pending, self.rx.free_space()));
        let written = self.rx.write(&chunk);
        self.tx.consume(written);

        Transfer {
            moved: written,
            held_back: pending - written,
        }
    }
}
