// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Emulation for a loopback UART.
//!
//! The port exposes a transmit queue and a receive queue. Every byte a
//! client writes on the transmit side is copied to the receive side, so the
//! client reads back everything it sends. This makes the device useful for
//! exercising serial client software without real hardware.

#![deny(missing_docs)]

pub mod config;
pub mod engine;
pub mod events;
pub mod modem;
pub mod port;
pub mod queue;

pub use config::UartConfig;
pub use events::{LoopbackEvents, NoEvents, TracingEvents};
pub use port::{Lifecycle, LoopbackPort, LoopbackState, PortBuilder, PortClient};
pub use queue::RingQueue;

/// Notification mechanism used by the port to signal the host.
///
/// The port takes two `Trigger` objects at construction: one fired when
/// looped back data becomes readable, one fired when the transmit queue may
/// have more room. How the signal reaches the host (an eventfd, a channel, a
/// callback) is up to the implementation. An example implementation over
/// [an eventfd](https://docs.rs/vmm-sys-util/latest/vmm_sys_util/eventfd/index.html)
/// can be found in the
/// [`Example` section from `LoopbackPort`](port/struct.LoopbackPort.html#example).
pub trait Trigger {
    /// Underlying type for the potential error conditions returned by `Self::trigger`.
    type E;

    /// Trigger an event.
    fn trigger(&self) -> Result<(), Self::E>;
}
