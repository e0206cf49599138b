// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Provides a wrapper over a `LoopbackState` that has serialization capabilities.
//!
//! This module defines the `LoopbackStateSer` abstraction which mirrors the
//! `LoopbackState` from the base crate, and adds on top of it derives for
//! the `Serialize`, `Deserialize` and `Versionize` traits.

use serde::{Deserialize, Serialize};
use uart_loopback::LoopbackState;
use versionize::{VersionMap, Versionize, VersionizeResult};
use versionize_derive::Versionize;

/// Wrapper over a `LoopbackState` that has serialization capabilities.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Versionize)]
pub struct LoopbackStateSer {
    /// Queue capacity
    pub capacity: u64,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: u8,
    /// Stop bits, in half bits
    pub stop_bits: u8,
    /// Parity encoding
    pub parity: u8,
    /// Flow control encoding
    pub flow_control: u8,
    /// XON character
    pub xon: u8,
    /// XOFF character
    pub xoff: u8,
    /// Receive latency timer
    pub latency_timer: u32,
    /// Data Terminal Ready
    pub dtr: bool,
    /// Request To Send
    pub rts: bool,
    /// Port activated by the host
    pub active: bool,
    /// Transmit queue contents
    pub tx_buffer: Vec<u8>,
    /// Receive queue contents
    pub rx_buffer: Vec<u8>,
}

// The following `From` implementations can be used to convert from a `LoopbackStateSer` to the
// `LoopbackState` from the base crate and vice versa.
impl From<&LoopbackStateSer> for LoopbackState {
    fn from(state: &LoopbackStateSer) -> Self {
        LoopbackState {
            capacity: state.capacity,
            baud_rate: state.baud_rate,
            data_bits: state.data_bits,
            stop_bits: state.stop_bits,
            parity: state.parity,
            flow_control: state.flow_control,
            xon: state.xon,
            xoff: state.xoff,
            latency_timer: state.latency_timer,
            dtr: state.dtr,
            rts: state.rts,
            active: state.active,
            tx_buffer: state.tx_buffer.clone(),
            rx_buffer: state.rx_buffer.clone(),
        }
    }
}

impl From<&LoopbackState> for LoopbackStateSer {
    fn from(state: &LoopbackState) -> Self {
        LoopbackStateSer {
            capacity: state.capacity,
            baud_rate: state.baud_rate,
            data_bits: state.data_bits,
            stop_bits: state.stop_bits,
            parity: state.parity,
            flow_control: state.flow_control,
            xon: state.xon,
            xoff: state.xoff,
            latency_timer: state.latency_timer,
            dtr: state.dtr,
            rts: state.rts,
            active: state.active,
            tx_buffer: state.tx_buffer.clone(),
            rx_buffer: state.rx_buffer.clone(),
        }
    }
}

impl Default for LoopbackStateSer {
    fn default() -> Self {
        LoopbackStateSer::from(&LoopbackState::default())
    }
}
