// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Adds serialization capabilities to the state objects from `uart-loopback`.
//!
//! Provides wrappers over the state objects from `uart-loopback` crate which
//! implement the `Serialize`, `Deserialize` and `Versionize` traits as well.

#![deny(missing_docs)]

pub mod port;

pub use port::LoopbackStateSer;
