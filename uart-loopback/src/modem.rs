// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Modem control and status lines of the loopback port.

/// Output lines driven by the host.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModemControl {
    /// Data Terminal Ready.
    pub dtr: bool,
    /// Request To Send.
    pub rts: bool,
}

/// Input lines reported back to the host.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModemStatus {
    /// Clear To Send.
    pub cts: bool,
    /// Data Set Ready.
    pub dsr: bool,
    /// Ring Indicator.
    pub ri: bool,
    /// Data Carrier Detect.
    pub dcd: bool,
}

impl From<ModemControl> for ModemStatus {
    // In loopback the inputs are wired to the outputs: CTS follows RTS,
    // DSR and DCD follow DTR, and nothing ever rings.
    fn from(control: ModemControl) -> Self {
        ModemStatus {
            cts: control.rts,
            dsr: control.dtr,
            ri: false,
            dcd: control.dtr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_wiring() {
        assert_eq!(
            ModemStatus::from(ModemControl::default()),
            ModemStatus::default()
        );

        let status = ModemStatus::from(ModemControl {
            dtr: true,
            rts: false,
        });
        assert!(!status.cts);
        assert!(status.dsr);
        assert!(status.dcd);
        assert!(!status.ri);

        let status = ModemStatus::from(ModemControl {
            dtr: false,
            rts: true,
        });
        assert!(status.cts);
        assert!(!status.dsr);
        assert!(!status.dcd);
        assert!(!status.ri);
    }
}
