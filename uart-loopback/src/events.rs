// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Observability hooks for the loopback port.
//!
//! The port never formats or prints anything by itself. Instead it reports
//! what happens through a [`LoopbackEvents`](trait.LoopbackEvents.html)
//! implementation chosen by the embedder, which can count the events, log
//! them, or ignore them altogether.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::UartConfig;
use crate::modem::{ModemControl, ModemStatus};
use crate::port::Lifecycle;

/// Events reported by the loopback port.
pub trait LoopbackEvents {
    /// `count` bytes were copied from the transmit queue to the receive queue.
    fn bytes_looped(&self, count: usize);
    /// `pending` transmit bytes stayed queued because the receive queue was full.
    fn transfer_stalled(&self, pending: usize);
    /// The host programmed the line settings.
    fn uart_programmed(&self, config: &UartConfig);
    /// The host changed the modem control lines; `status` is what the port
    /// now reports back.
    fn modem_control_changed(&self, control: ModemControl, status: ModemStatus);
    /// The host asked for a break condition to be set or cleared.
    fn break_requested(&self, asserted: bool);
    /// The host asked for the FIFOs to be flushed.
    fn fifo_reset(&self, tx: bool, rx: bool);
    /// The port moved to another lifecycle stage.
    fn lifecycle_changed(&self, lifecycle: Lifecycle);
}

/// Provides a no-op implementation of `LoopbackEvents` which can be used in
/// situations that do not require logging or otherwise doing anything in
/// response to the events defined as part of `LoopbackEvents`.
#[derive(Debug, Clone, Copy)]
pub struct NoEvents;

impl LoopbackEvents for NoEvents {
    fn bytes_looped(&self, _count: usize) {}
    fn transfer_stalled(&self, _pending: usize) {}
    fn uart_programmed(&self, _config: &UartConfig) {}
    fn modem_control_changed(&self, _control: ModemControl, _status: ModemStatus) {}
    fn break_requested(&self, _asserted: bool) {}
    fn fifo_reset(&self, _tx: bool, _rx: bool) {}
    fn lifecycle_changed(&self, _lifecycle: Lifecycle) {}
}

impl<EV: LoopbackEvents> LoopbackEvents for Arc<EV> {
    fn bytes_looped(&self, count: usize) {
        self.as_ref().bytes_looped(count);
    }

    fn transfer_stalled(&self, pending: usize) {
        self.as_ref().transfer_stalled(pending);
    }

    fn uart_programmed(&self, config: &UartConfig) {
        self.as_ref().uart_programmed(config);
    }

    fn modem_control_changed(&self, control: ModemControl, status: ModemStatus) {
        self.as_ref().modem_control_changed(control, status);
    }

    fn break_requested(&self, asserted: bool) {
        self.as_ref().break_requested(asserted);
    }

    fn fifo_reset(&self, tx: bool, rx: bool) {
        self.as_ref().fifo_reset(tx, rx);
    }

    fn lifecycle_changed(&self, lifecycle: Lifecycle) {
        self.as_ref().lifecycle_changed(lifecycle);
    }
}

/// Forwards every event to [`tracing`](https://docs.rs/tracing) as a
/// structured record.
///
/// Data path events are emitted at `TRACE` level, configuration changes at
/// `DEBUG`, and stalled transfers at `WARN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl LoopbackEvents for TracingEvents {
    fn bytes_looped(&self, count: usize) {
        trace!(count, "looped transmit data");
    }

    fn transfer_stalled(&self, pending: usize) {
        warn!(pending, "receive queue full, transmit data held back");
    }

    fn uart_programmed(&self, config: &UartConfig) {
        debug!(
            baud_rate = config.baud_rate,
            data_bits = u8::from(config.data_bits),
            stop_half_bits = u8::from(config.stop_bits),
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            latency_timer = config.latency_timer,
            "line settings programmed"
        );
    }

    fn modem_control_changed(&self, control: ModemControl, status: ModemStatus) {
        debug!(
            dtr = control.dtr,
            rts = control.rts,
            cts = status.cts,
            dsr = status.dsr,
            ri = status.ri,
            dcd = status.dcd,
            "modem control changed"
        );
    }

    fn break_requested(&self, asserted: bool) {
        debug!(asserted, "break requested");
    }

    fn fifo_reset(&self, tx: bool, rx: bool) {
        debug!(tx, rx, "fifo reset requested");
    }

    fn lifecycle_changed(&self, lifecycle: Lifecycle) {
        debug!(?lifecycle, "port lifecycle changed");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Level, Metadata, Subscriber};

    /// Records every event, for asserting on what the port reported.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingEvents {
        pub(crate) looped: Mutex<Vec<usize>>,
        pub(crate) stalled: Mutex<Vec<usize>>,
        pub(crate) configs: Mutex<Vec<UartConfig>>,
        pub(crate) modem: Mutex<Vec<(ModemControl, ModemStatus)>>,
        pub(crate) breaks: Mutex<Vec<bool>>,
        pub(crate) fifo_resets: Mutex<Vec<(bool, bool)>>,
        pub(crate) lifecycle: Mutex<Vec<Lifecycle>>,
    }

    impl LoopbackEvents for RecordingEvents {
        fn bytes_looped(&self, count: usize) {
            self.looped.lock().unwrap().push(count);
        }

        fn transfer_stalled(&self, pending: usize) {
            self.stalled.lock().unwrap().push(pending);
        }

        fn uart_programmed(&self, config: &UartConfig) {
            self.configs.lock().unwrap().push(*config);
        }

        fn modem_control_changed(&self, control: ModemControl, status: ModemStatus) {
            self.modem.lock().unwrap().push((control, status));
        }

        fn break_requested(&self, asserted: bool) {
            self.breaks.lock().unwrap().push(asserted);
        }

        fn fifo_reset(&self, tx: bool, rx: bool) {
            self.fifo_resets.lock().unwrap().push((tx, rx));
        }

        fn lifecycle_changed(&self, lifecycle: Lifecycle) {
            self.lifecycle.lock().unwrap().push(lifecycle);
        }
    }

    #[test]
    fn test_arc_forwards_events() {
        let events = Arc::new(RecordingEvents::default());
        let shared = events.clone();

        shared.bytes_looped(4);
        shared.transfer_stalled(9);
        shared.fifo_reset(true, false);
        shared.lifecycle_changed(Lifecycle::Active);

        assert_eq!(*events.looped.lock().unwrap(), vec![4]);
        assert_eq!(*events.stalled.lock().unwrap(), vec![9]);
        assert_eq!(*events.fifo_resets.lock().unwrap(), vec![(true, false)]);
        assert_eq!(*events.lifecycle.lock().unwrap(), vec![Lifecycle::Active]);
    }

    type Captured = Arc<Mutex<Vec<(Level, Vec<&'static str>)>>>;

    // Keeps the level and field names of every event.
    struct CapturingSubscriber(Captured);

    impl Subscriber for CapturingSubscriber {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _span: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }

        fn record(&self, _span: &Id, _values: &Record<'_>) {}

        fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

        fn event(&self, event: &Event<'_>) {
            let mut fields: Vec<&'static str> = event.fields().map(|field| field.name()).collect();
            fields.sort_unstable();
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), fields));
        }

        fn enter(&self, _span: &Id) {}

        fn exit(&self, _span: &Id) {}
    }

    #[test]
    fn test_tracing_events_records() {
        let captured = Captured::default();
        tracing::subscriber::with_default(CapturingSubscriber(captured.clone()), || {
            let events = TracingEvents;
            events.bytes_looped(13);
            events.transfer_stalled(2);
            events.uart_programmed(&UartConfig::default());
            events.modem_control_changed(ModemControl::default(), ModemStatus::default());
            events.break_requested(true);
            events.fifo_reset(true, false);
            events.lifecycle_changed(Lifecycle::TornDown);
        });

        let records = captured.lock().unwrap();
        assert_eq!(records.len(), 7);
        assert_eq!(records[0], (Level::TRACE, vec!["count", "message"]));
        assert_eq!(records[1], (Level::WARN, vec!["message", "pending"]));
        assert_eq!(
            records[2],
            (
                Level::DEBUG,
                vec![
                    "baud_rate",
                    "data_bits",
                    "flow_control",
                    "latency_timer",
                    "message",
                    "parity",
                    "stop_half_bits"
                ]
            )
        );
        assert_eq!(
            records[3],
            (
                Level::DEBUG,
                vec!["cts", "dcd", "dsr", "dtr", "message", "ri", "rts"]
            )
        );
        assert_eq!(records[4], (Level::DEBUG, vec!["asserted", "message"]));
        assert_eq!(records[5], (Level::DEBUG, vec!["message", "rx", "tx"]));
        assert_eq!(records[6], (Level::DEBUG, vec!["lifecycle", "message"]));
    }
}
