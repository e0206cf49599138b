// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Provides the loopback serial port.
//!
//! The port owns a transmit queue and a receive queue. The host serial
//! framework writes the client's bytes to the transmit queue through a
//! [`PortClient`](struct.PortClient.html), tells the port about them with
//! [`on_transmit_data_available`](struct.LoopbackPort.html#method.on_transmit_data_available),
//! and gets notified back through two [`Trigger`](../trait.Trigger.html)
//! objects once the bytes are readable on the receive side.

use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};
use std::result;

use crate::config::{self, DataBits, FlowControl, Parity, StopBits, UartConfig};
use crate::engine::{Transfer, TransferEngine};
use crate::events::{LoopbackEvents, NoEvents};
use crate::modem::{ModemControl, ModemStatus};
use crate::queue::{self, Consumer, Producer, RingQueue, DEFAULT_CAPACITY};
use crate::Trigger;

/// Largest queue capacity accepted when restoring a saved state.
pub const MAX_STATE_CAPACITY: usize = 1 << 20;

/// Lifecycle stage of a port.
///
/// A port only exists once its queues are allocated, so the uninitialized
/// stage is represented by [`PortBuilder`](struct.PortBuilder.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Queues are allocated; the host did not activate the port yet.
    Ready,
    /// The host activated the port.
    Active,
    /// The port was torn down and refuses every further request.
    TornDown,
}

/// Errors encountered while handling loopback port operations.
#[derive(Debug)]
pub enum Error<E> {
    /// Failed to allocate the port queues.
    Queue(queue::Error),
    /// A saved state holds an invalid line configuration.
    Config(config::Error),
    /// A saved state is inconsistent.
    InvalidState(&'static str),
    /// Failed to trigger a notification.
    Trigger(E),
    /// The port was torn down.
    TornDown,
    /// The client endpoint is currently handed out.
    ClientAttached,
}

impl<E: Display> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Queue(e) => write!(f, "Cannot create port queues: {}", e),
            Error::Config(e) => write!(f, "Invalid line configuration: {}", e),
            Error::InvalidState(reason) => write!(f, "Invalid port state: {}", reason),
            Error::Trigger(e) => write!(f, "Cannot trigger notification: {}", e),
            Error::TornDown => write!(f, "The port was torn down"),
            Error::ClientAttached => write!(f, "The client endpoint is attached"),
        }
    }
}

impl<E: fmt::Debug + Display> std::error::Error for Error<E> {}

/// The client side of a port: writes to the transmit queue and reads from
/// the receive queue.
///
/// The host framework moves this endpoint wherever its client I/O happens,
/// possibly another thread.
#[derive(Debug)]
pub struct PortClient {
    tx: Producer,
    rx: Consumer,
}

impl PortClient {
    /// Queues `bytes` for transmission and returns how many fit.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.tx.write(bytes)
    }

    /// Removes and returns up to `max_bytes` looped back bytes.
    pub fn read(&mut self, max_bytes: usize) -> Vec<u8> {
        self.rx.read(max_bytes)
    }

    /// Returns the number of transmitted bytes not looped back yet.
    pub fn tx_pending(&self) -> usize {
        self.tx.pending_count()
    }

    /// Returns how many more bytes can be queued for transmission.
    pub fn tx_free_space(&self) -> usize {
        self.tx.free_space()
    }

    /// Returns the number of bytes waiting to be read.
    pub fn rx_pending(&self) -> usize {
        self.rx.pending_count()
    }
}

/// Builds a [`LoopbackPort`](struct.LoopbackPort.html).
///
/// The builder holds everything the port needs before its queues exist.
pub struct PortBuilder<EV = NoEvents> {
    capacity: usize,
    config: UartConfig,
    modem_control: ModemControl,
    events: EV,
}

impl PortBuilder<NoEvents> {
    /// Creates a builder for a port with
    /// [`DEFAULT_CAPACITY`](../queue/constant.DEFAULT_CAPACITY.html) byte
    /// queues, the default line settings and no event sink.
    pub fn new() -> Self {
        PortBuilder {
            capacity: DEFAULT_CAPACITY,
            config: UartConfig::default(),
            modem_control: ModemControl::default(),
            events: NoEvents,
        }
    }
}

impl Default for PortBuilder<NoEvents> {
    fn default() -> Self {
        Self::new()
    }
}

impl<EV: LoopbackEvents> PortBuilder<EV> {
    /// Sets the capacity of both queues, in bytes.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the initial line settings.
    pub fn config(mut self, config: UartConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the initial state of the modem control lines.
    pub fn modem_control(mut self, modem_control: ModemControl) -> Self {
        self.modem_control = modem_control;
        self
    }

    /// Sets the object reporting the port events.
    pub fn events<EV2: LoopbackEvents>(self, events: EV2) -> PortBuilder<EV2> {
        PortBuilder {
            capacity: self.capacity,
            config: self.config,
            modem_control: self.modem_control,
            events,
        }
    }

    /// Allocates the queues and creates the port.
    ///
    /// # Arguments
    /// * `rx_data_evt` - Triggered when looped back data becomes readable.
    /// * `tx_space_evt` - Triggered when the transmit queue may have more
    ///                    free space.
    pub fn build<T: Trigger>(
        self,
        rx_data_evt: T,
        tx_space_evt: T,
    ) -> Result<LoopbackPort<T, EV>, Error<T::E>> {
        let (client_tx, tx) = RingQueue::new(self.capacity)
            .map_err(Error::Queue)?
            .split();
        let (rx, client_rx) = RingQueue::new(self.capacity)
            .map_err(Error::Queue)?
            .split();

        self.events.lifecycle_changed(Lifecycle::Ready);
        Ok(LoopbackPort {
            lifecycle: Lifecycle::Ready,
            config: self.config,
            modem_control: self.modem_control,
            tx,
            rx,
            client: Some(PortClient {
                tx: client_tx,
                rx: client_rx,
            }),
            rx_data_evt,
            tx_space_evt,
            events: self.events,
        })
    }
}

/// The state of the loopback port, used for saving and restoring it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoopbackState {
    /// Capacity of each queue, in bytes.
    pub capacity: u64,
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits per character (5 to 8).
    pub data_bits: u8,
    /// Stop bit length, in half bits.
    pub stop_bits: u8,
    /// Parity encoding.
    pub parity: u8,
    /// Flow control mode encoding.
    pub flow_control: u8,
    /// Software flow control resume character.
    pub xon: u8,
    /// Software flow control pause character.
    pub xoff: u8,
    /// Receive latency timer.
    pub latency_timer: u32,
    /// Data Terminal Ready.
    pub dtr: bool,
    /// Request To Send.
    pub rts: bool,
    /// Whether the host activated the port.
    pub active: bool,
    /// Transmitted bytes not looped back yet.
    pub tx_buffer: Vec<u8>,
    /// Looped back bytes not read yet.
    pub rx_buffer: Vec<u8>,
}

impl LoopbackState {
    fn new(capacity: usize, config: &UartConfig, control: ModemControl, active: bool) -> Self {
        let (flow_control, xon, xoff) = config.flow_control.to_raw();
        LoopbackState {
            capacity: capacity as u64,
            baud_rate: config.baud_rate,
            data_bits: config.data_bits.into(),
            stop_bits: config.stop_bits.into(),
            parity: config.parity.into(),
            flow_control,
            xon,
            xoff,
            latency_timer: config.latency_timer,
            dtr: control.dtr,
            rts: control.rts,
            active,
            tx_buffer: Vec::new(),
            rx_buffer: Vec::new(),
        }
    }

    fn config(&self) -> config::Result<UartConfig> {
        Ok(UartConfig {
            baud_rate: self.baud_rate,
            data_bits: DataBits::try_from(self.data_bits)?,
            stop_bits: StopBits::try_from(self.stop_bits)?,
            parity: Parity::try_from(self.parity)?,
            flow_control: FlowControl::from_raw(self.flow_control, self.xon, self.xoff)?,
            latency_timer: self.latency_timer,
        })
    }
}

impl Default for LoopbackState {
    fn default() -> Self {
        LoopbackState::new(
            DEFAULT_CAPACITY,
            &UartConfig::default(),
            ModemControl::default(),
            false,
        )
    }
}

/// A loopback UART.
///
/// Bytes queued on the transmit side are copied to the receive side when
/// the host reports them with
/// [`on_transmit_data_available`](#method.on_transmit_data_available).
/// Line configuration requests are accepted and stored, and the modem
/// status lines mirror the modem control lines.
///
/// # Example
///
/// ```rust
/// # use std::io::Error;
/// # use std::ops::Deref;
/// # use uart_loopback::{LoopbackPort, Trigger};
/// # use vmm_sys_util::eventfd::EventFd;
///
/// struct EventFdTrigger(EventFd);
/// impl Trigger for EventFdTrigger {
///     type E = Error;
///
///     fn trigger(&self) -> Result<(), Error> {
///         self.write(1)
///     }
/// }
/// impl Deref for EventFdTrigger {
///     type Target = EventFd;
///     fn deref(&self) -> &Self::Target {
///         &self.0
///     }
/// }
/// impl EventFdTrigger {
///     pub fn new(flag: i32) -> Self {
///         EventFdTrigger(EventFd::new(flag).unwrap())
///     }
///     pub fn try_clone(&self) -> Self {
///         EventFdTrigger((**self).try_clone().unwrap())
///     }
/// }
///
/// let rx_evt = EventFdTrigger::new(libc::EFD_NONBLOCK);
/// let tx_evt = EventFdTrigger::new(libc::EFD_NONBLOCK);
/// let mut port = LoopbackPort::new(rx_evt.try_clone(), tx_evt.try_clone()).unwrap();
/// let mut client = port.attach_client().unwrap();
///
/// client.write(b"Hello, World!");
/// port.on_transmit_data_available().unwrap();
///
/// // Both notifications fired.
/// assert_eq!(rx_evt.read().unwrap(), 1);
/// assert_eq!(tx_evt.read().unwrap(), 1);
/// assert_eq!(client.read(64), b"Hello, World!");
/// ```
pub struct LoopbackPort<T: Trigger, EV: LoopbackEvents> {
    lifecycle: Lifecycle,
    config: UartConfig,
    modem_control: ModemControl,
    // Engine side of the queues: consumer of the transmit queue, producer
    // of the receive queue.
    tx: Consumer,
    rx: Producer,
    // Client side of the queues, while nobody holds it.
    client: Option<PortClient>,

    // Used for notifying the host about new receive data and about free
    // transmit space.
    rx_data_evt: T,
    tx_space_evt: T,
    events: EV,
}

impl<T: Trigger> LoopbackPort<T, NoEvents> {
    /// Creates a port with the default capacity and settings.
    ///
    /// # Arguments
    /// * `rx_data_evt` - Triggered when looped back data becomes readable.
    /// * `tx_space_evt` - Triggered when the transmit queue may have more
    ///                    free space.
    ///
    /// # Example
    ///
    /// You can see an example of how to use this function in the
    /// [`Example` section from `LoopbackPort`](struct.LoopbackPort.html#example).
    pub fn new(rx_data_evt: T, tx_space_evt: T) -> Result<Self, Error<T::E>> {
        PortBuilder::new().build(rx_data_evt, tx_space_evt)
    }
}

impl<T: Trigger, EV: LoopbackEvents> LoopbackPort<T, EV> {
    /// Creates a port from a previously saved `state`.
    ///
    /// The client endpoint of the new port is detached, and pending bytes of
    /// both queues are restored in order. No notification is triggered.
    pub fn from_state(
        state: &LoopbackState,
        rx_data_evt: T,
        tx_space_evt: T,
        events: EV,
    ) -> Result<Self, Error<T::E>> {
        let capacity = usize::try_from(state.capacity)
            .map_err(|_| Error::InvalidState("queue capacity does not fit in memory"))?;
        if capacity > MAX_STATE_CAPACITY {
            return Err(Error::InvalidState("queue capacity exceeds the restore limit"));
        }
        if state.tx_buffer.len() > capacity || state.rx_buffer.len() > capacity {
            return Err(Error::InvalidState("pending data exceeds the queue capacity"));
        }
        let config = state.config().map_err(Error::Config)?;

        let mut port = PortBuilder::new()
            .capacity(capacity)
            .config(config)
            .modem_control(ModemControl {
                dtr: state.dtr,
                rts: state.rts,
            })
            .events(events)
            .build(rx_data_evt, tx_space_evt)?;

        if let Some(client) = port.client.as_mut() {
            client.write(&state.tx_buffer);
        }
        port.rx.write(&state.rx_buffer);
        if state.active {
            port.set_lifecycle(Lifecycle::Active);
        }
        Ok(port)
    }

    /// Returns the current state of the port.
    ///
    /// Pending bytes are read without consuming them. Save the state while
    /// the client is idle to get a consistent snapshot.
    pub fn state(&self) -> LoopbackState {
        LoopbackState {
            tx_buffer: self.tx.peek(self.tx.capacity()),
            rx_buffer: self.rx.contents(),
            ..LoopbackState::new(
                self.capacity(),
                &self.config,
                self.modem_control,
                self.lifecycle == Lifecycle::Active,
            )
        }
    }

    /// Provides a reference to the receive data notification object.
    pub fn rx_data_evt(&self) -> &T {
        &self.rx_data_evt
    }

    /// Provides a reference to the transmit space notification object.
    pub fn tx_space_evt(&self) -> &T {
        &self.tx_space_evt
    }

    /// Provides a reference to the events object.
    pub fn events(&self) -> &EV {
        &self.events
    }

    /// Returns the lifecycle stage of the port.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns the capacity of each queue, in bytes.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Returns the line settings last programmed by the host.
    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Returns the modem control lines last programmed by the host.
    pub fn modem_control(&self) -> ModemControl {
        self.modem_control
    }

    /// Returns the modem status lines. In loopback CTS follows RTS, DSR and
    /// DCD follow DTR, and RI is never set.
    pub fn modem_status(&self) -> ModemStatus {
        ModemStatus::from(self.modem_control)
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        if self.lifecycle != lifecycle {
            self.lifecycle = lifecycle;
            self.events.lifecycle_changed(lifecycle);
        }
    }

    fn check_usable(&self) -> Result<(), Error<T::E>> {
        match self.lifecycle {
            Lifecycle::TornDown => Err(Error::TornDown),
            _ => Ok(()),
        }
    }

    fn notify_receive_data_available(&self) -> Result<(), Error<T::E>> {
        self.rx_data_evt.trigger().map_err(Error::Trigger)
    }

    fn notify_transmit_free_space_available(&self) -> Result<(), Error<T::E>> {
        self.tx_space_evt.trigger().map_err(Error::Trigger)
    }

    /// Hands out the client endpoint of the port.
    ///
    /// There is a single endpoint; it has to be given back with
    /// [`detach_client`](#method.detach_client) before it can be attached
    /// again.
    pub fn attach_client(&mut self) -> Result<PortClient, Error<T::E>> {
        self.check_usable()?;
        self.client.take().ok_or(Error::ClientAttached)
    }

    /// Takes back the client endpoint.
    ///
    /// An endpoint belonging to another port is returned to the caller.
    pub fn detach_client(&mut self, client: PortClient) -> result::Result<(), PortClient> {
        if self.client.is_some() || !client.tx.feeds(&self.tx) || !self.rx.feeds(&client.rx) {
            return Err(client);
        }
        self.client = Some(client);
        Ok(())
    }

    /// Activates the port.
    ///
    /// The loopback modem status is published and the host is told the
    /// transmit queue has room.
    pub fn activate(&mut self) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.set_lifecycle(Lifecycle::Active);
        self.events
            .modem_control_changed(self.modem_control, self.modem_status());
        self.notify_transmit_free_space_available()
    }

    /// Deactivates the port. Queued data is kept.
    pub fn deactivate(&mut self) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.set_lifecycle(Lifecycle::Ready);
        Ok(())
    }

    /// Empties both queues and zeroes their storage.
    ///
    /// Only allowed while the client endpoint is detached, so that nobody
    /// touches the queues while they are cleared.
    pub fn reset(&mut self) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        let client = self.client.as_mut().ok_or(Error::ClientAttached)?;
        queue::reset_split(&mut client.tx, &mut self.tx).map_err(Error::Queue)?;
        queue::reset_split(&mut self.rx, &mut client.rx).map_err(Error::Queue)?;
        Ok(())
    }

    /// Tears the port down. Every later request fails with
    /// [`Error::TornDown`](enum.Error.html#variant.TornDown).
    ///
    /// The queue storage is released once the port and its client endpoint
    /// are dropped.
    pub fn tear_down(&mut self) {
        self.set_lifecycle(Lifecycle::TornDown);
    }

    // Runs the engine and reports what happened.
    fn transfer(&mut self) -> Transfer {
        let transfer = TransferEngine::new(&mut self.tx, &mut self.rx).run();
        if transfer.moved > 0 {
            self.events.bytes_looped(transfer.moved);
        }
        if transfer.is_stalled() {
            self.events.transfer_stalled(transfer.held_back);
        }
        transfer
    }

    /// Loops pending transmit data back to the receive queue.
    ///
    /// To be called by the host whenever the client queued new bytes. The
    /// receive data notification is triggered when at least one byte was
    /// moved; the transmit space notification is always triggered, even
    /// when the first one failed. Bytes that do not fit in the receive
    /// queue stay queued on the transmit side.
    pub fn on_transmit_data_available(&mut self) -> Result<Transfer, Error<T::E>> {
        self.check_usable()?;
        let transfer = self.transfer();
        let rx_result = if transfer.moved > 0 {
            self.notify_receive_data_available()
        } else {
            Ok(())
        };
        // Transmit space is signalled even when the receive notification
        // failed, since the transmit queue was already drained.
        self.notify_transmit_free_space_available()?;
        rx_result?;
        Ok(transfer)
    }

    /// To be called by the host once the client drained some of the
    /// receive queue.
    ///
    /// Transmit data held back by a full receive queue is looped back now,
    /// followed by both notifications. Nothing is triggered if no byte
    /// could be moved.
    pub fn on_receive_free_space_available(&mut self) -> Result<Transfer, Error<T::E>> {
        self.check_usable()?;
        if self.tx.pending_count() == 0 {
            return Ok(Transfer::default());
        }

        let transfer = self.transfer();
        if transfer.moved > 0 {
            let rx_result = self.notify_receive_data_available();
            self.notify_transmit_free_space_available()?;
            rx_result?;
        }
        Ok(transfer)
    }

    /// Programs the line settings. Accepted as is, since no physical line
    /// exists.
    pub fn program_uart(
        &mut self,
        baud_rate: u32,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.config.baud_rate = baud_rate;
        self.config.data_bits = data_bits;
        self.config.stop_bits = stop_bits;
        self.config.parity = parity;
        self.events.uart_programmed(&self.config);
        Ok(())
    }

    /// Programs the baud rate.
    pub fn program_baud_rate(&mut self, baud_rate: u32) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.config.baud_rate = baud_rate;
        self.events.uart_programmed(&self.config);
        Ok(())
    }

    /// Programs the flow control mode. It is recorded, not enforced.
    pub fn program_flow_control(&mut self, flow_control: FlowControl) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.config.flow_control = flow_control;
        self.events.uart_programmed(&self.config);
        Ok(())
    }

    /// Programs the receive latency timer.
    pub fn program_latency_timer(&mut self, latency_timer: u32) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.config.latency_timer = latency_timer;
        self.events.uart_programmed(&self.config);
        Ok(())
    }

    /// Sets the DTR and RTS modem control lines.
    pub fn program_modem_control(&mut self, dtr: bool, rts: bool) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.modem_control = ModemControl { dtr, rts };
        self.events
            .modem_control_changed(self.modem_control, self.modem_status());
        Ok(())
    }

    /// Sets or clears a break condition. There is no line to hold, so this
    /// is only reported.
    pub fn send_break(&mut self, asserted: bool) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.events.break_requested(asserted);
        Ok(())
    }

    /// Requests a FIFO flush. The queues are left untouched: a transmit
    /// flush would drop client data the host already accepted, and the
    /// receive queue can only be drained by its reader.
    pub fn reset_fifo(&mut self, tx: bool, rx: bool) -> Result<(), Error<T::E>> {
        self.check_usable()?;
        self.events.fifo_reset(tx, rx);
        Ok(())
    }
}
