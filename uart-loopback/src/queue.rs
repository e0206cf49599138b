// Copyright 2026 The uart-loopback Authors. All Rights Reserved.
//
// SPDX-License-Identifier: Apache-2.0 OR BSD-3-Clause

//! Provides the fixed-capacity byte queues backing the loopback port.
//!
//! A queue is a circular buffer with two monotonically increasing counters:
//! the producer index (next logical write position) and the consumer index
//! (next logical read position). The number of unread bytes is always
//! `producer_index - consumer_index`, which never exceeds the capacity, and
//! the physical slot of a logical index is `index % capacity`.
//!
//! The indices are 64-bit counters and are never reduced. Slot mapping is
//! only continuous across the `u64` wrap when the capacity is a power of
//! two, so a queue of any other capacity is good for 2^64 bytes of traffic.
//!
//! A [`RingQueue`](struct.RingQueue.html) owned by a single party exposes
//! every operation directly. Calling [`split`](struct.RingQueue.html#method.split)
//! turns it into a [`Producer`](struct.Producer.html) and a
//! [`Consumer`](struct.Consumer.html) that can live on different threads.
//! Each handle can only advance its own index: the producer publishes its
//! index with release ordering after the bytes are stored, the consumer
//! publishes its index with release ordering after the bytes are copied out.

use std::collections::TryReserveError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::{cmp, result};

/// Capacity of each queue of the reference loopback device.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Errors encountered while creating or managing queues.
#[derive(Debug)]
pub enum Error {
    /// The requested capacity is not a positive number of bytes.
    InvalidCapacity,
    /// The queue storage could not be reserved.
    Allocation(TryReserveError),
    /// The producer and consumer handles belong to different queues.
    MismatchedHandles,
}

/// Specialized Result type for [queue Errors](enum.Error.html).
pub type Result<T> = result::Result<T, Error>;

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCapacity => write!(f, "Queue capacity must be greater than zero"),
            Error::Allocation(e) => write!(f, "Cannot allocate queue storage: {}", e),
            Error::MismatchedHandles => write!(f, "Handles belong to different queues"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Allocation(e) => Some(e),
            _ => None,
        }
    }
}

// Storage and indices shared by the producer and consumer roles.
struct Ring {
    storage: Box<[AtomicU8]>,
    producer_index: AtomicU64,
    consumer_index: AtomicU64,
}

impl Ring {
    fn new(capacity: usize) -> Result<Ring> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let mut storage: Vec<AtomicU8> = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(Error::Allocation)?;
        storage.resize_with(capacity, || AtomicU8::new(0));

        Ok(Ring {
            storage: storage.into_boxed_slice(),
            producer_index: AtomicU64::new(0),
            consumer_index: AtomicU64::new(0),
        })
    }

    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn slot(&self, index: u64) -> &AtomicU8 {
        // The modulo keeps every access inside `[0, capacity)`. Consecutive
        // indices stay on consecutive slots up to `u64::MAX`; past that
        // wrap they do too only for power of two capacities.
        &self.storage[(index % self.capacity() as u64) as usize]
    }

    // Unread bytes as seen by a party that owns neither index. The two
    // loads are not atomic together, so clamp to the capacity.
    fn pending(&self) -> usize {
        let consumer = self.consumer_index.load(Ordering::Acquire);
        let producer = self.producer_index.load(Ordering::Acquire);
        cmp::min(producer.wrapping_sub(consumer), self.capacity() as u64) as usize
    }

    // Unread bytes as seen by the producer. The consumer may only have
    // advanced since the load, so this never overstates free space.
    fn pending_for_producer(&self) -> usize {
        let producer = self.producer_index.load(Ordering::Relaxed);
        let consumer = self.consumer_index.load(Ordering::Acquire);
        producer.wrapping_sub(consumer) as usize
    }

    // Unread bytes as seen by the consumer. The producer may only have
    // advanced since the load, so this never overstates pending data.
    fn pending_for_consumer(&self) -> usize {
        let consumer = self.consumer_index.load(Ordering::Relaxed);
        let producer = self.producer_index.load(Ordering::Acquire);
        producer.wrapping_sub(consumer) as usize
    }

    fn produce(&self, bytes: &[u8]) -> usize {
        let producer = self.producer_index.load(Ordering::Relaxed);
        let free = self.capacity() - self.pending_for_producer();
        let count = cmp::min(bytes.len(), free);

        for (offset, &byte) in bytes[..count].iter().enumerate() {
            self.slot(producer.wrapping_add(offset as u64))
                .store(byte, Ordering::Relaxed);
        }
        // Publish only after every byte is in place.
        self.producer_index
            .store(producer.wrapping_add(count as u64), Ordering::Release);
        count
    }

    fn copy_out(&self, from: u64, count: usize) -> Vec<u8> {
        (0..count as u64)
            .map(|offset| self.slot(from.wrapping_add(offset)).load(Ordering::Relaxed))
            .collect()
    }

    fn peek(&self, max_bytes: usize) -> Vec<u8> {
        let consumer = self.consumer_index.load(Ordering::Relaxed);
        let count = cmp::min(max_bytes, self.pending_for_consumer());
        self.copy_out(consumer, count)
    }

    fn consume(&self, max_bytes: usize) -> usize {
        let consumer = self.consumer_index.load(Ordering::Relaxed);
        let count = cmp::min(max_bytes, self.pending_for_consumer());
        // The producer may reuse the slots once this store is visible.
        self.consumer_index
            .store(consumer.wrapping_add(count as u64), Ordering::Release);
        count
    }

    fn read(&self, max_bytes: usize) -> Vec<u8> {
        let bytes = self.peek(max_bytes);
        self.consume(bytes.len());
        bytes
    }

    fn contents(&self) -> Vec<u8> {
        let consumer = self.consumer_index.load(Ordering::Acquire);
        self.copy_out(consumer, self.pending())
    }

    fn clear(&self) {
        for slot in self.storage.iter() {
            slot.store(0, Ordering::Relaxed);
        }
        self.consumer_index.store(0, Ordering::Release);
        self.producer_index.store(0, Ordering::Release);
    }
}

/// A fixed-capacity circular byte queue owned by a single party.
///
/// # Example
///
/// ```rust
/// # use uart_loopback::RingQueue;
/// let mut queue = RingQueue::new(8).unwrap();
///
/// // Writes are partial once the queue fills up.
/// assert_eq!(queue.write(b"0123456789"), 8);
/// assert_eq!(queue.free_space(), 0);
///
/// assert_eq!(queue.peek(2), b"01");
/// assert_eq!(queue.read(4), b"0123");
/// assert_eq!(queue.write(b"ab"), 2);
/// assert_eq!(queue.read(16), b"4567ab");
/// ```
pub struct RingQueue {
    ring: Arc<Ring>,
}

impl RingQueue {
    /// Creates a queue holding up to `capacity` bytes, with zeroed storage
    /// and both indices at zero.
    ///
    /// # Arguments
    /// * `capacity` - Size of the queue storage, in bytes. Must be positive.
    pub fn new(capacity: usize) -> Result<RingQueue> {
        Ok(RingQueue {
            ring: Arc::new(Ring::new(capacity)?),
        })
    }

    /// Reunites the two halves of a queue previously split with
    /// [`split`](#method.split).
    ///
    /// The handles are given back if they do not belong to the same queue.
    pub fn join(
        producer: Producer,
        consumer: Consumer,
    ) -> result::Result<RingQueue, (Producer, Consumer)> {
        if !producer.feeds(&consumer) {
            return Err((producer, consumer));
        }
        drop(consumer);
        Ok(RingQueue {
            ring: producer.ring,
        })
    }

    /// Returns the fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Returns the number of unread bytes.
    pub fn pending_count(&self) -> usize {
        self.ring.pending()
    }

    /// Returns how many more bytes can be written.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.pending_count()
    }

    /// Appends as many bytes from `bytes` as fit in the free space and
    /// returns how many were written.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.ring.produce(bytes)
    }

    /// Removes and returns up to `max_bytes` unread bytes, oldest first.
    pub fn read(&mut self, max_bytes: usize) -> Vec<u8> {
        self.ring.read(max_bytes)
    }

    /// Returns up to `max_bytes` unread bytes without consuming them.
    pub fn peek(&self, max_bytes: usize) -> Vec<u8> {
        self.ring.peek(max_bytes)
    }

    /// Zeroes the storage and moves both indices back to zero.
    pub fn reset(&mut self) {
        self.ring.clear()
    }

    /// Splits the queue into its producer and consumer halves.
    pub fn split(self) -> (Producer, Consumer) {
        let producer = Producer {
            ring: self.ring.clone(),
        };
        let consumer = Consumer { ring: self.ring };
        (producer, consumer)
    }
}

impl Debug for RingQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingQueue")
            .field("capacity", &self.capacity())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// The writing half of a split [`RingQueue`](struct.RingQueue.html).
///
/// Only this handle can advance the producer index.
pub struct Producer {
    ring: Arc<Ring>,
}

impl Producer {
    /// Returns the fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Returns the number of bytes the consumer has not read yet.
    pub fn pending_count(&self) -> usize {
        self.ring.pending_for_producer()
    }

    /// Returns how many more bytes can be written.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.pending_count()
    }

    /// Appends as many bytes from `bytes` as fit in the free space and
    /// returns how many were written.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.ring.produce(bytes)
    }

    /// Checks whether `consumer` reads from the queue this handle writes to.
    pub fn feeds(&self, consumer: &Consumer) -> bool {
        Arc::ptr_eq(&self.ring, &consumer.ring)
    }

    // Unread bytes, for state snapshots taken on the producer side.
    pub(crate) fn contents(&self) -> Vec<u8> {
        self.ring.contents()
    }
}

impl Debug for Producer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// The reading half of a split [`RingQueue`](struct.RingQueue.html).
///
/// Only this handle can advance the consumer index.
pub struct Consumer {
    ring: Arc<Ring>,
}

impl Consumer {
    /// Returns the fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Returns the number of unread bytes.
    pub fn pending_count(&self) -> usize {
        self.ring.pending_for_consumer()
    }

    /// Returns how much free space the producer has.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.pending_count()
    }

    /// Removes and returns up to `max_bytes` unread bytes, oldest first.
    pub fn read(&mut self, max_bytes: usize) -> Vec<u8> {
        self.ring.read(max_bytes)
    }

    /// Returns up to `max_bytes` unread bytes without consuming them.
    pub fn peek(&self, max_bytes: usize) -> Vec<u8> {
        self.ring.peek(max_bytes)
    }

    /// Marks up to `count` unread bytes as consumed and returns how many
    /// were actually consumed.
    pub fn consume(&mut self, count: usize) -> usize {
        self.ring.consume(count)
    }
}

impl Debug for Consumer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Resets a split queue through both of its halves.
///
/// Holding both handles mutably guarantees that neither side is touching
/// the queue while it is cleared.
pub fn reset_split(producer: &mut Producer, consumer: &mut Consumer) -> Result<()> {
    if !producer.feeds(consumer) {
        return Err(Error::MismatchedHandles);
    }
    producer.ring.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_invalid_capacity() {
        assert!(matches!(RingQueue::new(0), Err(Error::InvalidCapacity)));
        assert_eq!(
            Error::InvalidCapacity.to_string(),
            "Queue capacity must be greater than zero"
        );
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue = RingQueue::new(DEFAULT_CAPACITY).unwrap();

        assert_eq!(queue.capacity(), DEFAULT_CAPACITY);
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.free_space(), DEFAULT_CAPACITY);
        assert!(queue.peek(16).is_empty());
    }

    #[test]
    fn test_counts_add_up_to_capacity() {
        let mut queue = RingQueue::new(64).unwrap();
        let ops: [(usize, usize); 6] = [(10, 0), (50, 20), (30, 45), (64, 7), (3, 100), (0, 5)];

        for (write_len, read_len) in ops.iter() {
            queue.write(&pattern(*write_len, 0));
            assert_eq!(queue.pending_count() + queue.free_space(), 64);
            queue.read(*read_len);
            assert_eq!(queue.pending_count() + queue.free_space(), 64);
        }
    }

    #[test]
    fn test_partial_write() {
        let mut queue = RingQueue::new(16).unwrap();

        assert_eq!(queue.write(&pattern(10, 0)), 10);
        // Only 6 more bytes fit; the rest is left to the caller.
        assert_eq!(queue.write(&pattern(10, 10)), 6);
        assert_eq!(queue.write(b"x"), 0);
        assert_eq!(queue.free_space(), 0);

        assert_eq!(queue.read(32), pattern(16, 0));
    }

    #[test]
    fn test_read_empty_queue() {
        let mut queue = RingQueue::new(16).unwrap();

        assert!(queue.read(8).is_empty());
        queue.write(b"ab");
        assert_eq!(queue.read(8), b"ab");
        assert!(queue.read(8).is_empty());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut queue = RingQueue::new(16).unwrap();
        queue.write(b"hello");

        assert_eq!(queue.peek(3), b"hel");
        assert_eq!(queue.peek(10), b"hello");
        assert_eq!(queue.pending_count(), 5);
        assert_eq!(queue.read(5), b"hello");
    }

    #[test]
    fn test_wraparound() {
        let mut queue = RingQueue::new(DEFAULT_CAPACITY).unwrap();

        assert_eq!(queue.write(&pattern(1500, 0)), 1500);
        assert_eq!(queue.read(1500), pattern(1500, 0));

        let second = pattern(1000, 7);
        assert_eq!(queue.write(&second), 1000);

        // The tail of the storage holds the first 548 bytes, the head of the
        // storage the remaining 452.
        let ring = &queue.ring;
        for (offset, &byte) in second.iter().enumerate() {
            let physical = (1500 + offset) % DEFAULT_CAPACITY;
            assert_eq!(ring.storage[physical].load(Ordering::Relaxed), byte);
        }
        assert_eq!(ring.storage[451].load(Ordering::Relaxed), second[999]);
        assert_eq!(ring.storage[452].load(Ordering::Relaxed), pattern(1500, 0)[452]);

        assert_eq!(queue.read(DEFAULT_CAPACITY), second);
    }

    #[test]
    fn test_index_counter_wrap() {
        let mut queue = RingQueue::new(8).unwrap();
        let start = u64::MAX - 2;
        queue.ring.producer_index.store(start, Ordering::Relaxed);
        queue.ring.consumer_index.store(start, Ordering::Relaxed);
        assert_eq!(queue.pending_count(), 0);

        // With a power of two capacity the slots stay consecutive when the
        // counters wrap to zero: u64::MAX - 2 maps to slot 5, 0 to slot 0.
        assert_eq!(queue.write(b"abcdefgh"), 8);
        assert_eq!(queue.free_space(), 0);
        assert_eq!(queue.ring.producer_index.load(Ordering::Relaxed), 5);
        let storage: Vec<u8> = queue
            .ring
            .storage
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect();
        assert_eq!(storage, b"defghabc");

        assert_eq!(queue.read(8), b"abcdefgh");
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_round_trip_at_every_offset() {
        let mut queue = RingQueue::new(7).unwrap();

        for start in 0..7 {
            queue.write(&pattern(start, 0));
            queue.read(start);
            let data = pattern(7, start as u8);
            assert_eq!(queue.write(&data), 7);
            assert_eq!(queue.read(7), data);
        }
    }

    #[test]
    fn test_reset() {
        let mut queue = RingQueue::new(8).unwrap();
        queue.write(b"abcdef");
        queue.read(2);

        queue.reset();
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.free_space(), 8);
        assert!(queue
            .ring
            .storage
            .iter()
            .all(|slot| slot.load(Ordering::Relaxed) == 0));
        assert_eq!(queue.ring.producer_index.load(Ordering::Relaxed), 0);
        assert_eq!(queue.ring.consumer_index.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_split_and_join() {
        let queue = RingQueue::new(8).unwrap();
        let (mut producer, mut consumer) = queue.split();
        assert!(producer.feeds(&consumer));

        assert_eq!(producer.write(b"abc"), 3);
        assert_eq!(consumer.pending_count(), 3);
        assert_eq!(producer.free_space(), 5);

        assert_eq!(consumer.peek(2), b"ab");
        assert_eq!(consumer.consume(2), 2);
        assert_eq!(consumer.consume(10), 1);
        assert_eq!(consumer.pending_count(), 0);

        let (other_producer, other_consumer) = RingQueue::new(8).unwrap().split();
        let (producer, other_consumer) = RingQueue::join(producer, other_consumer).unwrap_err();
        assert!(!producer.feeds(&other_consumer));

        let mut queue = RingQueue::join(producer, consumer).unwrap();
        assert_eq!(queue.write(b"z"), 1);
        assert_eq!(queue.read(1), b"z");
        assert!(RingQueue::join(other_producer, other_consumer).is_ok());
    }

    #[test]
    fn test_reset_split() {
        let (mut producer, mut consumer) = RingQueue::new(8).unwrap().split();
        let (mut other_producer, _other_consumer) = RingQueue::new(8).unwrap().split();
        producer.write(b"abc");

        assert!(matches!(
            reset_split(&mut other_producer, &mut consumer),
            Err(Error::MismatchedHandles)
        ));
        assert_eq!(consumer.pending_count(), 3);

        reset_split(&mut producer, &mut consumer).unwrap();
        assert_eq!(consumer.pending_count(), 0);
        assert_eq!(producer.free_space(), 8);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        const TOTAL: usize = 100_000;
        let (mut producer, mut consumer) = RingQueue::new(61).unwrap().split();

        let writer = thread::spawn(move || {
            let data = pattern(TOTAL, 3);
            let mut sent = 0;
            while sent < TOTAL {
                let end = cmp::min(sent + 17, TOTAL);
                sent += producer.write(&data[sent..end]);
                thread::yield_now();
            }
        });

        let mut received = Vec::with_capacity(TOTAL);
        while received.len() < TOTAL {
            let chunk = consumer.read(23);
            assert!(chunk.len() <= 23);
            received.extend_from_slice(&chunk);
            thread::yield_now();
        }

        writer.join().unwrap();
        assert_eq!(received, pattern(TOTAL, 3));
        assert_eq!(consumer.pending_count(), 0);
    }
}
