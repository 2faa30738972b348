//! Paced command queue.
//!
//! Command stations choke on bursts, so every command leaves through a
//! [`SendQueue`] that enforces a minimum delay between transmissions.
//! Priority commands (emergency stops, power) jump ahead of normal ones;
//! within a class commands leave in the order they were queued.
//!
//! ```rust
//! use trainz_dispatch::priority::SendQueue;
//! use trainz_dispatch::traits::InterfaceCommand;
//! use trainz_dispatch::hal::MockInterface;
//!
//! let mut queue: SendQueue<8> = SendQueue::new(50);
//! let mut interface = MockInterface::new();
//!
//! assert!(queue.push(InterfaceCommand::QueryLocomotives, false));
//! assert!(queue.push(InterfaceCommand::Stop, true));
//!
//! // One command per interval, priority first
//! queue.poll(0, &mut interface).unwrap();
//! queue.poll(20, &mut interface).unwrap();
//! assert_eq!(interface.commands, vec![InterfaceCommand::Stop]);
//!
//! queue.poll(50, &mut interface).unwrap();
//! assert_eq!(interface.commands.len(), 2);
//! ```

use core::cmp::Ordering;

use heapless::binary_heap::{BinaryHeap, Max};
use tracing::{trace, warn};

use crate::traits::{CommandInterface, InterfaceCommand};

/// Default queue capacity used by the controller.
pub const SEND_QUEUE_CAPACITY: usize = 64;

/// A command waiting for transmission.
#[derive(Clone, Debug)]
pub struct QueuedCommand {
    pub command: InterfaceCommand,
    pub priority: bool,
    sequence: u64,
}

impl QueuedCommand {
    fn rank(&self) -> (bool, core::cmp::Reverse<u64>) {
        (self.priority, core::cmp::Reverse(self.sequence))
    }
}

impl PartialEq for QueuedCommand {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl Eq for QueuedCommand {}

impl PartialOrd for QueuedCommand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCommand {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Fixed-capacity command queue with pacing.
///
/// # Capacity
///
/// The queue holds `N` commands. When full:
/// - a priority command displaces the newest normal command
/// - a normal command is rejected
pub struct SendQueue<const N: usize> {
    heap: BinaryHeap<QueuedCommand, Max, N>,
    next_sequence: u64,
    min_interval_ms: u64,
    last_sent_ms: Option<u64>,
}

impl<const N: usize> SendQueue<N> {
    /// Creates an empty queue sending at most one command per `min_interval_ms`.
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
            min_interval_ms,
            last_sent_ms: None,
        }
    }

    /// Queue a command. Returns false when it was rejected.
    #[must_use]
    pub fn push(&mut self, command: InterfaceCommand, priority: bool) -> bool {
        let entry = QueuedCommand {
            command,
            priority,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        if self.heap.len() < self.heap.capacity() {
            return self.heap.push(entry).is_ok();
        }

        // Queue full - drain heap to find the lowest ranked entry
        let mut items: heapless::Vec<QueuedCommand, N> = heapless::Vec::new();
        while let Some(item) = self.heap.pop() {
            let _ = items.push(item);
        }
        let lowest = items.iter().min().map(QueuedCommand::rank);

        match lowest {
            Some(min) if entry.rank() > min => {
                let mut dropped_one = false;
                for item in items {
                    if !dropped_one && item.rank() == min {
                        warn!(command = item.command.name(), "send queue full, dropping command");
                        dropped_one = true;
                    } else {
                        let _ = self.heap.push(item);
                    }
                }
                self.heap.push(entry).is_ok()
            }
            _ => {
                for item in items {
                    let _ = self.heap.push(item);
                }
                warn!(command = entry.command.name(), "send queue full, command rejected");
                false
            }
        }
    }

    /// Send the next command if the pacing interval has elapsed.
    ///
    /// Returns the command that was sent. A command the interface refuses is
    /// dropped and its error returned.
    pub fn poll<I: CommandInterface>(
        &mut self,
        now_ms: u64,
        interface: &mut I,
    ) -> Result<Option<InterfaceCommand>, I::Error> {
        if self
            .last_sent_ms
            .is_some_and(|last| now_ms < last.saturating_add(self.min_interval_ms))
        {
            return Ok(None);
        }
        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        self.last_sent_ms = Some(now_ms);
        trace!(command = entry.command.name(), priority = entry.priority, "sending");
        interface.execute(&entry.command)?;
        Ok(Some(entry.command))
    }

    /// Peek at the next command without removing it
    pub fn peek(&self) -> Option<&QueuedCommand> {
        self.heap.peek()
    }

    /// Drop every normal command, keeping priority ones.
    pub fn clear_normal(&mut self) {
        let mut temp: BinaryHeap<QueuedCommand, Max, N> = BinaryHeap::new();
        while let Some(entry) = self.heap.pop() {
            if entry.priority {
                let _ = temp.push(entry);
            }
        }
        self.heap = temp;
    }

    /// Returns the number of queued commands.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns true if the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.heap.len() == self.heap.capacity()
    }
}

impl<const N: usize> Default for SendQueue<N> {
    fn default() -> Self {
        Self::new(crate::config::InterfaceConfig::default().min_command_interval_ms)
    }
}
