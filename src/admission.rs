//! # Admission Control
//!
//! Two caps gate every transmission: a global in-flight limit and a per-slave
//! limit. Requests that do not fit wait in an arrival-ordered queue.
//!
//! Draining scans the queue from the head and admits the first entry whose
//! slave has room. Order is preserved within a slave, but a request for an
//! idle slave may overtake one for a saturated slave.

use std::collections::VecDeque;

use crate::slave::SlaveState;

/// Global counter, caps and wait queue.
#[derive(Debug)]
pub struct AdmissionController<T> {
    max_global: usize,
    max_per_slave: usize,
    in_flight: usize,
    queue: VecDeque<T>,
}

impl<T> AdmissionController<T> {
    pub fn new(max_global: usize, max_per_slave: usize) -> Self {
        Self {
            max_global,
            max_per_slave,
            in_flight: 0,
            queue: VecDeque::new(),
        }
    }

    /// Whether a request for a slave with `slave_in_flight` requests may go now.
    #[inline]
    pub fn has_capacity(&self, slave_in_flight: usize) -> bool {
        self.in_flight < self.max_global && slave_in_flight < self.max_per_slave
    }

    /// Park a request at the tail.
    pub fn enqueue(&mut self, entry: T) {
        self.queue.push_back(entry);
    }

    /// Remove the first queued entry whose slave is under its cap.
    ///
    /// `slave_in_flight` reports the current in-flight count of an entry's
    /// slave. Returns `None` when the global cap is reached or no entry
    /// qualifies.
    pub fn next_admissible<F>(&mut self, mut slave_in_flight: F) -> Option<T>
    where
        F: FnMut(&T) -> usize,
    {
        if self.in_flight >= self.max_global {
            return None;
        }
        let max_per_slave = self.max_per_slave;
        let pos = self
            .queue
            .iter()
            .position(|entry| slave_in_flight(entry) < max_per_slave)?;
        self.queue.remove(pos)
    }

    /// Count a transmission against both caps.
    pub fn acquire(&mut self, slave: &mut SlaveState) {
        self.in_flight += 1;
        slave.concurrent_requests += 1;
    }

    /// Return a slot taken by [`acquire`](Self::acquire).
    pub fn release(&mut self, slave: &mut SlaveState) {
        self.in_flight = self.in_flight.saturating_sub(1);
        slave.concurrent_requests = slave.concurrent_requests.saturating_sub(1);
    }

    /// Zero the global counter and hand back every queued entry.
    pub fn reset(&mut self) -> Vec<T> {
        self.in_flight = 0;
        self.queue.drain(..).collect()
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> impl Iterator<Item = &T> {
        self.queue.iter()
    }
}
