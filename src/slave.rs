//! # Slave Health
//!
//! Per-slave fault bookkeeping. Each slave behind the gateway is either
//! `Healthy` or `Banned`, and carries an error budget that decides whether a
//! timeout is retried or turns into a ban.
//!
//! The transition function ([`SlaveState::on_fault`]) has no I/O; the engine
//! acts on the returned [`Verdict`].

use std::collections::BTreeMap;

use crate::codec::SlaveId;
use crate::constants::{EXCEPTION_GATEWAY_PATH_UNAVAILABLE, EXCEPTION_GATEWAY_TARGET_FAILED};

/// Health of one slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveHealth {
    /// Requests are admitted. `errors_left` retries remain before a ban.
    Healthy { errors_left: u32 },
    /// New requests are rejected until the unban timer fires.
    Banned { errors_left: u32 },
}

impl SlaveHealth {
    #[inline]
    pub fn is_banned(&self) -> bool {
        matches!(self, Self::Banned { .. })
    }

    #[inline]
    pub fn errors_left(&self) -> u32 {
        match *self {
            Self::Healthy { errors_left } | Self::Banned { errors_left } => errors_left,
        }
    }

    fn with_errors_left(self, errors_left: u32) -> Self {
        match self {
            Self::Healthy { .. } => Self::Healthy { errors_left },
            Self::Banned { .. } => Self::Banned { errors_left },
        }
    }
}

/// A failed exchange, as seen by the health machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Exception 0x0A.
    GatewayPathUnavailable,
    /// Exception 0x0B or a response timeout.
    NoReply,
    /// Any other exception code.
    Exception(u8),
}

impl FaultKind {
    /// Classify an exception code from a response frame.
    pub fn from_exception_code(code: u8) -> Self {
        match code {
            EXCEPTION_GATEWAY_PATH_UNAVAILABLE => Self::GatewayPathUnavailable,
            EXCEPTION_GATEWAY_TARGET_FAILED => Self::NoReply,
            other => Self::Exception(other),
        }
    }
}

/// What the engine must do after a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Transmit the same request again, caller is not notified.
    Retry,
    /// Complete the request with an error. `ban_started` asks for an unban timer.
    Fail { ban_started: bool },
}

/// Everything the engine tracks per slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveState {
    pub health: SlaveHealth,
    /// Requests currently in flight towards this slave.
    pub concurrent_requests: usize,
}

impl SlaveState {
    pub fn new(request_attempts: u32) -> Self {
        Self {
            health: SlaveHealth::Healthy {
                errors_left: request_attempts,
            },
            concurrent_requests: 0,
        }
    }

    #[inline]
    pub fn is_banned(&self) -> bool {
        self.health.is_banned()
    }

    /// A well-formed response arrived. Restores the budget; an active ban stays.
    pub fn record_success(&mut self, request_attempts: u32) {
        self.health = self.health.with_errors_left(request_attempts);
    }

    /// Apply a fault and decide between retry and failure.
    pub fn on_fault(&mut self, fault: FaultKind, request_attempts: u32) -> Verdict {
        match fault {
            FaultKind::GatewayPathUnavailable => {
                let ban_started = self.ban(0);
                Verdict::Fail { ban_started }
            }
            FaultKind::NoReply => match self.health.errors_left() {
                0 => {
                    let ban_started = self.ban(0);
                    Verdict::Fail { ban_started }
                }
                n => {
                    self.health = self.health.with_errors_left(n - 1);
                    Verdict::Retry
                }
            },
            FaultKind::Exception(_) => {
                self.health = self.health.with_errors_left(request_attempts);
                Verdict::Fail { ban_started: false }
            }
        }
    }

    /// Unban timer expired. The budget is left as it was.
    pub fn lift_ban(&mut self) {
        self.health = SlaveHealth::Healthy {
            errors_left: self.health.errors_left(),
        };
    }

    /// Returns true when the slave was not banned before.
    fn ban(&mut self, errors_left: u32) -> bool {
        let was_banned = self.is_banned();
        self.health = SlaveHealth::Banned { errors_left };
        !was_banned
    }
}

/// Slave states keyed by id, created on first reference.
#[derive(Debug, Default)]
pub struct SlaveTable {
    slaves: BTreeMap<SlaveId, SlaveState>,
    request_attempts: u32,
}

impl SlaveTable {
    pub fn new(request_attempts: u32) -> Self {
        Self {
            slaves: BTreeMap::new(),
            request_attempts,
        }
    }

    /// State for `slave_id`, created healthy if unseen.
    pub fn entry(&mut self, slave_id: SlaveId) -> &mut SlaveState {
        let attempts = self.request_attempts;
        self.slaves
            .entry(slave_id)
            .or_insert_with(|| SlaveState::new(attempts))
    }

    pub fn get(&self, slave_id: SlaveId) -> Option<&SlaveState> {
        self.slaves.get(&slave_id)
    }

    /// In-flight count towards `slave_id`; zero for unseen slaves.
    pub fn concurrent_requests(&self, slave_id: SlaveId) -> usize {
        self.slaves
            .get(&slave_id)
            .map_or(0, |state| state.concurrent_requests)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlaveId, &SlaveState)> {
        self.slaves.iter()
    }

    /// Zero every slave's in-flight counter.
    pub fn reset_counters(&mut self) {
        for state in self.slaves.values_mut() {
            state.concurrent_requests = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTEMPTS: u32 = 3;

    #[test]
    fn test_timeouts_retry_then_ban() {
        let mut slave = SlaveState::new(ATTEMPTS);

        for left in (0..ATTEMPTS).rev() {
            assert_eq!(slave.on_fault(FaultKind::NoReply, ATTEMPTS), Verdict::Retry);
            assert_eq!(slave.health, SlaveHealth::Healthy { errors_left: left });
        }

        assert_eq!(
            slave.on_fault(FaultKind::NoReply, ATTEMPTS),
            Verdict::Fail { ban_started: true }
        );
        assert!(slave.is_banned());
    }

    #[test]
    fn test_gateway_path_unavailable_bans_immediately() {
        let mut slave = SlaveState::new(ATTEMPTS);
        assert_eq!(
            slave.on_fault(FaultKind::from_exception_code(0x0A), ATTEMPTS),
            Verdict::Fail { ban_started: true }
        );
        assert_eq!(slave.health, SlaveHealth::Banned { errors_left: 0 });

        // Already banned: no second unban timer
        assert_eq!(
            slave.on_fault(FaultKind::GatewayPathUnavailable, ATTEMPTS),
            Verdict::Fail { ban_started: false }
        );
    }

    #[test]
    fn test_other_exception_resets_budget() {
        let mut slave = SlaveState::new(ATTEMPTS);
        slave.on_fault(FaultKind::NoReply, ATTEMPTS);
        assert_eq!(slave.health.errors_left(), 2);

        assert_eq!(
            slave.on_fault(FaultKind::from_exception_code(0x02), ATTEMPTS),
            Verdict::Fail { ban_started: false }
        );
        assert_eq!(slave.health, SlaveHealth::Healthy { errors_left: 3 });
    }

    #[test]
    fn test_target_failed_is_no_reply() {
        assert_eq!(FaultKind::from_exception_code(0x0B), FaultKind::NoReply);
        assert_eq!(
            FaultKind::from_exception_code(0x04),
            FaultKind::Exception(0x04)
        );
    }

    #[test]
    fn test_unban_is_grace_only() {
        let mut slave = SlaveState::new(ATTEMPTS);
        slave.on_fault(FaultKind::GatewayPathUnavailable, ATTEMPTS);
        slave.lift_ban();
        assert_eq!(slave.health, SlaveHealth::Healthy { errors_left: 0 });

        // Next timeout re-bans without a retry
        assert_eq!(
            slave.on_fault(FaultKind::NoReply, ATTEMPTS),
            Verdict::Fail { ban_started: true }
        );
    }

    #[test]
    fn test_success_keeps_ban() {
        let mut slave = SlaveState::new(ATTEMPTS);
        slave.on_fault(FaultKind::GatewayPathUnavailable, ATTEMPTS);
        slave.record_success(ATTEMPTS);
        assert_eq!(slave.health, SlaveHealth::Banned { errors_left: 3 });

        slave.lift_ban();
        assert_eq!(slave.health, SlaveHealth::Healthy { errors_left: 3 });
    }

    #[test]
    fn test_table_lazy_creation() {
        let mut table = SlaveTable::new(ATTEMPTS);
        assert!(table.get(7).is_none());
        assert_eq!(table.concurrent_requests(7), 0);

        table.entry(7).concurrent_requests = 2;
        table.entry(9).concurrent_requests = 1;
        assert_eq!(table.concurrent_requests(7), 2);

        table.reset_counters();
        assert!(table.iter().all(|(_, s)| s.concurrent_requests == 0));
        assert_eq!(table.iter().count(), 2);
    }
}
