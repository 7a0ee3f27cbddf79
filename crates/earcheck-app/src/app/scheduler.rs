//! Single timer queue for the controller
//!
//! Every delayed follow-up (countdown ticks, transitions, message expiry) is
//! an entry here instead of a captured callback. When a timer fires the
//! controller decides what to do from its state at that moment.

use std::time::{Duration, Instant};

/// Delayed controller events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    CountdownTick,
    /// End of the pause after an answer
    Transition,
    PreparingDone,
    ProcessingDone,
    ClearWarning,
    ClearMilestone,
    InactivityNudge,
}

/// Deadline queue holding at most one entry per timer
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    entries: Vec<(Instant, T)>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Copy + PartialEq> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `timer` for `at`, replacing any pending entry for it
    pub fn schedule(&mut self, timer: T, at: Instant) {
        self.cancel(timer);
        self.entries.push((at, timer));
    }

    /// Arm `timer` for `now + delay`
    pub fn schedule_after(&mut self, timer: T, now: Instant, delay: Duration) {
        self.schedule(timer, now + delay);
    }

    pub fn cancel(&mut self, timer: T) {
        self.entries.retain(|(_, t)| *t != timer);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_scheduled(&self, timer: T) -> bool {
        self.entries.iter().any(|(_, t)| *t == timer)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(at, _)| *at).min()
    }

    /// Remove and return the earliest timer due at `now`, if any
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        let (pos, _) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= now)
            .min_by_key(|(_, (at, _))| *at)?;
        Some(self.entries.remove(pos).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn pops_in_deadline_order() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule_after(Timer::ClearMilestone, t0, ms(300));
        s.schedule_after(Timer::Transition, t0, ms(100));
        s.schedule_after(Timer::ClearWarning, t0, ms(200));

        let now = t0 + ms(250);
        assert_eq!(s.pop_due(now), Some(Timer::Transition));
        assert_eq!(s.pop_due(now), Some(Timer::ClearWarning));
        assert_eq!(s.pop_due(now), None);
        assert!(s.is_scheduled(Timer::ClearMilestone));
    }

    #[test]
    fn nothing_due_before_deadline() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule_after(Timer::PreparingDone, t0, ms(2000));
        assert_eq!(s.pop_due(t0 + ms(1999)), None);
        assert_eq!(s.pop_due(t0 + ms(2000)), Some(Timer::PreparingDone));
        assert!(s.is_empty());
    }

    #[test]
    fn rescheduling_replaces_entry() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule_after(Timer::ClearWarning, t0, ms(100));
        s.schedule_after(Timer::ClearWarning, t0, ms(500));
        assert_eq!(s.pop_due(t0 + ms(200)), None);
        assert_eq!(s.next_deadline(), Some(t0 + ms(500)));
    }

    #[test]
    fn cancel_and_clear() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule_after(Timer::InactivityNudge, t0, ms(10));
        s.schedule_after(Timer::CountdownTick, t0, ms(10));
        s.cancel(Timer::InactivityNudge);
        assert!(!s.is_scheduled(Timer::InactivityNudge));
        assert!(s.is_scheduled(Timer::CountdownTick));
        s.clear();
        assert_eq!(s.next_deadline(), None);
    }
}
