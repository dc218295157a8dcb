//! Inversion scheduler.
//!
//! Holds the schedule in step order and a cursor into it. Advancing uses
//! `entry.step <= current` so a threshold still fires when the caller jumps
//! past its exact index.

use crate::types::{InversionKind, ScheduleEntry};

/// Tracks which scheduled inversions have fired and which kind is active.
#[derive(Debug, Clone)]
pub struct InversionScheduler {
    /// Entries sorted by step; equal steps keep their schedule order
    entries: Vec<ScheduleEntry>,

    /// Index of the next unapplied entry
    cursor: usize,

    /// Kind switched in by the most recent entry
    active_kind: Option<InversionKind>,
}

impl InversionScheduler {
    /// Creates a scheduler over `schedule`.
    pub fn new(schedule: &[ScheduleEntry]) -> Self {
        let mut entries = schedule.to_vec();
        // Stable: equal steps fire in the order they were listed.
        entries.sort_by_key(|entry| entry.step);

        Self {
            entries,
            cursor: 0,
            active_kind: None,
        }
    }

    /// Applies every pending entry with `step <= current` and returns them
    /// in firing order.
    pub fn advance(&mut self, current: u64) -> Vec<ScheduleEntry> {
        let mut fired = Vec::new();

        while let Some(entry) = self.entries.get(self.cursor) {
            if entry.step > current {
                break;
            }
            self.active_kind = Some(entry.kind);
            fired.push(*entry);
            self.cursor += 1;
        }

        fired
    }

    /// Kind currently in force, if any entry has fired.
    pub fn active_kind(&self) -> Option<InversionKind> {
        self.active_kind
    }

    /// Entries already applied, in firing order.
    pub fn applied(&self) -> &[ScheduleEntry] {
        &self.entries[..self.cursor]
    }

    /// Entries not yet applied.
    pub fn remaining(&self) -> &[ScheduleEntry] {
        &self.entries[self.cursor..]
    }

    /// Step of the most recently applied entry.
    pub fn last_applied_step(&self) -> Option<u64> {
        self.applied().last().map(|entry| entry.step)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> Vec<ScheduleEntry> {
        vec![
            ScheduleEntry::new(10, InversionKind::Geometric),
            ScheduleEntry::new(20, InversionKind::Spherical),
            ScheduleEntry::new(20, InversionKind::Observer),
            ScheduleEntry::new(35, InversionKind::Causal),
        ]
    }

    #[test]
    fn test_nothing_fires_before_first_threshold() {
        let mut scheduler = InversionScheduler::new(&schedule());
        assert!(scheduler.advance(9).is_empty());
        assert_eq!(scheduler.active_kind(), None);
        assert_eq!(scheduler.last_applied_step(), None);
    }

    #[test]
    fn test_each_entry_fires_once() {
        let mut scheduler = InversionScheduler::new(&schedule());
        let mut fired = Vec::new();
        for step in 0..=40 {
            fired.extend(scheduler.advance(step));
        }
        assert_eq!(fired, schedule());
        assert!(scheduler.is_exhausted());
        assert!(scheduler.advance(100).is_empty());
    }

    #[test]
    fn test_equal_steps_fire_in_schedule_order() {
        let mut scheduler = InversionScheduler::new(&schedule());
        scheduler.advance(10);
        let fired = scheduler.advance(20);
        assert_eq!(
            fired.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![InversionKind::Spherical, InversionKind::Observer]
        );
        assert_eq!(scheduler.active_kind(), Some(InversionKind::Observer));
    }

    #[test]
    fn test_skipped_threshold_still_fires() {
        let mut scheduler = InversionScheduler::new(&schedule());
        // Jump straight past 10, 20 and 35.
        let fired = scheduler.advance(36);
        assert_eq!(fired.len(), 4);
        assert_eq!(scheduler.active_kind(), Some(InversionKind::Causal));
        assert_eq!(scheduler.last_applied_step(), Some(35));
        assert!(scheduler.remaining().is_empty());
    }
}
