//! Active filter selection
//!
//! A small timed state machine over catalog indices. Manual commands move the
//! index immediately; [`FilterSelector::tick`] advances it once the configured
//! interval has elapsed since the last change of either kind.

/// Discrete user commands coming from the input layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ManualNext,
    ManualPrevious,
    Exit,
}

/// Timed cyclic selector.
///
/// Times are plain seconds supplied by the caller; they are expected to be
/// non-decreasing but are not checked.
#[derive(Clone, Debug)]
pub struct FilterSelector {
    /// Current index, always `< len`
    index: usize,
    /// Catalog size
    len: usize,
    /// Time of the last transition
    last_change: f64,
    /// Seconds between automatic transitions
    interval: f64,
}

impl FilterSelector {
    /// Create a selector at index 0. `len` is clamped to at least 1.
    pub fn new(len: usize, interval: f64, start: f64) -> Self {
        Self {
            index: 0,
            len: len.max(1),
            last_change: start,
            interval,
        }
    }

    pub fn current(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn last_change(&self) -> f64 {
        self.last_change
    }

    pub fn manual_next(&mut self, now: f64) {
        self.transition((self.index + 1) % self.len, now);
    }

    pub fn manual_previous(&mut self, now: f64) {
        self.transition((self.index + self.len - 1) % self.len, now);
    }

    /// Jump to `index`, wrapped into range
    pub fn select(&mut self, index: usize, now: f64) {
        self.transition(index % self.len, now);
    }

    /// Apply a filter command. Returns false for commands the selector ignores.
    pub fn apply(&mut self, command: Command, now: f64) -> bool {
        match command {
            Command::ManualNext => self.manual_next(now),
            Command::ManualPrevious => self.manual_previous(now),
            Command::Exit => return false,
        }
        true
    }

    /// Advance if the interval has elapsed. Returns true when it advanced.
    pub fn tick(&mut self, now: f64) -> bool {
        if now - self.last_change >= self.interval {
            self.transition((self.index + 1) % self.len, now);
            true
        } else {
            false
        }
    }

    /// Seconds left before the next automatic change, never negative
    pub fn remaining(&self, now: f64) -> f64 {
        (self.interval - (now - self.last_change)).max(0.0)
    }

    fn transition(&mut self, index: usize, now: f64) {
        self.index = index;
        self.last_change = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let selector = FilterSelector::new(4, 5.5, 10.0);
        assert_eq!(selector.current(), 0);
        assert_eq!(selector.last_change(), 10.0);
    }

    #[test]
    fn test_manual_next_cycles_back() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);
        for _ in 0..4 {
            selector.manual_next(0.0);
        }
        assert_eq!(selector.current(), 0);
    }

    #[test]
    fn test_manual_previous_wraps() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);
        selector.manual_previous(1.0);
        assert_eq!(selector.current(), 3);
        assert_eq!(selector.last_change(), 1.0);
        selector.manual_previous(2.0);
        assert_eq!(selector.current(), 2);
    }

    #[test]
    fn test_auto_advance_timing() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);

        assert!(!selector.tick(5.0));
        assert_eq!(selector.current(), 0);

        assert!(selector.tick(5.5));
        assert_eq!(selector.current(), 1);
        assert_eq!(selector.last_change(), 5.5);

        // clock restarted at 5.5
        assert!(!selector.tick(10.9));
        assert!(selector.tick(11.0));
        assert_eq!(selector.current(), 2);
    }

    #[test]
    fn test_ticks_do_not_stack() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);
        // long stall: one advance, not several
        assert!(selector.tick(100.0));
        assert!(!selector.tick(100.0));
        assert_eq!(selector.current(), 1);
    }

    #[test]
    fn test_manual_change_resets_auto_timer() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);
        selector.manual_next(5.0);
        assert_eq!(selector.current(), 1);

        // due under the old timestamp, but not under the new one
        assert!(!selector.tick(5.5));
        assert!(!selector.tick(10.4));
        assert_eq!(selector.current(), 1);

        assert!(selector.tick(10.5));
        assert_eq!(selector.current(), 2);
    }

    #[test]
    fn test_scenario_manual_then_ticks() {
        let start = 100.0;
        let interval = 5.5;
        let mut selector = FilterSelector::new(4, interval, start);

        selector.manual_next(start);
        assert_eq!(selector.current(), 1);
        let reset = selector.last_change();

        selector.tick(start + 3.0);
        assert_eq!(selector.current(), 1);

        selector.tick(start + 6.0);
        let expected = if start + 6.0 - reset >= interval { 2 } else { 1 };
        assert_eq!(selector.current(), expected);
        assert_eq!(expected, 2);
    }

    #[test]
    fn test_two_manual_changes_same_instant() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);
        selector.manual_next(2.0);
        selector.manual_next(2.0);
        assert_eq!(selector.current(), 2);
        assert_eq!(selector.last_change(), 2.0);
    }

    #[test]
    fn test_select_wraps_out_of_range() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);
        selector.select(9, 1.0);
        assert_eq!(selector.current(), 1);
        selector.select(usize::MAX, 1.0);
        assert!(selector.current() < 4);
    }

    #[test]
    fn test_negative_and_fractional_time() {
        let mut selector = FilterSelector::new(3, 0.25, -1.5);
        assert!(!selector.tick(-1.3));
        assert!(selector.tick(-1.25));
        assert_eq!(selector.current(), 1);
    }

    #[test]
    fn test_apply_commands() {
        let mut selector = FilterSelector::new(4, 5.5, 0.0);
        assert!(selector.apply(Command::ManualNext, 1.0));
        assert_eq!(selector.current(), 1);
        assert!(selector.apply(Command::ManualPrevious, 1.0));
        assert_eq!(selector.current(), 0);
        assert!(!selector.apply(Command::Exit, 1.0));
        assert_eq!(selector.current(), 0);
    }

    #[test]
    fn test_remaining() {
        let selector = FilterSelector::new(4, 5.5, 0.0);
        assert_eq!(selector.remaining(2.0), 3.5);
        assert_eq!(selector.remaining(9.0), 0.0);
    }

    #[test]
    fn test_single_entry_catalog() {
        let mut selector = FilterSelector::new(1, 1.0, 0.0);
        selector.manual_next(0.0);
        selector.manual_previous(0.0);
        assert!(selector.tick(1.0));
        assert_eq!(selector.current(), 0);
    }
}
