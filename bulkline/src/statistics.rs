use std::ops::AddAssign;

/// Counters for published work.
///
/// The accumulator keeps one instance for everything it publishes; every
/// sink worker keeps its own, mutated only from its own thread and handed
/// to the caller at shutdown. Summing the worker instances of a sink
/// yields the accumulator's numbers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    /// Bulks processed.
    pub bulks: u64,
    /// Commands processed, across all bulks.
    pub commands: u64,
}

impl Statistics {
    /// Accounts for one bulk of `commands` commands.
    pub fn record(&mut self, commands: usize) {
        self.bulks += 1;
        self.commands += commands as u64;
    }
}

impl AddAssign for Statistics {
    fn add_assign(&mut self, rhs: Self) {
        self.bulks += rhs.bulks;
        self.commands += rhs.commands;
    }
}
