use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

/// Lifecycle of the daemon. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DaemonState {
    Idle = 0,
    Running = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

impl DaemonState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::ShuttingDown,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Atomic holder for [`DaemonState`], shared between the main loop and
/// whoever requests a stop.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(DaemonState::Idle as u8))
    }

    pub fn get(&self) -> DaemonState {
        DaemonState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move to `next` unless the state is already there or further along.
    /// Returns whether this call made the transition.
    pub fn advance(&self, next: DaemonState) -> bool {
        let previous = self.0.fetch_max(next as u8, Ordering::SeqCst);
        previous < next as u8
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_linear() {
        let state = StateCell::new();
        assert_eq!(state.get(), DaemonState::Idle);

        assert!(state.advance(DaemonState::Running));
        assert!(!state.advance(DaemonState::Running));
        assert!(state.advance(DaemonState::Stopped));
        assert!(!state.advance(DaemonState::ShuttingDown));
        assert!(!state.advance(DaemonState::Idle));
        assert_eq!(state.get(), DaemonState::Stopped);
    }

    #[test]
    fn only_one_caller_wins_a_transition() {
        let state = std::sync::Arc::new(StateCell::new());
        let winners: usize = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.advance(DaemonState::ShuttingDown))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| usize::from(handle.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }
}
