//! Frame lifecycle states

/// Lifecycle of one frame: `Idle -> Accumulating -> Flushed -> Dispatched -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    Accumulating,
    Flushed,
    Dispatched,
}

impl FrameState {
    /// State reached by the transition that leaves `self`
    pub fn next(self) -> FrameState {
        match self {
            FrameState::Idle => FrameState::Accumulating,
            FrameState::Accumulating => FrameState::Flushed,
            FrameState::Flushed => FrameState::Dispatched,
            FrameState::Dispatched => FrameState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_returns_to_idle() {
        let mut state = FrameState::default();
        for _ in 0..4 {
            state = state.next();
        }
        assert_eq!(state, FrameState::Idle);
    }
}
