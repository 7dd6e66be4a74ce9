//! Observable states of the two speech controllers.
//!
//! - Playback: Idle -> Speaking -> Idle (natural end, error, toggle or stop)
//! - Listening: Idle -> Listening -> Idle (result, error or cancel)

use std::fmt;

/// Speech output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Speaking => write!(f, "Speaking"),
        }
    }
}

impl PlaybackState {
    pub(crate) fn from_active(active: bool) -> Self {
        if active {
            PlaybackState::Speaking
        } else {
            PlaybackState::Idle
        }
    }
}

/// Speech input state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListenState {
    #[default]
    Idle,
    Listening,
}

impl fmt::Display for ListenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenState::Idle => write!(f, "Idle"),
            ListenState::Listening => write!(f, "Listening"),
        }
    }
}

impl ListenState {
    pub(crate) fn from_active(active: bool) -> Self {
        if active {
            ListenState::Listening
        } else {
            ListenState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(PlaybackState::Idle.to_string(), "Idle");
        assert_eq!(PlaybackState::Speaking.to_string(), "Speaking");
        assert_eq!(ListenState::Listening.to_string(), "Listening");
    }

    #[test]
    fn test_defaults_are_idle() {
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
        assert_eq!(ListenState::default(), ListenState::Idle);
    }

    #[test]
    fn test_from_active() {
        assert_eq!(PlaybackState::from_active(true), PlaybackState::Speaking);
        assert_eq!(PlaybackState::from_active(false), PlaybackState::Idle);
        assert_eq!(ListenState::from_active(true), ListenState::Listening);
        assert_eq!(ListenState::from_active(false), ListenState::Idle);
    }
}
