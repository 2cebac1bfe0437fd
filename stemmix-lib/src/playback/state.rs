//! Transport state shared by engines, groups and reporters.

/// Transport state of a single engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// Position snapshot for a seek bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionReport {
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub state: PlaybackState,
}

impl PositionReport {
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Position as a fraction of the duration, `0.0` for empty tracks.
    pub fn fraction(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            (self.position_seconds / self.duration_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Format seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let whole = seconds as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}
