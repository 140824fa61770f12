use serde::Serialize;

pub const TICK_INTERVAL_MS: u64 = 1000;
pub const POMODORO_WORK_MINUTES: u32 = 25;
pub const POMODORO_BREAK_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Work,
    ShortBreak,
}

impl Phase {
    pub fn duration_secs(&self) -> u32 {
        match self {
            Phase::Work => POMODORO_WORK_MINUTES * 60,
            Phase::ShortBreak => POMODORO_BREAK_MINUTES * 60,
        }
    }

    pub fn next(&self) -> Phase {
        match self {
            Phase::Work => Phase::ShortBreak,
            Phase::ShortBreak => Phase::Work,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Work => "Focus",
            Phase::ShortBreak => "Break",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Phase::Work => "red",
            Phase::ShortBreak => "green",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Phase::Work => "🍅",
            Phase::ShortBreak => "☕",
        }
    }
}

/// `MM:SS`, minutes not capped at 59.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
