pub mod pomodoro;
pub mod session;
pub mod ticker;
