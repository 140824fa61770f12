pub mod cues;
pub mod player;
