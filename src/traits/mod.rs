//! Seams between the core and its external collaborators.

pub mod audio;
pub mod time;
