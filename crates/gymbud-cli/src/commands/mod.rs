pub mod common;
pub mod conflicts;
pub mod exercises;
pub mod history;
pub mod sync;
