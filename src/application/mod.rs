pub mod conflict;
pub mod diff;
pub mod intake;
pub mod monitoring;
