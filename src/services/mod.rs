pub mod adaptive_mode;
pub mod adherence;
pub mod crisis;
pub mod planner;
