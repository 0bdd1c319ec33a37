pub mod candidate;
pub mod report;
