pub mod candidate;
pub mod requirement;
pub mod search;
