pub mod certification;
pub mod criteria;
pub mod levels;
