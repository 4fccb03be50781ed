pub mod cycle_checker;
pub mod error;
pub mod heap;
pub mod operations;
pub mod realm;
pub mod scope;
pub mod value;
