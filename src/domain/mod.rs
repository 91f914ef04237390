pub mod constants;
pub mod crypto;
pub mod outcome;
pub mod types;
