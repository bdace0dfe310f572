pub mod audit_row;
pub mod enums;
pub mod patient;
pub mod verdict;

pub use audit_row::*;
pub use patient::*;
pub use verdict::*;
