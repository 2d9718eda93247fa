pub mod insert;
pub mod predicate;
pub mod result;
pub mod scan;
pub mod update;
