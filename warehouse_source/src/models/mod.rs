pub mod query;
pub mod row;
