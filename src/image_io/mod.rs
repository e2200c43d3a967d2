pub mod fetch;
pub mod load;
