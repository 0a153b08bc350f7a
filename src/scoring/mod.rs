pub mod stats;
pub mod summary;
pub mod types;
pub mod validator;
