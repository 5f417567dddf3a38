pub mod error;
pub mod extract;
pub mod response;
pub mod validate;
