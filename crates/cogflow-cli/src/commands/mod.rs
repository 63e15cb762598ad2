pub mod compile;
pub mod examples;
pub mod info;
pub mod validate;
