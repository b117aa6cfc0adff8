pub mod linkify;
pub mod token;
