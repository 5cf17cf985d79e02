pub mod artists;
pub mod convert;
pub mod result;
