pub mod contrast;
pub mod palette;
pub mod token;
