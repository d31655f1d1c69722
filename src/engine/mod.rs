pub mod assignment;
pub mod selection;
