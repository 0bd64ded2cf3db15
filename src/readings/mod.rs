pub mod light;
pub mod validate;
