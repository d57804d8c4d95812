pub mod keys;
pub mod mask;
