pub mod check;
pub mod keys;
