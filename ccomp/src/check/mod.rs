pub mod checker;
pub mod constant;
pub mod scope;

pub use checker::check;
