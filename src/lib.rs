pub mod equation;

pub use equation::{parser::ParseError, translate, Expression};
