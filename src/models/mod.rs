//! Domain model module declarations.

pub mod lunch;
pub mod message;
pub mod oncall;
