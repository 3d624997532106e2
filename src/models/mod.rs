//! Domain model module declarations.

pub mod deployment;
pub mod identity;
pub mod settings;
