//! Type system: semantic types and unification

pub mod type_system;
pub mod unify;

pub use type_system::{FnType, PrimitiveType, Receiver, Type};
pub use unify::{common_type, is_compatible};
