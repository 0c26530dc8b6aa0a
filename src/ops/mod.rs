pub mod check;
pub mod completable_ops;

pub use check::*;
pub use completable_ops::*;
