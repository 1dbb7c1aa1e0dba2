pub mod ancestry;
pub mod coordinator;
pub mod feature_ops;
pub mod validate;

pub use ancestry::*;
pub use coordinator::*;
pub use feature_ops::*;
pub use validate::*;
