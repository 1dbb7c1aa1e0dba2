pub mod guard;
pub mod manager;
pub mod memory;

pub use guard::*;
pub use manager::*;
pub use memory::*;
