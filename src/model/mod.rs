pub mod common;
pub mod entity;
pub mod feature;
pub mod feature_model;
pub mod property;
pub mod resource;
pub mod schema;

pub use common::*;
pub use entity::*;
pub use feature::*;
pub use feature_model::*;
pub use property::*;
pub use resource::*;
pub use schema::*;
