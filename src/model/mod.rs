pub mod attribute;
pub mod common;
pub mod prepared;
pub mod product;
pub mod result;
pub mod user_context;
pub mod value;

pub use attribute::*;
pub use common::*;
pub use prepared::*;
pub use product::*;
pub use result::*;
pub use user_context::*;
pub use value::*;
