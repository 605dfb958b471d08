pub mod catalog;
pub mod common;
pub mod operation;
pub mod request;
pub mod result;

pub use catalog::*;
pub use common::*;
pub use operation::*;
pub use request::*;
pub use result::*;
