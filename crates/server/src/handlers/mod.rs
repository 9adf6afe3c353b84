//! HTTP request handlers.

pub mod cdn;
pub mod common;
pub mod info;
pub mod packages;
pub mod search;
pub mod users;

pub use cdn::*;
pub use common::*;
pub use info::*;
pub use packages::*;
pub use search::*;
pub use users::*;
