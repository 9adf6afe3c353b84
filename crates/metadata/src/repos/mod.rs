//! Repository traits for metadata operations.

pub mod authors;
pub mod packages;
pub mod tags;
pub mod users;
pub mod versions;

pub use authors::AuthorRepo;
pub use packages::PackageRepo;
pub use tags::TagRepo;
pub use users::UserRepo;
pub use versions::VersionRepo;
