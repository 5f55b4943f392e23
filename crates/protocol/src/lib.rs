pub mod constants;
pub mod descriptor;
pub mod store;

// Re-export primary types for convenience.
pub use descriptor::{ContentMapping, DescriptorTotals, RegistrationDescriptor, SiteMetadata};
pub use store::{StoreMetadata, StoreRequest, StoreResponse};
