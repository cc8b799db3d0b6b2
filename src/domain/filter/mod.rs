//! Membership filter domain - Probabilistic existence checks for users and items

mod bloom;
mod registry;
mod source;

pub use bloom::BloomFilter;
pub use registry::{FilterSet, FilterSettings, MembershipFilters, MembershipView};
pub use source::IdSource;

#[cfg(test)]
pub use source::mock::MockIdSource;
