//! In-memory implementations (testing and single-process deployments)

mod identity;

pub use identity::InMemoryIdentityStore;
