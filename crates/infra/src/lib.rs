//! Infrastructure layer: persistence behind the `CourseStore` abstraction.

pub mod store;

pub use store::in_memory::InMemoryCourseStore;
pub use store::postgres::PostgresCourseStore;
pub use store::{CourseStore, StoreError, StoreResult};
