pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::InMemorySchoolStore;
pub use models::{BrandTheme, NewSchool, School, SiteUpdate, ThemeUpdate};
pub use postgres::PgSchoolStore;
pub use store::{SchoolStore, StoreError};
