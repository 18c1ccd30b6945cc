pub mod blob_storage;
pub mod school_service;
pub mod theme_service;

pub use blob_storage::{BlobError, BlobStore, LocalBlobStore, StoredBlob};
pub use school_service::{SchoolError, SchoolService, SchoolSignup, SiteDraft};
pub use theme_service::{TenantTarget, ThemeError, ThemeOutcome, ThemeService, ThemeSource};
