pub mod school;

pub use school::{BrandTheme, NewSchool, School, SchoolRow, SiteUpdate, ThemeUpdate};
