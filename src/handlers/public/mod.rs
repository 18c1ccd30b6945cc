// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service descriptor, health, the palette extraction endpoint used by the
// settings page preview, and published school sites.

pub mod colors;
pub mod root;
pub mod sites;

pub use colors::{colors_get, colors_post};
pub use root::{health, root};
pub use sites::site_get;
