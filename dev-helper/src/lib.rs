//! Test doubles for the atlas: an in-memory resource loader whose loads can
//! be held back, a backend recording every call, and data builders.

mod fixtures;
mod mock_loader;
mod recording_backend;

pub use dynatlas;
pub use fixtures::*;
pub use mock_loader::*;
pub use recording_backend::*;

/// Build an [`dynatlas::AtlasDb`] of square sprites, each one stored in its
/// own texture at [`image_path`].
///
/// # Example
///
/// ```
/// use dynatlas_dev_helper::atlas_db;
///
/// let db = atlas_db! { "coin" => 32, "gem" => 64 };
/// assert_eq!(db.entries.len(), 2);
/// ```
#[macro_export]
macro_rules! atlas_db {
  ($($name:literal => $edge:expr),* $(,)?) => {
    $crate::dynatlas::AtlasDb {
      entries: vec![$($crate::entry_data($name, $edge, $edge)),*],
    }
  };
}
