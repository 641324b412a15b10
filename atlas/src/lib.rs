//! A runtime sprite atlas. Small sprite images are packed on demand into
//! shared square canvases, consumers follow sprite ids through
//! [`SpriteBinding`] and receive the packed [`Sprite`] once it is loaded.

mod atlas_texture;
mod backend;
mod binding;
mod config;
mod db;
mod entry;
mod error;
mod image;
mod loader;
mod registry;
mod sprite;
mod sprite_coords;
mod sprite_data;
mod sprite_id;

pub use atlas_texture::*;
pub use backend::*;
pub use binding::{AlwaysAlive, Liveness, LivenessFn, SpriteBinding, SpriteCallback};
pub use config::*;
pub use db::*;
pub(crate) use entry::AtlasEntry;
pub use entry::{AtlasStatus, EntryId};
pub use error::*;
pub use image::*;
pub use loader::*;
pub use registry::*;
pub use sprite::*;
pub use sprite_coords::*;
pub use sprite_data::*;
pub use sprite_id::*;
