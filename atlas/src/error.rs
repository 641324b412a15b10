use dynatlas_algo::PackError;
use dynatlas_geom::{DevicePoint, DeviceSize};
use thiserror::Error;

use crate::{EntryId, TextureFormat};

pub type AtlasResult<T> = Result<T, AtlasError>;

#[derive(Debug, Error)]
pub enum AtlasError {
  /// A sprite bigger than a canvas can never be packed, the atlas database
  /// was built with a wrong configuration.
  #[error("a {width}x{height} image exceeds the {edge}x{edge} atlas canvas")]
  ExceedsCanvas { width: i32, height: i32, edge: i32 },
  #[error("cannot place an image of size {width}x{height}")]
  InvalidSize { width: i32, height: i32 },
  #[error("`{path}` was declared as {declared:?} but decoded as {actual:?}")]
  SizeMismatch { path: String, declared: DeviceSize, actual: DeviceSize },
  #[error("packer failure: {0}")]
  Pack(#[from] PackError),
  /// A fresh canvas refused a request that fits in it.
  #[error("a new atlas canvas cannot hold a {width}x{height} image")]
  PackFailed { width: i32, height: i32 },
  #[error("format {actual:?} can't be copied into a {expected:?} atlas")]
  FormatMismatch { expected: TextureFormat, actual: TextureFormat },
  #[error("region at {position:?} of size {size:?} is not aligned to {block}x{block} blocks")]
  UnalignedRegion { position: DevicePoint, size: DeviceSize, block: i32 },
  #[error("region at {position:?} of size {size:?} is outside of the canvas")]
  RegionOutOfBounds { position: DevicePoint, size: DeviceSize },
  #[error("image data has {actual} bytes, {expected} expected")]
  ImageDataLength { expected: usize, actual: usize },
  #[error("invalid sprite data for `{id}`: {reason}")]
  InvalidSpriteData { id: String, reason: String },
  #[error("invalid atlas config: {0}")]
  InvalidConfig(String),
  #[error("reference count of entry {0:?} dropped below zero")]
  RefCountUnderflow(EntryId),
  #[error("malformed atlas database: {0}")]
  DbParse(#[from] serde_json::Error),
  #[error("atlas database `{0}` not found")]
  DbNotFound(String),
  #[error("the load of `{0}` was cancelled")]
  LoadCancelled(String),
}

impl AtlasError {
  /// Fatal errors indicate a broken invariant in the caller or the data, the
  /// others are expected at runtime and only reported to the caller.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, AtlasError::DbNotFound(_) | AtlasError::LoadCancelled(_))
  }
}
