use futures::future::{AbortHandle, AbortRegistration, LocalBoxFuture};

use crate::PixelImage;

/// Cancellation state of one resource load. The atlas aborts the load when
/// the resource is no longer needed, a loader may poll the token to stop
/// early.
#[derive(Debug, Clone)]
pub struct LoadToken(AbortHandle);

impl LoadToken {
  pub(crate) fn new_pair() -> (Self, AbortRegistration) {
    let (handle, reg) = AbortHandle::new_pair();
    (Self(handle), reg)
  }

  /// A token for a load nobody will cancel.
  pub fn detached() -> Self { Self::new_pair().0 }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.0.is_aborted() }

  pub fn cancel(&self) { self.0.abort() }
}

/// Asset I/O consumed by the atlas. The returned futures must not borrow the
/// loader, they are driven by the atlas registry across frames.
pub trait ResourceLoader {
  /// Load and decode the image at `path`, `None` if it does not exist or
  /// the load was cancelled.
  fn load_image(&self, path: &str, token: LoadToken) -> LocalBoxFuture<'static, Option<PixelImage>>;

  fn load_text(&self, path: &str, token: LoadToken) -> LocalBoxFuture<'static, Option<String>>;
}
