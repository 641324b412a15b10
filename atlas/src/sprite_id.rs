use std::{borrow::Borrow, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

/// The logic name of a sprite. Cheap to clone, compared by its exact string.
/// An empty id means "no sprite".
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SpriteId(Rc<str>);

impl SpriteId {
  pub fn new(name: &str) -> Self { Self(Rc::from(name)) }

  #[inline]
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  #[inline]
  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for SpriteId {
  #[inline]
  fn from(name: &str) -> Self { Self::new(name) }
}

impl From<String> for SpriteId {
  #[inline]
  fn from(name: String) -> Self { Self(Rc::from(name)) }
}

impl From<SpriteId> for String {
  #[inline]
  fn from(id: SpriteId) -> Self { id.0.to_string() }
}

impl Borrow<str> for SpriteId {
  #[inline]
  fn borrow(&self) -> &str { &self.0 }
}

impl fmt::Display for SpriteId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl fmt::Debug for SpriteId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "SpriteId({:?})", &*self.0) }
}
