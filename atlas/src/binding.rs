use std::{
  cell::{Cell, RefCell},
  rc::{self, Rc},
  sync,
};

use crate::{AtlasRegistry, AtlasResult, EntryId, Sprite, SpriteId};

/// Tell whether the owner of a [`SpriteBinding`] still exists. A binding
/// whose owner is gone ignores every update and is purged by the registry.
pub trait Liveness {
  fn is_alive(&self) -> bool;
}

impl<T: ?Sized> Liveness for rc::Weak<T> {
  fn is_alive(&self) -> bool { self.strong_count() > 0 }
}

impl<T: ?Sized> Liveness for sync::Weak<T> {
  fn is_alive(&self) -> bool { self.strong_count() > 0 }
}

/// An owner that never goes away.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAlive;

impl Liveness for AlwaysAlive {
  fn is_alive(&self) -> bool { true }
}

/// Probe the owner with a closure.
pub struct LivenessFn<F>(pub F);

impl<F: Fn() -> bool> Liveness for LivenessFn<F> {
  fn is_alive(&self) -> bool { (self.0)() }
}

pub type SpriteCallback = Box<dyn FnMut(&Sprite)>;

/// The link between a consumer and the atlas entry of its sprite id.
///
/// Binding only records the relation, the image is loaded once the binding
/// is enabled. Every time the sprite of the bound entry changes, the
/// callback given to [`SpriteBinding::initialize`] receives it.
///
/// Clones share the same binding.
#[derive(Clone)]
pub struct SpriteBinding {
  inner: Rc<BindingInner>,
}

pub(crate) struct BindingInner {
  sprite_id: RefCell<SpriteId>,
  owner: Box<dyn Liveness>,
  entry: Cell<Option<EntryId>>,
  initialized: Cell<bool>,
  enabled: Cell<bool>,
  sprite: RefCell<Sprite>,
  callback: RefCell<Option<SpriteCallback>>,
}

impl SpriteBinding {
  pub fn new(sprite_id: impl Into<SpriteId>, owner: impl Liveness + 'static) -> Self {
    let inner = BindingInner {
      sprite_id: RefCell::new(sprite_id.into()),
      owner: Box::new(owner),
      entry: Cell::new(None),
      initialized: Cell::new(false),
      enabled: Cell::new(false),
      sprite: RefCell::new(Sprite::empty()),
      callback: RefCell::new(None),
    };
    Self { inner: Rc::new(inner) }
  }

  pub(crate) fn from_inner(inner: Rc<BindingInner>) -> Self { Self { inner } }

  pub(crate) fn inner(&self) -> &Rc<BindingInner> { &self.inner }

  pub fn sprite_id(&self) -> SpriteId { self.inner.sprite_id.borrow().clone() }

  /// The last sprite delivered to the callback.
  pub fn sprite(&self) -> Sprite { self.inner.sprite.borrow().clone() }

  /// The entry the binding is bound to.
  pub fn entry(&self) -> Option<EntryId> { self.inner.entry.get() }

  pub fn is_initialized(&self) -> bool { self.inner.initialized.get() }

  pub fn is_enabled(&self) -> bool { self.inner.enabled.get() }

  pub fn is_owner_valid(&self) -> bool { self.inner.is_owner_valid() }

  /// Start following the sprite id. Does nothing if already initialized. If
  /// the registry has no database yet, the binding is resolved once one is
  /// loaded.
  pub fn initialize(
    &self, registry: &AtlasRegistry, callback: impl FnMut(&Sprite) + 'static,
  ) -> AtlasResult<()> {
    if self.is_initialized() {
      return Ok(());
    }
    self.inner.initialized.set(true);
    self.inner.enabled.set(false);
    *self.inner.callback.borrow_mut() = Some(Box::new(callback));
    if registry.is_initialized() {
      self.update_entry(registry, false)
    } else {
      registry.defer_initialize(self);
      Ok(())
    }
  }

  /// Follow another sprite id, an enabled binding stays enabled.
  pub fn set_sprite_id(&self, registry: &AtlasRegistry, id: impl Into<SpriteId>) -> AtlasResult<()> {
    *self.inner.sprite_id.borrow_mut() = id.into();
    if self.is_initialized() { self.update_entry(registry, false) } else { Ok(()) }
  }

  /// Reference the bound entry, its image is loaded if it isn't yet. The
  /// current sprite of the entry is delivered at once.
  pub fn enable(&self, registry: &AtlasRegistry) -> AtlasResult<()> {
    if !self.is_initialized() || self.is_enabled() {
      return Ok(());
    }
    self.inner.enabled.set(true);
    let sprite = match self.entry() {
      Some(entry) => {
        registry.add_ref(entry)?;
        registry.sprite_of(entry).unwrap_or_default()
      }
      None => Sprite::empty(),
    };
    self.inner.apply(sprite);
    Ok(())
  }

  pub fn disable(&self, registry: &AtlasRegistry) -> AtlasResult<()> {
    if !self.is_initialized() || !self.is_enabled() {
      return Ok(());
    }
    self.inner.enabled.set(false);
    match self.entry() {
      Some(entry) => registry.sub_ref(entry),
      None => Ok(()),
    }
  }

  /// Unbind, drop the reference and forget the callback. The binding can be
  /// initialized again later.
  pub fn uninitialize(&self, registry: &AtlasRegistry) -> AtlasResult<()> {
    self.release(registry, true)
  }

  /// Resolve the sprite id again even if it maps to the same entry, called
  /// when the atlas database is replaced.
  pub fn on_atlas_db_changed(&self, registry: &AtlasRegistry) -> AtlasResult<()> {
    if !self.is_initialized() || !self.is_owner_valid() {
      return Ok(());
    }
    self.update_entry(registry, true)
  }

  pub(crate) fn on_delay_initialize(&self, registry: &AtlasRegistry) -> AtlasResult<()> {
    if !self.is_initialized() || !self.is_owner_valid() {
      return Ok(());
    }
    self.update_entry(registry, false)
  }

  /// `bound` is false when the registry already dropped the binding from its
  /// entry.
  pub(crate) fn release(&self, registry: &AtlasRegistry, bound: bool) -> AtlasResult<()> {
    if !self.is_initialized() {
      return Ok(());
    }
    if let Some(entry) = self.entry().filter(|_| bound) {
      registry.unbind(entry, self);
    }
    let res = self.disable(registry);

    let inner = &self.inner;
    inner.initialized.set(false);
    inner.entry.set(None);
    inner.callback.borrow_mut().take();
    *inner.sprite.borrow_mut() = Sprite::empty();
    res
  }

  /// Forget the entry without touching it, the entry no longer exists.
  pub(crate) fn detach(&self) { self.inner.entry.set(None) }

  fn update_entry(&self, registry: &AtlasRegistry, force: bool) -> AtlasResult<()> {
    let entry = registry.resolve(&self.sprite_id());
    if !registry.is_initialized() {
      registry.defer_initialize(self);
    }
    if !force && entry == self.entry() {
      return Ok(());
    }

    let was_enabled = self.is_enabled();
    if was_enabled {
      self.disable(registry)?;
    }
    if let Some(old) = self.inner.entry.take() {
      registry.unbind(old, self);
    }
    self.inner.entry.set(entry);
    if let Some(new) = entry {
      registry.bind(new, self);
    }
    if was_enabled {
      self.enable(registry)?;
    }
    Ok(())
  }
}

impl BindingInner {
  pub(crate) fn is_owner_valid(&self) -> bool { self.owner.is_alive() }

  /// Store and deliver a new sprite, nothing happens once the owner is gone.
  pub(crate) fn apply(&self, sprite: Sprite) {
    if !self.is_owner_valid() {
      return;
    }
    *self.sprite.borrow_mut() = sprite.clone();
    // The callback may call back into the binding, so it's taken out while
    // running.
    let callback = self.callback.borrow_mut().take();
    if let Some(mut callback) = callback {
      callback(&sprite);
      let mut slot = self.callback.borrow_mut();
      if slot.is_none() && self.initialized.get() {
        *slot = Some(callback);
      }
    }
  }
}

impl std::fmt::Debug for SpriteBinding {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SpriteBinding")
      .field("sprite_id", &self.sprite_id())
      .field("entry", &self.entry())
      .field("initialized", &self.is_initialized())
      .field("enabled", &self.is_enabled())
      .finish()
  }
}
