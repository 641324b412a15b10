use std::{
  rc::Rc,
  sync::atomic::{AtomicU64, Ordering},
};

use crate::{
  AtlasEntryData, AtlasError, AtlasResult, LoadToken, Placement, Sprite, binding::BindingInner,
};

/// Identify an atlas entry, unique in the process and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
  pub(crate) fn next() -> Self {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }

  #[inline]
  pub fn get(self) -> u64 { self.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtlasStatus {
  Unloaded,
  Loading,
  Loaded,
}

pub(crate) enum EntryKind {
  /// Stands for every unknown sprite id, always shows the fallback sprite.
  Dummy,
  Dynamic(DynamicEntry),
}

pub(crate) struct DynamicEntry {
  pub(crate) data: AtlasEntryData,
  /// The sprite once packed, only meaningful in the loaded status.
  pub(crate) sprite: Option<Sprite>,
  pub(crate) placement: Option<Placement>,
  /// Cancels the load in flight.
  pub(crate) load: Option<LoadToken>,
}

/// One packable image and its consumers.
pub(crate) struct AtlasEntry {
  pub(crate) id: EntryId,
  ref_count: u32,
  life_time: f32,
  needed: bool,
  pub(crate) status: AtlasStatus,
  pub(crate) bindings: Vec<Rc<BindingInner>>,
  pub(crate) kind: EntryKind,
}

impl AtlasEntry {
  pub(crate) fn dummy() -> Self { Self::new(EntryKind::Dummy) }

  pub(crate) fn dynamic(data: AtlasEntryData) -> Self {
    Self::new(EntryKind::Dynamic(DynamicEntry {
      data,
      sprite: None,
      placement: None,
      load: None,
    }))
  }

  fn new(kind: EntryKind) -> Self {
    Self {
      id: EntryId::next(),
      ref_count: 0,
      life_time: 0.,
      needed: false,
      status: AtlasStatus::Unloaded,
      bindings: vec![],
      kind,
    }
  }

  #[inline]
  pub(crate) fn ref_count(&self) -> u32 { self.ref_count }

  #[inline]
  pub(crate) fn life_time(&self) -> f32 { self.life_time }

  #[inline]
  pub(crate) fn is_needed(&self) -> bool { self.needed }

  #[inline]
  pub(crate) fn is_ticking(&self) -> bool { self.life_time > 0. }

  pub(crate) fn label(&self) -> &str {
    match &self.kind {
      EntryKind::Dummy => "dummy",
      EntryKind::Dynamic(d) => d.data.identifier.as_str(),
    }
  }

  pub(crate) fn as_dynamic_mut(&mut self) -> Option<&mut DynamicEntry> {
    match &mut self.kind {
      EntryKind::Dummy => None,
      EntryKind::Dynamic(d) => Some(d),
    }
  }

  /// The sprite consumers of this entry should show now.
  pub(crate) fn sprite(&self) -> Sprite {
    match &self.kind {
      EntryKind::Dynamic(DynamicEntry { sprite: Some(sprite), .. })
        if self.status == AtlasStatus::Loaded =>
      {
        sprite.clone()
      }
      _ => Sprite::fallback(),
    }
  }

  /// Return the new needed state if it changed.
  pub(crate) fn add_ref(&mut self) -> Option<bool> {
    self.ref_count += 1;
    self.refresh_needed()
  }

  pub(crate) fn sub_ref(&mut self) -> AtlasResult<Option<bool>> {
    self.ref_count = self
      .ref_count
      .checked_sub(1)
      .ok_or(AtlasError::RefCountUnderflow(self.id))?;
    Ok(self.refresh_needed())
  }

  /// Set the seconds the entry stays needed without any reference. Return the
  /// new needed state if it changed.
  pub(crate) fn set_life_time(&mut self, seconds: f32) -> Option<bool> {
    self.life_time = seconds.max(0.);
    self.refresh_needed()
  }

  fn refresh_needed(&mut self) -> Option<bool> {
    let needed = self.ref_count > 0 || self.life_time != 0.;
    (needed != self.needed).then(|| {
      self.needed = needed;
      needed
    })
  }

  pub(crate) fn is_bound(&self, binding: &Rc<BindingInner>) -> bool {
    self.bindings.iter().any(|b| Rc::ptr_eq(b, binding))
  }

  /// Remove and return the bindings whose owner is gone.
  pub(crate) fn take_dead_bindings(&mut self) -> Vec<Rc<BindingInner>> {
    let (alive, dead): (Vec<_>, Vec<_>) = std::mem::take(&mut self.bindings)
      .into_iter()
      .partition(|b| b.is_owner_valid());
    self.bindings = alive;
    dead
  }
}
