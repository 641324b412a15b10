use std::{
  cell::RefCell,
  rc::{Rc, Weak},
};

use ahash::{HashMap, HashSet};
use dynatlas_algo::PackError;
use dynatlas_geom::DeviceSize;
use futures::{
  executor::{LocalPool, LocalSpawner},
  future::Abortable,
  task::LocalSpawnExt,
};
use log::{debug, error, info, warn};

use crate::{
  AtlasConfig, AtlasDb, AtlasEntry, AtlasError, AtlasResult, AtlasStatus, AtlasTexture,
  AtlasTextureId, EntryId, GpuBackend, LoadToken, PixelImage, Placement, ResourceLoader, Sprite,
  SpriteBinding, SpriteId, SpriteTexture, binding::BindingInner, compose_packed, entry::EntryKind,
};

/// Work for the consumers, done once the registry state is released so the
/// callbacks can call back into the registry.
enum Outgoing {
  Deliver(Rc<BindingInner>, Sprite),
  /// The owner is gone and the binding is already removed from its entry.
  Release(Rc<BindingInner>),
}

/// Owns the atlas textures and the entries of the atlas database, maps sprite
/// ids to entries and drives the image loads.
///
/// Everything runs on the thread owning the registry. Loads are local futures
/// driven by [`AtlasRegistry::tick`] or [`AtlasRegistry::poll_loads`].
pub struct AtlasRegistry {
  state: Rc<RefCell<RegistryState>>,
  pool: RefCell<LocalPool>,
}

struct RegistryState {
  config: AtlasConfig,
  loader: Box<dyn ResourceLoader>,
  backend: Box<dyn GpuBackend>,
  spawner: LocalSpawner,
  this: Weak<RefCell<RegistryState>>,
  initialized: bool,
  ids: HashMap<SpriteId, EntryId>,
  entries: HashMap<EntryId, AtlasEntry>,
  /// The dummy entry first, then the database order.
  order: Vec<EntryId>,
  dummy: EntryId,
  ticking: HashSet<EntryId>,
  textures: Vec<AtlasTexture>,
  pending_uploads: HashSet<AtlasTextureId>,
  sweep_cursor: usize,
  delayed: Vec<Rc<BindingInner>>,
  /// Cancels the database load in flight.
  db_load: Option<LoadToken>,
  outbox: Vec<Outgoing>,
  task_errors: Vec<AtlasError>,
  fallback_image: PixelImage,
}

impl AtlasRegistry {
  pub fn new(
    config: AtlasConfig, loader: impl ResourceLoader + 'static, backend: impl GpuBackend + 'static,
  ) -> AtlasResult<Self> {
    config.validate()?;
    let pool = LocalPool::new();
    let spawner = pool.spawner();
    let dummy = AtlasEntry::dummy();
    let dummy_id = dummy.id;
    let mut entries = HashMap::default();
    entries.insert(dummy_id, dummy);

    let state = Rc::new_cyclic(|this| {
      RefCell::new(RegistryState {
        config,
        loader: Box::new(loader),
        backend: Box::new(backend),
        spawner,
        this: this.clone(),
        initialized: false,
        ids: HashMap::default(),
        entries,
        order: vec![dummy_id],
        dummy: dummy_id,
        ticking: HashSet::default(),
        textures: vec![],
        pending_uploads: HashSet::default(),
        sweep_cursor: 0,
        delayed: vec![],
        db_load: None,
        outbox: vec![],
        task_errors: vec![],
        fallback_image: PixelImage::transparent(2, 2),
      })
    });
    Ok(Self { state, pool: RefCell::new(pool) })
  }

  pub fn config(&self) -> AtlasConfig { self.state.borrow().config.clone() }

  /// Whether an atlas database is loaded.
  pub fn is_initialized(&self) -> bool { self.state.borrow().initialized }

  /// The entry showing the sprite `id`. An unknown id resolves to the dummy
  /// entry, an empty id or a registry without database to nothing.
  pub fn resolve(&self, id: &SpriteId) -> Option<EntryId> { self.state.borrow().resolve(id) }

  /// The entry standing for unknown sprite ids.
  pub fn dummy_entry(&self) -> EntryId { self.state.borrow().dummy }

  /// Find room for an image of `size`, in the first canvas that has some or
  /// in a new one.
  pub fn request_placement(&self, size: DeviceSize) -> AtlasResult<Placement> {
    self.state.borrow_mut().place(size).map(|(_, p)| p)
  }

  pub fn free_placement(&self, placement: &Placement) -> AtlasResult<()> {
    self.state.borrow_mut().free_placement(placement)
  }

  /// Replace the atlas database. The entries of the previous one are
  /// unloaded and every binding resolves its sprite id again.
  pub fn load_db(&self, db: AtlasDb) -> AtlasResult<()> { self.replace_db(Some(db)) }

  pub fn load_db_json(&self, json: &str) -> AtlasResult<()> { self.load_db(AtlasDb::from_json(json)?) }

  /// Load the atlas database from the resource at `path`. A load started
  /// later or [`AtlasRegistry::shutdown`] cancels it.
  pub async fn load_db_from_resource(&self, path: &str) -> AtlasResult<()> {
    let (token, reg) = LoadToken::new_pair();
    let text = {
      let mut state = self.state.borrow_mut();
      if let Some(previous) = state.db_load.replace(token.clone()) {
        previous.cancel();
      }
      state.loader.load_text(path, token.clone())
    };
    let text = Abortable::new(text, reg).await;
    if token.is_cancelled() {
      debug!("{}: the load of atlas database `{path}` is cancelled", self.config().label);
      return Err(AtlasError::LoadCancelled(path.to_string()));
    }
    self.state.borrow_mut().db_load = None;
    match text {
      Ok(Some(json)) => self.load_db_json(&json),
      _ => {
        warn!("{}: atlas database `{path}` not found", self.config().label);
        Err(AtlasError::DbNotFound(path.to_string()))
      }
    }
  }

  pub fn unload_db(&self) -> AtlasResult<()> { self.replace_db(None) }

  pub fn add_ref(&self, entry: EntryId) -> AtlasResult<()> {
    let res = self.state.borrow_mut().add_ref(entry);
    self.dispatch();
    res
  }

  pub fn sub_ref(&self, entry: EntryId) -> AtlasResult<()> {
    let res = self.state.borrow_mut().sub_ref(entry);
    self.dispatch();
    res
  }

  /// Keep the entry needed for `seconds` more, counted down by
  /// [`AtlasRegistry::tick`].
  pub fn set_life_time(&self, entry: EntryId, seconds: f32) -> AtlasResult<()> {
    let res = self.state.borrow_mut().set_life_time(entry, seconds);
    self.dispatch();
    res
  }

  pub fn bind(&self, entry: EntryId, binding: &SpriteBinding) {
    self.state.borrow_mut().bind(entry, binding.inner());
  }

  pub fn unbind(&self, entry: EntryId, binding: &SpriteBinding) {
    self.state.borrow_mut().unbind(entry, binding.inner());
  }

  pub fn entry_status(&self, entry: EntryId) -> Option<AtlasStatus> {
    self.state.borrow().entries.get(&entry).map(|e| e.status)
  }

  pub fn ref_count(&self, entry: EntryId) -> Option<u32> {
    self.state.borrow().entries.get(&entry).map(|e| e.ref_count())
  }

  pub fn life_time(&self, entry: EntryId) -> Option<f32> {
    self.state.borrow().entries.get(&entry).map(|e| e.life_time())
  }

  pub fn sprite_of(&self, entry: EntryId) -> Option<Sprite> {
    self.state.borrow().entries.get(&entry).map(|e| e.sprite())
  }

  pub fn bound_count(&self, entry: EntryId) -> usize {
    self
      .state
      .borrow()
      .entries
      .get(&entry)
      .map_or(0, |e| e.bindings.len())
  }

  pub fn placement_of(&self, entry: EntryId) -> Option<Placement> {
    let mut state = self.state.borrow_mut();
    state
      .entries
      .get_mut(&entry)
      .and_then(|e| e.as_dynamic_mut())
      .and_then(|d| d.placement)
  }

  /// Advance the frame by `delta_seconds` and drive the pending loads. Fatal
  /// errors raised by the loads since the last call are returned here.
  pub fn tick(&self, delta_seconds: f32) -> AtlasResult<()> {
    self.run_loads();
    let res = self.state.borrow_mut().advance(delta_seconds);
    self.dispatch();
    self.report(res)
  }

  /// Drive the loads without advancing the time.
  pub fn poll_loads(&self) -> AtlasResult<()> {
    self.run_loads();
    self.dispatch();
    self.report(Ok(()))
  }

  /// Upload every canvas written on the CPU since the last flush, once each.
  /// Return the number of uploaded canvases.
  pub fn flush_pending_uploads(&self) -> usize {
    let mut state = self.state.borrow_mut();
    let state = &mut *state;
    if state.pending_uploads.is_empty() {
      return 0;
    }
    let pending = std::mem::take(&mut state.pending_uploads);
    let mut uploaded = 0;
    for tex in state.textures.iter() {
      if let Some(data) = tex.cpu_buffer().filter(|_| pending.contains(&tex.id())) {
        state.backend.upload_texture(tex.id(), data);
        uploaded += 1;
      }
    }
    uploaded
  }

  /// Cancel the loads, unload every entry and release all the canvases.
  pub fn unload_resources(&self) -> AtlasResult<()> {
    let res = self.state.borrow_mut().unload_resources();
    self.dispatch();
    res
  }

  /// Release all the canvases and load again the entries still needed.
  pub fn reload_resources(&self) -> AtlasResult<()> {
    let res = self.state.borrow_mut().unload_resources();
    self.state.borrow_mut().reload_needed();
    self.dispatch();
    res
  }

  pub fn shutdown(&self) -> AtlasResult<()> {
    if let Some(token) = self.state.borrow_mut().db_load.take() {
      token.cancel();
    }
    let res = self.unload_resources();
    let db = self.unload_db();
    self.state.borrow_mut().delayed.clear();
    res.and(db)
  }

  pub fn texture_count(&self) -> usize { self.state.borrow().textures.len() }

  /// The canvases in creation order and how full they are.
  pub fn textures(&self) -> Vec<(AtlasTextureId, f32)> {
    self
      .state
      .borrow()
      .textures
      .iter()
      .map(|t| (t.id(), t.fill_rate()))
      .collect()
  }

  /// The image behind [`SpriteTexture::Fallback`].
  pub fn fallback_image(&self) -> PixelImage { self.state.borrow().fallback_image.clone() }

  pub fn pending_upload_count(&self) -> usize { self.state.borrow().pending_uploads.len() }

  pub(crate) fn defer_initialize(&self, binding: &SpriteBinding) {
    let mut state = self.state.borrow_mut();
    let inner = binding.inner();
    if !state.delayed.iter().any(|b| Rc::ptr_eq(b, inner)) {
      state.delayed.push(inner.clone());
    }
  }

  fn replace_db(&self, db: Option<AtlasDb>) -> AtlasResult<()> {
    let (rebind, mut res) = self.state.borrow_mut().replace_db(db)?;
    self.dispatch();

    for binding in rebind {
      let res2 = SpriteBinding::from_inner(binding).on_atlas_db_changed(self);
      res = res.and(res2);
    }
    if self.is_initialized() {
      let delayed = std::mem::take(&mut self.state.borrow_mut().delayed);
      for binding in delayed {
        let res2 = SpriteBinding::from_inner(binding).on_delay_initialize(self);
        res = res.and(res2);
      }
    }
    self.dispatch();
    res
  }

  fn run_loads(&self) {
    match self.pool.try_borrow_mut() {
      Ok(mut pool) => pool.run_until_stalled(),
      Err(_) => debug!("atlas loads are already being driven"),
    }
  }

  fn dispatch(&self) {
    loop {
      let outbox = std::mem::take(&mut self.state.borrow_mut().outbox);
      if outbox.is_empty() {
        break;
      }
      for msg in outbox {
        match msg {
          Outgoing::Deliver(binding, sprite) => binding.apply(sprite),
          Outgoing::Release(binding) => {
            if let Err(err) = SpriteBinding::from_inner(binding).release(self, false) {
              self.state.borrow_mut().task_errors.push(err);
            }
          }
        }
      }
    }
  }

  fn report(&self, res: AtlasResult<()>) -> AtlasResult<()> {
    let mut state = self.state.borrow_mut();
    let state = &mut *state;
    let mut first = res.err();
    for err in state.task_errors.drain(..) {
      if first.is_none() {
        first = Some(err);
      } else {
        error!("{}: {err}", state.config.label);
      }
    }
    first.map_or(Ok(()), Err)
  }
}

impl Drop for AtlasRegistry {
  fn drop(&mut self) {
    if let Ok(state) = self.state.try_borrow() {
      state.db_load.iter().for_each(LoadToken::cancel);
      for entry in state.entries.values() {
        if let EntryKind::Dynamic(d) = &entry.kind {
          d.load.iter().for_each(LoadToken::cancel);
        }
      }
    }
  }
}

impl RegistryState {
  fn resolve(&self, id: &SpriteId) -> Option<EntryId> {
    if !self.initialized || id.is_empty() {
      return None;
    }
    let entry = self.ids.get(id).copied().unwrap_or_else(|| {
      warn!("{}: sprite `{id}` is not in the atlas database", self.config.label);
      self.dummy
    });
    Some(entry)
  }

  fn place(&mut self, size: DeviceSize) -> AtlasResult<(usize, Placement)> {
    let edge = self.config.canvas_edge;
    if size.width > edge || size.height > edge {
      return Err(AtlasError::ExceedsCanvas { width: size.width, height: size.height, edge });
    }
    if size.width <= 0 || size.height <= 0 {
      return Err(AtlasError::InvalidSize { width: size.width, height: size.height });
    }

    for (idx, tex) in self.textures.iter_mut().enumerate() {
      match tex.add(size) {
        Ok(alloc) => return Ok((idx, Placement { texture: tex.id(), alloc })),
        Err(err) if err.is_no_room() => {}
        Err(err) => return Err(err.into()),
      }
    }

    let mut tex = AtlasTexture::new(&self.config, self.backend.as_mut());
    info!(
      "{}: create atlas texture {:?}, {} in total",
      self.config.label,
      tex.id(),
      self.textures.len() + 1
    );
    let alloc = tex.add(size).map_err(|err| {
      if err.is_no_room() {
        AtlasError::PackFailed { width: size.width, height: size.height }
      } else {
        err.into()
      }
    });
    let placement = Placement { texture: tex.id(), alloc: alloc? };
    self.textures.push(tex);
    Ok((self.textures.len() - 1, placement))
  }

  fn free_placement(&mut self, placement: &Placement) -> AtlasResult<()> {
    let alloc = placement.alloc.id;
    let tex = self
      .textures
      .iter_mut()
      .find(|t| t.id() == placement.texture)
      .ok_or(PackError::UnknownAllocation(alloc))?;
    tex.free(alloc)?;
    Ok(())
  }

  fn add_ref(&mut self, id: EntryId) -> AtlasResult<()> {
    let Some(entry) = self.entries.get_mut(&id) else {
      debug!("{}: add a reference to a released entry {id:?}", self.config.label);
      return Ok(());
    };
    let change = entry.add_ref();
    if change.is_none() && entry.is_needed() {
      // a failed load left it unloaded while needed, try again.
      self.schedule_load(id);
      return Ok(());
    }
    self.apply_needed(id, change)
  }

  fn sub_ref(&mut self, id: EntryId) -> AtlasResult<()> {
    let Some(entry) = self.entries.get_mut(&id) else {
      debug!("{}: remove a reference from a released entry {id:?}", self.config.label);
      return Ok(());
    };
    let change = entry.sub_ref()?;
    self.apply_needed(id, change)
  }

  fn set_life_time(&mut self, id: EntryId, seconds: f32) -> AtlasResult<()> {
    let Some(entry) = self.entries.get_mut(&id) else { return Ok(()) };
    let change = entry.set_life_time(seconds);
    if entry.is_ticking() {
      self.ticking.insert(id);
    } else {
      self.ticking.remove(&id);
    }
    self.apply_needed(id, change)
  }

  fn apply_needed(&mut self, id: EntryId, change: Option<bool>) -> AtlasResult<()> {
    match change {
      Some(true) => {
        self.schedule_load(id);
        Ok(())
      }
      Some(false) => self.unload_entry(id),
      None => Ok(()),
    }
  }

  fn bind(&mut self, id: EntryId, binding: &Rc<BindingInner>) {
    let Some(entry) = self.entries.get_mut(&id) else { return };
    if entry.is_bound(binding) {
      error!("{}: binding already bound to `{}`", self.config.label, entry.label());
    } else {
      entry.bindings.push(binding.clone());
    }
  }

  fn unbind(&mut self, id: EntryId, binding: &Rc<BindingInner>) {
    let Some(entry) = self.entries.get_mut(&id) else { return };
    let len = entry.bindings.len();
    entry.bindings.retain(|b| !Rc::ptr_eq(b, binding));
    if entry.bindings.len() == len {
      error!("{}: unbind a binding not bound to `{}`", self.config.label, entry.label());
    }
  }

  fn schedule_load(&mut self, id: EntryId) {
    let Some(entry) = self.entries.get_mut(&id) else { return };
    if entry.status != AtlasStatus::Unloaded {
      return;
    }
    let Some(dynamic) = entry.as_dynamic_mut() else { return };

    let path = &dynamic.data.texture_resource_path;
    debug!("{}: load `{path}`", self.config.label);
    let (token, reg) = LoadToken::new_pair();
    let load = self.loader.load_image(path, token.clone());
    dynamic.load = Some(token.clone());
    entry.status = AtlasStatus::Loading;

    let this = self.this.clone();
    let task = Abortable::new(
      async move {
        let image = load.await;
        if token.is_cancelled() {
          return;
        }
        let Some(state) = this.upgrade() else { return };
        let mut state = state.borrow_mut();
        if let Err(err) = state.finish_load(id, image) {
          state.task_errors.push(err);
        }
      },
      reg,
    );
    if let Err(err) = self.spawner.spawn_local(async move {
      let _ = task.await;
    }) {
      error!("{}: can't spawn the load of {id:?}: {err}", self.config.label);
      if let Some(entry) = self.entries.get_mut(&id) {
        entry.status = AtlasStatus::Unloaded;
      }
    }
  }

  fn finish_load(&mut self, id: EntryId, image: Option<PixelImage>) -> AtlasResult<()> {
    let Some(entry) = self.entries.get_mut(&id) else { return Ok(()) };
    if entry.status != AtlasStatus::Loading {
      return Ok(());
    }
    entry.status = AtlasStatus::Unloaded;
    let Some(dynamic) = entry.as_dynamic_mut() else { return Ok(()) };
    dynamic.load = None;
    let path = dynamic.data.texture_resource_path.clone();
    let declared = dynamic.data.texture_size();
    let source = dynamic.data.sprite_data();

    let Some(image) = image else {
      warn!("{}: `{path}` failed to load, keep the fallback sprite", self.config.label);
      return Ok(());
    };
    if image.size() != declared {
      return Err(AtlasError::SizeMismatch { path, declared, actual: image.size() });
    }

    let (idx, placement) = self.place(declared)?;
    let tex = &mut self.textures[idx];
    match tex.fill_region(&image, placement.position(), self.backend.as_mut()) {
      Ok(true) => {
        self.pending_uploads.insert(placement.texture);
      }
      Ok(false) => {}
      Err(err) => {
        if let Err(free_err) = tex.free(placement.alloc.id) {
          error!("{}: {free_err}", self.config.label);
        }
        return Err(err);
      }
    }

    let data = compose_packed(&source, &placement.rect(), self.config.canvas_edge);
    let sprite = Sprite { data: Rc::new(data), texture: SpriteTexture::Atlas(placement.texture) };
    if let Some(entry) = self.entries.get_mut(&id) {
      entry.status = AtlasStatus::Loaded;
      if let Some(dynamic) = entry.as_dynamic_mut() {
        dynamic.placement = Some(placement);
        dynamic.sprite = Some(sprite);
      }
    }
    debug!("{}: `{path}` packed at {:?} of {:?}", self.config.label, placement.rect(), placement.texture);
    self.deliver(id);
    Ok(())
  }

  /// Push the current sprite of the entry to its consumers, the dead ones are
  /// released instead.
  fn deliver(&mut self, id: EntryId) {
    let Some(entry) = self.entries.get_mut(&id) else { return };
    for dead in entry.take_dead_bindings() {
      self.outbox.push(Outgoing::Release(dead));
    }
    let sprite = entry.sprite();
    self.outbox.extend(
      entry
        .bindings
        .iter()
        .map(|b| Outgoing::Deliver(b.clone(), sprite.clone())),
    );
  }

  fn unload_entry(&mut self, id: EntryId) -> AtlasResult<()> {
    let Some(entry) = self.entries.get_mut(&id) else { return Ok(()) };
    match entry.status {
      AtlasStatus::Unloaded => Ok(()),
      AtlasStatus::Loading => {
        entry.status = AtlasStatus::Unloaded;
        if let Some(token) = entry.as_dynamic_mut().and_then(|d| d.load.take()) {
          token.cancel();
        }
        debug!("{}: cancel the load of `{}`", self.config.label, entry.label());
        Ok(())
      }
      AtlasStatus::Loaded => {
        entry.status = AtlasStatus::Unloaded;
        let placement = entry.as_dynamic_mut().and_then(|d| {
          d.sprite = None;
          d.placement.take()
        });
        debug!("{}: unload `{}`", self.config.label, entry.label());
        if let Some(placement) = placement {
          self.free_placement(&placement)?;
        }
        self.deliver(id);
        Ok(())
      }
    }
  }

  fn advance(&mut self, delta_seconds: f32) -> AtlasResult<()> {
    let mut res = Ok(());
    let mut ticking: Vec<_> = self.ticking.iter().copied().collect();
    ticking.sort_unstable();
    for id in ticking {
      let Some(entry) = self.entries.get_mut(&id) else {
        self.ticking.remove(&id);
        continue;
      };
      let change = entry.set_life_time((entry.life_time() - delta_seconds).max(0.));
      if !entry.is_ticking() {
        self.ticking.remove(&id);
      }
      res = res.and(self.apply_needed(id, change));
    }

    self.sweep_one();
    res
  }

  /// Release the dead consumers of one entry, a different one every frame.
  fn sweep_one(&mut self) {
    if self.order.is_empty() {
      return;
    }
    let idx = self.sweep_cursor % self.order.len();
    self.sweep_cursor = (idx + 1) % self.order.len();
    if let Some(entry) = self.entries.get_mut(&self.order[idx]) {
      for dead in entry.take_dead_bindings() {
        self.outbox.push(Outgoing::Release(dead));
      }
    }
  }

  fn unload_resources(&mut self) -> AtlasResult<()> {
    let mut res = Ok(());
    for id in self.order.clone() {
      res = res.and(self.unload_entry(id));
    }
    for tex in self.textures.iter_mut() {
      tex.unload(self.backend.as_mut());
    }
    if !self.textures.is_empty() {
      info!("{}: release {} atlas textures", self.config.label, self.textures.len());
    }
    self.textures.clear();
    self.pending_uploads.clear();
    res
  }

  fn reload_needed(&mut self) {
    for id in self.order.clone() {
      if self.entries.get(&id).is_some_and(|e| e.is_needed()) {
        self.schedule_load(id);
      }
    }
  }

  /// Swap the entries for the ones of `db`. Return the bindings to resolve
  /// again and the first failure met while unloading the old entries.
  fn replace_db(
    &mut self, db: Option<AtlasDb>,
  ) -> AtlasResult<(Vec<Rc<BindingInner>>, AtlasResult<()>)> {
    let loaded = db.is_some();
    let mut ids = HashMap::default();
    let mut new_entries = vec![];
    if let Some(db) = db.as_ref() {
      for data in &db.entries {
        data.validate()?;
      }
    }
    for data in db.into_iter().flat_map(|db| db.entries) {
      let identifier = data.identifier.clone();
      let entry = AtlasEntry::dynamic(data);
      if let Some(old) = ids.insert(identifier.clone(), entry.id) {
        warn!("{}: duplicate sprite `{identifier}`, the last one wins", self.config.label);
        new_entries.retain(|e: &AtlasEntry| e.id != old);
      }
      new_entries.push(entry);
    }

    let mut res = Ok(());
    let mut rebind = vec![];
    let old = self.order.split_off(1);
    for id in old {
      res = res.and(self.unload_entry(id));
      self.ticking.remove(&id);
      if let Some(entry) = self.entries.remove(&id) {
        for binding in entry.bindings {
          SpriteBinding::from_inner(binding.clone()).detach();
          rebind.push(binding);
        }
      }
    }
    if let Some(dummy) = self.entries.get(&self.dummy) {
      rebind.extend(dummy.bindings.iter().cloned());
    }

    self.initialized = loaded;
    self.ids = ids;
    self.sweep_cursor = 0;
    for entry in new_entries {
      self.order.push(entry.id);
      self.entries.insert(entry.id, entry);
    }
    info!("{}: atlas database holds {} sprites", self.config.label, self.ids.len());
    Ok((rebind, res))
  }
}

#[cfg(test)]
mod tests {
  use dynatlas_geom::{DevicePoint, Vec4};
  use futures::{FutureExt, future::LocalBoxFuture};

  use super::*;
  use crate::{AtlasEntryData, HeadlessBackend, TextureFormat};

  #[derive(Default)]
  struct MapLoader(HashMap<String, PixelImage>);

  impl ResourceLoader for MapLoader {
    fn load_image(&self, path: &str, _: LoadToken) -> LocalBoxFuture<'static, Option<PixelImage>> {
      futures::future::ready(self.0.get(path).cloned()).boxed_local()
    }

    fn load_text(&self, _: &str, _: LoadToken) -> LocalBoxFuture<'static, Option<String>> {
      futures::future::ready(None).boxed_local()
    }
  }

  fn record(name: &str, edge: i32) -> AtlasEntryData {
    AtlasEntryData {
      identifier: name.into(),
      outer_uv: Vec4::UNIT_RECT,
      inner_uv: Vec4::UNIT_RECT,
      border: Vec4::ZERO,
      is_rotated: false,
      padding_factor: Vec4::UNIT_RECT,
      pixels_per_unit: 100.,
      size: dynatlas_geom::Size::new(edge as f32, edge as f32),
      texture_resource_path: format!("{name}.img"),
      texture_width: edge,
      texture_height: edge,
    }
  }

  fn image(edge: i32) -> PixelImage {
    PixelImage::new(edge, edge, TextureFormat::Rgba8, vec![9; (edge * edge * 4) as usize]).unwrap()
  }

  fn registry(edge: i32, images: &[(&str, i32)]) -> AtlasRegistry {
    let mut loader = MapLoader::default();
    for (name, size) in images {
      loader.0.insert(format!("{name}.img"), image(*size));
    }
    let config = AtlasConfig::default().with_canvas_edge(edge);
    AtlasRegistry::new(config, loader, HeadlessBackend).unwrap()
  }

  #[test]
  fn placement_routing() {
    let registry = registry(64, &[]);
    assert!(matches!(
      registry.request_placement(DeviceSize::new(65, 1)),
      Err(AtlasError::ExceedsCanvas { edge: 64, .. })
    ));
    assert!(matches!(
      registry.request_placement(DeviceSize::new(0, 4)),
      Err(AtlasError::InvalidSize { .. })
    ));

    let first = registry
      .request_placement(DeviceSize::new(64, 64))
      .unwrap();
    let second = registry
      .request_placement(DeviceSize::new(64, 64))
      .unwrap();
    assert_ne!(first.texture, second.texture);
    assert_eq!(registry.texture_count(), 2);
    assert_eq!(registry.textures()[0], (first.texture, 1.));

    registry.free_placement(&first).unwrap();
    let third = registry
      .request_placement(DeviceSize::new(32, 32))
      .unwrap();
    assert_eq!(third.texture, first.texture);
    assert_eq!(third.position(), DevicePoint::zero());
    assert!(registry.free_placement(&first).is_err());
  }

  #[test]
  fn resolve_needs_a_database() {
    let registry = registry(64, &[]);
    assert!(!registry.is_initialized());
    assert_eq!(registry.resolve(&"a".into()), None);

    registry
      .load_db(AtlasDb { entries: vec![record("a", 8)] })
      .unwrap();
    assert!(registry.is_initialized());
    let a = registry.resolve(&"a".into()).unwrap();
    assert_ne!(a, registry.dummy_entry());
    assert_eq!(registry.resolve(&"missing".into()), Some(registry.dummy_entry()));
    assert_eq!(registry.resolve(&SpriteId::default()), None);
  }

  #[test]
  fn load_pack_and_upload() {
    let registry = registry(64, &[("a", 8)]);
    registry
      .load_db(AtlasDb { entries: vec![record("a", 8)] })
      .unwrap();
    let a = registry.resolve(&"a".into()).unwrap();

    registry.add_ref(a).unwrap();
    assert_eq!(registry.entry_status(a), Some(AtlasStatus::Loading));
    assert!(registry.sprite_of(a).unwrap().is_fallback());

    registry.poll_loads().unwrap();
    assert_eq!(registry.entry_status(a), Some(AtlasStatus::Loaded));
    let sprite = registry.sprite_of(a).unwrap();
    let placement = registry.placement_of(a).unwrap();
    assert_eq!(sprite.texture, SpriteTexture::Atlas(placement.texture));
    assert_eq!(sprite.data.uv, Vec4::new(0., 0., 0.125, 0.125));
    assert!(sprite.data.is_packed);

    assert_eq!(registry.pending_upload_count(), 1);
    assert_eq!(registry.flush_pending_uploads(), 1);
    assert_eq!(registry.flush_pending_uploads(), 0);

    registry.sub_ref(a).unwrap();
    assert_eq!(registry.entry_status(a), Some(AtlasStatus::Unloaded));
    assert!(registry.sprite_of(a).unwrap().is_fallback());
    assert_eq!(registry.textures()[0].1, 0.);
  }

  #[test]
  fn missing_resource_goes_back_to_unloaded() {
    let registry = registry(64, &[]);
    registry
      .load_db(AtlasDb { entries: vec![record("a", 8)] })
      .unwrap();
    let a = registry.resolve(&"a".into()).unwrap();
    registry.add_ref(a).unwrap();
    registry.tick(0.016).unwrap();
    assert_eq!(registry.entry_status(a), Some(AtlasStatus::Unloaded));
    assert_eq!(registry.texture_count(), 0);
  }

  #[test]
  fn duplicate_identifier_last_wins() {
    let registry = registry(64, &[]);
    let mut second = record("a", 16);
    second.texture_resource_path = "second.img".into();
    registry
      .load_db(AtlasDb { entries: vec![record("a", 8), second] })
      .unwrap();
    let a = registry.resolve(&"a".into()).unwrap();
    let state = registry.state.borrow();
    assert_eq!(state.order.len(), 2);
    let EntryKind::Dynamic(d) = &state.entries[&a].kind else { panic!("dynamic entry expected") };
    assert_eq!(d.data.texture_resource_path, "second.img");
  }

  #[test]
  fn invalid_record_keeps_previous_database() {
    let registry = registry(64, &[]);
    registry
      .load_db(AtlasDb { entries: vec![record("a", 8)] })
      .unwrap();
    let mut bad = record("b", 8);
    bad.padding_factor = Vec4::new(0.5, 0., 0.25, 1.);
    assert!(registry.load_db(AtlasDb { entries: vec![bad] }).is_err());
    assert_ne!(registry.resolve(&"a".into()), Some(registry.dummy_entry()));
  }

  #[test]
  fn ref_count_underflow() {
    let registry = registry(64, &[]);
    let dummy = registry.dummy_entry();
    assert!(matches!(registry.sub_ref(dummy), Err(AtlasError::RefCountUnderflow(id)) if id == dummy));
  }

  #[test]
  fn reject_bad_config() {
    let config = AtlasConfig::new("astc", TextureFormat::Astc6x6).with_canvas_edge(1024);
    assert!(matches!(
      AtlasRegistry::new(config, MapLoader::default(), HeadlessBackend),
      Err(AtlasError::InvalidConfig(_))
    ));
  }
}
