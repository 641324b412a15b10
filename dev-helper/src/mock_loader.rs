use std::{cell::RefCell, rc::Rc};

use ahash::HashMap;
use dynatlas::{LoadToken, PixelImage, ResourceLoader};
use futures::{
  FutureExt,
  channel::oneshot,
  future::LocalBoxFuture,
};

/// A [`ResourceLoader`] serving images and texts from memory. Clones share
/// the same resources, so a test keeps one to drive the loader it gave away.
///
/// A gated loader holds every image and text load until [`MockLoader::release`] is called for
/// its path, which lets a test observe the loading status.
#[derive(Clone, Default)]
pub struct MockLoader {
  state: Rc<RefCell<LoaderState>>,
}

#[derive(Default)]
struct LoaderState {
  images: HashMap<String, PixelImage>,
  texts: HashMap<String, String>,
  gated: bool,
  gates: Vec<(String, oneshot::Sender<()>)>,
  loads: HashMap<String, usize>,
  tokens: Vec<(String, LoadToken)>,
}

impl MockLoader {
  pub fn new() -> Self { Self::default() }

  pub fn with_image(self, path: impl Into<String>, image: PixelImage) -> Self {
    self.insert_image(path, image);
    self
  }

  pub fn insert_image(&self, path: impl Into<String>, image: PixelImage) {
    self
      .state
      .borrow_mut()
      .images
      .insert(path.into(), image);
  }

  pub fn remove_image(&self, path: &str) { self.state.borrow_mut().images.remove(path); }

  pub fn insert_text(&self, path: impl Into<String>, text: impl Into<String>) {
    self
      .state
      .borrow_mut()
      .texts
      .insert(path.into(), text.into());
  }

  pub fn set_gated(&self, gated: bool) { self.state.borrow_mut().gated = gated; }

  /// Let the held loads of `path` complete. Return how many were released.
  pub fn release(&self, path: &str) -> usize {
    let gates = {
      let mut state = self.state.borrow_mut();
      let (release, keep) = std::mem::take(&mut state.gates)
        .into_iter()
        .partition::<Vec<_>, _>(|(p, _)| p == path);
      state.gates = keep;
      release
    };
    gates
      .into_iter()
      .map(|(_, tx)| tx.send(()))
      .filter(Result::is_ok)
      .count()
  }

  pub fn release_all(&self) -> usize {
    let gates = std::mem::take(&mut self.state.borrow_mut().gates);
    gates
      .into_iter()
      .map(|(_, tx)| tx.send(()))
      .filter(Result::is_ok)
      .count()
  }

  /// The loads still held back.
  pub fn pending_count(&self) -> usize {
    self
      .state
      .borrow()
      .gates
      .iter()
      .filter(|(_, tx)| !tx.is_canceled())
      .count()
  }

  /// How many times `path` was requested.
  pub fn load_count(&self, path: &str) -> usize {
    self
      .state
      .borrow()
      .loads
      .get(path)
      .copied()
      .unwrap_or(0)
  }

  pub fn total_loads(&self) -> usize { self.state.borrow().loads.values().sum() }

  /// The token of the last load of `path`.
  pub fn last_token(&self, path: &str) -> Option<LoadToken> {
    self
      .state
      .borrow()
      .tokens
      .iter()
      .rev()
      .find(|(p, _)| p == path)
      .map(|(_, t)| t.clone())
  }

  fn gate(&self, path: &str, token: LoadToken) -> Option<oneshot::Receiver<()>> {
    let mut state = self.state.borrow_mut();
    *state.loads.entry(path.to_string()).or_default() += 1;
    state.tokens.push((path.to_string(), token));
    if !state.gated {
      return None;
    }
    let (tx, rx) = oneshot::channel();
    state.gates.push((path.to_string(), tx));
    Some(rx)
  }
}

impl ResourceLoader for MockLoader {
  fn load_image(&self, path: &str, token: LoadToken) -> LocalBoxFuture<'static, Option<PixelImage>> {
    let gate = self.gate(path, token);
    let state = self.state.clone();
    let path = path.to_string();
    async move {
      if let Some(gate) = gate {
        gate.await.ok()?;
      }
      state.borrow().images.get(&path).cloned()
    }
    .boxed_local()
  }

  fn load_text(&self, path: &str, token: LoadToken) -> LocalBoxFuture<'static, Option<String>> {
    let gate = self.gate(path, token);
    let state = self.state.clone();
    let path = path.to_string();
    async move {
      if let Some(gate) = gate {
        gate.await.ok()?;
      }
      state.borrow().texts.get(&path).cloned()
    }
    .boxed_local()
  }
}
