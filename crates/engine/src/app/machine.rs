use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info};

use super::object::{ObjectId, ObjectIdAllocator};
use super::state::{LifecycleError, Services, State, StateBehavior, StateId, StateStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOptions {
    pub init_new: bool,
    pub destroy_old: bool,
}

impl TransitionOptions {
    /// Switch back to a state that is already running.
    pub const RESUME: Self = Self {
        init_new: false,
        destroy_old: true,
    };
    /// Switch to a layer while the current state stays alive beneath it.
    pub const LAYER: Self = Self {
        init_new: true,
        destroy_old: false,
    };
}

impl Default for TransitionOptions {
    fn default() -> Self {
        Self {
            init_new: true,
            destroy_old: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub target: StateId,
    pub options: TransitionOptions,
}

/// Owns every live state and switches between them at frame boundaries only.
#[derive(Default)]
pub struct StateMachine {
    next_state_id: u64,
    objects: ObjectIdAllocator,
    states: HashMap<StateId, State>,
    current: Option<StateId>,
    previous: Option<StateId>,
    pending: Option<PendingTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, behavior: Box<dyn StateBehavior>) -> StateId {
        self.spawn_with_prev(behavior, None)
    }

    pub fn spawn_with_prev(
        &mut self,
        behavior: Box<dyn StateBehavior>,
        prev: Option<StateId>,
    ) -> StateId {
        self.next_state_id = self.next_state_id.saturating_add(1);
        let id = StateId(self.next_state_id);
        debug!(state = behavior.name(), id = id.0, prev = ?prev.map(|p| p.0), "state_spawned");
        self.states.insert(id, State::new(id, behavior, prev));
        id
    }

    pub(crate) fn allocate_object_id(&mut self) -> ObjectId {
        self.objects.allocate()
    }

    pub(crate) fn link_prev(&mut self, layer: StateId, prev: StateId) {
        if let Some(state) = self.states.get_mut(&layer) {
            if state.prev_state().is_none() {
                state.set_prev_state(prev);
            }
        }
    }

    /// Records a transition for the next commit. The last request before a commit wins.
    pub fn set_state(&mut self, target: StateId, options: TransitionOptions) {
        let next = PendingTransition { target, options };
        if let Some(replaced) = self.pending.replace(next) {
            if replaced != next {
                debug!(
                    superseded = replaced.target.0,
                    target = target.0,
                    "state_transition_superseded"
                );
            }
        }
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn current(&self) -> Option<StateId> {
        self.current
    }

    pub fn previous(&self) -> Option<StateId> {
        self.previous
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(&id)
    }

    pub fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(&id)
    }

    pub fn current_state(&self) -> Option<&State> {
        self.current.and_then(|id| self.states.get(&id))
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.states.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Applies the pending transition. Returns the new current state, if one was committed.
    pub fn commit(&mut self, services: &mut Services) -> Result<Option<StateId>, LifecycleError> {
        let Some(PendingTransition { target, options }) = self.pending.take() else {
            return Ok(None);
        };
        if !self.states.contains_key(&target) {
            error!(target = target.0, "state_commit_unknown_target");
            return Err(LifecycleError::UnknownState(target));
        }

        let old = self.current;
        self.previous = old;
        if let Some(old) = old {
            if options.destroy_old && old != target {
                self.with_state(old, services, |state, machine, services| {
                    state.destroy(machine, services)
                });
            }
        }

        self.current = Some(target);
        if options.init_new {
            let initialized = self
                .with_state(target, services, |state, machine, services| {
                    state.init(machine, services)
                })
                .unwrap_or(Err(LifecycleError::UnknownState(target)));
            initialized?;
        }
        info!(
            from = ?old.map(|id| id.0),
            to = target.0,
            init_new = options.init_new,
            destroy_old = options.destroy_old,
            "state_committed"
        );

        self.prune(services);
        Ok(Some(target))
    }

    pub fn update(&mut self, services: &mut Services, delta: f32) {
        let Some(current) = self.current else {
            return;
        };
        self.with_state(current, services, |state, machine, services| {
            state.update(machine, services, delta)
        });
    }

    /// Unpauses `id` and requests a switch back to it. False when it is not paused.
    pub fn restore(&mut self, services: &mut Services, id: StateId) -> bool {
        self.with_state(id, services, |state, machine, services| {
            state.restore(machine, services)
        })
        .unwrap_or(false)
    }

    /// Pauses `state` beneath `layer` from outside any update, e.g. on focus loss.
    pub fn pause(&mut self, services: &mut Services, state: StateId, layer: StateId) -> bool {
        if state == layer || !self.states.contains_key(&layer) {
            return false;
        }
        let paused = self
            .with_state(state, services, |target, machine, services| {
                target.pause_from_outside(machine, services, layer)
            })
            .unwrap_or(false);
        if paused {
            self.link_prev(layer, state);
            self.set_state(layer, TransitionOptions::LAYER);
        }
        paused
    }

    /// Closes `menu`, returning to the state it is layered above.
    pub fn close(&mut self, services: &mut Services, menu: StateId) -> bool {
        let Some(prev) = self.states.get(&menu).and_then(State::prev_state) else {
            return false;
        };
        self.set_state(prev, TransitionOptions::RESUME);
        self.restore(services, prev);
        true
    }

    /// First state of the layering chain that `start` belongs to.
    pub fn chain_root(&self, start: StateId) -> StateId {
        let mut visited = HashSet::from([start]);
        let mut cursor = start;
        while let Some(prev) = self.states.get(&cursor).and_then(State::prev_state) {
            if !self.states.contains_key(&prev) || !visited.insert(prev) {
                break;
            }
            cursor = prev;
        }
        cursor
    }

    pub fn unwind_to_root(&mut self, services: &mut Services, from: StateId) -> Option<StateId> {
        let start = self.states.get(&from)?.prev_state()?;
        let root = self.chain_root(start);
        self.set_state(root, TransitionOptions::RESUME);
        self.restore(services, root);
        Some(root)
    }

    pub fn shutdown(&mut self, services: &mut Services) {
        let mut ids: Vec<StateId> = self.states.keys().copied().collect();
        ids.sort();
        for id in ids.into_iter().rev() {
            self.with_state(id, services, |state, machine, services| {
                state.destroy(machine, services)
            });
        }
        self.states.clear();
        self.current = None;
        self.previous = None;
        self.pending = None;
        info!("state_machine_shutdown");
    }

    /// Takes a state out of the map while `f` runs, so the state can borrow the
    /// machine for transitions and spawning.
    fn with_state<R>(
        &mut self,
        id: StateId,
        services: &mut Services,
        f: impl FnOnce(&mut State, &mut StateMachine, &mut Services) -> R,
    ) -> Option<R> {
        let mut state = self.states.remove(&id)?;
        let result = f(&mut state, self, services);
        self.states.insert(id, state);
        Some(result)
    }

    /// Drops states that nothing can return to: not current, not pending, not
    /// `previous`, and not reachable through a pause or layering link.
    fn prune(&mut self, services: &mut Services) {
        let mut reachable = HashSet::new();
        let mut frontier: Vec<StateId> = self
            .current
            .into_iter()
            .chain(self.pending.map(|pending| pending.target))
            .chain(self.previous)
            .collect();
        while let Some(id) = frontier.pop() {
            if !reachable.insert(id) {
                continue;
            }
            let Some(state) = self.states.get(&id) else {
                continue;
            };
            if state.status() == StateStatus::Destroyed {
                continue;
            }
            frontier.extend(state.prev_state());
            frontier.extend(state.pause_target());
        }

        let pending = self.pending.map(|pending| pending.target);
        let previous = self.previous;
        let mut dropped: Vec<StateId> = self
            .states
            .iter()
            .filter(|(id, state)| match state.status() {
                StateStatus::Created => false,
                StateStatus::Active => !reachable.contains(*id),
                StateStatus::Destroyed => pending != Some(**id) && previous != Some(**id),
            })
            .map(|(id, _)| *id)
            .collect();
        dropped.sort();
        for id in dropped {
            self.with_state(id, services, |state, machine, services| {
                state.destroy(machine, services)
            });
            if let Some(state) = self.states.remove(&id) {
                debug!(state = state.name(), id = id.0, "state_pruned");
            }
        }
        if self
            .previous
            .is_some_and(|previous| !self.states.contains_key(&previous))
        {
            self.previous = None;
        }
    }
}
