use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::display::{DisplayError, DisplayTree, NodeId};
use super::events::{EventEmitter, ListenerId, StateEvent};
use super::input::InputPoller;
use super::machine::{StateMachine, TransitionOptions};
use super::object::{AsAny, GameObject, ObjectId};
use super::resources::Resources;

const MAX_EVENTS_PER_FLUSH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
    Crosshair,
    Hidden,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateStatus {
    #[default]
    Created,
    Active,
    Destroyed,
}

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("object {0:?} was initialized twice")]
    DoubleInit(ObjectId),
    #[error("object {0:?} was destroyed twice")]
    DoubleDestroy(ObjectId),
    #[error("object {0:?} is already queued or active in a state")]
    AlreadyAdded(ObjectId),
    #[error("object {0:?} was destroyed and cannot be added again")]
    Reused(ObjectId),
    #[error("object is not attached to a state")]
    Detached,
    #[error("object {object:?} is neither active nor pending in state {state:?}")]
    UnknownObject { object: ObjectId, state: StateId },
    #[error("display node {node:?} is already owned by object {owner:?}")]
    DisplayAlreadyOwned { node: NodeId, owner: ObjectId },
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error("state {0:?} is already initialized")]
    StateAlreadyInitialized(StateId),
    #[error("state {0:?} does not exist")]
    UnknownState(StateId),
    #[error("malformed hotkey table: {0}")]
    MalformedHotkeys(String),
    #[error("tab index {index} is out of range for {count} tabs")]
    TabOutOfRange { index: usize, count: usize },
}

/// Engine-owned services every state and object reaches through its [`Scope`].
#[derive(Default)]
pub struct Services {
    pub display: DisplayTree,
    pub input: InputPoller,
    pub resources: Resources,
    pub cursor: Cursor,
    exit_requested: bool,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }
}

/// Screen-specific behaviour plugged into a [`State`].
pub trait StateBehavior: AsAny {
    fn name(&self) -> &'static str;

    fn cursor(&self) -> Cursor {
        Cursor::Default
    }

    /// Runs from `State::init`, after the root container is on the stage.
    fn enter(&mut self, _scope: &mut Scope<'_>) {}

    /// Runs before the state's objects update.
    fn update(&mut self, _scope: &mut Scope<'_>, _delta: f32) {}

    /// Runs from `State::destroy`, before the objects are destroyed.
    fn exit(&mut self, _scope: &mut Scope<'_>) {}

    fn on_pause(&mut self, _scope: &mut Scope<'_>) {}

    fn on_restore(&mut self, _scope: &mut Scope<'_>) {}
}

#[derive(Default)]
pub(crate) struct StateLocals {
    pending_add: Vec<Box<dyn GameObject>>,
    pending_remove: Vec<ObjectId>,
    members: HashSet<ObjectId>,
    events: EventEmitter,
    pause_request: Option<StateId>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScopeIds {
    state: StateId,
    root: NodeId,
    prev_state: Option<StateId>,
}

/// Context handed to state behaviours and game objects while they run.
pub struct Scope<'a> {
    ids: ScopeIds,
    services: &'a mut Services,
    machine: &'a mut StateMachine,
    locals: &'a mut StateLocals,
}

impl<'a> Scope<'a> {
    fn new(
        ids: ScopeIds,
        services: &'a mut Services,
        machine: &'a mut StateMachine,
        locals: &'a mut StateLocals,
    ) -> Self {
        Self {
            ids,
            services,
            machine,
            locals,
        }
    }

    pub fn state_id(&self) -> StateId {
        self.ids.state
    }

    /// The state's root container on the stage.
    pub fn root(&self) -> NodeId {
        self.ids.root
    }

    pub fn prev_state(&self) -> Option<StateId> {
        self.ids.prev_state
    }

    pub fn services(&mut self) -> &mut Services {
        self.services
    }

    pub fn tree(&self) -> &DisplayTree {
        &self.services.display
    }

    pub fn tree_mut(&mut self) -> &mut DisplayTree {
        &mut self.services.display
    }

    pub fn input(&self) -> &InputPoller {
        &self.services.input
    }

    pub fn input_mut(&mut self) -> &mut InputPoller {
        &mut self.services.input
    }

    pub fn resources(&self) -> &Resources {
        &self.services.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.services.resources
    }

    pub fn resource<T: 'static>(&self) -> Option<&T> {
        self.services.resources.get::<T>()
    }

    pub fn resource_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.services.resources.get_mut::<T>()
    }

    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.services.cursor = cursor;
    }

    pub fn request_exit(&mut self) {
        self.services.request_exit();
    }

    pub fn machine(&self) -> &StateMachine {
        self.machine
    }

    /// Queues `object` for the next drain of this state's pending-add queue.
    pub fn add(&mut self, mut object: Box<dyn GameObject>) -> Result<ObjectId, LifecycleError> {
        let id = self.machine.allocate_object_id();
        if let Err(error) = object.core_mut().bind(id, self.ids.state) {
            error!(
                state = self.ids.state.0,
                object = object.name(),
                error = %error,
                "object_add_rejected"
            );
            return Err(error);
        }
        self.locals.pending_add.push(object);
        Ok(id)
    }

    /// Queues an active or pending object for removal at the next drain.
    pub fn remove(&mut self, object: ObjectId) -> Result<(), LifecycleError> {
        let known = self.locals.members.contains(&object)
            || self
                .locals
                .pending_add
                .iter()
                .any(|pending| pending.core().id() == Some(object));
        if !known {
            error!(
                state = self.ids.state.0,
                object = object.0,
                "object_remove_unknown"
            );
            return Err(LifecycleError::UnknownObject {
                object,
                state: self.ids.state,
            });
        }
        if !self.locals.pending_remove.contains(&object) {
            self.locals.pending_remove.push(object);
        }
        Ok(())
    }

    pub fn emit(&mut self, event: StateEvent) {
        self.locals.events.emit(event);
    }

    pub fn subscribe(&mut self, name: &'static str, object: ObjectId) -> ListenerId {
        self.locals.events.subscribe(name, object)
    }

    pub fn on(
        &mut self,
        name: &'static str,
        callback: impl FnMut(&StateEvent) + 'static,
    ) -> ListenerId {
        self.locals.events.on(name, callback)
    }

    pub fn off(&mut self, listener: ListenerId) -> bool {
        self.locals.events.off(listener)
    }

    /// Registers a top-level state that is not layered above anything.
    pub fn spawn_state(&mut self, behavior: Box<dyn StateBehavior>) -> StateId {
        self.machine.spawn_with_prev(behavior, None)
    }

    /// Registers a state layered above this one.
    pub fn spawn_layer(&mut self, behavior: Box<dyn StateBehavior>) -> StateId {
        self.machine.spawn_with_prev(behavior, Some(self.ids.state))
    }

    /// Registers a state layered above whatever this state is layered above.
    pub fn spawn_sibling(&mut self, behavior: Box<dyn StateBehavior>) -> StateId {
        self.machine.spawn_with_prev(behavior, self.ids.prev_state)
    }

    pub fn set_state(&mut self, target: StateId, options: TransitionOptions) {
        self.machine.set_state(target, options);
    }

    /// Pauses this state beneath `layer`. The pause takes effect once the calling
    /// update returns; the switch commits at the next frame boundary.
    pub fn pause(&mut self, layer: StateId) {
        if layer == self.ids.state {
            warn!(state = self.ids.state.0, "state_pause_self_refused");
            return;
        }
        self.machine.link_prev(layer, self.ids.state);
        self.machine.set_state(layer, TransitionOptions::LAYER);
        self.locals.pause_request = Some(layer);
    }

    pub fn pause_with(&mut self, behavior: Box<dyn StateBehavior>) -> StateId {
        let layer = self.spawn_layer(behavior);
        self.pause(layer);
        layer
    }

    /// Restores a paused state. A state that is not paused is left alone.
    pub fn restore(&mut self, target: StateId) -> bool {
        if target == self.ids.state {
            return false;
        }
        self.machine.restore(self.services, target)
    }

    /// Returns to the state this one is layered above, without re-initializing it.
    pub fn close(&mut self) {
        let Some(prev) = self.ids.prev_state else {
            debug!(state = self.ids.state.0, "state_close_without_prev");
            return;
        };
        self.machine.set_state(prev, TransitionOptions::RESUME);
        self.machine.restore(self.services, prev);
    }

    /// Follows the layering chain to its first state and restores that one.
    pub fn unwind_to_root(&mut self) -> Option<StateId> {
        let start = self.ids.prev_state?;
        let root = self.machine.chain_root(start);
        self.machine.set_state(root, TransitionOptions::RESUME);
        self.machine.restore(self.services, root);
        Some(root)
    }
}

/// One screen: an object pool, a root container and the behaviour driving them.
pub struct State {
    id: StateId,
    behavior: Box<dyn StateBehavior>,
    status: StateStatus,
    root: Option<NodeId>,
    active: Vec<Box<dyn GameObject>>,
    locals: StateLocals,
    paused: bool,
    pause_target: Option<StateId>,
    prev_state: Option<StateId>,
}

impl State {
    pub(crate) fn new(
        id: StateId,
        behavior: Box<dyn StateBehavior>,
        prev_state: Option<StateId>,
    ) -> Self {
        Self {
            id,
            behavior,
            status: StateStatus::Created,
            root: None,
            active: Vec::new(),
            locals: StateLocals::default(),
            paused: false,
            pause_target: None,
            prev_state,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.behavior.name()
    }

    pub fn status(&self) -> StateStatus {
        self.status
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_target(&self) -> Option<StateId> {
        self.pause_target
    }

    pub fn prev_state(&self) -> Option<StateId> {
        self.prev_state
    }

    pub(crate) fn set_prev_state(&mut self, prev: StateId) {
        self.prev_state = Some(prev);
    }

    pub fn object_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_add_count(&self) -> usize {
        self.locals.pending_add.len()
    }

    pub fn pending_remove_count(&self) -> usize {
        self.locals.pending_remove.len()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.active
            .iter()
            .filter_map(|object| object.core().id())
            .collect()
    }

    pub fn object<T: GameObject>(&self, id: ObjectId) -> Option<&T> {
        self.active
            .iter()
            .find(|object| object.core().id() == Some(id))
            .and_then(|object| {
                let object: &dyn GameObject = &**object;
                object.as_any().downcast_ref::<T>()
            })
    }

    pub fn objects_of<T: GameObject>(&self) -> impl Iterator<Item = &T> {
        self.active.iter().filter_map(|object| {
            let object: &dyn GameObject = &**object;
            object.as_any().downcast_ref::<T>()
        })
    }

    pub fn behavior<T: StateBehavior>(&self) -> Option<&T> {
        let behavior: &dyn StateBehavior = &*self.behavior;
        behavior.as_any().downcast_ref::<T>()
    }

    pub fn behavior_mut<T: StateBehavior>(&mut self) -> Option<&mut T> {
        let behavior: &mut dyn StateBehavior = &mut *self.behavior;
        behavior.as_any_mut().downcast_mut::<T>()
    }

    pub fn events_mut(&mut self) -> &mut EventEmitter {
        &mut self.locals.events
    }

    fn scope_ids(&self) -> Option<ScopeIds> {
        self.root.map(|root| ScopeIds {
            state: self.id,
            root,
            prev_state: self.prev_state,
        })
    }

    pub(crate) fn init(
        &mut self,
        machine: &mut StateMachine,
        services: &mut Services,
    ) -> Result<(), LifecycleError> {
        if self.status == StateStatus::Active {
            error!(state = self.name(), id = self.id.0, "state_double_init");
            return Err(LifecycleError::StateAlreadyInitialized(self.id));
        }

        let root = services.display.create_container();
        let stage = services.display.stage();
        services.display.add_child(stage, root)?;
        self.root = Some(root);
        self.status = StateStatus::Active;
        self.paused = false;
        self.pause_target = None;
        services.cursor = self.behavior.cursor();

        let ids = ScopeIds {
            state: self.id,
            root,
            prev_state: self.prev_state,
        };
        {
            let mut scope = Scope::new(ids, services, machine, &mut self.locals);
            self.behavior.enter(&mut scope);
        }
        self.apply_pause_request(machine, services, ids);
        info!(state = self.name(), id = self.id.0, "state_initialized");
        Ok(())
    }

    pub(crate) fn destroy(&mut self, machine: &mut StateMachine, services: &mut Services) {
        if self.status != StateStatus::Active {
            debug!(state = self.name(), id = self.id.0, status = ?self.status, "state_destroy_skipped");
            return;
        }

        if let Some(ids) = self.scope_ids() {
            {
                let mut scope = Scope::new(ids, services, machine, &mut self.locals);
                self.behavior.exit(&mut scope);
            }
            let objects = std::mem::take(&mut self.active);
            for object in objects {
                destroy_object(object, ids, machine, services, &mut self.locals);
            }
        }

        let discarded = self.locals.pending_add.len();
        for mut object in self.locals.pending_add.drain(..) {
            // Never initialized, so nothing to tear down beyond the lifecycle flag.
            let _ = object.core_mut().retire();
        }
        self.locals.pending_remove.clear();
        self.locals.members.clear();
        self.locals.events.clear();
        self.locals.pause_request = None;

        if let Some(root) = self.root.take() {
            services.display.destroy(root);
        }
        self.status = StateStatus::Destroyed;
        self.paused = false;
        self.pause_target = None;
        info!(
            state = self.name(),
            id = self.id.0,
            discarded_pending = discarded,
            "state_destroyed"
        );
    }

    pub(crate) fn update(
        &mut self,
        machine: &mut StateMachine,
        services: &mut Services,
        delta: f32,
    ) {
        if self.paused || self.status != StateStatus::Active {
            return;
        }
        let Some(ids) = self.scope_ids() else {
            return;
        };

        self.drain_adds(machine, services, ids);
        self.drain_removes(machine, services, ids);

        {
            let mut scope = Scope::new(ids, services, machine, &mut self.locals);
            self.behavior.update(&mut scope, delta);
        }
        self.apply_pause_request(machine, services, ids);
        self.flush_events(machine, services, ids);
        if self.paused {
            return;
        }

        for index in self.update_order() {
            let Some(object) = self.active.get_mut(index) else {
                continue;
            };
            if object.core().is_faulted() {
                continue;
            }
            let outcome = {
                let mut scope = Scope::new(ids, services, machine, &mut self.locals);
                panic::catch_unwind(AssertUnwindSafe(|| object.update(&mut scope, delta)))
            };
            if outcome.is_err() {
                error!(
                    state = self.behavior.name(),
                    object = object.name(),
                    id = object.core().id().map(|id| id.0),
                    "object_update_panicked"
                );
                object.core_mut().mark_faulted();
            }
            self.apply_pause_request(machine, services, ids);
            self.flush_events(machine, services, ids);
            if self.paused {
                break;
            }
        }
    }

    fn update_order(&self) -> Vec<usize> {
        let ui = self
            .active
            .iter()
            .enumerate()
            .filter(|(_, object)| object.is_ui())
            .map(|(index, _)| index);
        let world = self
            .active
            .iter()
            .enumerate()
            .filter(|(_, object)| !object.is_ui())
            .map(|(index, _)| index);
        ui.chain(world).collect()
    }

    fn drain_adds(&mut self, machine: &mut StateMachine, services: &mut Services, ids: ScopeIds) {
        let pending = std::mem::take(&mut self.locals.pending_add);
        if pending.is_empty() {
            return;
        }

        for mut object in pending {
            let Some(id) = object.core().id() else {
                continue;
            };
            if let Err(error) = object.core_mut().activate() {
                error!(state = self.behavior.name(), object = object.name(), error = %error, "object_init_rejected");
                continue;
            }
            self.locals.members.insert(id);
            let outcome = {
                let mut scope = Scope::new(ids, services, machine, &mut self.locals);
                panic::catch_unwind(AssertUnwindSafe(|| object.init(&mut scope)))
            };
            if outcome.is_err() {
                error!(
                    state = self.behavior.name(),
                    object = object.name(),
                    id = id.0,
                    "object_init_panicked"
                );
                object.core_mut().mark_faulted();
            }
            self.active.push(object);
        }
        services.display.mark_dirty();
    }

    fn drain_removes(
        &mut self,
        machine: &mut StateMachine,
        services: &mut Services,
        ids: ScopeIds,
    ) {
        let pending = std::mem::take(&mut self.locals.pending_remove);
        for id in pending {
            let Some(index) = self
                .active
                .iter()
                .position(|object| object.core().id() == Some(id))
            else {
                debug!(state = self.behavior.name(), object = id.0, "object_remove_already_gone");
                continue;
            };
            let object = self.active.remove(index);
            destroy_object(object, ids, machine, services, &mut self.locals);
        }
    }

    fn flush_events(&mut self, machine: &mut StateMachine, services: &mut Services, ids: ScopeIds) {
        let mut delivered = 0usize;
        while let Some(event) = self.locals.events.take_queued() {
            delivered += 1;
            if delivered > MAX_EVENTS_PER_FLUSH {
                warn!(
                    state = self.behavior.name(),
                    dropped = self.locals.events.queued_len() + 1,
                    "state_event_flood_dropped"
                );
                self.locals.events.clear_queue();
                break;
            }

            let subscribers = self.locals.events.deliver_callbacks(&event);
            for subscriber in subscribers {
                let Some(object) = self
                    .active
                    .iter_mut()
                    .find(|object| object.core().id() == Some(subscriber))
                else {
                    continue;
                };
                if object.core().is_faulted() {
                    continue;
                }
                let mut scope = Scope::new(ids, services, machine, &mut self.locals);
                object.on_event(&mut scope, &event);
            }
        }
    }

    fn apply_pause_request(
        &mut self,
        machine: &mut StateMachine,
        services: &mut Services,
        ids: ScopeIds,
    ) {
        let Some(layer) = self.locals.pause_request.take() else {
            return;
        };
        self.paused = true;
        self.pause_target = Some(layer);
        {
            let mut scope = Scope::new(ids, services, machine, &mut self.locals);
            self.behavior.on_pause(&mut scope);
        }
        info!(
            state = self.behavior.name(),
            id = self.id.0,
            layer = layer.0,
            "state_paused"
        );
    }

    /// Pause requested from outside the state's own update.
    pub(crate) fn pause_from_outside(
        &mut self,
        machine: &mut StateMachine,
        services: &mut Services,
        layer: StateId,
    ) -> bool {
        let Some(ids) = self.scope_ids() else {
            return false;
        };
        if self.status != StateStatus::Active {
            return false;
        }
        self.locals.pause_request = Some(layer);
        self.apply_pause_request(machine, services, ids);
        true
    }

    pub(crate) fn restore(&mut self, machine: &mut StateMachine, services: &mut Services) -> bool {
        if !self.paused {
            return false;
        }
        let Some(ids) = self.scope_ids() else {
            return false;
        };

        machine.set_state(self.id, TransitionOptions::RESUME);
        self.paused = false;
        self.pause_target = None;
        services.cursor = self.behavior.cursor();
        {
            let mut scope = Scope::new(ids, services, machine, &mut self.locals);
            self.behavior.on_restore(&mut scope);
        }
        info!(state = self.behavior.name(), id = self.id.0, "state_restored");
        true
    }
}

fn destroy_object(
    mut object: Box<dyn GameObject>,
    ids: ScopeIds,
    machine: &mut StateMachine,
    services: &mut Services,
    locals: &mut StateLocals,
) {
    if let Some(id) = object.core().id() {
        locals.members.remove(&id);
        locals.events.unsubscribe_object(id);
    }
    {
        let mut scope = Scope::new(ids, services, machine, locals);
        object.destroy(&mut scope);
    }
    object.core_mut().release_displays(&mut services.display);
    if let Err(error) = object.core_mut().retire() {
        error!(object = object.name(), error = %error, "object_destroy_rejected");
    }
}
