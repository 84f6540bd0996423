use std::any::Any;

use tracing::error;

use super::display::{DisplayError, DisplayTree, NodeId};
use super::events::StateEvent;
use super::state::{LifecycleError, Scope, StateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

#[derive(Debug, Default)]
pub(crate) struct ObjectIdAllocator {
    next: u64,
}

impl ObjectIdAllocator {
    pub(crate) fn allocate(&mut self) -> ObjectId {
        self.next = self.next.saturating_add(1);
        ObjectId(self.next)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, not yet handed to a state.
    #[default]
    Detached,
    /// Sitting in a state's pending-add queue.
    Pending,
    Active,
    Destroyed,
}

/// Downcasting support for trait objects stored by the engine.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of game logic owned by one state.
///
/// `init` runs once when the owning state drains its pending-add queue, `update` once
/// per unpaused frame, and `destroy` once when the object is removed or the state is
/// torn down. Owned display nodes are released by the state after `destroy` returns.
pub trait GameObject: AsAny {
    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    fn name(&self) -> &'static str {
        "object"
    }

    /// UI objects update before world objects so their exclusion areas are in place
    /// when world input is read.
    fn is_ui(&self) -> bool {
        false
    }

    fn init(&mut self, _scope: &mut Scope<'_>) {}

    fn update(&mut self, _scope: &mut Scope<'_>, _delta: f32) {}

    fn on_event(&mut self, _scope: &mut Scope<'_>, _event: &StateEvent) {}

    fn destroy(&mut self, _scope: &mut Scope<'_>) {}
}

#[derive(Debug, Default)]
pub struct ObjectCore {
    id: Option<ObjectId>,
    owner: Option<StateId>,
    lifecycle: Lifecycle,
    displays: Vec<NodeId>,
    faulted: bool,
}

impl ObjectCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn owner(&self) -> Option<StateId> {
        self.owner
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn displays(&self) -> &[NodeId] {
        &self.displays
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub(crate) fn mark_faulted(&mut self) {
        self.faulted = true;
    }

    pub(crate) fn bind(&mut self, id: ObjectId, owner: StateId) -> Result<(), LifecycleError> {
        match self.lifecycle {
            Lifecycle::Detached => {
                self.id = Some(id);
                self.owner = Some(owner);
                self.lifecycle = Lifecycle::Pending;
                Ok(())
            }
            Lifecycle::Pending | Lifecycle::Active => Err(LifecycleError::AlreadyAdded(
                self.id.unwrap_or(id),
            )),
            Lifecycle::Destroyed => Err(LifecycleError::Reused(self.id.unwrap_or(id))),
        }
    }

    pub(crate) fn activate(&mut self) -> Result<(), LifecycleError> {
        let id = self.id.ok_or(LifecycleError::Detached)?;
        match self.lifecycle {
            Lifecycle::Pending => {
                self.lifecycle = Lifecycle::Active;
                Ok(())
            }
            Lifecycle::Active => Err(LifecycleError::DoubleInit(id)),
            Lifecycle::Detached => Err(LifecycleError::Detached),
            Lifecycle::Destroyed => Err(LifecycleError::Reused(id)),
        }
    }

    pub(crate) fn retire(&mut self) -> Result<(), LifecycleError> {
        let id = self.id.ok_or(LifecycleError::Detached)?;
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(LifecycleError::DoubleDestroy(id));
        }
        self.lifecycle = Lifecycle::Destroyed;
        self.owner = None;
        Ok(())
    }

    /// Attaches `node` under `parent` and records it as owned by this object.
    pub fn add_display(
        &mut self,
        tree: &mut DisplayTree,
        parent: NodeId,
        node: NodeId,
    ) -> Result<(), LifecycleError> {
        let id = self.id.ok_or(LifecycleError::Detached)?;
        if !tree.contains(node) {
            return Err(LifecycleError::Display(DisplayError::UnknownNode(node)));
        }
        if let Some(owner) = tree.owner(node) {
            if owner != id {
                error!(node = node.0, owner = owner.0, claimant = id.0, "display_already_owned");
                return Err(LifecycleError::DisplayAlreadyOwned { node, owner });
            }
        }
        tree.add_child(parent, node)?;
        tree.set_owner(node, Some(id));
        if !self.displays.contains(&node) {
            self.displays.push(node);
        }
        Ok(())
    }

    /// Detaches and drops an owned node. Returns false when the node is not owned here.
    pub fn remove_display(&mut self, tree: &mut DisplayTree, node: NodeId) -> bool {
        let Some(index) = self.displays.iter().position(|owned| *owned == node) else {
            return false;
        };
        self.displays.remove(index);
        tree.destroy(node);
        true
    }

    pub(crate) fn release_displays(&mut self, tree: &mut DisplayTree) {
        for node in self.displays.drain(..) {
            tree.destroy(node);
        }
    }
}
