//! Single-state host for driving game objects frame by frame in tests.

use std::cell::RefCell;
use std::rc::Rc;

use super::display::{DisplayTree, NodeId};
use super::input::InputEvent;
use super::machine::{StateMachine, TransitionOptions};
use super::object::{GameObject, ObjectId};
use super::state::{Scope, Services, State, StateBehavior, StateId};

pub(crate) const TEST_DELTA: f32 = 1.0 / 60.0;

type Inbox = Rc<RefCell<Vec<Box<dyn GameObject>>>>;

struct HostState {
    inbox: Inbox,
    added: Rc<RefCell<Vec<ObjectId>>>,
}

impl StateBehavior for HostState {
    fn name(&self) -> &'static str {
        "host"
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        let queued: Vec<Box<dyn GameObject>> = self.inbox.borrow_mut().drain(..).collect();
        for object in queued {
            let id = scope.add(object).expect("host add");
            self.added.borrow_mut().push(id);
        }
    }
}

pub(crate) struct Harness {
    pub(crate) machine: StateMachine,
    pub(crate) services: Services,
    pub(crate) host: StateId,
    inbox: Inbox,
    added: Rc<RefCell<Vec<ObjectId>>>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let inbox = Inbox::default();
        let added = Rc::new(RefCell::new(Vec::new()));
        let mut machine = StateMachine::new();
        let mut services = Services::new();
        let host = machine.spawn(Box::new(HostState {
            inbox: Rc::clone(&inbox),
            added: Rc::clone(&added),
        }));
        machine.set_state(host, TransitionOptions::default());
        machine.commit(&mut services).expect("host commit");
        Self {
            machine,
            services,
            host,
            inbox,
            added,
        }
    }

    pub(crate) fn tree_mut(&mut self) -> &mut DisplayTree {
        &mut self.services.display
    }

    pub(crate) fn root(&self) -> NodeId {
        self.machine
            .state(self.host)
            .and_then(State::root)
            .expect("host root")
    }

    /// Queues `object`; it is initialized at the start of the next frame.
    pub(crate) fn add(&mut self, object: Box<dyn GameObject>) -> ObjectId {
        self.inbox.borrow_mut().push(object);
        self.frame(Vec::new());
        self.added.borrow().last().copied().expect("object added")
    }

    pub(crate) fn frame(&mut self, events: Vec<InputEvent>) {
        for event in events {
            self.services.input.push_event(event);
        }
        self.services.input.begin_frame();
        let _ = self.machine.commit(&mut self.services);
        self.machine.update(&mut self.services, TEST_DELTA);
    }

    pub(crate) fn object<T: GameObject>(&self, id: ObjectId) -> &T {
        self.machine
            .state(self.host)
            .and_then(|state| state.object::<T>(id))
            .expect("object present")
    }
}
