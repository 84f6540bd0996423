use std::collections::VecDeque;

use super::object::ObjectId;

#[derive(Debug, Clone, PartialEq)]
pub struct StateEvent {
    pub name: &'static str,
    pub amount: f64,
    pub source: Option<ObjectId>,
}

impl StateEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            amount: 0.0,
            source: None,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_source(mut self, source: ObjectId) -> Self {
        self.source = Some(source);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type EventCallback = Box<dyn FnMut(&StateEvent)>;

enum ListenerTarget {
    Object(ObjectId),
    Callback(EventCallback),
}

struct Listener {
    id: ListenerId,
    name: &'static str,
    target: ListenerTarget,
}

/// Per-state listener table. Emitted events are queued and delivered by the owning
/// state between object updates, so no listener runs while another object is borrowed.
#[derive(Default)]
pub struct EventEmitter {
    next_id: u64,
    listeners: Vec<Listener>,
    queued: VecDeque<StateEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: StateEvent) {
        self.queued.push_back(event);
    }

    pub fn subscribe(&mut self, name: &'static str, object: ObjectId) -> ListenerId {
        self.push_listener(name, ListenerTarget::Object(object))
    }

    pub fn on(
        &mut self,
        name: &'static str,
        callback: impl FnMut(&StateEvent) + 'static,
    ) -> ListenerId {
        self.push_listener(name, ListenerTarget::Callback(Box::new(callback)))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        self.listeners.len() != before
    }

    pub fn unsubscribe_object(&mut self, object: ObjectId) {
        self.listeners
            .retain(|listener| !matches!(listener.target, ListenerTarget::Object(id) if id == object));
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners
            .iter()
            .filter(|listener| listener.name == name)
            .count()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
        self.queued.clear();
    }

    pub(crate) fn clear_queue(&mut self) {
        self.queued.clear();
    }

    pub(crate) fn take_queued(&mut self) -> Option<StateEvent> {
        self.queued.pop_front()
    }

    /// Runs callback listeners for `event` and returns the objects subscribed to it.
    pub(crate) fn deliver_callbacks(&mut self, event: &StateEvent) -> Vec<ObjectId> {
        let mut objects = Vec::new();
        for listener in self
            .listeners
            .iter_mut()
            .filter(|listener| listener.name == event.name)
        {
            match &mut listener.target {
                ListenerTarget::Object(id) => objects.push(*id),
                ListenerTarget::Callback(callback) => callback(event),
            }
        }
        objects
    }

    fn push_listener(&mut self, name: &'static str, target: ListenerTarget) -> ListenerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = ListenerId(self.next_id);
        self.listeners.push(Listener { id, name, target });
        id
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn callbacks_receive_matching_events_only() {
        let mut emitter = EventEmitter::new();
        let total = Rc::new(Cell::new(0.0));
        let sink = Rc::clone(&total);
        emitter.on("pop", move |event| sink.set(sink.get() + event.amount));

        emitter.emit(StateEvent::new("pop").with_amount(2.0));
        emitter.emit(StateEvent::new("other").with_amount(5.0));
        while let Some(event) = emitter.take_queued() {
            emitter.deliver_callbacks(&event);
        }
        assert_eq!(total.get(), 2.0);
    }

    #[test]
    fn object_subscribers_are_returned_in_order() {
        let mut emitter = EventEmitter::new();
        emitter.subscribe("pop", ObjectId(3));
        emitter.subscribe("pop", ObjectId(1));
        emitter.subscribe("tick", ObjectId(2));
        let objects = emitter.deliver_callbacks(&StateEvent::new("pop"));
        assert_eq!(objects, vec![ObjectId(3), ObjectId(1)]);
    }

    #[test]
    fn off_and_unsubscribe_remove_listeners() {
        let mut emitter = EventEmitter::new();
        let listener = emitter.on("pop", |_| {});
        emitter.subscribe("pop", ObjectId(9));
        assert_eq!(emitter.listener_count("pop"), 2);

        assert!(emitter.off(listener));
        assert!(!emitter.off(listener));
        emitter.unsubscribe_object(ObjectId(9));
        assert_eq!(emitter.listener_count("pop"), 0);
    }
}
