use tracing::{debug, error, info};

use super::geometry::{Rect, Vec2};
use super::input::{InputPoller, Key};
use super::machine::TransitionOptions;
use super::state::{LifecycleError, Scope, StateBehavior, StateId};
use super::ui::{layout_stretch, Axis, Button, LayoutSpec, UiCore};

const TAB_SPACING: f32 = 4.0;

/// Hotkey-driven close for menu states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuCore {
    close_keys: Vec<Key>,
}

impl MenuCore {
    pub fn new(close_keys: &[Key]) -> Result<Self, LifecycleError> {
        if close_keys.is_empty() {
            return Err(LifecycleError::MalformedHotkeys(
                "close key list is empty".to_string(),
            ));
        }
        for (index, key) in close_keys.iter().enumerate() {
            if close_keys[..index].contains(key) {
                return Err(LifecycleError::MalformedHotkeys(format!(
                    "close key {key:?} listed twice"
                )));
            }
        }
        Ok(Self {
            close_keys: close_keys.to_vec(),
        })
    }

    /// A menu that only closes programmatically.
    pub fn without_hotkeys() -> Self {
        Self::default()
    }

    pub fn close_keys(&self) -> &[Key] {
        &self.close_keys
    }

    pub fn close_requested(&self, input: &InputPoller) -> bool {
        input.any_key_pressed(&self.close_keys)
    }

    /// Closes the menu when a close key was pressed this frame.
    pub fn update(&self, scope: &mut Scope<'_>) -> bool {
        if !self.close_requested(scope.input()) {
            return false;
        }
        debug!(state = scope.state_id().0, "menu_close_hotkey");
        scope.close();
        true
    }
}

pub type StateFactory = fn() -> Box<dyn StateBehavior>;

#[derive(Clone, Copy)]
pub struct TabSpec {
    pub label: &'static str,
    pub factory: StateFactory,
}

/// Tab bar whose tabs are separate states. Switching tabs replaces the whole
/// menu state with a fresh one layered over the same previous state.
#[derive(Clone)]
pub struct TabMenuCore {
    menu: MenuCore,
    tabs: Vec<TabSpec>,
    active: usize,
    bar: Rect,
}

impl TabMenuCore {
    pub fn new(
        menu: MenuCore,
        tabs: Vec<TabSpec>,
        active: usize,
        bar: Rect,
    ) -> Result<Self, LifecycleError> {
        if active >= tabs.len() {
            return Err(LifecycleError::TabOutOfRange {
                index: active,
                count: tabs.len(),
            });
        }
        Ok(Self {
            menu,
            tabs,
            active,
            bar,
        })
    }

    pub fn menu(&self) -> &MenuCore {
        &self.menu
    }

    pub fn tabs(&self) -> &[TabSpec] {
        &self.tabs
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_label(&self) -> &'static str {
        self.tabs[self.active].label
    }

    pub fn bar(&self) -> Rect {
        self.bar
    }

    /// Builds the tab buttons. The active tab's button is disabled.
    pub fn enter(&self, scope: &mut Scope<'_>) {
        let spec = LayoutSpec {
            axis: Axis::Horizontal,
            padding: 0.0,
            spacing: TAB_SPACING,
        };
        let layout = layout_stretch(
            self.tabs.len(),
            Vec2::new(self.bar.width, self.bar.height),
            spec,
        );
        for (index, (tab, slot)) in self.tabs.iter().zip(layout.slots).enumerate() {
            let position = Vec2::new(self.bar.x + slot.x, self.bar.y + slot.y);
            let ui = UiCore::new(scope.tree_mut(), position, Vec2::new(slot.width, slot.height));
            let factory = tab.factory;
            let label = tab.label;
            let mut button = Button::new(ui, label).on_release(move |scope| {
                open_tab(scope, factory, label);
            });
            button.set_disabled(index == self.active);
            if let Err(error) = scope.add(Box::new(button)) {
                error!(tab = label, error = %error, "tab_button_add_failed");
            }
        }
    }

    /// Handles close keys and number-key tab shortcuts.
    pub fn update(&self, scope: &mut Scope<'_>) -> bool {
        if self.menu.update(scope) {
            return true;
        }
        let pressed = (0..self.tabs.len().min(9)).find(|index| {
            let digit = char::from_digit(*index as u32 + 1, 10).unwrap_or('0');
            scope.input().was_key_pressed(Key::Character(digit))
        });
        match pressed {
            Some(index) => matches!(self.switch_tab(scope, index), Ok(Some(_))),
            None => false,
        }
    }

    /// Spawns the tab's state and requests a full transition to it.
    pub fn switch_tab(
        &self,
        scope: &mut Scope<'_>,
        index: usize,
    ) -> Result<Option<StateId>, LifecycleError> {
        let Some(tab) = self.tabs.get(index) else {
            return Err(LifecycleError::TabOutOfRange {
                index,
                count: self.tabs.len(),
            });
        };
        if index == self.active {
            return Ok(None);
        }
        Ok(Some(open_tab(scope, tab.factory, tab.label)))
    }
}

fn open_tab(scope: &mut Scope<'_>, factory: StateFactory, label: &'static str) -> StateId {
    let id = scope.spawn_sibling(factory());
    scope.set_state(id, TransitionOptions::default());
    info!(tab = label, state = id.0, "tab_opened");
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::InputEvent;
    use crate::app::machine::StateMachine;
    use crate::app::state::{Services, State, StateStatus};

    #[test]
    fn hotkeys_must_be_present_and_unique() {
        assert!(matches!(
            MenuCore::new(&[]),
            Err(LifecycleError::MalformedHotkeys(_))
        ));
        assert!(matches!(
            MenuCore::new(&[Key::Escape, Key::Character('p'), Key::Escape]),
            Err(LifecycleError::MalformedHotkeys(_))
        ));
        let menu = MenuCore::new(&[Key::Escape, Key::Character('p')]).expect("valid keys");
        assert_eq!(menu.close_keys().len(), 2);
        assert!(MenuCore::without_hotkeys().close_keys().is_empty());
    }

    #[test]
    fn active_tab_must_exist() {
        let result = TabMenuCore::new(
            MenuCore::without_hotkeys(),
            Vec::new(),
            0,
            Rect::new(0.0, 0.0, 10.0, 10.0),
        );
        assert_eq!(
            result.err(),
            Some(LifecycleError::TabOutOfRange { index: 0, count: 0 })
        );
    }

    struct Tab {
        core: TabMenuCore,
    }

    fn first_tab() -> Box<dyn StateBehavior> {
        Box::new(Tab::at(0))
    }

    fn second_tab() -> Box<dyn StateBehavior> {
        Box::new(Tab::at(1))
    }

    fn tabs() -> Vec<TabSpec> {
        vec![
            TabSpec {
                label: "one",
                factory: first_tab,
            },
            TabSpec {
                label: "two",
                factory: second_tab,
            },
        ]
    }

    impl Tab {
        fn at(active: usize) -> Self {
            let menu = MenuCore::new(&[Key::Escape]).expect("keys");
            Self {
                core: TabMenuCore::new(menu, tabs(), active, Rect::new(0.0, 0.0, 200.0, 20.0))
                    .expect("tabs"),
            }
        }
    }

    impl StateBehavior for Tab {
        fn name(&self) -> &'static str {
            self.core.active_label()
        }

        fn enter(&mut self, scope: &mut Scope<'_>) {
            self.core.enter(scope);
        }

        fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
            self.core.update(scope);
        }
    }

    struct Idle;

    impl StateBehavior for Idle {
        fn name(&self) -> &'static str {
            "idle"
        }
    }

    fn frame(machine: &mut StateMachine, services: &mut Services, events: Vec<InputEvent>) {
        for event in events {
            services.input.push_event(event);
        }
        services.input.begin_frame();
        machine.commit(services).expect("commit");
        machine.update(services, 0.016);
    }

    #[test]
    fn number_key_switches_to_fresh_sibling_state() {
        let mut services = Services::new();
        let mut machine = StateMachine::new();
        let below = machine.spawn(Box::new(Idle));
        machine.set_state(below, TransitionOptions::default());
        frame(&mut machine, &mut services, Vec::new());

        let first = machine.spawn_with_prev(Box::new(Tab::at(0)), Some(below));
        assert!(machine.pause(&mut services, below, first));
        frame(&mut machine, &mut services, Vec::new());
        assert_eq!(machine.current(), Some(first));
        assert_eq!(machine.current_state().map(State::object_count), Some(2));

        frame(
            &mut machine,
            &mut services,
            vec![InputEvent::KeyPressed(Key::Character('2'))],
        );
        frame(&mut machine, &mut services, Vec::new());
        let second = machine.current().expect("current");
        assert_ne!(second, first);
        assert_eq!(machine.previous(), Some(first));
        assert_eq!(
            machine.state(first).map(State::status),
            Some(StateStatus::Destroyed)
        );
        let state = machine.state(second).expect("second tab");
        assert_eq!(state.name(), "two");
        assert_eq!(state.prev_state(), Some(below));

        frame(
            &mut machine,
            &mut services,
            vec![
                InputEvent::KeyReleased(Key::Character('2')),
                InputEvent::KeyPressed(Key::Escape),
            ],
        );
        frame(&mut machine, &mut services, Vec::new());
        assert_eq!(machine.current(), Some(below));
        assert!(!machine.state(below).expect("below").is_paused());
    }

    #[test]
    fn pressing_the_active_tab_key_is_ignored() {
        let mut services = Services::new();
        let mut machine = StateMachine::new();
        let only = machine.spawn(Box::new(Tab::at(0)));
        machine.set_state(only, TransitionOptions::default());
        frame(&mut machine, &mut services, Vec::new());
        frame(
            &mut machine,
            &mut services,
            vec![InputEvent::KeyPressed(Key::Character('1'))],
        );
        frame(&mut machine, &mut services, Vec::new());
        assert_eq!(machine.current(), Some(only));
    }
}
