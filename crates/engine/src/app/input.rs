use std::collections::HashSet;

use super::geometry::{Rect, Vec2};
use super::object::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Space,
    Tab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    /// Letters are stored lowercase.
    Character(char),
}

impl Key {
    pub fn character(ch: char) -> Self {
        Key::Character(ch.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// Platform events, buffered between frames and folded in by [`InputPoller::begin_frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyPressed(Key),
    KeyReleased(Key),
    ButtonPressed(PointerButton),
    ButtonReleased(PointerButton),
    PointerMoved(Vec2),
    PointerLeft,
    Wheel(f32),
    Text(String),
    Focus(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusionArea {
    pub owner: ObjectId,
    pub rect: Rect,
}

/// Per-frame keyboard and pointer snapshot.
///
/// World-facing pointer queries (`pointer_pressed`, `pointer_down`, `pointer_released`)
/// report nothing while the pointer sits inside a registered exclusion area, unless
/// enforcement is suspended for UI input handling.
#[derive(Debug)]
pub struct InputPoller {
    buffered: Vec<InputEvent>,
    keys_down: HashSet<Key>,
    keys_pressed: HashSet<Key>,
    keys_released: HashSet<Key>,
    buttons_down: HashSet<PointerButton>,
    buttons_pressed: HashSet<PointerButton>,
    buttons_released: HashSet<PointerButton>,
    pointer: Option<Vec2>,
    previous_pointer: Option<Vec2>,
    pointer_delta: Vec2,
    wheel: f32,
    typed: String,
    focused: bool,
    focus_lost: bool,
    exclusion_areas: Vec<ExclusionArea>,
    exclusion_suspended: bool,
}

impl Default for InputPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl InputPoller {
    pub fn new() -> Self {
        Self {
            buffered: Vec::new(),
            keys_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            keys_released: HashSet::new(),
            buttons_down: HashSet::new(),
            buttons_pressed: HashSet::new(),
            buttons_released: HashSet::new(),
            pointer: None,
            previous_pointer: None,
            pointer_delta: Vec2::ZERO,
            wheel: 0.0,
            typed: String::new(),
            focused: true,
            focus_lost: false,
            exclusion_areas: Vec::new(),
            exclusion_suspended: false,
        }
    }

    pub fn push_event(&mut self, event: InputEvent) {
        self.buffered.push(event);
    }

    /// Clears last frame's edges and exclusion areas, then applies buffered events.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.typed.clear();
        self.wheel = 0.0;
        self.focus_lost = false;
        self.exclusion_areas.clear();
        self.exclusion_suspended = false;
        self.previous_pointer = self.pointer;

        let buffered = std::mem::take(&mut self.buffered);
        for event in buffered {
            self.apply(event);
        }

        self.pointer_delta = match (self.previous_pointer, self.pointer) {
            (Some(previous), Some(current)) => current - previous,
            _ => Vec2::ZERO,
        };
    }

    fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyPressed(key) => {
                if self.keys_down.insert(key) {
                    self.keys_pressed.insert(key);
                }
            }
            InputEvent::KeyReleased(key) => {
                if self.keys_down.remove(&key) {
                    self.keys_released.insert(key);
                }
            }
            InputEvent::ButtonPressed(button) => {
                if self.buttons_down.insert(button) {
                    self.buttons_pressed.insert(button);
                }
            }
            InputEvent::ButtonReleased(button) => {
                if self.buttons_down.remove(&button) {
                    self.buttons_released.insert(button);
                }
            }
            InputEvent::PointerMoved(position) => self.pointer = Some(position),
            InputEvent::PointerLeft => self.pointer = None,
            InputEvent::Wheel(amount) => self.wheel += amount,
            InputEvent::Text(text) => self.typed.extend(text.chars().filter(|ch| !ch.is_control())),
            InputEvent::Focus(focused) => {
                if self.focused && !focused {
                    self.focus_lost = true;
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
                self.focused = focused;
            }
        }
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn was_key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn was_key_released(&self, key: Key) -> bool {
        self.keys_released.contains(&key)
    }

    pub fn any_key_pressed(&self, keys: &[Key]) -> bool {
        keys.iter().any(|key| self.was_key_pressed(*key))
    }

    pub fn is_button_down(&self, button: PointerButton) -> bool {
        self.buttons_down.contains(&button)
    }

    pub fn was_button_pressed(&self, button: PointerButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    pub fn was_button_released(&self, button: PointerButton) -> bool {
        self.buttons_released.contains(&button)
    }

    pub fn pointer_position(&self) -> Option<Vec2> {
        self.pointer
    }

    pub fn pointer(&self) -> Vec2 {
        self.pointer.unwrap_or(Vec2::ZERO)
    }

    pub fn pointer_delta(&self) -> Vec2 {
        self.pointer_delta
    }

    pub fn wheel_delta(&self) -> f32 {
        self.wheel
    }

    pub fn typed_text(&self) -> &str {
        &self.typed
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus_lost(&self) -> bool {
        self.focus_lost
    }

    pub fn point_in_rect(&self, rect: &Rect) -> bool {
        self.pointer.is_some_and(|pointer| rect.contains(pointer))
    }

    pub fn register_exclusion(&mut self, owner: ObjectId, rect: Rect) {
        self.exclusion_areas.push(ExclusionArea { owner, rect });
    }

    pub fn exclusion_areas(&self) -> &[ExclusionArea] {
        &self.exclusion_areas
    }

    pub fn pointer_over_ui(&self) -> bool {
        let Some(pointer) = self.pointer else {
            return false;
        };
        self.exclusion_areas
            .iter()
            .any(|area| area.rect.contains(pointer))
    }

    pub fn suspend_exclusion(&mut self) {
        self.exclusion_suspended = true;
    }

    pub fn resume_exclusion(&mut self) {
        self.exclusion_suspended = false;
    }

    pub fn with_exclusion_suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_suspended = self.exclusion_suspended;
        self.exclusion_suspended = true;
        let result = f(self);
        self.exclusion_suspended = was_suspended;
        result
    }

    pub fn world_input_blocked(&self) -> bool {
        !self.exclusion_suspended && self.pointer_over_ui()
    }

    pub fn pointer_pressed(&self, button: PointerButton) -> bool {
        !self.world_input_blocked() && self.was_button_pressed(button)
    }

    pub fn pointer_down(&self, button: PointerButton) -> bool {
        !self.world_input_blocked() && self.is_button_down(button)
    }

    pub fn pointer_released(&self, button: PointerButton) -> bool {
        !self.world_input_blocked() && self.was_button_released(button)
    }
}
