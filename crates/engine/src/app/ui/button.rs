use tracing::error;

use super::{PointerSnapshot, UiCallback, UiCore};
use crate::app::display::{NodeId, Shape, GLYPH_ADVANCE_UNITS, GLYPH_HEIGHT_UNITS};
use crate::app::geometry::{Rect, Rgba, Vec2};
use crate::app::object::{GameObject, ObjectCore};
use crate::app::state::Scope;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonStatus {
    #[default]
    Up,
    Hover,
    Down,
    /// Pressed, then the pointer left the button. Releasing still fires.
    UpActive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSignals {
    pub initial_click: bool,
    pub release: bool,
}

/// One frame of the button status machine.
pub fn step_button(
    status: ButtonStatus,
    hovering: bool,
    pointer: &PointerSnapshot,
) -> (ButtonStatus, ButtonSignals) {
    let resting = if hovering {
        ButtonStatus::Hover
    } else {
        ButtonStatus::Up
    };
    match status {
        ButtonStatus::Up | ButtonStatus::Hover => {
            if hovering && pointer.pressed {
                if pointer.released && !pointer.down {
                    // Press and release landed in the same snapshot.
                    return (
                        resting,
                        ButtonSignals {
                            initial_click: true,
                            release: true,
                        },
                    );
                }
                return (
                    ButtonStatus::Down,
                    ButtonSignals {
                        initial_click: true,
                        release: false,
                    },
                );
            }
            (resting, ButtonSignals::default())
        }
        ButtonStatus::Down | ButtonStatus::UpActive => {
            if pointer.released {
                return (
                    resting,
                    ButtonSignals {
                        initial_click: false,
                        release: true,
                    },
                );
            }
            if !pointer.down {
                // Release never arrived, e.g. focus was lost mid-press.
                return (resting, ButtonSignals::default());
            }
            let next = if hovering {
                ButtonStatus::Down
            } else {
                ButtonStatus::UpActive
            };
            (next, ButtonSignals::default())
        }
    }
}

/// Clickable rectangle without visuals of its own.
pub struct BasicButton {
    ui: UiCore,
    status: ButtonStatus,
    disabled: bool,
    on_initial_click: Option<UiCallback>,
    on_release: Option<UiCallback>,
}

impl BasicButton {
    pub fn new(ui: UiCore) -> Self {
        Self {
            ui,
            status: ButtonStatus::Up,
            disabled: false,
            on_initial_click: None,
            on_release: None,
        }
    }

    pub fn on_initial_click(mut self, callback: impl FnMut(&mut Scope<'_>) + 'static) -> Self {
        self.on_initial_click = Some(Box::new(callback));
        self
    }

    pub fn on_release(mut self, callback: impl FnMut(&mut Scope<'_>) + 'static) -> Self {
        self.on_release = Some(Box::new(callback));
        self
    }

    pub fn ui(&self) -> &UiCore {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiCore {
        &mut self.ui
    }

    pub fn status(&self) -> ButtonStatus {
        self.status
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        if disabled {
            self.status = ButtonStatus::Up;
        }
    }

    /// Registers the exclusion area, advances the status machine and runs callbacks.
    pub fn poll(&mut self, scope: &mut Scope<'_>) -> ButtonSignals {
        self.ui.register_exclusion(scope);
        if self.disabled {
            return ButtonSignals::default();
        }

        let pointer = PointerSnapshot::read(scope.input_mut());
        let hovering = scope.input().pointer_position().is_some()
            && self.ui.hit_test(scope.tree(), pointer.position);
        let (next, signals) = step_button(self.status, hovering, &pointer);
        self.status = next;

        if signals.initial_click {
            if let Some(callback) = self.on_initial_click.as_mut() {
                callback(scope);
            }
        }
        if signals.release {
            if let Some(callback) = self.on_release.as_mut() {
                callback(scope);
            }
        }
        signals
    }
}

impl GameObject for BasicButton {
    fn core(&self) -> &ObjectCore {
        self.ui.object()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.ui.object_mut()
    }

    fn name(&self) -> &'static str {
        "basic_button"
    }

    fn is_ui(&self) -> bool {
        true
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        if let Err(error) = self.ui.attach(scope) {
            error!(error = %error, "button_attach_failed");
        }
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        self.poll(scope);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPalette {
    pub up: Rgba,
    pub hover: Rgba,
    pub down: Rgba,
    pub disabled: Rgba,
    pub text: Rgba,
}

impl Default for ButtonPalette {
    fn default() -> Self {
        Self {
            up: [52, 84, 140, 255],
            hover: [74, 112, 180, 255],
            down: [34, 56, 98, 255],
            disabled: [70, 70, 76, 255],
            text: [240, 240, 240, 255],
        }
    }
}

impl ButtonPalette {
    pub fn background(&self, status: ButtonStatus, disabled: bool) -> Rgba {
        if disabled {
            return self.disabled;
        }
        match status {
            ButtonStatus::Up => self.up,
            ButtonStatus::Hover => self.hover,
            ButtonStatus::Down | ButtonStatus::UpActive => self.down,
        }
    }
}

/// Labelled button with a status-coloured background.
pub struct Button {
    basic: BasicButton,
    label: String,
    text_scale: u8,
    palette: ButtonPalette,
    background: Option<NodeId>,
    text: Option<NodeId>,
    shown: Option<(ButtonStatus, bool)>,
}

impl Button {
    pub fn new(ui: UiCore, label: impl Into<String>) -> Self {
        Self {
            basic: BasicButton::new(ui),
            label: label.into(),
            text_scale: 2,
            palette: ButtonPalette::default(),
            background: None,
            text: None,
            shown: None,
        }
    }

    pub fn with_palette(mut self, palette: ButtonPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_text_scale(mut self, scale: u8) -> Self {
        self.text_scale = scale.max(1);
        self
    }

    pub fn on_initial_click(mut self, callback: impl FnMut(&mut Scope<'_>) + 'static) -> Self {
        self.basic = self.basic.on_initial_click(callback);
        self
    }

    pub fn on_release(mut self, callback: impl FnMut(&mut Scope<'_>) + 'static) -> Self {
        self.basic = self.basic.on_release(callback);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> ButtonStatus {
        self.basic.status()
    }

    pub fn ui(&self) -> &UiCore {
        self.basic.ui()
    }

    pub fn is_disabled(&self) -> bool {
        self.basic.is_disabled()
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.basic.set_disabled(disabled);
    }

    pub fn set_label(&mut self, scope: &mut Scope<'_>, label: impl Into<String>) {
        self.label = label.into();
        if let Some(text) = self.text {
            scope.tree_mut().set_text(text, &self.label);
            let offset = self.label_offset();
            scope.tree_mut().set_position(text, offset);
        }
    }

    fn label_offset(&self) -> Vec2 {
        let size = self.basic.ui().size();
        let scale = f32::from(self.text_scale);
        let width = self.label.chars().count() as f32 * GLYPH_ADVANCE_UNITS * scale;
        let height = GLYPH_HEIGHT_UNITS * scale;
        Vec2::new(
            ((size.x - width) / 2.0).max(0.0).floor(),
            ((size.y - height) / 2.0).max(0.0).floor(),
        )
    }

    fn refresh(&mut self, scope: &mut Scope<'_>) {
        let key = (self.basic.status(), self.basic.is_disabled());
        if self.shown == Some(key) {
            return;
        }
        self.shown = Some(key);
        let Some(background) = self.background else {
            return;
        };
        let size = self.basic.ui().size();
        let color = self.palette.background(key.0, key.1);
        scope.tree_mut().set_shapes(
            background,
            vec![Shape::Rect {
                rect: Rect::new(0.0, 0.0, size.x, size.y),
                color,
            }],
        );
    }
}

impl GameObject for Button {
    fn core(&self) -> &ObjectCore {
        self.basic.core()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.basic.core_mut()
    }

    fn name(&self) -> &'static str {
        "button"
    }

    fn is_ui(&self) -> bool {
        true
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        self.basic.init(scope);

        let background = scope.tree_mut().create_graphics(Vec::new());
        let text = scope
            .tree_mut()
            .create_text(self.label.clone(), self.palette.text, self.text_scale);
        let offset = self.label_offset();
        scope.tree_mut().set_position(text, offset);
        for node in [background, text] {
            if let Err(error) = self.basic.ui_mut().add_visual(scope.tree_mut(), node) {
                error!(error = %error, label = %self.label, "button_visual_failed");
            }
        }
        self.background = Some(background);
        self.text = Some(text);
        self.refresh(scope);
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        self.basic.poll(scope);
        self.refresh(scope);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::app::harness::Harness;
    use crate::app::input::{InputEvent, PointerButton};

    fn pointer(pressed: bool, down: bool, released: bool) -> PointerSnapshot {
        PointerSnapshot {
            pressed,
            down,
            released,
            ..PointerSnapshot::default()
        }
    }

    #[test]
    fn hover_then_press_fires_initial_click_once() {
        let (status, signals) = step_button(ButtonStatus::Up, true, &pointer(false, false, false));
        assert_eq!(status, ButtonStatus::Hover);
        assert_eq!(signals, ButtonSignals::default());

        let (status, signals) = step_button(status, true, &pointer(true, true, false));
        assert_eq!(status, ButtonStatus::Down);
        assert!(signals.initial_click);

        let (status, signals) = step_button(status, true, &pointer(false, true, false));
        assert_eq!(status, ButtonStatus::Down);
        assert!(!signals.initial_click);
    }

    #[test]
    fn leaving_while_down_keeps_release_intent() {
        let (status, _) = step_button(ButtonStatus::Down, false, &pointer(false, true, false));
        assert_eq!(status, ButtonStatus::UpActive);

        let (status, signals) = step_button(status, false, &pointer(false, false, true));
        assert_eq!(status, ButtonStatus::Up);
        assert!(signals.release);
    }

    #[test]
    fn returning_while_held_goes_back_down() {
        let (status, _) = step_button(ButtonStatus::UpActive, true, &pointer(false, true, false));
        assert_eq!(status, ButtonStatus::Down);
        let (status, signals) = step_button(status, true, &pointer(false, false, true));
        assert_eq!(status, ButtonStatus::Hover);
        assert!(signals.release);
    }

    #[test]
    fn press_outside_does_nothing() {
        let (status, signals) = step_button(ButtonStatus::Up, false, &pointer(true, true, false));
        assert_eq!(status, ButtonStatus::Up);
        assert_eq!(signals, ButtonSignals::default());
    }

    #[test]
    fn lost_release_returns_to_rest() {
        let (status, signals) = step_button(ButtonStatus::Down, true, &pointer(false, false, false));
        assert_eq!(status, ButtonStatus::Hover);
        assert!(!signals.release);
    }

    #[test]
    fn button_in_state_runs_callbacks_and_blocks_world_input() {
        let mut harness = Harness::new();
        let clicks = Rc::new(Cell::new(0));
        let releases = Rc::new(Cell::new(0));
        let click_sink = Rc::clone(&clicks);
        let release_sink = Rc::clone(&releases);
        let ui = UiCore::new(
            harness.tree_mut(),
            Vec2::new(10.0, 10.0),
            Vec2::new(100.0, 30.0),
        );
        let button = Button::new(ui, "go")
            .on_initial_click(move |_| click_sink.set(click_sink.get() + 1))
            .on_release(move |_| release_sink.set(release_sink.get() + 1));
        let id = harness.add(Box::new(button));

        harness.frame(vec![InputEvent::PointerMoved(Vec2::new(20.0, 20.0))]);
        assert_eq!(harness.object::<Button>(id).status(), ButtonStatus::Hover);

        harness.frame(vec![InputEvent::ButtonPressed(PointerButton::Left)]);
        assert_eq!(harness.object::<Button>(id).status(), ButtonStatus::Down);
        assert!(harness.services.input.world_input_blocked());
        assert!(!harness.services.input.pointer_pressed(PointerButton::Left));

        harness.frame(Vec::new());
        assert_eq!(clicks.get(), 1);

        harness.frame(vec![InputEvent::ButtonReleased(PointerButton::Left)]);
        assert_eq!(releases.get(), 1);
        assert_eq!(harness.object::<Button>(id).status(), ButtonStatus::Hover);
    }

    #[test]
    fn disabled_button_ignores_input() {
        let mut harness = Harness::new();
        let clicks = Rc::new(Cell::new(0));
        let sink = Rc::clone(&clicks);
        let ui = UiCore::new(harness.tree_mut(), Vec2::ZERO, Vec2::new(50.0, 50.0));
        let mut button = Button::new(ui, "x").on_initial_click(move |_| sink.set(sink.get() + 1));
        button.set_disabled(true);
        let id = harness.add(Box::new(button));

        harness.frame(vec![
            InputEvent::PointerMoved(Vec2::new(5.0, 5.0)),
            InputEvent::ButtonPressed(PointerButton::Left),
        ]);
        assert_eq!(clicks.get(), 0);
        assert_eq!(harness.object::<Button>(id).status(), ButtonStatus::Up);
    }
}
