use tracing::{debug, error};

use super::{PointerSnapshot, UiCore};
use crate::app::display::{NodeId, Shape};
use crate::app::geometry::{Rect, Rgba, Vec2};
use crate::app::input::Key;
use crate::app::object::{GameObject, ObjectCore};
use crate::app::state::Scope;

const TEXT_SCALE: u8 = 2;
const PADDING: f32 = 4.0;
const IDLE_BORDER: Rgba = [120, 120, 130, 255];
const FOCUS_BORDER: Rgba = [240, 200, 80, 255];
const FILL: Rgba = [20, 20, 26, 230];
const TEXT: Rgba = [235, 235, 235, 255];

type SubmitCallback = Box<dyn FnMut(&mut Scope<'_>, &str)>;

/// Single-line text input. Clicking focuses it, clicking elsewhere drops focus.
pub struct TextField {
    ui: UiCore,
    value: String,
    max_len: usize,
    focused: bool,
    on_submit: Option<SubmitCallback>,
    frame: Option<NodeId>,
    text: Option<NodeId>,
    shown: Option<(String, bool)>,
}

impl TextField {
    pub fn new(ui: UiCore, max_len: usize) -> Self {
        Self {
            ui,
            value: String::new(),
            max_len,
            focused: false,
            on_submit: None,
            frame: None,
            text: None,
            shown: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into().chars().take(self.max_len).collect();
        self
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }

    pub fn on_submit(mut self, callback: impl FnMut(&mut Scope<'_>, &str) + 'static) -> Self {
        self.on_submit = Some(Box::new(callback));
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Applies typed characters and backspace. Returns true when Enter was pressed.
    fn edit(&mut self, typed: &str, backspace: bool, enter: bool) -> bool {
        if backspace {
            self.value.pop();
        }
        for ch in typed.chars().filter(|ch| !ch.is_control()) {
            if self.value.chars().count() >= self.max_len {
                debug!(max_len = self.max_len, "text_field_full");
                break;
            }
            self.value.push(ch);
        }
        enter
    }

    fn redraw(&mut self, scope: &mut Scope<'_>) {
        let key = (self.value.clone(), self.focused);
        if self.shown.as_ref() == Some(&key) {
            return;
        }
        let size = self.ui.size();
        if let Some(frame) = self.frame {
            let border = if self.focused { FOCUS_BORDER } else { IDLE_BORDER };
            let rect = Rect::new(0.0, 0.0, size.x, size.y);
            scope.tree_mut().set_shapes(
                frame,
                vec![
                    Shape::Rect { rect, color: FILL },
                    Shape::Outline {
                        rect,
                        color: border,
                    },
                ],
            );
        }
        if let Some(text) = self.text {
            let caret = if self.focused { "_" } else { "" };
            scope
                .tree_mut()
                .set_text(text, &format!("{}{}", self.value, caret));
        }
        self.shown = Some(key);
    }
}

impl GameObject for TextField {
    fn core(&self) -> &ObjectCore {
        self.ui.object()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.ui.object_mut()
    }

    fn name(&self) -> &'static str {
        "text_field"
    }

    fn is_ui(&self) -> bool {
        true
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        if let Err(error) = self.ui.attach(scope) {
            error!(error = %error, "text_field_attach_failed");
            return;
        }
        let frame = scope.tree_mut().create_graphics(Vec::new());
        let text = scope.tree_mut().create_text("", TEXT, TEXT_SCALE);
        let baseline = ((self.ui.size().y - 5.0 * f32::from(TEXT_SCALE)) / 2.0).max(0.0);
        scope
            .tree_mut()
            .set_position(text, Vec2::new(PADDING, baseline.floor()));
        for node in [frame, text] {
            if let Err(error) = self.ui.add_visual(scope.tree_mut(), node) {
                error!(error = %error, "text_field_visual_failed");
            }
        }
        self.frame = Some(frame);
        self.text = Some(text);
        self.redraw(scope);
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        self.ui.register_exclusion(scope);
        let pointer = PointerSnapshot::read(scope.input_mut());
        if pointer.pressed {
            self.focused = self.ui.hit_test(scope.tree(), pointer.position);
        }

        if self.focused {
            let typed = scope.input().typed_text().to_string();
            let backspace = scope.input().was_key_pressed(Key::Backspace);
            let enter = scope.input().was_key_pressed(Key::Enter);
            if self.edit(&typed, backspace, enter) {
                let value = self.value.clone();
                if let Some(callback) = self.on_submit.as_mut() {
                    callback(scope, &value);
                }
            }
        }
        self.redraw(scope);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::app::harness::Harness;
    use crate::app::input::{InputEvent, PointerButton};

    #[test]
    fn edit_respects_max_len_and_backspace() {
        let mut tree = crate::app::display::DisplayTree::new();
        let ui = UiCore::new(&mut tree, Vec2::ZERO, Vec2::new(100.0, 20.0));
        let mut field = TextField::new(ui, 4);
        assert!(!field.edit("abcdef", false, false));
        assert_eq!(field.value(), "abcd");
        field.edit("", true, false);
        assert_eq!(field.value(), "abc");
        field.edit("\u{8}z", false, false);
        assert_eq!(field.value(), "abcz");
        assert!(field.edit("", false, true));
    }

    #[test]
    fn click_focuses_then_typing_and_enter_submit() {
        let mut harness = Harness::new();
        let submitted = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&submitted);
        let ui = UiCore::new(harness.tree_mut(), Vec2::new(10.0, 10.0), Vec2::new(120.0, 20.0));
        let field = TextField::new(ui, 12)
            .on_submit(move |_, value| *sink.borrow_mut() = Some(value.to_string()));
        let id = harness.add(Box::new(field));

        harness.frame(vec![InputEvent::Text("ignored".to_string())]);
        assert_eq!(harness.object::<TextField>(id).value(), "");

        harness.frame(vec![
            InputEvent::PointerMoved(Vec2::new(20.0, 15.0)),
            InputEvent::ButtonPressed(PointerButton::Left),
        ]);
        assert!(harness.object::<TextField>(id).is_focused());

        harness.frame(vec![
            InputEvent::ButtonReleased(PointerButton::Left),
            InputEvent::Text("Pip".to_string()),
        ]);
        harness.frame(vec![InputEvent::KeyPressed(Key::Enter)]);
        assert_eq!(submitted.borrow().as_deref(), Some("Pip"));

        harness.frame(vec![
            InputEvent::KeyReleased(Key::Enter),
            InputEvent::PointerMoved(Vec2::new(400.0, 400.0)),
            InputEvent::ButtonPressed(PointerButton::Left),
        ]);
        assert!(!harness.object::<TextField>(id).is_focused());
    }
}
