use tracing::error;

use super::UiCore;
use crate::app::display::{NodeId, Shape};
use crate::app::events::StateEvent;
use crate::app::geometry::{Rect, Rgba, Vec2};
use crate::app::object::{GameObject, ObjectCore};
use crate::app::state::Scope;

const BACKGROUND: Rgba = [24, 24, 30, 220];

/// Share of the bar to fill for `value` out of `max`, in `[0, 1]`.
pub fn fill_fraction(value: f32, max: f32) -> f32 {
    if max.is_nan() || max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

/// Horizontal gauge. When it watches an event name, each matching event's amount
/// becomes the new value.
pub struct StatusBar {
    ui: UiCore,
    value: f32,
    max: f32,
    color: Rgba,
    label: Option<String>,
    watch: Option<&'static str>,
    shapes: Option<NodeId>,
    text: Option<NodeId>,
    shown: Option<(f32, f32)>,
}

impl StatusBar {
    pub fn new(ui: UiCore, max: f32, color: Rgba) -> Self {
        Self {
            ui: ui.with_exclusion(false),
            value: 0.0,
            max,
            color,
            label: None,
            watch: None,
            shapes: None,
            text: None,
            shown: None,
        }
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn watching(mut self, event: &'static str) -> Self {
        self.watch = Some(event);
        self
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn fraction(&self) -> f32 {
        fill_fraction(self.value, self.max)
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    pub fn set_max(&mut self, max: f32) {
        self.max = max;
    }

    fn redraw(&mut self, scope: &mut Scope<'_>) {
        let key = (self.value, self.max);
        if self.shown == Some(key) {
            return;
        }
        self.shown = Some(key);
        let Some(shapes) = self.shapes else {
            return;
        };
        let size = self.ui.size();
        let fill = size.x * self.fraction();
        let mut drawn = vec![Shape::Rect {
            rect: Rect::new(0.0, 0.0, size.x, size.y),
            color: BACKGROUND,
        }];
        if fill > 0.0 {
            drawn.push(Shape::Rect {
                rect: Rect::new(0.0, 0.0, fill, size.y),
                color: self.color,
            });
        }
        scope.tree_mut().set_shapes(shapes, drawn);
    }
}

impl GameObject for StatusBar {
    fn core(&self) -> &ObjectCore {
        self.ui.object()
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        self.ui.object_mut()
    }

    fn name(&self) -> &'static str {
        "status_bar"
    }

    fn is_ui(&self) -> bool {
        true
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        if let Err(error) = self.ui.attach(scope) {
            error!(error = %error, "status_bar_attach_failed");
            return;
        }
        let shapes = scope.tree_mut().create_graphics(Vec::new());
        let mut nodes = vec![shapes];
        if let Some(label) = &self.label {
            let text = scope.tree_mut().create_text(label.clone(), [255; 4], 1);
            scope.tree_mut().set_position(text, Vec2::new(3.0, 2.0));
            self.text = Some(text);
            nodes.push(text);
        }
        for node in nodes {
            if let Err(error) = self.ui.add_visual(scope.tree_mut(), node) {
                error!(error = %error, "status_bar_visual_failed");
            }
        }
        self.shapes = Some(shapes);
        if let (Some(event), Some(id)) = (self.watch, self.ui.id()) {
            scope.subscribe(event, id);
        }
        self.redraw(scope);
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        self.redraw(scope);
    }

    fn on_event(&mut self, scope: &mut Scope<'_>, event: &StateEvent) {
        if Some(event.name) == self.watch {
            self.value = event.amount as f32;
            self.redraw(scope);
        }
    }
}
