use bubble_engine::app::ui::{Button, Frame, UiCore};
use bubble_engine::app::{
    Key, MenuCore, Rgba, Scope, StateBehavior, TransitionOptions, Vec2,
};
use tracing::{info, warn};

use super::{add_object, add_text, text_width, TownMenu, DEPTH_OVERLAY, SCREEN, TEXT_COLOR};

const SHADE: Rgba = [0, 0, 0, 150];
const PANEL: Rgba = [30, 36, 56, 240];
const PANEL_SIZE: Vec2 = Vec2::new(180.0, 96.0);

/// Layer over a paused field. Escape or P resumes.
pub(crate) struct PauseMenu {
    menu: MenuCore,
}

impl PauseMenu {
    pub(crate) fn new() -> Self {
        let menu = MenuCore::new(&[Key::Escape, Key::Character('p')]).unwrap_or_else(|error| {
            warn!(error = %error, "pause_hotkeys_rejected");
            MenuCore::without_hotkeys()
        });
        Self { menu }
    }
}

impl StateBehavior for PauseMenu {
    fn name(&self) -> &'static str {
        "pause_menu"
    }

    fn enter(&mut self, scope: &mut Scope<'_>) {
        let shade = Frame::new(scope.tree_mut(), Vec2::ZERO, SCREEN).with_background(SHADE);
        let shade_body = shade.body();
        scope.tree_mut().set_depth(shade_body, DEPTH_OVERLAY);
        add_object(scope, Box::new(shade));

        let origin = Vec2::new(
            ((SCREEN.x - PANEL_SIZE.x) / 2.0).floor(),
            ((SCREEN.y - PANEL_SIZE.y) / 2.0).floor(),
        );
        let panel = Frame::new(scope.tree_mut(), origin, PANEL_SIZE)
            .with_background(PANEL)
            .with_parent(shade_body);
        let body = panel.body();
        add_object(scope, Box::new(panel));

        let title = "Paused";
        let x = ((PANEL_SIZE.x - text_width(title, 2)) / 2.0).floor();
        add_text(scope, body, title, Vec2::new(x, 10.0), TEXT_COLOR, 2);

        let resume = UiCore::new(scope.tree_mut(), Vec2::new(20.0, 34.0), Vec2::new(140.0, 20.0))
            .with_parent(body);
        let resume = Button::new(resume, "Resume").on_release(|scope| {
            info!("pause_resumed");
            scope.close();
        });
        add_object(scope, Box::new(resume));

        let quit = UiCore::new(scope.tree_mut(), Vec2::new(20.0, 62.0), Vec2::new(140.0, 20.0))
            .with_parent(body);
        let quit = Button::new(quit, "Quit to town").on_release(quit_to_town);
        add_object(scope, Box::new(quit));
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        self.menu.update(scope);
    }
}

/// Abandons the paused round. The chain is unwound to its root and the root is
/// replaced by a fresh town, so nothing beneath this layer survives.
fn quit_to_town(scope: &mut Scope<'_>) {
    let root = scope.unwind_to_root();
    info!(root = ?root.map(|id| id.0), "pause_quit_to_town");
    let town = scope.spawn_state(Box::new(TownMenu::new()));
    scope.set_state(town, TransitionOptions::default());
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bubble_engine::app::{InputEvent, PointerButton};
    use bubble_engine::Engine;

    use super::*;
    use crate::app::states::Field;
    use crate::app::session::tests::session;

    const STEP: f32 = 1.0 / 60.0;

    fn paused_field() -> (Engine, bubble_engine::StateId) {
        let mut engine = Engine::new(Box::new(Field::new()), Duration::from_millis(250));
        engine.services_mut().resources.insert(session());
        engine.frame(STEP);
        engine.frame(STEP);
        let field = engine.machine().current().expect("field");
        engine
            .pause_current(Box::new(PauseMenu::new()))
            .expect("pause layer");
        engine.frame(STEP);
        assert_eq!(
            engine.current_state().map(|state| state.name()),
            Some("pause_menu")
        );
        (engine, field)
    }

    fn click(engine: &mut Engine, at: Vec2) {
        engine.push_input(InputEvent::PointerMoved(at));
        engine.frame(STEP);
        engine.push_input(InputEvent::ButtonPressed(PointerButton::Left));
        engine.frame(STEP);
        engine.push_input(InputEvent::ButtonReleased(PointerButton::Left));
        engine.frame(STEP);
        engine.frame(STEP);
    }

    fn panel_point(local: Vec2) -> Vec2 {
        Vec2::new(
            ((SCREEN.x - PANEL_SIZE.x) / 2.0).floor() + local.x,
            ((SCREEN.y - PANEL_SIZE.y) / 2.0).floor() + local.y,
        )
    }

    #[test]
    fn resume_button_returns_to_the_same_field() {
        let (mut engine, field) = paused_field();
        click(&mut engine, panel_point(Vec2::new(40.0, 44.0)));
        assert_eq!(engine.machine().current(), Some(field));
        assert!(!engine.machine().state(field).expect("field").is_paused());
    }

    #[test]
    fn quit_replaces_the_paused_field_with_town() {
        let (mut engine, field) = paused_field();
        click(&mut engine, panel_point(Vec2::new(40.0, 72.0)));
        assert_eq!(
            engine.current_state().map(|state| state.name()),
            Some("town_menu")
        );
        assert!(!engine.machine().contains(field));
    }

    #[test]
    fn pause_panel_blocks_world_clicks() {
        let (mut engine, _field) = paused_field();
        engine.push_input(InputEvent::PointerMoved(Vec2::new(10.0, 10.0)));
        engine.frame(STEP);
        assert!(engine.services().input.world_input_blocked());
    }
}
