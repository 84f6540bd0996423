use bubble_engine::app::ui::{TextField, UiCore};
use bubble_engine::app::{Rgba, Scope, StateBehavior, TransitionOptions, Vec2};
use tracing::{debug, info, warn};

use super::{add_backdrop, add_object, add_text, Cutscene, CutsceneNext, MUTED_TEXT, TEXT_COLOR};
use crate::app::session::GameSession;

const BACKDROP: Rgba = [20, 26, 40, 255];
const MAX_NAME_LEN: usize = 16;

/// First-start prompt for the hero's name.
pub(crate) struct NameEntry;

impl NameEntry {
    pub(crate) fn new() -> Self {
        Self
    }
}

impl StateBehavior for NameEntry {
    fn name(&self) -> &'static str {
        "name_entry"
    }

    fn enter(&mut self, scope: &mut Scope<'_>) {
        add_backdrop(scope, BACKDROP);
        let root = scope.root();
        add_text(scope, root, "Who goes there?", Vec2::new(120.0, 80.0), TEXT_COLOR, 2);
        add_text(
            scope,
            root,
            "Type a name and press Enter",
            Vec2::new(120.0, 146.0),
            MUTED_TEXT,
            1,
        );

        let ui = UiCore::new(scope.tree_mut(), Vec2::new(120.0, 110.0), Vec2::new(240.0, 24.0));
        let field = TextField::new(ui, MAX_NAME_LEN)
            .focused()
            .on_submit(submit_name);
        add_object(scope, Box::new(field));
    }
}

fn submit_name(scope: &mut Scope<'_>, value: &str) {
    let name = value.trim();
    if name.is_empty() {
        debug!("name_entry_empty");
        return;
    }
    let intro = match scope.resource_mut::<GameSession>() {
        Some(session) => {
            session.hero_name = name.to_string();
            session.save();
            session.intro.clone()
        }
        None => {
            warn!(state = "name_entry", "game_session_missing");
            Vec::new()
        }
    };
    info!(hero = name, "hero_named");
    let next = scope.spawn_state(Box::new(Cutscene::new(intro, CutsceneNext::Town)));
    scope.set_state(next, TransitionOptions::default());
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bubble_engine::app::{InputEvent, Key};
    use bubble_engine::Engine;

    use super::*;
    use crate::app::session::tests::session;

    fn engine() -> Engine {
        let mut engine = Engine::new(Box::new(NameEntry::new()), Duration::from_millis(250));
        engine.services_mut().resources.insert(session());
        engine.frame(0.0);
        engine.frame(0.0);
        engine
    }

    fn submit(engine: &mut Engine, typed: &str) {
        if !typed.is_empty() {
            engine.push_input(InputEvent::Text(typed.to_string()));
        }
        engine.frame(0.0);
        engine.push_input(InputEvent::KeyPressed(Key::Enter));
        engine.frame(0.0);
        engine.push_input(InputEvent::KeyReleased(Key::Enter));
        engine.frame(0.0);
    }

    fn current_name(engine: &Engine) -> &'static str {
        engine.current_state().map(|state| state.name()).unwrap_or("none")
    }

    #[test]
    fn blank_names_are_ignored() {
        let mut engine = engine();
        submit(&mut engine, "   ");
        assert_eq!(current_name(&engine), "name_entry");
    }

    #[test]
    fn submitted_name_is_stored_and_the_intro_plays() {
        let mut engine = engine();
        submit(&mut engine, "  Pip ");
        assert_eq!(current_name(&engine), "cutscene");
        let hero = engine
            .services()
            .resources
            .get::<GameSession>()
            .map(|session| session.hero_name.clone());
        assert_eq!(hero.as_deref(), Some("Pip"));
    }
}
