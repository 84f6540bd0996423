use std::cell::Cell;
use std::rc::Rc;

use bubble_engine::app::display::{NodeId, Shape};
use bubble_engine::app::ui::{Button, StatusBar, UiCore};
use bubble_engine::app::{
    Cursor, GameObject, Key, ObjectCore, PointerButton, Rgba, Scope, StateBehavior, StateEvent,
    TransitionOptions, Vec2,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use super::{
    add_backdrop, add_object, Cutscene, CutsceneNext, PauseMenu, ACCENT_TEXT,
    DEPTH_BUBBLES, DEPTH_HUD, SCREEN,
};
use crate::app::session::{GameSession, RoundRules};

pub(crate) const POP_EVENT: &str = "pop";
pub(crate) const ESCAPED_EVENT: &str = "bubble_escaped";
pub(crate) const TIMER_TICK_EVENT: &str = "timer_tick";
pub(crate) const ROUND_OVER_EVENT: &str = "round_over";
pub(crate) const COMBO_EVENT: &str = "combo_changed";
pub(crate) const GOLD_EVENT: &str = "gold_changed";

const PAUSE_KEYS: [Key; 2] = [Key::Escape, Key::Character('p')];
const SKY: Rgba = [28, 46, 74, 255];
const TIME_COLOR: Rgba = [90, 190, 240, 255];
const COMBO_COLOR: Rgba = [240, 140, 70, 255];
const BUBBLE_COLORS: [Rgba; 4] = [
    [140, 210, 255, 200],
    [170, 240, 210, 200],
    [230, 180, 255, 200],
    [255, 230, 160, 200],
];

/// The bubble-popping round.
pub(crate) struct Field {
    round_over: Rc<Cell<bool>>,
    watch_focus: bool,
    finished: bool,
}

impl Field {
    pub(crate) fn new() -> Self {
        Self {
            round_over: Rc::new(Cell::new(false)),
            watch_focus: true,
            finished: false,
        }
    }

    fn build_hud(&self, scope: &mut Scope<'_>, rules: &RoundRules) {
        let time = UiCore::new(scope.tree_mut(), Vec2::new(8.0, 6.0), Vec2::new(150.0, 10.0));
        let time_bar = StatusBar::new(time, rules.duration, TIME_COLOR)
            .with_value(rules.duration)
            .with_label("Time")
            .watching(TIMER_TICK_EVENT);
        add_object(scope, Box::new(time_bar));

        let combo = UiCore::new(scope.tree_mut(), Vec2::new(166.0, 6.0), Vec2::new(100.0, 10.0));
        let combo_bar = StatusBar::new(combo, rules.combo_cap as f32, COMBO_COLOR)
            .with_label("Combo")
            .watching(COMBO_EVENT);
        add_object(scope, Box::new(combo_bar));

        add_object(scope, Box::new(GoldLabel::new(Vec2::new(276.0, 8.0))));

        let pause = UiCore::new(
            scope.tree_mut(),
            Vec2::new(SCREEN.x - 56.0, 4.0),
            Vec2::new(48.0, 16.0),
        );
        let button = Button::new(pause, "Pause")
            .with_text_scale(1)
            .on_release(|scope| {
                info!(reason = "button", "field_paused");
                scope.pause_with(Box::new(PauseMenu::new()));
            });
        add_object(scope, Box::new(button));
    }

    fn finish(&mut self, scope: &mut Scope<'_>) {
        self.finished = true;
        let pages = match scope.resource_mut::<GameSession>() {
            Some(session) => session.finish_round().pages(),
            None => {
                error!(state = "field", "game_session_missing");
                Vec::new()
            }
        };
        let next = scope.spawn_state(Box::new(Cutscene::new(pages, CutsceneNext::Town)));
        scope.set_state(next, TransitionOptions::default());
    }
}

impl StateBehavior for Field {
    fn name(&self) -> &'static str {
        "field"
    }

    fn cursor(&self) -> Cursor {
        Cursor::Crosshair
    }

    fn enter(&mut self, scope: &mut Scope<'_>) {
        add_backdrop(scope, SKY);
        let Some(session) = scope.resource_mut::<GameSession>() else {
            error!(state = "field", "game_session_missing");
            return;
        };
        let rules = session.start_round();
        let seed = session.round_seed();

        let round_over = Rc::clone(&self.round_over);
        scope.on(ROUND_OVER_EVENT, move |_| round_over.set(true));
        add_object(scope, Box::new(RoundTimer::new(rules.duration)));
        add_object(scope, Box::new(Spawner::new(seed, rules)));
        add_object(scope, Box::new(ComboMeter::new(rules)));
        self.build_hud(scope, &rules);
        info!(seed, "field_entered");
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        if self.finished {
            return;
        }
        let input = scope.input();
        let reason = if input.any_key_pressed(&PAUSE_KEYS) {
            Some("hotkey")
        } else if self.watch_focus && input.focus_lost() {
            Some("focus_lost")
        } else {
            None
        };
        if let Some(reason) = reason {
            info!(reason, "field_paused");
            scope.pause_with(Box::new(PauseMenu::new()));
            return;
        }
        if self.round_over.get() {
            self.finish(scope);
        }
    }

    fn on_pause(&mut self, _scope: &mut Scope<'_>) {
        self.watch_focus = false;
    }

    fn on_restore(&mut self, _scope: &mut Scope<'_>) {
        self.watch_focus = true;
    }
}

/// Counts the round down and announces its end once.
struct RoundTimer {
    core: ObjectCore,
    remaining: f32,
    expired: bool,
}

impl RoundTimer {
    fn new(duration: f32) -> Self {
        Self {
            core: ObjectCore::new(),
            remaining: duration,
            expired: false,
        }
    }
}

impl GameObject for RoundTimer {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "round_timer"
    }

    fn update(&mut self, scope: &mut Scope<'_>, delta: f32) {
        if self.expired {
            return;
        }
        self.remaining = (self.remaining - delta).max(0.0);
        scope.emit(StateEvent::new(TIMER_TICK_EVENT).with_amount(f64::from(self.remaining)));
        if self.remaining <= 0.0 {
            self.expired = true;
            debug!("round_timer_expired");
            scope.emit(StateEvent::new(ROUND_OVER_EVENT));
        }
    }
}

/// Releases bubbles from below the screen on a fixed interval.
struct Spawner {
    core: ObjectCore,
    rng: StdRng,
    rules: RoundRules,
    cooldown: f32,
    live: usize,
    active: bool,
}

impl Spawner {
    fn new(seed: u64, rules: RoundRules) -> Self {
        Self {
            core: ObjectCore::new(),
            rng: StdRng::seed_from_u64(seed),
            rules,
            cooldown: 0.0,
            live: 0,
            active: true,
        }
    }

    fn spawn(&mut self) -> Bubble {
        let (min_radius, max_radius) = self.rules.bubble_radius;
        let (min_speed, max_speed) = self.rules.bubble_speed;
        let radius = self.rng.gen_range(min_radius..=max_radius).max(1.0);
        let speed = self.rng.gen_range(min_speed..=max_speed);
        let x = self.rng.gen_range(radius..=(SCREEN.x - radius).max(radius));
        let color = BUBBLE_COLORS[self.rng.gen_range(0..BUBBLE_COLORS.len())];
        Bubble::new(
            Vec2::new(x, SCREEN.y + radius),
            radius,
            speed,
            self.rules.pop_radius,
            color,
        )
    }
}

impl GameObject for Spawner {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "bubble_spawner"
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        let Some(id) = self.core.id() else {
            return;
        };
        for event in [POP_EVENT, ESCAPED_EVENT, ROUND_OVER_EVENT] {
            scope.subscribe(event, id);
        }
    }

    fn update(&mut self, scope: &mut Scope<'_>, delta: f32) {
        if !self.active {
            return;
        }
        self.cooldown -= delta;
        while self.cooldown <= 0.0 {
            self.cooldown += self.rules.spawn_interval;
            if self.live >= self.rules.max_bubbles {
                continue;
            }
            let bubble = self.spawn();
            match scope.add(Box::new(bubble)) {
                Ok(_) => self.live += 1,
                Err(error) => warn!(error = %error, "bubble_spawn_failed"),
            }
        }
    }

    fn on_event(&mut self, _scope: &mut Scope<'_>, event: &StateEvent) {
        match event.name {
            POP_EVENT | ESCAPED_EVENT => self.live = self.live.saturating_sub(1),
            ROUND_OVER_EVENT => self.active = false,
            _ => {}
        }
    }
}

/// A rising bubble. Pops on a world pointer press within its radius plus the
/// weapon's reach; pointer presses over UI never reach it.
struct Bubble {
    core: ObjectCore,
    center: Vec2,
    radius: f32,
    speed: f32,
    reach: f32,
    color: Rgba,
    node: Option<NodeId>,
    done: bool,
}

impl Bubble {
    fn new(center: Vec2, radius: f32, speed: f32, reach: f32, color: Rgba) -> Self {
        Self {
            core: ObjectCore::new(),
            center,
            radius,
            speed,
            reach,
            color,
            node: None,
            done: false,
        }
    }

    fn finish(&mut self, scope: &mut Scope<'_>, event: &'static str) {
        self.done = true;
        let Some(id) = self.core.id() else {
            return;
        };
        scope.emit(StateEvent::new(event).with_amount(1.0).with_source(id));
        if let Err(error) = scope.remove(id) {
            error!(error = %error, "bubble_remove_failed");
        }
    }
}

impl GameObject for Bubble {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "bubble"
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        let root = scope.root();
        let tree = scope.tree_mut();
        let node = tree.create_graphics(vec![Shape::Circle {
            center: Vec2::ZERO,
            radius: self.radius,
            color: self.color,
        }]);
        tree.set_position(node, self.center);
        tree.set_depth(node, DEPTH_BUBBLES);
        match self.core.add_display(tree, root, node) {
            Ok(()) => self.node = Some(node),
            Err(error) => {
                error!(error = %error, "bubble_display_failed");
                tree.destroy(node);
            }
        }
    }

    fn update(&mut self, scope: &mut Scope<'_>, delta: f32) {
        if self.done {
            return;
        }
        self.center.y -= self.speed * delta;
        if let Some(node) = self.node {
            scope.tree_mut().set_position(node, self.center);
        }
        let input = scope.input();
        let popped = input.pointer_pressed(PointerButton::Left)
            && input.pointer().distance(self.center) <= self.radius + self.reach;
        if popped {
            self.finish(scope, POP_EVENT);
        } else if self.center.y + self.radius < 0.0 {
            self.finish(scope, ESCAPED_EVENT);
        }
    }
}

/// Chains pops inside the combo window and banks each pop in the session.
struct ComboMeter {
    core: ObjectCore,
    rules: RoundRules,
    combo: u32,
    since_pop: f32,
}

impl ComboMeter {
    fn new(rules: RoundRules) -> Self {
        Self {
            core: ObjectCore::new(),
            rules,
            combo: 0,
            since_pop: 0.0,
        }
    }
}

impl GameObject for ComboMeter {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "combo_meter"
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        if let Some(id) = self.core.id() {
            scope.subscribe(POP_EVENT, id);
        }
    }

    fn update(&mut self, scope: &mut Scope<'_>, delta: f32) {
        if self.combo == 0 {
            return;
        }
        self.since_pop += delta;
        if self.since_pop > self.rules.combo_window {
            debug!(combo = self.combo, "combo_dropped");
            self.combo = 0;
            scope.emit(StateEvent::new(COMBO_EVENT).with_amount(0.0));
        }
    }

    fn on_event(&mut self, scope: &mut Scope<'_>, event: &StateEvent) {
        if event.name != POP_EVENT {
            return;
        }
        self.combo = self.combo.saturating_add(1);
        self.since_pop = 0.0;
        let Some(session) = scope.resource_mut::<GameSession>() else {
            warn!(object = "combo_meter", "game_session_missing");
            return;
        };
        session.record_pop(self.combo, &self.rules);
        let gold = session.round.gold_earned;
        let shown = self.combo.min(self.rules.combo_cap);
        scope.emit(StateEvent::new(COMBO_EVENT).with_amount(f64::from(shown)));
        scope.emit(StateEvent::new(GOLD_EVENT).with_amount(gold as f64));
    }
}

/// HUD text showing the gold earned this round.
struct GoldLabel {
    core: ObjectCore,
    position: Vec2,
    node: Option<NodeId>,
}

impl GoldLabel {
    fn new(position: Vec2) -> Self {
        Self {
            core: ObjectCore::new(),
            position,
            node: None,
        }
    }
}

impl GameObject for GoldLabel {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn name(&self) -> &'static str {
        "gold_label"
    }

    fn is_ui(&self) -> bool {
        true
    }

    fn init(&mut self, scope: &mut Scope<'_>) {
        let root = scope.root();
        let tree = scope.tree_mut();
        let node = tree.create_text("Gold +0", ACCENT_TEXT, 1);
        tree.set_position(node, self.position);
        tree.set_depth(node, DEPTH_HUD);
        if let Err(error) = self.core.add_display(tree, root, node) {
            error!(error = %error, "gold_label_display_failed");
            tree.destroy(node);
            return;
        }
        self.node = Some(node);
        if let Some(id) = self.core.id() {
            scope.subscribe(GOLD_EVENT, id);
        }
    }

    fn on_event(&mut self, scope: &mut Scope<'_>, event: &StateEvent) {
        if let Some(node) = self.node {
            let text = format!("Gold +{}", event.amount.max(0.0) as u64);
            scope.tree_mut().set_text(node, &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bubble_engine::app::InputEvent;
    use bubble_engine::Engine;

    use super::*;
    use crate::app::session::tests::session;

    const STEP: f32 = 1.0 / 60.0;

    fn engine() -> Engine {
        let mut engine = Engine::new(Box::new(Field::new()), Duration::from_millis(250));
        engine.services_mut().resources.insert(session());
        engine.frame(STEP);
        engine
    }

    fn current_name(engine: &Engine) -> &'static str {
        engine.current_state().map(|state| state.name()).unwrap_or("none")
    }

    fn tap_key(engine: &mut Engine, key: Key) {
        engine.push_input(InputEvent::KeyPressed(key));
        engine.frame(STEP);
        engine.push_input(InputEvent::KeyReleased(key));
        engine.frame(STEP);
    }

    fn timer_remaining(engine: &Engine, field: bubble_engine::StateId) -> f32 {
        engine
            .machine()
            .state(field)
            .and_then(|state| state.objects_of::<RoundTimer>().next())
            .map(|timer| timer.remaining)
            .expect("round timer")
    }

    #[test]
    fn entering_builds_the_round_objects() {
        let mut engine = engine();
        engine.frame(STEP);
        let state = engine.current_state().expect("field");
        assert_eq!(state.name(), "field");
        assert_eq!(state.objects_of::<RoundTimer>().count(), 1);
        assert_eq!(state.objects_of::<Spawner>().count(), 1);
        assert_eq!(state.objects_of::<StatusBar>().count(), 2);
        assert_eq!(engine.services().cursor, Cursor::Crosshair);
    }

    #[test]
    fn hotkey_pause_keeps_the_round_and_resume_does_not_reenter() {
        let mut engine = engine();
        engine.frame(STEP);
        let field = engine.machine().current().expect("field id");
        let before = timer_remaining(&engine, field);

        tap_key(&mut engine, Key::Escape);
        assert_eq!(current_name(&engine), "pause_menu");
        assert!(engine.machine().state(field).expect("field").is_paused());
        for _ in 0..10 {
            engine.frame(0.5);
        }
        assert_eq!(timer_remaining(&engine, field), before);

        tap_key(&mut engine, Key::Character('p'));
        assert_eq!(engine.machine().current(), Some(field));
        let state = engine.machine().state(field).expect("field");
        assert!(!state.is_paused());
        assert_eq!(state.objects_of::<RoundTimer>().count(), 1);
    }

    #[test]
    fn pause_button_stops_the_timer_in_the_same_frame() {
        let mut engine = engine();
        engine.frame(STEP);
        let field = engine.machine().current().expect("field id");

        engine.push_input(InputEvent::PointerMoved(Vec2::new(SCREEN.x - 32.0, 12.0)));
        engine.frame(STEP);
        engine.push_input(InputEvent::ButtonPressed(PointerButton::Left));
        engine.frame(STEP);
        let before = timer_remaining(&engine, field);

        engine.push_input(InputEvent::ButtonReleased(PointerButton::Left));
        engine.frame(STEP);
        assert!(engine.machine().state(field).expect("field").is_paused());
        assert_eq!(timer_remaining(&engine, field), before);

        engine.frame(STEP);
        assert_eq!(current_name(&engine), "pause_menu");
        assert_eq!(timer_remaining(&engine, field), before);
    }

    #[test]
    fn focus_loss_pauses_the_field() {
        let mut engine = engine();
        engine.push_input(InputEvent::Focus(false));
        engine.frame(STEP);
        engine.frame(STEP);
        assert_eq!(current_name(&engine), "pause_menu");
    }

    #[test]
    fn pressing_on_a_bubble_pops_and_counts_it() {
        let mut engine = engine();
        let mut center = None;
        for _ in 0..30 {
            engine.frame(STEP);
            center = engine
                .current_state()
                .and_then(|state| state.objects_of::<Bubble>().next())
                .map(|bubble| bubble.center);
            if center.is_some() {
                break;
            }
        }
        let center = center.expect("a bubble spawned");

        engine.push_input(InputEvent::PointerMoved(center));
        engine.push_input(InputEvent::ButtonPressed(PointerButton::Left));
        engine.frame(0.0);
        engine.push_input(InputEvent::ButtonReleased(PointerButton::Left));
        engine.frame(0.0);

        let session = engine
            .services()
            .resources
            .get::<GameSession>()
            .expect("session");
        assert!(session.round.bubbles_popped >= 1);
        assert!(session.round.gold_earned >= 1);
    }

    #[test]
    fn round_end_shows_results_then_returns_to_town() {
        let mut engine = engine();
        for _ in 0..60 {
            engine.frame(1.0);
            if current_name(&engine) == "cutscene" {
                break;
            }
        }
        assert_eq!(current_name(&engine), "cutscene");
        let day = engine
            .services()
            .resources
            .get::<GameSession>()
            .map(|session| session.day);
        assert_eq!(day, Some(2));

        for _ in 0..10 {
            if current_name(&engine) == "town_menu" {
                break;
            }
            tap_key(&mut engine, Key::Enter);
        }
        assert_eq!(current_name(&engine), "town_menu");
    }
}
