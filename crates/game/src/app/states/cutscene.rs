use bubble_engine::app::display::NodeId;
use bubble_engine::app::{
    Cursor, Key, PointerButton, Rgba, Scope, StateBehavior, TransitionOptions, Vec2,
};
use tracing::{debug, info};

use super::{add_backdrop, add_text, text_width, Field, TownMenu, MUTED_TEXT, SCREEN, TEXT_COLOR};

const BACKDROP: Rgba = [12, 14, 24, 255];
const ADVANCE_KEYS: [Key; 2] = [Key::Enter, Key::Space];
const PAGE_SCALE: u8 = 2;

/// Where a cutscene goes after its last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CutsceneNext {
    Town,
    Field,
}

/// Pages of text, one at a time.
pub(crate) struct Cutscene {
    pages: Vec<String>,
    page: usize,
    next: CutsceneNext,
    text: Option<NodeId>,
    counter: Option<NodeId>,
    done: bool,
}

impl Cutscene {
    pub(crate) fn new(pages: Vec<String>, next: CutsceneNext) -> Self {
        Self {
            pages,
            page: 0,
            next,
            text: None,
            counter: None,
            done: false,
        }
    }

    fn show_page(&self, scope: &mut Scope<'_>) {
        let Some(content) = self.pages.get(self.page) else {
            return;
        };
        if let Some(text) = self.text {
            let width = text_width(content, PAGE_SCALE);
            let x = ((SCREEN.x - width) / 2.0).max(8.0).floor();
            let tree = scope.tree_mut();
            tree.set_text(text, content);
            tree.set_position(text, Vec2::new(x, 70.0));
        }
        if let Some(counter) = self.counter {
            let label = format!("{}/{}  Enter to continue", self.page + 1, self.pages.len());
            scope.tree_mut().set_text(counter, &label);
        }
    }

    fn leave(&mut self, scope: &mut Scope<'_>) {
        self.done = true;
        let behavior: Box<dyn StateBehavior> = match self.next {
            CutsceneNext::Town => Box::new(TownMenu::new()),
            CutsceneNext::Field => Box::new(Field::new()),
        };
        info!(next = ?self.next, pages = self.pages.len(), "cutscene_finished");
        let next = scope.spawn_state(behavior);
        scope.set_state(next, TransitionOptions::default());
    }
}

impl StateBehavior for Cutscene {
    fn name(&self) -> &'static str {
        "cutscene"
    }

    fn cursor(&self) -> Cursor {
        Cursor::Pointer
    }

    fn enter(&mut self, scope: &mut Scope<'_>) {
        add_backdrop(scope, BACKDROP);
        let root = scope.root();
        self.text = add_text(scope, root, "", Vec2::new(8.0, 70.0), TEXT_COLOR, PAGE_SCALE);
        self.counter = add_text(
            scope,
            root,
            "",
            Vec2::new(8.0, SCREEN.y - 14.0),
            MUTED_TEXT,
            1,
        );
        self.show_page(scope);
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        if self.done {
            return;
        }
        if self.page >= self.pages.len() {
            self.leave(scope);
            return;
        }
        let input = scope.input();
        let advance = input.any_key_pressed(&ADVANCE_KEYS)
            || input.pointer_pressed(PointerButton::Left);
        if !advance {
            return;
        }
        self.page += 1;
        debug!(page = self.page, "cutscene_advanced");
        if self.page >= self.pages.len() {
            self.leave(scope);
        } else {
            self.show_page(scope);
        }
    }
}
