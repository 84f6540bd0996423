use bubble_engine::app::display::NodeId;
use bubble_engine::app::ui::{Button, ButtonPalette, Frame, ScrollField, UiCore};
use bubble_engine::app::{
    MenuCore, Rect, Rgba, Scope, StateBehavior, StateFactory, TabMenuCore, TabSpec,
    TransitionOptions, Vec2,
};
use bubble_engine::content::{Upgrade, UpgradeCategory};
use tracing::{error, info, warn};

use super::{
    add_backdrop, add_object, add_text, Field, ACCENT_TEXT, MUTED_TEXT, SCREEN, TEXT_COLOR,
};
use crate::app::session::GameSession;

const BACKDROP: Rgba = [34, 30, 44, 255];
const TAB_BAR: Rect = Rect::new(8.0, 6.0, 464.0, 20.0);
const TOWN_TAB: usize = 0;
const SMITH_TAB: usize = 1;
const WIZARD_TAB: usize = 2;
const TOWN_TABS: [TabSpec; 3] = [
    TabSpec {
        label: "Town",
        factory: open_town,
    },
    TabSpec {
        label: "Smith",
        factory: open_smith,
    },
    TabSpec {
        label: "Wizard",
        factory: open_wizard,
    },
];

const LIST_ORIGIN: Vec2 = Vec2::new(8.0, 54.0);
const LIST_SIZE: Vec2 = Vec2::new(464.0, 208.0);
const LIST_BACKGROUND: Rgba = [0, 0, 0, 90];
const ROW_HEIGHT: f32 = 34.0;
const ROW_BUTTON: Vec2 = Vec2::new(96.0, 18.0);
const EQUIP_PALETTE: ButtonPalette = ButtonPalette {
    up: [60, 110, 70, 255],
    hover: [80, 140, 90, 255],
    down: [40, 80, 50, 255],
    disabled: [70, 70, 76, 255],
    text: [240, 240, 240, 255],
};

fn open_town() -> Box<dyn StateBehavior> {
    Box::new(TownMenu::new())
}

fn open_smith() -> Box<dyn StateBehavior> {
    Box::new(ShopMenu::new(Shop::Smith))
}

fn open_wizard() -> Box<dyn StateBehavior> {
    Box::new(ShopMenu::new(Shop::Wizard))
}

fn tab_core(active: usize) -> Option<TabMenuCore> {
    match TabMenuCore::new(MenuCore::without_hotkeys(), TOWN_TABS.to_vec(), active, TAB_BAR) {
        Ok(core) => Some(core),
        Err(error) => {
            error!(active, error = %error, "town_tabs_rejected");
            None
        }
    }
}

/// Replaces the current tab with a fresh copy so it redraws from the session.
fn reopen(scope: &mut Scope<'_>, factory: StateFactory) {
    let fresh = scope.spawn_sibling(factory());
    scope.set_state(fresh, TransitionOptions::default());
}

/// Day overview and the way back out to the field.
pub(crate) struct TownMenu {
    tabs: Option<TabMenuCore>,
}

impl TownMenu {
    pub(crate) fn new() -> Self {
        Self {
            tabs: tab_core(TOWN_TAB),
        }
    }
}

impl StateBehavior for TownMenu {
    fn name(&self) -> &'static str {
        "town_menu"
    }

    fn enter(&mut self, scope: &mut Scope<'_>) {
        add_backdrop(scope, BACKDROP);
        if let Some(tabs) = &self.tabs {
            tabs.enter(scope);
        }

        let lines = match scope.resource::<GameSession>() {
            Some(session) => {
                session.save();
                overview_lines(session)
            }
            None => {
                error!(state = "town_menu", "game_session_missing");
                Vec::new()
            }
        };
        let root = scope.root();
        let mut y = 36.0;
        for (index, line) in lines.iter().enumerate() {
            let (color, scale) = if index == 0 {
                (ACCENT_TEXT, 2)
            } else {
                (TEXT_COLOR, 1)
            };
            add_text(scope, root, line.as_str(), Vec2::new(16.0, y), color, scale);
            y += if index == 0 { 18.0 } else { 10.0 };
        }

        let start = UiCore::new(
            scope.tree_mut(),
            Vec2::new(SCREEN.x - 128.0, SCREEN.y - 32.0),
            Vec2::new(112.0, 22.0),
        );
        let start = Button::new(start, "Start day").on_release(|scope| {
            info!("day_started");
            let field = scope.spawn_state(Box::new(Field::new()));
            scope.set_state(field, TransitionOptions::default());
        });
        add_object(scope, Box::new(start));
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        if let Some(tabs) = &self.tabs {
            tabs.update(scope);
        }
    }
}

fn overview_lines(session: &GameSession) -> Vec<String> {
    let mut lines = vec![
        format!("{}  Day {}", session.hero_name, session.day),
        format!("Gold {}  Exp {}", session.wallet.gold, session.wallet.exp),
        format!(
            "Weapon {}",
            session
                .upgrades
                .equipped_weapon()
                .map(|weapon| weapon.name.as_str())
                .unwrap_or("none")
        ),
        String::new(),
    ];
    match session.quests.current() {
        Some(quest) => {
            lines.push(format!("Quest: {}", quest.name));
            if !quest.description.is_empty() {
                lines.push(quest.description.clone());
            }
            lines.extend(
                quest
                    .status_lines(&session.quest_progress)
                    .into_iter()
                    .map(|line| format!("  {line}")),
            );
        }
        None => lines.push("Every quest is done. The bubbles keep coming.".to_string()),
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shop {
    Smith,
    Wizard,
}

impl Shop {
    fn categories(self) -> &'static [UpgradeCategory] {
        match self {
            Shop::Smith => &[UpgradeCategory::Weapons, UpgradeCategory::Perks],
            Shop::Wizard => &[UpgradeCategory::Elements],
        }
    }

    fn tab(self) -> usize {
        match self {
            Shop::Smith => SMITH_TAB,
            Shop::Wizard => WIZARD_TAB,
        }
    }

    fn factory(self) -> StateFactory {
        match self {
            Shop::Smith => open_smith,
            Shop::Wizard => open_wizard,
        }
    }

    fn greeting(self) -> &'static str {
        match self {
            Shop::Smith => "The smith sells weapons and perks for gold.",
            Shop::Wizard => "The wizard teaches elements for experience.",
        }
    }
}

/// One row of a shop list, snapshotted from the session when the tab opens.
#[derive(Debug, Clone, PartialEq)]
struct ShopRow {
    id: String,
    title: String,
    detail: String,
    action: RowAction,
}

#[derive(Debug, Clone, PartialEq)]
enum RowAction {
    Buy { label: String, affordable: bool },
    Equip,
    Equipped,
    Maxed,
    Locked,
}

fn shop_rows(session: &GameSession, shop: Shop) -> Vec<ShopRow> {
    shop.categories()
        .iter()
        .flat_map(|category| session.upgrades.in_category(*category))
        .map(|upgrade| ShopRow {
            id: upgrade.id.clone(),
            title: format!(
                "{}  Lv {}/{}",
                upgrade.name,
                upgrade.level(),
                upgrade.max_level()
            ),
            detail: upgrade.description.clone(),
            action: row_action(session, upgrade),
        })
        .collect()
}

fn row_action(session: &GameSession, upgrade: &Upgrade) -> RowAction {
    if !upgrade.is_unlocked() {
        return RowAction::Locked;
    }
    if let Some(cost) = upgrade.next_cost() {
        return RowAction::Buy {
            label: format!("Buy {cost}"),
            affordable: session.wallet.can_afford(&cost),
        };
    }
    match upgrade.category {
        UpgradeCategory::Weapons if upgrade.is_enabled() => RowAction::Equipped,
        UpgradeCategory::Weapons => RowAction::Equip,
        _ => RowAction::Maxed,
    }
}

/// Smith and wizard tabs: a scrolling list of upgrades with buy and equip buttons.
pub(crate) struct ShopMenu {
    shop: Shop,
    tabs: Option<TabMenuCore>,
}

impl ShopMenu {
    pub(crate) fn new(shop: Shop) -> Self {
        Self {
            shop,
            tabs: tab_core(shop.tab()),
        }
    }

    fn add_row(&self, scope: &mut Scope<'_>, content: NodeId, index: usize, row: &ShopRow) {
        let y = index as f32 * ROW_HEIGHT;
        add_text(scope, content, row.title.as_str(), Vec2::new(4.0, y + 4.0), TEXT_COLOR, 1);
        add_text(scope, content, row.detail.as_str(), Vec2::new(4.0, y + 16.0), MUTED_TEXT, 1);

        let position = Vec2::new(LIST_SIZE.x - ROW_BUTTON.x - 12.0, y + 6.0);
        let ui = UiCore::new(scope.tree_mut(), position, ROW_BUTTON).with_parent(content);
        let factory = self.shop.factory();
        let id = row.id.clone();
        let button = match &row.action {
            RowAction::Buy { label, affordable } => {
                let mut button = Button::new(ui, label.as_str())
                    .with_text_scale(1)
                    .on_release(move |scope| buy(scope, &id, factory));
                button.set_disabled(!affordable);
                button
            }
            RowAction::Equip => Button::new(ui, "Equip")
                .with_text_scale(1)
                .with_palette(EQUIP_PALETTE)
                .on_release(move |scope| equip(scope, &id, factory)),
            RowAction::Equipped | RowAction::Maxed | RowAction::Locked => {
                let label = match row.action {
                    RowAction::Equipped => "Equipped",
                    RowAction::Maxed => "Maxed",
                    _ => "Locked",
                };
                let mut button = Button::new(ui, label).with_text_scale(1);
                button.set_disabled(true);
                button
            }
        };
        add_object(scope, Box::new(button));
    }
}

impl StateBehavior for ShopMenu {
    fn name(&self) -> &'static str {
        match self.shop {
            Shop::Smith => "smith_menu",
            Shop::Wizard => "wizard_menu",
        }
    }

    fn enter(&mut self, scope: &mut Scope<'_>) {
        add_backdrop(scope, BACKDROP);
        if let Some(tabs) = &self.tabs {
            tabs.enter(scope);
        }
        let Some(session) = scope.resource::<GameSession>() else {
            error!(state = self.name(), "game_session_missing");
            return;
        };
        let rows = shop_rows(session, self.shop);
        let wallet = format!("Gold {}  Exp {}", session.wallet.gold, session.wallet.exp);

        let root = scope.root();
        add_text(scope, root, self.shop.greeting(), Vec2::new(12.0, 32.0), TEXT_COLOR, 1);
        add_text(scope, root, wallet, Vec2::new(12.0, 42.0), ACCENT_TEXT, 1);

        let list =
            Frame::new(scope.tree_mut(), LIST_ORIGIN, LIST_SIZE).with_background(LIST_BACKGROUND);
        let body = list.body();
        add_object(scope, Box::new(list));
        let scroll = ScrollField::new(scope.tree_mut(), Vec2::ZERO, LIST_SIZE).with_parent(body);
        let content = scroll.content();
        add_object(scope, Box::new(scroll));

        for (index, row) in rows.iter().enumerate() {
            self.add_row(scope, content, index, row);
        }
        info!(shop = ?self.shop, rows = rows.len(), "shop_opened");
    }

    fn update(&mut self, scope: &mut Scope<'_>, _delta: f32) {
        if let Some(tabs) = &self.tabs {
            tabs.update(scope);
        }
    }
}

fn buy(scope: &mut Scope<'_>, id: &str, factory: StateFactory) {
    let Some(session) = scope.resource_mut::<GameSession>() else {
        return;
    };
    match session.upgrades.purchase(id, &mut session.wallet) {
        Ok(level) => {
            info!(upgrade = id, level, "shop_purchase");
            session.save();
            reopen(scope, factory);
        }
        Err(error) => warn!(upgrade = id, error = %error, "shop_purchase_rejected"),
    }
}

fn equip(scope: &mut Scope<'_>, id: &str, factory: StateFactory) {
    let Some(session) = scope.resource_mut::<GameSession>() else {
        return;
    };
    match session.upgrades.equip(id) {
        Ok(()) => {
            session.save();
            reopen(scope, factory);
        }
        Err(error) => warn!(upgrade = id, error = %error, "shop_equip_rejected"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bubble_engine::app::{InputEvent, Key, PointerButton};
    use bubble_engine::content::Wallet;
    use bubble_engine::Engine;

    use super::*;
    use crate::app::session::tests::session;

    const STEP: f32 = 1.0 / 60.0;

    fn engine_with(initial: Box<dyn StateBehavior>, wallet: Wallet) -> Engine {
        let mut engine = Engine::new(initial, Duration::from_millis(250));
        let mut session = session();
        session.hero_name = "Pip".to_string();
        session.wallet = wallet;
        engine.services_mut().resources.insert(session);
        engine.frame(STEP);
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

    fn click(engine: &mut Engine, at: Vec2) {
        engine.push_input(InputEvent::PointerMoved(at));
        engine.frame(STEP);
        engine.push_input(InputEvent::ButtonPressed(PointerButton::Left));
        engine.frame(STEP);
        engine.push_input(InputEvent::ButtonReleased(PointerButton::Left));
        engine.frame(STEP);
        engine.frame(STEP);
    }

    fn row_button_center(index: usize) -> Vec2 {
        Vec2::new(
            LIST_ORIGIN.x + LIST_SIZE.x - ROW_BUTTON.x - 12.0 + ROW_BUTTON.x / 2.0,
            LIST_ORIGIN.y + index as f32 * ROW_HEIGHT + 6.0 + ROW_BUTTON.y / 2.0,
        )
    }

    fn session_of(engine: &Engine) -> &GameSession {
        engine
            .services()
            .resources
            .get::<GameSession>()
            .expect("session")
    }

    #[test]
    fn number_keys_switch_between_town_tabs() {
        let mut engine = engine_with(Box::new(TownMenu::new()), Wallet::default());
        assert_eq!(current_name(&engine), "town_menu");
        let first = engine.machine().current().expect("town");

        tap_key(&mut engine, Key::Character('2'));
        assert_eq!(current_name(&engine), "smith_menu");
        tap_key(&mut engine, Key::Character('3'));
        assert_eq!(current_name(&engine), "wizard_menu");
        tap_key(&mut engine, Key::Character('1'));
        assert_eq!(current_name(&engine), "town_menu");
        assert!(!engine.machine().contains(first));
    }

    #[test]
    fn start_day_button_enters_the_field() {
        let mut engine = engine_with(Box::new(TownMenu::new()), Wallet::default());
        click(&mut engine, Vec2::new(SCREEN.x - 72.0, SCREEN.y - 21.0));
        assert_eq!(current_name(&engine), "field");
    }

    #[test]
    fn smith_rows_follow_the_session() {
        let session = session();
        let rows = shop_rows(&session, Shop::Smith);
        let pin = rows.iter().find(|row| row.id == "pin").expect("pin row");
        assert_eq!(
            pin.action,
            RowAction::Buy {
                label: "Buy 30g".to_string(),
                affordable: false
            }
        );
        let needle = rows.iter().find(|row| row.id == "needle").expect("needle");
        assert_eq!(needle.action, RowAction::Locked);
        assert!(shop_rows(&session, Shop::Wizard)
            .iter()
            .all(|row| session.upgrades.get(&row.id).map(|u| u.category)
                == Some(UpgradeCategory::Elements)));
    }

    #[test]
    fn buying_from_the_list_spends_and_refreshes_the_tab() {
        let mut engine = engine_with(
            Box::new(ShopMenu::new(Shop::Smith)),
            Wallet { gold: 100, exp: 0 },
        );
        let before = engine.machine().current();
        click(&mut engine, row_button_center(0));

        let session = session_of(&engine);
        assert_eq!(session.wallet.gold, 70);
        assert_eq!(session.upgrades.get("pin").map(Upgrade::level), Some(2));
        assert_eq!(current_name(&engine), "smith_menu");
        assert_ne!(engine.machine().current(), before);
    }
}
