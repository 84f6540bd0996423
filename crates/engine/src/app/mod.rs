mod clock;
pub mod display;
mod events;
mod geometry;
#[cfg(test)]
mod harness;
mod input;
mod loop_runner;
mod machine;
mod menu;
mod object;
pub mod rendering;
mod resources;
mod state;
pub mod ui;

pub use clock::{Clock, FrameStats};
pub use display::{DisplayError, DisplayNode, DisplayTree, NodeId, NodeKind, Shape};
pub use events::{EventCallback, EventEmitter, ListenerId, StateEvent};
pub use geometry::{point_in_rect, Rect, Rgba, Vec2};
pub use input::{ExclusionArea, InputEvent, InputPoller, Key, PointerButton};
pub use loop_runner::{run_app, AppError, Engine, LoopConfig, FPS_CAP_ENV_VAR};
pub use machine::{PendingTransition, StateMachine, TransitionOptions};
pub use menu::{MenuCore, StateFactory, TabMenuCore, TabSpec};
pub use object::{AsAny, GameObject, Lifecycle, ObjectCore, ObjectId};
pub use rendering::{NullBackend, RenderBackend, RenderError, Renderer};
pub use resources::Resources;
pub use state::{
    Cursor, LifecycleError, Scope, Services, State, StateBehavior, StateId, StateStatus,
};
