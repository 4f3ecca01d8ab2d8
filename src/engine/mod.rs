mod actions;
mod activators;
mod conditions;
mod helpers;
mod host;
mod output;
mod scheduler;
mod session;

pub use actions::{
    Action, ActionContext, ActionSet, DEFAULT_FADE_IN, DEFAULT_FADE_OUT, DEFAULT_STAY,
    MenuNavigator, parse_action, parse_actions, run_action_sets,
};
pub use activators::{
    find_by_chat, find_by_command, find_by_item, matches_chat, matches_command, matches_item,
};
pub use conditions::{Comparison, CompositeMode, Condition, Expression, parse_condition};
pub use helpers::{COLOR_CHAR, colorize, fill_template, replace_player, strip_colors};
pub use host::{Host, HostResult, InventoryView, Player, RecordingHost, SoundSpec, TitleSpec};
pub use output::{Output, OutputBlock};
pub use scheduler::{
    InlineScheduler, MainThreadScheduler, PeriodicHandle, RepeatingTask, Scheduler, Task,
};
pub use session::{CLOSE_EVENT, MenuEngine, OPEN_EVENT, OpenDecision, PreOpenHook, ReloadHook};
