use crate::engine::conditions::Condition;
use crate::engine::helpers::{colorize, replace_player};
use crate::engine::host::{Host, Player, SoundSpec, TitleSpec};
use crate::error::{HostError, MenuError};

pub const DEFAULT_FADE_IN: u32 = 10;
pub const DEFAULT_STAY: u32 = 70;
pub const DEFAULT_FADE_OUT: u32 = 20;

/// Menu-level effects an action can ask for. Implemented by the engine so
/// actions never reach for a global menu manager.
pub trait MenuNavigator {
    fn open_by_name(&self, name: &str, player: &Player) -> Result<(), MenuError>;

    /// Close the player's view; `run_close_handlers` is false for force-close.
    fn close_view(&self, player: &Player, run_close_handlers: bool) -> Result<(), HostError>;
}

/// Everything an action may touch while executing.
pub struct ActionContext<'a> {
    pub host: &'a dyn Host,
    pub navigator: &'a dyn MenuNavigator,
    pub player: &'a Player,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Tell(String),
    Sound(SoundSpec),
    Title(TitleSpec),
    ActionBar(String),
    Command { template: String, as_console: bool },
    Close { force: bool },
    OpenMenu(String),
    Stop,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Tell(_) => "tell",
            Action::Sound(_) => "sound",
            Action::Title(_) => "title",
            Action::ActionBar(_) => "actionbar",
            Action::Command {
                as_console: false, ..
            } => "command",
            Action::Command {
                as_console: true, ..
            } => "console",
            Action::Close { force: false } => "close",
            Action::Close { force: true } => "force-close",
            Action::OpenMenu(_) => "open",
            Action::Stop => "return",
        }
    }

    /// Run the action. `true` continues the chain, `false` halts it.
    /// Host failures are logged and halt the chain.
    pub fn execute(&self, ctx: &ActionContext<'_>) -> bool {
        log::debug!("Executing action: {}", self.kind());
        match self.run(ctx) {
            Ok(proceed) => proceed,
            Err(e) => {
                log::error!(
                    "Action '{}' failed for player {}: {}",
                    self.kind(),
                    ctx.player.name,
                    e
                );
                false
            }
        }
    }

    fn run(&self, ctx: &ActionContext<'_>) -> Result<bool, HostError> {
        let host = ctx.host;
        let player = ctx.player;

        match self {
            Action::Tell(message) => {
                host.send_message(player, &render_text(host, player, message))?;
                Ok(true)
            }
            Action::Sound(sound) => {
                host.play_sound(player, sound)?;
                Ok(true)
            }
            Action::Title(spec) => {
                let rendered = TitleSpec {
                    title: render_text(host, player, &spec.title),
                    subtitle: render_text(host, player, &spec.subtitle),
                    ..spec.clone()
                };
                host.send_title(player, &rendered)?;
                Ok(true)
            }
            Action::ActionBar(message) => {
                host.send_action_bar(player, &render_text(host, player, message))?;
                Ok(true)
            }
            Action::Command {
                template,
                as_console,
            } => {
                let command = replace_player(template, &player.name);
                if *as_console {
                    host.dispatch_console_command(&command)?;
                } else {
                    host.perform_command(player, &command)?;
                }
                Ok(true)
            }
            Action::Close { force } => {
                ctx.navigator.close_view(player, !force)?;
                Ok(!force)
            }
            Action::OpenMenu(name) => match ctx.navigator.open_by_name(name, player) {
                Ok(()) => Ok(true),
                Err(MenuError::NotFound(_)) => {
                    log::warn!("Attempted to open non-existent menu: {}", name);
                    Ok(false)
                }
                Err(e) => {
                    log::error!("Failed to open menu '{}': {}", name, e);
                    Ok(false)
                }
            },
            Action::Stop => Ok(false),
        }
    }
}

fn render_text(host: &dyn Host, player: &Player, template: &str) -> String {
    colorize(&host.set_placeholders(player, &replace_player(template, &player.name)))
}

/// Parse `type:value` into an action. Unknown types log a warning and
/// yield `None`; callers drop the entry.
pub fn parse_action(raw: &str) -> Option<Action> {
    let (kind, value) = match raw.split_once(':') {
        Some((k, v)) => (k.trim().to_lowercase(), v.trim()),
        None => (raw.trim().to_lowercase(), ""),
    };

    match kind.as_str() {
        "tell" => Some(Action::Tell(value.to_string())),
        "sound" => parse_sound(value).map(Action::Sound),
        "title" => Some(Action::Title(parse_title(value))),
        "actionbar" => Some(Action::ActionBar(value.to_string())),
        "command" => Some(Action::Command {
            template: value.trim_start_matches('/').to_string(),
            as_console: false,
        }),
        "console" => Some(Action::Command {
            template: value.trim_start_matches('/').to_string(),
            as_console: true,
        }),
        "close" => Some(Action::Close { force: false }),
        "force-close" => Some(Action::Close { force: true }),
        "open" => {
            if value.is_empty() {
                log::warn!("open action without a menu name");
                None
            } else {
                Some(Action::OpenMenu(value.to_string()))
            }
        }
        "return" => Some(Action::Stop),
        _ => {
            log::warn!("Unknown action type: {}", kind);
            None
        }
    }
}

/// Parse a list of action strings, dropping entries that fail.
pub fn parse_actions<S: AsRef<str>>(raw: &[S]) -> Vec<Action> {
    raw.iter()
        .filter_map(|s| parse_action(s.as_ref()))
        .collect()
}

/// `SOUND_ID-volume-pitch`; volume and pitch default to 1.0.
fn parse_sound(value: &str) -> Option<SoundSpec> {
    let mut parts = value.split('-');
    let id = parts.next().unwrap_or("").trim().to_uppercase();
    if id.is_empty() {
        log::warn!("sound action without a sound id");
        return None;
    }

    let mut next_float = |what: &str| -> f32 {
        match parts.next().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse().unwrap_or_else(|_| {
                log::warn!("Invalid sound {} '{}' for {}, using 1.0", what, raw, id);
                1.0
            }),
            _ => 1.0,
        }
    };
    let volume = next_float("volume");
    let pitch = next_float("pitch");

    Some(SoundSpec { id, volume, pitch })
}

/// ``title`subtitle`fadeIn stay fadeOut``; missing parts take defaults.
fn parse_title(value: &str) -> TitleSpec {
    let parts: Vec<&str> = value.split('`').collect();
    let title = parts.first().map(|s| s.trim()).unwrap_or("").to_string();
    let subtitle = parts.get(1).map(|s| s.trim()).unwrap_or("").to_string();

    let times: Vec<Option<u32>> = parts
        .get(2)
        .map(|t| {
            t.split_whitespace()
                .map(|n| {
                    let ticks = n.parse().ok();
                    if ticks.is_none() {
                        log::warn!("Invalid title timing '{}', using default", n);
                    }
                    ticks
                })
                .collect()
        })
        .unwrap_or_default();
    let time_at = |i: usize, default: u32| times.get(i).copied().flatten().unwrap_or(default);

    TitleSpec {
        title,
        subtitle,
        fade_in: time_at(0, DEFAULT_FADE_IN),
        stay: time_at(1, DEFAULT_STAY),
        fade_out: time_at(2, DEFAULT_FADE_OUT),
    }
}

/// A condition with the actions to run when it holds and when it doesn't.
/// Also used for menu open/close event handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSet {
    pub condition: Option<Condition>,
    pub actions: Vec<Action>,
    pub deny_actions: Vec<Action>,
}

impl ActionSet {
    /// Conditionless set around a single action.
    pub fn single(action: Action) -> Self {
        ActionSet {
            condition: None,
            actions: vec![action],
            deny_actions: Vec::new(),
        }
    }

    /// Returns false as soon as any executed action halts.
    /// A failed condition with no deny actions falls through (true).
    pub fn run(&self, ctx: &ActionContext<'_>) -> bool {
        let allowed = match &self.condition {
            None => true,
            Some(cond) => cond.check(ctx.host, ctx.player),
        };

        if allowed {
            log::debug!("Condition met or no condition, executing actions");
            run_chain(&self.actions, ctx)
        } else if !self.deny_actions.is_empty() {
            log::debug!("Condition not met, executing deny actions");
            run_chain(&self.deny_actions, ctx)
        } else {
            true
        }
    }
}

fn run_chain(actions: &[Action], ctx: &ActionContext<'_>) -> bool {
    for action in actions {
        if !action.execute(ctx) {
            log::debug!("Action '{}' returned false, stopping execution", action.kind());
            return false;
        }
    }
    true
}

/// Evaluate sets in declaration order; stops at the first halt.
pub fn run_action_sets(sets: &[ActionSet], ctx: &ActionContext<'_>) -> bool {
    sets.iter().all(|set| set.run(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::host::RecordingHost;
    use crate::engine::output::OutputBlock;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeNavigator {
        known: Vec<String>,
        opened: Mutex<Vec<String>>,
        closes: Mutex<Vec<bool>>,
    }

    impl MenuNavigator for FakeNavigator {
        fn open_by_name(&self, name: &str, _player: &Player) -> Result<(), MenuError> {
            if self.known.iter().any(|k| k == name) {
                self.opened.lock().push(name.to_string());
                Ok(())
            } else {
                Err(MenuError::NotFound(name.to_string()))
            }
        }

        fn close_view(&self, _player: &Player, run_close_handlers: bool) -> Result<(), HostError> {
            self.closes.lock().push(run_close_handlers);
            Ok(())
        }
    }

    fn ctx<'a>(host: &'a RecordingHost, nav: &'a FakeNavigator, p: &'a Player) -> ActionContext<'a> {
        ActionContext {
            host,
            navigator: nav,
            player: p,
        }
    }

    #[test]
    fn parses_every_known_type() {
        assert_eq!(parse_action("tell:&ahi"), Some(Action::Tell("&ahi".into())));
        assert_eq!(parse_action("ActionBar: hey"), Some(Action::ActionBar("hey".into())));
        assert_eq!(
            parse_action("console: give %player% diamond"),
            Some(Action::Command {
                template: "give %player% diamond".into(),
                as_console: true,
            })
        );
        assert_eq!(
            parse_action("command:/spawn"),
            Some(Action::Command {
                template: "spawn".into(),
                as_console: false,
            })
        );
        assert_eq!(parse_action("close"), Some(Action::Close { force: false }));
        assert_eq!(parse_action("close:"), Some(Action::Close { force: false }));
        assert_eq!(parse_action("force-close:"), Some(Action::Close { force: true }));
        assert_eq!(parse_action("open:shop"), Some(Action::OpenMenu("shop".into())));
        assert_eq!(parse_action("return"), Some(Action::Stop));
    }

    #[test]
    fn unknown_action_type_is_none() {
        assert_eq!(parse_action("teleport:spawn"), None);
        assert_eq!(parse_action("open:"), None);
    }

    #[test]
    fn sound_value_grammar() {
        assert_eq!(
            parse_action("sound:entity_player_levelup-0.5-2"),
            Some(Action::Sound(SoundSpec {
                id: "ENTITY_PLAYER_LEVELUP".into(),
                volume: 0.5,
                pitch: 2.0,
            }))
        );
        assert_eq!(
            parse_action("sound:UI_BUTTON_CLICK"),
            Some(Action::Sound(SoundSpec {
                id: "UI_BUTTON_CLICK".into(),
                volume: 1.0,
                pitch: 1.0,
            }))
        );
        assert_eq!(parse_action("sound:"), None);
    }

    #[test]
    fn title_value_grammar() {
        let Some(Action::Title(t)) = parse_action("title:&6Hello`&7World`5 40 10") else {
            panic!("expected title");
        };
        assert_eq!(t.title, "&6Hello");
        assert_eq!(t.subtitle, "&7World");
        assert_eq!((t.fade_in, t.stay, t.fade_out), (5, 40, 10));

        let Some(Action::Title(t)) = parse_action("title:Only") else {
            panic!("expected title");
        };
        assert_eq!(t.subtitle, "");
        assert_eq!(
            (t.fade_in, t.stay, t.fade_out),
            (DEFAULT_FADE_IN, DEFAULT_STAY, DEFAULT_FADE_OUT)
        );
    }

    #[test]
    fn bad_title_timings_keep_their_defaults() {
        let Some(Action::Title(t)) = parse_action("title:A`B`x 50 y") else {
            panic!("expected title");
        };
        assert_eq!((t.fade_in, t.stay, t.fade_out), (10, 50, 20));
    }

    #[test]
    fn stop_always_halts() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");
        host.grant(&p, "everything");

        assert!(!Action::Stop.execute(&ctx(&host, &nav, &p)));
        assert!(host.take_output(&p).is_empty());
    }

    #[test]
    fn force_close_halts_plain_close_continues() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");
        let c = ctx(&host, &nav, &p);

        assert!(Action::Close { force: false }.execute(&c));
        assert!(!Action::Close { force: true }.execute(&c));
        assert_eq!(*nav.closes.lock(), vec![true, false]);
    }

    #[test]
    fn open_unknown_menu_halts() {
        let host = RecordingHost::default();
        let nav = FakeNavigator {
            known: vec!["main".into()],
            ..Default::default()
        };
        let p = Player::named("Steve");
        let c = ctx(&host, &nav, &p);

        assert!(!Action::OpenMenu("shop".into()).execute(&c));
        assert!(Action::OpenMenu("main".into()).execute(&c));
        assert_eq!(*nav.opened.lock(), vec!["main".to_string()]);
    }

    #[test]
    fn commands_substitute_player_name() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");
        let c = ctx(&host, &nav, &p);

        parse_action("console:give %player% bread").unwrap().execute(&c);
        parse_action("command:msg %player% hi").unwrap().execute(&c);

        assert_eq!(
            host.take_console_output().blocks,
            vec![OutputBlock::ConsoleCommand("give Steve bread".into())]
        );
        assert_eq!(
            host.take_output(&p).blocks,
            vec![OutputBlock::Command("msg Steve hi".into())]
        );
    }

    #[test]
    fn host_failure_halts_chain() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");
        host.fail_call("send_message");

        let set = ActionSet {
            condition: None,
            actions: parse_actions(&["tell:one", "sound:UI_BUTTON_CLICK"]),
            deny_actions: vec![],
        };
        assert!(!set.run(&ctx(&host, &nav, &p)));
        assert!(host.take_output(&p).is_empty());
    }

    #[test]
    fn false_condition_without_deny_falls_through() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");

        let sets = vec![
            ActionSet {
                condition: Some(Condition::Permission("vip".into())),
                actions: parse_actions(&["tell:vip"]),
                deny_actions: vec![],
            },
            ActionSet::single(Action::Tell("after".into())),
        ];

        assert!(run_action_sets(&sets, &ctx(&host, &nav, &p)));
        assert_eq!(host.take_output(&p).texts(), vec!["after"]);
    }

    #[test]
    fn halt_stops_later_sets() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");

        let sets = vec![
            ActionSet {
                condition: None,
                actions: parse_actions(&["tell:first", "return", "tell:never"]),
                deny_actions: vec![],
            },
            ActionSet::single(Action::Tell("also never".into())),
        ];

        assert!(!run_action_sets(&sets, &ctx(&host, &nav, &p)));
        assert_eq!(host.take_output(&p).texts(), vec!["first"]);
    }

    #[test]
    fn unknown_entry_is_dropped_and_rest_runs() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");

        let set = ActionSet {
            condition: None,
            actions: parse_actions(&["tell:a", "teleport:spawn", "tell:b"]),
            deny_actions: vec![],
        };
        assert_eq!(set.actions.len(), 2);
        assert!(set.run(&ctx(&host, &nav, &p)));
        assert_eq!(host.take_output(&p).texts(), vec!["a", "b"]);
    }

    #[test]
    fn tell_is_colorized() {
        let host = RecordingHost::default();
        let nav = FakeNavigator::default();
        let p = Player::named("Steve");

        Action::Tell("&aHi %player%".into()).execute(&ctx(&host, &nav, &p));
        assert_eq!(host.take_output(&p).texts(), vec!["§aHi Steve"]);
    }
}
