//! Top-level argument routing.
//!
//! Three input shapes share one command line: the fixed subcommand
//! vocabulary, the informal `<unit> [action]` shorthand, and the default
//! bare-path start. Routing is an ordered list of classifier predicates over
//! the raw token list; each either produces a route or passes to the next.
//! The order is load-bearing: unit-shorthand wins over vocabulary, vocabulary
//! wins over bare-path, so `ps` is always the listing subcommand while `./ps`
//! is always a start target.

use tracing::debug;

use crate::slug::looks_like_unit_name;

/// Fixed subcommand vocabulary.
pub const SUBCOMMANDS: &[&str] = &[
    "ps",
    "status",
    "pid",
    "logs",
    "restart",
    "stop",
    "rm",
    "restart-all",
    "stop-all",
    "rm-all",
    "doctor",
    "dash",
    "version",
    "help",
];

/// Actions accepted after a unit name in shorthand form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    ShowLogs,
    FollowLogs,
    ShowPid,
    Restart,
    Stop,
    Remove,
    ShowStatus,
}

impl UnitAction {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "logs" => Some(Self::ShowLogs),
            "follow" => Some(Self::FollowLogs),
            "pid" => Some(Self::ShowPid),
            "restart" => Some(Self::Restart),
            "stop" => Some(Self::Stop),
            "rm" => Some(Self::Remove),
            "status" => Some(Self::ShowStatus),
            _ => None,
        }
    }

    /// The equivalent structured-subcommand token list for this action on
    /// `unit`, with `rest` appended as the subcommand's own arguments.
    fn as_subcommand(self, unit: &str, rest: &[String]) -> Vec<String> {
        let (name, flag) = match self {
            Self::ShowLogs => ("logs", None),
            Self::FollowLogs => ("logs", Some("-f")),
            Self::ShowPid => ("pid", None),
            Self::Restart => ("restart", None),
            Self::Stop => ("stop", None),
            Self::Remove => ("rm", None),
            Self::ShowStatus => ("status", None),
        };
        let mut tokens = vec![name.to_string(), unit.to_string()];
        tokens.extend(flag.map(str::to_string));
        tokens.extend_from_slice(rest);
        tokens
    }
}

/// Where a raw argument list is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Print the version and exit without touching the RPC layer.
    Version,
    /// `<unit> [action]` shorthand; action defaults to showing logs.
    Shorthand { unit: String, action: UnitAction },
    /// An exact vocabulary subcommand; tokens go to the structured parser.
    Subcommand(Vec<String>),
    /// Default invocation: start the given path as a new service.
    StartPath(String),
    /// Flags, help, or anything else the structured parser should handle.
    Fallthrough(Vec<String>),
}

type Classifier = fn(&[String]) -> Option<Route>;

/// Classifies the raw argument list into a [`Route`].
pub fn classify(args: &[String]) -> Route {
    const CLASSIFIERS: &[Classifier] = &[
        version_flag,
        unit_shorthand,
        vocabulary,
        bare_path,
    ];
    for classifier in CLASSIFIERS {
        if let Some(route) = classifier(args) {
            debug!(?route, "classified invocation");
            return route;
        }
    }
    Route::Fallthrough(args.to_vec())
}

fn version_flag(args: &[String]) -> Option<Route> {
    match args.first().map(String::as_str) {
        Some("--version" | "-V") => Some(Route::Version),
        _ => None,
    }
}

fn unit_shorthand(args: &[String]) -> Option<Route> {
    let first = args.first()?;
    if !looks_like_unit_name(first) {
        return None;
    }
    match args.get(1) {
        None => Some(Route::Shorthand {
            unit: first.clone(),
            action: UnitAction::ShowLogs,
        }),
        Some(second) => match UnitAction::parse(second) {
            // Extra tokens after the action are real arguments (`-f`,
            // `-n 10`); rewrite into the equivalent structured subcommand so
            // they reach its parser instead of being dropped.
            Some(action) if args.len() > 2 => Some(Route::Subcommand(
                action.as_subcommand(first, &args[2..]),
            )),
            Some(action) => Some(Route::Shorthand {
                unit: first.clone(),
                action,
            }),
            // Unknown action: let the vocabulary dispatcher produce its
            // standard unknown-command behavior instead of erroring here.
            None => Some(Route::Fallthrough(args.to_vec())),
        },
    }
}

fn vocabulary(args: &[String]) -> Option<Route> {
    let first = args.first()?;
    if SUBCOMMANDS.contains(&first.as_str()) {
        return Some(Route::Subcommand(args.to_vec()));
    }
    None
}

fn bare_path(args: &[String]) -> Option<Route> {
    let first = args.first()?;
    if first.starts_with('-') {
        return None;
    }
    Some(Route::StartPath(first.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn version_flag_short_circuits() {
        assert_eq!(classify(&argv(&["--version"])), Route::Version);
        assert_eq!(classify(&argv(&["-V", "ps"])), Route::Version);
    }

    #[test]
    fn vocabulary_word_is_never_a_path() {
        assert_eq!(
            classify(&argv(&["ps"])),
            Route::Subcommand(argv(&["ps"]))
        );
        assert_eq!(
            classify(&argv(&["logs", "foo", "-f"])),
            Route::Subcommand(argv(&["logs", "foo", "-f"]))
        );
    }

    #[test]
    fn path_like_token_is_a_start_target() {
        assert_eq!(
            classify(&argv(&["./ps"])),
            Route::StartPath("./ps".to_string())
        );
        assert_eq!(
            classify(&argv(&["app.py"])),
            Route::StartPath("app.py".to_string())
        );
    }

    #[test]
    fn unit_shorthand_with_and_without_action() {
        assert_eq!(
            classify(&argv(&["ww-foo.service", "restart"])),
            Route::Shorthand {
                unit: "ww-foo.service".to_string(),
                action: UnitAction::Restart,
            }
        );
        assert_eq!(
            classify(&argv(&["ww-foo"])),
            Route::Shorthand {
                unit: "ww-foo".to_string(),
                action: UnitAction::ShowLogs,
            }
        );
    }

    #[test]
    fn unit_shorthand_beats_vocabulary() {
        // "ww-logs.service logs" is shorthand on the unit, not the logs
        // subcommand.
        assert_eq!(
            classify(&argv(&["ww-logs.service", "logs"])),
            Route::Shorthand {
                unit: "ww-logs.service".to_string(),
                action: UnitAction::ShowLogs,
            }
        );
    }

    #[test]
    fn shorthand_trailing_tokens_reach_the_structured_form() {
        assert_eq!(
            classify(&argv(&["ww-foo.service", "logs", "-f"])),
            Route::Subcommand(argv(&["logs", "ww-foo.service", "-f"]))
        );
        assert_eq!(
            classify(&argv(&["ww-foo.service", "logs", "-n", "10"])),
            Route::Subcommand(argv(&["logs", "ww-foo.service", "-n", "10"]))
        );
        // "follow" maps onto the logs subcommand's follow flag.
        assert_eq!(
            classify(&argv(&["ww-foo", "follow", "-a"])),
            Route::Subcommand(argv(&["logs", "ww-foo", "-f", "-a"]))
        );
    }

    #[test]
    fn unknown_action_falls_through_to_vocabulary_dispatch() {
        assert_eq!(
            classify(&argv(&["ww-foo.service", "frobnicate"])),
            Route::Fallthrough(argv(&["ww-foo.service", "frobnicate"]))
        );
    }

    #[test]
    fn flags_fall_through() {
        assert_eq!(
            classify(&argv(&["--help"])),
            Route::Fallthrough(argv(&["--help"]))
        );
        assert_eq!(classify(&[]), Route::Fallthrough(Vec::new()));
    }
}
