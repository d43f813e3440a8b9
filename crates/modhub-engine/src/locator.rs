//! Plugin locator — finds requested plugins and decides whether this
//! instance must no-op.
//!
//! Specifiers come from two places: the startup arguments and an options
//! string taken from a designated environment variable. The options string
//! is scanned first, matching the host's prepend behavior, so argument
//! flags end up later in the list (later = innermost).

use modhub_core::config::{EngineConfig, StartupOptions};
use tracing::debug;

/// Where this engine instance stands within the requested plugin list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Ordered plugin specifiers with this instance's own filtered out.
    /// First listed = outermost, highest interception precedence.
    pub specifiers: Vec<String>,
    /// Whether every entry point must behave as a pure passthrough.
    pub noop: bool,
}

/// Computes this instance's placement from the startup inputs.
///
/// The instance no-ops when fewer than two plugins were requested, or when
/// it is not the last-listed plugin: a downstream instance (or the host
/// itself) is then responsible for chaining, and composing here as well
/// would double-process every module load.
pub fn locate(config: &EngineConfig, startup: &StartupOptions) -> Placement {
    let mut requested: Vec<String> = Vec::new();
    if let Some(raw) = &startup.options_value {
        collect_plugin_flags(&parse_options_string(raw), config, &mut requested);
    }
    collect_plugin_flags(&startup.exec_args, config, &mut requested);

    let noop = requested.len() < 2
        || !requested.last().map(|s| config.is_self(s)).unwrap_or(false);

    let specifiers: Vec<String> = requested
        .into_iter()
        .filter(|specifier| !config.is_self(specifier))
        .collect();

    debug!(
        requested = specifiers.len(),
        noop, "plugin placement computed"
    );
    Placement { specifiers, noop }
}

/// Scans arguments for plugin flags in their bare (`--loader x`) and
/// inline (`--loader=x`) forms. Malformed occurrences are skipped.
fn collect_plugin_flags(args: &[String], config: &EngineConfig, out: &mut Vec<String>) {
    for (index, arg) in args.iter().enumerate() {
        for flag in &config.plugin_flags {
            if arg == flag {
                if let Some(value) = args.get(index + 1) {
                    out.push(value.clone());
                }
                break;
            }
            if let Some(value) = arg
                .strip_prefix(flag.as_str())
                .and_then(|rest| rest.strip_prefix('='))
            {
                out.push(value.to_string());
                break;
            }
        }
    }
}

/// Splits an options string into arguments with the host's quoting rules:
/// unescaped spaces separate arguments, double quotes suppress splitting,
/// and a backslash escapes the following character while inside quotes.
/// A trailing backslash ends the parse.
pub fn parse_options_string(raw: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut in_string = false;
    let mut starting_new = true;

    let mut chars = raw.chars();
    while let Some(mut ch) = chars.next() {
        if ch == '\\' && in_string {
            match chars.next() {
                Some(escaped) => ch = escaped,
                None => return args,
            }
        } else if ch == ' ' && !in_string {
            starting_new = true;
            continue;
        } else if ch == '"' {
            in_string = !in_string;
            continue;
        }

        if starting_new {
            args.push(String::new());
            starting_new = false;
        }
        if let Some(current) = args.last_mut() {
            current.push(ch);
        }
    }

    args
}
