//! Command line splitting
//!
//! `influxin vmstat 1 \; iostat -x 1` supervises two children.

use contracts::Command;

/// Separator token between commands
pub const COMMAND_SEPARATOR: &str = ";";

/// Split trailing arguments into commands
///
/// The first token of each segment is the program name. With `nosplit` the
/// separator is kept as a plain argument of a single command. A separator with
/// no program before it is ignored, so empty segments never produce commands.
pub fn split_commands<I, S>(args: I, nosplit: bool, prefix: Option<&str>) -> Vec<Command>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let make = |name: String| Command::new(name).with_prefix(prefix.map(str::to_string));

    let mut commands = Vec::new();
    let mut current: Option<Command> = None;

    for arg in args {
        let arg = arg.into();
        let is_separator = !nosplit && arg == COMMAND_SEPARATOR;
        match current.as_mut() {
            None if is_separator => {}
            None => current = Some(make(arg)),
            Some(_) if is_separator => commands.extend(current.take()),
            Some(command) => command.args.push(arg),
        }
    }
    commands.extend(current);
    commands
}
