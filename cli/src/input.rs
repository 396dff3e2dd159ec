//! Parsing of interactive input lines.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command `/{0}`; type /help")]
    UnknownCommand(String),
    #[error("usage: /{command} <{argument}>")]
    MissingArgument { command: &'static str, argument: &'static str },
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    /// Blank line.
    Nothing,
    Send(String),
    Retry(String),
    Context(String),
    Login(String),
    Logout,
    Reconnect,
    Export,
    Dismiss,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  <text>            ask the tutor
  /retry <id>       resend a failed message
  /context <id>     switch chapter or material
  /login <token>    sign in with an access token
  /logout           sign out and disconnect
  /reconnect        reconnect after the connection gave up
  /export           print the transcript as JSON
  /dismiss          clear the current notice
  /quit             exit";

/// Interpret one line typed by the user. Anything not starting with `/` is
/// a message for the tutor.
///
/// # Errors
///
/// [`InputError`] for an unknown slash command or a missing argument.
pub fn parse_input(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Nothing);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Send(line.to_owned()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let required = |command: &'static str, argument: &'static str| {
        if arg.is_empty() {
            Err(InputError::MissingArgument { command, argument })
        } else {
            Ok(arg.to_owned())
        }
    };

    match name {
        "retry" => required("retry", "message id").map(Input::Retry),
        "context" => required("context", "context id").map(Input::Context),
        "login" => required("login", "token").map(Input::Login),
        "logout" => Ok(Input::Logout),
        "reconnect" => Ok(Input::Reconnect),
        "export" => Ok(Input::Export),
        "dismiss" => Ok(Input::Dismiss),
        "help" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        other => Err(InputError::UnknownCommand(other.to_owned())),
    }
}
