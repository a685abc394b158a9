use getopts::{Matches, Options};
use statler::DEFAULT_BIND_ADDRESS;
use thiserror::Error;

pub const ENV_BIND_ADDRESS: &str = "STATLER_BIND_ADDRESS";
pub const ENV_STATHAT_API_KEY: &str = "STATLER_STATHAT_API_KEY";
pub const ENV_READERS: &str = "STATLER_READERS";

/// Errors that could occur while parsing the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Args(#[from] getopts::Fail),

    #[error("unknown command '{0}' (expected 'serve')")]
    UnknownCommand(String),

    #[error("invalid reader count '{0}'")]
    InvalidReaders(String),
}

/// What the server was asked to do.
#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Serve(Config),
}

/// Collector daemon configuration.
#[derive(Debug, PartialEq)]
pub struct Config {
    pub bind_address: String,
    pub stathat_api_key: Option<String>,
    pub readers: Option<usize>,
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt(
        "b",
        "bind-address",
        &format!("bind address for metrics collection [env: {}]", ENV_BIND_ADDRESS),
        "HOST:PORT",
    );
    opts.optopt(
        "k",
        "stathat-api-key",
        &format!("stathat api key for relay [env: {}]", ENV_STATHAT_API_KEY),
        "KEY",
    );
    opts.optopt(
        "r",
        "readers",
        &format!("number of reader threads, defaults to one per core [env: {}]", ENV_READERS),
        "INTEGER",
    );
    opts.optflag("h", "help", "print this help menu");

    opts
}

pub fn usage(program: &str, opts: &Options) -> String {
    let brief = format!("Usage: {} [serve] [options]\n\nCollect and relay stats.", program);
    opts.usage(&brief)
}

impl Command {
    /// Parses the command line, falling back to the environment for anything not given as a flag.
    ///
    /// `env` looks up an environment variable by name.
    pub fn parse<E>(opts: &Options, args: &[String], env: E) -> Result<Command, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let matches = opts.parse(args)?;
        if matches.opt_present("help") {
            return Ok(Command::Help);
        }

        match matches.free.first().map(String::as_str) {
            None | Some("serve") => {}
            Some(other) => return Err(ConfigError::UnknownCommand(other.to_owned())),
        }

        let setting = |name: &str, var: &str| lookup(&matches, name, || env(var));

        let bind_address = setting("bind-address", ENV_BIND_ADDRESS)
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned());
        let stathat_api_key = setting("stathat-api-key", ENV_STATHAT_API_KEY);
        let readers = setting("readers", ENV_READERS)
            .map(|readers| match readers.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ConfigError::InvalidReaders(readers)),
            })
            .transpose()?;

        Ok(Command::Serve(Config { bind_address, stathat_api_key, readers }))
    }
}

fn lookup<F>(matches: &Matches, name: &str, fallback: F) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    matches.opt_str(name).or_else(fallback).filter(|value| !value.is_empty())
}
