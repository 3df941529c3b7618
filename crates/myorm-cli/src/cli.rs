use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "myorm.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Model,
    Schema,
    Init,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Model(ModelRunArgs),
    Schema(SchemaArgs),
    Init(InitArgs),
}

#[derive(Debug, Clone)]
pub struct ModelRunArgs {
    pub config: PathBuf,
    pub connection: Option<String>,
    pub database: Option<String>,
    pub dry_run: bool,
    pub check: bool,
}

#[derive(Debug, Clone)]
pub struct SchemaArgs {
    pub config: PathBuf,
    pub connection: Option<String>,
    pub database: Option<String>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct InitArgs {
    pub config: PathBuf,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "model" => parse_model(it.map(|s| s.as_str())),
        "schema" => parse_schema(it.map(|s| s.as_str())),
        "init" => parse_init(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

/// Options shared by the commands that talk to a database.
#[derive(Debug, Default)]
struct Common {
    config: Option<PathBuf>,
    connection: Option<String>,
    database: Option<String>,
}

impl Common {
    /// Consume `token` if it is a shared option.
    fn accept<'a>(
        &mut self,
        token: &'a str,
        it: &mut impl Iterator<Item = &'a str>,
    ) -> anyhow::Result<bool> {
        if let Some(v) = flag_value("--config", token, it)? {
            self.config = Some(PathBuf::from(v));
        } else if let Some(v) = flag_value("--connection", token, it)? {
            self.connection = Some(v.to_string());
        } else if let Some(v) = flag_value("--database", token, it)? {
            self.database = Some(v.to_string());
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn config(&mut self) -> PathBuf {
        self.config
            .take()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
    }
}

/// `--name value` or `--name=value`.
fn flag_value<'a>(
    name: &str,
    token: &'a str,
    it: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<Option<&'a str>> {
    if token == name {
        let Some(v) = it.next() else {
            anyhow::bail!("{name} requires a value");
        };
        return Ok(Some(v));
    }
    Ok(token
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('=')))
}

fn parse_model<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut common = Common::default();
    let mut dry_run = false;
    let mut check = false;

    while let Some(token) = it.next() {
        if common.accept(token, &mut it)? {
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Model)),
            "--dry-run" => dry_run = true,
            "--check" => check = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    if dry_run && check {
        anyhow::bail!("--dry-run and --check are mutually exclusive");
    }

    Ok(Command::Model(ModelRunArgs {
        config: common.config(),
        connection: common.connection,
        database: common.database,
        dry_run,
        check,
    }))
}

fn parse_schema<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut common = Common::default();
    let mut output: Option<PathBuf> = None;

    while let Some(token) = it.next() {
        if common.accept(token, &mut it)? {
            continue;
        }
        if let Some(v) = flag_value("--output", token, &mut it)? {
            output = Some(PathBuf::from(v));
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Schema)),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(Command::Schema(SchemaArgs {
        config: common.config(),
        connection: common.connection,
        database: common.database,
        output,
    }))
}

fn parse_init<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    while let Some(token) = it.next() {
        if let Some(v) = flag_value("--config", token, &mut it)? {
            config = PathBuf::from(v);
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Init)),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(Command::Init(InitArgs { config }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
myorm - model generator for myorm

USAGE:
  myorm <COMMAND> [OPTIONS]

COMMANDS:
  model         Generate Rust models from a live MySQL schema
  schema        Print the introspected schema as JSON
  init          Write a starter myorm.toml

Run `myorm <command> --help` for more."
            );
        }
        HelpTopic::Model => {
            println!(
                "\
USAGE:
  myorm model [OPTIONS]

NOTES:
  Requires a [models] section in the config file. Files are written to
  <models.out>/c_<connection>/base/; files outside base/ are never touched.

OPTIONS:
  --config <FILE>       Config file path (default: myorm.toml)
  --connection <NAME>   Connection to generate (default: default_connection)
  --database <URL>      Override the connection URL
  --dry-run             Print files that would change
  --check               Exit non-zero if output would change
  -h, --help            Print help"
            );
        }
        HelpTopic::Schema => {
            println!(
                "\
USAGE:
  myorm schema [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: myorm.toml)
  --connection <NAME>   Connection to introspect (default: default_connection)
  --database <URL>      Override the connection URL
  --output <FILE>       Write JSON to a file (default: stdout)
  -h, --help            Print help"
            );
        }
        HelpTopic::Init => {
            println!(
                "\
USAGE:
  myorm init [OPTIONS]

OPTIONS:
  --config <FILE>       Output config path (default: myorm.toml)
  -h, --help            Print help"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        std::iter::once("myorm")
            .chain(items.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_arguments_prints_help() {
        assert!(matches!(
            parse_args(&args(&[])).unwrap(),
            Command::Help(HelpTopic::Root)
        ));
    }

    #[test]
    fn parse_model_with_options() {
        let cmd = parse_args(&args(&[
            "model",
            "--config",
            "db/myorm.toml",
            "--connection=reporting",
            "--check",
        ]))
        .unwrap();
        let Command::Model(m) = cmd else {
            panic!("expected model");
        };
        assert_eq!(m.config, PathBuf::from("db/myorm.toml"));
        assert_eq!(m.connection.as_deref(), Some("reporting"));
        assert!(m.check);
        assert!(!m.dry_run);
        assert_eq!(m.database, None);
    }

    #[test]
    fn model_rejects_dry_run_with_check() {
        assert!(parse_args(&args(&["model", "--dry-run", "--check"])).is_err());
    }

    #[test]
    fn parse_schema_output() {
        let cmd = parse_args(&args(&["schema", "--output", "schema.json"])).unwrap();
        let Command::Schema(s) = cmd else {
            panic!("expected schema");
        };
        assert_eq!(s.output, Some(PathBuf::from("schema.json")));
        assert_eq!(s.config, PathBuf::from(DEFAULT_CONFIG));
    }

    #[test]
    fn missing_flag_value_is_an_error() {
        let err = parse_args(&args(&["model", "--connection"])).unwrap_err();
        assert!(err.to_string().contains("--connection requires a value"));
    }

    #[test]
    fn unknown_argument_is_an_error() {
        assert!(parse_args(&args(&["model", "--frobnicate"])).is_err());
        assert!(parse_args(&args(&["migrate"])).is_err());
    }
}
