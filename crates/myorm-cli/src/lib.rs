mod cli;
mod config;
mod init;
mod model_codegen;
mod model_generate;
mod schema_cmd;
mod type_mapper;
mod write;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Model(args) => model_generate::run(args).await,
        cli::Command::Schema(args) => schema_cmd::run(args).await,
        cli::Command::Init(args) => init::run(args),
    }
}
