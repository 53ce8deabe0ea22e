use super::super::args::*;
use crate::exit_codes::EXIT_SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Connect(args) => super::certificate::connect(args).await,
        Command::Map(args) => super::map::run(args),
        Command::Put(args) => super::certificate::put(args).await,
        Command::Get(args) => super::certificate::get(args).await,
        Command::Delete(args) => super::certificate::delete(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(EXIT_SUCCESS)
        }
    }
}
