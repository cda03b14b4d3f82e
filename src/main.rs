use anyhow::Result;
use clap::Parser;

use tracescope::{cli::Cli, init_tracing, server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing();

    server::start_server(args.log_file, &args.host, args.port).await
}
