mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;

use clap::Parser;
use std::error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    let mut client = ClientCli::connect(&args.server).await?;

    match args.sub_command {
        SubCommand::Submit {
            command,
            cwd,
            timeout,
            env,
        } => {
            client.submit(&command, cwd, timeout, &env).await?;
        }
        SubCommand::Status { job_id } => {
            client.query_status(job_id).await?;
        }
        SubCommand::Result { job_id } => {
            client.get_result(job_id).await?;
        }
        SubCommand::Stream { job_id } => {
            client.stream_output(job_id).await?;
        }
        SubCommand::Cancel { job_id } => {
            client.cancel(job_id).await?;
        }
        SubCommand::List => {
            client.list().await?;
        }
        SubCommand::Health => {
            client.health().await?;
        }
        SubCommand::Browse { path } => {
            client.browse(path).await?;
        }
        SubCommand::Upload { file, dest_dir } => {
            client.upload(&file, dest_dir).await?;
        }
        SubCommand::Download { filename, out } => {
            client.download(filename, out).await?;
        }
        SubCommand::Files => {
            client.list_files().await?;
        }
        SubCommand::Disk => {
            client.disk_usage().await?;
        }
    }

    Ok(())
}
