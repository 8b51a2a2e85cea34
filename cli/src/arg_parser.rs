use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Connect to a remote execution server
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// The address of the server
    #[clap(
        short = 's',
        long = "server",
        default_value = "http://[::1]:50051",
        env = "REMOTE_EXEC_SERVER"
    )]
    pub server: String,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, Subcommand)]
pub enum SubCommand {
    /// submit a shell command for execution
    Submit {
        /// full command line, run through `sh -c` on the server
        command: String,

        #[clap(long)]
        /// working directory for the command
        cwd: Option<String>,

        #[clap(long)]
        /// timeout in seconds before the job is killed
        timeout: Option<u64>,

        #[clap(long, multiple_values = true, parse(try_from_str = var_eq_val))]
        /// list of environment variables
        env: Vec<(String, String)>,
    },
    /// get a job's status
    Status {
        /// job id returned by submit
        job_id: String,
    },
    /// fetch a job's final result
    Result {
        /// job id returned by submit
        job_id: String,
    },
    /// stream a job's output until it finishes
    Stream {
        /// job id returned by submit
        job_id: String,
    },
    /// cancel a running job
    Cancel {
        /// job id returned by submit
        job_id: String,
    },
    /// list all retained jobs
    List,
    /// server health summary
    Health,
    /// list a directory on the server
    Browse {
        /// directory to list (server default when omitted)
        path: Option<String>,
    },
    /// upload a local file to the server
    Upload {
        /// local file to send
        file: PathBuf,

        #[clap(long)]
        /// destination directory on the server
        dest_dir: Option<String>,
    },
    /// download a file from the served files root
    Download {
        /// filename inside the served files root
        filename: String,

        #[clap(long)]
        /// local path to write to (defaults to the filename)
        out: Option<PathBuf>,
    },
    /// list files in the served files root
    Files,
    /// disk usage of the server workspace
    Disk,
}

/// try_from_str parse function for command env variables
fn var_eq_val(s: &str) -> Result<(String, String), String> {
    let mut v: Vec<String> = s.split('=').map(str::to_string).collect();
    if v.len() != 2 {
        Err("Required format is VAR=VAL".to_string())
    } else {
        let val = v.pop().unwrap();
        let var = v.pop().unwrap();
        Ok((var, val))
    }
}
