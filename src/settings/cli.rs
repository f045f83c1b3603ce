use super::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "lifeline", about = "Resilient API client and session manager")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// GET a path through the full request pipeline and print the body.
    Get {
        path: String,
        /// Repeatable `key=value` query parameter.
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,
        /// Skip the stored validator for this call.
        #[arg(long)]
        bypass_cache: bool,
    },
    /// Ping the health endpoint once.
    Probe,
    /// Replay writes queued while offline.
    Flush,
    /// Show the persisted session.
    Session,
}
