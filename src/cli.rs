use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "denobot")]
#[command(author, version, about = "Telegram bot that generates Deno Deploy projects through an external service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (long polling by default)
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Print a stored session, or list user ids with a session
    Session {
        /// Telegram user id to show
        user_id: Option<String>,
    },

    /// Validate configuration and exit
    CheckConfig,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run; no subcommand means `run` in polling mode.
    pub fn command_or_default(self) -> Commands {
        self.command.unwrap_or(Commands::Run { webhook: false })
    }
}
