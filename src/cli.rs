use clap::Parser;
use std::path::PathBuf;

/// Chat with the repair advisor from the terminal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Send a single message and exit (interactive prompt otherwise)
    #[arg(short, long)]
    pub message: Option<String>,

    /// Voice note to attach to the single message
    #[arg(short, long)]
    pub audio: Option<PathBuf>,

    /// Gemini model name
    #[arg(short = 'M', long)]
    pub model: Option<String>,

    /// API base URL of the Gemini endpoint
    #[arg(long)]
    pub base_url: Option<String>,

    /// Record streamed replies to a file
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Play back recorded replies from a file instead of calling the API
    #[arg(long, conflicts_with = "record")]
    pub playback: Option<PathBuf>,

    /// Fast playback mode - ignore chunk timing when playing recordings
    #[arg(long)]
    pub fast_playback: bool,

    /// File with a system instruction replacing the built-in one
    #[arg(long)]
    pub system_instruction: Option<PathBuf>,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn parse() -> Self {
        <Args as Parser>::parse()
    }

    /// One turn from the command line rather than a prompt loop
    pub fn is_one_shot(&self) -> bool {
        self.message.is_some() || self.audio.is_some()
    }
}
