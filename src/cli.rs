use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "call-relay")]
#[command(about = "Call lifecycle webhook processor", long_about = None)]
pub struct Cli {
    /// Port to listen on (overrides the PORT environment variable)
    #[arg(short, long)]
    pub port: Option<u16>,
}
