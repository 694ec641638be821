use std::path::PathBuf;

use chat_core::ChatMode;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "chat_app")]
#[command(about = "Terminal chat client for a streaming RAG endpoint")]
pub struct Cli {
    /// Path to the RON configuration file
    #[arg(long, default_value = "chat_app.ron")]
    pub config: PathBuf,

    /// Query endpoint, overriding the configuration file
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Assistant to talk to: rag or infra
    #[arg(long)]
    pub mode: Option<ChatMode>,
}
