use clap::Parser;

use vitalog_mcp_runtime::{McpCommand, run};

#[derive(Parser)]
#[command(
    name = "vitalog-mcp",
    version,
    about = "Vitalog MCP server — health data tools over stdio"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "VITALOG_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Skip credential check (for use behind an auth-injecting proxy)
    #[arg(long, env = "VITALOG_NO_AUTH")]
    no_auth: bool,

    #[command(subcommand)]
    command: McpCommand,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = run(&cli.api_url, cli.no_auth, cli.command).await;
    std::process::exit(code);
}
