//! CLI client for the leader

use clap::{Parser, Subcommand};
use relaykv::common::protocol::Reply;
use relaykv::LeaderClient;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "relaykv")]
#[command(about = "relaykv command-line client")]
#[command(version)]
struct Cli {
    /// Leader address
    #[arg(long, default_value = "127.0.0.1:8080")]
    leader: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a message
    Set {
        id: i64,

        /// Message text (remaining words are joined with spaces)
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Read a message
    Get { id: i64 },

    /// Send raw protocol lines from stdin
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut client = LeaderClient::connect(cli.leader.as_str()).await?;

    match cli.command {
        Commands::Set { id, text } => {
            client.set(id, &text.join(" ")).await?;
            println!("OK");
        }

        Commands::Get { id } => match client.get(id).await? {
            Some(text) => println!("{}", text),
            None => {
                println!("NOT_FOUND");
                std::process::exit(1);
            }
        },

        Commands::Repl => repl(&mut client).await?,
    }

    Ok(())
}

async fn repl(client: &mut LeaderClient) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        match client.send(line).await? {
            Reply::Value(text) if text.is_empty() => stdout.write_all(b"(empty)\n").await?,
            reply => stdout.write_all(format!("{}\n", reply).as_bytes()).await?,
        }
    }
    Ok(())
}
