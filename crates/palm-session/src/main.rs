use std::env;
use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use palm_session::{ChatClient, SessionState, Status, render_message};

#[derive(Debug, Parser)]
#[command(author, version, about = "Palm chat - talk to the agent through a relay.")]
struct Cli {
    /// Base URL of the Palm relay
    #[arg(
        long,
        env = "PALM_RELAY_URL",
        value_name = "URL",
        default_value = "http://localhost:3000"
    )]
    relay_url: String,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
    /// Disable ANSI colors in log output
    #[arg(long = "no-color")]
    no_color: bool,
}

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    run(cli)
}

fn init_logging(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("palm_session={level},palm_protocol={level}"))
    });
    let disable_color =
        cli.no_color || env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(!disable_color),
        )
        .try_init()
        .ok();
}

#[tokio::main]
async fn run(cli: Cli) -> Result<()> {
    let client = ChatClient::new(&cli.relay_url).context("building HTTP client")?;
    debug!("chatting via {}", client.chat_url());

    let mut state = SessionState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0;

    prompt()?;
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => {
                for rendered in state.render() {
                    println!("{}", render_message(&rendered));
                }
                prompt()?;
                continue;
            }
            _ => {}
        }

        state.set_input(line);
        if !state.can_submit() {
            prompt()?;
            continue;
        }

        client.send_pending(&mut state).await?;

        for rendered in state.render().iter().filter(|r| r.index >= printed) {
            // The user's own line is already on screen.
            if rendered.message.role != palm_protocol::Role::User {
                println!("{}", render_message(rendered));
            }
        }
        printed = state.messages().len();

        if state.status() == Status::Error {
            let reason = state.last_error().unwrap_or("unknown error").to_string();
            eprintln!("error: {reason}");
            state.acknowledge_error()?;
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush().context("flushing stdout")
}
