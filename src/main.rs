use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::io::Write;

use khetai::AdvisorService;
use khetai::config::Config;
use khetai::session::ConversationLog;

const USAGE: &str = "usage: khetai <pincode> <question...>\n       khetai --pincodes";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the answer
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("khetai=info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let service = AdvisorService::new(&config).context("Failed to start KhetAI")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--pincodes") => {
            for pin in service.pincodes() {
                println!("{pin}");
            }
            Ok(())
        }
        Some(pin) if args.len() > 1 => {
            let pincode: u32 = pin
                .parse()
                .with_context(|| format!("Invalid pincode '{pin}'"))?;
            let question = args[1..].join(" ");
            ask(&service, pincode, &question).await
        }
        _ => bail!(USAGE),
    }
}

async fn ask(service: &AdvisorService, pincode: u32, question: &str) -> Result<()> {
    let location = service.location(pincode)?;
    println!(
        "{} {}, {}, {} ({})",
        "Location:".bold(),
        location.mandal,
        location.district,
        location.state,
        location.pincode
    );
    println!("{} {}", "You:".blue().bold(), question);
    print!("{} ", "Assistant:".green().bold());

    let mut stdout = std::io::stdout();
    let mut shown = String::new();
    let mut log = ConversationLog::new();
    let entry = service
        .ask(&mut log, pincode, question, |snapshot| {
            // Print only the new tail; restart the line if the text was rewritten.
            match snapshot.strip_prefix(shown.as_str()) {
                Some(tail) => {
                    let _ = write!(stdout, "{tail}");
                }
                None => {
                    let _ = write!(stdout, "\n{snapshot}");
                }
            }
            let _ = stdout.flush();
            shown = snapshot.to_string();
        })
        .await?;

    println!();
    println!("{}", format!("Category: {}", entry.category).dimmed());
    Ok(())
}
