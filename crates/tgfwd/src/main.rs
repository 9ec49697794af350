use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio::io::BufReader;

use tgfwd_core::{
    config::Config,
    context::AppContext,
    credentials::{self, CredentialStore, Prompter},
    daemon::{self, HeadlessExit},
    messaging::{port::ChatPlatform, throttled::ThrottledPlatform},
    shell::Shell,
};

mod terminal;

use terminal::TerminalPrompter;

#[derive(Parser)]
#[command(name = "tgfwd")]
#[command(version, about = "Relay Telegram messages between chats with keyword filters")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "forwarder.json")]
    config: PathBuf,

    /// Start every configured job without the menu and run until Ctrl-C
    #[arg(long)]
    autorun: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tgfwd_core::logging::init("tgfwd", cli.verbose)?;
    credentials::load_dotenv_if_present(&PathBuf::from(".env"));

    let loaded = match Config::load(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) if !cli.autorun => {
            eprintln!("Ignoring {}: {e}", cli.config.display());
            Default::default()
        }
        Err(e) => return Err(e.into()),
    };
    let (config, jobs, issues) = loaded.into_store();
    for issue in &issues {
        tracing::warn!(job = issue.index, reason = %issue.reason, "skipped job entry");
        eprintln!("Skipped job entry {}: {}", issue.index, issue.reason);
    }

    let store = CredentialStore::new(config.credentials_file.clone());
    let prompter = (!cli.autorun).then_some(TerminalPrompter);
    let platform = credentials::authorize(
        &store,
        prompter.as_ref().map(|p| p as &dyn Prompter),
        |creds| tgfwd_telegram::connect(creds, &config),
    )
    .await?;
    let platform = Arc::new(platform);
    println!("Connected as @{}", platform.account_name());

    let throttled: Arc<dyn ChatPlatform> =
        Arc::new(ThrottledPlatform::new(platform.clone(), config.throttle));
    let mut ctx = AppContext::new(Arc::new(config), throttled, jobs);

    let result = if cli.autorun {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        daemon::run_headless(&mut ctx, shutdown).await.map(|exit| {
            if exit == HeadlessExit::AllRunnersExited {
                eprintln!("All forwarding tasks ended.");
            }
        })
    } else {
        let mut shell = Shell::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
        tokio::select! {
            r = shell.run(&mut ctx) => r,
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted, stopping forwarding.");
                ctx.supervisor.stop_all().await;
                platform.shutdown().await;
                // Runners are stopped; a clean exit. The pending stdin read
                // would otherwise keep the runtime alive.
                std::process::exit(0);
            }
        }
    };

    platform.shutdown().await;
    result?;
    Ok(())
}
