use anyhow::{Context, Result};
use std::io::{self, IsTerminal};
use tabshell::job::SignalRouter;
use tabshell::{Args, Config, Environment, Terminal, Workspace};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tabshell={}", args.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let env = Environment::capture();
    let config = Config::resolve(&args, &env);
    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let headless = config.headless || !io::stdin().is_terminal();

    let mut workspace = if headless {
        Workspace::headless(config, env, cwd)
    } else {
        Workspace::new(config, env, cwd)
    };

    let router = workspace.router();
    #[cfg(unix)]
    forward_stop_signals(router.clone())?;
    ctrlc::set_handler(move || router.interrupt()).context("failed to install Ctrl+C handler")?;

    if headless {
        info!("no terminal on stdin, running headless");
        workspace.run_headless(io::stdin().lock(), io::stdout().lock())
    } else {
        Terminal::enter()?.run(&mut workspace)
    }
}

/// Catch SIGTSTP so a Ctrl+Z aimed at a foreground command stops only that
/// command and never the shell.
#[cfg(unix)]
fn forward_stop_signals(router: SignalRouter) -> Result<()> {
    use signal_hook::consts::SIGTSTP;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGTSTP]).context("failed to install SIGTSTP handler")?;
    std::thread::Builder::new()
        .name("sigtstp".into())
        .spawn(move || {
            for _ in signals.forever() {
                router.stop();
            }
        })
        .context("failed to start SIGTSTP forwarder")?;
    Ok(())
}
