//! Entry point for the vibwatch TUI. Parses args, resolves the connection
//! profile and runs the App.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use vibwatch::app::{now_ms, App};
use vibwatch::history::{EventHistory, FileStore, KeyValueStore, MemoryStore};
use vibwatch::logging::init_file_logging;
use vibwatch::profiles::{
    data_dir, load_profiles, save_profiles, should_save, ProfileEntry, ProfileRequest,
    ResolveProfile,
};
use vibwatch::transport::TransportConfig;

const DEMO_PORT: u16 = 3231;

#[derive(Parser, Debug)]
#[command(name = "vibwatch", version)]
#[command(about = "Real-time vibration anomaly monitor for the terminal")]
struct Args {
    /// Push endpoint, e.g. ws://HOST:PORT/ws
    url: Option<String>,

    /// HTTP base for polling when it cannot be derived from the URL
    #[arg(long, value_name = "URL")]
    http: Option<String>,

    /// Named connection profile
    #[arg(short = 'P', long, value_name = "NAME")]
    profile: Option<String>,

    /// Overwrite an existing profile without asking
    #[arg(long)]
    save: bool,

    /// Start in polling mode without trying the push link
    #[arg(long)]
    poll: bool,

    /// Where the event history is kept
    #[arg(long, value_name = "DIR")]
    history_dir: Option<PathBuf>,

    /// Spawn a local vibwatch_agent and connect to it
    #[arg(long)]
    demo: bool,

    /// Resolve (and save) the profile, then exit without connecting
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.demo || matches!(args.profile.as_deref(), Some("demo")) {
        return run_demo_mode(&args).await;
    }

    let Some(entry) = resolve_entry(&args)? else {
        return Ok(());
    };

    if args.dry_run {
        println!("{}", entry.url);
        return Ok(());
    }

    let config = transport_config(&entry, args.poll)?;
    run_app(&args, config).await
}

/// Work out what to connect to, prompting and saving profiles on the way.
/// `None` means the user aborted or there is nothing to connect to.
fn resolve_entry(args: &Args) -> anyhow::Result<Option<ProfileEntry>> {
    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: args.profile.clone(),
        url: args.url.clone(),
        http: args.http.clone(),
    };

    let mut profiles_mut = profiles_file.clone();
    let entry = match req.resolve(&profiles_file) {
        ResolveProfile::Direct(entry) => {
            if let Some(name) = args.profile.as_ref() {
                let exists = profiles_mut.profiles.contains_key(name);
                let overwrite = !exists
                    || args.save
                    || (should_save(&profiles_mut, name, &entry, true)
                        && prompt_yes_no(&format!("Overwrite existing profile '{name}'? [y/N]: ")));
                if should_save(&profiles_mut, name, &entry, overwrite) {
                    profiles_mut.profiles.insert(name.clone(), entry.clone());
                    if let Err(e) = save_profiles(&profiles_mut) {
                        eprintln!("Could not save profile '{name}': {e}");
                    }
                }
            }
            entry
        }
        ResolveProfile::Loaded(mut entry) => {
            // a one-off --http still applies to a loaded profile
            if args.http.is_some() {
                entry.http = args.http.clone();
            }
            entry
        }
        ResolveProfile::PromptSelect(names) => {
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (or blank to abort): ")?;
            let picked = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|idx| idx.checked_sub(1))
                .and_then(|idx| names.get(idx))
                .and_then(|name| profiles_mut.profiles.get(name));
            match picked {
                Some(entry) => entry.clone(),
                None => return Ok(None),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string("Enter URL (ws://HOST:PORT/ws): ")?;
            if url.trim().is_empty() {
                return Ok(None);
            }
            let http = prompt_string("Enter HTTP base for polling (or leave blank): ")?;
            let entry = ProfileEntry {
                url: url.trim().to_string(),
                http: Some(http.trim().to_string()).filter(|h| !h.is_empty()),
            };
            profiles_mut.profiles.insert(name.clone(), entry.clone());
            if let Err(e) = save_profiles(&profiles_mut) {
                eprintln!("Could not save profile '{name}': {e}");
            }
            entry
        }
        ResolveProfile::None => {
            eprintln!("No URL provided and no profiles to select.");
            return Ok(None);
        }
    };
    Ok(Some(entry))
}

fn transport_config(entry: &ProfileEntry, force_polling: bool) -> anyhow::Result<TransportConfig> {
    let mut config = TransportConfig::new(&entry.url);
    if let Some(h) = entry.http.as_deref() {
        let base = Url::parse(h).with_context(|| format!("invalid HTTP base '{h}'"))?;
        config.http_base = Some(base);
    }
    config.force_polling = force_polling;
    Ok(config)
}

async fn run_app(args: &Args, config: TransportConfig) -> anyhow::Result<()> {
    let data = data_dir();
    match init_file_logging(&data) {
        Ok(path) => info!(log = %path.display(), "vibwatch starting"),
        Err(e) => eprintln!("logging disabled: {e}"),
    }

    let history_dir = args.history_dir.clone().unwrap_or(data);
    match FileStore::open(history_dir) {
        Ok(store) => run_with_store(store, config).await,
        Err(e) => {
            warn!(error = %e, "history store unavailable, keeping history in memory");
            run_with_store(MemoryStore::default(), config).await
        }
    }
}

async fn run_with_store<S: KeyValueStore>(
    store: S,
    config: TransportConfig,
) -> anyhow::Result<()> {
    let history = EventHistory::open(store, now_ms())?;
    let mut app = App::new(history);
    app.run(config).await
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

// --- Demo Mode ---

async fn run_demo_mode(args: &Args) -> anyhow::Result<()> {
    let url = format!("ws://127.0.0.1:{DEMO_PORT}/ws");
    if args.dry_run {
        println!("{url}");
        return Ok(());
    }
    let child = spawn_demo_agent(DEMO_PORT)?;
    let config = transport_config(
        &ProfileEntry {
            url,
            http: None,
        },
        args.poll,
    )?;
    tokio::select! {
        res = run_app(args, config) => { drop(child); res }
        _ = tokio::signal::ctrl_c() => {
            drop(child);
            Ok(())
        }
    }
}

struct DemoGuard(Option<std::process::Child>);

impl Drop for DemoGuard {
    fn drop(&mut self) {
        if let Some(mut ch) = self.0.take() {
            let _ = ch.kill();
            let _ = ch.wait();
        }
    }
}

fn spawn_demo_agent(port: u16) -> anyhow::Result<DemoGuard> {
    let candidate = find_agent_executable();
    let child = std::process::Command::new(&candidate)
        .arg("--port")
        .arg(port.to_string())
        .env("RUST_LOG", "warn")
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("could not start {}", candidate.display()))?;
    // Give the agent a brief moment to bind
    std::thread::sleep(std::time::Duration::from_millis(300));
    Ok(DemoGuard(Some(child)))
}

fn find_agent_executable() -> PathBuf {
    #[cfg(windows)]
    let name = "vibwatch_agent.exe";
    #[cfg(not(windows))]
    let name = "vibwatch_agent";
    if let Some(parent) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        let candidate = parent.join(name);
        if candidate.exists() {
            return candidate;
        }
    }
    // Fallback to relying on PATH
    PathBuf::from(name)
}
