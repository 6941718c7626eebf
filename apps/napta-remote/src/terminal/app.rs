use std::io::{self, Write};
use std::path::Path;

use catalog_sdk::{Catalog, CatalogClient, ImagePayload, SwitchRequest};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::orchestrator::{OrchestratorError, ScriptOrchestrator};
use crate::session::{SessionNotice, SessionState};
use crate::terminal::cli::{Cli, Command, PlayArgs, SwitchArgs};
use crate::terminal::error::CliError;
use crate::terminal::input::{self, ControlInput, RawModeGuard};
use crate::transport::{ChannelConnector, WebSocketConnector};

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::from_env();
    if let Some(server) = cli.server {
        config = config.with_server(server);
    }
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    let client = CatalogClient::with_client(config.api_base_url(), http);
    debug!(
        target: "napta::terminal",
        api = %client.base_url(),
        channel = %config.channel_url(),
        "remote configured"
    );

    match cli.command {
        Command::List => list(&client).await,
        Command::Switch(args) => switch(&client, args).await,
        Command::Play(args) => {
            let connector = WebSocketConnector::new(config.channel_url());
            let orchestrator = ScriptOrchestrator::new(client, connector);
            play(orchestrator, args, &config).await
        }
    }
}

async fn list(client: &CatalogClient) -> Result<(), CliError> {
    let catalog = client.list_scripts().await?;
    print_catalog(&catalog);
    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    if catalog.scripts.is_empty() {
        println!("no scripts available");
        return;
    }
    for script in &catalog.scripts {
        let marker = if catalog.is_current(&script.id) { "*" } else { " " };
        let mut tags = Vec::new();
        if script.is_playable {
            tags.push("playable");
        }
        if script.requires_image {
            tags.push("image");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        if script.name == script.id {
            println!("{marker} {}{tags}", script.id);
        } else {
            println!("{marker} {} ({}){tags}", script.id, script.name);
        }
    }
}

async fn switch(client: &CatalogClient, args: SwitchArgs) -> Result<(), CliError> {
    let catalog = client.list_scripts().await?;
    let request = match catalog.get(&args.script_id) {
        Some(descriptor) => SwitchRequest::for_descriptor(descriptor),
        None => SwitchRequest::new(&args.script_id),
    };
    let request = match &args.image {
        Some(path) => {
            let image = read_image(path).await?;
            request.with_image_named(image.bytes, image.file_name)
        }
        None => request,
    };

    client.switch_script(request).await?;
    let catalog = client.list_scripts().await?;
    match catalog.current() {
        Some(current) => println!("display now shows {}", current.id),
        None => println!("switch accepted; display reports no current script"),
    }
    Ok(())
}

async fn read_image(path: &Path) -> Result<ImagePayload, CliError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CliError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    Ok(ImagePayload { bytes, file_name })
}

/// Receivers tied to the session that is live right now. A rescope replaces
/// the session, so these are re-attached whenever the scope changes.
#[derive(Default)]
struct SessionWatch {
    state: Option<watch::Receiver<SessionState>>,
    notices: Option<broadcast::Receiver<SessionNotice>>,
}

impl SessionWatch {
    fn attach<C: ChannelConnector>(orchestrator: &ScriptOrchestrator<C>) -> Self {
        Self {
            state: orchestrator.subscribe_state(),
            notices: orchestrator.subscribe_notices(),
        }
    }
}

async fn next_state(rx: &mut Option<watch::Receiver<SessionState>>) -> SessionState {
    if let Some(receiver) = rx {
        if receiver.changed().await.is_ok() {
            return *receiver.borrow_and_update();
        }
        *rx = None;
    }
    std::future::pending().await
}

async fn next_notice(rx: &mut Option<broadcast::Receiver<SessionNotice>>) -> SessionNotice {
    if let Some(receiver) = rx {
        loop {
            match receiver.recv().await {
                Ok(notice) => return notice,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(target: "napta::terminal", skipped, "notices lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        *rx = None;
    }
    std::future::pending().await
}

/// Writes one line while the terminal is in raw mode.
fn say(line: impl AsRef<str>) {
    let mut stdout = io::stdout();
    let _ = write!(stdout, "\r{}\r\n", line.as_ref());
    let _ = stdout.flush();
}

fn describe<C: ChannelConnector>(orchestrator: &ScriptOrchestrator<C>) -> String {
    let Some(current) = orchestrator.current_script() else {
        return "display shows no script".to_string();
    };
    if !current.is_playable {
        return format!("{} is not playable", current.id);
    }
    match orchestrator.session_state() {
        None => format!("{}: disconnected (no session)", current.id),
        Some(state) => {
            let label = match state.status() {
                Some(status) => status.to_string(),
                None => state.to_string(),
            };
            match orchestrator.owned_slot() {
                Some(slot) => format!("{}: {label} as player {slot}", current.id),
                None => format!("{}: {label}", current.id),
            }
        }
    }
}

async fn play<C: ChannelConnector>(
    mut orchestrator: ScriptOrchestrator<C>,
    args: PlayArgs,
    config: &Config,
) -> Result<(), CliError> {
    let raw = RawModeGuard::enable()?;
    say("arrows steer | 1-9 pick player | r reconnect | q quit");

    let mut pending_player = args.player;
    if let Err(err) = orchestrator.refresh().await {
        say(format!("catalog unavailable: {err}"));
    }
    let mut live = SessionWatch::attach(&orchestrator);
    let mut scoped = orchestrator.scoped_script().map(str::to_owned);
    say(describe(&orchestrator));
    claim_pending(&mut orchestrator, &mut pending_player);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = input::spawn_reader(tx, !raw.reports_event_types());

    let mut poll = time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    poll.tick().await;

    loop {
        tokio::select! {
            maybe_input = rx.recv() => {
                let Some(control) = maybe_input else { break };
                match control {
                    ControlInput::Quit => break,
                    ControlInput::Key(direction) => {
                        if let Err(err) = orchestrator.send_key(direction) {
                            say(format!("key {direction} not sent: {err}"));
                        }
                    }
                    ControlInput::Player(slot) => {
                        match orchestrator.choose_player(slot) {
                            Ok(()) => say(format!("requested player {slot}")),
                            Err(err) => say(format!("player {slot} not requested: {err}")),
                        }
                    }
                    ControlInput::Rescope => {
                        match orchestrator.rescope().await {
                            Ok(()) => info!(target: "napta::terminal", "session rebuilt"),
                            Err(err) => say(format!("reconnect failed: {err}")),
                        }
                        live = SessionWatch::attach(&orchestrator);
                        scoped = orchestrator.scoped_script().map(str::to_owned);
                        say(describe(&orchestrator));
                    }
                }
            }
            _ = poll.tick() => {
                if let Err(err) = orchestrator.refresh().await {
                    warn!(target: "napta::terminal", error = %err, "catalog refresh failed");
                    continue;
                }
                let now = orchestrator.scoped_script().map(str::to_owned);
                if now != scoped {
                    scoped = now;
                    live = SessionWatch::attach(&orchestrator);
                    say(describe(&orchestrator));
                    claim_pending(&mut orchestrator, &mut pending_player);
                }
            }
            state = next_state(&mut live.state) => {
                debug!(target: "napta::terminal", %state, "session state changed");
                say(describe(&orchestrator));
            }
            notice = next_notice(&mut live.notices) => {
                say(notice.to_string());
            }
        }
    }

    drop(rx);
    orchestrator.shutdown().await;
    if reader.join().is_err() {
        return Err(CliError::Runtime("key reader thread panicked".into()));
    }
    Ok(())
}

/// Claims the slot given on the command line once a session accepts input.
fn claim_pending<C: ChannelConnector>(
    orchestrator: &mut ScriptOrchestrator<C>,
    pending: &mut Option<u32>,
) {
    let Some(slot) = *pending else { return };
    match orchestrator.choose_player(slot) {
        Ok(()) => {
            say(format!("requested player {slot}"));
            *pending = None;
        }
        Err(OrchestratorError::NoActiveSession) => {}
        Err(err) => {
            say(format!("player {slot} not requested: {err}"));
            *pending = None;
        }
    }
}
