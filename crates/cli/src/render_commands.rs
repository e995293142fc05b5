use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    tracing::info,
};

use {
    huddle_channels::{
        ChannelRegistry, ChatPlayer,
        memory::{InMemoryDirectory, InMemoryPlayer},
    },
    huddle_chat::{DispatchOutcome, InboxDelivery, MessageHandler, ProfileExpander},
    huddle_config::HuddleConfig,
};

#[derive(Args)]
pub struct RenderArgs {
    /// Name of the sending player.
    #[arg(long)]
    sender: String,

    /// Message text, `&` codes and `[fragment]` tokens included.
    #[arg(long)]
    text: String,

    /// Send to this channel instead of resolving one for the sender.
    #[arg(long)]
    channel: Option<String>,

    /// Online player as `NAME` or `NAME:perm,perm`. Repeatable.
    #[arg(long = "player", value_name = "NAME[:PERMS]")]
    players: Vec<String>,

    /// Print each rendered message as a JSON chat component.
    #[arg(long)]
    json: bool,
}

/// Parse `NAME` or `NAME:perm,perm` into a name and its permissions.
fn parse_player_spec(spec: &str) -> Result<(String, Vec<String>)> {
    let (name, perms) = spec.split_once(':').unwrap_or((spec, ""));
    let name = name.trim();
    if name.is_empty() {
        bail!("player spec '{spec}' has no name");
    }
    let perms = perms
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    Ok((name.to_string(), perms))
}

fn load(path: Option<&Path>) -> Result<HuddleConfig> {
    match path {
        Some(path) => huddle_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => Ok(huddle_config::discover_and_load()),
    }
}

/// Build online players; each joins every channel it may speak in.
fn populate(
    directory: &InMemoryDirectory,
    registry: &ChannelRegistry,
    specs: &[String],
    sender: &str,
) -> Result<Arc<dyn ChatPlayer>> {
    let mut players: Vec<Arc<InMemoryPlayer>> = Vec::new();
    for spec in specs {
        let (name, perms) = parse_player_spec(spec)?;
        let player = InMemoryPlayer::new(name.to_lowercase(), name);
        for perm in perms {
            player.grant_permission(perm);
        }
        players.push(Arc::new(player));
    }
    if !players.iter().any(|p| p.name().eq_ignore_ascii_case(sender)) {
        players.push(Arc::new(InMemoryPlayer::new(sender.to_lowercase(), sender)));
    }

    for player in &players {
        for channel in registry.channels() {
            if channel.is_valid(player.as_ref()) {
                player.memberships().join(&channel);
            }
        }
        directory.add(player.clone());
    }

    directory
        .find_by_name(sender)
        .with_context(|| format!("sender '{sender}' is not online"))
}

pub async fn render(config_path: Option<&Path>, args: RenderArgs) -> Result<()> {
    let config = load(config_path)?;
    let directory = Arc::new(InMemoryDirectory::default());
    let registry = Arc::new(ChannelRegistry::from_config(&config, directory.clone())?);
    let sender = populate(&directory, &registry, &args.players, &args.sender)?;

    let forced = match args.channel.as_deref() {
        Some(key) => Some(
            registry
                .get(key)
                .with_context(|| format!("unknown channel '{key}'"))?,
        ),
        None => None,
    };

    let inbox = Arc::new(InboxDelivery::default());
    let handler = Arc::new(
        MessageHandler::builder(Arc::clone(&registry), inbox.clone())
            .config(&config)
            .expander(Arc::new(ProfileExpander))
            .build(),
    );

    let text = args.text;
    let outcome = {
        let handler = Arc::clone(&handler);
        tokio::task::spawn_blocking(move || handler.process_message(forced, &sender, &text))
            .await?
    };
    info!(?outcome, "render finished");

    match outcome {
        DispatchOutcome::Delivered { channel, failed, .. } => {
            eprintln!("#{channel}");
            for delivered in inbox.delivered() {
                if args.json {
                    println!(
                        "{}\t{}",
                        delivered.recipient,
                        serde_json::to_string(&delivered.rendered)?
                    );
                } else {
                    println!("{}: {}", delivered.recipient, delivered.rendered.to_ansi());
                }
            }
            if failed > 0 {
                eprintln!("{failed} delivery failure(s)");
            }
        },
        DispatchOutcome::InvalidChannel { channel } => {
            eprintln!("'{}' may not speak in #{channel}", args.sender);
        },
        DispatchOutcome::Cancelled { channel } => {
            eprintln!("message to #{channel} was cancelled");
        },
    }
    Ok(())
}
