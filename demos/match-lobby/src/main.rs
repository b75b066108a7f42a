use std::sync::Arc;

use beatroom::prelude::*;
use beatroom::room::UpdateReceiver;
use tokio::sync::oneshot;

const HOST: UserId = UserId(2);
const GUEST: UserId = UserId(3);

// ---------------------------------------------------------------------------
// Scripted lobby
// ---------------------------------------------------------------------------

fn playlist() -> Vec<NewPlaylistItem> {
    let osu = BeatmapRef {
        id: BeatmapId(75),
        ruleset_id: RulesetId::OSU,
    };
    let taiko = BeatmapRef {
        id: BeatmapId(2116),
        ruleset_id: RulesetId::TAIKO,
    };
    vec![
        NewPlaylistItem::new(osu).with_allowed_mods(vec![ApiMod::new("HD"), ApiMod::new("DT")]),
        NewPlaylistItem::new(taiko).with_allowed_mods(vec![ApiMod::new("SW")]),
    ]
}

/// Plays through one aborted and one completed match, then leaves.
/// The room's ID is sent on `opened` as soon as it exists. Returns the
/// room as the host saw it just before leaving.
async fn run_lobby(
    hub: Arc<MatchHub>,
    opened: oneshot::Sender<RoomId>,
) -> Result<RoomSnapshot, BeatroomError> {
    let mut host = MultiplayerClient::new(HOST, hub);
    let room_id = host
        .create_room(
            RoomSettings {
                name: "demo lobby".into(),
                ..RoomSettings::default()
            },
            playlist(),
        )
        .await?;
    // Nobody watching is fine.
    let _ = opened.send(room_id);
    host.add_user(GUEST).await?;
    host.change_user_mods(vec![ApiMod::new("HD")]).await?;

    // First item: everyone loads, then the host aborts.
    for state in [MultiplayerUserState::Ready, MultiplayerUserState::Loaded] {
        host.change_user_state(GUEST, state).await?;
        host.change_state(state).await?;
        if state == MultiplayerUserState::Ready {
            host.start_match().await?;
        }
    }
    host.abort_gameplay().await?;

    // Second item: the host spectates while the guest plays it through.
    host.change_state(MultiplayerUserState::Spectating).await?;
    for state in [
        MultiplayerUserState::Ready,
        MultiplayerUserState::Loaded,
        MultiplayerUserState::Idle,
    ] {
        host.change_user_state(GUEST, state).await?;
        if state == MultiplayerUserState::Ready {
            host.start_match().await?;
        }
    }

    let room = host.room().cloned().ok_or(BeatroomError::NotInRoom(HOST))?;
    host.remove_user(GUEST).await?;
    host.leave_room().await?;
    Ok(room)
}

/// Prints every update as one JSON line until the room closes.
async fn print_updates(mut updates: UpdateReceiver) {
    while let Some(update) = updates.recv().await {
        match serde_json::to_string(&update) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode update"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let hub = Arc::new(MatchHub::new());

    // Watch the room the host is about to open from a separate task.
    let (opened_tx, opened_rx) = oneshot::channel();
    let lobby = tokio::spawn(run_lobby(Arc::clone(&hub), opened_tx));
    let handle = match opened_rx.await {
        Ok(room_id) => hub.room(room_id).await,
        Err(_) => None,
    };
    let printer = match handle {
        Some(handle) => match handle.subscribe().await {
            Ok(joined) => {
                println!("{}", serde_json::to_string(&joined.snapshot)?);
                Some(tokio::spawn(print_updates(joined.updates)))
            }
            Err(e) => {
                tracing::debug!(error = %e, "room closed before it could be watched");
                None
            }
        },
        None => None,
    };

    let room = lobby.await??;
    if let Some(printer) = printer {
        printer.await?;
    }

    tracing::info!(
        room_id = %room.room_id,
        items = room.playlist.len(),
        current = %room.current_item,
        "lobby finished"
    );
    Ok(())
}
