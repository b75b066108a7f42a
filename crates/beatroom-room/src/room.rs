//! Room actor: one Tokio task per room, owning its [`RoomController`].
//!
//! Callers never touch the controller directly. They send commands through
//! a [`RoomHandle`] and await the reply, so every operation on a room is
//! applied atomically and in arrival order.

use beatroom_protocol::{
    ApiMod, MultiplayerRoomState, MultiplayerUserState, NewPlaylistItem, PlaylistItemId, RoomId,
    RoomSettings, RoomSnapshot, UserId,
};
use tokio::sync::{mpsc, oneshot};

use crate::controller::UpdateReceiver;
use crate::{RoomController, RoomError, RulesetCatalog};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        user_id: UserId,
        password: Option<String>,
        reply: Reply<JoinedRoom>,
    },
    /// Replies with the room state after the user left, so the manager
    /// can tell whether the room closed.
    Leave {
        user_id: UserId,
        reply: Reply<MultiplayerRoomState>,
    },
    Kick {
        requester: UserId,
        target: UserId,
        reply: Reply<()>,
    },
    TransferHost {
        requester: UserId,
        target: UserId,
        reply: Reply<()>,
    },
    ChangeSettings {
        requester: UserId,
        settings: RoomSettings,
        reply: Reply<()>,
    },
    ChangeUserState {
        user_id: UserId,
        state: MultiplayerUserState,
        reply: Reply<()>,
    },
    ChangeUserMods {
        user_id: UserId,
        mods: Vec<ApiMod>,
        reply: Reply<()>,
    },
    StartMatch {
        requester: UserId,
        reply: Reply<()>,
    },
    AbortGameplay {
        reply: oneshot::Sender<bool>,
    },
    AddPlaylistItem {
        requester: UserId,
        item: NewPlaylistItem,
        reply: Reply<PlaylistItemId>,
    },
    RemovePlaylistItem {
        requester: UserId,
        item_id: PlaylistItemId,
        reply: Reply<()>,
    },
    Subscribe {
        reply: oneshot::Sender<JoinedRoom>,
    },
    GetSnapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// What a participant or observer gets when attaching to a room: the
/// room as it is now, plus every update from that point on.
#[derive(Debug)]
pub struct JoinedRoom {
    pub snapshot: RoomSnapshot,
    pub updates: UpdateReceiver,
}

/// Room metadata for lobby listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub state: MultiplayerRoomState,
    pub user_count: usize,
    pub host: Option<UserId>,
    pub name: String,
    pub has_password: bool,
}

/// Handle to a running room actor.
///
/// Cheap to clone. Membership changes (`join`, `leave`, `kick`) go through
/// the [`RoomManager`](crate::RoomManager), which keeps the user index;
/// everything else can be called on the handle directly.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub(crate) async fn join(
        &self,
        user_id: UserId,
        password: Option<String>,
    ) -> Result<JoinedRoom, RoomError> {
        self.request(|reply| RoomCommand::Join {
            user_id,
            password,
            reply,
        })
        .await?
    }

    pub(crate) async fn leave(&self, user_id: UserId) -> Result<MultiplayerRoomState, RoomError> {
        self.request(|reply| RoomCommand::Leave { user_id, reply })
            .await?
    }

    pub(crate) async fn kick(&self, requester: UserId, target: UserId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Kick {
            requester,
            target,
            reply,
        })
        .await?
    }

    pub async fn transfer_host(&self, requester: UserId, target: UserId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::TransferHost {
            requester,
            target,
            reply,
        })
        .await?
    }

    pub async fn change_settings(
        &self,
        requester: UserId,
        settings: RoomSettings,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::ChangeSettings {
            requester,
            settings,
            reply,
        })
        .await?
    }

    pub async fn change_user_state(
        &self,
        user_id: UserId,
        state: MultiplayerUserState,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::ChangeUserState {
            user_id,
            state,
            reply,
        })
        .await?
    }

    pub async fn change_user_mods(
        &self,
        user_id: UserId,
        mods: Vec<ApiMod>,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::ChangeUserMods {
            user_id,
            mods,
            reply,
        })
        .await?
    }

    pub async fn start_match(&self, requester: UserId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::StartMatch { requester, reply })
            .await?
    }

    /// Aborts gameplay. `Ok(false)` means nobody was playing.
    pub async fn abort_gameplay(&self) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::AbortGameplay { reply })
            .await
    }

    pub async fn add_playlist_item(
        &self,
        requester: UserId,
        item: NewPlaylistItem,
    ) -> Result<PlaylistItemId, RoomError> {
        self.request(|reply| RoomCommand::AddPlaylistItem {
            requester,
            item,
            reply,
        })
        .await?
    }

    pub async fn remove_playlist_item(
        &self,
        requester: UserId,
        item_id: PlaylistItemId,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RemovePlaylistItem {
            requester,
            item_id,
            reply,
        })
        .await?
    }

    /// Attaches an observer that is not a participant.
    pub async fn subscribe(&self) -> Result<JoinedRoom, RoomError> {
        self.request(|reply| RoomCommand::Subscribe { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::GetSnapshot { reply })
            .await
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Closes the room and stops the actor.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The actor side. Runs inside a Tokio task until the room closes.
struct RoomActor<R: RulesetCatalog> {
    controller: RoomController<R>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<R: RulesetCatalog> RoomActor<R> {
    async fn run(mut self) {
        let room_id = self.controller.room_id();
        tracing::info!(%room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            if !self.handle(cmd) || self.controller.state().is_closed() {
                break;
            }
        }

        self.controller.close();
        tracing::info!(%room_id, "room actor stopped");
    }

    /// Applies one command. Returns `false` on shutdown.
    ///
    /// A failed reply send means the caller stopped waiting; the change
    /// still stands.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        let room = &mut self.controller;
        match cmd {
            RoomCommand::Join {
                user_id,
                password,
                reply,
            } => {
                let _ = reply.send(Self::join(room, user_id, password));
            }
            RoomCommand::Leave { user_id, reply } => {
                let _ = reply.send(room.remove_user(user_id).map(|()| room.state()));
            }
            RoomCommand::Kick {
                requester,
                target,
                reply,
            } => {
                let _ = reply.send(room.kick_user(requester, target));
            }
            RoomCommand::TransferHost {
                requester,
                target,
                reply,
            } => {
                let _ = reply.send(room.transfer_host(requester, target));
            }
            RoomCommand::ChangeSettings {
                requester,
                settings,
                reply,
            } => {
                let _ = reply.send(room.change_settings(requester, settings));
            }
            RoomCommand::ChangeUserState {
                user_id,
                state,
                reply,
            } => {
                let _ = reply.send(room.change_user_state(user_id, state));
            }
            RoomCommand::ChangeUserMods {
                user_id,
                mods,
                reply,
            } => {
                let _ = reply.send(room.change_user_mods(user_id, mods));
            }
            RoomCommand::StartMatch { requester, reply } => {
                let _ = reply.send(room.start_match(requester));
            }
            RoomCommand::AbortGameplay { reply } => {
                let _ = reply.send(room.abort_gameplay());
            }
            RoomCommand::AddPlaylistItem {
                requester,
                item,
                reply,
            } => {
                let _ = reply.send(room.add_playlist_item(requester, item));
            }
            RoomCommand::RemovePlaylistItem {
                requester,
                item_id,
                reply,
            } => {
                let _ = reply.send(room.remove_playlist_item(requester, item_id));
            }
            RoomCommand::Subscribe { reply } => {
                let (snapshot, updates) = room.subscribe_with_snapshot();
                let _ = reply.send(JoinedRoom { snapshot, updates });
            }
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(room.snapshot());
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(Self::info(room));
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %room.room_id(), "room shutting down");
                return false;
            }
        }
        true
    }

    fn join(
        room: &mut RoomController<R>,
        user_id: UserId,
        password: Option<String>,
    ) -> Result<JoinedRoom, RoomError> {
        if let Some(expected) = &room.settings().password {
            if password.as_ref() != Some(expected) {
                tracing::debug!(room_id = %room.room_id(), %user_id, "wrong room password");
                return Err(RoomError::InvalidPassword(room.room_id()));
            }
        }
        room.add_user(user_id)?;
        let (snapshot, updates) = room.subscribe_with_snapshot();
        Ok(JoinedRoom { snapshot, updates })
    }

    fn info(room: &RoomController<R>) -> RoomInfo {
        RoomInfo {
            room_id: room.room_id(),
            state: room.state(),
            user_count: room.users().len(),
            host: room.host(),
            name: room.settings().name.clone(),
            has_password: room.settings().password.is_some(),
        }
    }
}

/// Spawns the actor for `controller` and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room<R: RulesetCatalog>(
    controller: RoomController<R>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let room_id = controller.room_id();

    let actor = RoomActor {
        controller,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
