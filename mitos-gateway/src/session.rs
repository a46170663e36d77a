//! The per-connection game session.
//!
//! Lifecycle, in order: authenticate the token (close 4401 on failure), join
//! the world (`error` frame and close when it does not exist), register with
//! the connection hub, report the session to the stats service, subscribe to
//! the world, send `joined`, then run the reader and writer concurrently
//! until either side ends. Cleanup always unsubscribes, unregisters, removes
//! the player, and flushes the final progress delta.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use mitos_core::accounts::StatsDelta;
use mitos_core::player::Player;
use mitos_core::world::runner::WorldSubscription;
use mitos_protocol::{ClientMessage, ServerMessage, close_code};
use tokio::sync::mpsc;

use crate::GatewayContext;
use crate::hub::OutboundFrame;

/// Runs one game connection to completion.
pub(crate) async fn run(
    mut socket: WebSocket,
    ctx: Arc<GatewayContext>,
    world_id: String,
    token: String,
    player_name: String,
) {
    // 1. Authenticate.
    let Some(identity) = ctx.tokens.validate(&token) else {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::INVALID_TOKEN,
                reason: "Invalid token".into(),
            })))
            .await;
        return;
    };

    // 2. Join the world.
    let player = Player::new(player_name, token);
    let player_id = player.id.clone();
    let player_view = player.view();
    let Some(cell) = ctx.manager.add_player(&world_id, player) else {
        let _ = send(
            &mut socket,
            &ServerMessage::Error {
                message: "World not found".to_owned(),
            },
        )
        .await;
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "World not found".into(),
            })))
            .await;
        return;
    };

    log::info!(
        "player {player_id} ({username}) joined world {world_id}",
        username = identity.username
    );

    // 3. Register with the hub and report the session.
    let outbound = ctx.hub.register(&world_id, &player_id, &identity.username);
    spawn_progress(
        &ctx,
        identity.username.clone(),
        StatsDelta {
            sessions_played: 1,
            worlds_explored: 1,
            ..StatsDelta::default()
        },
    );

    // 4. Subscribe and greet.
    let Some(subscription) = ctx.manager.subscribe(&world_id) else {
        // The world vanished between join and subscribe.
        finish(&ctx, &world_id, &player_id, &identity.username).await;
        return;
    };
    let joined = ServerMessage::Joined {
        player: player_view,
        cell: cell.view(),
        config: ctx.config.snapshot(),
    };
    if send(&mut socket, &joined).await.is_err() {
        finish(&ctx, &world_id, &player_id, &identity.username).await;
        return;
    }

    // 5. Reader and writer, until either ends.
    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, subscription, outbound));
    let reader = read_loop(stream, &ctx, &world_id, &player_id);

    tokio::select! {
        () = reader => {}
        _ = &mut writer => {}
    }
    writer.abort();

    // 7. Cleanup; the subscription died with the writer task.
    finish(&ctx, &world_id, &player_id, &identity.username).await;
}

/// Dispatches inbound frames until the client disconnects. Malformed frames
/// are ignored and the connection stays open.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    ctx: &GatewayContext,
    world_id: &str,
    player_id: &str,
) {
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::SetTarget { target }) => {
                    ctx.manager.set_target(world_id, player_id, target);
                }
                Ok(ClientMessage::Split) => {
                    ctx.manager.split_player(world_id, player_id);
                }
                Err(_) => {}
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Forwards world snapshots and hub frames to the client. Ends when the
/// world disappears, the hub queues a close, or the socket fails.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut subscription: WorldSubscription,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    loop {
        tokio::select! {
            snapshot = subscription.recv() => match snapshot {
                Some(snapshot) => {
                    let frame = ServerMessage::World {
                        state: (*snapshot).clone(),
                    };
                    if send_sink(&mut sink, &frame).await.is_err() {
                        break;
                    }
                }
                None => {
                    // The world was removed (shutdown or a crashed runner).
                    let _ = send_sink(&mut sink, &ServerMessage::Error {
                        message: "World closed".to_owned(),
                    })
                    .await;
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::NORMAL,
                            reason: "World closed".into(),
                        })))
                        .await;
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Message(message)) => {
                    if send_sink(&mut sink, &message).await.is_err() {
                        break;
                    }
                }
                Some(OutboundFrame::Close { code, reason }) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
                None => break,
            },
        }
    }
}

/// Tears the session down and flushes the final progress delta.
async fn finish(ctx: &Arc<GatewayContext>, world_id: &str, player_id: &str, username: &str) {
    ctx.hub.unregister(world_id, player_id);
    if let Some(player) = ctx.manager.remove_player(world_id, player_id) {
        spawn_progress(
            ctx,
            username.to_owned(),
            StatsDelta {
                food_eaten: player.food_eaten,
                cells_eaten: player.cells_eaten,
                ..StatsDelta::default()
            },
        );
    }
    // When remove_player returns None the player was already eliminated and
    // the event listener has flushed their counters.
    log::info!("player {player_id} left world {world_id}");
}

fn spawn_progress(ctx: &Arc<GatewayContext>, username: String, delta: StatsDelta) {
    if delta.is_zero() {
        return;
    }
    let stats = Arc::clone(&ctx.stats);
    tokio::spawn(async move {
        stats.add_progress(&username, delta).await;
    });
}

async fn send(socket: &mut WebSocket, frame: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(text) => socket.send(Message::Text(text.into())).await,
        Err(error) => {
            log::error!("failed to encode frame: {error}");
            Ok(())
        }
    }
}

async fn send_sink(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(text) => sink.send(Message::Text(text.into())).await,
        Err(error) => {
            log::error!("failed to encode frame: {error}");
            Ok(())
        }
    }
}
