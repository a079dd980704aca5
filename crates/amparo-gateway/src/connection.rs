use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use amparo_store::{RequestStore, Subscription};
use amparo_types::api::Claims;
use amparo_types::events::{GatewayCommand, GatewayEvent};
use amparo_types::models::Marker;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a single WebSocket connection: Identify handshake, Ready, then a
/// loop that relays live-query snapshots and accepts Watch commands. A new
/// Watch closes the previous store subscription before the next one opens.
pub async fn handle_connection(socket: WebSocket, store: Arc<RequestStore>, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let Some(claims) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };

    info!("{} ({}) connected to gateway", claims.name, claims.sub);

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        user_id: claims.sub,
        name: claims.name.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut watch: Option<Subscription> = None;
    let mut watched_city = String::new();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            snapshot = next_snapshot(&mut watch) => {
                match snapshot {
                    Some(markers) => {
                        let event = GatewayEvent::Snapshot {
                            city: watched_city.clone(),
                            markers,
                        };
                        let text = serde_json::to_string(&event).unwrap();
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Subscription closed underneath us; stop polling it.
                    None => watch = None,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GatewayCommand>(&text) {
                            Ok(GatewayCommand::Identify { .. }) => {} // Already handled

                            Ok(GatewayCommand::Watch { city, statuses }) => {
                                info!(
                                    "{} ({}) watching {} ({} statuses)",
                                    claims.name,
                                    claims.sub,
                                    city,
                                    statuses.len()
                                );
                                if let Some(mut previous) = watch.take() {
                                    previous.close();
                                }
                                let statuses =
                                    if statuses.is_empty() { None } else { Some(statuses) };
                                let store = store.clone();
                                let target = city.clone();
                                let opened = tokio::task::spawn_blocking(move || {
                                    store.subscribe(&target, statuses)
                                })
                                .await;
                                match opened {
                                    Ok(Ok(subscription)) => {
                                        watched_city = city;
                                        watch = Some(subscription);
                                    }
                                    Ok(Err(e)) => {
                                        warn!("watch on {} failed: {}", city, e);
                                    }
                                    Err(e) => {
                                        warn!("watch task failed: {}", e);
                                    }
                                }
                            }

                            Err(e) => {
                                warn!(
                                    "{} ({}) bad command: {} -- raw: {}",
                                    claims.name,
                                    claims.sub,
                                    e,
                                    &text[..text.len().min(200)]
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_received = true;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }

            _ = heartbeat.tick() => {
                if std::mem::take(&mut pong_received) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!(
                            "Heartbeat timeout (missed {} pongs), dropping connection",
                            missed_heartbeats
                        );
                        break;
                    }
                }
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(mut subscription) = watch {
        subscription.close();
    }
    info!("{} ({}) disconnected from gateway", claims.name, claims.sub);
}

async fn next_snapshot(watch: &mut Option<Subscription>) -> Option<Vec<Marker>> {
    match watch {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Claims> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg
                && let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
            {
                let token_data = decode::<Claims>(
                    &token,
                    &DecodingKey::from_secret(jwt_secret.as_bytes()),
                    &Validation::default(),
                )
                .ok()?;

                return Some(token_data.claims);
            }
        }
        None
    });

    timeout.await.ok().flatten()
}
