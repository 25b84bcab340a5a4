//! dine-client against a live server
mod common;

use std::net::SocketAddr;
use std::time::Duration;

use common::{Fixture, fixture, line};
use dine_client::{
    ClientConfig, ConnectionHealth, FanoutClient, OfflineQueue, ReconnectPolicy, SyncState,
};
use shared::message::{FanoutEvent, Role, Room, RoomMessage};
use shared::models::{CreateOrderRequest, OrderTarget};
use shared::order::OrderStatus;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const WAIT: Duration = Duration::from_secs(5);

fn serve_on(listener: TcpListener, fx: &Fixture) -> oneshot::Sender<()> {
    let (stop, stopped) = oneshot::channel::<()>();
    let state = fx.state.clone();
    tokio::spawn(async move {
        dine_server::core::serve(listener, state, async {
            let _ = stopped.await;
        })
        .await
        .unwrap();
    });
    stop
}

async fn start(fx: &Fixture) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, serve_on(listener, fx))
}

fn config(addr: SocketAddr, fx: &Fixture, role: Role) -> ClientConfig {
    ClientConfig::lan(format!("ws://{addr}"), fx.restaurant_id, role)
        .with_heartbeat(Duration::from_millis(50))
        .with_reconnect(ReconnectPolicy::new(
            Duration::from_millis(20),
            Duration::from_millis(100),
        ))
}

async fn next_event(client: &mut FanoutClient) -> RoomMessage {
    tokio::time::timeout(WAIT, client.next_event())
        .await
        .expect("timed out waiting for event")
        .expect("client stopped")
}

#[tokio::test]
async fn kitchen_display_follows_order_lifecycle() {
    let fx = fixture().await;
    let rid = fx.restaurant_id;
    let (addr, _stop) = start(&fx).await;

    let mut client = FanoutClient::spawn(config(addr, &fx, Role::Kitchen));
    tokio::time::timeout(WAIT, client.wait_connected())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.current_status().rooms, vec![Room::Kitchen]);

    let order = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(
            rid,
            OrderTarget::Table(fx.table(0).id),
            vec![line(fx.p1(), 2)],
        ))
        .await
        .unwrap();
    fx.state
        .orders
        .update_status(rid, order.id, OrderStatus::Accepted)
        .await
        .unwrap();

    let first = next_event(&mut client).await;
    assert_eq!(first.room, Room::Kitchen);
    match first.event {
        FanoutEvent::OrderNew(o) => assert_eq!(o.id, order.id),
        other => panic!("expected order:new, got {}", other.name()),
    }
    let second = next_event(&mut client).await;
    match second.event {
        FanoutEvent::OrderUpdated(p) => {
            assert_eq!(p.order_id, order.id);
            assert_eq!(p.previous_status, OrderStatus::Pending);
            assert_eq!(p.status, OrderStatus::Accepted);
        }
        other => panic!("expected order:updated, got {}", other.name()),
    }

    // a few heartbeats on loopback
    let mut status = client.status();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.rtt.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.current_status().health, ConnectionHealth::Healthy);

    client.shutdown().await;
}

#[tokio::test]
async fn room_changes_are_confirmed() {
    let fx = fixture().await;
    let (addr, _stop) = start(&fx).await;

    let client = FanoutClient::spawn(config(addr, &fx, Role::Admin).with_rooms([Room::Admin]));
    tokio::time::timeout(WAIT, client.wait_connected())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.current_status().rooms, vec![Room::Admin]);

    client.join(Room::Kitchen).await.unwrap();
    let mut status = client.status();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.rooms.contains(&Room::Kitchen)))
        .await
        .unwrap()
        .unwrap();

    client.leave(Room::Admin).await.unwrap();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.rooms == vec![Room::Kitchen]))
        .await
        .unwrap()
        .unwrap();

    client.shutdown().await;
}

#[tokio::test]
async fn client_retries_until_server_comes_up() {
    let fx = fixture().await;
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = reserved.local_addr().unwrap();
    drop(reserved);

    let client = FanoutClient::spawn(config(addr, &fx, Role::Service));
    let mut status = client.status();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.last_error.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert!(!client.current_status().connected);

    let listener = TcpListener::bind(addr).await.unwrap();
    let _stop = serve_on(listener, &fx);

    tokio::time::timeout(WAIT, client.wait_connected())
        .await
        .unwrap()
        .unwrap();
    let connected = client.current_status();
    assert_eq!(connected.connections, 1);
    assert_eq!(connected.rooms, vec![Room::Service]);

    client.shutdown().await;
}

#[tokio::test]
async fn offline_orders_replay_through_orchestrator() {
    let fx = fixture().await;
    let rid = fx.restaurant_id;
    let dir = tempfile::tempdir().unwrap();
    let queue = OfflineQueue::open(dir.path().join("offline.redb")).unwrap();

    let good = queue
        .enqueue(CreateOrderRequest::dine_in(
            rid,
            OrderTarget::Table(fx.table(1).id),
            vec![line(fx.p2(), 2)],
        ))
        .unwrap();
    let stale = queue
        .enqueue(CreateOrderRequest::dine_in(
            rid,
            OrderTarget::SessionCode("NOPE42".into()),
            vec![line(fx.p1(), 1)],
        ))
        .unwrap();

    let orders = fx.state.orders.clone();
    let report = queue
        .sync_pending(
            |entry| {
                let orders = orders.clone();
                async move {
                    orders
                        .create_order(entry.request)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            },
            1,
        )
        .await
        .unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(report.gave_up, 1);
    assert_eq!(queue.get(good.id).unwrap().unwrap().state, SyncState::Synced);
    let failed = queue.get(stale.id).unwrap().unwrap();
    assert_eq!(failed.state, SyncState::Failed);
    assert!(failed.last_error.is_some());

    let active = fx.state.orders.active_orders(rid).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].subtotal, 9.0);
}
