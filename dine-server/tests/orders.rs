mod common;

use common::{drain, fixture, line};
use dine_server::OrderError;
use dine_server::SessionError;
use shared::message::{FanoutEvent, Room};
use shared::models::{CreateOrderRequest, OrderTarget, SessionLookup};
use shared::order::{CloseReason, OrderStatus};

async fn order_count(pool: &sqlx::SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn totals_follow_tax_rate() {
    let fx = fixture().await;
    let mut kitchen = fx.subscribe(Room::Kitchen);

    let order = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(
            fx.restaurant_id,
            OrderTarget::Table(fx.table(0).id),
            vec![line(fx.p1(), 2)],
        ))
        .await
        .unwrap();

    assert_eq!(order.subtotal, 20.0);
    assert_eq!(order.tax, 1.6);
    assert_eq!(order.total, 21.6);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.order_number, "000001");
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].unit_price, 10.0);
    assert_eq!(order.items[0].product_name, "P1");
    assert_eq!(order.table_id, Some(fx.table(0).id));

    let events = drain(&mut kitchen);
    assert_eq!(events.len(), 1);
    match &events[0].event {
        FanoutEvent::OrderNew(o) => {
            assert_eq!(o.id, order.id);
            assert_eq!(o.items.len(), 1);
        }
        other => panic!("unexpected event {}", other.name()),
    }
}

#[tokio::test]
async fn price_is_captured_at_order_time() {
    let fx = fixture().await;
    let rid = fx.restaurant_id;
    let order = fx
        .state
        .orders
        .create_order(CreateOrderRequest::takeaway(rid, vec![line(fx.p2(), 3)]))
        .await
        .unwrap();

    sqlx::query("UPDATE products SET price = 99 WHERE id = ?")
        .bind(fx.p2())
        .execute(&fx.state.db.pool)
        .await
        .unwrap();

    let stored = fx.state.orders.find_order(rid, order.id).await.unwrap();
    assert_eq!(stored.items[0].unit_price, 4.5);
    assert_eq!(stored.subtotal, 13.5);
}

#[tokio::test]
async fn empty_cart_writes_nothing() {
    let fx = fixture().await;
    let err = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(
            fx.restaurant_id,
            OrderTarget::Table(fx.table(0).id),
            vec![],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::CartEmpty));
    assert_eq!(order_count(&fx.state.db.pool).await, 0);
    // no session opened either
    assert!(fx.state.registry.active_sessions(fx.restaurant_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_product_rejected() {
    let fx = fixture().await;
    let err = fx
        .state
        .orders
        .create_order(CreateOrderRequest::takeaway(
            fx.restaurant_id,
            vec![line(fx.p1(), 1), line(123_456, 1)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ProductNotFound(123_456)));
    assert_eq!(order_count(&fx.state.db.pool).await, 0);
}

#[tokio::test]
async fn inactive_product_cannot_be_ordered() {
    let fx = fixture().await;
    dine_server::db::repository::product::set_active(&fx.state.db.pool, fx.p2(), false)
        .await
        .unwrap();
    let err = fx
        .state
        .orders
        .create_order(CreateOrderRequest::takeaway(fx.restaurant_id, vec![line(fx.p2(), 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::ProductNotFound(id) if id == fx.p2()));
}

#[tokio::test]
async fn ordering_against_closed_session_fails() {
    let fx = fixture().await;
    let rid = fx.restaurant_id;
    let session = fx
        .state
        .registry
        .resolve_or_create_session(rid, SessionLookup::Table(fx.table(1).id))
        .await
        .unwrap()
        .session;
    fx.state
        .registry
        .close_session(rid, session.id, CloseReason::Manual)
        .await
        .unwrap();

    let err = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(
            rid,
            OrderTarget::SessionCode(session.session_code.clone()),
            vec![line(fx.p1(), 1)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Session(SessionError::SessionClosed(_))));

    let err = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(
            rid,
            OrderTarget::SessionCode("ZZZZZZZZ".into()),
            vec![line(fx.p1(), 1)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Session(SessionError::SessionNotFound(_))));
    assert_eq!(order_count(&fx.state.db.pool).await, 0);
}

#[tokio::test]
async fn status_change_reaches_every_room() {
    let fx = fixture().await;
    let rid = fx.restaurant_id;
    let order = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(
            rid,
            OrderTarget::Table(fx.table(2).id),
            vec![line(fx.p1(), 1)],
        ))
        .await
        .unwrap();

    let mut rooms: Vec<_> = Room::ALL.iter().map(|r| fx.subscribe(*r)).collect();
    fx.state
        .orders
        .update_status(rid, order.id, OrderStatus::Accepted)
        .await
        .unwrap();

    let mut event_ids = Vec::new();
    for rx in &mut rooms {
        let events = drain(rx);
        assert_eq!(events.len(), 1);
        match &events[0].event {
            FanoutEvent::OrderUpdated(p) => {
                assert_eq!(p.order_id, order.id);
                assert_eq!(p.status, OrderStatus::Accepted);
                assert_eq!(p.previous_status, OrderStatus::Pending);
                assert_eq!(p.table_number.as_deref(), Some("3"));
            }
            other => panic!("unexpected event {}", other.name()),
        }
        event_ids.push(events[0].event_id);
    }
    // one logical event, one id
    assert!(event_ids.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn full_lifecycle_is_audited() {
    let fx = fixture().await;
    let rid = fx.restaurant_id;
    let order = fx
        .state
        .orders
        .create_order(CreateOrderRequest::takeaway(rid, vec![line(fx.p2(), 1)]))
        .await
        .unwrap();

    let path = [
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Paid,
    ];
    for next in path {
        fx.state.orders.update_status(rid, order.id, next).await.unwrap();
    }

    let err = fx
        .state
        .orders
        .update_status(rid, order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition(_)));

    let history = fx.state.orders.status_history(rid, order.id).await.unwrap();
    assert_eq!(history.len(), path.len());
    assert_eq!(history[0].0, OrderStatus::Pending);
    assert!(history.iter().all(|(_, _, kind)| kind == "VALIDATED"));
    assert_eq!(history.last().unwrap().1, OrderStatus::Paid);

    assert!(fx.state.orders.active_orders(rid).await.unwrap().is_empty());
}

#[tokio::test]
async fn session_orders_newest_first() {
    let fx = fixture().await;
    let rid = fx.restaurant_id;
    let target = OrderTarget::Table(fx.table(0).id);

    let first = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(rid, target.clone(), vec![line(fx.p1(), 1)]))
        .await
        .unwrap();
    fx.clock.advance(std::time::Duration::from_secs(60));
    let second = fx
        .state
        .orders
        .create_order(CreateOrderRequest::dine_in(rid, target, vec![line(fx.p2(), 2)]))
        .await
        .unwrap();
    assert_eq!(first.session_id, second.session_id);

    let session = fx
        .state
        .registry
        .find_session(rid, first.session_id.unwrap())
        .await
        .unwrap();
    let orders = fx
        .state
        .orders
        .session_orders(rid, &session.session_code)
        .await
        .unwrap();
    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(orders[0].items.len(), 1);

    let active = fx.state.orders.active_orders(rid).await.unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].id, first.id);
}
