//! 订单编排
//!
//! Order creation and status changes. Each mutation is one transaction;
//! fan-out happens after commit.
//!
//! Creation steps:
//! 1. reject empty carts and bad quantities / adjustments
//! 2. capture the current price of each product (restaurant scoped)
//! 3. resolve the dine-in session (opening one for a table if needed)
//! 4. in one transaction: bump the restaurant order counter (first write),
//!    re-check the session is still active, insert order and items
//! 5. emit `order:new`

use std::sync::Arc;

use shared::message::{FanoutEvent, OrderUpdatedPayload};
use shared::models::{
    CreateOrderRequest, Order, OrderItem, OrderTarget, SessionLookup, TableSession,
};
use shared::order::{OrderStatus, OrderType, validate_transition};
use sqlx::SqlitePool;

use super::error::{OrderError, OrderResult};
use super::money;
use crate::db::repository::{RepoError, dining_table, order, product, restaurant, table_session};
use crate::message::FanoutChannel;
use crate::sessions::{Clock, SessionError, SessionRegistry};

#[derive(Clone, Debug)]
pub struct OrderOrchestrator {
    pool: SqlitePool,
    registry: SessionRegistry,
    fanout: FanoutChannel,
    clock: Arc<dyn Clock>,
}

impl OrderOrchestrator {
    pub fn new(
        pool: SqlitePool,
        registry: SessionRegistry,
        fanout: FanoutChannel,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            registry,
            fanout,
            clock,
        }
    }

    /// Place an order
    pub async fn create_order(&self, req: CreateOrderRequest) -> OrderResult<Order> {
        let restaurant_id = req.restaurant_id;
        if req.items.is_empty() {
            return Err(OrderError::CartEmpty);
        }
        for item in &req.items {
            money::validate_quantity(item.product_id, item.quantity)?;
        }
        money::validate_adjustments(req.tip, req.discount)?;

        let restaurant = restaurant::find_by_id(&self.pool, restaurant_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Restaurant {restaurant_id} not found")))?;

        // 价格快照：下单时的价格即为明细单价
        let mut items = Vec::with_capacity(req.items.len());
        for input in &req.items {
            let p = product::find_active(&self.pool, restaurant_id, input.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(input.product_id))?;
            items.push(OrderItem {
                id: 0,
                order_id: 0,
                product_id: p.id,
                product_name: p.name,
                quantity: input.quantity,
                unit_price: p.price,
                note: input.note.clone(),
            });
        }
        let lines: Vec<(f64, i32)> = items.iter().map(|i| (i.unit_price, i.quantity)).collect();
        let totals = money::compute_totals(&lines, restaurant.tax_rate, req.tip, req.discount)?;

        let session = self.resolve_target(&req).await?;

        let now = self.clock.now_millis();
        let mut tx = self.pool.begin().await?;
        let seq = restaurant::next_order_seq(&mut *tx, restaurant_id).await?;

        // 会话可能在事务开始前被关闭
        if let Some(s) = &session {
            let current = table_session::find_by_id(&mut *tx, s.id).await?;
            if !current.is_some_and(|c| c.active) {
                return Err(SessionError::SessionClosed(s.session_code.clone()).into());
            }
        }

        let mut new_order = Order {
            id: shared::util::snowflake_id(),
            restaurant_id,
            order_number: restaurant::format_order_number(seq),
            table_id: session.as_ref().map(|s| s.table_id),
            session_id: session.as_ref().map(|s| s.id),
            customer_name: req
                .customer_name
                .clone()
                .or_else(|| session.as_ref().and_then(|s| s.customer_name.clone())),
            order_type: req.order_type,
            status: OrderStatus::Pending,
            subtotal: totals.subtotal,
            tax: totals.tax,
            tip: totals.tip,
            discount: totals.discount,
            total: totals.total,
            notes: req.notes.clone(),
            created_at: now,
            updated_at: now,
            items,
        };

        if let Err(e) =
            order::insert_with_fresh_id(&mut tx, &mut new_order, shared::util::snowflake_id).await
        {
            if order::is_number_conflict(&e) {
                tracing::warn!(
                    restaurant_id,
                    order_number = %new_order.order_number,
                    "Order number collision, creation aborted"
                );
                return Err(OrderError::NumberConflict(new_order.order_number));
            }
            return Err(e.into());
        }
        tx.commit().await?;

        tracing::info!(
            restaurant_id,
            order_id = new_order.id,
            order_number = %new_order.order_number,
            session_id = ?new_order.session_id,
            items = new_order.items.len(),
            total = new_order.total,
            "Order created"
        );

        self.fanout
            .emit(restaurant_id, FanoutEvent::OrderNew(Box::new(new_order.clone())))
            .await;
        Ok(new_order)
    }

    /// Session the order belongs to; `None` for takeaway
    async fn resolve_target(&self, req: &CreateOrderRequest) -> OrderResult<Option<TableSession>> {
        if !req.order_type.requires_session() {
            if req.target.is_some() {
                tracing::debug!(restaurant_id = req.restaurant_id, "Takeaway order target ignored");
            }
            return Ok(None);
        }

        let lookup = match &req.target {
            Some(OrderTarget::SessionCode(code)) => SessionLookup::Code(code.clone()),
            Some(OrderTarget::Table(table_id)) => SessionLookup::Table(*table_id),
            None => return Err(OrderError::TargetRequired),
        };
        let resolved = self
            .registry
            .resolve_or_create_session(req.restaurant_id, lookup)
            .await?;
        if !resolved.session.active {
            return Err(SessionError::SessionClosed(resolved.session.session_code).into());
        }
        Ok(Some(resolved.session))
    }

    /// Move an order one step along its lifecycle.
    ///
    /// The write only lands if the row still holds the status that was
    /// validated; otherwise [`OrderError::StatusChanged`].
    pub async fn update_status(
        &self,
        restaurant_id: i64,
        order_id: i64,
        next: OrderStatus,
    ) -> OrderResult<Order> {
        let current = order::find_header(&self.pool, restaurant_id, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let transition = validate_transition(current.status, next)?;

        let now = self.clock.now_millis();
        let mut tx = self.pool.begin().await?;
        if !order::apply_transition(&mut tx, order_id, &transition, now).await? {
            return Err(OrderError::StatusChanged(order_id));
        }
        tx.commit().await?;

        let updated = order::find_by_id(&self.pool, restaurant_id, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        let table_number = match updated.table_id {
            Some(table_id) => dining_table::find_by_id(&self.pool, restaurant_id, table_id)
                .await?
                .map(|t| t.number),
            None => None,
        };

        tracing::info!(
            restaurant_id,
            order_id,
            from = %transition.from(),
            to = %transition.to(),
            "Order status updated"
        );

        self.fanout
            .emit(
                restaurant_id,
                FanoutEvent::OrderUpdated(OrderUpdatedPayload {
                    order_id,
                    order_number: updated.order_number.clone(),
                    status: transition.to(),
                    previous_status: transition.from(),
                    table_number,
                }),
            )
            .await;
        Ok(updated)
    }

    pub async fn find_order(&self, restaurant_id: i64, order_id: i64) -> OrderResult<Order> {
        order::find_by_id(&self.pool, restaurant_id, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Orders with pending kitchen or service work, oldest first
    pub async fn active_orders(&self, restaurant_id: i64) -> OrderResult<Vec<Order>> {
        Ok(order::find_unsettled(&self.pool, restaurant_id).await?)
    }

    /// Orders placed under a session code, newest first
    pub async fn session_orders(&self, restaurant_id: i64, session_code: &str) -> OrderResult<Vec<Order>> {
        let session = self.registry.session_by_code(restaurant_id, session_code).await?;
        Ok(order::find_by_session_with_items(&self.pool, session.id).await?)
    }

    /// Status audit trail: `(from, to, kind)` oldest first
    pub async fn status_history(
        &self,
        restaurant_id: i64,
        order_id: i64,
    ) -> OrderResult<Vec<(OrderStatus, OrderStatus, String)>> {
        // scope check
        self.find_order(restaurant_id, order_id).await?;
        Ok(order::status_log(&self.pool, order_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::message::RoomHub;
    use crate::sessions::ManualClock;
    use shared::models::{OrderItemInput, ProductCreate, RestaurantCreate};

    async fn setup() -> (OrderOrchestrator, i64, i64) {
        let db = DbService::in_memory().await.unwrap();
        let r = restaurant::create(
            &db.pool,
            RestaurantCreate {
                name: "R".into(),
                tax_rate: 0.1,
            },
        )
        .await
        .unwrap();
        let p = product::create(
            &db.pool,
            r.id,
            ProductCreate {
                name: "Tea".into(),
                price: 2.5,
            },
        )
        .await
        .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let fanout = FanoutChannel::new(Arc::new(RoomHub::default()));
        let registry = SessionRegistry::new(db.pool.clone(), fanout.clone(), clock.clone());
        (
            OrderOrchestrator::new(db.pool, registry, fanout, clock),
            r.id,
            p.id,
        )
    }

    fn line(product_id: i64, quantity: i32) -> OrderItemInput {
        OrderItemInput {
            product_id,
            quantity,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_takeaway_order_numbers_increase() {
        let (orders, rid, pid) = setup().await;
        let first = orders
            .create_order(CreateOrderRequest::takeaway(rid, vec![line(pid, 4)]))
            .await
            .unwrap();
        assert_eq!(first.order_number, "000001");
        assert_eq!(first.order_type, OrderType::Takeaway);
        assert_eq!(first.session_id, None);
        assert_eq!(first.subtotal, 10.0);
        assert_eq!(first.tax, 1.0);
        assert_eq!(first.total, 11.0);

        let second = orders
            .create_order(CreateOrderRequest::takeaway(rid, vec![line(pid, 1)]))
            .await
            .unwrap();
        assert_eq!(second.order_number, "000002");
    }

    #[tokio::test]
    async fn test_dine_in_requires_target() {
        let (orders, rid, pid) = setup().await;
        let mut req = CreateOrderRequest::takeaway(rid, vec![line(pid, 1)]);
        req.order_type = OrderType::DineIn;
        let err = orders.create_order(req).await.unwrap_err();
        assert!(matches!(err, OrderError::TargetRequired));
    }

    #[tokio::test]
    async fn test_invalid_quantity_rejected_before_lookup() {
        let (orders, rid, _) = setup().await;
        let err = orders
            .create_order(CreateOrderRequest::takeaway(rid, vec![line(999, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidQuantity { quantity: 0, .. }));
    }

    #[tokio::test]
    async fn test_illegal_status_step() {
        let (orders, rid, pid) = setup().await;
        let o = orders
            .create_order(CreateOrderRequest::takeaway(rid, vec![line(pid, 1)]))
            .await
            .unwrap();
        let err = orders
            .update_status(rid, o.id, OrderStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));

        let err = orders
            .update_status(rid, 42, OrderStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::OrderNotFound(42)));
    }
}
