use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{corrupt, map_db_error, scope_predicate, to_total};
use crate::domain::customer::{Location, PhoneNumber};
use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::order::value_objects::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::domain::order::{Order, OrderItem, OrderSnapshot, ShippingAddress};
use crate::domain::pagination::{PageRequest, RecordScope};
use crate::domain::repositories::{OrderFilter, OrderRepository};

const ORDER_COLUMNS: &str = "id, customer_id, user_id, ship_recipient_name, ship_phone, \
    ship_street, ship_province_id, ship_province_name, ship_district_id, ship_district_name, \
    ship_ward_code, ship_ward_name, items_price, shipping_fee, total_price, payment_method, \
    payment_status, paid_at, status, note, is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    user_id: Option<Uuid>,
    ship_recipient_name: String,
    ship_phone: String,
    ship_street: String,
    ship_province_id: i32,
    ship_province_name: String,
    ship_district_id: i32,
    ship_district_name: String,
    ship_ward_code: String,
    ship_ward_name: String,
    items_price: Decimal,
    shipping_fee: Decimal,
    total_price: Decimal,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    paid_at: Option<DateTime<Utc>>,
    status: OrderStatus,
    note: Option<String>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        OrderItem {
            product_id: r.product_id,
            name: r.name,
            quantity: r.quantity,
            unit_price: r.unit_price,
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> RepositoryResult<Order> {
        let shipping_address = ShippingAddress {
            recipient_name: self.ship_recipient_name,
            phone: PhoneNumber::new(&self.ship_phone).map_err(|e| corrupt("phone", e))?,
            location: Location {
                street: self.ship_street,
                province_id: self.ship_province_id,
                province_name: self.ship_province_name,
                district_id: self.ship_district_id,
                district_name: self.ship_district_name,
                ward_code: self.ship_ward_code,
                ward_name: self.ship_ward_name,
            },
        };

        Ok(Order::from_persistence(OrderSnapshot {
            id: self.id,
            customer_id: self.customer_id,
            user_id: self.user_id,
            items,
            shipping_address,
            items_price: self.items_price,
            shipping_fee: self.shipping_fee,
            total_price: self.total_price,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            paid_at: self.paid_at,
            status: self.status,
            note: self.note,
            is_deleted: self.is_deleted,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }))
    }
}

/// PostgreSQL implementation of OrderRepository
///
/// Orders and their items are written together; stock moves happen in the
/// same transaction as the order write so a failed placement leaves no trace.
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> RepositoryResult<HashMap<Uuid, Vec<OrderItem>>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT order_id, product_id, name, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to load order items", e))?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            items.entry(row.order_id).or_default().push(row.into());
        }
        Ok(items)
    }
}

/// Writes the mutable fields only while the row still has the state the
/// order was read with
async fn update_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> RepositoryResult<()> {
    let expected = order.persisted_state();
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_status = $2, paid_at = $3, status = $4,
            is_deleted = $5, updated_at = $6
        WHERE id = $1 AND status = $7 AND payment_status = $8
        "#,
    )
    .bind(order.id())
    .bind(order.payment_status())
    .bind(order.paid_at())
    .bind(order.status())
    .bind(order.is_deleted())
    .bind(order.updated_at())
    .bind(expected.status)
    .bind(expected.payment_status)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_db_error("Failed to update order", e))?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
        .bind(order.id())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_db_error("Failed to check order", e))?;
    if exists {
        Err(RepositoryError::Stale(order.id()))
    } else {
        Err(RepositoryError::NotFound(order.id()))
    }
}

/// Items sorted by product id; stock rows are always locked in this order
/// so concurrent checkouts and cancellations cannot deadlock
fn in_lock_order(order: &Order) -> Vec<&OrderItem> {
    let mut items: Vec<&OrderItem> = order.items().iter().collect();
    items.sort_by_key(|item| item.product_id);
    items
}


fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter, scope: RecordScope) {
    query.push(" WHERE ").push(scope_predicate(scope));
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(customer_id) = filter.customer_id {
        query.push(" AND customer_id = ").push_bind(customer_id);
    }
    if let Some(user_id) = filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn place(&self, order: &Order) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        for item in in_lock_order(order) {
            let reserved = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $2, updated_at = NOW()
                WHERE id = $1 AND stock >= $2 AND is_deleted = FALSE
                "#,
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to reserve stock", e))?;

            if reserved.rows_affected() == 0 {
                // Dropping the transaction rolls back earlier reservations
                return Err(RepositoryError::InsufficientStock(item.product_id));
            }
        }

        let shipping = order.shipping_address();
        let location = &shipping.location;
        sqlx::query(&format!(
            "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
             $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)",
            ORDER_COLUMNS
        ))
        .bind(order.id())
        .bind(order.customer_id())
        .bind(order.user_id())
        .bind(&shipping.recipient_name)
        .bind(shipping.phone.as_str())
        .bind(&location.street)
        .bind(location.province_id)
        .bind(&location.province_name)
        .bind(location.district_id)
        .bind(&location.district_name)
        .bind(&location.ward_code)
        .bind(&location.ward_name)
        .bind(order.items_price())
        .bind(order.shipping_fee())
        .bind(order.total_price())
        .bind(order.payment_method())
        .bind(order.payment_status())
        .bind(order.paid_at())
        .bind(order.status())
        .bind(order.note())
        .bind(order.is_deleted())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("Failed to insert order", e))?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id())
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to insert order item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit order", e))?;

        Ok(())
    }

    async fn save(&self, order: &Order) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        update_order(&mut tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit order", e))?;

        Ok(())
    }

    async fn cancel(&self, order: &Order) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        // Lock the row so two concurrent cancels cannot both restock
        let current: Option<(OrderStatus, PaymentStatus)> = sqlx::query_as(
            "SELECT status, payment_status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order.id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_db_error("Failed to lock order", e))?;

        let Some((status, payment_status)) = current else {
            return Err(RepositoryError::NotFound(order.id()));
        };
        // an order that is already cancelled was restocked once
        let expected = order.persisted_state();
        if status == OrderStatus::Cancelled
            || (status, payment_status) != (expected.status, expected.payment_status)
        {
            return Err(RepositoryError::Stale(order.id()));
        }

        for item in in_lock_order(order) {
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(item.product_id)
                .bind(item.quantity)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_db_error("Failed to release stock", e))?;
        }

        update_order(&mut tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit cancellation", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE id = $1 AND {}",
            ORDER_COLUMNS,
            scope_predicate(scope)
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = self.load_items(&[id]).await?;
        row.into_order(items.remove(&id).unwrap_or_default()).map(Some)
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Order>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filters(&mut count, filter, scope);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count orders", e))?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
        push_filters(&mut select, filter, scope);
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list orders", e))?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;
        let orders = rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok((orders, to_total(total)))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to delete order", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::NewOrder;

    fn item(product_id: Uuid) -> OrderItem {
        OrderItem {
            product_id,
            name: "Chuột".into(),
            quantity: 1,
            unit_price: Decimal::new(120_000, 0),
        }
    }

    #[test]
    fn items_are_locked_by_product_id() {
        let (low, mid, high) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        let location =
            Location::new("1 Lê Lợi", (202, "HCM"), (1442, "Quận 1"), ("20109", "Bến Nghé")).unwrap();
        let order = Order::place(NewOrder {
            customer_id: Uuid::new_v4(),
            user_id: None,
            items: vec![item(high), item(low), item(mid)],
            shipping_address: ShippingAddress::new(
                "Lan",
                PhoneNumber::new("0912345678").unwrap(),
                location,
            )
            .unwrap(),
            shipping_fee: Decimal::ZERO,
            payment_method: PaymentMethod::Cod,
            note: None,
        })
        .unwrap();

        let locked: Vec<Uuid> = in_lock_order(&order).iter().map(|i| i.product_id).collect();
        assert_eq!(locked, vec![low, mid, high]);
        // the order keeps the items as submitted
        assert_eq!(order.items()[0].product_id, high);
    }
}
