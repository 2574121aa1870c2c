use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

use super::value_objects::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::domain::customer::value_objects::PhoneNumber;
use crate::domain::customer::Location;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::validation::{optional_text, required_text};

const MAX_QUANTITY_PER_LINE: i32 = 100;

/// One product line on an order
///
/// Name and unit price are copied from the product when the order is
/// placed so later catalog edits do not change past orders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Where the parcel goes, copied from the checkout form
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: PhoneNumber,
    pub location: Location,
}

impl ShippingAddress {
    pub fn new(recipient_name: &str, phone: PhoneNumber, location: Location) -> DomainResult<Self> {
        Ok(Self {
            recipient_name: required_text("Recipient name", recipient_name, 100)?,
            phone,
            location,
        })
    }
}

/// Everything needed to place an order, after products have been looked up
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub shipping_fee: Decimal,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

/// Status pair of an order as it was last read from or written to storage
///
/// Repositories only apply a write when the stored row still has this
/// state, so a stale copy cannot overwrite a newer transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderState {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

/// Order aggregate root
///
/// # Invariants
/// - At least one item; quantities between 1 and 100; no product twice
/// - `items_price` is the sum of line totals
/// - `total_price = items_price + shipping_fee`
/// - Status transitions follow [`OrderStatus::can_transition_to`]
/// - A cancelled order cannot be paid
#[derive(Debug, Clone)]
pub struct Order {
    id: Uuid,
    customer_id: Uuid,
    user_id: Option<Uuid>,
    items: Vec<OrderItem>,
    shipping_address: ShippingAddress,
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
    persisted: OrderState,
}

/// Flat view of every order field, used to rebuild the aggregate from storage
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub items_price: Decimal,
    pub shipping_fee: Decimal,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Places a new order
    ///
    /// # Business Rules Enforced
    /// - Items must be non-empty, each quantity 1..=100, no duplicate products
    /// - Unit prices and the shipping fee cannot be negative
    /// - Initial status is Pending and payment is Unpaid
    ///
    /// # Example
    /// ```
    /// use online_store_api::domain::customer::{Location, PhoneNumber};
    /// use online_store_api::domain::order::{NewOrder, Order, OrderItem, ShippingAddress};
    /// use online_store_api::domain::order::value_objects::{OrderStatus, PaymentMethod};
    /// use rust_decimal::Decimal;
    /// use uuid::Uuid;
    ///
    /// let location = Location::new("1 Lê Lợi", (202, "HCM"), (1442, "Quận 1"), ("20109", "Bến Nghé")).unwrap();
    /// let shipping = ShippingAddress::new("Lan", PhoneNumber::new("0912345678").unwrap(), location).unwrap();
    /// let order = Order::place(NewOrder {
    ///     customer_id: Uuid::new_v4(),
    ///     user_id: None,
    ///     items: vec![OrderItem {
    ///         product_id: Uuid::new_v4(),
    ///         name: "Ốp lưng".into(),
    ///         quantity: 2,
    ///         unit_price: Decimal::new(50_000, 0),
    ///     }],
    ///     shipping_address: shipping,
    ///     shipping_fee: Decimal::new(30_000, 0),
    ///     payment_method: PaymentMethod::Cod,
    ///     note: None,
    /// }).expect("valid order");
    ///
    /// assert_eq!(order.status(), OrderStatus::Pending);
    /// assert_eq!(order.total_price(), Decimal::new(130_000, 0));
    /// ```
    pub fn place(new_order: NewOrder) -> DomainResult<Self> {
        if new_order.items.is_empty() {
            return Err(DomainError::validation("Order must contain at least one item"));
        }

        let mut seen = HashSet::new();
        for item in &new_order.items {
            if item.quantity < 1 || item.quantity > MAX_QUANTITY_PER_LINE {
                return Err(DomainError::validation(format!(
                    "Quantity for {} must be between 1 and {}",
                    item.name, MAX_QUANTITY_PER_LINE
                )));
            }
            if item.unit_price.is_sign_negative() {
                return Err(DomainError::validation("Unit price cannot be negative"));
            }
            if !seen.insert(item.product_id) {
                return Err(DomainError::validation(format!(
                    "Product {} appears more than once",
                    item.product_id
                )));
            }
        }

        if new_order.shipping_fee.is_sign_negative() {
            return Err(DomainError::validation("Shipping fee cannot be negative"));
        }

        let items_price: Decimal = new_order.items.iter().map(OrderItem::line_total).sum();
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            customer_id: new_order.customer_id,
            user_id: new_order.user_id,
            items: new_order.items,
            shipping_address: new_order.shipping_address,
            items_price,
            shipping_fee: new_order.shipping_fee,
            total_price: items_price + new_order.shipping_fee,
            payment_method: new_order.payment_method,
            payment_status: PaymentStatus::Unpaid,
            paid_at: None,
            status: OrderStatus::Pending,
            note: optional_text("Note", new_order.note.as_deref(), 1000)?,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            persisted: OrderState {
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Unpaid,
            },
        })
    }

    /// Reconstructs an order from storage without re-running validation
    pub fn from_persistence(snapshot: OrderSnapshot) -> Self {
        Self {
            id: snapshot.id,
            customer_id: snapshot.customer_id,
            user_id: snapshot.user_id,
            items: snapshot.items,
            shipping_address: snapshot.shipping_address,
            items_price: snapshot.items_price,
            shipping_fee: snapshot.shipping_fee,
            total_price: snapshot.total_price,
            payment_method: snapshot.payment_method,
            payment_status: snapshot.payment_status,
            paid_at: snapshot.paid_at,
            status: snapshot.status,
            note: snapshot.note,
            is_deleted: snapshot.is_deleted,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            persisted: OrderState {
                status: snapshot.status,
                payment_status: snapshot.payment_status,
            },
        }
    }

    /// Moves the order to `next`
    ///
    /// # Business Rules
    /// - The transition must be allowed by [`OrderStatus::can_transition_to`]
    /// - Delivering a cash-on-delivery order records the payment
    /// - Cancelling an order that was paid online marks it refunded
    pub fn transition_to(&mut self, next: OrderStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        match next {
            OrderStatus::Delivered if self.payment_method == PaymentMethod::Cod => {
                self.payment_status = PaymentStatus::Paid;
                self.paid_at = Some(now);
            }
            OrderStatus::Cancelled if self.payment_status == PaymentStatus::Paid => {
                self.payment_status = PaymentStatus::Refunded;
            }
            _ => {}
        }

        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.transition_to(OrderStatus::Cancelled)
    }

    /// Records a successful online payment
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::validation("Cannot pay for a cancelled order"));
        }
        self.payment_status = PaymentStatus::Paid;
        self.paid_at = Some(at);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a failed online payment attempt; a paid order stays paid
    pub fn mark_payment_failed(&mut self) {
        if self.payment_status != PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Failed;
            self.updated_at = Utc::now();
        }
    }

    /// True when the order can still be sent to the online gateway
    pub fn awaits_online_payment(&self) -> bool {
        self.payment_method == PaymentMethod::Vnpay
            && self.status != OrderStatus::Cancelled
            && self.payment_status != PaymentStatus::Paid
            && !self.is_deleted
    }

    /// True when `user_id` placed this order
    pub fn is_placed_by(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.updated_at = Utc::now();
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
        self.updated_at = Utc::now();
    }

    // ===== Getters =====

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn customer_id(&self) -> Uuid {
        self.customer_id
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn items_price(&self) -> Decimal {
        self.items_price
    }

    pub fn shipping_fee(&self) -> Decimal {
        self.shipping_fee
    }

    pub fn total_price(&self) -> Decimal {
        self.total_price
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// State the stored row is expected to have before this order is written
    pub fn persisted_state(&self) -> OrderState {
        self.persisted
    }

    /// Records that storage now holds the current state
    pub fn mark_persisted(&mut self) {
        self.persisted = self.state();
    }

    pub fn state(&self) -> OrderState {
        OrderState {
            status: self.status,
            payment_status: self.payment_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingAddress {
        let location = Location::new(
            "45 Trần Phú",
            (201, "Hà Nội"),
            (1484, "Ba Đình"),
            ("1A0101", "Phúc Xá"),
        )
        .unwrap();
        ShippingAddress::new("Hùng", PhoneNumber::new("0987654321").unwrap(), location).unwrap()
    }

    fn item(quantity: i32, price: i64) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            name: "Tai nghe".into(),
            quantity,
            unit_price: Decimal::new(price, 0),
        }
    }

    fn new_order(items: Vec<OrderItem>, method: PaymentMethod) -> NewOrder {
        NewOrder {
            customer_id: Uuid::new_v4(),
            user_id: None,
            items,
            shipping_address: shipping(),
            shipping_fee: Decimal::new(25_000, 0),
            payment_method: method,
            note: None,
        }
    }

    #[test]
    fn totals_are_computed() {
        let order = Order::place(new_order(
            vec![item(2, 100_000), item(1, 50_000)],
            PaymentMethod::Cod,
        ))
        .unwrap();

        assert_eq!(order.items_price(), Decimal::new(250_000, 0));
        assert_eq!(order.total_price(), Decimal::new(275_000, 0));
        assert_eq!(order.payment_status(), PaymentStatus::Unpaid);
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn empty_order_is_rejected() {
        assert!(Order::place(new_order(vec![], PaymentMethod::Cod)).is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(Order::place(new_order(vec![item(0, 1)], PaymentMethod::Cod)).is_err());
    }

    #[test]
    fn excessive_quantity_is_rejected() {
        assert!(Order::place(new_order(vec![item(101, 1)], PaymentMethod::Cod)).is_err());
    }

    #[test]
    fn duplicate_product_is_rejected() {
        let line = item(1, 10_000);
        let result = Order::place(new_order(vec![line.clone(), line], PaymentMethod::Cod));
        assert!(result.is_err());
    }

    #[test]
    fn negative_shipping_fee_is_rejected() {
        let mut draft = new_order(vec![item(1, 10_000)], PaymentMethod::Cod);
        draft.shipping_fee = Decimal::new(-1, 0);
        assert!(Order::place(draft).is_err());
    }

    #[test]
    fn delivering_cod_order_marks_it_paid() {
        let mut order = Order::place(new_order(vec![item(1, 10_000)], PaymentMethod::Cod)).unwrap();
        order.transition_to(OrderStatus::Confirmed).unwrap();
        order.transition_to(OrderStatus::Shipping).unwrap();
        order.transition_to(OrderStatus::Delivered).unwrap();

        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert!(order.paid_at().is_some());
    }

    #[test]
    fn invalid_transition_is_reported() {
        let mut order = Order::place(new_order(vec![item(1, 10_000)], PaymentMethod::Cod)).unwrap();
        let err = order.transition_to(OrderStatus::Delivered).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStatusTransition {
                from: "pending".into(),
                to: "delivered".into()
            }
        );
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn cancelling_paid_vnpay_order_refunds_it() {
        let mut order =
            Order::place(new_order(vec![item(1, 10_000)], PaymentMethod::Vnpay)).unwrap();
        assert!(order.awaits_online_payment());

        order.mark_paid(Utc::now()).unwrap();
        assert!(!order.awaits_online_payment());

        order.cancel().unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
    }

    #[test]
    fn cancelled_order_cannot_be_paid() {
        let mut order =
            Order::place(new_order(vec![item(1, 10_000)], PaymentMethod::Vnpay)).unwrap();
        order.cancel().unwrap();
        assert!(order.mark_paid(Utc::now()).is_err());
        assert!(!order.awaits_online_payment());
    }

    #[test]
    fn persisted_state_is_kept_across_changes() {
        let mut order =
            Order::place(new_order(vec![item(1, 10_000)], PaymentMethod::Vnpay)).unwrap();
        order.mark_paid(Utc::now()).unwrap();
        order.transition_to(OrderStatus::Confirmed).unwrap();

        assert_eq!(
            order.persisted_state(),
            OrderState {
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Unpaid,
            }
        );
        assert_eq!(order.state().status, OrderStatus::Confirmed);
        assert_eq!(order.state().payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn failed_payment_does_not_override_paid() {
        let mut order =
            Order::place(new_order(vec![item(1, 10_000)], PaymentMethod::Vnpay)).unwrap();
        order.mark_payment_failed();
        assert_eq!(order.payment_status(), PaymentStatus::Failed);

        order.mark_paid(Utc::now()).unwrap();
        order.mark_payment_failed();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }
}
