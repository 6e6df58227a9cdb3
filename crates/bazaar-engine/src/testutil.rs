//! Shared fixtures for engine tests.

use std::sync::Arc;

use chrono::Utc;

use bazaar_core::{
    Address, Order, OrderItem, OrderPricing, OrderStatus, OrderTimestamps, PaymentStatus, Product,
    Seller,
};
use bazaar_db::{MemoryStore, Store};

/// Installs a test subscriber so `RUST_LOG` controls test output.
/// Safe to call from every test; only the first call wins.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) fn address() -> Address {
    Address {
        street: "1 Market St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        postal_code: "62704".to_string(),
        country: "US".to_string(),
    }
}

pub(crate) fn seller(id: &str, email: &str) -> Seller {
    Seller {
        id: id.to_string(),
        company_name: format!("{id} Trading Co"),
        contact_email: email.to_string(),
    }
}

pub(crate) fn product(id: &str, seller_id: &str, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        description: Some("test product".to_string()),
        price_cents,
        discount_bps: 0,
        stock_count: stock,
        seller_id: seller_id.to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// An order in PENDING with the given (product_id, quantity, unit_price)
/// lines, all attributed to seller "s1".
pub(crate) fn order_with_items(lines: Vec<(&str, i64, i64)>) -> Order {
    let now = Utc::now();
    let items: Vec<OrderItem> = lines
        .into_iter()
        .map(|(product_id, quantity, unit_price_cents)| OrderItem {
            product_id: product_id.to_string(),
            name: format!("Product {product_id}"),
            description: None,
            quantity,
            unit_price_cents,
            line_total_cents: unit_price_cents * quantity,
            seller_id: "s1".to_string(),
            seller_name: "s1 Trading Co".to_string(),
        })
        .collect();
    let subtotal: i64 = items.iter().map(|i| i.line_total_cents).sum();

    Order {
        id: "order-1".to_string(),
        order_number: "ORD-000001".to_string(),
        user_id: "u1".to_string(),
        customer_email: "jo@example.com".to_string(),
        customer_name: "Jo Customer".to_string(),
        items,
        pricing: OrderPricing {
            subtotal_cents: subtotal,
            tax_cents: 0,
            shipping_cents: 0,
            discount_cents: 0,
            total_cents: subtotal,
            currency: "USD".to_string(),
        },
        shipping_address: address(),
        billing_address: address(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        timestamps: OrderTimestamps::default(),
        tracking: None,
        cancellation: None,
        payment_transaction_id: "txn_12345678".to_string(),
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

/// A memory store seeded with seller "s1" (seller@widget.example) and
/// product "p1" at the given price and stock.
pub(crate) async fn seeded_store(price_cents: i64, stock: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_seller(&seller("s1", "seller@widget.example"))
        .await
        .unwrap();
    store
        .insert_product(&product("p1", "s1", price_cents, stock))
        .await
        .unwrap();
    store
}
