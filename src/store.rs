//! Book store cart and checkout.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::{CacheKey, LocalCache};
use crate::formats::StoreBook;
use crate::sheets::{FormEndpoint, FormSink};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub book: StoreBook,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CartTotals {
    pub total_quantity: u32,
    pub subtotal: f64,
    pub delivery_charge: f64,
    pub total: f64,
}

impl Cart {
    /// A cart holding only `book`. A zero quantity counts as one.
    pub fn single(book: StoreBook, quantity: u32) -> Self {
        Self {
            items: vec![CartItem {
                book,
                quantity: quantity.max(1),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Delivery is charged once, from the first item.
    pub fn totals(&self) -> CartTotals {
        let total_quantity = self.items.iter().map(|item| item.quantity).sum();
        let subtotal = self
            .items
            .iter()
            .map(|item| f64::from(item.quantity) * item.book.price)
            .sum::<f64>();
        let delivery_charge = self
            .items
            .first()
            .map(|item| item.book.delivery_charges)
            .unwrap_or(0.0);
        CartTotals {
            total_quantity,
            subtotal,
            delivery_charge,
            total: subtotal + delivery_charge,
        }
    }

    pub async fn load(cache: &LocalCache) -> anyhow::Result<Self> {
        Ok(cache.get(&CacheKey::Cart).await?.unwrap_or_default())
    }

    pub async fn save(&self, cache: &LocalCache) -> anyhow::Result<()> {
        cache.put(&CacheKey::Cart, self).await.context("persist cart")
    }
}

/// Replaces the persisted cart with `book` alone.
pub async fn add_to_cart(cache: &LocalCache, book: StoreBook, quantity: u32) -> anyhow::Result<Cart> {
    let book_id = book.id.clone();
    let cart = Cart::single(book, quantity);
    cart.save(cache).await?;
    tracing::info!(%book_id, quantity = quantity.max(1), "cart replaced");
    Ok(cart)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryDetails {
    pub name: String,
    pub mobile: String,
    pub city: String,
    pub address: String,
    pub landmark: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub totals: CartTotals,
}

pub fn new_order_id() -> String {
    let n: u32 = rand::random_range(0..1_000_000);
    format!("ORD-{n}")
}

/// Order body in the shape the store sheet expects.
pub fn order_body(details: &DeliveryDetails, cart: &Cart, order_id: &str) -> serde_json::Value {
    let totals = cart.totals();
    let lines = cart
        .items
        .iter()
        .map(|item| {
            json!({
                "book": {
                    "id": item.book.id,
                    "title": item.book.title,
                    "author": item.book.author,
                    "price": item.book.price,
                    "deliveryCharges": item.book.delivery_charges,
                    "quantity": item.book.quantity,
                    "images": item.book.images,
                },
                "quantity": item.quantity,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "name": details.name,
        "mobile": details.mobile,
        "city": details.city,
        "address": details.address,
        "landmark": details.landmark,
        "totalQuantity": totals.total_quantity,
        "totalPrice": totals.total,
        "orderId": order_id,
        "cart": lines,
    })
}

/// Assigns an order id and posts the order. The receipt is returned even if
/// the post fails; the failure is only logged.
pub async fn place_order(sink: &dyn FormSink, details: &DeliveryDetails, cart: &Cart) -> OrderReceipt {
    let order_id = new_order_id();
    let body = order_body(details, cart, &order_id);
    if let Err(err) = sink.post_json(FormEndpoint::Store, body).await {
        tracing::warn!(%order_id, ?err, "failed to post order");
    } else {
        tracing::info!(%order_id, "order posted");
    }
    OrderReceipt {
        order_id,
        totals: cart.totals(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;

    /// Records every submission; optionally fails or answers multipart posts.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub posts: Mutex<Vec<(FormEndpoint, Value)>>,
        pub fail: bool,
        pub multipart_reply: Option<Value>,
    }

    #[async_trait]
    impl FormSink for RecordingSink {
        async fn post_form(
            &self,
            endpoint: FormEndpoint,
            fields: Vec<(String, String)>,
        ) -> anyhow::Result<()> {
            self.posts
                .lock()
                .unwrap()
                .push((endpoint, serde_json::to_value(fields)?));
            if self.fail {
                anyhow::bail!("upstream rejected form");
            }
            Ok(())
        }

        async fn post_multipart(
            &self,
            endpoint: FormEndpoint,
            fields: Vec<(String, String)>,
        ) -> anyhow::Result<Value> {
            self.posts
                .lock()
                .unwrap()
                .push((endpoint, serde_json::to_value(fields)?));
            if self.fail {
                anyhow::bail!("upstream rejected form");
            }
            Ok(self
                .multipart_reply
                .clone()
                .unwrap_or_else(|| json!({ "success": true })))
        }

        async fn post_json(&self, endpoint: FormEndpoint, body: Value) -> anyhow::Result<()> {
            self.posts.lock().unwrap().push((endpoint, body));
            if self.fail {
                anyhow::bail!("upstream rejected order");
            }
            Ok(())
        }
    }

    pub(crate) fn store_book(id: &str, price: f64, delivery: f64) -> StoreBook {
        StoreBook {
            id: id.to_owned(),
            title: format!("Book {id}"),
            author: "Nitai Das".to_owned(),
            price,
            delivery_charges: delivery,
            quantity: 10,
            images: Vec::new(),
        }
    }

    #[test]
    fn totals_charge_delivery_from_first_item() {
        let mut cart = Cart::single(store_book("1", 250.0, 50.0), 2);
        cart.items.push(CartItem {
            book: store_book("2", 100.0, 80.0),
            quantity: 1,
        });
        let totals = cart.totals();
        assert_eq!(totals.total_quantity, 3);
        assert_eq!(totals.subtotal, 600.0);
        assert_eq!(totals.delivery_charge, 50.0);
        assert_eq!(totals.total, 650.0);

        let empty = Cart::default().totals();
        assert_eq!(empty.delivery_charge, 0.0);
        assert_eq!(empty.total, 0.0);
    }

    #[test]
    fn order_ids_are_in_range() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let id = new_order_id();
            let n: u32 = id.strip_prefix("ORD-").unwrap().parse().unwrap();
            assert!(n < 1_000_000);
            seen.insert(n);
        }
        assert!(seen.len() > 1);
    }

    #[tokio::test]
    async fn adding_a_book_replaces_the_persisted_cart() {
        let cache = LocalCache::in_memory();
        add_to_cart(&cache, store_book("1", 250.0, 50.0), 3).await.unwrap();
        let cart = add_to_cart(&cache, store_book("2", 100.0, 40.0), 0).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 1);
        assert_eq!(Cart::load(&cache).await.unwrap(), cart);
    }

    #[tokio::test]
    async fn place_order_posts_camel_case_body_and_survives_failure() {
        let cart = Cart::single(store_book("1", 250.0, 50.0), 2);
        let details = DeliveryDetails {
            name: "Ram".to_owned(),
            ..DeliveryDetails::default()
        };

        let sink = RecordingSink::default();
        let receipt = place_order(&sink, &details, &cart).await;
        assert!(receipt.order_id.starts_with("ORD-"));
        let posts = sink.posts.lock().unwrap();
        let (endpoint, body) = &posts[0];
        assert_eq!(*endpoint, FormEndpoint::Store);
        assert_eq!(body["orderId"], receipt.order_id.as_str());
        assert_eq!(body["totalPrice"], 550.0);
        assert_eq!(body["cart"][0]["book"]["deliveryCharges"], 50.0);
        drop(posts);

        let failing = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let receipt = place_order(&failing, &details, &cart).await;
        assert_eq!(receipt.totals.total, 550.0);
    }
}
