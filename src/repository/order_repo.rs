// ==========================================
// KandyPack Ledger - Order catalog repository
// ==========================================
// Tables: orders, order_item, product
// Read-only lookups for the ledger plus the order status update.
// ==========================================

use crate::domain::order::{Order, OrderItem, Product};
use crate::domain::types::OrderStatus;
use crate::repository::error::{bad_column, parse_date_column, RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_order(row: &Row<'_>) -> rusqlite::Result<Order> {
        let date_raw: String = row.get(2)?;
        let status_raw: String = row.get(6)?;
        Ok(Order {
            order_id: row.get(0)?,
            customer_id: row.get(1)?,
            order_date: parse_date_column(2, &date_raw)?,
            deliver_address: row.get(3)?,
            deliver_city_id: row.get(4)?,
            full_price: row.get(5)?,
            status: OrderStatus::from_db_str(&status_raw)
                .ok_or_else(|| bad_column(6, format!("unknown order status '{}'", status_raw)))?,
            warehouse_id: row.get(7)?,
        })
    }

    // ==========================================
    // Writes (seeding / planning integration)
    // ==========================================

    /// Insert an order row
    pub fn insert_order(&self, order: &Order) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO orders (
                order_id, customer_id, order_date, deliver_address,
                deliver_city_id, full_price, status, warehouse_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                order.order_id,
                order.customer_id,
                order.order_date.format("%Y-%m-%d").to_string(),
                order.deliver_address,
                order.deliver_city_id,
                order.full_price,
                order.status.to_db_str(),
                order.warehouse_id,
            ],
        )?;
        Ok(())
    }

    /// Insert a product or overwrite its name and rate
    pub fn upsert_product(&self, product: &Product) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO product (product_type_id, product_name, space_consumption_rate)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(product_type_id) DO UPDATE SET
                product_name = ?2,
                space_consumption_rate = ?3
            "#,
            params![
                product.product_type_id,
                product.product_name,
                product.space_consumption_rate,
            ],
        )?;
        Ok(())
    }

    /// Insert order items in one transaction
    ///
    /// # Returns
    /// - Err(DatabaseTransactionError) when the transaction cannot begin or commit
    pub fn insert_items(&self, items: &[OrderItem]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut count = 0;
        for item in items {
            tx.execute(
                r#"
                INSERT INTO order_item (
                    item_id, order_id, store_id, product_type_id, quantity, item_price
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    item.item_id,
                    item.order_id,
                    item.store_id,
                    item.product_type_id,
                    item.quantity,
                    item.item_price,
                ],
            )?;
            count += 1;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    /// Update the order status column
    ///
    /// # Returns
    /// - Err(NotFound) when no row matches
    pub fn update_status(&self, order_id: &str, status: OrderStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE orders SET status = ?1 WHERE order_id = ?2",
            params![status.to_db_str(), order_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Look up an order by id
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let order = conn
            .query_row(
                r#"
                SELECT order_id, customer_id, order_date, deliver_address,
                       deliver_city_id, full_price, status, warehouse_id
                FROM orders
                WHERE order_id = ?1
                "#,
                params![order_id],
                Self::map_order,
            )
            .optional()?;
        Ok(order)
    }

    /// Items of an order joined with their product rows
    ///
    /// Items whose product is missing from the catalog are dropped by the join.
    pub fn find_items_with_products(
        &self,
        order_id: &str,
    ) -> RepositoryResult<Vec<(OrderItem, Product)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT i.item_id, i.order_id, i.store_id, i.product_type_id,
                   i.quantity, i.item_price,
                   p.product_name, p.space_consumption_rate
            FROM order_item i
            JOIN product p ON p.product_type_id = i.product_type_id
            WHERE i.order_id = ?1
            ORDER BY i.item_id
            "#,
        )?;

        let rows = stmt
            .query_map(params![order_id], |row| {
                let product_type_id: String = row.get(3)?;
                Ok((
                    OrderItem {
                        item_id: row.get(0)?,
                        order_id: row.get(1)?,
                        store_id: row.get(2)?,
                        product_type_id: product_type_id.clone(),
                        quantity: row.get(4)?,
                        item_price: row.get(5)?,
                    },
                    Product {
                        product_type_id,
                        product_name: row.get(6)?,
                        space_consumption_rate: row.get(7)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
