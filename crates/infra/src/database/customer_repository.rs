//! SQLite-backed customer and contact repository.
//!
//! Owns the customers and customer_contacts tables. Contact sets are only
//! ever replaced whole (delete + reinsert inside one transaction) so contacts
//! removed upstream cannot linger and readers never observe a partial set.

use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_core::CustomerStore;
use fieldsync_domain::{ContactType, Customer, CustomerContact, FieldSyncError, Result};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite customer repository.
pub struct SqliteCustomerRepository {
    db: Arc<DbManager>,
}

impl SqliteCustomerRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CustomerStore for SqliteCustomerRepository {
    async fn upsert_customer(&self, customer: &Customer) -> Result<()> {
        let db = Arc::clone(&self.db);
        let customer = customer.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            upsert_customer(&conn, &customer)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn replace_contacts(
        &self,
        customer_id: &str,
        contacts: &[CustomerContact],
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        let customer_id = customer_id.to_string();
        let contacts = contacts.to_vec();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            replace_contacts(&mut conn, &customer_id, &contacts)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_customer_ids_by_contact(
        &self,
        contact_type: ContactType,
        normalized_value: &str,
    ) -> Result<Vec<String>> {
        let db = Arc::clone(&self.db);
        let normalized = normalized_value.to_string();

        task::spawn_blocking(move || -> Result<Vec<String>> {
            let conn = db.get_connection()?;
            query_ids_by_contact(&conn, contact_type, &normalized)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_customer(&self, external_id: &str) -> Result<Option<Customer>> {
        let db = Arc::clone(&self.db);
        let external_id = external_id.to_string();

        task::spawn_blocking(move || -> Result<Option<Customer>> {
            let conn = db.get_connection()?;
            query_customer(&conn, &external_id)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

// job_count is intentionally absent from the UPDATE arm: the job sync's
// aggregate pass owns that column.
fn upsert_customer(conn: &Connection, customer: &Customer) -> Result<()> {
    conn.execute(
        "INSERT INTO customers (external_id, name, customer_type, street, city, state,
                                postal_code, active, balance, job_count, lifetime_value,
                                last_synced_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(external_id) DO UPDATE SET
             name = excluded.name,
             customer_type = excluded.customer_type,
             street = excluded.street,
             city = excluded.city,
             state = excluded.state,
             postal_code = excluded.postal_code,
             active = excluded.active,
             balance = excluded.balance,
             lifetime_value = excluded.lifetime_value,
             last_synced_at = excluded.last_synced_at",
        params![
            customer.external_id,
            customer.name,
            customer.customer_type,
            customer.street,
            customer.city,
            customer.state,
            customer.postal_code,
            customer.active,
            customer.balance,
            customer.job_count,
            customer.lifetime_value,
            customer.last_synced_at,
        ],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

fn replace_contacts(
    conn: &mut Connection,
    customer_id: &str,
    contacts: &[CustomerContact],
) -> Result<()> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    tx.execute("DELETE FROM customer_contacts WHERE customer_id = ?1", params![customer_id])
        .map_err(map_sql_error)?;

    for contact in contacts {
        tx.execute(
            "INSERT INTO customer_contacts
                 (customer_id, contact_type, raw_value, normalized_value, is_primary)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                customer_id,
                contact.contact_type.to_string(),
                contact.raw_value,
                contact.normalized_value,
                contact.is_primary,
            ],
        )
        .map_err(map_sql_error)?;
    }

    tx.commit().map_err(map_sql_error)
}

fn query_ids_by_contact(
    conn: &Connection,
    contact_type: ContactType,
    normalized: &str,
) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT customer_id FROM customer_contacts
             WHERE contact_type = ?1 AND normalized_value = ?2
             ORDER BY id ASC",
        )
        .map_err(map_sql_error)?;

    let rows = stmt
        .query_map(params![contact_type.to_string(), normalized], |row| {
            row.get::<_, String>(0)
        })
        .map_err(map_sql_error)?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn query_customer(conn: &Connection, external_id: &str) -> Result<Option<Customer>> {
    let result = conn.query_row(
        "SELECT external_id, name, customer_type, street, city, state, postal_code,
                active, balance, job_count, lifetime_value, last_synced_at
         FROM customers WHERE external_id = ?1",
        params![external_id],
        map_customer_row,
    );

    match result {
        Ok(customer) => Ok(Some(customer)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sql_error(e)),
    }
}

fn map_customer_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        external_id: row.get(0)?,
        name: row.get(1)?,
        customer_type: row.get(2)?,
        street: row.get(3)?,
        city: row.get(4)?,
        state: row.get(5)?,
        postal_code: row.get(6)?,
        active: row.get(7)?,
        balance: row.get(8)?,
        job_count: row.get(9)?,
        lifetime_value: row.get(10)?,
        last_synced_at: row.get(11)?,
    })
}

// ============================================================================
// Error Mapping
// ============================================================================

fn map_sql_error(err: rusqlite::Error) -> FieldSyncError {
    FieldSyncError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> FieldSyncError {
    if err.is_cancelled() {
        FieldSyncError::Internal("blocking task cancelled".into())
    } else {
        FieldSyncError::Internal(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
