use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::types::{NewQuote, NewQuoteItem, QuoteProduct, QuoteRequest, QuoteStatus};
use crate::core::error::invalid;

const QUOTE_COLUMNS: &str = "id, client_name, client_email, client_phone, location, delivery_date, \
                             payment_terms, status, created_at, updated_at";

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn check_price(unit_price: f64) -> Result<()> {
    if !unit_price.is_finite() || unit_price < 0.0 {
        return Err(invalid("unit_price must be a finite, non-negative number"));
    }
    Ok(())
}

/// The priced lines must sum to a representable amount, or the total
/// would serialize as `null` and read as unpriced.
fn check_line_sum(lines: impl Iterator<Item = (f64, f64)>) -> Result<()> {
    let sum: f64 = lines.map(|(price, quantity)| price * quantity).sum();
    if !sum.is_finite() {
        return Err(invalid("quote total is too large"));
    }
    Ok(())
}

fn validate(new: &NewQuote) -> Result<()> {
    let mut missing = Vec::new();
    if new.client_name.trim().is_empty() {
        missing.push("client_name");
    }
    if new.client_email.trim().is_empty() {
        missing.push("client_email");
    }
    if new.location.trim().is_empty() {
        missing.push("location");
    }
    if !missing.is_empty() {
        return Err(invalid(format!("missing required fields: {}", missing.join(", "))));
    }
    if new.items.is_empty() {
        return Err(invalid("a quote needs at least one item"));
    }
    for (idx, item) in new.items.iter().enumerate() {
        validate_item(idx, item)?;
    }
    check_line_sum(
        new.items
            .iter()
            .filter_map(|i| i.unit_price.map(|p| (p, i.quantity as f64))),
    )
}

fn validate_item(idx: usize, item: &NewQuoteItem) -> Result<()> {
    if item.name.trim().is_empty() || item.product_type.trim().is_empty() {
        return Err(invalid(format!("item {} needs a name and a product_type", idx + 1)));
    }
    if item.quantity <= 0 || item.quantity > i64::from(u32::MAX) {
        return Err(invalid(format!("item {} quantity must be a positive integer", idx + 1)));
    }
    if let Some(price) = item.unit_price {
        check_price(price)?;
    }
    Ok(())
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<QuoteProduct> {
    Ok(QuoteProduct {
        id: row.get(0)?,
        name: row.get(1)?,
        product_type: row.get(2)?,
        subtype: row.get(3)?,
        dimension: row.get(4)?,
        quantity: row.get(5)?,
        unit_price: row.get(6)?,
    })
}

fn load_items(db: &Connection, quote_id: &str) -> Result<Vec<QuoteProduct>> {
    let mut stmt = db.prepare(
        "SELECT id, name, product_type, subtype, dimension, quantity, unit_price
         FROM quote_items WHERE quote_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![quote_id], row_to_item)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

fn row_to_quote(row: &Row<'_>) -> rusqlite::Result<QuoteRequest> {
    Ok(QuoteRequest {
        id: row.get(0)?,
        client_name: row.get(1)?,
        client_email: row.get(2)?,
        client_phone: row.get(3)?,
        location: row.get(4)?,
        delivery_date: row.get(5)?,
        payment_terms: row.get(6)?,
        status: row.get(7)?,
        items: Vec::new(),
        total_value: None,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn with_items(db: &Connection, mut quote: QuoteRequest) -> Result<QuoteRequest> {
    quote.items = load_items(db, &quote.id)?;
    quote.total_value = QuoteRequest::compute_total(&quote.items);
    Ok(quote)
}

fn query_quote(db: &Connection, id: &str) -> Result<Option<QuoteRequest>> {
    let sql = format!("SELECT {} FROM quotes WHERE id = ?1", QUOTE_COLUMNS);
    match db.query_row(&sql, params![id], row_to_quote).optional()? {
        Some(quote) => Ok(Some(with_items(db, quote)?)),
        None => Ok(None),
    }
}

impl Store {
    /// Stores a new `pending` quote with an id of the form `QT-<year>-<seq>`.
    pub async fn create_quote(&self, new: &NewQuote) -> Result<QuoteRequest> {
        validate(new)?;

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let year: i64 = tx.query_row("SELECT CAST(strftime('%Y', 'now') AS INTEGER)", [], |r| {
            r.get(0)
        })?;
        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM quotes WHERE year = ?1",
            params![year],
            |r| r.get(0),
        )?;
        let id = format!("QT-{}-{:03}", year, seq);

        tx.execute(
            "INSERT INTO quotes (id, year, seq, client_name, client_email, client_phone,
                                 location, delivery_date, payment_terms, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                year,
                seq,
                new.client_name.trim(),
                new.client_email.trim(),
                non_blank(&new.client_phone),
                new.location.trim(),
                non_blank(&new.delivery_date),
                non_blank(&new.payment_terms),
                QuoteStatus::Pending,
            ],
        )?;
        for (position, item) in new.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO quote_items (id, quote_id, position, name, product_type, subtype,
                                          dimension, quantity, unit_price)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    id,
                    position as i64,
                    item.name.trim(),
                    item.product_type.trim(),
                    non_blank(&item.subtype),
                    non_blank(&item.dimension),
                    item.quantity,
                    item.unit_price,
                ],
            )?;
        }
        tx.commit()?;

        query_quote(&db, &id)?.ok_or_else(|| anyhow::anyhow!("quote '{}' vanished after write", id))
    }

    /// Newest first, optionally filtered by status.
    pub async fn list_quotes(&self, status: Option<QuoteStatus>) -> Result<Vec<QuoteRequest>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM quotes WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, rowid DESC",
            QUOTE_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![status], row_to_quote)?;
        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }
        drop(stmt);

        quotes
            .into_iter()
            .map(|quote| with_items(&db, quote))
            .collect()
    }

    pub async fn get_quote(&self, id: &str) -> Result<Option<QuoteRequest>> {
        let db = self.db.lock().await;
        query_quote(&db, id.trim())
    }

    /// Sets one line item's unit price. `None` when the quote or item does not exist.
    pub async fn price_item(
        &self,
        quote_id: &str,
        item_id: &str,
        unit_price: f64,
    ) -> Result<Option<QuoteRequest>> {
        check_price(unit_price)?;
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let rows = tx.execute(
            "UPDATE quote_items SET unit_price = ?1 WHERE id = ?2 AND quote_id = ?3",
            params![unit_price, item_id, quote_id],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        let items = load_items(&tx, quote_id)?;
        check_line_sum(
            items
                .iter()
                .filter_map(|i| i.unit_price.map(|p| (p, f64::from(i.quantity)))),
        )?;
        tx.execute(
            "UPDATE quotes SET updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![quote_id],
        )?;
        tx.commit()?;
        query_quote(&db, quote_id)
    }

    pub async fn set_status(&self, quote_id: &str, status: QuoteStatus) -> Result<Option<QuoteRequest>> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE quotes SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status, quote_id],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        query_quote(&db, quote_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: i64, unit_price: Option<f64>) -> NewQuoteItem {
        NewQuoteItem {
            name: name.into(),
            product_type: "telha".into(),
            subtype: Some("galvanizada".into()),
            dimension: Some("6m".into()),
            quantity,
            unit_price,
        }
    }

    fn new_quote(items: Vec<NewQuoteItem>) -> NewQuote {
        NewQuote {
            client_name: "Maria Souza".into(),
            client_email: "maria@example.com".into(),
            client_phone: Some("  ".into()),
            location: "Campinas".into(),
            delivery_date: None,
            payment_terms: Some("30 dias".into()),
            items,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids_and_pending_status() {
        let store = Store::in_memory().unwrap();
        let a = store.create_quote(&new_quote(vec![item("A", 1, None)])).await.unwrap();
        let b = store.create_quote(&new_quote(vec![item("B", 1, None)])).await.unwrap();

        assert!(a.id.starts_with("QT-") && a.id.ends_with("-001"), "{}", a.id);
        assert!(b.id.ends_with("-002"), "{}", b.id);
        assert_eq!(a.status, QuoteStatus::Pending);
        assert_eq!(a.client_phone, None);
        assert_eq!(a.payment_terms.as_deref(), Some("30 dias"));
    }

    #[tokio::test]
    async fn total_appears_only_once_every_item_is_priced() {
        let store = Store::in_memory().unwrap();
        let quote = store
            .create_quote(&new_quote(vec![item("A", 2, None), item("B", 3, None)]))
            .await
            .unwrap();
        assert_eq!(quote.total_value, None);

        let first = quote.items[0].id.clone();
        let second = quote.items[1].id.clone();

        let partial = store.price_item(&quote.id, &first, 10.0).await.unwrap().unwrap();
        assert_eq!(partial.total_value, None);
        assert_eq!(partial.items[0].unit_price, Some(10.0));

        let full = store.price_item(&quote.id, &second, 2.5).await.unwrap().unwrap();
        assert_eq!(full.total_value, Some(27.5));
    }

    #[tokio::test]
    async fn prices_supplied_at_creation_produce_total() {
        let store = Store::in_memory().unwrap();
        let quote = store
            .create_quote(&new_quote(vec![item("A", 4, Some(1.25))]))
            .await
            .unwrap();
        assert_eq!(quote.total_value, Some(5.0));
    }

    #[tokio::test]
    async fn invalid_prices_and_quantities_are_rejected() {
        let store = Store::in_memory().unwrap();
        assert!(store.create_quote(&new_quote(vec![item("A", 0, None)])).await.is_err());
        assert!(store.create_quote(&new_quote(vec![item("A", -1, None)])).await.is_err());
        assert!(store.create_quote(&new_quote(vec![item("A", 1, Some(-3.0))])).await.is_err());
        assert!(store.create_quote(&new_quote(vec![])).await.is_err());

        let quote = store.create_quote(&new_quote(vec![item("A", 1, None)])).await.unwrap();
        let item_id = quote.items[0].id.clone();
        assert!(store.price_item(&quote.id, &item_id, f64::NAN).await.is_err());
        assert!(store.price_item(&quote.id, &item_id, f64::INFINITY).await.is_err());
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected_and_price_left_unchanged() {
        let store = Store::in_memory().unwrap();
        assert!(
            store
                .create_quote(&new_quote(vec![item("A", 2, Some(f64::MAX))]))
                .await
                .is_err()
        );

        let quote = store
            .create_quote(&new_quote(vec![item("A", 1, Some(f64::MAX)), item("B", 1, None)]))
            .await
            .unwrap();
        let second = quote.items[1].id.clone();
        let err = store
            .price_item(&quote.id, &second, f64::MAX)
            .await
            .unwrap_err();
        assert!(crate::core::error::is_invalid_input(&err));

        let reloaded = store.get_quote(&quote.id).await.unwrap().unwrap();
        assert_eq!(reloaded.items[1].unit_price, None);
        assert_eq!(reloaded.total_value, None);
    }

    #[tokio::test]
    async fn missing_quote_or_item_yields_none() {
        let store = Store::in_memory().unwrap();
        let quote = store.create_quote(&new_quote(vec![item("A", 1, None)])).await.unwrap();
        assert!(store.price_item(&quote.id, "nope", 1.0).await.unwrap().is_none());
        assert!(store.price_item("QT-0000-999", &quote.items[0].id, 1.0).await.unwrap().is_none());
        assert!(store.set_status("QT-0000-999", QuoteStatus::Sent).await.unwrap().is_none());
        assert!(store.get_quote("QT-0000-999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_status_newest_first() {
        let store = Store::in_memory().unwrap();
        let a = store.create_quote(&new_quote(vec![item("A", 1, None)])).await.unwrap();
        let b = store.create_quote(&new_quote(vec![item("B", 1, None)])).await.unwrap();
        store.set_status(&a.id, QuoteStatus::Approved).await.unwrap();

        let all: Vec<String> = store
            .list_quotes(None)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(all, vec![b.id.clone(), a.id.clone()]);

        let approved = store.list_quotes(Some(QuoteStatus::Approved)).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, a.id);
        assert_eq!(approved[0].items.len(), 1);
    }
}
