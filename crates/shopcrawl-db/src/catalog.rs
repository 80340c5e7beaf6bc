//! Database operations for `sites`, `site_collections`, and `collection_products`.
//!
//! A site document is stored one element per row. Each merge is a single
//! transaction of `INSERT ... ON CONFLICT DO UPDATE` statements keyed by the
//! element identity, so merges of different pages of the same site never
//! overwrite each other's rows.

use serde_json::{Map, Value};
use shopcrawl_core::{
    latest_by_key, CollectionEntry, CollectionSummary, ProductRecord, SiteDocument,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `site_collections` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRow {
    pub handle: String,
    /// `NULL` until a collections page has described the collection.
    pub title: Option<String>,
    /// Upstream fields other than `handle` and `title`.
    pub payload: Value,
}

/// A row from the `collection_products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub collection_handle: String,
    pub product_id: i64,
    pub title: Option<String>,
    /// Upstream fields other than `id` and `title`.
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// merge operations
// ---------------------------------------------------------------------------

/// Upserts a page of collections into a site's document.
///
/// Conflicts on `(site, handle)` replace `title` and `payload` in place and
/// leave the collection's products alone. Entries without a handle are
/// skipped; duplicate handles within the batch keep the last occurrence.
///
/// Returns the number of collection rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back and nothing is written.
pub async fn merge_collections(
    pool: &PgPool,
    site: &str,
    batch: &[CollectionSummary],
) -> Result<u64, DbError> {
    let mut entries = latest_by_key(batch.iter().filter(|c| c.has_handle()), |c| {
        c.handle.as_str()
    });
    // Key order gives concurrent merges the same row-lock order.
    entries.sort_by(|a, b| a.handle.cmp(&b.handle));

    let payload = encode(&entries, "collections batch")?;

    let mut tx = pool.begin().await?;
    touch_site(&mut tx, site).await?;

    let written = if entries.is_empty() {
        0
    } else {
        sqlx::query(
            "INSERT INTO site_collections (site, handle, title, payload) \
             SELECT $1, c.value->>'handle', c.value->>'title', \
                    c.value - 'handle' - 'title' \
             FROM jsonb_array_elements($2::jsonb) WITH ORDINALITY AS c(value, ord) \
             ORDER BY c.ord \
             ON CONFLICT (site, handle) DO UPDATE SET \
                 title      = EXCLUDED.title, \
                 payload    = EXCLUDED.payload, \
                 updated_at = NOW()",
        )
        .bind(site)
        .bind(payload)
        .execute(&mut *tx)
        .await?
        .rows_affected()
    };

    tx.commit().await?;
    Ok(written)
}

/// Upserts a page of products into one collection of a site's document.
///
/// Conflicts on `(site, collection_handle, product_id)` replace `title` and
/// `payload` wholesale. If the collection row does not exist yet it is
/// created untitled. Duplicate IDs within the batch keep the last occurrence.
///
/// Returns the number of product rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back and nothing is written.
pub async fn merge_products(
    pool: &PgPool,
    site: &str,
    collection_handle: &str,
    batch: &[ProductRecord],
) -> Result<u64, DbError> {
    let mut entries = latest_by_key(batch.iter(), |p| p.id);
    entries.sort_by_key(|p| p.id);

    let payload = encode(&entries, "products batch")?;

    let mut tx = pool.begin().await?;
    touch_site(&mut tx, site).await?;

    sqlx::query(
        "INSERT INTO site_collections (site, handle) VALUES ($1, $2) \
         ON CONFLICT (site, handle) DO NOTHING",
    )
    .bind(site)
    .bind(collection_handle)
    .execute(&mut *tx)
    .await?;

    let written = if entries.is_empty() {
        0
    } else {
        sqlx::query(
            "INSERT INTO collection_products \
                 (site, collection_handle, product_id, title, payload) \
             SELECT $1, $2, (p.value->>'id')::bigint, p.value->>'title', \
                    p.value - 'id' - 'title' \
             FROM jsonb_array_elements($3::jsonb) WITH ORDINALITY AS p(value, ord) \
             ORDER BY p.ord \
             ON CONFLICT (site, collection_handle, product_id) DO UPDATE SET \
                 title      = EXCLUDED.title, \
                 payload    = EXCLUDED.payload, \
                 updated_at = NOW()",
        )
        .bind(site)
        .bind(collection_handle)
        .bind(payload)
        .execute(&mut *tx)
        .await?
        .rows_affected()
    };

    tx.commit().await?;
    Ok(written)
}

// ---------------------------------------------------------------------------
// read operations
// ---------------------------------------------------------------------------

/// Assembles the stored document for `site`, or `None` if nothing has been
/// merged for it.
///
/// Collections and products appear in first-seen order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn load_site_document(pool: &PgPool, site: &str) -> Result<Option<SiteDocument>, DbError> {
    let exists = sqlx::query_scalar::<_, String>("SELECT site FROM sites WHERE site = $1")
        .bind(site)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let collections = sqlx::query_as::<_, CollectionRow>(
        "SELECT handle, title, payload \
         FROM site_collections \
         WHERE site = $1 \
         ORDER BY seq",
    )
    .bind(site)
    .fetch_all(pool)
    .await?;

    let products = sqlx::query_as::<_, ProductRow>(
        "SELECT collection_handle, product_id, title, payload \
         FROM collection_products \
         WHERE site = $1 \
         ORDER BY seq",
    )
    .bind(site)
    .fetch_all(pool)
    .await?;

    Ok(Some(assemble_document(site, collections, products)))
}

/// Builds a [`SiteDocument`] from its rows. Products whose collection is not
/// among `collections` are dropped.
fn assemble_document(
    site: &str,
    collections: Vec<CollectionRow>,
    products: Vec<ProductRow>,
) -> SiteDocument {
    let mut doc = SiteDocument::new(site);
    doc.collections = collections
        .into_iter()
        .map(|row| CollectionEntry {
            handle: row.handle,
            title: row.title,
            attributes: into_object(row.payload),
            products: Vec::new(),
        })
        .collect();

    for row in products {
        if let Some(entry) = doc
            .collections
            .iter_mut()
            .find(|c| c.handle == row.collection_handle)
        {
            entry.products.push(ProductRecord {
                id: row.product_id,
                title: row.title,
                attributes: into_object(row.payload),
            });
        }
    }
    doc
}

async fn touch_site(tx: &mut Transaction<'_, Postgres>, site: &str) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sites (site) VALUES ($1) \
         ON CONFLICT (site) DO UPDATE SET updated_at = NOW()",
    )
    .bind(site)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn encode<T: serde::Serialize>(entries: &[&T], context: &'static str) -> Result<Value, DbError> {
    serde_json::to_value(entries).map_err(|source| DbError::Encode { context, source })
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assemble_document_groups_products_by_collection() {
        let collections = vec![
            CollectionRow {
                handle: "mugs".to_owned(),
                title: Some("Mugs".to_owned()),
                payload: json!({"products_count": 2}),
            },
            CollectionRow {
                handle: "hats".to_owned(),
                title: None,
                payload: json!({}),
            },
        ];
        let products = vec![
            ProductRow {
                collection_handle: "mugs".to_owned(),
                product_id: 1,
                title: Some("Blue".to_owned()),
                payload: json!({"vendor": "Acme"}),
            },
            ProductRow {
                collection_handle: "hats".to_owned(),
                product_id: 9,
                title: None,
                payload: json!({}),
            },
            ProductRow {
                collection_handle: "mugs".to_owned(),
                product_id: 2,
                title: Some("Red".to_owned()),
                payload: json!({}),
            },
        ];

        let doc = assemble_document("shop.example", collections, products);

        assert_eq!(doc.site, "shop.example");
        assert_eq!(doc.collection("mugs").unwrap().product_ids(), [1, 2]);
        assert_eq!(doc.collection("hats").unwrap().product_ids(), [9]);
        let mugs = doc.collection("mugs").unwrap();
        assert_eq!(mugs.attributes.get("products_count"), Some(&json!(2)));
        assert_eq!(
            mugs.products[0].attributes.get("vendor"),
            Some(&json!("Acme"))
        );
    }

    #[test]
    fn assemble_document_drops_orphan_products() {
        let products = vec![ProductRow {
            collection_handle: "gone".to_owned(),
            product_id: 1,
            title: None,
            payload: json!({}),
        }];
        let doc = assemble_document("shop.example", Vec::new(), products);
        assert!(doc.collections.is_empty());
    }

    #[test]
    fn encode_flattens_attributes_next_to_identity() {
        let mut product = ProductRecord::new(5, "Mug");
        product.attributes.insert("vendor".to_owned(), json!("Acme"));
        let value = encode(&[&product], "test").unwrap();
        assert_eq!(value, json!([{"id": 5, "title": "Mug", "vendor": "Acme"}]));
    }

    #[test]
    fn non_object_payload_becomes_empty_attributes() {
        assert!(into_object(json!("oops")).is_empty());
        assert_eq!(into_object(json!({"a": 1})).len(), 1);
    }
}
