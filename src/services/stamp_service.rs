//! src/services/stamp_service.rs
//!
//! StampService — catalog operations backed by SQLite for the records and an
//! [`ImageStore`] for uploaded images. Every write touches a single row; there
//! are no multi-row transactions except the bulk import.

use crate::{
    errors::{CatalogError, CatalogResult},
    models::{
        admin::AdminDetails,
        stamp::{ImportedStamp, NewStamp, Stamp, StampPatch},
    },
    services::image_store::ImageStore,
};
use bytes::Bytes;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const STAMP_COLUMNS: &str = "id, title, year, description, country, value, category, image";

/// An uploaded image as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// StampService provides the catalog operations:
/// - List stamps, optionally filtered by category
/// - Create a stamp with an optional image
/// - Partially update a stamp's text fields
/// - Delete a stamp
#[derive(Clone)]
pub struct StampService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    /// Backend that persists uploaded images.
    pub images: Arc<dyn ImageStore>,
}

impl StampService {
    pub fn new(db: Arc<SqlitePool>, images: Arc<dyn ImageStore>) -> Self {
        Self { db, images }
    }

    /// Parse a client-supplied id. An id that cannot be parsed cannot name a
    /// stored stamp, so it is reported as not found.
    fn parse_id(raw: &str) -> CatalogResult<Uuid> {
        Uuid::parse_str(raw.trim()).map_err(|_| CatalogError::NotFound(raw.to_string()))
    }

    /// Reject a title that is present but blank. On create, `required` also
    /// rejects a missing title.
    fn ensure_title(title: Option<&str>, required: bool) -> CatalogResult<()> {
        match title {
            Some(t) if t.trim().is_empty() => {
                Err(CatalogError::Validation("title must not be blank".into()))
            }
            None if required => Err(CatalogError::Validation("title is required".into())),
            _ => Ok(()),
        }
    }

    /// List stamps in insertion order. A missing or empty `category` lists
    /// everything.
    pub async fn list(&self, category: Option<&str>) -> CatalogResult<Vec<Stamp>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM stamps", STAMP_COLUMNS));

        if let Some(category) = category.filter(|c| !c.is_empty()) {
            builder.push(" WHERE category = ");
            builder.push_bind(category);
        }
        builder.push(" ORDER BY rowid ASC");

        let rows: Vec<Stamp> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows)
    }

    /// Fetch one stamp by id.
    pub async fn get(&self, id: &str) -> CatalogResult<Stamp> {
        let uuid = Self::parse_id(id)?;
        sqlx::query_as::<_, Stamp>(&format!("SELECT {} FROM stamps WHERE id = ?", STAMP_COLUMNS))
            .bind(uuid)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Create a stamp.
    ///
    /// The image, if any, is stored first and its reference recorded on the
    /// row. If the insert then fails the image stays behind unreferenced.
    pub async fn create(&self, fields: NewStamp, image: Option<ImageUpload>) -> CatalogResult<Stamp> {
        Self::ensure_title(fields.title.as_deref(), true)?;

        let image = match image {
            Some(upload) => {
                let reference = self.images.put(upload.bytes, &upload.file_name).await?;
                debug!("stored image via {} backend => {}", self.images.backend_tag(), reference);
                reference
            }
            None => String::new(),
        };

        let stamp = sqlx::query_as::<_, Stamp>(&format!(
            "INSERT INTO stamps ({cols}) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {cols}",
            cols = STAMP_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&fields.title)
        .bind(&fields.year)
        .bind(&fields.description)
        .bind(&fields.country)
        .bind(&fields.value)
        .bind(&fields.category)
        .bind(&image)
        .fetch_one(&*self.db)
        .await?;

        info!("created stamp {}", stamp.id);
        Ok(stamp)
    }

    /// Replace the fields present in `patch`. The image reference is never
    /// touched.
    pub async fn update(&self, id: &str, patch: StampPatch) -> CatalogResult<Stamp> {
        let uuid = Self::parse_id(id)?;
        Self::ensure_title(patch.title.as_deref(), false)?;

        let updated = sqlx::query_as::<_, Stamp>(&format!(
            "UPDATE stamps SET
                title = COALESCE(?, title),
                year = COALESCE(?, year),
                description = COALESCE(?, description),
                country = COALESCE(?, country),
                value = COALESCE(?, value),
                category = COALESCE(?, category)
             WHERE id = ?
             RETURNING {}",
            STAMP_COLUMNS
        ))
        .bind(&patch.title)
        .bind(&patch.year)
        .bind(&patch.description)
        .bind(&patch.country)
        .bind(&patch.value)
        .bind(&patch.category)
        .bind(uuid)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        info!("updated stamp {}", updated.id);
        Ok(updated)
    }

    /// Delete a stamp. Its image, if stored locally, is left in place.
    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let uuid = Self::parse_id(id)?;
        let result = sqlx::query("DELETE FROM stamps WHERE id = ?")
            .bind(uuid)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }

        info!("deleted stamp {}", uuid);
        Ok(())
    }

    /// Load the singleton admin record, if one has been provisioned.
    pub async fn admin_details(&self) -> CatalogResult<Option<AdminDetails>> {
        let details = sqlx::query_as::<_, AdminDetails>(
            "SELECT password, public_key, service_id, template_id FROM admin_details WHERE id = 1",
        )
        .fetch_optional(&*self.db)
        .await?;
        Ok(details)
    }
}

/// Insert many records in one transaction; either all land or none do.
///
/// Used by the bulk importer, which carries existing image references and
/// so needs no image store.
pub async fn insert_many(db: &SqlitePool, records: Vec<ImportedStamp>) -> CatalogResult<usize> {
    let mut tx = db.begin().await?;
    let count = records.len();

    for record in records {
        let fields = record.fields;
        sqlx::query(&format!(
            "INSERT INTO stamps ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            STAMP_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(fields.title)
        .bind(fields.year)
        .bind(fields.description)
        .bind(fields.country)
        .bind(fields.value)
        .bind(fields.category)
        .bind(record.image.unwrap_or_default())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!("imported {} stamps", count);
    Ok(count)
}
