//! Template catalog rows.
//!
//! Templates are the curated media users pick from. The swap worker
//! only reads this table; rows are written by the face extraction
//! worker (face crops) and by catalog tooling (the templates
//! themselves).

use chrono::Utc;
use rusqlite::params;

use super::error::DatabaseError;
use super::Database;

/// One row of `templates`, keyed by its catalog position.
#[derive(Debug, Clone)]
pub struct TemplateRecord {
    pub sort_id: i64,
    pub title: String,
    pub source_path: String,
    /// Storage key of the thumbnail shown in the catalog.
    pub thumb: Option<String>,
    /// Storage key of the short preview clip.
    pub preview_source: Option<String>,
    pub is_image: bool,
    pub premium: bool,
    pub face_count: i64,
}

/// A face crop extracted from a template, one row per distinct
/// identity, ordered by `face_index` (discovery order).
#[derive(Debug, Clone)]
pub struct FaceTemplateRecord {
    pub template_id: i64,
    pub face_index: i64,
    pub image_path: String,
}

pub struct TemplateRepository {
    db: Database,
}

impl TemplateRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, record: &TemplateRecord) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO templates (sort_id, title, source_path, thumb, preview_source,
                                        is_image, premium, face_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.sort_id,
                    record.title,
                    record.source_path,
                    record.thumb,
                    record.preview_source,
                    record.is_image,
                    record.premium,
                    record.face_count,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_by_sort_id(&self, sort_id: i64) -> Result<Option<TemplateRecord>, DatabaseError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sort_id, title, source_path, thumb, preview_source, is_image,
                        premium, face_count
                 FROM templates WHERE sort_id = ?1",
            )?;
            let mut rows = stmt.query(params![sort_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(TemplateRecord {
                    sort_id: row.get(0)?,
                    title: row.get(1)?,
                    source_path: row.get(2)?,
                    thumb: row.get(3)?,
                    preview_source: row.get(4)?,
                    is_image: row.get(5)?,
                    premium: row.get(6)?,
                    face_count: row.get(7)?,
                })),
                None => Ok(None),
            }
        })
    }

    pub fn insert_face(&self, record: &FaceTemplateRecord) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO face_templates (template_id, face_index, image_path, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.template_id,
                    record.face_index,
                    record.image_path,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Faces of a template in discovery order.
    pub fn list_faces(&self, template_id: i64) -> Result<Vec<FaceTemplateRecord>, DatabaseError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT template_id, face_index, image_path
                 FROM face_templates WHERE template_id = ?1 ORDER BY face_index",
            )?;
            let rows = stmt.query_map(params![template_id], |row| {
                Ok(FaceTemplateRecord {
                    template_id: row.get(0)?,
                    face_index: row.get(1)?,
                    image_path: row.get(2)?,
                })
            })?;
            let mut faces = Vec::new();
            for row in rows {
                faces.push(row?);
            }
            Ok(faces)
        })
    }

    pub fn set_face_count(&self, template_id: i64, count: i64) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE templates SET face_count = ?1 WHERE sort_id = ?2",
                params![count, template_id],
            )?;
            Ok(())
        })
    }
}
