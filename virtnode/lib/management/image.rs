use sqlx::SqliteConnection;

use crate::{
    config::{ImageDetectSpec, ImageSpec},
    VirtnodeError, VirtnodeResult,
};

use super::{models::Image, VirtController};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VirtController {
    /// Creates an image record, or updates its stored spec if a record with
    /// the same name already exists and the spec changed.
    ///
    /// Submitting the same spec twice performs no second write.
    pub async fn create_or_update_image(&self, spec: &ImageSpec) -> VirtnodeResult<()> {
        spec.validate()?;
        let payload = spec.kind.payload_json()?;

        match self.get_image(&spec.name).await {
            Err(err) if err.is_not_found() => {
                let mut tx = self.pool().begin().await?;
                sqlx::query(
                    r#"
                    INSERT INTO images (name, namespace, kind, spec)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(&spec.name)
                .bind(&spec.namespace)
                .bind(spec.kind.kind_name())
                .bind(&payload)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                tracing::info!("created image {}", spec.name);
                Ok(())
            }
            Ok(image) => {
                if image.spec_str != payload {
                    sqlx::query("UPDATE images SET spec = ? WHERE id = ?")
                        .bind(&payload)
                        .bind(image.id)
                        .execute(self.pool())
                        .await?;
                    tracing::info!("updated image spec for {}", spec.name);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Looks up the active image with the given name.
    pub async fn get_image(&self, name: &str) -> VirtnodeResult<Image> {
        let rows = sqlx::query("SELECT * FROM images WHERE deleted_at IS NULL AND name = ?")
            .bind(name)
            .fetch_all(self.pool())
            .await?;

        match rows.len() {
            0 => Err(VirtnodeError::not_found(format!(
                "image is not found: name={}",
                name
            ))),
            1 => Ok(Image::from_row(&rows[0])),
            n => Err(VirtnodeError::conflict(format!(
                "duplicated images are found: name={}, len={}",
                name, n
            ))),
        }
    }

    /// Lists active images, optionally filtered by name.
    pub async fn list_images(&self, names: &[String]) -> VirtnodeResult<Vec<Image>> {
        let rows = if names.is_empty() {
            sqlx::query("SELECT * FROM images WHERE deleted_at IS NULL ORDER BY id")
                .fetch_all(self.pool())
                .await?
        } else {
            let placeholders = vec!["?"; names.len()].join(", ");
            let sql = format!(
                "SELECT * FROM images WHERE deleted_at IS NULL AND name IN ({}) ORDER BY id",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for name in names {
                query = query.bind(name);
            }
            query.fetch_all(self.pool()).await?
        };

        Ok(rows.iter().map(Image::from_row).collect())
    }

    /// Resolves an ephemeral image request into a concrete active image.
    ///
    /// With a name the request must match exactly one active image: zero
    /// matches is a not-found error and more than one is a conflict, the same
    /// ambiguity policy as named lookups. Without a name the oldest active
    /// image is chosen.
    pub(crate) async fn detect_image(
        &self,
        conn: &mut SqliteConnection,
        detect_spec: &ImageDetectSpec,
    ) -> VirtnodeResult<Image> {
        let rows = match &detect_spec.name {
            Some(name) => {
                sqlx::query(
                    "SELECT * FROM images WHERE deleted_at IS NULL AND name = ? ORDER BY id",
                )
                .bind(name)
                .fetch_all(&mut *conn)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM images WHERE deleted_at IS NULL ORDER BY id")
                    .fetch_all(&mut *conn)
                    .await?
            }
        };

        if rows.is_empty() {
            return Err(VirtnodeError::not_found(format!(
                "requested image is not found: name={}",
                detect_spec.name.as_deref().unwrap_or("<any>")
            )));
        }

        if detect_spec.name.is_some() && rows.len() > 1 {
            return Err(VirtnodeError::conflict(format!(
                "duplicated images are found: name={}, len={}",
                detect_spec.name.as_deref().unwrap_or_default(),
                rows.len()
            )));
        }

        Ok(Image::from_row(&rows[0]))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageKind, ImageUrlSpec, PullPolicy};
    use crate::management::db::{init_db, VIRT_DB_MIGRATOR};
    use sqlx::Row;
    use tempfile::tempdir;

    async fn test_controller() -> (tempfile::TempDir, VirtController) {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("virt.db"), &VIRT_DB_MIGRATOR)
            .await
            .unwrap();
        (temp_dir, VirtController::with_pool(pool))
    }

    fn image_spec(name: &str, url: &str) -> ImageSpec {
        ImageSpec {
            name: name.to_string(),
            namespace: "default".to_string(),
            kind: ImageKind::Url(ImageUrlSpec {
                url: url.to_string(),
                pull_policy: PullPolicy::IfNotPresent,
            }),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_create_image_then_get() {
        let (_guard, controller) = test_controller().await;

        controller
            .create_or_update_image(&image_spec("stable", "https://example.com/a.qcow2"))
            .await
            .unwrap();

        let image = controller.get_image("stable").await.unwrap();
        assert_eq!(image.name, "stable");
        assert_eq!(image.kind, "url");
        assert!(image.deleted_at.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_create_image_twice_is_idempotent() {
        let (_guard, controller) = test_controller().await;
        let spec = image_spec("stable", "https://example.com/a.qcow2");

        controller.create_or_update_image(&spec).await.unwrap();
        controller.create_or_update_image(&spec).await.unwrap();

        let count = sqlx::query("SELECT COUNT(*) AS n FROM images")
            .fetch_one(controller.pool())
            .await
            .unwrap()
            .get::<i64, _>("n");
        assert_eq!(count, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_changed_spec_updates_stored_payload() {
        let (_guard, controller) = test_controller().await;

        controller
            .create_or_update_image(&image_spec("stable", "https://example.com/a.qcow2"))
            .await
            .unwrap();
        let before = controller.get_image("stable").await.unwrap();

        controller
            .create_or_update_image(&image_spec("stable", "https://example.com/b.qcow2"))
            .await
            .unwrap();
        let after = controller.get_image("stable").await.unwrap();

        assert_eq!(before.id, after.id);
        assert_ne!(before.spec_str, after.spec_str);
        assert!(after.spec_str.contains("b.qcow2"));
    }

    #[test_log::test(tokio::test)]
    async fn test_get_missing_image_is_not_found() {
        let (_guard, controller) = test_controller().await;

        let err = controller.get_image("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test_log::test(tokio::test)]
    async fn test_detect_image_with_ambiguous_name_is_conflict() {
        let (_guard, controller) = test_controller().await;

        // Same name in two namespaces is allowed by the schema but ambiguous
        // for a name-only detect request.
        for namespace in ["default", "other"] {
            sqlx::query("INSERT INTO images (name, namespace, kind, spec) VALUES (?, ?, ?, ?)")
                .bind("stable")
                .bind(namespace)
                .bind("url")
                .bind("{}")
                .execute(controller.pool())
                .await
                .unwrap();
        }

        let mut conn = controller.pool().acquire().await.unwrap();
        let err = controller
            .detect_image(
                &mut conn,
                &ImageDetectSpec {
                    name: Some("stable".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test_log::test(tokio::test)]
    async fn test_list_images_filters_by_name() {
        let (_guard, controller) = test_controller().await;

        controller
            .create_or_update_image(&image_spec("a", "https://example.com/a.qcow2"))
            .await
            .unwrap();
        controller
            .create_or_update_image(&image_spec("b", "https://example.com/b.qcow2"))
            .await
            .unwrap();

        let all = controller.list_images(&[]).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = controller
            .list_images(&["b".to_string()])
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "b");
    }
}
