//! Singleton settings row.

use crate::domain::{Settings, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

fn settings_from_row(row: &SqliteRow) -> Result<Settings, sqlx::Error> {
    Ok(Settings {
        global_return_multiplier: row.try_get("global_return_multiplier")?,
        manual_winner_enabled: row.try_get::<i64, _>("manual_winner_enabled")? != 0,
    })
}

impl Repository {
    /// Settings as stored, or `None` if the row was never created.
    pub async fn get_settings(&self) -> Result<Option<Settings>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT global_return_multiplier, manual_winner_enabled FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(settings_from_row).transpose()
    }

    /// Settings, creating the row from `defaults` when missing.
    pub async fn get_or_init_settings(&self, defaults: Settings) -> Result<Settings, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO settings (id, global_return_multiplier, manual_winner_enabled, updated_at_ms)
            VALUES (1, ?, ?, ?)
            "#,
        )
        .bind(defaults.global_return_multiplier)
        .bind(defaults.manual_winner_enabled as i64)
        .bind(TimeMs::now().as_ms())
        .execute(&self.pool)
        .await?;

        self.get_settings().await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Update only the supplied fields.
    pub async fn update_settings(
        &self,
        defaults: Settings,
        global_return_multiplier: Option<i64>,
        manual_winner_enabled: Option<bool>,
    ) -> Result<Settings, sqlx::Error> {
        self.get_or_init_settings(defaults).await?;

        sqlx::query(
            r#"
            UPDATE settings
            SET global_return_multiplier = COALESCE(?, global_return_multiplier),
                manual_winner_enabled = COALESCE(?, manual_winner_enabled),
                updated_at_ms = ?
            WHERE id = 1
            "#,
        )
        .bind(global_return_multiplier)
        .bind(manual_winner_enabled.map(|b| b as i64))
        .bind(TimeMs::now().as_ms())
        .execute(&self.pool)
        .await?;

        self.get_settings().await?.ok_or(sqlx::Error::RowNotFound)
    }
}
