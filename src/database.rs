#[cfg(feature = "database")]
use anyhow::Result;
#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
#[cfg(feature = "database")]
use std::collections::BTreeSet;
#[cfg(feature = "database")]
use sqlx::{
    migrate::MigrateDatabase, sqlite::SqlitePoolOptions, sqlite::SqliteRow, QueryBuilder, Row,
    Sqlite, SqliteConnection, SqlitePool,
};
#[cfg(feature = "database")]
use tracing::{debug, info};

#[cfg(feature = "database")]
use crate::config::DatabaseConfig;
#[cfg(feature = "database")]
use crate::domain::*;
#[cfg(feature = "database")]
use crate::store::{
    ApprovalRepository, CaseLedger, DocumentRepository, Fixture, GateConfigStore, RoleDirectory,
    StoreError, TransitionCommit,
};

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::backend(err.to_string())
    }
}

// SQLite integers are signed; ids round-trip through i64
#[cfg(feature = "database")]
fn db(id: u64) -> i64 {
    id as i64
}

#[cfg(feature = "database")]
fn from_db(value: i64) -> u64 {
    value as u64
}

#[cfg(feature = "database")]
async fn insert_action(
    conn: &mut SqliteConnection,
    action: &ApprovalAction,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO approval_actions
            (document_id, step_id, actor_id, kind, role_id, level, sequence, note, at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(db(action.document.0))
    .bind(db(action.step.0))
    .bind(db(action.actor.0))
    .bind(action.kind.as_str())
    .bind(db(action.role.0))
    .bind(action.level)
    .bind(action.sequence)
    .bind(&action.note)
    .bind(action.at)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(feature = "database")]
/// SQLite-backed store serving every collaborator interface
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteStore {
    /// Open (creating if needed) the database and optionally run migrations
    pub async fn connect(database_url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self> {
        if !Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(&config.url, config.max_connections, config.auto_migrate).await
    }

    /// Get database pool for queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load seed data in one transaction. Existing rows with the same keys are replaced.
    pub async fn import_fixture(&self, fixture: &Fixture) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for role in &fixture.roles {
            sqlx::query("INSERT OR REPLACE INTO roles (id, name) VALUES (?1, ?2)")
                .bind(db(role.id.0))
                .bind(&role.name)
                .execute(&mut *tx)
                .await?;
        }

        for user in &fixture.users {
            sqlx::query("INSERT OR REPLACE INTO users (id, name, active) VALUES (?1, ?2, ?3)")
                .bind(db(user.id.0))
                .bind(&user.name)
                .bind(user.active)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM user_roles WHERE user_id = ?1")
                .bind(db(user.id.0))
                .execute(&mut *tx)
                .await?;
            for role in &user.roles {
                sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2)")
                    .bind(db(user.id.0))
                    .bind(db(role.0))
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for config in &fixture.document_types {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO document_types
                    (category_id, document_type_id, name, ordering, mandatory, generated,
                     upload_required, requires_approval)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(db(config.category.0))
            .bind(db(config.document_type.0))
            .bind(&config.name)
            .bind(config.ordering)
            .bind(config.mandatory)
            .bind(config.generated)
            .bind(config.upload_required)
            .bind(config.requires_approval)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM gate_steps WHERE category_id = ?1 AND document_type_id = ?2")
                .bind(db(config.category.0))
                .bind(db(config.document_type.0))
                .execute(&mut *tx)
                .await?;
            for step in &config.steps {
                sqlx::query(
                    r#"
                    INSERT INTO gate_steps
                        (category_id, document_type_id, role_id, role_name, level, sequence)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(db(config.category.0))
                .bind(db(config.document_type.0))
                .bind(db(step.role.0))
                .bind(&step.role_name)
                .bind(step.level)
                .bind(step.sequence)
                .execute(&mut *tx)
                .await?;
            }
        }

        for case in &fixture.cases {
            sqlx::query("INSERT OR REPLACE INTO cases (id, total) VALUES (?1, ?2)")
                .bind(db(case.id.0))
                .bind(case.total.minor_units())
                .execute(&mut *tx)
                .await?;
        }

        for document in &fixture.documents {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO documents
                    (id, case_id, category_id, document_type_id, status, approved, approved_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(db(document.id.0))
            .bind(db(document.case.0))
            .bind(db(document.category.0))
            .bind(db(document.document_type.0))
            .bind(document.status.as_str())
            .bind(document.approved)
            .bind(document.approved_at)
            .execute(&mut *tx)
            .await?;
        }

        for step in &fixture.steps {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO approval_steps
                    (id, document_id, case_id, role_id, role_name, level, sequence, status,
                     approver_id, approved_at, note, revision)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(db(step.id.0))
            .bind(db(step.document.0))
            .bind(db(step.case.0))
            .bind(db(step.role.0))
            .bind(&step.role_name)
            .bind(step.level)
            .bind(step.sequence)
            .bind(step.status.as_str())
            .bind(step.approver.map(|u| db(u.0)))
            .bind(step.approved_at)
            .bind(&step.note)
            .bind(db(step.revision))
            .execute(&mut *tx)
            .await?;
        }

        // The fixture's log replaces whatever was stored for its documents
        let logged: BTreeSet<DocumentId> = fixture.actions.iter().map(|a| a.document).collect();
        for document in &logged {
            sqlx::query("DELETE FROM approval_actions WHERE document_id = ?1")
                .bind(db(document.0))
                .execute(&mut *tx)
                .await?;
        }
        for action in &fixture.actions {
            insert_action(&mut *tx, action).await?;
        }

        tx.commit().await?;
        info!(
            roles = fixture.roles.len(),
            users = fixture.users.len(),
            documents = fixture.documents.len(),
            actions = fixture.actions.len(),
            "Fixture imported"
        );
        Ok(())
    }

    /// Action log for one document, oldest first
    pub async fn actions_for(&self, document: DocumentId) -> Result<Vec<ApprovalAction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT document_id, step_id, actor_id, kind, role_id, level, sequence, note, at
            FROM approval_actions
            WHERE document_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(db(document.0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(action_from_row).collect()
    }

    async fn all_roles(&self) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<Role, StoreError> {
                Ok(Role {
                    id: RoleId(from_db(row.try_get("id")?)),
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[cfg(feature = "database")]
fn document_from_row(row: &SqliteRow) -> Result<DocumentInstance, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(DocumentInstance {
        id: DocumentId(from_db(row.try_get("id")?)),
        case: CaseId(from_db(row.try_get("case_id")?)),
        category: CategoryId(from_db(row.try_get("category_id")?)),
        document_type: DocumentTypeId(from_db(row.try_get("document_type_id")?)),
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| StoreError::backend(format!("Unknown document status '{status}'")))?,
        approved: row.try_get("approved")?,
        approved_at: row.try_get("approved_at")?,
    })
}

#[cfg(feature = "database")]
fn step_from_row(row: &SqliteRow) -> Result<ApprovalStepInstance, StoreError> {
    let status: String = row.try_get("status")?;
    let approver: Option<i64> = row.try_get("approver_id")?;
    Ok(ApprovalStepInstance {
        id: ApprovalStepId(from_db(row.try_get("id")?)),
        document: DocumentId(from_db(row.try_get("document_id")?)),
        case: CaseId(from_db(row.try_get("case_id")?)),
        role: RoleId(from_db(row.try_get("role_id")?)),
        role_name: row.try_get("role_name")?,
        level: row.try_get("level")?,
        sequence: row.try_get("sequence")?,
        status: StepStatus::parse(&status)
            .ok_or_else(|| StoreError::backend(format!("Unknown step status '{status}'")))?,
        approver: approver.map(|id| UserId(from_db(id))),
        approved_at: row.try_get("approved_at")?,
        note: row.try_get("note")?,
        revision: from_db(row.try_get("revision")?),
    })
}

#[cfg(feature = "database")]
fn action_from_row(row: &SqliteRow) -> Result<ApprovalAction, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(ApprovalAction {
        document: DocumentId(from_db(row.try_get("document_id")?)),
        step: ApprovalStepId(from_db(row.try_get("step_id")?)),
        actor: UserId(from_db(row.try_get("actor_id")?)),
        kind: ActionKind::parse(&kind)
            .ok_or_else(|| StoreError::backend(format!("Unknown action kind '{kind}'")))?,
        role: RoleId(from_db(row.try_get("role_id")?)),
        level: row.try_get("level")?,
        sequence: row.try_get("sequence")?,
        note: row.try_get("note")?,
        at: row.try_get("at")?,
    })
}

#[cfg(feature = "database")]
const STEP_COLUMNS: &str = "id, document_id, case_id, role_id, role_name, level, sequence, status, approver_id, approved_at, note, revision";

#[cfg(feature = "database")]
#[async_trait]
impl GateConfigStore for SqliteStore {
    async fn document_type_config(
        &self,
        category: CategoryId,
        document_type: DocumentTypeId,
    ) -> Result<Option<DocumentTypeConfig>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT name, ordering, mandatory, generated, upload_required, requires_approval
            FROM document_types
            WHERE category_id = ?1 AND document_type_id = ?2
            "#,
        )
        .bind(db(category.0))
        .bind(db(document_type.0))
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let steps = sqlx::query(
            r#"
            SELECT role_id, role_name, level, sequence
            FROM gate_steps
            WHERE category_id = ?1 AND document_type_id = ?2
            ORDER BY sequence ASC, id ASC
            "#,
        )
        .bind(db(category.0))
        .bind(db(document_type.0))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|step| -> Result<GateStep, StoreError> {
            Ok(GateStep {
                role: RoleId(from_db(step.try_get("role_id")?)),
                role_name: step.try_get("role_name")?,
                level: step.try_get("level")?,
                sequence: step.try_get("sequence")?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(DocumentTypeConfig {
            category,
            document_type,
            name: row.try_get("name")?,
            ordering: row.try_get("ordering")?,
            mandatory: row.try_get("mandatory")?,
            generated: row.try_get("generated")?,
            upload_required: row.try_get("upload_required")?,
            requires_approval: row.try_get("requires_approval")?,
            steps,
        }))
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl RoleDirectory for SqliteStore {
    async fn existing_roles(&self, refs: &[RoleRef]) -> Result<Vec<Role>, StoreError> {
        Ok(self
            .all_roles()
            .await?
            .into_iter()
            .filter(|role| refs.iter().any(|r| r.matches(role)))
            .collect())
    }

    async fn live_holder_count(&self, refs: &[RoleRef]) -> Result<usize, StoreError> {
        let roles = self.existing_roles(refs).await?;
        if roles.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(DISTINCT u.id) AS holders FROM users u \
             JOIN user_roles ur ON ur.user_id = u.id \
             WHERE u.active = 1 AND ur.role_id IN (",
        );
        let mut ids = query.separated(", ");
        for role in &roles {
            ids.push_bind(db(role.id.0));
        }
        ids.push_unseparated(")");

        let holders: i64 = query
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("holders")?;
        Ok(holders as usize)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let Some(row) = sqlx::query("SELECT id, name, active FROM users WHERE id = ?1")
            .bind(db(id.0))
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let roles = sqlx::query("SELECT role_id FROM user_roles WHERE user_id = ?1")
            .bind(db(id.0))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| -> Result<RoleId, StoreError> { Ok(RoleId(from_db(r.try_get("role_id")?))) })
            .collect::<Result<_, StoreError>>()?;

        Ok(Some(User {
            id,
            name: row.try_get("name")?,
            roles,
            active: row.try_get("active")?,
        }))
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl DocumentRepository for SqliteStore {
    async fn document(&self, id: DocumentId) -> Result<Option<DocumentInstance>, StoreError> {
        sqlx::query(
            "SELECT id, case_id, category_id, document_type_id, status, approved, approved_at \
             FROM documents WHERE id = ?1",
        )
        .bind(db(id.0))
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(document_from_row)
        .transpose()
    }

    async fn documents_for_case(&self, case: CaseId) -> Result<Vec<DocumentInstance>, StoreError> {
        sqlx::query(
            "SELECT id, case_id, category_id, document_type_id, status, approved, approved_at \
             FROM documents WHERE case_id = ?1 ORDER BY id",
        )
        .bind(db(case.0))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(document_from_row)
        .collect()
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl ApprovalRepository for SqliteStore {
    async fn step(&self, id: ApprovalStepId) -> Result<Option<ApprovalStepInstance>, StoreError> {
        sqlx::query(&format!("SELECT {STEP_COLUMNS} FROM approval_steps WHERE id = ?1"))
            .bind(db(id.0))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(step_from_row)
            .transpose()
    }

    async fn step_for_document(
        &self,
        document: DocumentId,
    ) -> Result<Option<ApprovalStepInstance>, StoreError> {
        sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM approval_steps WHERE document_id = ?1"
        ))
        .bind(db(document.0))
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(step_from_row)
        .transpose()
    }

    async fn steps_for_case(&self, case: CaseId) -> Result<Vec<ApprovalStepInstance>, StoreError> {
        sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM approval_steps WHERE case_id = ?1 ORDER BY id"
        ))
        .bind(db(case.0))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(step_from_row)
        .collect()
    }

    async fn last_rejection(
        &self,
        document: DocumentId,
    ) -> Result<Option<RejectionDetail>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT a.actor_id, u.name AS actor_name, a.at, a.note
            FROM approval_actions a
            LEFT JOIN users u ON u.id = a.actor_id
            WHERE a.document_id = ?1 AND a.kind = 'rejected'
            ORDER BY a.id DESC
            LIMIT 1
            "#,
        )
        .bind(db(document.0))
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        Ok(Some(RejectionDetail {
            actor: UserId(from_db(row.try_get("actor_id")?)),
            actor_name: row.try_get("actor_name")?,
            at: row.try_get::<DateTime<Utc>, _>("at")?,
            note: row.try_get("note")?,
        }))
    }

    async fn last_action_by_user(
        &self,
        user: UserId,
        document: DocumentId,
    ) -> Result<Option<UserAction>, StoreError> {
        sqlx::query(
            r#"
            SELECT document_id, step_id, actor_id, kind, role_id, level, sequence, note, at
            FROM approval_actions
            WHERE actor_id = ?1 AND document_id = ?2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(db(user.0))
        .bind(db(document.0))
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(|row| {
            action_from_row(row).map(|action| UserAction {
                kind: action.kind,
                level: action.level,
                sequence: action.sequence,
                at: action.at,
            })
        })
        .transpose()
    }

    async fn open_review(
        &self,
        document: DocumentId,
        first_gate: GateStep,
    ) -> Result<ApprovalStepInstance, StoreError> {
        let mut tx = self.pool.begin().await?;

        let case: i64 = sqlx::query("SELECT case_id FROM documents WHERE id = ?1")
            .bind(db(document.0))
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("document", document))?
            .try_get("case_id")?;

        // Re-sending reuses the cursor row and bumps its revision
        sqlx::query(
            r#"
            INSERT INTO approval_steps
                (document_id, case_id, role_id, role_name, level, sequence, status, revision)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 0)
            ON CONFLICT(document_id) DO UPDATE SET
                role_id = excluded.role_id,
                role_name = excluded.role_name,
                level = excluded.level,
                sequence = excluded.sequence,
                status = 'pending',
                approver_id = NULL,
                approved_at = NULL,
                note = NULL,
                revision = approval_steps.revision + 1
            "#,
        )
        .bind(db(document.0))
        .bind(case)
        .bind(db(first_gate.role.0))
        .bind(&first_gate.role_name)
        .bind(first_gate.level)
        .bind(first_gate.sequence)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE documents SET status = 'pending_approval', approved = 0, approved_at = NULL WHERE id = ?1",
        )
        .bind(db(document.0))
        .execute(&mut *tx)
        .await?;

        let step = step_from_row(
            &sqlx::query(&format!(
                "SELECT {STEP_COLUMNS} FROM approval_steps WHERE document_id = ?1"
            ))
            .bind(db(document.0))
            .fetch_one(&mut *tx)
            .await?,
        )?;

        tx.commit().await?;
        debug!(document_id = %document, step_id = %step.id, "Review opened");
        Ok(step)
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let step = &commit.step;

        let updated = sqlx::query(
            r#"
            UPDATE approval_steps SET
                role_id = ?1, role_name = ?2, level = ?3, sequence = ?4, status = ?5,
                approver_id = ?6, approved_at = ?7, note = ?8, revision = ?9 + 1
            WHERE id = ?10 AND revision = ?9
            "#,
        )
        .bind(db(step.role.0))
        .bind(&step.role_name)
        .bind(step.level)
        .bind(step.sequence)
        .bind(step.status.as_str())
        .bind(step.approver.map(|u| db(u.0)))
        .bind(step.approved_at)
        .bind(&step.note)
        .bind(db(commit.expected_revision))
        .bind(db(step.id.0))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let found = sqlx::query("SELECT revision FROM approval_steps WHERE id = ?1")
                .bind(db(step.id.0))
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match found {
                None => StoreError::not_found("approval step", step.id),
                Some(row) => StoreError::Conflict {
                    step: step.id,
                    expected: commit.expected_revision,
                    found: from_db(row.try_get("revision")?),
                },
            });
        }

        if let Some(document) = &commit.document {
            let updated = sqlx::query(
                "UPDATE documents SET status = ?1, approved = ?2, approved_at = ?3 WHERE id = ?4",
            )
            .bind(document.status.as_str())
            .bind(document.approved)
            .bind(document.approved_at)
            .bind(db(document.id.0))
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(StoreError::not_found("document", document.id));
            }
        }

        insert_action(&mut *tx, &commit.action).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl CaseLedger for SqliteStore {
    async fn case_total(&self, case: CaseId) -> Result<Money, StoreError> {
        let row = sqlx::query("SELECT total FROM cases WHERE id = ?1")
            .bind(db(case.0))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("case", case))?;
        Ok(Money(row.try_get("total")?))
    }
}

#[cfg(feature = "database")]
/// Open the configured database, if any
pub async fn init_database(
    config: &crate::config::ApprovalChainConfig,
) -> Result<Option<SqliteStore>> {
    if let Some(db_config) = &config.database {
        info!("Initializing database at {}", db_config.url);
        let store = SqliteStore::from_config(db_config).await?;
        info!("Database store initialized successfully");
        Ok(Some(store))
    } else {
        info!("Database not configured, skipping initialization");
        Ok(None)
    }
}
