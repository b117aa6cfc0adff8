// src/db/casedb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::casemodel::*;

fn seen_column(role: ActorRole) -> &'static str {
    match role {
        ActorRole::Client => "seen_by_client",
        ActorRole::Agent => "seen_by_agent",
        ActorRole::Admin => "seen_by_admin",
    }
}

#[async_trait]
pub trait CaseExt {
    /// Creates the case and seeds its conversation with the first message in
    /// one transaction, so a stored case is never message-less.
    async fn create_case(
        &self,
        case: NewCaseRecord,
        first_message: NewMessageRecord,
    ) -> Result<SupportCaseWithMessages, Error>;

    async fn get_case(&self, case_id: Uuid) -> Result<Option<SupportCase>, Error>;

    async fn get_case_with_messages(
        &self,
        case_id: Uuid,
    ) -> Result<Option<SupportCaseWithMessages>, Error>;

    /// Appends while the case is open. The status check and the insert are a
    /// single guarded statement, so two near-simultaneous sends both land
    /// (in commit order) and a concurrent close cannot race a message into a
    /// closed case. Returns `None` when the case is closed or unknown; a
    /// replayed message id returns the already-stored row.
    async fn append_message(
        &self,
        case_id: Uuid,
        message: NewMessageRecord,
    ) -> Result<Option<CaseMessage>, Error>;

    /// Moves an open case to closed. Returns `None` if the case was not open
    /// (already closed or unknown); the caller decides between the idempotent
    /// no-op and an invalid transition.
    async fn close_case(
        &self,
        case_id: Uuid,
        closed_by: ActorRole,
        rating: Option<i16>,
    ) -> Result<Option<SupportCase>, Error>;

    /// Flips the seen flag for `role` on messages authored by other roles,
    /// optionally only up to (and including) a given message. Monotonic and
    /// idempotent; returns the number of rows that actually changed.
    async fn mark_seen(
        &self,
        case_id: Uuid,
        role: ActorRole,
        up_to_message_id: Option<Uuid>,
    ) -> Result<u64, Error>;

    async fn list_cases(
        &self,
        role: ActorRole,
        actor_id: Uuid,
        status: CaseStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SupportCaseWithUnseen>, Error>;

    async fn delete_message(&self, case_id: Uuid, message_id: Uuid) -> Result<bool, Error>;

    async fn unseen_total(&self, role: ActorRole, actor_id: Uuid) -> Result<i64, Error>;
}

#[async_trait]
impl CaseExt for DBClient {
    async fn create_case(
        &self,
        case: NewCaseRecord,
        first_message: NewMessageRecord,
    ) -> Result<SupportCaseWithMessages, Error> {
        let mut tx = self.pool.begin().await?;

        let case = sqlx::query_as::<_, SupportCase>(
            r#"
            INSERT INTO support_cases
                (category, opened_by, opened_by_user_id, target_agent_id, property_id,
                 display_name_one, display_name_two, inquiry_about, inquiry_details, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'open'::case_status)
            RETURNING *
            "#,
        )
        .bind(case.category)
        .bind(case.opened_by)
        .bind(case.opened_by_user_id)
        .bind(case.target_agent_id)
        .bind(case.property_id)
        .bind(case.display_name_one)
        .bind(case.display_name_two)
        .bind(case.inquiry_about)
        .bind(case.inquiry_details)
        .fetch_one(&mut *tx)
        .await?;

        let message = sqlx::query_as::<_, CaseMessage>(
            r#"
            INSERT INTO support_messages
                (id, case_id, author_role, customer_name, customer_email, user_id, body,
                 seen_by_client, seen_by_agent, seen_by_admin)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(first_message.id)
        .bind(case.id)
        .bind(first_message.author_role)
        .bind(first_message.customer_name)
        .bind(first_message.customer_email)
        .bind(first_message.user_id)
        .bind(first_message.body)
        .bind(first_message.author_role == ActorRole::Client)
        .bind(first_message.author_role == ActorRole::Agent)
        .bind(first_message.author_role == ActorRole::Admin)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SupportCaseWithMessages {
            case,
            conversation: vec![message],
        })
    }

    async fn get_case(&self, case_id: Uuid) -> Result<Option<SupportCase>, Error> {
        sqlx::query_as::<_, SupportCase>(
            r#"
            SELECT * FROM support_cases
            WHERE id = $1
            "#,
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_case_with_messages(
        &self,
        case_id: Uuid,
    ) -> Result<Option<SupportCaseWithMessages>, Error> {
        let case = self.get_case(case_id).await?;

        if let Some(case) = case {
            let conversation = sqlx::query_as::<_, CaseMessage>(
                r#"
                SELECT * FROM support_messages
                WHERE case_id = $1
                ORDER BY seq ASC
                "#,
            )
            .bind(case_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(Some(SupportCaseWithMessages { case, conversation }))
        } else {
            Ok(None)
        }
    }

    async fn append_message(
        &self,
        case_id: Uuid,
        message: NewMessageRecord,
    ) -> Result<Option<CaseMessage>, Error> {
        // Replay of a client-generated id returns the stored row untouched.
        let existing = sqlx::query_as::<_, CaseMessage>(
            r#"
            SELECT * FROM support_messages
            WHERE id = $1 AND case_id = $2
            "#,
        )
        .bind(message.id)
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(existing) = existing {
            return Ok(Some(existing));
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, CaseMessage>(
            r#"
            INSERT INTO support_messages
                (id, case_id, author_role, customer_name, customer_email, user_id, body,
                 seen_by_client, seen_by_agent, seen_by_admin)
            SELECT $2, c.id, $3, $4, $5, $6, $7, $8, $9, $10
            FROM support_cases c
            WHERE c.id = $1 AND c.status = 'open'::case_status
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(case_id)
        .bind(message.id)
        .bind(message.author_role)
        .bind(message.customer_name)
        .bind(message.customer_email)
        .bind(message.user_id)
        .bind(message.body)
        .bind(message.author_role == ActorRole::Client)
        .bind(message.author_role == ActorRole::Agent)
        .bind(message.author_role == ActorRole::Admin)
        .fetch_optional(&mut *tx)
        .await?;

        match inserted {
            Some(inserted) => {
                sqlx::query(
                    r#"
                    UPDATE support_cases
                    SET updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(case_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(Some(inserted))
            }
            None => {
                tx.commit().await?;

                // Either the case is not open, or a concurrent replay of the
                // same id won the insert. The second look distinguishes them.
                sqlx::query_as::<_, CaseMessage>(
                    r#"
                    SELECT * FROM support_messages
                    WHERE id = $1 AND case_id = $2
                    "#,
                )
                .bind(message.id)
                .bind(case_id)
                .fetch_optional(&self.pool)
                .await
            }
        }
    }

    async fn close_case(
        &self,
        case_id: Uuid,
        closed_by: ActorRole,
        rating: Option<i16>,
    ) -> Result<Option<SupportCase>, Error> {
        sqlx::query_as::<_, SupportCase>(
            r#"
            UPDATE support_cases
            SET status = 'closed'::case_status,
                closed_by = $2,
                rating = COALESCE($3, rating),
                closed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'open'::case_status
            RETURNING *
            "#,
        )
        .bind(case_id)
        .bind(closed_by)
        .bind(rating)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_seen(
        &self,
        case_id: Uuid,
        role: ActorRole,
        up_to_message_id: Option<Uuid>,
    ) -> Result<u64, Error> {
        let column = seen_column(role);
        let sql = format!(
            r#"
            UPDATE support_messages
            SET {column} = true
            WHERE case_id = $1
              AND author_role != $2
              AND {column} = false
              AND ($3::uuid IS NULL
                   OR seq <= (SELECT seq FROM support_messages WHERE id = $3 AND case_id = $1))
            "#
        );

        let result = sqlx::query(&sql)
            .bind(case_id)
            .bind(role)
            .bind(up_to_message_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_cases(
        &self,
        role: ActorRole,
        actor_id: Uuid,
        status: CaseStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SupportCaseWithUnseen>, Error> {
        let query = match role {
            ActorRole::Client => sqlx::query_as::<_, SupportCaseWithUnseen>(
                r#"
                SELECT c.*,
                       (SELECT COUNT(*) FROM support_messages m
                         WHERE m.case_id = c.id
                           AND m.author_role != 'client'::actor_role
                           AND m.seen_by_client = false) AS unseen_count
                FROM support_cases c
                WHERE c.status = $1
                  AND c.opened_by = 'client'::actor_role
                  AND c.opened_by_user_id = $2
                ORDER BY c.updated_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(status)
            .bind(actor_id)
            .bind(limit)
            .bind(offset),
            ActorRole::Agent => sqlx::query_as::<_, SupportCaseWithUnseen>(
                r#"
                SELECT c.*,
                       (SELECT COUNT(*) FROM support_messages m
                         WHERE m.case_id = c.id
                           AND m.author_role != 'agent'::actor_role
                           AND m.seen_by_agent = false) AS unseen_count
                FROM support_cases c
                WHERE c.status = $1
                  AND (c.target_agent_id = $2 OR c.opened_by_user_id = $2)
                ORDER BY c.updated_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(status)
            .bind(actor_id)
            .bind(limit)
            .bind(offset),
            ActorRole::Admin => sqlx::query_as::<_, SupportCaseWithUnseen>(
                r#"
                SELECT c.*,
                       (SELECT COUNT(*) FROM support_messages m
                         WHERE m.case_id = c.id
                           AND m.author_role != 'admin'::actor_role
                           AND m.seen_by_admin = false) AS unseen_count
                FROM support_cases c
                WHERE c.status = $1
                ORDER BY c.updated_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status)
            .bind(limit)
            .bind(offset),
        };

        query.fetch_all(&self.pool).await
    }

    async fn delete_message(&self, case_id: Uuid, message_id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM support_messages
            WHERE case_id = $1 AND id = $2
            "#,
        )
        .bind(case_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unseen_total(&self, role: ActorRole, actor_id: Uuid) -> Result<i64, Error> {
        let query = match role {
            ActorRole::Client => sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM support_messages m
                INNER JOIN support_cases c ON m.case_id = c.id
                WHERE c.opened_by = 'client'::actor_role
                  AND c.opened_by_user_id = $1
                  AND m.author_role != 'client'::actor_role
                  AND m.seen_by_client = false
                "#,
            )
            .bind(actor_id),
            ActorRole::Agent => sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM support_messages m
                INNER JOIN support_cases c ON m.case_id = c.id
                WHERE (c.target_agent_id = $1 OR c.opened_by_user_id = $1)
                  AND m.author_role != 'agent'::actor_role
                  AND m.seen_by_agent = false
                "#,
            )
            .bind(actor_id),
            // the admin pool sees every case; the actor id does not scope it
            ActorRole::Admin => sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM support_messages m
                WHERE m.author_role != 'admin'::actor_role
                  AND m.seen_by_admin = false
                "#,
            ),
        };

        query.fetch_one(&self.pool).await
    }
}
