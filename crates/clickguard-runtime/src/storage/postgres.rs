//! PostgreSQL store
//!
//! Runtime-checked queries over the schema in `migrations/001_init.sql`.
//! Multi-statement operations run in one transaction; status and aggregate
//! updates lock the affected row with `SELECT ... FOR UPDATE`.

use super::{ActivityLog, DeliveryStore, Directory, EventQuery, EventStore, QueueStore};
use crate::error::{Result, RuntimeError};
use crate::lists::BlacklistBackend;
use crate::verification::{Genesis, Transition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickguard_core::{
    ActivityType, Affiliate, AffiliateStats, AuditAction, AuditLogEntry, BlacklistEntry, Campaign,
    DeliveryStatus, Event, EventDetails, QueueItemStatus, QueuePriority, SuspiciousActivity,
    VerificationQueueItem, VerificationStatus, WebhookDeliveryRecord,
};
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::{QueryBuilder, Row};

const MIGRATION: &str = include_str!("../../migrations/001_init.sql");

const EVENT_COLUMNS: &str = "id, affiliate_id, campaign_id, kind, referrer, amount, commission, \
     occurred_at, session_key, hashed_identifier, user_agent, client_fingerprint, signature, \
     risk_score, status, security_flags, webhook_validated";

const QUEUE_COLUMNS: &str = "conversion_id, campaign_id, affiliate_id, priority, status, \
     created_at, retry_count, next_retry_at";

/// PostgreSQL implementation of all storage traits
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create the schema if it does not exist
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn corrupt(what: &str, value: &str) -> RuntimeError {
    RuntimeError::Storage(format!("unexpected {} value '{}' in database", what, value))
}

fn status_from(value: &str) -> Result<VerificationStatus> {
    value.parse().map_err(|_| corrupt("status", value))
}

fn event_from_row(row: &PgRow) -> Result<Event> {
    let kind: String = row.try_get("kind")?;
    let details = match kind.as_str() {
        "click" => EventDetails::Click {
            referrer: row.try_get("referrer")?,
        },
        "conversion" => EventDetails::Conversion {
            amount: row.try_get::<Option<i64>, _>("amount")?.unwrap_or(0),
            commission: row.try_get::<Option<i64>, _>("commission")?.unwrap_or(0),
        },
        other => return Err(corrupt("event kind", other)),
    };
    let status: String = row.try_get("status")?;
    let risk_score: i16 = row.try_get("risk_score")?;

    Ok(Event {
        id: row.try_get("id")?,
        affiliate_id: row.try_get("affiliate_id")?,
        campaign_id: row.try_get("campaign_id")?,
        details,
        timestamp: row.try_get("occurred_at")?,
        session_key: row.try_get("session_key")?,
        hashed_identifier: row.try_get("hashed_identifier")?,
        user_agent: row.try_get("user_agent")?,
        client_fingerprint: row.try_get("client_fingerprint")?,
        signature: row.try_get("signature")?,
        risk_score: risk_score.clamp(0, 100) as u8,
        status: status_from(&status)?,
        security_flags: row.try_get("security_flags")?,
        webhook_validated: row.try_get("webhook_validated")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditLogEntry> {
    let action: String = row.try_get("action")?;
    let old_value: Option<String> = row.try_get("old_value")?;
    let new_value: String = row.try_get("new_value")?;

    Ok(AuditLogEntry {
        id: row.try_get("id")?,
        conversion_id: row.try_get("conversion_id")?,
        action: AuditAction::parse(&action).ok_or_else(|| corrupt("audit action", &action))?,
        old_value: old_value.as_deref().map(status_from).transpose()?,
        new_value: status_from(&new_value)?,
        performed_by: row.try_get("performed_by")?,
        timestamp: row.try_get("performed_at")?,
        notes: row.try_get("notes")?,
    })
}

fn queue_item_from_row(row: &PgRow) -> Result<VerificationQueueItem> {
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let retry_count: i32 = row.try_get("retry_count")?;

    Ok(VerificationQueueItem {
        conversion_id: row.try_get("conversion_id")?,
        campaign_id: row.try_get("campaign_id")?,
        affiliate_id: row.try_get("affiliate_id")?,
        priority: QueuePriority::parse(&priority)
            .ok_or_else(|| corrupt("queue priority", &priority))?,
        status: QueueItemStatus::parse(&status).ok_or_else(|| corrupt("queue status", &status))?,
        created_at: row.try_get("created_at")?,
        retry_count: retry_count.max(0) as u32,
        next_retry_at: row.try_get("next_retry_at")?,
    })
}

fn priority_rank(priority: QueuePriority) -> i16 {
    match priority {
        QueuePriority::Low => 1,
        QueuePriority::Medium => 2,
        QueuePriority::High => 3,
    }
}

async fn insert_audit<'c>(
    tx: &mut sqlx::Transaction<'c, Postgres>,
    entry: &AuditLogEntry,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO audit_log (id, conversion_id, action, old_value, new_value, performed_by, performed_at, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&entry.id)
    .bind(&entry.conversion_id)
    .bind(entry.action.as_str())
    .bind(entry.old_value.map(|s| s.as_str()))
    .bind(entry.new_value.as_str())
    .bind(&entry.performed_by)
    .bind(entry.timestamp)
    .bind(&entry.notes)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &EventQuery) {
    if let Some(kind) = query.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(ref affiliate_id) = query.affiliate_id {
        builder.push(" AND affiliate_id = ").push_bind(affiliate_id.clone());
    }
    if let Some(ref campaign_id) = query.campaign_id {
        builder.push(" AND campaign_id = ").push_bind(campaign_id.clone());
    }
    if let Some(ref identifier) = query.hashed_identifier {
        builder
            .push(" AND hashed_identifier = ")
            .push_bind(identifier.clone());
    }
    if let Some(ref session_key) = query.session_key {
        builder.push(" AND session_key = ").push_bind(session_key.clone());
    }
    if let Some(since) = query.since {
        builder.push(" AND occurred_at >= ").push_bind(since);
    }
    if let Some(until) = query.until {
        builder.push(" AND occurred_at <= ").push_bind(until);
    }
    if let Some(ref exclude_id) = query.exclude_id {
        builder.push(" AND id <> ").push_bind(exclude_id.clone());
    }
}

#[async_trait]
impl EventStore for PostgresStore {
    async fn insert_event(&self, genesis: &Genesis) -> Result<()> {
        let event = genesis.event();
        let (kind, referrer, amount, commission) = match &event.details {
            EventDetails::Click { referrer } => ("click", referrer.clone(), None, None),
            EventDetails::Conversion { amount, commission } => {
                ("conversion", None, Some(*amount), Some(*commission))
            }
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "INSERT INTO events ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            EVENT_COLUMNS
        ))
        .bind(&event.id)
        .bind(&event.affiliate_id)
        .bind(&event.campaign_id)
        .bind(kind)
        .bind(referrer)
        .bind(amount)
        .bind(commission)
        .bind(event.timestamp)
        .bind(&event.session_key)
        .bind(&event.hashed_identifier)
        .bind(&event.user_agent)
        .bind(&event.client_fingerprint)
        .bind(&event.signature)
        .bind(event.risk_score as i16)
        .bind(event.status.as_str())
        .bind(&event.security_flags)
        .bind(event.webhook_validated)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RuntimeError::Conflict(format!("event {} already exists", event.id))
            }
            other => other.into(),
        })?;

        for entry in genesis.entries() {
            insert_audit(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn apply_transition(&self, transition: &Transition) -> Result<Event> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM events WHERE id = $1 FOR UPDATE")
                .bind(transition.event_id())
                .fetch_optional(&mut *tx)
                .await?;
        let current = current
            .ok_or_else(|| RuntimeError::NotFound(format!("event {}", transition.event_id())))?;

        if status_from(&current)? != transition.from() {
            return Err(RuntimeError::Conflict(format!(
                "event {} is {}, expected {}",
                transition.event_id(),
                current,
                transition.from()
            )));
        }

        let row = sqlx::query(&format!(
            "UPDATE events SET status = $2 WHERE id = $1 RETURNING {}",
            EVENT_COLUMNS
        ))
        .bind(transition.event_id())
        .bind(transition.to().as_str())
        .fetch_one(&mut *tx)
        .await?;
        let event = event_from_row(&row)?;

        insert_audit(&mut tx, transition.entry()).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn audit_trail(&self, event_id: &str) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, conversion_id, action, old_value, new_value, performed_by, performed_at, notes \
             FROM audit_log WHERE conversion_id = $1 ORDER BY seq",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(audit_from_row).collect()
    }

    async fn count_events(&self, query: &EventQuery) -> Result<u32> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM events WHERE TRUE");
        push_filters(&mut builder, query);
        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool).await?;
        Ok(count.max(0) as u32)
    }

    async fn find_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let mut builder =
            QueryBuilder::new(format!("SELECT {} FROM events WHERE TRUE", EVENT_COLUMNS));
        push_filters(&mut builder, query);
        builder.push(" ORDER BY occurred_at ASC, id ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn mark_webhook_validated(&self, event_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE events SET webhook_validated = TRUE WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RuntimeError::NotFound(format!("event {}", event_id)));
        }
        Ok(())
    }

    async fn apply_affiliate_delta(
        &self,
        affiliate_id: &str,
        amount: i64,
        commission: i64,
        sign: i64,
    ) -> Result<AffiliateStats> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO affiliate_stats (affiliate_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(affiliate_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "SELECT verified_conversions, total_amount, total_commission \
             FROM affiliate_stats WHERE affiliate_id = $1 FOR UPDATE",
        )
        .bind(affiliate_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut stats = AffiliateStats {
            affiliate_id: affiliate_id.to_string(),
            verified_conversions: row.try_get("verified_conversions")?,
            total_amount: row.try_get("total_amount")?,
            total_commission: row.try_get("total_commission")?,
        };
        stats.apply(amount, commission, sign);

        sqlx::query(
            "UPDATE affiliate_stats SET verified_conversions = $2, total_amount = $3, total_commission = $4 \
             WHERE affiliate_id = $1",
        )
        .bind(affiliate_id)
        .bind(stats.verified_conversions)
        .bind(stats.total_amount)
        .bind(stats.total_commission)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stats)
    }

    async fn affiliate_stats(&self, affiliate_id: &str) -> Result<Option<AffiliateStats>> {
        let row = sqlx::query(
            "SELECT verified_conversions, total_amount, total_commission \
             FROM affiliate_stats WHERE affiliate_id = $1",
        )
        .bind(affiliate_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<AffiliateStats> {
            Ok(AffiliateStats {
                affiliate_id: affiliate_id.to_string(),
                verified_conversions: row.try_get("verified_conversions")?,
                total_amount: row.try_get("total_amount")?,
                total_commission: row.try_get("total_commission")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl QueueStore for PostgresStore {
    async fn insert_item(&self, item: &VerificationQueueItem) -> Result<()> {
        sqlx::query(
            "INSERT INTO verification_queue \
             (conversion_id, campaign_id, affiliate_id, priority, priority_rank, status, created_at, retry_count, next_retry_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&item.conversion_id)
        .bind(&item.campaign_id)
        .bind(&item.affiliate_id)
        .bind(item.priority.as_str())
        .bind(priority_rank(item.priority))
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.retry_count as i32)
        .bind(item.next_retry_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RuntimeError::QueueConflict(item.conversion_id.clone())
            }
            other => other.into(),
        })?;
        Ok(())
    }

    async fn open_item(&self, event_id: &str) -> Result<Option<VerificationQueueItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM verification_queue WHERE conversion_id = $1 AND status <> 'done'",
            QUEUE_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(queue_item_from_row).transpose()
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<VerificationQueueItem>> {
        let row = sqlx::query(&format!(
            "UPDATE verification_queue SET status = 'processing' WHERE id = ( \
                 SELECT id FROM verification_queue \
                 WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= $1) \
                 ORDER BY priority_rank DESC, created_at ASC \
                 LIMIT 1 FOR UPDATE SKIP LOCKED \
             ) RETURNING {}",
            QUEUE_COLUMNS
        ))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(queue_item_from_row).transpose()
    }

    async fn update_item(&self, item: &VerificationQueueItem) -> Result<()> {
        let result = sqlx::query(
            "UPDATE verification_queue SET priority = $2, priority_rank = $3, status = $4, \
             retry_count = $5, next_retry_at = $6 \
             WHERE conversion_id = $1 AND status <> 'done'",
        )
        .bind(&item.conversion_id)
        .bind(item.priority.as_str())
        .bind(priority_rank(item.priority))
        .bind(item.status.as_str())
        .bind(item.retry_count as i32)
        .bind(item.next_retry_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RuntimeError::NotFound(format!(
                "open queue item for {}",
                item.conversion_id
            )));
        }
        Ok(())
    }

    async fn open_items(&self) -> Result<Vec<VerificationQueueItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM verification_queue WHERE status <> 'done' \
             ORDER BY priority_rank DESC, created_at ASC",
            QUEUE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(queue_item_from_row).collect()
    }
}

#[async_trait]
impl DeliveryStore for PostgresStore {
    async fn save_delivery(&self, record: &WebhookDeliveryRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_deliveries \
             (id, conversion_id, target_url, status, response_code, response_body, retry_count, max_retries, sent_at, received_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, \
             response_code = EXCLUDED.response_code, response_body = EXCLUDED.response_body, \
             retry_count = EXCLUDED.retry_count, sent_at = EXCLUDED.sent_at, \
             received_at = EXCLUDED.received_at",
        )
        .bind(&record.id)
        .bind(&record.conversion_id)
        .bind(&record.target_url)
        .bind(record.status.as_str())
        .bind(record.response_code.map(i32::from))
        .bind(&record.response_body)
        .bind(record.retry_count as i32)
        .bind(record.max_retries as i32)
        .bind(record.sent_at)
        .bind(record.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deliveries_for(&self, event_id: &str) -> Result<Vec<WebhookDeliveryRecord>> {
        let rows = sqlx::query(
            "SELECT id, conversion_id, target_url, status, response_code, response_body, \
             retry_count, max_retries, sent_at, received_at \
             FROM webhook_deliveries WHERE conversion_id = $1 ORDER BY sent_at NULLS FIRST",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<WebhookDeliveryRecord> {
                let status: String = row.try_get("status")?;
                let response_code: Option<i32> = row.try_get("response_code")?;
                let retry_count: i32 = row.try_get("retry_count")?;
                let max_retries: i32 = row.try_get("max_retries")?;
                Ok(WebhookDeliveryRecord {
                    id: row.try_get("id")?,
                    conversion_id: row.try_get("conversion_id")?,
                    target_url: row.try_get("target_url")?,
                    status: DeliveryStatus::parse(&status)
                        .ok_or_else(|| corrupt("delivery status", &status))?,
                    response_code: response_code.and_then(|c| u16::try_from(c).ok()),
                    response_body: row.try_get("response_body")?,
                    retry_count: retry_count.max(0) as u32,
                    max_retries: max_retries.max(0) as u32,
                    sent_at: row.try_get("sent_at")?,
                    received_at: row.try_get("received_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ActivityLog for PostgresStore {
    async fn record_activity(&self, activity: &SuspiciousActivity) -> Result<()> {
        sqlx::query(
            "INSERT INTO suspicious_activities \
             (id, event_id, campaign_id, affiliate_id, activity_type, hashed_identifier, user_agent, \
              referrer, client_fingerprint, caller, reasons, details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(&activity.id)
        .bind(&activity.event_id)
        .bind(&activity.campaign_id)
        .bind(&activity.affiliate_id)
        .bind(activity.activity_type.as_str())
        .bind(&activity.hashed_identifier)
        .bind(&activity.user_agent)
        .bind(&activity.referrer)
        .bind(&activity.client_fingerprint)
        .bind(&activity.caller)
        .bind(&activity.reasons)
        .bind(&activity.details)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn activities_for_campaign(&self, campaign_id: &str) -> Result<Vec<SuspiciousActivity>> {
        let rows = sqlx::query(
            "SELECT id, event_id, campaign_id, affiliate_id, activity_type, hashed_identifier, \
             user_agent, referrer, client_fingerprint, caller, reasons, details, created_at \
             FROM suspicious_activities WHERE campaign_id = $1 ORDER BY created_at",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SuspiciousActivity> {
                let activity_type: String = row.try_get("activity_type")?;
                Ok(SuspiciousActivity {
                    id: row.try_get("id")?,
                    event_id: row.try_get("event_id")?,
                    campaign_id: row.try_get("campaign_id")?,
                    affiliate_id: row.try_get("affiliate_id")?,
                    activity_type: ActivityType::parse(&activity_type)
                        .ok_or_else(|| corrupt("activity type", &activity_type))?,
                    hashed_identifier: row.try_get("hashed_identifier")?,
                    user_agent: row.try_get("user_agent")?,
                    referrer: row.try_get("referrer")?,
                    client_fingerprint: row.try_get("client_fingerprint")?,
                    caller: row.try_get("caller")?,
                    reasons: row.try_get("reasons")?,
                    details: row.try_get("details")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Directory for PostgresStore {
    async fn campaign(&self, campaign_id: &str) -> Result<Option<Campaign>> {
        let row = sqlx::query("SELECT id, name, is_active FROM campaigns WHERE id = $1")
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> Result<Campaign> {
            Ok(Campaign {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                is_active: row.try_get("is_active")?,
            })
        })
        .transpose()
    }

    async fn affiliate(&self, affiliate_id: &str) -> Result<Option<Affiliate>> {
        let row = sqlx::query(
            "SELECT id, name, is_active, commission_rate FROM affiliates WHERE id = $1",
        )
        .bind(affiliate_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| -> Result<Affiliate> {
            Ok(Affiliate {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                is_active: row.try_get("is_active")?,
                commission_rate: row.try_get("commission_rate")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl BlacklistBackend for PostgresStore {
    async fn is_active(&self, hashed_identifier: &str) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM blacklist_entries WHERE hashed_identifier = $1 AND active)",
        )
        .bind(hashed_identifier)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn append(&self, entry: BlacklistEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO blacklist_entries (hashed_identifier, reason, active, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&entry.hashed_identifier)
        .bind(&entry.reason)
        .bind(entry.active)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate(&self, hashed_identifier: &str) -> Result<usize> {
        let result = sqlx::query(
            "UPDATE blacklist_entries SET active = FALSE WHERE hashed_identifier = $1 AND active",
        )
        .bind(hashed_identifier)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn entries(&self, hashed_identifier: &str) -> Result<Vec<BlacklistEntry>> {
        let rows = sqlx::query(
            "SELECT hashed_identifier, reason, active, created_at FROM blacklist_entries \
             WHERE hashed_identifier = $1 ORDER BY seq",
        )
        .bind(hashed_identifier)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<BlacklistEntry> {
                Ok(BlacklistEntry {
                    hashed_identifier: row.try_get("hashed_identifier")?,
                    reason: row.try_get("reason")?,
                    active: row.try_get("active")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
