use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Local mirror of an external invoice. `invoice_id` is the reference string
/// generated at issuance; `provider_ref` is the provider's own invoice id.
/// Webhooks look records up by one or the other depending on event type.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub amount_to_pay: BigDecimal,
    pub amount_paid: BigDecimal,
    pub invoice_id: String,
    pub provider_ref: Option<String>,
    pub status: String,
    pub paid_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_webhook_update: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Fields for a freshly issued record.
#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub email: String,
    pub phone: String,
    pub amount_to_pay: BigDecimal,
    pub invoice_id: String,
    pub provider_ref: Option<String>,
}

/// Result of applying one partial-payment webhook.
#[derive(Debug)]
pub enum PartialPaymentOutcome {
    /// No record carries this provider invoice id.
    NotFound,
    /// This provider payment id was already credited; state untouched.
    Duplicate(PaymentRecord),
    /// The increment landed.
    Applied {
        previous: PaymentRecord,
        current: PaymentRecord,
    },
}

const RECORD_COLUMNS: &str = "id, email, phone, amount_to_pay, amount_paid, invoice_id, \
     provider_ref, status, paid_at, last_webhook_update, created_at";

pub struct PaymentRecordRepository {
    pool: PgPool,
}

impl PaymentRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: NewPaymentRecord) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "INSERT INTO payment_records (email, phone, amount_to_pay, amount_paid, invoice_id, provider_ref, status) \
             VALUES ($1, $2, $3, 0, $4, $5, 'pending') \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.amount_to_pay)
        .bind(&record.invoice_id)
        .bind(&record.provider_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Lookup by the issuance reference string (full-settlement webhook path).
    pub async fn find_by_invoice_id(
        &self,
        invoice_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_records WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Lookup by the provider's internal invoice id (partial-payment webhook path).
    pub async fn find_by_provider_ref(
        &self,
        provider_ref: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_records WHERE provider_ref = $1"
        ))
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Vec<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_records \
             WHERE LOWER(email) = LOWER($1) ORDER BY created_at DESC"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Vec<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_records \
             WHERE phone = $1 ORDER BY created_at DESC"
        ))
        .bind(phone)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Credits one partial payment. The provider payment id is claimed and the
    /// additive update runs in a single transaction, so a redelivered event
    /// can never double-credit and two racing deliveries both land.
    pub async fn apply_partial_payment(
        &self,
        provider_ref: &str,
        payment_id: &str,
        delta: &BigDecimal,
    ) -> Result<PartialPaymentOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let existing = sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_records WHERE provider_ref = $1 FOR UPDATE"
        ))
        .bind(provider_ref)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let previous = match existing {
            Some(record) => record,
            None => {
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                return Ok(PartialPaymentOutcome::NotFound);
            }
        };

        let claimed = sqlx::query(
            "INSERT INTO webhook_events (provider_ref, payment_id) VALUES ($1, $2) \
             ON CONFLICT (provider_ref, payment_id) DO NOTHING",
        )
        .bind(provider_ref)
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(PartialPaymentOutcome::Duplicate(previous));
        }

        let current = sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payment_records SET \
                 amount_paid = amount_paid + $2, \
                 status = CASE WHEN amount_paid + $2 >= amount_to_pay THEN 'completed' \
                               WHEN amount_paid + $2 > 0 THEN 'partially_paid' \
                               ELSE 'pending' END, \
                 paid_at = CASE WHEN amount_paid + $2 >= amount_to_pay AND paid_at IS NULL \
                                THEN NOW() ELSE paid_at END, \
                 last_webhook_update = NOW() \
             WHERE id = $1 \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(previous.id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        Ok(PartialPaymentOutcome::Applied { previous, current })
    }

    /// Applies the authoritative full-settlement signal. Idempotent: a second
    /// application leaves amount, status and paid_at unchanged.
    pub async fn settle(
        &self,
        invoice_id: &str,
    ) -> Result<Option<(PaymentRecord, PaymentRecord)>, DatabaseError> {
        let previous = match self.find_by_invoice_id(invoice_id).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let current = sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payment_records SET \
                 amount_paid = amount_to_pay, \
                 status = 'completed', \
                 paid_at = COALESCE(paid_at, NOW()), \
                 last_webhook_update = NOW() \
             WHERE id = $1 \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(previous.id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(Some((previous, current)))
    }

    /// Administrative repair from reconciliation: overwrites the accumulated
    /// amount and status with values re-derived from the provider.
    pub async fn overwrite_progress(
        &self,
        id: Uuid,
        amount_paid: &BigDecimal,
        status: &str,
    ) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payment_records SET \
                 amount_paid = $2, \
                 status = $3, \
                 paid_at = CASE WHEN $3 = 'completed' AND paid_at IS NULL THEN NOW() ELSE paid_at END \
             WHERE id = $1 \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(amount_paid)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("PaymentRecord", id.to_string()))
    }

    /// Duplicate cleanup: records are cancelled, never deleted.
    pub async fn mark_cancelled(&self, id: Uuid) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payment_records SET status = 'cancelled' WHERE id = $1 \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("PaymentRecord", id.to_string()))
    }

    /// Manual override: force-sets status, bypassing derivation. `paid_at` is
    /// stamped on a transition into completed and otherwise preserved.
    pub async fn force_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payment_records SET \
                 status = $2, \
                 paid_at = CASE WHEN $2 = 'completed' AND paid_at IS NULL THEN NOW() ELSE paid_at END \
             WHERE id = $1 \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("PaymentRecord", id.to_string()))
    }
}
