//! # Prescription Repository
//!
//! Prescriptions move `PENDING → DISPENSED` when a sale references them
//! (see [`SaleRepository::record_sale`](crate::SaleRepository::record_sale))
//! or `PENDING → CANCELLED` by hand. Medication lines live in a JSON column.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{like_pattern, new_id};
use medtrack_core::{Gender, Prescription, PrescriptionStatus};

const PRESCRIPTION_COLUMNS: &str = "id, pharmacy_id, patient_name, age, gender, doctor, medications, \
     status, image_url, user_id, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct PrescriptionFilter {
    pub status: Option<PrescriptionStatus>,
    /// Substring of patient or doctor name.
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub patient_name: String,
    pub age: i64,
    pub gender: Gender,
    pub doctor: String,
    pub medications: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PrescriptionUpdate {
    pub patient_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub doctor: Option<String>,
    pub medications: Option<Vec<String>>,
    pub status: Option<PrescriptionStatus>,
    /// `Some(None)` clears the image.
    pub image_url: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct PrescriptionRepository {
    pool: SqlitePool,
}

impl PrescriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PrescriptionRepository { pool }
    }

    /// Newest first.
    pub async fn list(&self, pharmacy_id: &str, filter: &PrescriptionFilter) -> DbResult<Vec<Prescription>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let sql = format!(
            r#"
            SELECT {}
            FROM prescriptions
            WHERE pharmacy_id = ?1
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR patient_name LIKE ?3 ESCAPE '\' OR doctor LIKE ?3 ESCAPE '\')
            ORDER BY created_at DESC, rowid DESC
            "#,
            PRESCRIPTION_COLUMNS
        );

        let prescriptions = sqlx::query_as::<_, Prescription>(&sql)
            .bind(pharmacy_id)
            .bind(filter.status)
            .bind(search)
            .fetch_all(&self.pool)
            .await?;

        Ok(prescriptions)
    }

    pub async fn get(&self, pharmacy_id: &str, id: &str) -> DbResult<Option<Prescription>> {
        let sql = format!(
            "SELECT {} FROM prescriptions WHERE id = ?1 AND pharmacy_id = ?2",
            PRESCRIPTION_COLUMNS
        );
        let prescription = sqlx::query_as::<_, Prescription>(&sql)
            .bind(id)
            .bind(pharmacy_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(prescription)
    }

    pub async fn require(&self, pharmacy_id: &str, id: &str) -> DbResult<Prescription> {
        self.get(pharmacy_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Prescription", id))
    }

    /// Records a new prescription as `PENDING`.
    pub async fn create(&self, pharmacy_id: &str, user_id: &str, new: NewPrescription) -> DbResult<Prescription> {
        let now = Utc::now();
        let prescription = Prescription {
            id: new_id(),
            pharmacy_id: pharmacy_id.to_string(),
            patient_name: new.patient_name,
            age: new.age,
            gender: new.gender,
            doctor: new.doctor,
            medications: new.medications,
            status: PrescriptionStatus::Pending,
            image_url: new.image_url,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %prescription.id, patient = %prescription.patient_name, "Inserting prescription");

        sqlx::query(
            r#"
            INSERT INTO prescriptions (
                id, pharmacy_id, patient_name, age, gender, doctor,
                medications, status, image_url, user_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&prescription.id)
        .bind(&prescription.pharmacy_id)
        .bind(&prescription.patient_name)
        .bind(prescription.age)
        .bind(prescription.gender)
        .bind(&prescription.doctor)
        .bind(Json(&prescription.medications))
        .bind(prescription.status)
        .bind(&prescription.image_url)
        .bind(&prescription.user_id)
        .bind(prescription.created_at)
        .bind(prescription.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(prescription)
    }

    pub async fn update(&self, pharmacy_id: &str, id: &str, update: PrescriptionUpdate) -> DbResult<Prescription> {
        let current = self.require(pharmacy_id, id).await?;

        let updated = Prescription {
            patient_name: update.patient_name.unwrap_or(current.patient_name),
            age: update.age.unwrap_or(current.age),
            gender: update.gender.unwrap_or(current.gender),
            doctor: update.doctor.unwrap_or(current.doctor),
            medications: update.medications.unwrap_or(current.medications),
            status: update.status.unwrap_or(current.status),
            image_url: update.image_url.unwrap_or(current.image_url),
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            r#"
            UPDATE prescriptions
            SET patient_name = ?3, age = ?4, gender = ?5, doctor = ?6,
                medications = ?7, status = ?8, image_url = ?9, updated_at = ?10
            WHERE id = ?1 AND pharmacy_id = ?2
            "#,
        )
        .bind(&updated.id)
        .bind(pharmacy_id)
        .bind(&updated.patient_name)
        .bind(updated.age)
        .bind(updated.gender)
        .bind(&updated.doctor)
        .bind(Json(&updated.medications))
        .bind(updated.status)
        .bind(&updated.image_url)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(updated)
    }

    pub async fn set_status(&self, pharmacy_id: &str, id: &str, status: PrescriptionStatus) -> DbResult<Prescription> {
        self.update(
            pharmacy_id,
            id,
            PrescriptionUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes a prescription; linked sales keep their rows with the link cleared.
    pub async fn delete(&self, pharmacy_id: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM prescriptions WHERE id = ?1 AND pharmacy_id = ?2")
            .bind(id)
            .bind(pharmacy_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Prescription", id));
        }

        info!(id = %id, "Prescription deleted");
        Ok(())
    }

    pub async fn count_by_status(&self, pharmacy_id: &str, status: PrescriptionStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prescriptions WHERE pharmacy_id = ?1 AND status = ?2")
            .bind(pharmacy_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{register, test_db};

    fn new_prescription(patient: &str, doctor: &str) -> NewPrescription {
        NewPrescription {
            patient_name: patient.to_string(),
            age: 42,
            gender: Gender::Other,
            doctor: doctor.to_string(),
            medications: vec!["Ibuprofen 200mg".to_string(), "Vitamin D".to_string()],
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_round_trips_medications() {
        let db = test_db().await;
        let (pharmacy, admin) = register(&db, "rxa").await;
        let repo = db.prescriptions();

        let created = repo
            .create(&pharmacy.id, &admin.id, new_prescription("Jane Doe", "Dr. Smith"))
            .await
            .unwrap();
        assert_eq!(created.status, PrescriptionStatus::Pending);

        let fetched = repo.require(&pharmacy.id, &created.id).await.unwrap();
        assert_eq!(fetched.medications, vec!["Ibuprofen 200mg", "Vitamin D"]);
        assert_eq!(fetched.gender, Gender::Other);
        assert_eq!(repo.count_by_status(&pharmacy.id, PrescriptionStatus::Pending).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = test_db().await;
        let (pharmacy, admin) = register(&db, "rxl").await;
        let repo = db.prescriptions();

        let first = repo
            .create(&pharmacy.id, &admin.id, new_prescription("Jane Doe", "Dr. Smith"))
            .await
            .unwrap();
        repo.create(&pharmacy.id, &admin.id, new_prescription("John Roe", "Dr. Jones"))
            .await
            .unwrap();
        repo.set_status(&pharmacy.id, &first.id, PrescriptionStatus::Cancelled)
            .await
            .unwrap();

        let cancelled = PrescriptionFilter {
            status: Some(PrescriptionStatus::Cancelled),
            ..Default::default()
        };
        let listed = repo.list(&pharmacy.id, &cancelled).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].patient_name, "Jane Doe");

        let by_doctor = PrescriptionFilter {
            search: Some("jones".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&pharmacy.id, &by_doctor).await.unwrap()[0].patient_name, "John Roe");
    }

    #[tokio::test]
    async fn test_update_delete_and_isolation() {
        let db = test_db().await;
        let (pharmacy, admin) = register(&db, "rxu").await;
        let (other, _) = register(&db, "rxv").await;
        let repo = db.prescriptions();

        let created = repo
            .create(&pharmacy.id, &admin.id, new_prescription("Jane Doe", "Dr. Smith"))
            .await
            .unwrap();

        let updated = repo
            .update(
                &pharmacy.id,
                &created.id,
                PrescriptionUpdate {
                    age: Some(43),
                    image_url: Some(Some("https://img.test/rx.png".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.age, 43);
        assert_eq!(updated.doctor, "Dr. Smith");

        assert!(repo.get(&other.id, &created.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&other.id, &created.id).await,
            Err(DbError::NotFound { .. })
        ));

        repo.delete(&pharmacy.id, &created.id).await.unwrap();
        assert!(repo.get(&pharmacy.id, &created.id).await.unwrap().is_none());
    }
}
