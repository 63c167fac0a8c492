//! Practitioner, patient, and medical-record operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{MedicalRecord, Patient, Practitioner, Role};

impl Database {
    /// Insert a new practitioner.
    pub fn insert_practitioner(&self, practitioner: &Practitioner) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO practitioners (
                id, email, full_name, role, organization, specialty,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                practitioner.id,
                practitioner.email,
                practitioner.full_name,
                practitioner.role.as_str(),
                practitioner.organization,
                practitioner.specialty,
                practitioner.created_at,
                practitioner.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a practitioner by ID.
    pub fn get_practitioner(&self, id: &str) -> DbResult<Option<Practitioner>> {
        self.conn
            .query_row(
                r#"
                SELECT id, email, full_name, role, organization, specialty,
                       created_at, updated_at
                FROM practitioners
                WHERE id = ?
                "#,
                [id],
                practitioner_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a practitioner by login email.
    pub fn get_practitioner_by_email(&self, email: &str) -> DbResult<Option<Practitioner>> {
        self.conn
            .query_row(
                r#"
                SELECT id, email, full_name, role, organization, specialty,
                       created_at, updated_at
                FROM practitioners
                WHERE email = ?
                "#,
                [email],
                practitioner_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, first_name, last_name, middle_name, date_of_birth,
                gender, organization, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                patient.id,
                patient.first_name,
                patient.last_name,
                patient.middle_name,
                patient.date_of_birth,
                patient.gender,
                patient.organization,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, first_name, last_name, middle_name, date_of_birth,
                       gender, organization, created_at, updated_at
                FROM patients
                WHERE id = ?
                "#,
                [id],
                |row| {
                    Ok(Patient {
                        id: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                        middle_name: row.get(3)?,
                        date_of_birth: row.get(4)?,
                        gender: row.get(5)?,
                        organization: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                },
            )
            .optional()?)
    }

    /// Insert a medical record.
    pub fn insert_medical_record(&self, record: &MedicalRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medical_records (
                id, patient_id, practitioner_id, diagnosis, chronic_diseases,
                visit_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.patient_id,
                record.practitioner_id,
                record.diagnosis,
                record.chronic_diseases,
                record.visit_date,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    /// Most recent medical record for a patient, by visit date then creation.
    pub fn latest_medical_record(&self, patient_id: &str) -> DbResult<Option<MedicalRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, patient_id, practitioner_id, diagnosis, chronic_diseases,
                       visit_date, created_at
                FROM medical_records
                WHERE patient_id = ?
                ORDER BY visit_date DESC, created_at DESC
                LIMIT 1
                "#,
                [patient_id],
                |row| {
                    Ok(MedicalRecord {
                        id: row.get(0)?,
                        patient_id: row.get(1)?,
                        practitioner_id: row.get(2)?,
                        diagnosis: row.get(3)?,
                        chronic_diseases: row.get(4)?,
                        visit_date: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?)
    }
}

/// Intermediate row struct for database mapping.
struct PractitionerRow {
    id: String,
    email: String,
    full_name: String,
    role: String,
    organization: Option<String>,
    specialty: Option<String>,
    created_at: String,
    updated_at: String,
}

fn practitioner_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PractitionerRow> {
    Ok(PractitionerRow {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        role: row.get(3)?,
        organization: row.get(4)?,
        specialty: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl TryFrom<PractitionerRow> for Practitioner {
    type Error = DbError;

    fn try_from(row: PractitionerRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", row.role)))?;

        Ok(Practitioner {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            role,
            organization: row.organization,
            specialty: row.specialty,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
