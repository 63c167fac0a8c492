//! Case store operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Case, CaseAccessView, CaseDraft, CaseParticipant, CaseStatus};

impl Database {
    /// Create a case together with its participant set in one transaction.
    ///
    /// The creator is always merged into the participant set, so the set is
    /// never empty. Unknown patient ids are validation failures; unknown
    /// practitioner ids are not-found failures.
    pub fn create_case(&mut self, draft: &CaseDraft) -> DbResult<Case> {
        let diagnosis = draft.diagnosis.trim();
        let description = draft.description.trim();
        let admission_date = draft.admission_date.trim();

        if diagnosis.is_empty() {
            return Err(DbError::Validation("Diagnosis must not be empty".into()));
        }
        if description.is_empty() {
            return Err(DbError::Validation("Description must not be empty".into()));
        }
        if chrono::NaiveDate::parse_from_str(admission_date, "%Y-%m-%d").is_err() {
            return Err(DbError::Validation(format!(
                "Admission date must be YYYY-MM-DD, got '{}'",
                draft.admission_date
            )));
        }
        if draft.status.is_terminal() {
            return Err(DbError::Validation(
                "Cases cannot be opened in the stable status".into(),
            ));
        }

        // The creator leads the participant set, so it is never empty;
        // invited ids follow in request order, deduplicated
        let mut participants: Vec<&str> = vec![draft.created_by.as_str()];
        for id in &draft.participant_ids {
            if !participants.contains(&id.as_str()) {
                participants.push(id);
            }
        }

        let tx = self.conn.transaction()?;

        let patient_known: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?)",
            [&draft.patient_id],
            |row| row.get(0),
        )?;
        if !patient_known {
            return Err(DbError::Validation(format!(
                "Unknown patient: {}",
                draft.patient_id
            )));
        }

        for id in &participants {
            let known: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM practitioners WHERE id = ?)",
                [id],
                |row| row.get(0),
            )?;
            if !known {
                return Err(DbError::NotFound(format!("Practitioner: {}", id)));
            }
        }

        let case = Case::new(
            draft.patient_id.clone(),
            draft.created_by.clone(),
            diagnosis.to_string(),
            description.to_string(),
            draft.status,
            admission_date.to_string(),
        );

        tx.execute(
            r#"
            INSERT INTO cases (
                id, patient_id, created_by, diagnosis, description,
                status, admission_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                case.id,
                case.patient_id,
                case.created_by,
                case.diagnosis,
                case.description,
                case.status.as_str(),
                case.admission_date,
                case.created_at,
                case.updated_at,
            ],
        )?;

        for id in &participants {
            tx.execute(
                "INSERT OR IGNORE INTO case_participants (case_id, practitioner_id, added_at) \
                 VALUES (?1, ?2, ?3)",
                params![case.id, id, case.created_at],
            )?;
        }

        tx.commit()?;
        Ok(case)
    }

    /// Get a case by ID.
    pub fn get_case(&self, case_id: &str) -> DbResult<Option<Case>> {
        self.conn
            .query_row(
                r#"
                SELECT id, patient_id, created_by, diagnosis, description,
                       status, admission_date, created_at, updated_at
                FROM cases
                WHERE id = ?
                "#,
                [case_id],
                case_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Cases the practitioner participates in, most recent admissions first.
    pub fn list_cases_for_practitioner(&self, practitioner_id: &str) -> DbResult<Vec<Case>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.patient_id, c.created_by, c.diagnosis, c.description,
                   c.status, c.admission_date, c.created_at, c.updated_at
            FROM cases c
            JOIN case_participants cp ON cp.case_id = c.id
            WHERE cp.practitioner_id = ?
            ORDER BY c.admission_date DESC, c.created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([practitioner_id], case_row)?;

        let mut cases = Vec::new();
        for row in rows {
            cases.push(row?.try_into()?);
        }
        Ok(cases)
    }

    /// All completed cases, most recent admissions first.
    pub fn list_stable_cases(&self) -> DbResult<Vec<Case>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, created_by, diagnosis, description,
                   status, admission_date, created_at, updated_at
            FROM cases
            WHERE status = 'stable'
            ORDER BY admission_date DESC, created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([], case_row)?;

        let mut cases = Vec::new();
        for row in rows {
            cases.push(row?.try_into()?);
        }
        Ok(cases)
    }

    /// Raw status write; transition rules live in the lifecycle module.
    pub fn set_case_status(&self, case_id: &str, status: CaseStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE cases SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![case_id, status.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Idempotent membership insert. Returns true when a row was added,
    /// false when it already existed.
    pub fn add_case_participant(&self, case_id: &str, practitioner_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "INSERT OR IGNORE INTO case_participants (case_id, practitioner_id) VALUES (?1, ?2)",
            params![case_id, practitioner_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Whether the practitioner is in the case's participant set.
    pub fn is_case_participant(&self, case_id: &str, practitioner_id: &str) -> DbResult<bool> {
        let member: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM case_participants WHERE case_id = ?1 AND practitioner_id = ?2)",
            params![case_id, practitioner_id],
            |row| row.get(0),
        )?;
        Ok(member)
    }

    /// Participants of a case with directory attributes joined in, in the
    /// order they joined (the creator first).
    pub fn case_participants(&self, case_id: &str) -> DbResult<Vec<CaseParticipant>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.email, p.full_name, p.organization, p.specialty
            FROM case_participants cp
            JOIN practitioners p ON p.id = cp.practitioner_id
            WHERE cp.case_id = ?
            ORDER BY cp.added_at, cp.rowid
            "#,
        )?;

        let rows = stmt.query_map([case_id], |row| {
            let email: String = row.get(1)?;
            let full_name: String = row.get(2)?;
            Ok(CaseParticipant {
                practitioner_id: row.get(0)?,
                display_name: if full_name.trim().is_empty() {
                    email
                } else {
                    full_name
                },
                organization: row.get(3)?,
                specialty: row.get(4)?,
            })
        })?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(row?);
        }
        Ok(participants)
    }

    /// Assemble the projection the access policy decides over.
    pub fn case_access_view(&self, case_id: &str) -> DbResult<Option<CaseAccessView>> {
        let case = match self.get_case(case_id)? {
            Some(case) => case,
            None => return Ok(None),
        };

        let patient_organization: Option<String> = self
            .conn
            .query_row(
                "SELECT organization FROM patients WHERE id = ?",
                [&case.patient_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        let creator_organization: Option<String> = match &case.created_by {
            Some(creator) => self
                .conn
                .query_row(
                    "SELECT organization FROM practitioners WHERE id = ?",
                    [creator],
                    |row| row.get(0),
                )
                .optional()?
                .flatten(),
            None => None,
        };

        let participants = self.case_participants(case_id)?;

        Ok(Some(CaseAccessView {
            case_id: case.id,
            status: case.status,
            created_by: case.created_by,
            creator_organization,
            patient_organization,
            participants,
        }))
    }

    /// Delete the given cases; participants, messages, and reactions cascade
    /// through the schema. Returns the number of cases removed.
    pub fn bulk_delete_cases(&mut self, case_ids: &[String]) -> DbResult<usize> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        for id in case_ids {
            deleted += tx.execute("DELETE FROM cases WHERE id = ?", [id])?;
        }
        tx.commit()?;
        tracing::info!(requested = case_ids.len(), deleted, "cases purged");
        Ok(deleted)
    }
}

/// Intermediate row struct for database mapping.
struct CaseRow {
    id: String,
    patient_id: String,
    created_by: Option<String>,
    diagnosis: String,
    description: String,
    status: String,
    admission_date: String,
    created_at: String,
    updated_at: String,
}

fn case_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseRow> {
    Ok(CaseRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        created_by: row.get(2)?,
        diagnosis: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        admission_date: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl TryFrom<CaseRow> for Case {
    type Error = DbError;

    fn try_from(row: CaseRow) -> Result<Self, Self::Error> {
        let status = CaseStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown case status: {}", row.status)))?;

        Ok(Case {
            id: row.id,
            patient_id: row.patient_id,
            created_by: row.created_by,
            diagnosis: row.diagnosis,
            description: row.description,
            status,
            admission_date: row.admission_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, Practitioner, Role};

    fn setup_db() -> (Database, Practitioner, Patient) {
        let db = Database::open_in_memory().unwrap();
        let practitioner = Practitioner::new("creator@clinic.example".into(), Role::Practitioner);
        db.insert_practitioner(&practitioner).unwrap();
        let patient = Patient::new("Anna".into(), "Petrova".into(), "1980-05-20".into(), "F".into());
        db.insert_patient(&patient).unwrap();
        (db, practitioner, patient)
    }

    fn draft(patient: &Patient, creator: &Practitioner) -> CaseDraft {
        CaseDraft {
            patient_id: patient.id.clone(),
            created_by: creator.id.clone(),
            diagnosis: "I10 Essential hypertension".into(),
            description: "Blood pressure uncontrolled on dual therapy".into(),
            status: CaseStatus::Monitoring,
            admission_date: "2024-03-01".into(),
            participant_ids: vec![],
        }
    }

    #[test]
    fn test_create_and_get_case() {
        let (mut db, creator, patient) = setup_db();

        let case = db.create_case(&draft(&patient, &creator)).unwrap();
        let retrieved = db.get_case(&case.id).unwrap().unwrap();
        assert_eq!(retrieved, case);
        assert_eq!(retrieved.status, CaseStatus::Monitoring);
        assert_eq!(retrieved.created_by.as_deref(), Some(creator.id.as_str()));
    }

    #[test]
    fn test_create_case_validation() {
        let (mut db, creator, patient) = setup_db();

        let mut empty_diagnosis = draft(&patient, &creator);
        empty_diagnosis.diagnosis = "   ".into();
        assert!(matches!(
            db.create_case(&empty_diagnosis),
            Err(DbError::Validation(_))
        ));

        let mut bad_date = draft(&patient, &creator);
        bad_date.admission_date = "01.03.2024".into();
        assert!(matches!(
            db.create_case(&bad_date),
            Err(DbError::Validation(_))
        ));

        let mut terminal = draft(&patient, &creator);
        terminal.status = CaseStatus::Stable;
        assert!(matches!(
            db.create_case(&terminal),
            Err(DbError::Validation(_))
        ));

        let mut unknown_patient = draft(&patient, &creator);
        unknown_patient.patient_id = "missing".into();
        assert!(matches!(
            db.create_case(&unknown_patient),
            Err(DbError::Validation(_))
        ));

        let mut unknown_participant = draft(&patient, &creator);
        unknown_participant.participant_ids = vec!["missing".into()];
        assert!(matches!(
            db.create_case(&unknown_participant),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_creator_merged_into_participants() {
        let (mut db, creator, patient) = setup_db();

        let colleague = Practitioner::new("colleague@clinic.example".into(), Role::Practitioner);
        db.insert_practitioner(&colleague).unwrap();

        let mut case_draft = draft(&patient, &creator);
        case_draft.participant_ids = vec![colleague.id.clone(), colleague.id.clone()];
        let case = db.create_case(&case_draft).unwrap();

        let participants = db.case_participants(&case.id).unwrap();
        assert_eq!(participants.len(), 2);
        assert!(db.is_case_participant(&case.id, &creator.id).unwrap());
        assert!(db.is_case_participant(&case.id, &colleague.id).unwrap());
    }

    #[test]
    fn test_add_participant_idempotent() {
        let (mut db, creator, patient) = setup_db();
        let case = db.create_case(&draft(&patient, &creator)).unwrap();

        let colleague = Practitioner::new("colleague@clinic.example".into(), Role::Practitioner);
        db.insert_practitioner(&colleague).unwrap();

        assert!(db.add_case_participant(&case.id, &colleague.id).unwrap());
        assert!(!db.add_case_participant(&case.id, &colleague.id).unwrap());
        assert_eq!(db.case_participants(&case.id).unwrap().len(), 2);
    }

    #[test]
    fn test_list_ordering() {
        let (mut db, creator, patient) = setup_db();

        let mut early = draft(&patient, &creator);
        early.admission_date = "2024-01-10".into();
        let early = db.create_case(&early).unwrap();

        let mut late = draft(&patient, &creator);
        late.admission_date = "2024-04-05".into();
        let late = db.create_case(&late).unwrap();

        let cases = db.list_cases_for_practitioner(&creator.id).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, late.id);
        assert_eq!(cases[1].id, early.id);
    }

    #[test]
    fn test_access_view_organizations() {
        let (mut db, _, _) = setup_db();

        let mut creator = Practitioner::new("lead@clinic.example".into(), Role::Practitioner);
        creator.organization = Some("org-1".into());
        db.insert_practitioner(&creator).unwrap();

        let mut patient = Patient::new("Ivan".into(), "Orlov".into(), "1975-02-11".into(), "M".into());
        patient.organization = Some("org-2".into());
        db.insert_patient(&patient).unwrap();

        let case = db.create_case(&draft(&patient, &creator)).unwrap();

        let view = db.case_access_view(&case.id).unwrap().unwrap();
        assert_eq!(view.status, CaseStatus::Monitoring);
        assert_eq!(view.patient_organization.as_deref(), Some("org-2"));
        assert_eq!(view.creator_organization.as_deref(), Some("org-1"));
        assert_eq!(view.participants.len(), 1);
        assert!(!view.creator_missing());

        assert!(db.case_access_view("missing").unwrap().is_none());
    }

    #[test]
    fn test_set_case_status() {
        let (mut db, creator, patient) = setup_db();
        let case = db.create_case(&draft(&patient, &creator)).unwrap();

        assert!(db.set_case_status(&case.id, CaseStatus::Stable).unwrap());
        let retrieved = db.get_case(&case.id).unwrap().unwrap();
        assert_eq!(retrieved.status, CaseStatus::Stable);

        assert!(!db.set_case_status("missing", CaseStatus::Urgent).unwrap());
    }

    #[test]
    fn test_bulk_delete_cases() {
        let (mut db, creator, patient) = setup_db();
        let first = db.create_case(&draft(&patient, &creator)).unwrap();
        let second = db.create_case(&draft(&patient, &creator)).unwrap();

        let deleted = db
            .bulk_delete_cases(&[first.id.clone(), "missing".into(), second.id.clone()])
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(db.get_case(&first.id).unwrap().is_none());
        assert!(db.list_cases_for_practitioner(&creator.id).unwrap().is_empty());
    }
}
