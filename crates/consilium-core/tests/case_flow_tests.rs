//! End-to-end scenarios across the case lifecycle: creation, discussion,
//! read tracking, reactions, completion, and the knowledge-base projection.

use consilium_core::db::Database;
use consilium_core::error::CaseError;
use consilium_core::knowledge::{KnowledgeBase, MAX_RESULTS, NO_DECISION_PLACEHOLDER};
use consilium_core::lifecycle::{CaseLifecycle, CompletionOutcome};
use consilium_core::messaging::{MessagingEngine, UnreadTracker};
use consilium_core::models::{
    Case, CaseDraft, CaseMessage, CaseStatus, MedicalRecord, Patient, Practitioner,
    ReactionKind, ReactionToggle, Role,
};
use consilium_core::policy;

fn practitioner(
    db: &Database,
    email: &str,
    role: Role,
    organization: Option<&str>,
    specialty: Option<&str>,
) -> Practitioner {
    let mut p = Practitioner::new(email.to_string(), role);
    p.organization = organization.map(String::from);
    p.specialty = specialty.map(String::from);
    db.insert_practitioner(&p).unwrap();
    p
}

fn patient(db: &Database, first: &str, last: &str, organization: Option<&str>) -> Patient {
    let mut p = Patient::new(
        first.to_string(),
        last.to_string(),
        "1975-06-15".to_string(),
        "F".to_string(),
    );
    p.organization = organization.map(String::from);
    db.insert_patient(&p).unwrap();
    p
}

fn open_case(
    db: &mut Database,
    patient: &Patient,
    creator: &Practitioner,
    others: &[&Practitioner],
) -> Case {
    db.create_case(&CaseDraft {
        patient_id: patient.id.clone(),
        created_by: creator.id.clone(),
        diagnosis: "J18.9 pneumonia".to_string(),
        description: "Fever and productive cough, day 4".to_string(),
        status: CaseStatus::Monitoring,
        admission_date: "2024-03-01".to_string(),
        participant_ids: others.iter().map(|p| p.id.clone()).collect(),
    })
    .unwrap()
}

#[test]
fn test_case_creation_validation() {
    let mut db = Database::open_in_memory().unwrap();
    let creator = practitioner(&db, "a@alpha.example", Role::Practitioner, None, None);
    let subject = patient(&db, "Ivan", "Orlov", None);

    let draft = CaseDraft {
        patient_id: subject.id.clone(),
        created_by: creator.id.clone(),
        diagnosis: "I10".to_string(),
        description: "Elevated blood pressure".to_string(),
        status: CaseStatus::Monitoring,
        admission_date: "2024-03-01".to_string(),
        participant_ids: vec![],
    };

    let blank_diagnosis = CaseDraft {
        diagnosis: "   ".to_string(),
        ..draft.clone()
    };
    assert!(db.create_case(&blank_diagnosis).is_err());

    let blank_description = CaseDraft {
        description: String::new(),
        ..draft.clone()
    };
    assert!(db.create_case(&blank_description).is_err());

    let bad_date = CaseDraft {
        admission_date: "01.03.2024".to_string(),
        ..draft.clone()
    };
    assert!(db.create_case(&bad_date).is_err());

    let born_stable = CaseDraft {
        status: CaseStatus::Stable,
        ..draft.clone()
    };
    assert!(db.create_case(&born_stable).is_err());

    let unknown_patient = CaseDraft {
        patient_id: "no-such-patient".to_string(),
        ..draft.clone()
    };
    assert!(db.create_case(&unknown_patient).is_err());

    let unknown_participant = CaseDraft {
        participant_ids: vec!["no-such-practitioner".to_string()],
        ..draft.clone()
    };
    assert!(db.create_case(&unknown_participant).is_err());

    // Nothing above may leave partial rows behind
    let count: i64 = db
        .conn()
        .query_row("SELECT COUNT(*) FROM cases", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);

    assert!(db.create_case(&draft).is_ok());
}

#[test]
fn test_creator_always_joins_participant_set() {
    let mut db = Database::open_in_memory().unwrap();
    let creator = practitioner(&db, "a@alpha.example", Role::Practitioner, Some("alpha"), None);
    let colleague = practitioner(&db, "b@beta.example", Role::Practitioner, Some("beta"), None);
    let subject = patient(&db, "Ivan", "Orlov", Some("alpha"));

    // The colleague invited twice, the creator not listed at all
    let case = db
        .create_case(&CaseDraft {
            patient_id: subject.id.clone(),
            created_by: creator.id.clone(),
            diagnosis: "I10".to_string(),
            description: "Elevated blood pressure".to_string(),
            status: CaseStatus::Urgent,
            admission_date: "2024-03-01".to_string(),
            participant_ids: vec![colleague.id.clone(), colleague.id.clone()],
        })
        .unwrap();

    let participants = db.case_participants(&case.id).unwrap();
    assert_eq!(participants.len(), 2);
    assert!(participants.iter().any(|p| p.practitioner_id == creator.id));
    assert!(participants
        .iter()
        .any(|p| p.practitioner_id == colleague.id));

    // No names on file, display falls back to email
    let colleague_row = participants
        .iter()
        .find(|p| p.practitioner_id == colleague.id)
        .unwrap();
    assert_eq!(colleague_row.display_name, "b@beta.example");
}

#[test]
fn test_cross_organization_consultation_flow() {
    let mut db = Database::open_in_memory().unwrap();
    let dr_a = practitioner(&db, "a@alpha.example", Role::Practitioner, Some("alpha"), None);
    let dr_b = practitioner(&db, "b@beta.example", Role::Practitioner, Some("beta"), None);
    let dr_e = practitioner(&db, "e@alpha.example", Role::Practitioner, Some("alpha"), None);
    let outsider = practitioner(&db, "c@gamma.example", Role::Practitioner, Some("gamma"), None);
    let beta_admin = practitioner(&db, "d@beta.example", Role::OrgAdmin, Some("beta"), None);
    let subject = patient(&db, "Ivan", "Orlov", Some("alpha"));

    let case = open_case(&mut db, &subject, &dr_a, &[&dr_b, &dr_e]);

    // Visibility while the case is active
    let view = db.case_access_view(&case.id).unwrap().unwrap();
    assert!(policy::can_view(&dr_a, &view));
    assert!(policy::can_view(&dr_b, &view));
    assert!(!policy::can_view(&outsider, &view));
    // Reaches the case through dr_b's affiliation
    assert!(policy::can_view(&beta_admin, &view));

    let engine = MessagingEngine::new(&db);
    engine
        .post_message(&case.id, &dr_b, "Suggest chest CT before escalating")
        .unwrap();
    engine
        .post_message(&case.id, &dr_b, "CT shows right lower lobe consolidation")
        .unwrap();

    let unread = UnreadTracker::new(&db);
    assert_eq!(unread.count_for(&case.id, &dr_a.id).unwrap(), 2);
    assert_eq!(unread.count_for(&case.id, &dr_e.id).unwrap(), 2);
    // Authors never count their own messages
    assert_eq!(unread.count_for(&case.id, &dr_b.id).unwrap(), 0);

    // Outsiders cannot post into the thread
    let err = engine
        .post_message(&case.id, &outsider, "Opinion from outside")
        .unwrap_err();
    assert!(matches!(err, CaseError::Forbidden(_)));

    // One participant reading marks the whole case read
    let messages = engine.list_messages(&case.id, &dr_a).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Suggest chest CT before escalating");
    assert_eq!(unread.count_for(&case.id, &dr_a.id).unwrap(), 0);
    assert_eq!(unread.count_for(&case.id, &dr_e.id).unwrap(), 0);
}

#[test]
fn test_message_content_rules() {
    let mut db = Database::open_in_memory().unwrap();
    let creator = practitioner(&db, "a@alpha.example", Role::Practitioner, None, None);
    let subject = patient(&db, "Ivan", "Orlov", None);
    let case = open_case(&mut db, &subject, &creator, &[]);

    let engine = MessagingEngine::new(&db);

    let err = engine.post_message(&case.id, &creator, "   \n\t ").unwrap_err();
    assert!(matches!(err, CaseError::Validation(_)));

    let err = engine
        .post_message("no-such-case", &creator, "hello")
        .unwrap_err();
    assert!(matches!(err, CaseError::NotFound(_)));

    // Surrounding whitespace is stripped before storage
    let message = engine
        .post_message(&case.id, &creator, "  consider nephrology consult  ")
        .unwrap();
    assert_eq!(message.content, "consider nephrology consult");

    let stored = db.get_message(&message.id).unwrap().unwrap();
    assert_eq!(stored.content, "consider nephrology consult");
    assert!(!stored.is_read);
}

#[test]
fn test_reaction_toggle_and_summary() {
    let mut db = Database::open_in_memory().unwrap();
    let dr_a = practitioner(&db, "a@alpha.example", Role::Practitioner, Some("alpha"), None);
    let dr_b = practitioner(&db, "b@beta.example", Role::Practitioner, Some("beta"), None);
    let outsider = practitioner(&db, "c@gamma.example", Role::Practitioner, None, None);
    let subject = patient(&db, "Ivan", "Orlov", Some("alpha"));
    let case = open_case(&mut db, &subject, &dr_a, &[&dr_b]);

    let engine = MessagingEngine::new(&db);
    let message = engine
        .post_message(&case.id, &dr_b, "Suggest chest CT")
        .unwrap();

    // Same (user, kind) pair toggles on and off
    assert_eq!(
        engine.react(&message.id, &dr_a, ReactionKind::ThumbsUp).unwrap(),
        ReactionToggle::Added
    );
    assert_eq!(
        engine.react(&message.id, &dr_a, ReactionKind::ThumbsUp).unwrap(),
        ReactionToggle::Removed
    );
    assert_eq!(
        engine.react(&message.id, &dr_a, ReactionKind::ThumbsUp).unwrap(),
        ReactionToggle::Added
    );

    // The other kind toggles independently
    assert_eq!(
        engine.react(&message.id, &dr_a, ReactionKind::ThumbsDown).unwrap(),
        ReactionToggle::Added
    );
    assert_eq!(
        engine.react(&message.id, &dr_b, ReactionKind::ThumbsUp).unwrap(),
        ReactionToggle::Added
    );

    let err = engine
        .react(&message.id, &outsider, ReactionKind::ThumbsUp)
        .unwrap_err();
    assert!(matches!(err, CaseError::Forbidden(_)));
    let err = engine
        .react("no-such-message", &dr_a, ReactionKind::ThumbsUp)
        .unwrap_err();
    assert!(matches!(err, CaseError::NotFound(_)));

    let summary = engine.summarize_reactions(&message.id, &dr_a).unwrap();
    assert_eq!(summary.groups.len(), 2);
    assert_eq!(summary.groups[0].kind, ReactionKind::ThumbsUp);
    assert_eq!(
        summary.groups[0].reactors,
        vec!["a@alpha.example".to_string(), "b@beta.example".to_string()]
    );
    assert_eq!(summary.groups[1].kind, ReactionKind::ThumbsDown);
    assert_eq!(summary.groups[1].reactors, vec!["a@alpha.example".to_string()]);
    assert_eq!(
        summary.viewer_kinds,
        vec![ReactionKind::ThumbsUp, ReactionKind::ThumbsDown]
    );

    let summary = engine.summarize_reactions(&message.id, &dr_b).unwrap();
    assert_eq!(summary.viewer_kinds, vec![ReactionKind::ThumbsUp]);
}

#[test]
fn test_completion_flow() {
    let mut db = Database::open_in_memory().unwrap();
    let dr_a = practitioner(&db, "a@alpha.example", Role::Practitioner, Some("alpha"), None);
    let dr_b = practitioner(&db, "b@beta.example", Role::Practitioner, Some("beta"), None);
    let outsider = practitioner(&db, "c@gamma.example", Role::Practitioner, Some("gamma"), None);
    let subject = patient(&db, "Ivan", "Orlov", Some("alpha"));
    let case = open_case(&mut db, &subject, &dr_a, &[&dr_b]);

    let lifecycle = CaseLifecycle::new(&db);

    // Authorization is checked before anything else
    let err = lifecycle.complete(&case.id, &outsider).unwrap_err();
    assert!(matches!(err, CaseError::Forbidden(_)));
    let err = lifecycle.complete("no-such-case", &dr_a).unwrap_err();
    assert!(matches!(err, CaseError::NotFound(_)));

    // Escalate, then de-escalate, then complete
    let case_row = lifecycle
        .reclassify(&case.id, &dr_b, CaseStatus::Urgent)
        .unwrap();
    assert_eq!(case_row.status, CaseStatus::Urgent);
    let case_row = lifecycle
        .reclassify(&case.id, &dr_b, CaseStatus::Monitoring)
        .unwrap();
    assert_eq!(case_row.status, CaseStatus::Monitoring);

    assert_eq!(
        lifecycle.complete(&case.id, &dr_b).unwrap(),
        CompletionOutcome::Completed
    );
    assert_eq!(
        db.get_case(&case.id).unwrap().unwrap().status,
        CaseStatus::Stable
    );

    // Completing again is a no-op, not an error
    assert_eq!(
        lifecycle.complete(&case.id, &dr_a).unwrap(),
        CompletionOutcome::AlreadyStable
    );
    // An outsider still cannot call it, even as a no-op
    let err = lifecycle.complete(&case.id, &outsider).unwrap_err();
    assert!(matches!(err, CaseError::Forbidden(_)));

    // Completed cases never reopen
    let err = lifecycle
        .reclassify(&case.id, &dr_a, CaseStatus::Urgent)
        .unwrap_err();
    assert!(matches!(err, CaseError::Validation(_)));
    // Reclassification never reaches the terminal status either
    let err = lifecycle
        .reclassify(&case.id, &dr_a, CaseStatus::Stable)
        .unwrap_err();
    assert!(matches!(err, CaseError::Validation(_)));

    // Visibility widens to everyone; the discussion stays open to members
    let view = db.case_access_view(&case.id).unwrap().unwrap();
    assert!(policy::can_view(&outsider, &view));
    let engine = MessagingEngine::new(&db);
    assert!(engine
        .post_message(&case.id, &dr_a, "Follow-up in two weeks")
        .is_ok());
    assert!(engine
        .post_message(&case.id, &outsider, "Drive-by comment")
        .is_err());
}

#[test]
fn test_unread_counts_per_viewer() {
    let mut db = Database::open_in_memory().unwrap();
    let dr_a = practitioner(&db, "a@alpha.example", Role::Practitioner, None, None);
    let dr_b = practitioner(&db, "b@beta.example", Role::Practitioner, None, None);
    let dr_c = practitioner(&db, "c@gamma.example", Role::Practitioner, None, None);
    let subject = patient(&db, "Ivan", "Orlov", None);
    let case = open_case(&mut db, &subject, &dr_a, &[&dr_b, &dr_c]);

    let engine = MessagingEngine::new(&db);
    engine.post_message(&case.id, &dr_a, "Initial assessment").unwrap();
    engine.post_message(&case.id, &dr_b, "Concur, adding labs").unwrap();

    let unread = UnreadTracker::new(&db);
    assert_eq!(unread.count_for(&case.id, &dr_a.id).unwrap(), 1);
    assert_eq!(unread.count_for(&case.id, &dr_b.id).unwrap(), 1);
    assert_eq!(unread.count_for(&case.id, &dr_c.id).unwrap(), 2);

    // Any participant's read sweeps the case for everyone
    engine.list_messages(&case.id, &dr_c).unwrap();
    assert_eq!(unread.count_for(&case.id, &dr_a.id).unwrap(), 0);
    assert_eq!(unread.count_for(&case.id, &dr_b.id).unwrap(), 0);
    assert_eq!(unread.count_for(&case.id, &dr_c.id).unwrap(), 0);
}

/// Builds one completed case with a realistic paper trail and returns it
/// with its creator.
fn completed_case(db: &mut Database) -> (Case, Practitioner) {
    let creator = practitioner(
        db,
        "pulm@alpha.example",
        Role::Practitioner,
        Some("alpha"),
        Some("pulmonology"),
    );
    let consultant = practitioner(
        db,
        "cardio@beta.example",
        Role::Practitioner,
        Some("beta"),
        Some("cardiology"),
    );
    let mut subject = Patient::new(
        "Anna".to_string(),
        "Petrova".to_string(),
        "1960-01-10".to_string(),
        "F".to_string(),
    );
    subject.organization = Some("alpha".to_string());
    db.insert_patient(&subject).unwrap();

    let mut record = MedicalRecord::new(subject.id.clone(), "2024-02-20".to_string());
    record.chronic_diseases = Some("diabetes, hypertension, asthma, obesity".to_string());
    db.insert_medical_record(&record).unwrap();

    let case = db
        .create_case(&CaseDraft {
            patient_id: subject.id.clone(),
            created_by: creator.id.clone(),
            diagnosis: "J18.9 community-acquired pneumonia".to_string(),
            description: "Bilateral infiltrates, sats 91% on room air".to_string(),
            status: CaseStatus::Urgent,
            admission_date: "2024-03-01".to_string(),
            participant_ids: vec![consultant.id.clone()],
        })
        .unwrap();

    // Timestamps pinned so the discussion spans a known interval
    let mut first = CaseMessage::new(
        case.id.clone(),
        creator.id.clone(),
        "Starting empiric ceftriaxone".to_string(),
    );
    first.created_at = "2024-03-01T10:00:00+00:00".to_string();
    db.insert_message(&first).unwrap();

    let mut last = CaseMessage::new(
        case.id.clone(),
        consultant.id.clone(),
        "Echo unremarkable. Discharged on oral amoxicillin-clavulanate with \
         pulmonology follow-up in two weeks and a repeat chest film in six."
            .to_string(),
    );
    last.created_at = "2024-03-01T11:45:00+00:00".to_string();
    db.insert_message(&last).unwrap();

    db.set_case_status(&case.id, CaseStatus::Stable).unwrap();
    (case, creator)
}

#[test]
fn test_knowledge_base_projection() {
    let mut db = Database::open_in_memory().unwrap();
    let (case, creator) = completed_case(&mut db);

    // An active case that would match every filter
    let active_patient = patient(&db, "Boris", "Volkov", Some("alpha"));
    open_case(&mut db, &active_patient, &creator, &[]);

    let kb = KnowledgeBase::new(&db);
    let entries = kb.search(None, None).unwrap();
    assert_eq!(entries.len(), 1, "active cases must stay out");

    let entry = &entries[0];
    assert_eq!(entry.case_id, case.id);
    assert_eq!(entry.diagnosis, "J18.9 community-acquired pneumonia");
    assert_eq!(entry.admission_date, "2024-03-01");
    assert_eq!(entry.duration_minutes, 105);
    assert_eq!(entry.patient_gender, "F");
    assert!(entry.patient_age.unwrap() >= 64);

    // Last message, cut at 100 chars with a marker
    assert!(entry.decision.starts_with("Echo unremarkable."));
    assert_eq!(entry.decision.chars().count(), 103);
    assert!(entry.decision.ends_with("..."));

    // Comorbidities come from the latest record, capped at three
    assert_eq!(
        entry.comorbidities,
        vec!["diabetes".to_string(), "hypertension".to_string(), "asthma".to_string()]
    );
    assert_eq!(
        entry.specialties,
        vec!["pulmonology".to_string(), "cardiology".to_string()]
    );

    // Nothing identifying leaks into the projection
    let json = serde_json::to_string(entry).unwrap();
    assert!(!json.contains("Petrova"));
    assert!(!json.contains("pulm@alpha.example"));
}

#[test]
fn test_knowledge_base_filters() {
    let mut db = Database::open_in_memory().unwrap();
    let (case, _) = completed_case(&mut db);

    let kb = KnowledgeBase::new(&db);

    // Substring match is case-insensitive over diagnosis, description,
    // and patient name
    assert_eq!(kb.search(Some("PNEUMONIA"), None).unwrap().len(), 1);
    assert_eq!(kb.search(Some("infiltrates"), None).unwrap().len(), 1);
    assert_eq!(kb.search(Some("petrova"), None).unwrap().len(), 1);
    assert_eq!(kb.search(Some("appendicitis"), None).unwrap().len(), 0);

    // Blank query means no filter
    assert_eq!(kb.search(Some("   "), None).unwrap().len(), 1);

    // Specialty filters on the participant set, exact match only
    assert_eq!(kb.search(None, Some("cardiology")).unwrap().len(), 1);
    assert_eq!(kb.search(None, Some("cardio")).unwrap().len(), 0);
    assert_eq!(kb.search(None, Some("neurology")).unwrap().len(), 0);

    let entries = kb.search(Some("pneumonia"), Some("pulmonology")).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].case_id, case.id);
}

#[test]
fn test_knowledge_base_placeholder_and_cap() {
    let mut db = Database::open_in_memory().unwrap();
    let creator = practitioner(&db, "a@alpha.example", Role::Practitioner, None, None);
    let subject = patient(&db, "Ivan", "Orlov", None);

    for _ in 0..(MAX_RESULTS + 5) {
        let case = open_case(&mut db, &subject, &creator, &[]);
        db.set_case_status(&case.id, CaseStatus::Stable).unwrap();
    }

    let kb = KnowledgeBase::new(&db);
    let entries = kb.search(None, None).unwrap();
    assert_eq!(entries.len(), MAX_RESULTS);

    // Silent threads get the placeholder, and no record means no comorbidities
    assert_eq!(entries[0].decision, NO_DECISION_PLACEHOLDER);
    assert!(entries[0].comorbidities.is_empty());
}

#[test]
fn test_knowledge_export_json() {
    let mut db = Database::open_in_memory().unwrap();
    completed_case(&mut db);

    let kb = KnowledgeBase::new(&db);
    let export = kb.export(None, None).unwrap();
    assert!(!export.generated_at.is_empty());

    let json = export.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["entries"].as_array().unwrap().len(), 1);
    assert_eq!(
        value["entries"][0]["diagnosis"],
        "J18.9 community-acquired pneumonia"
    );
    assert_eq!(value["entries"][0]["duration_minutes"], 105);
}

#[test]
fn test_case_list_ordering_and_bulk_delete() {
    let mut db = Database::open_in_memory().unwrap();
    let creator = practitioner(&db, "a@alpha.example", Role::Practitioner, None, None);
    let subject = patient(&db, "Ivan", "Orlov", None);

    let older = db
        .create_case(&CaseDraft {
            patient_id: subject.id.clone(),
            created_by: creator.id.clone(),
            diagnosis: "I10".to_string(),
            description: "First admission".to_string(),
            status: CaseStatus::Monitoring,
            admission_date: "2024-01-15".to_string(),
            participant_ids: vec![],
        })
        .unwrap();
    let newer = db
        .create_case(&CaseDraft {
            patient_id: subject.id.clone(),
            created_by: creator.id.clone(),
            diagnosis: "I10".to_string(),
            description: "Readmission".to_string(),
            status: CaseStatus::Urgent,
            admission_date: "2024-03-20".to_string(),
            participant_ids: vec![],
        })
        .unwrap();

    // Most recent admission first
    let cases = db.list_cases_for_practitioner(&creator.id).unwrap();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].id, newer.id);
    assert_eq!(cases[1].id, older.id);

    let engine = MessagingEngine::new(&db);
    let message = engine.post_message(&older.id, &creator, "note").unwrap();
    engine
        .react(&message.id, &creator, ReactionKind::ThumbsUp)
        .unwrap();

    let deleted = db
        .bulk_delete_cases(&[older.id.clone(), "no-such-case".to_string()])
        .unwrap();
    assert_eq!(deleted, 1);

    // Cascade takes the thread and reactions with it
    let messages: i64 = db
        .conn()
        .query_row("SELECT COUNT(*) FROM case_messages", [], |row| row.get(0))
        .unwrap();
    let reactions: i64 = db
        .conn()
        .query_row("SELECT COUNT(*) FROM message_reactions", [], |row| row.get(0))
        .unwrap();
    let participants: i64 = db
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM case_participants WHERE case_id = ?",
            [older.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(messages, 0);
    assert_eq!(reactions, 0);
    assert_eq!(participants, 0);
    assert!(db.get_case(&newer.id).unwrap().is_some());
}
