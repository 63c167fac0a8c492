//! SQLite schema definition.

/// Complete database schema for consilium.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Practitioner Directory
-- ============================================================================

CREATE TABLE IF NOT EXISTS practitioners (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT 'practitioner'
        CHECK (role IN ('practitioner', 'org_admin', 'super_admin')),
    organization TEXT,                           -- NULL = unaffiliated
    specialty TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_practitioners_organization ON practitioners(organization);

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    middle_name TEXT,
    date_of_birth TEXT NOT NULL,                 -- YYYY-MM-DD
    gender TEXT NOT NULL DEFAULT 'O',            -- M, F, O
    organization TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_organization ON patients(organization);
CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(last_name, first_name);

CREATE TABLE IF NOT EXISTS medical_records (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    practitioner_id TEXT REFERENCES practitioners(id) ON DELETE SET NULL,
    diagnosis TEXT,
    chronic_diseases TEXT,                       -- free text, comma-separated
    visit_date TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_records_patient ON medical_records(patient_id, visit_date);

-- ============================================================================
-- Consultation Cases
-- ============================================================================

CREATE TABLE IF NOT EXISTS cases (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    created_by TEXT REFERENCES practitioners(id) ON DELETE SET NULL,
    diagnosis TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'monitoring'
        CHECK (status IN ('urgent', 'monitoring', 'stable')),
    admission_date TEXT NOT NULL,                -- YYYY-MM-DD
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_cases_patient ON cases(patient_id);
CREATE INDEX IF NOT EXISTS idx_cases_status ON cases(status);
CREATE INDEX IF NOT EXISTS idx_cases_ordering ON cases(admission_date, created_at);

-- Participant set; the composite key makes membership inserts idempotent
CREATE TABLE IF NOT EXISTS case_participants (
    case_id TEXT NOT NULL REFERENCES cases(id) ON DELETE CASCADE,
    practitioner_id TEXT NOT NULL REFERENCES practitioners(id) ON DELETE CASCADE,
    added_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (case_id, practitioner_id)
);

CREATE INDEX IF NOT EXISTS idx_participants_practitioner ON case_participants(practitioner_id);

-- ============================================================================
-- Case Messages (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS case_messages (
    id TEXT PRIMARY KEY,
    case_id TEXT NOT NULL REFERENCES cases(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES practitioners(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,          -- case-wide flag, not per viewer
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_messages_case ON case_messages(case_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_unread ON case_messages(case_id, is_read);

-- One row per (message, user, kind); the toggle relies on this key
CREATE TABLE IF NOT EXISTS message_reactions (
    id TEXT PRIMARY KEY,
    message_id TEXT NOT NULL REFERENCES case_messages(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES practitioners(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('👍', '👎')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (message_id, user_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_reactions_message ON message_reactions(message_id);
"#;
