//! Database schema and migrations for warden.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded. The `schema_version` table records which have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: roles, users, bans
    r#"
CREATE TABLE roles (
    id      INTEGER PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE
);

CREATE TABLE role_permissions (
    role_id     INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    permission  TEXT NOT NULL,
    PRIMARY KEY (role_id, permission)
);

CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash   TEXT NOT NULL,           -- Argon2 PHC string
    name            TEXT NOT NULL,
    role_id         INTEGER NOT NULL REFERENCES roles(id),
    is_active       INTEGER NOT NULL DEFAULT 1,
    email_verified  INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    last_login_at   TEXT
);

CREATE INDEX idx_users_role_id ON users(role_id);

CREATE TABLE bans (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    reason      TEXT NOT NULL,
    ban_type    TEXT NOT NULL,               -- 'temporary' or 'permanent'
    expires_at  TEXT,                        -- NULL = permanent
    created_by  INTEGER REFERENCES users(id),
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_bans_user_id ON bans(user_id);

INSERT INTO roles (id, name) VALUES (1, 'student'), (2, 'instructor'), (3, 'admin');

INSERT INTO role_permissions (role_id, permission) VALUES
    (1, 'courses:read'),
    (1, 'quizzes:attempt'),
    (2, 'courses:read'),
    (2, 'courses:write'),
    (2, 'quizzes:attempt'),
    (2, 'quizzes:write'),
    (3, 'courses:read'),
    (3, 'courses:write'),
    (3, 'quizzes:write'),
    (3, 'users:read'),
    (3, 'users:ban'),
    (3, 'settings:write');
"#,
    // v2: audit trail and platform settings
    r#"
CREATE TABLE security_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    occurred_at TEXT NOT NULL,
    kind        TEXT NOT NULL,
    actor_id    INTEGER,
    ip          TEXT,
    path        TEXT,
    outcome     TEXT NOT NULL,
    detail      TEXT
);

CREATE INDEX idx_security_events_actor ON security_events(actor_id);

CREATE TABLE platform_settings (
    key     TEXT PRIMARY KEY,
    value   TEXT NOT NULL
);

INSERT INTO platform_settings (key, value) VALUES ('maintenance_mode', 'false');
"#,
    // v3: client user agent on security events
    r#"
ALTER TABLE security_events ADD COLUMN user_agent TEXT;
"#,
];
