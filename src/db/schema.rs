use rusqlite::Connection;

/// Initialize the main database schema (everything except audit logs)
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (local mirror of identity-provider subjects)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Admin console principals (key_hash = SHA-256 of the API key)
        CREATE TABLE IF NOT EXISTS admins (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('owner', 'admin', 'view')),
            key_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            revoked_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_admins_key_hash ON admins(key_hash);

        -- VIP codes. Never deleted (audit trail); status is the lifecycle.
        -- Invariant: redemption_count never exceeds max_redemptions when set.
        CREATE TABLE IF NOT EXISTS vip_codes (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            code_type TEXT NOT NULL CHECK (code_type IN ('preview', 'bonus', 'launch', 'partner', 'media', 'influencer')),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'redeemed', 'expired', 'revoked')),
            max_redemptions INTEGER,
            redemption_count INTEGER NOT NULL DEFAULT 0,
            valid_from INTEGER NOT NULL,
            valid_until INTEGER,
            description TEXT,
            batch_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            CHECK (max_redemptions IS NULL OR redemption_count <= max_redemptions)
        );
        CREATE INDEX IF NOT EXISTS idx_vip_codes_code ON vip_codes(code);
        CREATE INDEX IF NOT EXISTS idx_vip_codes_batch ON vip_codes(batch_id);
        CREATE INDEX IF NOT EXISTS idx_vip_codes_expiry ON vip_codes(status, valid_until) WHERE valid_until IS NOT NULL;

        -- Entitlements. Created by redemption or claim approval; status and
        -- expiry are the only mutable fields; never deleted.
        CREATE TABLE IF NOT EXISTS entitlements (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            entitlement_type TEXT NOT NULL CHECK (entitlement_type IN ('preview', 'bonus', 'launch', 'partner', 'media', 'influencer', 'preorder_bonus')),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'expired', 'revoked')),
            code_id TEXT REFERENCES vip_codes(id),
            expires_at INTEGER,
            fulfilled_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_entitlements_user ON entitlements(user_id, status);
        CREATE INDEX IF NOT EXISTS idx_entitlements_code ON entitlements(code_id);

        -- Uploaded proof-of-purchase receipts (opaque storage_ref; bytes
        -- live in external storage)
        CREATE TABLE IF NOT EXISTS receipts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            storage_ref TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'verified', 'rejected')),
            uploaded_at INTEGER NOT NULL,
            reviewed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_receipts_user ON receipts(user_id, status);

        -- Pre-order bonus claims (forward-only state machine)
        CREATE TABLE IF NOT EXISTS bonus_claims (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            delivery_email TEXT NOT NULL,
            receipt_id TEXT NOT NULL UNIQUE REFERENCES receipts(id),
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'approved', 'rejected', 'delivered')),
            submitted_at INTEGER NOT NULL,
            reviewed_at INTEGER,
            delivered_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_bonus_claims_user ON bonus_claims(user_id);
        CREATE INDEX IF NOT EXISTS idx_bonus_claims_status ON bonus_claims(status, submitted_at);
        -- Invariant: at most one open (non-rejected) claim per user
        CREATE UNIQUE INDEX IF NOT EXISTS idx_bonus_claims_open_user ON bonus_claims(user_id) WHERE status != 'rejected';
        "#,
    )?;
    Ok(())
}

/// Initialize the audit log database schema (separate DB file)
/// Optimized for append-only workload with WAL mode
pub fn init_audit_db(conn: &Connection) -> rusqlite::Result<()> {
    // WAL mode: writes are sequential appends, much faster for append-only workloads
    // synchronous=NORMAL: safe with WAL, faster than FULL
    // journal_size_limit: prevent WAL from growing indefinitely
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 1000;
        PRAGMA journal_size_limit = 67108864;

        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            actor_type TEXT NOT NULL CHECK (actor_type IN ('admin', 'public', 'system')),
            actor_id TEXT,
            action TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            details TEXT,
            ip_address TEXT,
            user_agent TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_resource ON audit_logs(resource_type, resource_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_actor ON audit_logs(actor_type, actor_id);
        "#,
    )?;
    Ok(())
}
