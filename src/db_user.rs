use chrono::{DateTime, Utc};
use log::{debug, error};
use rand::RngCore;
use rusqlite::{params, Result as SqlResult, Row};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::acl::Role;
use crate::db::{parse_datetime, parse_opt_datetime, DbPool};
use crate::db_types::is_uid;

/// Well-known UIDs seeded at startup. Looked up by constant instead of held
/// as mutable globals.
pub const ADMIN_UID: &str = "u000000000000001";
pub const ANONYMOUS_UID: &str = "u000000000000002";
pub const GUEST_UID: &str = "u000000000000003";

/// A person that may optionally log in as a user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub user_uid: String,
    pub user_name: String,
    pub full_name: String,
    pub role_admin: bool,
    pub role_guest: bool,
    pub user_disabled: bool,
    pub login_attempts: i64,
    pub login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(User {
            id: row.get(0)?,
            user_uid: row.get(1)?,
            user_name: row.get(2)?,
            full_name: row.get(3)?,
            role_admin: row.get(4)?,
            role_guest: row.get(5)?,
            user_disabled: row.get(6)?,
            login_attempts: row.get(7)?,
            login_at: parse_opt_datetime(row.get::<_, Option<String>>(8)?),
            created_at: parse_datetime(9, &row.get::<_, String>(9)?)?,
            updated_at: parse_datetime(10, &row.get::<_, String>(10)?)?,
        })
    }

    const COLUMNS: &'static str =
        "id, user_uid, user_name, full_name, role_admin, role_guest, \
         user_disabled, login_attempts, login_at, created_at, updated_at";

    fn defaults() -> Vec<User> {
        let now = Utc::now();
        let blank = |id: i64, uid: &str| User {
            id,
            user_uid: uid.to_string(),
            user_name: String::new(),
            full_name: String::new(),
            role_admin: false,
            role_guest: false,
            user_disabled: true,
            login_attempts: 0,
            login_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut admin = blank(1, ADMIN_UID);
        admin.user_name = "admin".to_string();
        admin.full_name = "Admin".to_string();
        admin.role_admin = true;
        admin.user_disabled = false;

        let mut anonymous = blank(-1, ANONYMOUS_UID);
        anonymous.full_name = "Anonymous".to_string();

        let mut guest = blank(-2, GUEST_UID);
        guest.full_name = "Guest".to_string();
        guest.role_guest = true;

        vec![admin, anonymous, guest]
    }

    pub fn create(&self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        conn.execute(
            r#"
            INSERT INTO users (
                id, user_uid, user_name, full_name, role_admin, role_guest,
                user_disabled, login_attempts, login_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                self.id,
                self.user_uid,
                self.user_name,
                self.full_name,
                self.role_admin,
                self.role_guest,
                self.user_disabled,
                self.login_attempts,
                self.login_at.map(|dt| dt.to_rfc3339()),
                self.created_at.to_rfc3339(),
                self.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_uid(
        pool: &DbPool,
        uid: &str,
    ) -> Result<Option<User>, Box<dyn std::error::Error>> {
        Self::find_one(pool, "user_uid = ?", uid)
    }

    pub fn find_by_name(
        pool: &DbPool,
        user_name: &str,
    ) -> Result<Option<User>, Box<dyn std::error::Error>> {
        if user_name.is_empty() {
            return Ok(None);
        }
        Self::find_one(pool, "user_name = ?", user_name)
    }

    fn find_one(
        pool: &DbPool,
        predicate: &str,
        param: &str,
    ) -> Result<Option<User>, Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        let sql = format!(
            "SELECT {} FROM users WHERE {} LIMIT 1",
            Self::COLUMNS,
            predicate
        );
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row([param], User::from_row) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// A registered user has a user name and a valid UID.
    pub fn registered(&self) -> bool {
        !self.user_name.is_empty() && is_uid(&self.user_uid, 'u')
    }

    /// Role used for access-control checks.
    pub fn role(&self) -> Role {
        if self.role_admin {
            Role::Admin
        } else if self.role_guest {
            Role::Guest
        } else {
            Role::Default
        }
    }

    /// Sets a new password stored as a salted digest.
    pub fn set_password(&self, pool: &DbPool, password: &str) -> Result<(), Box<dyn std::error::Error>> {
        if !self.registered() {
            return Err("only registered users can change their password".into());
        }

        if password.len() < 4 {
            return Err(format!(
                "new password for {} must be at least 4 characters",
                self.user_name
            )
            .into());
        }

        Password::new(&self.user_uid, password).save(pool)
    }

    /// Checks the given password against the stored digest, applying the
    /// escalating login throttle first. The failed-attempt counter persists
    /// across calls; a successful check resets it.
    pub fn verify_password(
        &mut self,
        pool: &DbPool,
        delay: &dyn DelayStrategy,
        password: &str,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        if !self.registered() {
            debug!("user: only registered users can log in");
            return Ok(false);
        }

        if password.is_empty() {
            return Ok(false);
        }

        delay.apply(self.login_attempts);

        let stored = match Password::find(pool, &self.user_uid)? {
            Some(pw) => pw,
            None => return Ok(false),
        };

        if !stored.matches(password) {
            self.login_attempts += 1;
            let conn = pool.get()?;
            if let Err(e) = conn.execute(
                "UPDATE users SET login_attempts = login_attempts + 1 WHERE user_uid = ?",
                [&self.user_uid],
            ) {
                error!("user: {} (update login attempts)", e);
            }
            return Ok(false);
        }

        self.login_attempts = 0;
        self.login_at = Some(Utc::now());
        let conn = pool.get()?;
        if let Err(e) = conn.execute(
            "UPDATE users SET login_attempts = 0, login_at = ? WHERE user_uid = ?",
            params![self.login_at.map(|dt| dt.to_rfc3339()), self.user_uid],
        ) {
            error!("user: {} (update last login)", e);
        }

        Ok(true)
    }
}

/// Seeds the fixed admin / anonymous / guest rows if they are not present.
pub fn bootstrap_default_users(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    for user in User::defaults() {
        if User::find_by_uid(pool, &user.user_uid)?.is_none() {
            user.create(pool)?;
        }
    }
    Ok(())
}

/// Salted password digest for one user.
pub struct Password {
    pub user_uid: String,
    pub password_hash: String,
    pub password_salt: String,
}

impl Password {
    pub fn new(user_uid: &str, plaintext: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt_hex = hex_encode(&salt);
        Password {
            user_uid: user_uid.to_string(),
            password_hash: digest(&salt_hex, plaintext),
            password_salt: salt_hex,
        }
    }

    pub fn save(&self, pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO passwords (user_uid, password_hash, password_salt) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_uid) DO UPDATE SET password_hash = ?2, password_salt = ?3",
            params![self.user_uid, self.password_hash, self.password_salt],
        )?;
        Ok(())
    }

    pub fn find(
        pool: &DbPool,
        user_uid: &str,
    ) -> Result<Option<Password>, Box<dyn std::error::Error>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT user_uid, password_hash, password_salt FROM passwords WHERE user_uid = ?",
        )?;

        match stmt.query_row([user_uid], |row| {
            Ok(Password {
                user_uid: row.get(0)?,
                password_hash: row.get(1)?,
                password_salt: row.get(2)?,
            })
        }) {
            Ok(pw) => Ok(Some(pw)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    pub fn matches(&self, plaintext: &str) -> bool {
        digest(&self.password_salt, plaintext) == self.password_hash
    }
}

fn digest(salt: &str, plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plaintext.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Escalating delay applied before every credential check. A trait so tests
/// can observe the requested attempt count without sleeping.
pub trait DelayStrategy {
    fn apply(&self, attempts: i64);
}

/// Production strategy: 5 seconds per recorded failed attempt, capped at 60
/// seconds so a hammered account cannot pin a worker indefinitely.
pub struct ThrottleDelay;

impl ThrottleDelay {
    pub const STEP: Duration = Duration::from_secs(5);
    pub const MAX: Duration = Duration::from_secs(60);

    pub fn duration_for(attempts: i64) -> Duration {
        if attempts <= 0 {
            return Duration::ZERO;
        }
        Self::STEP
            .saturating_mul(attempts.min(u32::MAX as i64) as u32)
            .min(Self::MAX)
    }
}

impl DelayStrategy for ThrottleDelay {
    fn apply(&self, attempts: i64) {
        let duration = Self::duration_for(attempts);
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// No-op strategy for tests and trusted internal callers.
pub struct NoDelay;

impl DelayStrategy for NoDelay {
    fn apply(&self, _attempts: i64) {}
}
