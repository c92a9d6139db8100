//! Ban model for warden.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Kind of ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanType {
    /// Lifted automatically at `expires_at`.
    Temporary,
    /// Lifted only by an administrator.
    Permanent,
}

impl BanType {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BanType::Temporary => "temporary",
            BanType::Permanent => "permanent",
        }
    }
}

impl fmt::Display for BanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temporary" => Ok(BanType::Temporary),
            "permanent" => Ok(BanType::Permanent),
            _ => Err(format!("unknown ban type: {s}")),
        }
    }
}

/// Ban record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ban {
    /// Ban ID.
    pub id: i64,
    /// Banned user.
    pub user_id: i64,
    /// Reason shown to the banned user.
    pub reason: String,
    /// Ban kind.
    pub ban_type: BanType,
    /// Expiry; `None` means permanent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator who issued the ban.
    pub created_by: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Ban {
    /// Check whether this ban is in force at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Ban {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let ban_type: String = row.try_get("ban_type")?;
        let ban_type = ban_type
            .parse::<BanType>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            reason: row.try_get("reason")?,
            ban_type,
            expires_at: row.try_get("expires_at")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Data for creating a ban.
#[derive(Debug, Clone)]
pub struct NewBan {
    /// User to ban.
    pub user_id: i64,
    /// Reason shown to the user.
    pub reason: String,
    /// Expiry; `None` makes the ban permanent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Issuing administrator.
    pub created_by: Option<i64>,
}

impl NewBan {
    /// Ban type implied by the expiry.
    pub fn ban_type(&self) -> BanType {
        if self.expires_at.is_some() {
            BanType::Temporary
        } else {
            BanType::Permanent
        }
    }
}

/// Pick the ban consulted for an authorization decision.
///
/// Among bans effective at `now`, the most recently created one wins
/// (ties broken by the higher ID). At most one ban is ever returned.
pub fn select_active(bans: &[Ban], now: DateTime<Utc>) -> Option<&Ban> {
    bans.iter()
        .filter(|ban| ban.is_effective(now))
        .max_by_key(|ban| (ban.created_at, ban.id))
}
