//! Lock record and request types.

use crate::error::{LockError, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Kind of lock held on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// No lock; only ever seen on an empty record.
    #[default]
    None,
    /// At most one locker.
    Exclusive,
    /// Any number of lockers sharing one tag.
    Shared,
    /// Exclusive, and the record is deleted as soon as it has no locker.
    ExclusiveEphemeral,
}

impl LockKind {
    /// Whether a request may ask for this kind.
    pub fn is_valid(self) -> bool {
        !matches!(self, LockKind::None)
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, LockKind::Exclusive | LockKind::ExclusiveEphemeral)
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, LockKind::ExclusiveEphemeral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LockKind::None => "none",
            LockKind::Exclusive => "exclusive",
            LockKind::Shared => "shared",
            LockKind::ExclusiveEphemeral => "exclusive_ephemeral",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockKind {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(LockKind::None),
            "exclusive" => Ok(LockKind::Exclusive),
            "shared" => Ok(LockKind::Shared),
            "exclusive_ephemeral" | "ephemeral" => Ok(LockKind::ExclusiveEphemeral),
            other => Err(LockError::Invalid(format!("unknown lock type '{}'", other))),
        }
    }
}

/// Identity of one lock handle: who holds it, and which of their handles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockerId {
    /// Stable principal name of the holder (e.g. `client.4123`).
    pub locker: String,

    /// Caller-chosen token; one identity may hold several cookies.
    pub cookie: String,
}

impl LockerId {
    pub fn new(locker: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            locker: locker.into(),
            cookie: cookie.into(),
        }
    }
}

impl fmt::Display for LockerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (cookie '{}')", self.locker, self.cookie)
    }
}

/// What is recorded about a locker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerInfo {
    /// When the lock lapses; `None` never expires.
    pub expiration: Option<DateTime<Utc>>,

    /// Where the holder can be reached, in legacy form.
    pub addr: String,

    /// Free text supplied by the holder.
    pub description: String,
}

impl LockerInfo {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiration, Some(expiration) if expiration < now)
    }
}

/// Persisted state of one named lock on one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub lock_type: LockKind,

    /// Every concurrent locker shares this tag.
    pub tag: String,

    #[serde(with = "locker_list")]
    pub lockers: BTreeMap<LockerId, LockerInfo>,
}

impl LockRecord {
    pub fn is_empty(&self) -> bool {
        self.lockers.is_empty()
    }

    /// Drop every locker whose expiration has passed. Returns how many went.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.lockers.len();
        self.lockers.retain(|_, info| !info.is_expired(now));
        before - self.lockers.len()
    }
}

/// Lockers are keyed by a composite id, so they travel as a list.
mod locker_list {
    use super::{LockerId, LockerInfo};
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct EntryRef<'a> {
        locker: &'a str,
        cookie: &'a str,
        expiration: Option<DateTime<Utc>>,
        addr: &'a str,
        description: &'a str,
    }

    #[derive(Deserialize)]
    struct Entry {
        locker: String,
        cookie: String,
        #[serde(default)]
        expiration: Option<DateTime<Utc>>,
        #[serde(default)]
        addr: String,
        #[serde(default)]
        description: String,
    }

    pub fn serialize<S: Serializer>(
        lockers: &BTreeMap<LockerId, LockerInfo>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(lockers.iter().map(|(id, info)| EntryRef {
            locker: &id.locker,
            cookie: &id.cookie,
            expiration: info.expiration,
            addr: &info.addr,
            description: &info.description,
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<LockerId, LockerInfo>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        let mut lockers = BTreeMap::new();
        for entry in entries {
            let id = LockerId::new(entry.locker, entry.cookie);
            let info = LockerInfo {
                expiration: entry.expiration,
                addr: entry.addr,
                description: entry.description,
            };
            if lockers.contains_key(&id) {
                return Err(D::Error::custom(format!("duplicate locker {}", id)));
            }
            lockers.insert(id, info);
        }
        Ok(lockers)
    }
}

/// Renewal behaviour of a lock request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockFlags {
    /// Succeed by renewing if this locker already holds the lock.
    pub may_renew: bool,

    /// Fail unless this locker already holds the lock.
    pub must_renew: bool,
}

impl LockFlags {
    pub fn may_renew() -> Self {
        Self {
            may_renew: true,
            must_renew: false,
        }
    }

    pub fn must_renew() -> Self {
        Self {
            may_renew: false,
            must_renew: true,
        }
    }
}

/// A priority offer attached to an exclusive lock request. Lowest wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidRequest {
    pub amount: i32,

    /// How long the offer stands.
    pub duration: Duration,
}

/// Who is making the current request, as resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Principal name, e.g. `client.4123`.
    pub name: String,

    /// Network locator, e.g. `v2:10.0.0.1:6800/2231`.
    pub addr: String,
}

static MSGR_TYPE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:v1|v2|any):").expect("Invalid messenger prefix regex"));

impl Origin {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
        }
    }

    /// The address with any messenger-type prefix removed, so one client is
    /// recorded the same way whichever protocol revision it spoke.
    pub fn legacy_addr(&self) -> String {
        MSGR_TYPE_PREFIX.replace(&self.addr, "").into_owned()
    }
}

/// A request to take or renew a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub name: String,
    pub kind: LockKind,

    /// Zero never expires.
    pub duration: Duration,

    pub description: String,
    pub flags: LockFlags,
    pub cookie: String,
    pub tag: String,
    pub bid: Option<BidRequest>,
}

impl LockRequest {
    pub fn new(name: impl Into<String>, kind: LockKind) -> Self {
        Self {
            name: name.into(),
            kind,
            duration: Duration::zero(),
            description: String::new(),
            flags: LockFlags::default(),
            cookie: String::new(),
            tag: String::new(),
            bid: None,
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = cookie.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_flags(mut self, flags: LockFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_bid(mut self, amount: i32, duration: Duration) -> Self {
        self.bid = Some(BidRequest { amount, duration });
        self
    }
}

/// A lock the caller claims to hold; used by assert and cookie rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldLock {
    pub name: String,
    pub kind: LockKind,
    pub tag: String,
    pub cookie: String,
}

impl HeldLock {
    pub fn new(
        name: impl Into<String>,
        kind: LockKind,
        tag: impl Into<String>,
        cookie: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            tag: tag.into(),
            cookie: cookie.into(),
        }
    }
}
