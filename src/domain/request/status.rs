//! Status vocabulary: the nine canonical lifecycle states and the legacy normalizer.
//!
//! Older rows store free text such as `"Under Consideration"` or `"approved"` where newer
//! rows store a numeric code. Everything that reads a stored status goes through
//! [`normalize`] (or a configured [`StatusNormalizer`]) first, and nothing writes one back
//! except as a canonical code.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de;
use serde::{Deserialize, Serialize};

/// Canonical lifecycle state of a request.
///
/// The discriminants are the numeric codes persisted by the platform. They are *not* a
/// precedence order: `DepartmentRejected` (2) sits between `DepartmentPending` (1) and
/// `DepartmentApproved` (3). Legality of a move is decided only by
/// [`allowed_next_states`](super::transitions::allowed_next_states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Processing = 0,
    DepartmentPending = 1,
    DepartmentRejected = 2,
    DepartmentApproved = 3,
    ClubRejected = 4,
    ClubApproved = 5,
    Collected = 6,
    Overdue = 7,
    Returned = 8,
}

impl RequestStatus {
    /// Every state, in code order.
    pub const ALL: [RequestStatus; 9] = [
        RequestStatus::Processing,
        RequestStatus::DepartmentPending,
        RequestStatus::DepartmentRejected,
        RequestStatus::DepartmentApproved,
        RequestStatus::ClubRejected,
        RequestStatus::ClubApproved,
        RequestStatus::Collected,
        RequestStatus::Overdue,
        RequestStatus::Returned,
    ];

    /// Numeric code as persisted.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a state by its numeric code.
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Processing => "processing",
            RequestStatus::DepartmentPending => "department_pending",
            RequestStatus::DepartmentRejected => "department_rejected",
            RequestStatus::DepartmentApproved => "department_approved",
            RequestStatus::ClubRejected => "club_rejected",
            RequestStatus::ClubApproved => "club_approved",
            RequestStatus::Collected => "collected",
            RequestStatus::Overdue => "overdue",
            RequestStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status exactly as a store holds it, before normalization.
///
/// Deserializes from any JSON number, string or `null`. Integral numbers that fit an `i64`
/// become [`RawStatus::Code`]; other numbers (`7.5`, `1e30`, `u64::MAX`) are kept as their
/// decimal text, which no alias matches, so they normalize to `Processing`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RawStatus {
    Code(i64),
    Text(String),
    Missing,
}

impl<'de> Deserialize<'de> for RawStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct RawStatusVisitor;

        impl<'de> de::Visitor<'de> for RawStatusVisitor {
            type Value = RawStatus;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a status code, status text or null")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(RawStatus::Code(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(i64::try_from(v)
                    .map(RawStatus::Code)
                    .unwrap_or_else(|_| RawStatus::Text(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
                if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                    Ok(RawStatus::Code(v as i64))
                } else {
                    Ok(RawStatus::Text(v.to_string()))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(RawStatus::Text(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(RawStatus::Text(v))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RawStatus::Missing)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RawStatus::Missing)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                deserializer.deserialize_any(self)
            }
        }

        deserializer.deserialize_any(RawStatusVisitor)
    }
}

impl RawStatus {
    /// Rebuild a raw status from a nullable text column.
    ///
    /// Text that is the exact decimal rendering of an integer becomes [`RawStatus::Code`], so
    /// that [`RawStatus::to_stored_text`] gives back the column value byte for byte.
    pub fn from_stored_text(text: Option<String>) -> Self {
        match text {
            None => RawStatus::Missing,
            Some(text) => match text.parse::<i64>() {
                Ok(code) if code.to_string() == text => RawStatus::Code(code),
                _ => RawStatus::Text(text),
            },
        }
    }

    /// The nullable text column value this raw status was read from.
    pub fn to_stored_text(&self) -> Option<String> {
        match self {
            RawStatus::Code(code) => Some(code.to_string()),
            RawStatus::Text(text) => Some(text.clone()),
            RawStatus::Missing => None,
        }
    }
}

impl From<RequestStatus> for RawStatus {
    fn from(status: RequestStatus) -> Self {
        RawStatus::Code(i64::from(status.code()))
    }
}

impl From<i64> for RawStatus {
    fn from(code: i64) -> Self {
        RawStatus::Code(code)
    }
}

impl From<&str> for RawStatus {
    fn from(text: &str) -> Self {
        RawStatus::Text(text.to_string())
    }
}

impl From<String> for RawStatus {
    fn from(text: String) -> Self {
        RawStatus::Text(text)
    }
}

impl<T: Into<RawStatus>> From<Option<T>> for RawStatus {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawStatus::Missing)
    }
}

/// Normalize any stored status to a canonical one using the built-in alias table.
///
/// Never fails: input that matches nothing is treated as still in progress.
pub fn normalize(raw: impl Into<RawStatus>) -> RequestStatus {
    resolve_builtin(&raw.into()).unwrap_or(RequestStatus::Processing)
}

/// Fold a free-text status into its lookup key: lowercase, `_`/`-` read as spaces, runs of
/// whitespace collapsed.
fn fold_key(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn builtin_alias(key: &str) -> Option<RequestStatus> {
    let status = match key {
        "pending" | "processing" => RequestStatus::Processing,
        "department approval pending"
        | "underconsideration"
        | "under consideration"
        | "department pending" => RequestStatus::DepartmentPending,
        "dept rejected" | "department rejected" => RequestStatus::DepartmentRejected,
        "dept approved" | "department approved" => RequestStatus::DepartmentApproved,
        "rejected" | "club rejected" => RequestStatus::ClubRejected,
        "approved" | "club approved" => RequestStatus::ClubApproved,
        "collected" => RequestStatus::Collected,
        "overdue" => RequestStatus::Overdue,
        "returned" => RequestStatus::Returned,
        _ => return key.parse::<i64>().ok().and_then(RequestStatus::from_code),
    };
    Some(status)
}

fn resolve_builtin(raw: &RawStatus) -> Option<RequestStatus> {
    match raw {
        RawStatus::Code(code) => RequestStatus::from_code(*code),
        RawStatus::Text(text) => builtin_alias(&fold_key(text)),
        RawStatus::Missing => None,
    }
}

/// Normalizer carrying deployment-specific legacy aliases on top of the built-in table.
///
/// Built-in aliases always win; an extra alias that collides with one is ignored. Extra
/// aliases that fold to the same key but name different statuses are ambiguous and are all
/// ignored, so the outcome never depends on the order the aliases were supplied in.
#[derive(Debug, Clone, Default)]
pub struct StatusNormalizer {
    extra: HashMap<String, RequestStatus>,
}

/// Group aliases by folded key, collecting the distinct statuses each key is mapped to.
fn fold_aliases<I, K>(aliases: I) -> BTreeMap<String, Vec<RequestStatus>>
where
    I: IntoIterator<Item = (K, RequestStatus)>,
    K: AsRef<str>,
{
    let mut folded: BTreeMap<String, Vec<RequestStatus>> = BTreeMap::new();
    for (alias, status) in aliases {
        let key = fold_key(alias.as_ref());
        if key.is_empty() {
            continue;
        }
        let targets = folded.entry(key).or_default();
        if !targets.contains(&status) {
            targets.push(status);
        }
    }
    folded
}

impl StatusNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a normalizer with extra aliases, folded the same way stored text is.
    pub fn with_aliases<I, K>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, RequestStatus)>,
        K: AsRef<str>,
    {
        let mut extra = HashMap::new();
        for (key, targets) in fold_aliases(aliases) {
            if let Some(builtin) = builtin_alias(&key) {
                tracing::warn!(
                    alias = %key,
                    configured = ?targets,
                    builtin = %builtin,
                    "Ignoring extra status alias that shadows a built-in alias"
                );
                continue;
            }
            match targets.as_slice() {
                [status] => {
                    extra.insert(key, *status);
                }
                _ => tracing::warn!(
                    alias = %key,
                    configured = ?targets,
                    "Ignoring extra status alias mapped to more than one status"
                ),
            }
        }
        Self { extra }
    }

    /// Folded alias keys that are mapped to more than one status, sorted.
    ///
    /// Keys shadowed by a built-in alias are not reported; they are ignored either way.
    pub fn conflicting_aliases<I, K>(aliases: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, RequestStatus)>,
        K: AsRef<str>,
    {
        fold_aliases(aliases)
            .into_iter()
            .filter(|(key, targets)| targets.len() > 1 && builtin_alias(key).is_none())
            .map(|(key, _)| key)
            .collect()
    }

    /// Canonical status for `raw`, or `None` when nothing recognizes it.
    pub fn resolve(&self, raw: &RawStatus) -> Option<RequestStatus> {
        resolve_builtin(raw).or_else(|| match raw {
            RawStatus::Text(text) => self.extra.get(&fold_key(text)).copied(),
            _ => None,
        })
    }

    /// Canonical status for `raw`, defaulting unrecognized input to `Processing`.
    pub fn normalize(&self, raw: &RawStatus) -> RequestStatus {
        self.resolve(raw).unwrap_or(RequestStatus::Processing)
    }
}
