//! Result identifiers.
//!
//! # ULID ベースの ID
//! `ResultId` は ULID をラップした不透明な ID です。
//! - **時刻でソート可能**: timestamp が先頭にあるため、enqueue 順に並ぶ
//! - **分散生成可能**: backend ごとに調整なしで生成できる
//!
//! 文字列表現は `result-<ULID>` で、`FromStr` で元に戻せます。
//! JSON でもこの文字列表現を使います。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

const PREFIX: &str = "result-";

/// Identifier of a TaskResult.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResultId {
    ulid: Ulid,
}

impl ResultId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self { ulid }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl From<Ulid> for ResultId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.ulid)
    }
}

/// ResultId の文字列表現が壊れている
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed result id: {0:?}")]
pub struct ParseResultIdError(pub String);

impl FromStr for ResultId {
    type Err = ParseResultIdError;

    /// `result-` プレフィックスは省略可能
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseResultIdError(s.to_string()))
    }
}

impl TryFrom<String> for ResultId {
    type Error = ParseResultIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResultId> for String {
    fn from(id: ResultId) -> Self {
        id.to_string()
    }
}
