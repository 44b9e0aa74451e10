//! Schema-validated user records.
//!
//! A [`UserModel`] can only be built from a mapping that passes validation,
//! and construction normalizes what it accepts: integer scores become floats,
//! offsets are moved to UTC and naive times are taken as UTC. User types are
//! accepted by name or by value. Its encoded form is identical to the matching
//! [`crate::record::User`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::record::{Timestamp, Uid, UserType};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupModel {
    #[serde(deserialize_with = "non_empty")]
    name: String,
    uid: Uid,
}

impl GroupModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserModel {
    active: bool,
    #[serde(deserialize_with = "utc_timestamp")]
    ctime: Timestamp,
    #[serde(deserialize_with = "non_empty")]
    display_name: String,
    groups: Vec<GroupModel>,
    #[serde(deserialize_with = "non_empty")]
    name: String,
    #[serde(deserialize_with = "finite")]
    score: f64,
    #[serde(rename = "type")]
    kind: UserType,
    uid: Uid,
}

impl UserModel {
    /// Validates `map`. Unknown fields are ignored.
    pub fn from_mapping(map: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self::deserialize(&Value::Object(map.clone()))?)
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn ctime(&self) -> Timestamp {
        self.ctime
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn groups(&self) -> &[GroupModel] {
        &self.groups
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn kind(&self) -> UserType {
        self.kind
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Err(D::Error::invalid_value(Unexpected::Str(&s), &"a non-empty string"));
    }
    Ok(s)
}

fn finite<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let v = f64::deserialize(deserializer)?;
    if !v.is_finite() {
        return Err(D::Error::invalid_value(Unexpected::Float(v), &"a finite number"));
    }
    Ok(v)
}

/// RFC 3339, or a naive ISO 8601 time taken as UTC.
fn utc_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
    let s = String::deserialize(deserializer)?;
    let utc = match DateTime::parse_from_rfc3339(&s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(D::Error::custom)?
            .and_utc(),
    };
    Ok(Timestamp::Aware(utc.fixed_offset()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Map<String, Value> {
        let v = json!({
            "active": true,
            "ctime": "2018-12-01T02:03:04+10:30",
            "display_name": "Alice",
            "groups": [
                {"name": "alice", "uid": "7202d115-7ff3-4c81-a7c1-2a1f067b1ece"},
                {"name": "wheel", "uid": "0f6b9a4e-3c43-4a57-9d7e-1b2f6ad1c2e9"}
            ],
            "name": "alice",
            "score": 1,
            "type": 3,
            "uid": "5c4a7a3e-9a61-4c1f-8d6c-3e0b1f3b2a10",
            "extra": "ignored"
        });
        match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn rejection(key: &str, value: Value) -> String {
        let mut map = sample();
        map.insert(key.into(), value);
        UserModel::from_mapping(&map).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_mapping_is_normalized() {
        let model = UserModel::from_mapping(&sample()).unwrap();
        assert_eq!(model.kind(), UserType::System);
        assert_eq!(model.score(), 1.0);
        assert_eq!(model.groups().len(), 2);
        assert_eq!(model.groups()[1].name(), "wheel");
        assert_eq!(model.ctime().to_string(), "2018-11-30T15:33:04+00:00");

        let out = serde_json::to_value(&model).unwrap();
        assert_eq!(out["score"], json!(1.0));
        assert_eq!(out["type"], json!("system"));
        assert!(out.get("extra").is_none());
    }

    #[test]
    fn test_type_by_name() {
        let mut map = sample();
        map.insert("type".into(), json!("admin"));
        assert_eq!(UserModel::from_mapping(&map).unwrap().kind(), UserType::Admin);
    }

    #[test]
    fn test_naive_ctime_taken_as_utc() {
        let mut map = sample();
        map.insert("ctime".into(), json!("1970-01-01T00:00:00"));
        let model = UserModel::from_mapping(&map).unwrap();
        assert_eq!(model.ctime().to_string(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_rejections() {
        let mut map = sample();
        map.remove("uid");
        let err = UserModel::from_mapping(&map).unwrap_err().to_string();
        assert!(err.contains("missing field `uid`"), "{err}");

        assert!(rejection("type", json!(7)).contains("user type"));
        assert!(rejection("type", json!("root")).contains("user type"));
        assert!(rejection("name", json!("")).contains("non-empty"));
        assert!(rejection("score", json!("high")).contains("invalid type"));
        assert!(rejection("ctime", json!("yesterday")).contains("input"));
        assert!(rejection("groups", json!(["wheel"])).contains("invalid type"));
        assert!(rejection("groups", json!([{"name": "", "uid": "x"}])).contains("non-empty"));
    }
}
