//! The canonical world snapshot threaded through a chat.
//!
//! A [`State`] has three parts:
//! - `static` — named variables, addressed by dotted paths
//! - `volatile` — scheduled writes waiting for a round or a timestamp
//! - `responseSummary` — an append-only log of free-text summaries
//!
//! States are plain owned values. Every copy into the variable store or into
//! message text goes through serialization, so no two holders share data.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::value::parse_number;

/// The world state embedded in messages and mirrored in the variable store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// The `static` variable tree.
    #[serde(rename = "static", default)]
    pub vars: Map<String, Value>,

    /// Pending scheduled writes, in insertion order.
    ///
    /// Entries that do not decode are dropped one by one, so a bad entry
    /// never costs the rest of the snapshot.
    #[serde(default, deserialize_with = "deserialize_volatile")]
    pub volatile: Vec<VolatileEntry>,

    /// Append-only summaries.
    #[serde(rename = "responseSummary", default)]
    pub response_summary: Vec<String>,
}

impl State {
    /// The state used when no snapshot exists anywhere in a chat.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Decode a state from a JSON value (variable store contents, block body).
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Encode as a JSON value for the variable store.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn deserialize_volatile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<VolatileEntry>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!(volatile = %other, "Volatile list is not an array, ignoring it");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<VolatileEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(index, error = %e, "Dropping undecodable volatile entry");
                None
            }
        })
        .collect())
}

/// The narrative clock at the moment a batch is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Current round (index of the newest message).
    pub round: i64,
    /// Current wall-clock time.
    pub now: DateTime<Utc>,
}

impl Tick {
    pub fn new(round: i64, now: DateTime<Utc>) -> Self {
        Self { round, now }
    }
}

/// When a volatile entry becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTarget {
    /// Due once the round counter reaches this value.
    Round(i64),
    /// Due once wall-clock time reaches this instant.
    GameTime(DateTime<Utc>),
}

impl ScheduleTarget {
    pub fn is_game_time(&self) -> bool {
        matches!(self, ScheduleTarget::GameTime(_))
    }

    pub fn is_due(&self, tick: &Tick) -> bool {
        match self {
            ScheduleTarget::Round(round) => tick.round >= *round,
            ScheduleTarget::GameTime(at) => tick.now >= *at,
        }
    }

    /// Parse an absolute game time.
    ///
    /// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM[:SS]` (read as UTC) and a bare
    /// `YYYY-MM-DD` (midnight UTC).
    pub fn parse_game_time(text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Some(at.with_timezone(&Utc));
        }
        const NAIVE_FORMATS: [&str; 4] = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
        ];
        for format in NAIVE_FORMATS {
            if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
                return Some(at.and_utc());
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|at| at.and_utc())
    }

    fn to_wire(self) -> Value {
        match self {
            ScheduleTarget::Round(round) => Value::from(round),
            ScheduleTarget::GameTime(at) => {
                Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }

    fn from_wire(is_game_time: bool, raw: &Value) -> Result<Self, String> {
        if is_game_time {
            let text = raw
                .as_str()
                .ok_or_else(|| format!("game-time target must be a timestamp string, got {raw}"))?;
            return Self::parse_game_time(text)
                .map(ScheduleTarget::GameTime)
                .ok_or_else(|| format!("invalid game-time target '{text}'"));
        }

        let round = match raw {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.ceil() as i64)),
            Value::String(s) => parse_number(s).map(|f| f.ceil() as i64),
            _ => None,
        };
        round
            .map(ScheduleTarget::Round)
            .ok_or_else(|| format!("round target must be a number, got {raw}"))
    }
}

/// A write scheduled for a later round or time.
///
/// Serialized as `[varName, value, isGameTime, targetTime, reason]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatileEntry {
    pub var_name: String,
    pub value: Value,
    pub target: ScheduleTarget,
    pub reason: String,
}

impl VolatileEntry {
    pub fn is_game_time(&self) -> bool {
        self.target.is_game_time()
    }

    pub fn is_due(&self, tick: &Tick) -> bool {
        self.target.is_due(tick)
    }

    /// Whether a cancel identifier names this entry.
    pub fn matches(&self, identifier: &str) -> bool {
        self.var_name == identifier || self.reason == identifier
    }
}

impl Serialize for VolatileEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            &self.var_name,
            &self.value,
            self.is_game_time(),
            self.target.to_wire(),
            &self.reason,
        )
            .serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryWire {
    Tuple(Vec<Value>),
    Named {
        #[serde(rename = "varName")]
        var_name: String,
        #[serde(default)]
        value: Value,
        #[serde(rename = "isGameTime", default)]
        is_game_time: bool,
        #[serde(rename = "targetTime")]
        target_time: Value,
        #[serde(default)]
        reason: String,
    },
}

impl<'de> Deserialize<'de> for VolatileEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match EntryWire::deserialize(deserializer)? {
            EntryWire::Named {
                var_name,
                value,
                is_game_time,
                target_time,
                reason,
            } => Ok(Self {
                var_name,
                value,
                target: ScheduleTarget::from_wire(is_game_time, &target_time).map_err(D::Error::custom)?,
                reason,
            }),
            EntryWire::Tuple(items) => {
                if !(4..=5).contains(&items.len()) {
                    return Err(D::Error::custom(format!(
                        "volatile entry must have 4 or 5 fields, got {}",
                        items.len()
                    )));
                }
                let var_name = match &items[0] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let is_game_time = items[2]
                    .as_bool()
                    .ok_or_else(|| D::Error::custom("volatile entry isGameTime must be a boolean"))?;
                let target = ScheduleTarget::from_wire(is_game_time, &items[3]).map_err(D::Error::custom)?;
                let reason = match items.get(4) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                Ok(Self {
                    var_name,
                    value: items[1].clone(),
                    target,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn initial_state_serializes_with_wire_names() {
        let json = serde_json::to_value(State::initial()).unwrap();
        assert_eq!(json, json!({"static": {}, "volatile": [], "responseSummary": []}));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let state: State = serde_json::from_value(json!({"static": {"hp": 3}})).unwrap();
        assert_eq!(state.vars.get("hp"), Some(&json!(3)));
        assert!(state.volatile.is_empty());
        assert!(state.response_summary.is_empty());
    }

    #[test]
    fn volatile_entry_uses_array_form() {
        let entry = VolatileEntry {
            var_name: "door".into(),
            value: json!("open"),
            target: ScheduleTarget::Round(12),
            reason: "timer".into(),
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!(["door", "open", false, 12, "timer"])
        );
    }

    #[test]
    fn game_time_entry_roundtrips() {
        let entry = VolatileEntry {
            var_name: "weather".into(),
            value: json!("rain"),
            target: ScheduleTarget::GameTime(at(2024, 5, 1, 9)),
            reason: "forecast".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json[3], json!("2024-05-01T09:00:00Z"));
        let back: VolatileEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn legacy_and_object_entries_decode() {
        let legacy: VolatileEntry = serde_json::from_value(json!(["x", 1, false, 4])).unwrap();
        assert_eq!(legacy.reason, "");
        assert_eq!(legacy.target, ScheduleTarget::Round(4));

        let named: VolatileEntry = serde_json::from_value(json!({
            "varName": "x",
            "value": 2,
            "isGameTime": true,
            "targetTime": "2024-01-01T00:00:00.000Z",
            "reason": "dawn"
        }))
        .unwrap();
        assert_eq!(named.target, ScheduleTarget::GameTime(at(2024, 1, 1, 0)));
        assert_eq!(named.reason, "dawn");
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(serde_json::from_value::<VolatileEntry>(json!(["x", 1])).is_err());
        assert!(serde_json::from_value::<VolatileEntry>(json!(["x", 1, "no", 3, "r"])).is_err());
        assert!(serde_json::from_value::<VolatileEntry>(json!(["x", 1, true, "soon", "r"])).is_err());
    }

    #[test]
    fn bad_volatile_entries_are_dropped_individually() {
        let state: State = serde_json::from_value(json!({
            "static": {"hp": 42},
            "volatile": [
                ["door", 1, false, null, "lever"],
                ["gate", "open", false, 7, "key"],
                ["x"]
            ],
            "responseSummary": ["a"]
        }))
        .unwrap();
        assert_eq!(state.vars["hp"], json!(42));
        assert_eq!(state.response_summary, ["a"]);
        assert_eq!(state.volatile.len(), 1);
        assert_eq!(state.volatile[0].var_name, "gate");
        assert_eq!(state.volatile[0].target, ScheduleTarget::Round(7));

        let state: State = serde_json::from_value(json!({"static": {}, "volatile": "soon"})).unwrap();
        assert!(state.volatile.is_empty());
        let state: State = serde_json::from_value(json!({"volatile": null})).unwrap();
        assert!(state.volatile.is_empty());
    }

    #[test]
    fn due_checks_follow_the_target_kind() {
        let tick = Tick::new(5, at(2024, 1, 2, 0));
        assert!(ScheduleTarget::Round(5).is_due(&tick));
        assert!(!ScheduleTarget::Round(6).is_due(&tick));
        assert!(ScheduleTarget::GameTime(at(2024, 1, 1, 0)).is_due(&tick));
        assert!(!ScheduleTarget::GameTime(at(2024, 1, 3, 0)).is_due(&tick));
    }

    #[test]
    fn parses_supported_game_time_forms() {
        let expected = at(2024, 3, 1, 18);
        assert_eq!(ScheduleTarget::parse_game_time("2024-03-01T18:00:00Z"), Some(expected));
        assert_eq!(ScheduleTarget::parse_game_time("2024-03-01T19:00:00+01:00"), Some(expected));
        assert_eq!(ScheduleTarget::parse_game_time("2024-03-01 18:00"), Some(expected));
        assert_eq!(ScheduleTarget::parse_game_time("2024-03-01"), Some(at(2024, 3, 1, 0)));
        assert_eq!(ScheduleTarget::parse_game_time("tomorrow"), None);
    }
}
