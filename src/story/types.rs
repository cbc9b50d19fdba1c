use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const NPC_SCHEMA_VERSION: u8 = 1;
pub const INVENTORY_SCHEMA_VERSION: u8 = 1;
pub const EVENT_LOG_SCHEMA_VERSION: u8 = 1;

/// Conventional payload key carrying a signed money delta for the player.
pub const MONEY_CHANGE_KEY: &str = "moneyChange";
/// Conventional payload key listing the character ids involved in an entry.
pub const CHARACTER_IDS_KEY: &str = "characterIds";

/// Log entry type stamped on player entries created through event ingestion.
pub const INGESTED_EVENT_TYPE: &str = "event";

/// Default emotional weight of an NPC memory.
pub const DEFAULT_MEMORY_INTENSITY: u8 = 50;

fn default_player_schema() -> u8 {
    PLAYER_SCHEMA_VERSION
}

fn default_npc_schema() -> u8 {
    NPC_SCHEMA_VERSION
}

fn default_inventory_schema() -> u8 {
    INVENTORY_SCHEMA_VERSION
}

fn default_event_schema() -> u8 {
    EVENT_LOG_SCHEMA_VERSION
}

fn default_intensity() -> u8 {
    DEFAULT_MEMORY_INTENSITY
}

// ============================================================================
// Schema-less payloads
// ============================================================================

/// A single primitive carried inside an [`EventData`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<DataValue>),
}

impl DataValue {
    /// Convert a JSON value. Nested objects are kept as their JSON text so the
    /// payload stays a flat map of primitives.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DataValue::Int(i),
                None => DataValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => DataValue::Text(s),
            Value::Array(items) => {
                DataValue::List(items.into_iter().map(DataValue::from_json).collect())
            }
            obj @ Value::Object(_) => DataValue::Text(obj.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            DataValue::Null => Value::Null,
            DataValue::Bool(b) => Value::Bool(*b),
            DataValue::Int(i) => Value::from(*i),
            DataValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DataValue::Text(s) => Value::String(s.clone()),
            DataValue::List(items) => Value::Array(items.iter().map(DataValue::to_json).collect()),
        }
    }

    /// Integer view of a numeric value. Floats are rounded half away from
    /// zero (`2.5` reads as `3`), saturating at the `i64` bounds.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataValue::Int(i) => Some(*i),
            DataValue::Float(f) if f.is_finite() => Some(f.round() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Open-ended payload attached to log entries, memories and NPC state.
///
/// Stored as a map of primitives. Known keys are [`MONEY_CHANGE_KEY`] and
/// [`CHARACTER_IDS_KEY`]; everything else is carried through untouched.
/// Human-readable formats (JSON, TOML) see a plain object, binary formats see
/// the tagged map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData(BTreeMap<String, DataValue>);

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: DataValue) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn insert(&mut self, key: &str, value: DataValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Signed money delta, when the payload carries a numeric `moneyChange`.
    pub fn money_change(&self) -> Option<i64> {
        self.get(MONEY_CHANGE_KEY).and_then(DataValue::as_i64)
    }

    /// Character ids listed under `characterIds`. A bare string counts as a
    /// single id; non-text list items are ignored.
    pub fn character_ids(&self) -> Vec<String> {
        match self.get(CHARACTER_IDS_KEY) {
            Some(DataValue::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(DataValue::Text(id)) => vec![id.clone()],
            _ => Vec::new(),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(map) => Ok(Self(
                map.into_iter()
                    .map(|(k, v)| (k, DataValue::from_json(v)))
                    .collect(),
            )),
            other => Err(format!("event data must be an object, got {}", other)),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for EventData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.to_json().serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for EventData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let value = serde_json::Value::deserialize(deserializer)?;
            EventData::from_json(value).map_err(D::Error::custom)
        } else {
            BTreeMap::deserialize(deserializer).map(EventData)
        }
    }
}

// ============================================================================
// Player & Inventory
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    #[serde(default)]
    pub money: i64,
    /// Id of the player log entry whose `moneyChange` was last folded into `money`.
    #[serde(default)]
    pub last_money_sync: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub player_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub stats: PlayerStats,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_player_schema")]
    pub schema_version: u8,
}

impl PlayerRecord {
    pub fn new(player_id: &str, name: &str, location: &str) -> Self {
        let now = Utc::now();
        Self {
            player_id: player_id.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            stats: PlayerStats::default(),
            created_at: now,
            updated_at: now,
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    pub fn with_money(mut self, money: i64) -> Self {
        self.stats.money = money;
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub name: String,
    #[serde(default)]
    pub amount: i64,
}

impl InventoryItem {
    pub fn new(name: &str, amount: i64) -> Self {
        Self {
            name: name.to_string(),
            amount,
        }
    }
}

/// Player inventory, replaced as a whole on every write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub player_id: String,
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    #[serde(default = "default_inventory_schema")]
    pub schema_version: u8,
}

impl InventoryRecord {
    pub fn new(player_id: &str, items: Vec<InventoryItem>) -> Self {
        Self {
            player_id: player_id.to_string(),
            items,
            schema_version: INVENTORY_SCHEMA_VERSION,
        }
    }

    pub fn empty(player_id: &str) -> Self {
        Self::new(player_id, Vec::new())
    }
}

// ============================================================================
// NPCs
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Npc,
    Player,
}

/// How an NPC feels about another character. The public/private split with
/// `revealed` models what the player has not learned yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub target_id: String,
    pub target_type: TargetType,
    #[serde(default)]
    pub attitude: Option<String>,
    #[serde(default)]
    pub public_attitude: Option<String>,
    #[serde(default)]
    pub private_attitude: Option<String>,
    #[serde(default)]
    pub revealed: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Relationship {
    pub fn new(target_id: &str, target_type: TargetType) -> Self {
        Self {
            target_id: target_id.to_string(),
            target_type,
            attitude: None,
            public_attitude: None,
            private_attitude: None,
            revealed: false,
            notes: None,
        }
    }

    /// The attitude the player is allowed to see.
    pub fn visible_attitude(&self) -> Option<&str> {
        if self.revealed {
            self.private_attitude
                .as_deref()
                .or(self.attitude.as_deref())
        } else {
            self.public_attitude
                .as_deref()
                .or(self.attitude.as_deref())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NpcMemory {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub feeling: Option<String>,
    #[serde(default)]
    pub data: EventData,
    #[serde(default = "default_intensity")]
    pub intensity: u8,
}

impl NpcMemory {
    pub fn new(summary: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            summary: summary.to_string(),
            feeling: None,
            data: EventData::default(),
            intensity: DEFAULT_MEMORY_INTENSITY,
        }
    }
}

impl From<&NpcEventLog> for NpcMemory {
    fn from(log: &NpcEventLog) -> Self {
        Self {
            timestamp: log.timestamp,
            summary: log.summary.clone(),
            feeling: log.feeling.clone(),
            data: log.data.clone(),
            intensity: DEFAULT_MEMORY_INTENSITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpcRecord {
    pub npc_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub personality: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub attitude_toward_player: Option<String>,
    #[serde(default)]
    pub conflict_level: i64,
    #[serde(default)]
    pub last_conflict_with_player: Option<DateTime<Utc>>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Append-only from the engine's perspective; mirrors the NPC event log.
    #[serde(default)]
    pub memories: Vec<NpcMemory>,
    /// Free-form simulation state owned by the caller.
    #[serde(default)]
    pub state: EventData,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_npc_schema")]
    pub schema_version: u8,
}

impl NpcRecord {
    pub fn new(npc_id: &str, name: &str, location: &str) -> Self {
        Self {
            npc_id: npc_id.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            personality: Vec::new(),
            mood: None,
            attitude_toward_player: None,
            conflict_level: 0,
            last_conflict_with_player: None,
            relationships: Vec::new(),
            memories: Vec::new(),
            state: EventData::default(),
            description: None,
            details: None,
            bio: None,
            created_at: Utc::now(),
            schema_version: NPC_SCHEMA_VERSION,
        }
    }

    pub fn with_trait(mut self, tag: &str) -> Self {
        if !self.personality.iter().any(|t| t == tag) {
            self.personality.push(tag.to_string());
        }
        self
    }

    pub fn with_mood(mut self, mood: &str) -> Self {
        self.mood = Some(mood.to_string());
        self
    }

    pub fn with_attitude(mut self, attitude: &str) -> Self {
        self.attitude_toward_player = Some(attitude.to_string());
        self
    }

    pub fn with_conflict_level(mut self, level: i64) -> Self {
        self.conflict_level = level;
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_memory(mut self, memory: NpcMemory) -> Self {
        self.memories.push(memory);
        self
    }
}

// ============================================================================
// Event logs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEventLog {
    pub id: String,
    pub player_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub summary: String,
    #[serde(default)]
    pub feeling: Option<String>,
    #[serde(default)]
    pub data: EventData,
    #[serde(default)]
    pub requires_player_input: Option<bool>,
    #[serde(default)]
    pub next_trigger: Option<String>,
    #[serde(default)]
    pub urgency: i64,
    #[serde(default = "default_event_schema")]
    pub schema_version: u8,
}

impl PlayerEventLog {
    pub fn new(player_id: &str, event_type: &str, summary: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            player_id: player_id.to_string(),
            timestamp,
            event_type: event_type.to_string(),
            summary: summary.to_string(),
            feeling: None,
            data: EventData::default(),
            requires_player_input: None,
            next_trigger: None,
            urgency: 0,
            schema_version: EVENT_LOG_SCHEMA_VERSION,
        }
    }

    pub fn with_feeling(mut self, feeling: &str) -> Self {
        self.feeling = Some(feeling.to_string());
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    pub fn with_urgency(mut self, urgency: i64) -> Self {
        self.urgency = urgency;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpcEventLog {
    pub id: String,
    pub npc_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    #[serde(default)]
    pub feeling: Option<String>,
    #[serde(default)]
    pub data: EventData,
    #[serde(default = "default_event_schema")]
    pub schema_version: u8,
}

impl NpcEventLog {
    pub fn new(npc_id: &str, summary: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            npc_id: npc_id.to_string(),
            timestamp,
            summary: summary.to_string(),
            feeling: None,
            data: EventData::default(),
            schema_version: EVENT_LOG_SCHEMA_VERSION,
        }
    }

    pub fn with_feeling(mut self, feeling: &str) -> Self {
        self.feeling = Some(feeling.to_string());
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }
}
