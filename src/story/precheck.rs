//! Narrative consistency precheck.
//!
//! A proposed turn is judged against the stored player, the NPC population
//! and the player's recent log. Each rule runs independently and contributes
//! at most one error; the turn is consistent when no rule failed. The check
//! never writes to the store.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::logutil::escape_log;
use crate::story::errors::StoryError;
use crate::story::storage::StoryStore;
use crate::story::types::{EventData, NpcRecord, PlayerEventLog, PlayerRecord};

pub const ERR_PLAYER_MISSING: &str = "Player not found";
pub const ERR_PLAYER_LOCATION: &str = "Player location is missing";
pub const ERR_STORY_NOT_ADVANCING: &str = "Story is not advancing: latest entry repeats a recent event";
pub const ERR_NO_DRAMA: &str = "No dramatic tension present in the current story state";
pub const ERR_INSTRUCTIONS: &str = "Context and latest entry summary are both required";
pub const ERR_SERVER: &str = "Server error during precheck";

pub const ACTION_COMMIT: &str = "commit_turn";
pub const ACTION_REVISE: &str = "revise_turn";
pub const ACTION_PROVISION_NPC: &str = "provision_npc";
pub const ACTION_RETRY: &str = "retry_precheck";

/// Attitudes toward the player that do not count as hostile.
const NON_HOSTILE_ATTITUDES: [&str; 2] = ["friendly", "neutral"];

/// Dramatic themes and the summary keywords that signal them.
const DRAMA_THEMES: &[(&str, &[&str])] = &[
    ("conflict", &["argue", "fight", "yelled"]),
    ("tension", &["tension", "refuse"]),
    ("betrayal", &["betray", "secret"]),
    ("rivalry", &["rivalry", "competition", "alliance"]),
];

/// Feelings strong enough to count as drama on their own.
const DRAMATIC_FEELINGS: &[&str] = &[
    "angry",
    "furious",
    "betrayed",
    "jealous",
    "resentful",
    "suspicious",
    "afraid",
    "terrified",
    "hurt",
    "heartbroken",
    "ecstatic",
    "elated",
    "thrilled",
    "passionate",
    "infatuated",
];

/// The dramatic theme a summary touches, if any. Case-insensitive substring match.
pub fn drama_theme(summary: &str) -> Option<&'static str> {
    let folded = summary.to_lowercase();
    DRAMA_THEMES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| folded.contains(k)))
        .map(|(theme, _)| *theme)
}

pub fn is_dramatic_feeling(feeling: &str) -> bool {
    let folded = feeling.trim().to_lowercase();
    DRAMATIC_FEELINGS.contains(&folded.as_str())
}

fn is_hostile(npc: &NpcRecord) -> bool {
    match npc.attitude_toward_player.as_deref() {
        Some(attitude) if !attitude.is_empty() => !NON_HOSTILE_ATTITUDES.contains(&attitude),
        _ => false,
    }
}

/// Tunable limits for the precheck.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecheckPolicy {
    /// Upper bound on NPCs loaded per call.
    pub npc_scan_cap: usize,
    /// Entries compared for story advancement.
    pub recent_window: usize,
    /// Entries searched for NPC knowledge and drama.
    pub history_window: usize,
    pub conflict_threshold: i64,
    pub urgency_threshold: i64,
}

impl Default for PrecheckPolicy {
    fn default() -> Self {
        Self {
            npc_scan_cap: 500,
            recent_window: 5,
            history_window: 50,
            conflict_threshold: 50,
            urgency_threshold: 70,
        }
    }
}

/// The turn under review.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatestEntry {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub feeling: Option<String>,
    #[serde(default)]
    pub data: EventData,
}

impl LatestEntry {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: Some(summary.to_string()),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    fn summary_text(&self) -> Option<&str> {
        self.summary.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrecheckRequest {
    pub player_id: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub latest_entry: Option<LatestEntry>,
}

impl PrecheckRequest {
    pub fn new(player_id: &str, context: &str, latest_entry: LatestEntry) -> Self {
        Self {
            player_id: player_id.to_string(),
            context: Some(context.to_string()),
            latest_entry: Some(latest_entry),
        }
    }

    fn latest_summary(&self) -> Option<&str> {
        self.latest_entry.as_ref().and_then(LatestEntry::summary_text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub summary: String,
    pub logic_consistent: bool,
    pub errors: Vec<String>,
    pub next_actions_allowed: Vec<String>,
    pub drama_present: bool,
    pub story_advancing: bool,
    pub npc_individuality_maintained: bool,
    pub new_characters_detected: bool,
    pub instructions_adhered: bool,
}

impl Verdict {
    fn server_error() -> Self {
        Self {
            summary: "Precheck could not be completed".to_string(),
            logic_consistent: false,
            errors: vec![ERR_SERVER.to_string()],
            next_actions_allowed: vec![ACTION_RETRY.to_string()],
            drama_present: false,
            story_advancing: false,
            npc_individuality_maintained: false,
            new_characters_detected: false,
            instructions_adhered: false,
        }
    }

    /// A request the precheck cannot evaluate at all, such as one without a player id.
    fn rejected(message: String) -> Self {
        Self {
            summary: "Precheck request rejected".to_string(),
            errors: vec![message],
            next_actions_allowed: vec![ACTION_REVISE.to_string()],
            ..Self::server_error()
        }
    }
}

/// Rule 1.
fn check_player(player: Option<&PlayerRecord>) -> Option<String> {
    match player {
        None => Some(ERR_PLAYER_MISSING.to_string()),
        Some(p) if p.location.trim().is_empty() => Some(ERR_PLAYER_LOCATION.to_string()),
        Some(_) => None,
    }
}

/// Rule 2. A missing summary never advances the story.
fn story_advancing(summary: Option<&str>, recent: &[PlayerEventLog]) -> bool {
    let Some(summary) = summary else {
        return false;
    };
    let folded = summary.to_lowercase();
    !recent.iter().any(|log| log.summary.to_lowercase() == folded)
}

/// Rule 3. Returns the offending NPCs, each with the reason.
fn individuality_violations(npcs: &[NpcRecord], history: &[PlayerEventLog]) -> Vec<String> {
    let mut violations = Vec::new();
    for npc in npcs {
        if npc.personality.is_empty() {
            violations.push(format!("{} has no personality", npc.npc_id));
        }
        let leaked = npc.memories.iter().any(|memory| {
            !history
                .iter()
                .any(|log| log.summary.contains(memory.summary.as_str()))
        });
        if leaked {
            violations.push(format!("{} knows events the player never saw", npc.npc_id));
        }
    }
    violations
}

/// Rule 4. Advisory only.
fn new_characters(
    store: &StoryStore,
    player_id: &str,
    entry: Option<&LatestEntry>,
) -> Result<bool, StoryError> {
    let Some(entry) = entry else {
        return Ok(false);
    };
    for id in entry.data.character_ids() {
        if id == player_id {
            continue;
        }
        if !store.npc_exists(&id)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Rule 5.
fn drama_present(npcs: &[NpcRecord], history: &[PlayerEventLog], policy: &PrecheckPolicy) -> bool {
    let hostile = npcs.iter().any(is_hostile);
    let conflicted = npcs
        .iter()
        .any(|npc| npc.conflict_level >= policy.conflict_threshold);
    let eventful = history.iter().any(|log| {
        drama_theme(&log.summary).is_some()
            || log.feeling.as_deref().is_some_and(is_dramatic_feeling)
            || log.urgency > policy.urgency_threshold
    });
    hostile || conflicted || eventful
}

/// Rule 6.
fn instructions_adhered(request: &PrecheckRequest) -> bool {
    let has_context = request
        .context
        .as_deref()
        .is_some_and(|c| !c.is_empty());
    has_context && request.latest_summary().is_some()
}

fn evaluate(
    store: &StoryStore,
    request: &PrecheckRequest,
    policy: &PrecheckPolicy,
) -> Result<Verdict, StoryError> {
    let player_id = request.player_id.as_str();
    if player_id.trim().is_empty() {
        return Err(StoryError::Validation("playerId required".to_string()));
    }
    let player = store.find_player(player_id)?;
    let recent = store.recent_player_logs(player_id, policy.recent_window)?;
    let history = store.recent_player_logs(player_id, policy.history_window)?;
    let npcs = store.list_npcs(policy.npc_scan_cap)?;

    let mut errors = Vec::new();

    if let Some(err) = check_player(player.as_ref()) {
        errors.push(err);
    }

    let story_advancing = story_advancing(request.latest_summary(), &recent);
    if !story_advancing {
        errors.push(ERR_STORY_NOT_ADVANCING.to_string());
    }

    let violations = individuality_violations(&npcs, &history);
    let npc_individuality_maintained = violations.is_empty();
    if !npc_individuality_maintained {
        errors.push(format!(
            "NPC individuality not maintained: {}",
            violations.join("; ")
        ));
    }

    let new_characters_detected = new_characters(store, player_id, request.latest_entry.as_ref())?;

    let drama_present = drama_present(&npcs, &history, policy);
    if !drama_present {
        errors.push(ERR_NO_DRAMA.to_string());
    }

    let instructions_adhered = instructions_adhered(request);
    if !instructions_adhered {
        errors.push(ERR_INSTRUCTIONS.to_string());
    }

    let logic_consistent = errors.is_empty();
    let mut next_actions_allowed = vec![if logic_consistent {
        ACTION_COMMIT.to_string()
    } else {
        ACTION_REVISE.to_string()
    }];
    if new_characters_detected {
        next_actions_allowed.push(ACTION_PROVISION_NPC.to_string());
    }
    let summary = if logic_consistent {
        "Turn is consistent with the story so far".to_string()
    } else {
        format!("Turn failed {} consistency check(s)", errors.len())
    };

    Ok(Verdict {
        summary,
        logic_consistent,
        errors,
        next_actions_allowed,
        drama_present,
        story_advancing,
        npc_individuality_maintained,
        new_characters_detected,
        instructions_adhered,
    })
}

/// Judge a proposed turn. A store failure yields a single generic error
/// verdict instead of partial results; a malformed request yields a verdict
/// carrying only the validation message.
pub fn precheck(store: &StoryStore, request: &PrecheckRequest, policy: &PrecheckPolicy) -> Verdict {
    match evaluate(store, request, policy) {
        Ok(verdict) => {
            info!(
                "precheck for {}: {} ({} error(s))",
                escape_log(&request.player_id),
                if verdict.logic_consistent { "consistent" } else { "inconsistent" },
                verdict.errors.len()
            );
            verdict
        }
        Err(e) if e.is_store_failure() => {
            error!(
                "precheck for {} aborted: {}",
                escape_log(&request.player_id),
                e
            );
            Verdict::server_error()
        }
        Err(e) => {
            warn!("precheck rejected: {}", e);
            Verdict::rejected(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::types::NpcMemory;
    use chrono::Utc;

    fn log(summary: &str) -> PlayerEventLog {
        PlayerEventLog::new("p1", "event", summary, Utc::now())
    }

    #[test]
    fn theme_lookup_is_case_insensitive() {
        assert_eq!(drama_theme("They ARGUED all night"), Some("conflict"));
        assert_eq!(drama_theme("She kept a Secret"), Some("betrayal"));
        assert_eq!(drama_theme("quiet breakfast"), None);
    }

    #[test]
    fn dramatic_feelings() {
        assert!(is_dramatic_feeling("Furious"));
        assert!(!is_dramatic_feeling("content"));
    }

    #[test]
    fn hostility_is_anything_but_friendly_or_neutral() {
        assert!(is_hostile(&NpcRecord::new("n", "N", "x").with_attitude("wary")));
        assert!(!is_hostile(&NpcRecord::new("n", "N", "x").with_attitude("neutral")));
        assert!(!is_hostile(&NpcRecord::new("n", "N", "x")));
        assert!(!is_hostile(&NpcRecord::new("n", "N", "x").with_attitude("")));
    }

    #[test]
    fn repeated_summary_does_not_advance() {
        let recent = vec![log("Went to the market"), log("slept")];
        assert!(!story_advancing(Some("went to the MARKET"), &recent));
        assert!(story_advancing(Some("met a stranger"), &recent));
        assert!(!story_advancing(None, &recent));
    }

    #[test]
    fn memories_must_be_grounded_in_player_log() {
        let history = vec![log("The player argued with Mara at the bakery")];
        let grounded = NpcRecord::new("mara", "Mara", "bakery")
            .with_trait("proud")
            .with_memory(NpcMemory::new("argued with Mara", Utc::now()));
        assert!(individuality_violations(&[grounded], &history).is_empty());

        let leaky = NpcRecord::new("tom", "Tom", "dock")
            .with_trait("nosy")
            .with_memory(NpcMemory::new("saw the player steal", Utc::now()));
        let bland = NpcRecord::new("bob", "Bob", "dock");
        let violations = individuality_violations(&[leaky, bland], &history);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].starts_with("tom"));
        assert!(violations[1].starts_with("bob"));
    }

    #[test]
    fn drama_thresholds_are_inclusive_for_conflict_and_strict_for_urgency() {
        let policy = PrecheckPolicy::default();
        let tense = NpcRecord::new("n", "N", "x").with_conflict_level(50);
        assert!(drama_present(&[tense], &[], &policy));
        let calm = NpcRecord::new("n", "N", "x").with_conflict_level(49);
        assert!(!drama_present(&[calm], &[], &policy));
        assert!(!drama_present(&[], &[log("chores").with_urgency(70)], &policy));
        assert!(drama_present(&[], &[log("chores").with_urgency(71)], &policy));
        assert!(drama_present(&[], &[log("chores").with_feeling("jealous")], &policy));
    }

    #[test]
    fn instructions_need_context_and_summary() {
        let full = PrecheckRequest::new("p1", "ctx", LatestEntry::new("s"));
        assert!(instructions_adhered(&full));
        let mut no_context = full.clone();
        no_context.context = Some(String::new());
        assert!(!instructions_adhered(&no_context));
        let mut no_entry = full;
        no_entry.latest_entry = None;
        assert!(!instructions_adhered(&no_entry));
    }

    fn open_store() -> (StoryStore, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = crate::story::storage::StoryStoreBuilder::new(dir.path())
            .open()
            .expect("store");
        (store, dir)
    }

    #[test]
    fn unreadable_npc_collapses_to_server_error() {
        let (store, _dir) = open_store();
        store
            .create_player(PlayerRecord::new("p1", "Pat", "apartment"))
            .expect("player");
        store.insert_raw("npcs:x", b"\xff\x00garbage").expect("raw");

        let request = PrecheckRequest::new("p1", "ctx", LatestEntry::new("went out"));
        let verdict = precheck(&store, &request, &PrecheckPolicy::default());
        assert!(!verdict.logic_consistent);
        assert_eq!(verdict.errors, vec![ERR_SERVER.to_string()]);
        assert_eq!(verdict.next_actions_allowed, vec![ACTION_RETRY.to_string()]);
        assert!(!verdict.drama_present);
    }

    #[test]
    fn missing_player_id_is_rejected_not_collapsed() {
        let (store, _dir) = open_store();
        let request = PrecheckRequest::new("  ", "ctx", LatestEntry::new("went out"));
        let verdict = precheck(&store, &request, &PrecheckPolicy::default());
        assert!(!verdict.logic_consistent);
        assert_eq!(verdict.errors.len(), 1);
        assert!(verdict.errors[0].contains("playerId required"));
        assert_eq!(verdict.next_actions_allowed, vec![ACTION_REVISE.to_string()]);
    }

    #[test]
    fn request_parses_from_json() {
        let req: PrecheckRequest = serde_json::from_str(
            r#"{"playerId": "p1", "context": "morning", "latestEntry": {"summary": "hi", "data": {"characterIds": ["x"]}}}"#,
        )
        .expect("parse");
        assert_eq!(req.latest_summary(), Some("hi"));
        let entry = req.latest_entry.expect("entry");
        assert_eq!(entry.data.character_ids(), vec!["x"]);
    }
}
