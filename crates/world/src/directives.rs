//! Directive intake and the per-tick application budget.
//!
//! Directives arrive out-of-band from a trusted planner; the hub
//! validates, rate-limits, and deduplicates them at ingestion, then
//! applies a bounded batch from the queue head on every tick.

use std::collections::HashSet;

use openclaw_protocol::{DirectiveAck, DirectiveRequest, DirectiveState, PayloadMap, SpawnHint, WorldFlagState};
use serde_json::{json, Value};
use tracing::debug;

use crate::hub::WorldHub;
use crate::{
    DEFAULT_DIRECTIVE_TTL_TICKS, DEFAULT_SPAWN_HINT_TTL_TICKS, MAX_DIRECTIVES_APPLIED_PER_TICK,
    MAX_DIRECTIVES_PER_TICK, MAX_DIRECTIVE_TTL_TICKS, MAX_QUEUED_DIRECTIVES,
    MAX_SPAWN_HINT_TTL_TICKS, MAX_STORY_BEATS,
};

/// Queued narrative mutation awaiting its tick budget.
#[derive(Debug, Clone)]
pub(crate) struct Directive {
    pub(crate) directive_id: String,
    pub(crate) kind: String,
    pub(crate) payload: PayloadMap,
    pub(crate) expire_tick: i64,
}

/// A live spawn hint plus its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpawnHintEntry {
    pub(crate) hint: SpawnHint,
    pub(crate) expire_tick: i64,
}

/// Intake queue with id dedup and a per-tick ingestion budget.
#[derive(Debug, Default)]
pub(crate) struct DirectiveQueue {
    pub(crate) queue: Vec<Directive>,
    pub(crate) seen: HashSet<String>,
    budget_tick: i64,
    budget_count: i64,
}

impl DirectiveQueue {
    pub(crate) fn reset(&mut self) {
        self.queue.clear();
        self.seen.clear();
        self.budget_tick = 0;
        self.budget_count = 0;
    }
}

fn allowed_directive_type(kind: &str) -> bool {
    matches!(kind, "set_world_flag" | "emit_story_beat" | "spawn_hint")
}

fn string_field(payload: &PayloadMap, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Lenient integer extraction: integral numbers pass, finite floats
/// round, everything else (strings, bools, NaN) is dropped.
fn int_field(payload: &PayloadMap, key: &str) -> Option<i64> {
    match payload.get(key)? {
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Some(value)
            } else {
                let value = number.as_f64()?;
                if value.is_finite() {
                    Some(value.round() as i64)
                } else {
                    None
                }
            }
        }
        _ => None,
    }
}

impl WorldHub {
    /// Validate and enqueue one directive.
    pub fn ingest_directive(&mut self, request: &DirectiveRequest) -> DirectiveAck {
        let mut ack = DirectiveAck {
            accepted: false,
            reason: String::new(),
            queued: self.directives.queue.len() as i64,
            tick: self.tick,
        };

        if request.directive_id.is_empty() || request.kind.is_empty() {
            ack.reason = "invalid_payload".to_string();
            return ack;
        }
        if !request.world_seed.is_empty() && request.world_seed != self.world_seed {
            ack.reason = "world_seed_mismatch".to_string();
            return ack;
        }
        if !allowed_directive_type(&request.kind) {
            ack.reason = "directive_type_blocked".to_string();
            return ack;
        }
        if self.directives.seen.contains(&request.directive_id) {
            ack.accepted = true;
            ack.reason = "duplicate_ignored".to_string();
            return ack;
        }
        if self.directives.budget_tick != self.tick {
            self.directives.budget_tick = self.tick;
            self.directives.budget_count = 0;
        }
        if self.directives.budget_count >= MAX_DIRECTIVES_PER_TICK {
            ack.reason = "directive_rate_limited".to_string();
            return ack;
        }
        if self.directives.queue.len() >= MAX_QUEUED_DIRECTIVES {
            ack.reason = "directive_queue_full".to_string();
            return ack;
        }

        let mut ttl = request.ttl_ticks;
        if ttl <= 0 {
            ttl = DEFAULT_DIRECTIVE_TTL_TICKS;
        }
        ttl = ttl.min(MAX_DIRECTIVE_TTL_TICKS);

        let directive = Directive {
            directive_id: request.directive_id.clone(),
            kind: request.kind.clone(),
            payload: request.payload.clone(),
            expire_tick: self.tick + ttl,
        };
        let expire_tick = directive.expire_tick;

        self.directives.seen.insert(directive.directive_id.clone());
        self.directives.queue.push(directive);
        self.directives.budget_count += 1;
        ack.accepted = true;
        ack.queued = self.directives.queue.len() as i64;
        let tick = self.tick;
        self.events.record(
            tick,
            "directive_queued",
            "openclaw",
            json!({
                "directiveId": request.directive_id,
                "type": request.kind,
                "expireTick": expire_tick,
            }),
        );
        debug!(directive_id = %request.directive_id, kind = %request.kind, "directive queued");
        ack
    }

    /// Apply up to the per-tick budget of queue-head directives.
    ///
    /// Expired entries anywhere in the inspected window are dropped
    /// without application. Returns true when flags, beats, or hints
    /// changed.
    pub(crate) fn apply_directive_budget(&mut self) -> bool {
        if self.directives.queue.is_empty() {
            return false;
        }

        let tick = self.tick;
        let limit = MAX_DIRECTIVES_APPLIED_PER_TICK.min(self.directives.queue.len());
        let mut state_changed = false;
        let mut remaining = Vec::with_capacity(self.directives.queue.len());
        let queue = std::mem::take(&mut self.directives.queue);

        for (index, directive) in queue.into_iter().enumerate() {
            if directive.expire_tick <= tick {
                self.events.record(
                    tick,
                    "directive_expired",
                    "openclaw",
                    json!({
                        "directiveId": directive.directive_id,
                        "type": directive.kind,
                    }),
                );
                continue;
            }
            if index >= limit {
                remaining.push(directive);
                continue;
            }

            match directive.kind.as_str() {
                "set_world_flag" => {
                    let key = string_field(&directive.payload, "key");
                    let value = string_field(&directive.payload, "value");
                    if !key.is_empty() {
                        if self.world_flags.get(&key) != Some(&value) {
                            state_changed = true;
                        }
                        self.world_flags.insert(key, value);
                    }
                }
                "emit_story_beat" => {
                    let beat = string_field(&directive.payload, "beat").trim().to_string();
                    if !beat.is_empty() {
                        self.story_beats.push(beat);
                        if self.story_beats.len() > MAX_STORY_BEATS {
                            let excess = self.story_beats.len() - MAX_STORY_BEATS;
                            self.story_beats.drain(..excess);
                        }
                        state_changed = true;
                    }
                }
                "spawn_hint" => {
                    if self.apply_spawn_hint_directive(&directive) {
                        state_changed = true;
                    }
                }
                _ => {}
            }

            self.events.record(
                tick,
                "directive_applied",
                "openclaw",
                json!({
                    "directiveId": directive.directive_id,
                    "type": directive.kind,
                }),
            );
        }

        self.directives.queue = remaining;
        state_changed
    }

    fn apply_spawn_hint_directive(&mut self, directive: &Directive) -> bool {
        let mut hint_id = string_field(&directive.payload, "hintId").trim().to_string();
        if hint_id.is_empty() {
            hint_id = directive.directive_id.clone();
        }
        let action = string_field(&directive.payload, "action")
            .trim()
            .to_lowercase();
        if action == "remove" {
            return self.spawn_hints.remove(&hint_id).is_some();
        }

        let (Some(chunk_x), Some(chunk_z)) = (
            int_field(&directive.payload, "chunkX"),
            int_field(&directive.payload, "chunkZ"),
        ) else {
            return false;
        };

        let mut label = string_field(&directive.payload, "label").trim().to_string();
        if label.is_empty() {
            label = "spawn_hint".to_string();
        }
        let mut ttl_ticks =
            int_field(&directive.payload, "ttlTicks").unwrap_or(DEFAULT_SPAWN_HINT_TTL_TICKS);
        if ttl_ticks <= 0 {
            ttl_ticks = DEFAULT_SPAWN_HINT_TTL_TICKS;
        }
        ttl_ticks = ttl_ticks.min(MAX_SPAWN_HINT_TTL_TICKS);

        let entry = SpawnHintEntry {
            hint: SpawnHint {
                hint_id: hint_id.clone(),
                label,
                chunk_x,
                chunk_z,
            },
            expire_tick: self.tick + ttl_ticks,
        };
        let changed = self.spawn_hints.get(&hint_id) != Some(&entry);
        self.spawn_hints.insert(hint_id, entry);
        changed
    }

    /// Drop spawn hints whose expiry has passed.
    pub(crate) fn prune_expired_spawn_hints(&mut self) -> bool {
        let tick = self.tick;
        let before = self.spawn_hints.len();
        self.spawn_hints.retain(|_, entry| entry.expire_tick > tick);
        self.spawn_hints.len() != before
    }

    /// Flags snapshot for broadcast.
    pub fn world_flag_state(&self) -> WorldFlagState {
        WorldFlagState {
            flags: self.world_flags.clone(),
            tick: self.tick,
        }
    }

    /// Narrative snapshot for broadcast: beats in order, hints by id.
    pub fn world_directive_state(&self) -> DirectiveState {
        let mut hint_ids: Vec<&String> = self.spawn_hints.keys().collect();
        hint_ids.sort();
        DirectiveState {
            story_beats: self.story_beats.clone(),
            spawn_hints: hint_ids
                .into_iter()
                .map(|hint_id| self.spawn_hints[hint_id].hint.clone())
                .collect(),
            tick: self.tick,
        }
    }
}

#[cfg(test)]
pub(crate) fn directive_request(directive_id: &str, kind: &str, payload: Value) -> DirectiveRequest {
    DirectiveRequest {
        directive_id: directive_id.to_string(),
        world_seed: String::new(),
        kind: kind.to_string(),
        ttl_ticks: 0,
        payload: match payload {
            Value::Object(map) => map,
            _ => PayloadMap::new(),
        },
    }
}
