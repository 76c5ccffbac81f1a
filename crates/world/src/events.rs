//! World event log: monotonic sequence, ring eviction, read cursors.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use openclaw_protocol::{PayloadMap, WorldEvent, WorldEventFeed};
use serde_json::Value;

use crate::hub::WorldHub;
use crate::{MAX_EVENT_CURSORS, MAX_WORLD_EVENTS};

#[derive(Debug, Clone)]
struct CursorEntry {
    seq: i64,
    updated_at: Instant,
}

/// Ring buffer of the most recent world events plus reader cursors.
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    seq: i64,
    entries: VecDeque<WorldEvent>,
    cursors: HashMap<String, CursorEntry>,
}

impl EventLog {
    /// Append an event. `payload` must be a JSON object; anything else
    /// is recorded with an empty payload.
    pub(crate) fn record(
        &mut self,
        tick: i64,
        kind: &str,
        player_id: &str,
        payload: Value,
    ) -> WorldEvent {
        self.seq += 1;
        let payload = match payload {
            Value::Object(map) => map,
            _ => PayloadMap::new(),
        };
        let event = WorldEvent {
            seq: self.seq,
            tick,
            kind: kind.to_string(),
            player_id: player_id.to_string(),
            payload,
        };
        self.entries.push_back(event.clone());
        while self.entries.len() > MAX_WORLD_EVENTS {
            self.entries.pop_front();
        }
        event
    }

    pub(crate) fn next_seq(&self) -> i64 {
        self.seq + 1
    }

    pub(crate) fn reset(&mut self) {
        self.seq = 0;
        self.entries.clear();
    }

    fn collect_since(&self, since: i64) -> Vec<WorldEvent> {
        self.entries
            .iter()
            .filter(|event| event.seq > since)
            .cloned()
            .collect()
    }

    fn prune_cursors(&mut self) {
        if self.cursors.len() <= MAX_EVENT_CURSORS {
            return;
        }
        let mut order: Vec<(String, Instant)> = self
            .cursors
            .iter()
            .map(|(id, entry)| (id.clone(), entry.updated_at))
            .collect();
        order.sort_by_key(|(_, at)| *at);
        for (id, _) in order {
            if self.cursors.len() <= MAX_EVENT_CURSORS {
                break;
            }
            self.cursors.remove(&id);
        }
    }
}

impl WorldHub {
    /// Every retained event with `seq > since`.
    pub fn events_since(&self, since: i64) -> WorldEventFeed {
        WorldEventFeed {
            events: self.events.collect_since(since),
            next: self.events.next_seq(),
        }
    }

    /// Cursor-aware read: a named cursor with `since == 0` resumes at
    /// its stored sequence, and each read advances it to the last
    /// returned event.
    pub fn events_for_cursor(&mut self, since: i64, cursor: &str, limit: i64) -> WorldEventFeed {
        let mut since = since;
        if !cursor.is_empty() && since == 0 {
            if let Some(entry) = self.events.cursors.get(cursor) {
                since = entry.seq;
            }
        }

        let mut events = self.events.collect_since(since);
        if limit > 0 && events.len() as i64 > limit {
            events.truncate(limit as usize);
        }

        if !cursor.is_empty() {
            let next_seq = events.last().map_or(since, |event| event.seq);
            self.events.cursors.insert(
                cursor.to_string(),
                CursorEntry {
                    seq: next_seq,
                    updated_at: Instant::now(),
                },
            );
            self.events.prune_cursors();
        }

        WorldEventFeed {
            events,
            next: self.events.next_seq(),
        }
    }
}
