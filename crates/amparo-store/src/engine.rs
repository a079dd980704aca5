use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use amparo_core::error::{Error, Result};
use amparo_core::lifecycle;
use amparo_core::policy::{self, Capability};
use amparo_db::queries::MarkerPatch;
use amparo_types::models::{Actor, Marker, Status};

use crate::store::RequestStore;

/// Serialization point for all marker mutations: validates the actor's
/// capability and the state machine before anything touches storage.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<RequestStore>,
}

impl LifecycleEngine {
    pub fn new(store: Arc<RequestStore>) -> Self {
        Self { store }
    }

    /// Move a marker along the state machine. Same-state requests are
    /// accepted as no-ops; triage decisions stamp the reviewer and reason.
    pub fn transition(
        &self,
        actor: &Actor,
        city: &str,
        id: Uuid,
        requested: Status,
        reason: Option<&str>,
    ) -> Result<Marker> {
        policy::ensure_city(actor, city)?;

        let marker = self.store.get(city, id)?;
        let Some(capability) = lifecycle::required_capability(marker.status, requested)? else {
            return Ok(marker);
        };
        policy::ensure(actor, capability)?;

        let mut patch = MarkerPatch {
            status: Some(requested),
            ..Default::default()
        };
        if lifecycle::is_triage_decision(marker.status, requested) {
            patch.updated_by = Some(actor.email.clone());
            patch.updated_at = Some(Utc::now());
            patch.update_reason = Some(reason.unwrap_or_default().to_string());
        }

        let updated = self.store.update(city, id, &patch)?;
        self.log_update(
            actor,
            id,
            "status_change",
            serde_json::json!({
                "from": marker.status,
                "to": requested,
                "reason": reason,
            }),
        );
        Ok(updated)
    }

    /// Reassign manual ranks: each id gets its position in the list. Applied
    /// as independent per-record updates — a mid-batch failure leaves the
    /// earlier assignments in place and surfaces as PartialBatch.
    pub fn reorder(&self, actor: &Actor, city: &str, ordered_ids: &[Uuid]) -> Result<()> {
        policy::ensure_city(actor, city)?;
        policy::ensure(actor, Capability::ViewManagement)?;

        let total = ordered_ids.len();
        for (position, &id) in ordered_ids.iter().enumerate() {
            let patch = MarkerPatch {
                index: Some(position as i64),
                ..Default::default()
            };
            if let Err(source) = self.store.update(city, id, &patch) {
                return Err(Error::PartialBatch {
                    applied: position,
                    total,
                    source: Box::new(source),
                });
            }
        }

        self.log_update(
            actor,
            Uuid::nil(),
            "reorder",
            serde_json::json!({ "city": city, "count": total }),
        );
        Ok(())
    }

    /// Derived view: status -> count over the city's current snapshot. Never
    /// persisted; recomputed on demand.
    pub fn counts_by_status(&self, city: &str) -> Result<BTreeMap<Status, usize>> {
        let mut counts: BTreeMap<Status, usize> =
            Status::ALL.iter().map(|&s| (s, 0)).collect();
        for marker in self.store.query(city, None)? {
            *counts.entry(marker.status).or_default() += 1;
        }
        Ok(counts)
    }

    /// Activity-trail write. Failures are logged and swallowed — the trail
    /// must never fail the operation it describes.
    fn log_update(&self, actor: &Actor, marker_id: Uuid, kind: &str, payload: serde_json::Value) {
        let result = self.store.db().insert_user_update(
            &Uuid::new_v4().to_string(),
            &actor.user_id.to_string(),
            &marker_id.to_string(),
            kind,
            &payload.to_string(),
            &Utc::now().to_rfc3339(),
        );
        if let Err(e) = result {
            warn!("activity log write failed ({kind}): {e}");
        }
    }
}
