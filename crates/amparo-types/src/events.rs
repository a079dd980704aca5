use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Marker, Status};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, name: String },

    /// Full matching result set for the connection's active watch.
    /// Delivered once immediately after Watch, then on every relevant change.
    Snapshot { city: String, markers: Vec<Marker> },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Start (or replace) the connection's live query: markers of one city,
    /// optionally restricted to a status set. An empty `statuses` watches all.
    Watch {
        city: String,
        #[serde(default)]
        statuses: Vec<Status>,
    },
}
