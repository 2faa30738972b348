//! Persisted layout document.
//!
//! A [`LayoutDocument`] is the JSON form of a [`Layout`]: the static track
//! graph plus where each train stands, so a session can be resumed.
//! Reservations, scheduling state and generated routes are not stored; a
//! loaded layout has every placed train stopped and unmanaged, holding only
//! its own block.
//!
//! ```rust
//! use trainz_dispatch::document::LayoutDocument;
//! use trainz_dispatch::hal::mock::line_layout;
//! use trainz_dispatch::layout::BlockId;
//!
//! let document = LayoutDocument::from_layout(&line_layout(2).unwrap());
//! let json = document.to_json().unwrap();
//!
//! let layout = LayoutDocument::from_json(&json).unwrap().into_layout().unwrap();
//! assert!(layout.block(BlockId(2)).is_ok());
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LayoutError;
use crate::layout::{Block, Feedback, Layout, Route, Station, Train, Transition, Turnout};
use crate::reservation::ReservationManager;

/// Serializable layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutDocument {
    pub feedbacks: Vec<Feedback>,
    pub blocks: Vec<Block>,
    pub turnouts: Vec<Turnout>,
    pub stations: Vec<Station>,
    pub routes: Vec<Route>,
    pub transitions: Vec<Transition>,
    pub trains: Vec<Train>,
}

impl LayoutDocument {
    /// Capture `layout`. Generated routes are left out.
    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            feedbacks: layout.feedbacks().cloned().collect(),
            blocks: layout.blocks().cloned().collect(),
            turnouts: layout.turnouts().cloned().collect(),
            stations: layout.stations().cloned().collect(),
            routes: layout
                .routes()
                .filter(|r| !r.id.is_automatic())
                .cloned()
                .collect(),
            transitions: layout.transitions().to_vec(),
            trains: layout.trains().cloned().collect(),
        }
    }

    /// Build the registry and put every train back where it stood.
    pub fn into_layout(self) -> Result<Layout, LayoutError> {
        let mut layout = Layout::new();
        for mut feedback in self.feedbacks {
            feedback.detected = false;
            layout.add_feedback(feedback)?;
        }
        for mut block in self.blocks {
            block.reservation = None;
            layout.add_block(block)?;
        }
        for mut turnout in self.turnouts {
            turnout.reservation = None;
            layout.add_turnout(turnout)?;
        }
        for station in self.stations {
            layout.add_station(station)?;
        }
        for route in self.routes {
            layout.add_route(route)?;
        }
        for transition in self.transitions {
            layout.link(transition.a, transition.b)?;
        }

        let mut placements = Vec::new();
        for mut train in self.trains {
            if let Some(block) = train.block.take() {
                placements.push((train.id, block, train.direction, train.position));
            }
            train.reset_session_state();
            layout.add_train(train)?;
        }
        let reservations = ReservationManager::default();
        for (train, block, direction, position) in placements {
            reservations.place_train(&mut layout, train, block, direction, position)?;
        }
        Ok(layout)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Read a document from a JSON file.
    pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read layout from {}", path.display()))?;
        let document = Self::from_json(&json)
            .with_context(|| format!("failed to parse layout from {}", path.display()))?;
        info!(
            path = %path.display(),
            blocks = document.blocks.len(),
            trains = document.trains.len(),
            "layout loaded"
        );
        Ok(document)
    }

    /// Write the document as pretty-printed JSON.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = self.to_json().context("failed to serialize layout")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write layout to {}", path.display()))?;
        info!(path = %path.display(), "layout saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{junction_layout, line_layout};
    use crate::layout::{BlockId, Direction, RouteId, RouteStep, TrainId, TurnoutId};

    const DOCUMENT: &str = r#"{
        "feedbacks": [
            { "id": 1, "name": "F1", "device_id": 1, "contact_id": 1 },
            { "id": 2, "name": "F2", "device_id": 1, "contact_id": 2 }
        ],
        "blocks": [
            { "id": 1, "name": "West", "length_cm": 120.0, "feedbacks": [1] },
            { "id": 2, "name": "East", "category": "station", "waiting_time_ms": 30000, "feedbacks": [2] }
        ],
        "transitions": [
            {
                "a": { "kind": "block", "block": 1, "side": "next" },
                "b": { "kind": "block", "block": 2, "side": "previous" }
            }
        ],
        "routes": [
            {
                "id": 1,
                "name": "west to east",
                "steps": [
                    { "target": { "kind": "block", "block": 1, "direction": "next" } },
                    { "target": { "kind": "block", "block": 2, "direction": "next" }, "waiting_time_ms": 5000 }
                ]
            }
        ],
        "trains": [
            { "id": 7, "name": "ICE", "address": 3, "max_speed_kph": 200, "block": 1, "position": 1 }
        ]
    }"#;

    #[test]
    fn reads_handwritten_document() {
        let layout = LayoutDocument::from_json(DOCUMENT)
            .unwrap()
            .into_layout()
            .unwrap();

        let east = layout.block(BlockId(2)).unwrap();
        assert_eq!(east.waiting_time_ms, 30_000);
        assert_eq!(layout.block(BlockId(1)).unwrap().waiting_time_ms, 10_000);

        let route = layout.route(RouteId(1)).unwrap();
        assert_eq!(route.steps[1].waiting_time_ms, Some(5_000));

        let train = layout.train(TrainId(7)).unwrap();
        assert_eq!(train.block, Some(BlockId(1)));
        assert_eq!(train.direction, Direction::Next);
        assert!(layout.block(BlockId(1)).unwrap().is_reserved_by(TrainId(7)));
        assert!(!train.is_managed());
    }

    #[test]
    fn round_trip_keeps_graph_and_placement() {
        let mut layout = junction_layout().unwrap();
        layout
            .add_train(Train::new(TrainId(1), "T1", 3).with_max_speed_kph(90))
            .unwrap();
        ReservationManager::default()
            .place_train(&mut layout, TrainId(1), BlockId(3), Direction::Next, 1)
            .unwrap();

        let json = LayoutDocument::from_layout(&layout).to_json().unwrap();
        let restored = LayoutDocument::from_json(&json)
            .unwrap()
            .into_layout()
            .unwrap();

        assert_eq!(restored.transitions(), layout.transitions());
        assert_eq!(restored.turnout(TurnoutId(1)).unwrap().address, 10);
        assert_eq!(restored.reservation_snapshot(), layout.reservation_snapshot());
        let train = restored.train(TrainId(1)).unwrap();
        assert_eq!(train.max_speed_kph, 90);
        assert_eq!(train.position, 1);
    }

    #[test]
    fn generated_routes_are_not_stored() {
        let mut layout = line_layout(2).unwrap();
        layout.set_route(Route {
            id: RouteId::automatic_for(TrainId(1)),
            name: "generated".to_string(),
            mode: Default::default(),
            steps: vec![RouteStep::block(BlockId(1), Direction::Next)],
        });
        assert!(LayoutDocument::from_layout(&layout).routes.is_empty());
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let mut document = LayoutDocument::from_layout(&line_layout(1).unwrap());
        document.feedbacks.clear();
        assert!(matches!(
            document.into_layout(),
            Err(LayoutError::MissingReference { .. })
        ));
    }

    #[test]
    fn save_and_load_file() {
        let path = std::env::temp_dir().join(format!("trainz-layout-{}.json", std::process::id()));
        LayoutDocument::from_layout(&line_layout(3).unwrap())
            .save_to_path(&path)
            .unwrap();
        let loaded = LayoutDocument::load_from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.blocks.len(), 3);

        let err = LayoutDocument::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("failed to read layout"));
    }
}
