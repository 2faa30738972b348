//! Automatic route generation.
//!
//! When a train on an automatic route cannot reserve ahead (its route is
//! exhausted or blocked), the scheduler asks an [`AutomaticRouter`] for a
//! fresh route starting at the train's current block. The default
//! [`ShortestPathRouter`] runs a breadth-first search over the block graph,
//! skipping blocks and turnouts held by other trains:
//!
//! - endless automatic routes head for the nearest other station block
//! - automatic-once routes head for their destination, arriving in the
//!   required direction when one is set

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::layout::{
    BlockCategory, BlockId, Destination, Direction, Layout, RouteMode, RouteStep, TrainId,
};

/// Source of generated routes.
pub trait AutomaticRouter {
    /// Compute new steps for `train`, the first step being its current
    /// block. `None` when no route can be found right now.
    fn update_automatic_route(&mut self, layout: &Layout, train: TrainId) -> Option<Vec<RouteStep>>;
}

impl<R: AutomaticRouter + ?Sized> AutomaticRouter for Box<R> {
    fn update_automatic_route(&mut self, layout: &Layout, train: TrainId) -> Option<Vec<RouteStep>> {
        (**self).update_automatic_route(layout, train)
    }
}

/// Breadth-first router avoiding other trains' reservations.
#[derive(Clone, Debug)]
pub struct ShortestPathRouter {
    max_nodes: usize,
}

impl ShortestPathRouter {
    pub fn new() -> Self {
        Self { max_nodes: 4096 }
    }

    /// Limit the number of (block, direction) nodes explored per search.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    fn search(
        &self,
        layout: &Layout,
        train: TrainId,
        start: (BlockId, Direction),
        goal: impl Fn(BlockId, Direction) -> bool,
    ) -> Option<Vec<(BlockId, Direction)>> {
        let mut parents: BTreeMap<(BlockId, Direction), (BlockId, Direction)> = BTreeMap::new();
        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            if node != start && goal(node.0, node.1) {
                let mut path = vec![node];
                let mut cursor = node;
                while let Some(parent) = parents.get(&cursor) {
                    path.push(*parent);
                    cursor = *parent;
                }
                path.reverse();
                return Some(path);
            }
            if visited.len() > self.max_nodes {
                break;
            }
            for reach in layout.reachable_from(node.0, node.1) {
                let next = (reach.block, reach.direction);
                let blocked = layout
                    .block(reach.block)
                    .map_or(true, |b| b.is_reserved_by_other(train))
                    || reach.turnouts.iter().any(|(id, _)| {
                        layout
                            .turnout(*id)
                            .map_or(true, |t| t.reservation.is_some_and(|o| o != train))
                    });
                if blocked || !visited.insert(next) {
                    continue;
                }
                parents.insert(next, node);
                queue.push_back(next);
            }
        }
        None
    }
}

impl Default for ShortestPathRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomaticRouter for ShortestPathRouter {
    fn update_automatic_route(&mut self, layout: &Layout, train: TrainId) -> Option<Vec<RouteStep>> {
        let t = layout.train(train).ok()?;
        let start = (t.block?, t.direction);
        let mode = layout.route_of(train).ok()??.mode;

        let path = match mode {
            RouteMode::Fixed => return None,
            RouteMode::Automatic => self.search(layout, train, start, |block, _| {
                block != start.0
                    && layout
                        .block(block)
                        .is_ok_and(|b| b.category == BlockCategory::Station)
            }),
            RouteMode::AutomaticOnce {
                destination: Destination { block, direction },
            } => {
                if block == start.0 {
                    return None;
                }
                self.search(layout, train, start, |b, d| {
                    b == block && direction.map_or(true, |required| required == d)
                })
            }
        };

        match path {
            Some(path) => {
                debug!(
                    %train,
                    route = ?path.iter().map(|(b, _)| *b).collect::<Vec<_>>(),
                    "automatic route found"
                );
                Some(
                    path.into_iter()
                        .map(|(block, direction)| RouteStep::block(block, direction))
                        .collect(),
                )
            }
            None => {
                debug!(%train, "no automatic route available");
                None
            }
        }
    }
}
