//! Distance-to-fixed-destination wrapper.
//!
//! A search always measures distance from one fixed point (the query, or an existing node
//! during insert/repair) to a moving set of candidates. `TravelingCosts` pins that fixed point
//! once per search and exposes a `distance_to(id)` method so [`crate::search::LayerSearcher`]
//! and [`crate::engine::GraphEngine`] don't each re-derive the closure.

use crate::types::NodeId;

/// Binds a destination (by id, when it already lives in the arena, or by value for an
/// off-arena query point) to a distance function, letting callers ask "how far is candidate X
/// from here" without re-threading the destination through every call.
pub struct TravelingCosts<'a, T, D, F> {
    destination: &'a T,
    /// [`NodeId::INVALID`] when `destination` is a query point with no arena slot.
    destination_id: NodeId,
    distance_fn: &'a F,
    _marker: std::marker::PhantomData<D>,
}

impl<'a, T, D, F> TravelingCosts<'a, T, D, F>
where
    F: Fn(&T, &T) -> D,
{
    /// Costs measured to an existing arena item.
    pub fn for_node(destination: &'a T, destination_id: NodeId, distance_fn: &'a F) -> Self {
        Self {
            destination,
            destination_id,
            distance_fn,
            _marker: std::marker::PhantomData,
        }
    }

    /// Costs measured to a query point that has no arena slot.
    pub fn for_query(destination: &'a T, distance_fn: &'a F) -> Self {
        Self {
            destination,
            destination_id: NodeId::INVALID,
            distance_fn,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn destination_id(&self) -> NodeId {
        self.destination_id
    }

    pub fn distance_to(&self, item: &T) -> D {
        (self.distance_fn)(self.destination, item)
    }

    /// Distance between two arbitrary items, bypassing the pinned destination. Used by
    /// [`crate::select::NeighborSelector::Custom`], which needs pairwise distances between
    /// candidates rather than distance-to-target.
    pub fn item_distance(&self, a: &T, b: &T) -> D {
        (self.distance_fn)(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Distance;

    fn distance(a: &f32, b: &f32) -> Distance<f32> {
        Distance::from((a - b).abs())
    }

    #[test]
    fn measures_distance_to_pinned_destination() {
        let dest = 10.0f32;
        let costs = TravelingCosts::for_node(&dest, NodeId(3), &distance);
        assert_eq!(costs.distance_to(&4.0), Distance::from(6.0));
        assert_eq!(costs.destination_id(), NodeId(3));
    }

    #[test]
    fn query_destination_has_invalid_id() {
        let dest = 1.0f32;
        let costs = TravelingCosts::for_query(&dest, &distance);
        assert!(!costs.destination_id().is_valid());
    }
}
