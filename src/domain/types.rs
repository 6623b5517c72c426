use serde::Serialize;

/// A physical stop. Index 0 of an instance is the depot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: String,
    pub category: String,
    pub longitude: f64,
    pub latitude: f64,
    pub demand: u64,
}

impl Location {
    /// Demand starts at zero; the instance fills it from the demand table.
    pub fn new(id: impl Into<String>, category: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            longitude,
            latitude,
            demand: 0,
        }
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }
}

/// Location indices scoped to one route model: `[O, s1, .., sm, D]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subset {
    pub id: usize,
    pub nodes: Vec<usize>,
}

impl Subset {
    pub fn new(id: usize, start: usize, customers: &[usize], end: usize) -> Self {
        let mut nodes = Vec::with_capacity(customers.len() + 2);
        nodes.push(start);
        nodes.extend_from_slice(customers);
        nodes.push(end);
        Self { id, nodes }
    }

    pub fn start(&self) -> Option<usize> {
        self.nodes.first().copied()
    }

    pub fn end(&self) -> Option<usize> {
        self.nodes.last().copied()
    }

    /// The non-depot entries.
    pub fn customers(&self) -> &[usize] {
        if self.nodes.len() < 2 {
            return &[];
        }
        &self.nodes[1..self.nodes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// An ordered walk `O -> .. -> D` driven by one vehicle slot of one subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub subset: usize,
    pub vehicle: usize,
    pub nodes: Vec<usize>,
}

impl Route {
    pub fn new(subset: usize, vehicle: usize, nodes: Vec<usize>) -> Self {
        Self {
            subset,
            vehicle,
            nodes,
        }
    }

    /// Stops between the two depot copies.
    pub fn interior(&self) -> &[usize] {
        if self.nodes.len() < 2 {
            return &[];
        }
        &self.nodes[1..self.nodes.len() - 1]
    }

    /// An unused vehicle slot: the direct depot-to-depot edge.
    pub fn is_null(&self) -> bool {
        self.nodes.len() == 2
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_wraps_customers_with_depots() {
        let subset = Subset::new(3, 0, &[4, 2, 7], 9);
        assert_eq!(subset.nodes, vec![0, 4, 2, 7, 9]);
        assert_eq!(subset.customers(), &[4, 2, 7]);
        assert_eq!(subset.start(), Some(0));
        assert_eq!(subset.end(), Some(9));
    }

    #[test]
    fn null_route_has_no_interior() {
        let route = Route::new(0, 1, vec![0, 5]);
        assert!(route.is_null());
        assert!(route.interior().is_empty());

        let route = Route::new(0, 0, vec![0, 3, 1, 5]);
        assert!(!route.is_null());
        assert_eq!(route.interior(), &[3, 1]);
    }
}
