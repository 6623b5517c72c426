use crate::domain::types::Route;

/// Every non-null route found across all subsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    pub routes: Vec<Route>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one subset's routes; null routes are dropped on the way in.
    pub fn extend(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes
            .extend(routes.into_iter().filter(|route| !route.is_null()));
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Non-depot stops in route order, possibly with repeats if the solution is broken.
    pub fn served(&self) -> impl Iterator<Item = usize> + '_ {
        self.routes.iter().flat_map(|route| route.interior().iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_discards_null_routes() {
        let mut solution = Solution::new();
        solution.extend(vec![
            Route::new(0, 0, vec![0, 1, 2, 4]),
            Route::new(0, 1, vec![0, 4]),
            Route::new(1, 0, vec![0, 3, 4]),
        ]);
        assert_eq!(solution.len(), 2);
        assert_eq!(solution.served().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
