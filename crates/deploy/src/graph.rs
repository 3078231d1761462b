//! Static dependency graph between features.

use std::collections::{BTreeMap, BTreeSet};

use gamekit_types::FeatureType;

use crate::error::GraphError;

/// Which features must be deployed before which.
///
/// An edge `A -> B` means B must be Deployed before A can be created.
/// `Main` is an implicit dependency of every other feature. The graph is
/// built once and never changes; queries return transitive closures.
#[derive(Debug, Clone)]
pub struct FeatureDependencyGraph {
    direct: BTreeMap<FeatureType, BTreeSet<FeatureType>>,
}

impl Default for FeatureDependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureDependencyGraph {
    /// The GameKit feature graph.
    pub fn new() -> Self {
        Self::build([(FeatureType::Authentication, FeatureType::Identity)])
    }

    /// Builds a graph from explicit `(feature, dependency)` edges, adding
    /// the implicit `Main` edge for every feature.
    ///
    /// Fails if `Main` is given a dependency or the edges form a cycle.
    pub fn from_edges(
        edges: impl IntoIterator<Item = (FeatureType, FeatureType)>,
    ) -> Result<Self, GraphError> {
        let edges: Vec<_> = edges.into_iter().collect();
        if let Some((_, dependency)) = edges.iter().find(|(f, _)| *f == FeatureType::Main) {
            return Err(GraphError::MainHasDependency(*dependency));
        }
        let graph = Self::build(edges);
        for (feature, deps) in &graph.direct {
            if deps.iter().any(|dep| graph.reaches(*dep, *feature)) {
                return Err(GraphError::Cycle(*feature));
            }
        }
        Ok(graph)
    }

    fn build(edges: impl IntoIterator<Item = (FeatureType, FeatureType)>) -> Self {
        let mut direct: BTreeMap<FeatureType, BTreeSet<FeatureType>> = FeatureType::ALL
            .into_iter()
            .map(|f| (f, BTreeSet::new()))
            .collect();
        for feature in FeatureType::ALL {
            if feature != FeatureType::Main
                && let Some(deps) = direct.get_mut(&feature)
            {
                deps.insert(FeatureType::Main);
            }
        }
        for (feature, dependency) in edges {
            direct.entry(feature).or_default().insert(dependency);
        }
        Self { direct }
    }

    /// True if `from` is `target` or depends on it through any path.
    fn reaches(&self, from: FeatureType, target: FeatureType) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.direct.get(&current).into_iter().flatten().copied());
            }
        }
        false
    }

    /// Every feature that must be Deployed before `feature` can be created.
    pub fn dependencies(&self, feature: FeatureType) -> BTreeSet<FeatureType> {
        let mut out = BTreeSet::new();
        let mut stack = vec![feature];
        while let Some(current) = stack.pop() {
            for dep in self.direct.get(&current).into_iter().flatten() {
                if *dep != feature && out.insert(*dep) {
                    stack.push(*dep);
                }
            }
        }
        out
    }

    /// Every feature that depends on `feature`, directly or not.
    pub fn dependents(&self, feature: FeatureType) -> BTreeSet<FeatureType> {
        self.direct
            .keys()
            .copied()
            .filter(|f| *f != feature && self.dependencies(*f).contains(&feature))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_has_no_dependencies() {
        let g = FeatureDependencyGraph::new();
        assert!(g.dependencies(FeatureType::Main).is_empty());
    }

    #[test]
    fn every_feature_depends_on_main() {
        let g = FeatureDependencyGraph::new();
        for f in FeatureType::ALL {
            if f != FeatureType::Main {
                assert!(g.dependencies(f).contains(&FeatureType::Main), "{f}");
            }
        }
    }

    #[test]
    fn achievements_depends_only_on_main() {
        let g = FeatureDependencyGraph::new();
        assert_eq!(
            g.dependencies(FeatureType::Achievements),
            BTreeSet::from([FeatureType::Main])
        );
    }

    #[test]
    fn dependencies_are_transitive() {
        let g = FeatureDependencyGraph::new();
        assert_eq!(
            g.dependencies(FeatureType::Authentication),
            BTreeSet::from([FeatureType::Main, FeatureType::Identity])
        );
    }

    #[test]
    fn dependents_of_main_are_everything_else() {
        let g = FeatureDependencyGraph::new();
        let dependents = g.dependents(FeatureType::Main);
        assert_eq!(dependents.len(), FeatureType::ALL.len() - 1);
        assert!(!dependents.contains(&FeatureType::Main));
    }

    #[test]
    fn dependents_of_identity() {
        let g = FeatureDependencyGraph::new();
        assert_eq!(
            g.dependents(FeatureType::Identity),
            BTreeSet::from([FeatureType::Authentication])
        );
        assert!(g.dependents(FeatureType::Achievements).is_empty());
    }

    #[test]
    fn custom_edges() {
        let g = FeatureDependencyGraph::from_edges([(
            FeatureType::Achievements,
            FeatureType::Identity,
        )])
        .unwrap();
        assert_eq!(
            g.dependencies(FeatureType::Achievements),
            BTreeSet::from([FeatureType::Main, FeatureType::Identity])
        );
        assert_eq!(
            g.dependents(FeatureType::Identity),
            BTreeSet::from([FeatureType::Achievements])
        );
    }

    #[test]
    fn main_cannot_have_dependencies() {
        let err = FeatureDependencyGraph::from_edges([(
            FeatureType::Main,
            FeatureType::Achievements,
        )])
        .unwrap_err();
        assert_eq!(err, GraphError::MainHasDependency(FeatureType::Achievements));
    }

    #[test]
    fn cycles_are_rejected() {
        let err = FeatureDependencyGraph::from_edges([
            (FeatureType::Achievements, FeatureType::Identity),
            (FeatureType::Identity, FeatureType::Achievements),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));

        let err = FeatureDependencyGraph::from_edges([(
            FeatureType::Identity,
            FeatureType::Identity,
        )])
        .unwrap_err();
        assert_eq!(err, GraphError::Cycle(FeatureType::Identity));
    }
}
