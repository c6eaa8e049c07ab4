//! Declared migration plans
//!
//! A [`MigrationPlan`] is an ordered list of targets plus a dependency
//! relation between their roles. Validation rejects duplicates, unknown or
//! self dependencies, cycles, and dependencies declared after their
//! dependents, so the declared order is always a valid deployment order.

use crate::bundle::ContractsBundle;
use crate::engine::Initializer;
use crate::error::{MigrationError, PlanError};
use crate::target::TargetDescriptor;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type TargetFn = dyn Fn(&ContractsBundle) -> Result<TargetDescriptor, MigrationError> + Send + Sync;

/// One step of a plan
pub struct PlannedTarget {
    role: String,
    depends_on: Vec<String>,
    target: Box<TargetFn>,
    initializer: Option<Arc<dyn Initializer>>,
}

impl PlannedTarget {
    /// Target whose descriptor is known up front
    #[must_use]
    pub fn fixed(role: impl Into<String>, target: TargetDescriptor) -> Self {
        Self {
            role: role.into(),
            depends_on: Vec::new(),
            target: Box::new(move |_: &ContractsBundle| Ok(target.clone())),
            initializer: None,
        }
    }

    /// Target whose descriptor is built from contracts deployed before it
    ///
    /// Every role `build` reads must be listed with [`Self::after`].
    #[must_use]
    pub fn derived<F>(role: impl Into<String>, build: F) -> Self
    where
        F: Fn(&ContractsBundle) -> Result<TargetDescriptor, MigrationError> + Send + Sync + 'static,
    {
        Self {
            role: role.into(),
            depends_on: Vec::new(),
            target: Box::new(build),
            initializer: None,
        }
    }

    /// Depend on `role`
    #[must_use]
    pub fn after(mut self, role: impl Into<String>) -> Self {
        self.depends_on.push(role.into());
        self
    }

    /// Run `initializer` after a fresh deployment
    #[must_use]
    pub fn with_initializer(mut self, initializer: impl Initializer + 'static) -> Self {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    /// Role the contract is bundled under
    #[inline]
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Roles this target depends on
    #[inline]
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Initializer, if any
    #[inline]
    #[must_use]
    pub fn initializer(&self) -> Option<&dyn Initializer> {
        self.initializer.as_deref()
    }

    /// Build the descriptor from the contracts deployed so far
    ///
    /// # Errors
    /// Returns whatever the builder returns, typically
    /// [`MigrationError::MissingContract`].
    pub fn descriptor(&self, bundle: &ContractsBundle) -> Result<TargetDescriptor, MigrationError> {
        (self.target)(bundle)
    }
}

impl fmt::Debug for PlannedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedTarget")
            .field("role", &self.role)
            .field("depends_on", &self.depends_on)
            .field("has_initializer", &self.initializer.is_some())
            .finish_non_exhaustive()
    }
}

/// Ordered targets with dependencies
#[derive(Debug, Default)]
pub struct MigrationPlan {
    targets: Vec<PlannedTarget>,
}

impl MigrationPlan {
    /// Create empty plan
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target
    #[must_use]
    pub fn then(mut self, target: PlannedTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Append a target in place
    pub fn push(&mut self, target: PlannedTarget) {
        self.targets.push(target);
    }

    /// Targets in declared order
    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[PlannedTarget] {
        &self.targets
    }

    /// Number of targets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if plan is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Validate roles and the dependency relation
    ///
    /// # Errors
    /// Returns the first [`PlanError`] found.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.targets.len());
        for (i, target) in self.targets.iter().enumerate() {
            if index.insert(target.role.as_str(), i).is_some() {
                return Err(PlanError::DuplicateRole(target.role.clone()));
            }
        }

        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for i in 0..self.targets.len() {
            graph.add_node(i);
        }
        for (i, target) in self.targets.iter().enumerate() {
            for dep in &target.depends_on {
                if *dep == target.role {
                    return Err(PlanError::SelfDependency(target.role.clone()));
                }
                let &j = index.get(dep.as_str()).ok_or_else(|| PlanError::UnknownDependency {
                    role: target.role.clone(),
                    dependency: dep.clone(),
                })?;
                graph.add_edge(j, i, ());
            }
        }

        toposort(&graph, None)
            .map_err(|cycle| PlanError::Cycle(self.targets[cycle.node_id()].role.clone()))?;

        for (i, target) in self.targets.iter().enumerate() {
            for dep in &target.depends_on {
                if index[dep.as_str()] > i {
                    return Err(PlanError::OutOfOrder {
                        role: target.role.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Group roles into waves whose members do not depend on each other
    ///
    /// Each wave depends only on earlier waves. Execution stays sequential;
    /// the waves show which branches could run side by side.
    ///
    /// # Errors
    /// Returns a [`PlanError`] if the plan is invalid.
    pub fn waves(&self) -> Result<Vec<Vec<&str>>, PlanError> {
        self.validate()?;

        let index: HashMap<&str, usize> = self
            .targets
            .iter()
            .enumerate()
            .map(|(i, t)| (t.role.as_str(), i))
            .collect();
        let mut depth = vec![0usize; self.targets.len()];
        for (i, target) in self.targets.iter().enumerate() {
            let d = target
                .depends_on
                .iter()
                .map(|dep| depth[index[dep.as_str()]] + 1)
                .max()
                .unwrap_or(0);
            depth[i] = d;
        }

        let mut waves: Vec<Vec<&str>> = Vec::new();
        for (i, target) in self.targets.iter().enumerate() {
            if waves.len() <= depth[i] {
                waves.resize_with(depth[i] + 1, Vec::new);
            }
            waves[depth[i]].push(target.role.as_str());
        }
        Ok(waves)
    }
}
