//! Datagroup membership, circularity, and secrecy containment.
//!
//! `in` edges run from a field to each group it is declared in; `maps`
//! edges run from a concrete member to the groups that abstract it. The
//! `in` graph must be acyclic. When a cycle is found every node on it is
//! marked broken and treated as having no edges for the rest of analysis.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use specattr_core::{codes, Category, DeclId, Diagnostic};

/// The datagroups bounding what the current method may read or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SecrecyContext {
    pub secret: Option<DeclId>,
    pub query: Option<DeclId>,
}

impl SecrecyContext {
    pub fn secret(group: DeclId) -> Self {
        Self {
            secret: Some(group),
            query: None,
        }
    }

    pub fn query(group: DeclId) -> Self {
        Self {
            secret: None,
            query: Some(group),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecrecyViolation {
    pub field: DeclId,
    pub access: Access,
    pub context: SecrecyContext,
}

impl SecrecyViolation {
    /// Render with the names the caller resolved for the field and groups.
    pub fn to_diagnostic(&self, name: impl Fn(DeclId) -> String) -> Diagnostic {
        let field = name(self.field);
        let context = match (self.context.secret, self.context.query) {
            (Some(g), _) => format!("secret context {}", name(g)),
            (None, Some(g)) => format!("query context {}", name(g)),
            (None, None) => "an unrestricted context".to_string(),
        };
        let (code, verb) = match self.access {
            Access::Read => (codes::SECRET_READ, "read"),
            Access::Write => (codes::SECRET_WRITE, "written"),
        };
        Diagnostic::error(
            Category::DataGroup,
            code,
            format!("field {field} may not be {verb} from {context}"),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataGroups {
    in_edges: IndexMap<DeclId, Vec<DeclId>>,
    maps_edges: IndexMap<DeclId, Vec<DeclId>>,
    secret: HashMap<DeclId, DeclId>,
    broken: HashSet<DeclId>,
    checked: HashSet<DeclId>,
}

impl DataGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `field in group`.
    pub fn add_in(&mut self, field: DeclId, group: DeclId) {
        let groups = self.in_edges.entry(field).or_default();
        if !groups.contains(&group) {
            groups.push(group);
        }
    }

    /// Record `maps member \into group`.
    pub fn add_maps(&mut self, member: DeclId, group: DeclId) {
        let groups = self.maps_edges.entry(member).or_default();
        if !groups.contains(&group) {
            groups.push(group);
        }
    }

    /// Mark `field` secret, readable only from contexts containing `group`.
    pub fn set_secret(&mut self, field: DeclId, group: DeclId) {
        self.secret.insert(field, group);
    }

    pub fn secret_group(&self, field: DeclId) -> Option<DeclId> {
        self.secret.get(&field).copied()
    }

    pub fn is_broken(&self, field: DeclId) -> bool {
        self.broken.contains(&field)
    }

    /// Groups `field` is directly in, ignoring broken nodes.
    pub fn groups_of(&self, field: DeclId) -> &[DeclId] {
        if self.broken.contains(&field) {
            return &[];
        }
        self.in_edges.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first search for a cycle reachable from `field`. Returns the
    /// chain from the first repeated node back to itself, e.g. `[a, b, a]`
    /// or `[g, g]` for a self-loop.
    pub fn check_circularity(&self, field: DeclId) -> Option<Vec<DeclId>> {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut done = HashSet::new();
        self.find_cycle(field, &mut path, &mut on_path, &mut done)
    }

    fn find_cycle(
        &self,
        node: DeclId,
        path: &mut Vec<DeclId>,
        on_path: &mut HashSet<DeclId>,
        done: &mut HashSet<DeclId>,
    ) -> Option<Vec<DeclId>> {
        if on_path.contains(&node) {
            let start = path.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        if done.contains(&node) {
            return None;
        }
        path.push(node);
        on_path.insert(node);
        for group in self.groups_of(node) {
            if let Some(cycle) = self.find_cycle(*group, path, on_path, done) {
                return Some(cycle);
            }
        }
        path.pop();
        on_path.remove(&node);
        done.insert(node);
        None
    }

    /// Run the circularity check for `field` at most once; a cycle found is
    /// broken before it is returned.
    pub fn check_field_once(&mut self, field: DeclId) -> Option<Vec<DeclId>> {
        if !self.checked.insert(field) {
            return None;
        }
        let cycle = self.check_circularity(field)?;
        self.break_cycle(&cycle);
        Some(cycle)
    }

    pub fn break_cycle(&mut self, cycle: &[DeclId]) {
        for node in cycle {
            self.broken.insert(*node);
            self.checked.insert(*node);
        }
    }

    /// Whether `field` is `group` or transitively in it, following `in`
    /// and `maps` edges.
    pub fn is_contained(&self, field: DeclId, group: DeclId) -> bool {
        let mut stack = vec![field];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == group {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            stack.extend(self.groups_of(node).iter().copied());
            if let Some(mapped) = self.maps_edges.get(&node) {
                stack.extend(mapped.iter().copied());
            }
        }
        false
    }

    /// A read of `field` from `ctx`. Unrestricted fields are readable
    /// anywhere; secret fields only from a secret or query context whose
    /// group contains them.
    pub fn check_read(&self, field: DeclId, ctx: SecrecyContext) -> Result<(), SecrecyViolation> {
        let Some(home) = self.secret_group(field) else {
            return Ok(());
        };
        let allowed = [ctx.secret, ctx.query]
            .into_iter()
            .flatten()
            .any(|g| self.is_contained(field, g) || self.is_contained(home, g));
        if allowed {
            Ok(())
        } else {
            Err(SecrecyViolation {
                field,
                access: Access::Read,
                context: ctx,
            })
        }
    }

    /// A write of `field` from `ctx`. Secret fields are writable only from
    /// a secret context containing them; a secret context may not write
    /// outside its group.
    pub fn check_write(&self, field: DeclId, ctx: SecrecyContext) -> Result<(), SecrecyViolation> {
        let home = self.secret_group(field);
        let allowed = match (ctx.secret, home) {
            (Some(g), Some(home)) => self.is_contained(field, g) || self.is_contained(home, g),
            (Some(g), None) => self.is_contained(field, g),
            (None, Some(_)) => false,
            (None, None) => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(SecrecyViolation {
                field,
                access: Access::Write,
                context: ctx,
            })
        }
    }
}
