//! Disposable entity fixtures with per-scenario unique names.
//!
//! Every factory draws one numeric uniqueifier (current time in ms mod
//! 10000) and appends it to every unique template it expands. Two templates
//! with the same base inside one scenario therefore expand to the same name,
//! which is how duplicate checks are written. Across scenarios the suffix is
//! only probably distinct. Factories sharing a [`SuffixRegistry`] report a
//! drawn value that is already held and move on to the next free one;
//! factories in other processes can still collide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::driver::TimeModuleDriver;
use crate::error::{Error, Result};
use crate::workflow::Actor;

use super::entity::{EmployeeIdentity, EntityKind, EntitySpec};

/// Modulus of the time-derived uniqueifier.
pub const SUFFIX_MODULUS: u128 = 10_000;

/// Password given to employee fixtures that do not set one.
pub const DEFAULT_EMPLOYEE_PASSWORD: &str = "Fixture#2024";

/// Suffixes held by live factories, shared by concurrently running scenarios.
#[derive(Debug, Clone, Default)]
pub struct SuffixRegistry {
    held: Arc<Mutex<HashMap<u16, usize>>>,
}

impl SuffixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a hold on `suffix`. Returns true if another factory already
    /// holds it.
    fn acquire(&self, suffix: u16) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        let count = held.entry(suffix).or_insert(0);
        *count += 1;
        *count > 1
    }

    /// Holds the first free suffix at or after `drawn`, wrapping at the
    /// modulus. Returns it and whether `drawn` itself was taken.
    fn acquire_free(&self, drawn: u16) -> (u16, bool) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        let taken = held.contains_key(&drawn);
        let modulus = SUFFIX_MODULUS as u32;
        let suffix = (0..modulus)
            .map(|offset| ((u32::from(drawn) + offset) % modulus) as u16)
            .find(|candidate| !held.contains_key(candidate))
            .unwrap_or(drawn);
        *held.entry(suffix).or_insert(0) += 1;
        (suffix, taken)
    }

    fn release(&self, suffix: u16) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = held.get_mut(&suffix) {
            *count -= 1;
            if *count == 0 {
                held.remove(&suffix);
            }
        }
    }

    /// Number of factories currently holding `suffix`.
    pub fn holders(&self, suffix: u16) -> usize {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.get(&suffix).copied().unwrap_or(0)
    }
}

/// Low-order digits of the current time in milliseconds.
pub fn clock_suffix() -> u16 {
    let millis = chrono::Utc::now().timestamp_millis();
    millis.rem_euclid(SUFFIX_MODULUS as i64) as u16
}

/// Appends `suffix` to `base`, keeping surrounding whitespace in place.
///
/// `"  ABC Corp  "` becomes `"  ABC Corp 42  "`. Blank bases stay blank.
pub fn uniqueify(base: &str, suffix: u16) -> String {
    if base.trim().is_empty() {
        return base.to_string();
    }
    let core = base.trim_end();
    let trailing = &base[core.len()..];
    format!("{} {}{}", core, suffix, trailing)
}

/// A fixture created (or about to be created) by a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHandle {
    pub id: usize,
    pub kind: EntityKind,
    /// Template base name the handle was expanded from.
    pub base: String,
    /// Spec with the unique name and resolved associations.
    pub spec: EntitySpec,
    /// Actor that creates and deletes the entity.
    pub owner: Actor,
    /// Set for employee fixtures.
    pub identity: Option<EmployeeIdentity>,
    /// The entity exists, or may exist, and teardown has to remove it.
    pub needs_cleanup: bool,
    /// The create was issued but never confirmed.
    pub unconfirmed: bool,
    pub cleaned: bool,
}

impl EntityHandle {
    /// Name the entity is deleted or searched by.
    pub fn name(&self) -> String {
        match &self.identity {
            Some(identity) => identity.full_name(),
            None => self.spec.name.clone(),
        }
    }
}

/// Creates uniquely named fixtures and tracks their teardown.
pub struct FixtureFactory {
    registry: SuffixRegistry,
    suffix: u16,
    collision_risk: bool,
    handles: Vec<EntityHandle>,
}

impl FixtureFactory {
    /// Creates a factory with a time-derived suffix not held by another
    /// factory of the same registry.
    pub fn new(registry: SuffixRegistry) -> Self {
        let drawn = clock_suffix();
        let (suffix, collision_risk) = registry.acquire_free(drawn);
        if collision_risk {
            tracing::warn!(
                drawn,
                suffix,
                "fixture collision risk: uniqueifier already held by a running scenario"
            );
        }
        Self {
            registry,
            suffix,
            collision_risk,
            handles: Vec::new(),
        }
    }

    /// Creates a factory with a fixed suffix, even if it is already held.
    pub fn with_suffix(registry: SuffixRegistry, suffix: u16) -> Self {
        let collision_risk = registry.acquire(suffix);
        if collision_risk {
            tracing::warn!(
                suffix,
                holders = registry.holders(suffix),
                "fixture collision risk: uniqueifier already held by a running scenario"
            );
        }
        Self {
            registry,
            suffix,
            collision_risk,
            handles: Vec::new(),
        }
    }

    pub fn suffix(&self) -> u16 {
        self.suffix
    }

    /// Whether another live factory drew the same suffix.
    pub fn collision_risk(&self) -> bool {
        self.collision_risk
    }

    /// Expands a template into a handle. The entity is not created yet.
    pub fn create(&mut self, template: &EntitySpec, owner: Actor) -> EntityHandle {
        let id = self.handles.len();
        let mut spec = template.clone();
        let mut identity = None;

        match template.kind {
            EntityKind::Employee => {
                let first_name = template.name.trim().to_string();
                let last_name = self.suffix.to_string();
                let password = template
                    .password
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EMPLOYEE_PASSWORD.to_string());
                let found = EmployeeIdentity {
                    username: format!("{}.{}", first_name.to_lowercase(), last_name),
                    first_name,
                    last_name,
                    password,
                };
                spec.name = found.full_name();
                identity = Some(found);
            }
            _ => {
                if template.unique {
                    spec.name = uniqueify(&template.name, self.suffix);
                }
            }
        }

        spec.customer = template
            .customer
            .as_deref()
            .map(|c| self.resolve(EntityKind::Customer, c));
        spec.project = template
            .project
            .as_deref()
            .map(|p| self.resolve(EntityKind::Project, p));
        spec.admins = template
            .admins
            .iter()
            .map(|a| self.resolve(EntityKind::Employee, a))
            .collect();

        let handle = EntityHandle {
            id,
            kind: template.kind,
            base: template.name.clone(),
            spec,
            owner,
            identity,
            needs_cleanup: false,
            unconfirmed: false,
            cleaned: false,
        };
        tracing::debug!(kind = %handle.kind, name = %handle.name(), "expanded fixture");
        self.handles.push(handle.clone());
        handle
    }

    /// Maps a template base to the name of a fixture created from it in this
    /// scenario, or returns `base` unchanged for pre-existing entities.
    pub fn resolve(&self, kind: EntityKind, base: &str) -> String {
        self.handles
            .iter()
            .rev()
            .find(|h| h.kind == kind && h.base.trim() == base.trim())
            .map(|h| h.name())
            .unwrap_or_else(|| base.to_string())
    }

    /// Marks a handle's entity as existing in the system under test.
    pub fn mark_created(&mut self, handle: &EntityHandle) {
        if let Some(h) = self.handles.get_mut(handle.id) {
            h.needs_cleanup = true;
            h.unconfirmed = false;
        }
    }

    /// Marks a handle whose create was issued but not yet confirmed.
    ///
    /// Teardown deletes it and treats a missing entity as already gone.
    pub fn mark_unconfirmed(&mut self, handle: &EntityHandle) {
        if let Some(h) = self.handles.get_mut(handle.id) {
            h.needs_cleanup = true;
            h.unconfirmed = true;
        }
    }

    /// Marks a handle whose create the module refused.
    pub fn mark_absent(&mut self, handle: &EntityHandle) {
        if let Some(h) = self.handles.get_mut(handle.id) {
            h.needs_cleanup = false;
            h.unconfirmed = false;
        }
    }

    /// Handles still awaiting teardown, newest first.
    pub fn pending(&self) -> Vec<EntityHandle> {
        self.handles
            .iter()
            .rev()
            .filter(|h| h.needs_cleanup && !h.cleaned)
            .cloned()
            .collect()
    }

    /// Deletes a fixture's entity. Calling it again after success is a no-op.
    ///
    /// The caller is responsible for acting as `handle.owner`.
    pub async fn cleanup<D>(&mut self, handle: &EntityHandle, driver: &D) -> Result<()>
    where
        D: TimeModuleDriver + ?Sized,
    {
        let Some(h) = self.handles.get(handle.id) else {
            return Ok(());
        };
        if !h.needs_cleanup || h.cleaned {
            return Ok(());
        }

        let name = h.name();
        let kind = h.kind;
        let unconfirmed = h.unconfirmed;
        tracing::info!(kind = %kind, name = %name, unconfirmed, "deleting fixture");
        match driver.delete_entity(kind, &name).await {
            Ok(()) => {}
            Err(Error::NotFound { .. }) if unconfirmed => {
                tracing::debug!(kind = %kind, name = %name, "unconfirmed fixture was never created");
            }
            Err(e) => return Err(e),
        }

        if let Some(h) = self.handles.get_mut(handle.id) {
            h.cleaned = true;
        }
        Ok(())
    }
}

impl FixtureFactory {
    /// Deletes every pending fixture owned by `owner`, newest first.
    ///
    /// A failure does not stop the remaining deletions; all failures are
    /// returned.
    pub async fn cleanup_all<D>(&mut self, owner: Actor, driver: &D) -> Vec<Error>
    where
        D: TimeModuleDriver + ?Sized,
    {
        let mut errors = Vec::new();
        for handle in self.pending().into_iter().filter(|h| h.owner == owner) {
            if let Err(e) = self.cleanup(&handle, driver).await {
                tracing::warn!(kind = %handle.kind, name = %handle.name(), error = %e, "fixture cleanup failed");
                errors.push(e);
            }
        }
        errors
    }
}

impl Drop for FixtureFactory {
    fn drop(&mut self) {
        let leaked = self.pending();
        if !leaked.is_empty() {
            tracing::warn!(
                suffix = self.suffix,
                count = leaked.len(),
                "fixture factory dropped with entities left in place"
            );
        }
        self.registry.release(self.suffix);
    }
}
