//! Fixed-point overlay composition.
//!
//! An overlay is an ordered set of patches to individual package
//! definitions. Composing a stack of overlays is open recursion: each
//! patch sees `self` (the final composed set, via [`Fix`]) and `super`
//! (the composition of the layers strictly before it, via [`Below`]).
//! `self` is not known until every layer has been applied, so forcing it
//! is lazy and memoized per name, with a per-run "currently resolving"
//! marker that turns genuine self-dependency into a
//! [`CircularOverride`](wheelhouse_util::errors::WheelhouseError::CircularOverride)
//! instead of non-termination.
//!
//! Precedence: later layers win; an explicit removal hides every earlier
//! definition of that name, and only a strictly later layer can bring the
//! name back. Patching a name no earlier layer defines is legal and
//! creates a synthetic addition.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use wheelhouse_core::{PackageDefinition, PackageName};
use wheelhouse_util::errors::{WheelhouseError, WheelhouseResult};

/// The resolved output of a composition.
pub type ResolvedSet = BTreeMap<PackageName, PackageDefinition>;

/// A patch function: receives the lazy final set and the view of the
/// layers below, produces the package's definition.
pub type DefineFn = Box<dyn Fn(&Fix<'_>, &Below<'_>) -> WheelhouseResult<PackageDefinition>>;

enum Patch {
    Define(DefineFn),
    /// Explicit null: the name is absent from this layer's output.
    Remove,
}

/// One override layer: an ordered mapping of package names to patches.
#[derive(Default)]
pub struct Overlay {
    patches: BTreeMap<PackageName, Patch>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch a name with a function of (`self`, `super`).
    pub fn define<F>(mut self, name: PackageName, f: F) -> Self
    where
        F: Fn(&Fix<'_>, &Below<'_>) -> WheelhouseResult<PackageDefinition> + 'static,
    {
        self.patches.insert(name, Patch::Define(Box::new(f)));
        self
    }

    /// Patch a name with a constant definition.
    pub fn set(self, name: PackageName, def: PackageDefinition) -> Self {
        self.define(name, move |_, _| Ok(def.clone()))
    }

    /// Null a name out: absent from the composition unless a later layer
    /// redefines it.
    pub fn remove(mut self, name: PackageName) -> Self {
        self.patches.insert(name, Patch::Remove);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// The names this layer mentions.
    pub fn names(&self) -> impl Iterator<Item = &PackageName> {
        self.patches.keys()
    }
}

/// An ordered stack of overlays, composed bottom-up: the first layer is
/// the base, each following layer sees the ones before it as `super`.
#[derive(Default)]
pub struct OverlayStack {
    layers: Vec<Overlay>,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_layers(layers: Vec<Overlay>) -> Self {
        Self { layers }
    }

    /// Add a layer on top: it wins over everything already in the stack
    /// and sees the existing composition as `super`.
    pub fn extend(mut self, overlay: Overlay) -> Self {
        self.layers.push(overlay);
        self
    }

    /// Insert a layer at the bottom of the stack, below every existing
    /// layer.
    pub fn prepend(mut self, overlay: Overlay) -> Self {
        self.layers.insert(0, overlay);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Compose the stack into a resolved set.
    ///
    /// Every composition runs with fresh per-run state; nothing is shared
    /// between calls, so concurrent resolutions on separate stacks cannot
    /// observe each other or false-positive on cycle detection.
    pub fn compose(&self) -> WheelhouseResult<ResolvedSet> {
        let composer = Composer {
            layers: &self.layers,
            slots: RefCell::new(HashMap::new()),
        };

        // The final set's domain is the union of every layer's patched
        // names, walked in layer order for deterministic forcing order.
        let mut names: Vec<&PackageName> = Vec::new();
        let mut seen: HashSet<&PackageName> = HashSet::new();
        for layer in &self.layers {
            for name in layer.names() {
                if seen.insert(name) {
                    names.push(name);
                }
            }
        }

        let mut resolved = ResolvedSet::new();
        for name in names {
            if let Some(def) = composer.eval(name)? {
                resolved.insert(name.clone(), def);
            }
        }
        tracing::debug!(packages = resolved.len(), layers = self.layers.len(), "composed overlay stack");
        Ok(resolved)
    }
}

enum Slot {
    InProgress,
    Done(Option<PackageDefinition>),
}

/// Per-run composition state: the lazy memoization table.
struct Composer<'a> {
    layers: &'a [Overlay],
    slots: RefCell<HashMap<PackageName, Slot>>,
}

impl<'a> Composer<'a> {
    /// Force the final definition of `name`, memoized exactly once.
    fn eval(&self, name: &PackageName) -> WheelhouseResult<Option<PackageDefinition>> {
        match self.slots.borrow().get(name) {
            Some(Slot::Done(def)) => return Ok(def.clone()),
            Some(Slot::InProgress) => {
                return Err(WheelhouseError::CircularOverride {
                    name: name.to_string(),
                })
            }
            None => {}
        }

        self.slots
            .borrow_mut()
            .insert(name.clone(), Slot::InProgress);
        tracing::trace!(package = %name, "forcing definition");
        let result = self.eval_below(self.layers.len(), name);
        match &result {
            Ok(def) => {
                self.slots
                    .borrow_mut()
                    .insert(name.clone(), Slot::Done(def.clone()));
            }
            Err(_) => {
                self.slots.borrow_mut().remove(name);
            }
        }
        result
    }

    /// Evaluate `name` as composed by the layers strictly before
    /// `layer_end`. The topmost patch decides; a patch function still
    /// sees `self` as the full composition.
    fn eval_below(
        &self,
        layer_end: usize,
        name: &PackageName,
    ) -> WheelhouseResult<Option<PackageDefinition>> {
        for i in (0..layer_end).rev() {
            match self.layers[i].patches.get(name) {
                None => continue,
                Some(Patch::Remove) => return Ok(None),
                Some(Patch::Define(f)) => {
                    let fix = Fix { composer: self };
                    let below = Below {
                        composer: self,
                        layer: i,
                        name: name.clone(),
                    };
                    return f(&fix, &below).map(Some);
                }
            }
        }
        Ok(None)
    }
}

/// Lazy handle onto the final composed set (`self` in overlay terms).
///
/// Looking a name up forces and memoizes its final definition; forcing a
/// name that is currently being forced is a circular override.
pub struct Fix<'a> {
    composer: &'a Composer<'a>,
}

impl Fix<'_> {
    /// The final definition of `name`, or `None` if the composition does
    /// not produce it.
    pub fn get(&self, name: &PackageName) -> WheelhouseResult<Option<PackageDefinition>> {
        self.composer.eval(name)
    }
}

/// View of the composition of the layers strictly below the patch being
/// evaluated (`super` in overlay terms).
pub struct Below<'a> {
    composer: &'a Composer<'a>,
    layer: usize,
    name: PackageName,
}

impl Below<'_> {
    /// The previous definition of the name being patched.
    pub fn this(&self) -> WheelhouseResult<Option<PackageDefinition>> {
        self.composer.eval_below(self.layer, &self.name)
    }

    /// The previous definition of any name.
    pub fn get(&self, name: &PackageName) -> WheelhouseResult<Option<PackageDefinition>> {
        self.composer.eval_below(self.layer, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use wheelhouse_core::PackageSource;

    fn def(name: &str, version: &str) -> PackageDefinition {
        PackageDefinition::new(PackageName::new(name), version, PackageSource::default())
    }

    fn name(s: &str) -> PackageName {
        PackageName::new(s)
    }

    #[test]
    fn later_layer_wins() {
        let stack = OverlayStack::new()
            .extend(Overlay::new().set(name("a"), def("a", "1.0")))
            .extend(Overlay::new().set(name("a"), def("a", "2.0")));
        let resolved = stack.compose().unwrap();
        assert_eq!(resolved[&name("a")].version, "2.0");
    }

    #[test]
    fn untouched_names_fall_through() {
        let stack = OverlayStack::new()
            .extend(
                Overlay::new()
                    .set(name("a"), def("a", "1.0"))
                    .set(name("b"), def("b", "1.0")),
            )
            .extend(Overlay::new().set(name("a"), def("a", "2.0")));
        let resolved = stack.compose().unwrap();
        assert_eq!(resolved[&name("a")].version, "2.0");
        assert_eq!(resolved[&name("b")].version, "1.0");
    }

    #[test]
    fn prepend_inserts_below_existing_layers() {
        let stack = OverlayStack::new()
            .extend(Overlay::new().set(name("a"), def("a", "2.0")))
            .prepend(
                Overlay::new()
                    .set(name("a"), def("a", "1.0"))
                    .set(name("base-only"), def("base-only", "1.0")),
            );
        let resolved = stack.compose().unwrap();
        assert_eq!(resolved[&name("a")].version, "2.0");
        assert_eq!(resolved[&name("base-only")].version, "1.0");
    }

    #[test]
    fn explicit_null_removes() {
        let stack = OverlayStack::new()
            .extend(Overlay::new().set(name("a"), def("a", "1.0")))
            .extend(Overlay::new().remove(name("a")));
        let resolved = stack.compose().unwrap();
        assert!(!resolved.contains_key(&name("a")));
    }

    #[test]
    fn later_layer_resurrects_after_null() {
        let stack = OverlayStack::new()
            .extend(Overlay::new().set(name("a"), def("a", "1.0")))
            .extend(Overlay::new().remove(name("a")))
            .extend(Overlay::new().set(name("a"), def("a", "3.0")));
        let resolved = stack.compose().unwrap();
        assert_eq!(resolved[&name("a")].version, "3.0");
    }

    #[test]
    fn super_sees_layers_below() {
        let stack = OverlayStack::new()
            .extend(Overlay::new().set(name("a"), def("a", "1.0")))
            .extend(Overlay::new().define(name("a"), |_, below| {
                let mut prev = below.this()?.expect("a defined below");
                prev.version.push_str("-patched");
                Ok(prev)
            }));
        let resolved = stack.compose().unwrap();
        assert_eq!(resolved[&name("a")].version, "1.0-patched");
    }

    #[test]
    fn self_reference_reaches_final_definition() {
        // b's patch reads a through self; a is overridden by a *later*
        // layer, and b must see that final version.
        let stack = OverlayStack::new()
            .extend(
                Overlay::new()
                    .set(name("a"), def("a", "1.0"))
                    .set(name("b"), def("b", "1.0")),
            )
            .extend(Overlay::new().define(name("b"), |fix, below| {
                let a = fix.get(&name("a"))?.expect("a resolves");
                let mut b = below.this()?.expect("b defined below");
                b.attrs
                    .insert("a-version".into(), serde_json::json!(a.version));
                Ok(b)
            }))
            .extend(Overlay::new().set(name("a"), def("a", "9.9")));
        let resolved = stack.compose().unwrap();
        assert_eq!(resolved[&name("b")].attrs["a-version"], serde_json::json!("9.9"));
    }

    #[test]
    fn self_reference_to_untouched_name_gets_base_definition() {
        let stack = OverlayStack::new()
            .extend(
                Overlay::new()
                    .set(name("c"), def("c", "1.0"))
                    .set(name("y"), def("y", "5.0")),
            )
            .extend(Overlay::new().define(name("c"), |fix, below| {
                let mut c = below.this()?.expect("c defined below");
                let y = fix.get(&name("y"))?.expect("y resolves");
                c.build_inputs.push(y.name.clone());
                Ok(c)
            }));
        let resolved = stack.compose().unwrap();
        assert_eq!(resolved[&name("c")].build_inputs, vec![name("y")]);
        assert_eq!(resolved[&name("y")].version, "5.0");
    }

    #[test]
    fn self_reference_to_own_name_is_circular() {
        let stack = OverlayStack::new().extend(Overlay::new().define(name("c"), |fix, _| {
            // No alternate base: forcing self["c"] while defining c
            let c = fix.get(&name("c"))?;
            Ok(c.unwrap())
        }));
        let err = stack.compose().unwrap_err();
        assert!(matches!(err, WheelhouseError::CircularOverride { name } if name == "c"));
    }

    #[test]
    fn mutual_self_references_are_circular() {
        let stack = OverlayStack::new().extend(
            Overlay::new()
                .define(name("a"), |fix, _| Ok(fix.get(&name("b"))?.unwrap()))
                .define(name("b"), |fix, _| Ok(fix.get(&name("a"))?.unwrap())),
        );
        assert!(matches!(
            stack.compose().unwrap_err(),
            WheelhouseError::CircularOverride { .. }
        ));
    }

    #[test]
    fn definitions_force_at_most_once() {
        let count = Rc::new(Cell::new(0u32));
        let counter = count.clone();
        let stack = OverlayStack::new()
            .extend(Overlay::new().define(name("shared"), move |_, _| {
                counter.set(counter.get() + 1);
                Ok(def("shared", "1.0"))
            }))
            .extend(
                Overlay::new()
                    .define(name("a"), |fix, _| {
                        fix.get(&name("shared"))?;
                        Ok(def("a", "1.0"))
                    })
                    .define(name("b"), |fix, _| {
                        fix.get(&name("shared"))?;
                        Ok(def("b", "1.0"))
                    }),
            );
        stack.compose().unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn patching_an_unknown_name_is_a_synthetic_addition() {
        let stack = OverlayStack::new()
            .extend(Overlay::new().set(name("a"), def("a", "1.0")))
            .extend(Overlay::new().define(name("injected"), |_, below| {
                assert!(below.this()?.is_none());
                Ok(PackageDefinition::synthetic(name("injected"), "0"))
            }));
        let resolved = stack.compose().unwrap();
        assert!(resolved[&name("injected")].synthetic);
    }

    #[test]
    fn runs_do_not_share_state() {
        // Composing the same stack twice re-forces definitions: the memo
        // table is per run.
        let count = Rc::new(Cell::new(0u32));
        let counter = count.clone();
        let stack = OverlayStack::new().extend(Overlay::new().define(name("a"), move |_, _| {
            counter.set(counter.get() + 1);
            Ok(def("a", "1.0"))
        }));
        stack.compose().unwrap();
        stack.compose().unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn extend_then_compose_equals_two_step_composition() {
        let base = || {
            Overlay::new()
                .set(name("a"), def("a", "1.0"))
                .set(name("b"), def("b", "1.0"))
        };
        let extra = || Overlay::new().set(name("b"), def("b", "2.0"));

        let once = OverlayStack::new().extend(base()).extend(extra()).compose().unwrap();

        let two_step = OverlayStack::from_layers(vec![base()])
            .extend(extra())
            .compose()
            .unwrap();

        assert_eq!(once.len(), two_step.len());
        for (name, def) in &once {
            assert_eq!(def.version, two_step[name].version);
        }
    }
}
