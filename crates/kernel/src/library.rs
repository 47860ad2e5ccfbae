//! Component type registry.
//!
//! This module maps stable type GUIDs to factories producing live elements.
//! It provides:
//! 1. **Registration:** `register` with duplicate-GUID detection (a fatal configuration error).
//! 2. **Instantiation:** GUID lookup plus factory delegation with merged metadata defaults.
//! 3. **Builtins:** The standard gate set, the interconnect, and the compound composite.
//!
//! The registry is an explicitly constructed object handed to the controller
//! at startup; there is no global state. Its lifetime is the controller's.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Value, json};

use crate::common::{ElementId, Guid, IdAllocator, KernelError};
use crate::element::{
    CompoundElement, Element, InputOutputBank, Interconnect, LogicKind, Metadata, SimpleElement,
};

/// GUID of the fan-out interconnect type.
pub const INTERCONNECT_GUID: &str = "wire.interconnect";

/// GUID of the hierarchical compound type.
pub const COMPOUND_GUID: &str = "compound.element";

/// GUID of the internal indirection bank type.
///
/// Banks are created by the compound factory, never instantiated directly,
/// and skipped during serialization.
pub const BANK_GUID: &str = "compound.bank";

/// Arguments handed to a component factory.
pub struct FactoryContext<'a> {
    /// Id assigned to the principal element.
    pub id: ElementId,
    /// Owning parent (compound id or the controller root).
    pub parent: ElementId,
    /// Effective metadata: type defaults overlaid with the command's map.
    pub metadata: &'a Metadata,
    /// Allocator for any auxiliary elements the factory creates.
    pub ids: &'a mut IdAllocator,
}

type Factory = Box<dyn Fn(&mut FactoryContext<'_>) -> Vec<Box<dyn Element>> + Send>;

/// A registry entry: GUID, metadata defaults, and the element factory.
///
/// The factory returns the principal element first, followed by any
/// auxiliary elements it created (e.g. a compound's banks).
pub struct ComponentType {
    guid: Guid,
    metadata_defaults: Metadata,
    factory: Factory,
}

impl ComponentType {
    /// Creates a registry entry.
    pub fn new(
        guid: impl Into<String>,
        metadata_defaults: Metadata,
        factory: impl Fn(&mut FactoryContext<'_>) -> Vec<Box<dyn Element>> + Send + 'static,
    ) -> Self {
        Self {
            guid: Guid::new(guid),
            metadata_defaults,
            factory: Box::new(factory),
        }
    }

    /// Returns the type's GUID.
    pub const fn guid(&self) -> &Guid {
        &self.guid
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("guid", &self.guid)
            .field("metadata_defaults", &self.metadata_defaults)
            .finish_non_exhaustive()
    }
}

/// Registry of component types plus the element id allocator.
#[derive(Debug)]
pub struct ComponentLibrary {
    types: HashMap<Guid, ComponentType>,
    ids: IdAllocator,
}

impl ComponentLibrary {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            ids: IdAllocator::new(),
        }
    }

    /// Creates a registry pre-populated with the builtin types: the
    /// standard gates (`gate.and`, `gate.or`, `gate.xor`, `gate.nand`,
    /// `gate.nor`, `gate.not`), the interconnect, and the compound.
    pub fn with_builtins() -> Self {
        let mut lib = Self::new();
        for logic in [
            LogicKind::And,
            LogicKind::Or,
            LogicKind::Xor,
            LogicKind::Nand,
            LogicKind::Nor,
            LogicKind::Not,
        ] {
            lib.register(gate_type(logic));
        }
        lib.register(interconnect_type());
        lib.register(compound_type());
        lib
    }

    /// Registers a component type.
    ///
    /// # Panics
    ///
    /// Panics if the GUID is already registered. Duplicate GUIDs are a
    /// fatal configuration error.
    pub fn register(&mut self, component_type: ComponentType) {
        let guid = component_type.guid.clone();
        let previous = self.types.insert(guid.clone(), component_type);
        assert!(previous.is_none(), "duplicate component type GUID: {guid}");
    }

    /// Returns whether a GUID is registered.
    pub fn knows(&self, guid: &Guid) -> bool {
        self.types.contains_key(guid)
    }

    /// Instantiates a component by GUID.
    ///
    /// The returned vector holds the principal element first, then any
    /// auxiliary elements (e.g. compound banks). `id` is an optional
    /// externally proposed id; omitted ids are allocated.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownComponentType`] if the GUID is absent.
    pub fn instantiate(
        &mut self,
        guid: &Guid,
        id: Option<ElementId>,
        parent: ElementId,
        metadata: &Metadata,
    ) -> Result<Vec<Box<dyn Element>>, KernelError> {
        let entry = self
            .types
            .get(guid)
            .ok_or_else(|| KernelError::UnknownComponentType { guid: guid.clone() })?;

        let mut effective = entry.metadata_defaults.clone();
        for (key, value) in metadata {
            let _ = effective.insert(key.clone(), value.clone());
        }

        let id = match id {
            Some(proposed) => {
                self.ids.reserve(proposed);
                proposed
            }
            None => self.ids.allocate(),
        };

        let mut ctx = FactoryContext {
            id,
            parent,
            metadata: &effective,
            ids: &mut self.ids,
        };
        Ok((entry.factory)(&mut ctx))
    }

    /// Returns `(GUID, metadata defaults)` for every registered type.
    pub fn enumerate(&self) -> Vec<(Guid, Metadata)> {
        let mut entries: Vec<_> = self
            .types
            .values()
            .map(|t| (t.guid.clone(), t.metadata_defaults.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        entries
    }
}

impl Default for ComponentLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn meta_u64(metadata: &Metadata, key: &str) -> Option<u64> {
    metadata.get(key).and_then(Value::as_u64)
}

fn meta_bools(metadata: &Metadata, key: &str) -> Vec<bool> {
    metadata
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_bool).collect())
        .unwrap_or_default()
}

fn gate_type(logic: LogicKind) -> ComponentType {
    let default_inputs = if logic == LogicKind::Not { 1 } else { 2 };
    let mut defaults = Metadata::new();
    let _ = defaults.insert("inputs".into(), json!(default_inputs));
    let _ = defaults.insert("delay".into(), json!(1));

    ComponentType::new(format!("gate.{}", logic.name()), defaults, move |ctx| {
        let inputs = meta_u64(ctx.metadata, "inputs").unwrap_or(default_inputs) as usize;
        let delay = meta_u64(ctx.metadata, "delay").unwrap_or(1);
        let mut gate = SimpleElement::new(
            ctx.id,
            ctx.parent,
            Guid::new(format!("gate.{}", logic.name())),
            logic,
            inputs.max(1),
            delay,
        );
        gate.restore_states(
            &meta_bools(ctx.metadata, "input-states"),
            &meta_bools(ctx.metadata, "output-states"),
        );
        vec![Box::new(gate)]
    })
}

fn interconnect_type() -> ComponentType {
    ComponentType::new(INTERCONNECT_GUID, Metadata::new(), |ctx| {
        let mut wire = Interconnect::new(ctx.id, ctx.parent, Guid::new(INTERCONNECT_GUID));
        if let Some(state) = ctx.metadata.get("state").and_then(Value::as_bool) {
            wire.restore_state(state);
        }
        vec![Box::new(wire)]
    })
}

fn compound_type() -> ComponentType {
    ComponentType::new(COMPOUND_GUID, Metadata::new(), |ctx| {
        let input_bank = ctx.ids.allocate();
        let output_bank = ctx.ids.allocate();
        let shell = CompoundElement::new(
            ctx.id,
            ctx.parent,
            Guid::new(COMPOUND_GUID),
            input_bank,
            output_bank,
        );
        vec![
            Box::new(shell),
            Box::new(InputOutputBank::new(input_bank, ctx.id, Guid::new(BANK_GUID))),
            Box::new(InputOutputBank::new(output_bank, ctx.id, Guid::new(BANK_GUID))),
        ]
    })
}
