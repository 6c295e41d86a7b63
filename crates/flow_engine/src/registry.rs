//! Flow registry
//!
//! Built once at start-up and read-only afterwards. Flows come either from an
//! explicit [`FlowRegistryBuilder`] or from `register_flow!` submissions
//! collected at link time.

use flow_state::FlowName;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::step::Step;

/// A named, ordered sequence of steps.
#[derive(Clone)]
pub struct FlowDef {
    name: FlowName,
    steps: Vec<Arc<dyn Step>>,
}

impl FlowDef {
    pub fn new(name: FlowName) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Append the next step.
    pub fn step<S: Step + 'static>(mut self, step: S) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn name(&self) -> &FlowName {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for FlowDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDef")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Flow registration information
pub struct FlowRegistration {
    /// Constructor function that builds the flow definition
    pub constructor: fn() -> FlowDef,
}

// Compile-time collection of all flow registrations
inventory::collect!(FlowRegistration);

/// Register a flow constructor with the link-time flow table.
///
/// ```ignore
/// fn flow() -> FlowDef {
///     FlowDef::new(FlowName::from_static("create_band")).step(ask_name).step(save)
/// }
/// flow_engine::register_flow!(flow);
/// ```
#[macro_export]
macro_rules! register_flow {
    ($constructor:path) => {
        $crate::inventory::submit! {
            $crate::registry::FlowRegistration {
                constructor: $constructor,
            }
        }
    };
}

/// Immutable mapping from flow name to steps.
pub struct FlowRegistry {
    flows: HashMap<FlowName, FlowDef>,
}

impl FlowRegistry {
    pub fn builder() -> FlowRegistryBuilder {
        FlowRegistryBuilder::default()
    }

    /// Registry of every flow submitted with `register_flow!`.
    pub fn from_inventory() -> Result<Self, RegistryError> {
        inventory::iter::<FlowRegistration>()
            .fold(Self::builder(), |builder, registration| {
                builder.flow((registration.constructor)())
            })
            .build()
    }

    /// Step at `(flow, step)`, or `None` when the flow is unknown or the
    /// index is out of bounds.
    pub fn resolve(&self, flow: &FlowName, step: i32) -> Option<Arc<dyn Step>> {
        let def = self.flows.get(flow)?;
        let index = usize::try_from(step).ok()?;
        def.steps.get(index).cloned()
    }

    pub fn contains(&self, flow: &FlowName) -> bool {
        self.flows.contains_key(flow)
    }

    /// Number of steps of `flow`, if registered.
    pub fn flow_len(&self, flow: &FlowName) -> Option<usize> {
        self.flows.get(flow).map(FlowDef::len)
    }

    /// Registered flow names, sorted.
    pub fn flow_names(&self) -> Vec<&FlowName> {
        let mut names: Vec<_> = self.flows.keys().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRegistry")
            .field("flows", &self.flow_names())
            .finish()
    }
}

#[derive(Default)]
pub struct FlowRegistryBuilder {
    flows: Vec<FlowDef>,
}

impl FlowRegistryBuilder {
    pub fn flow(mut self, flow: FlowDef) -> Self {
        self.flows.push(flow);
        self
    }

    pub fn build(self) -> Result<FlowRegistry, RegistryError> {
        let mut flows = HashMap::with_capacity(self.flows.len());
        for flow in self.flows {
            if flow.is_empty() {
                return Err(RegistryError::EmptyFlow(flow.name));
            }
            if flows.contains_key(&flow.name) {
                return Err(RegistryError::DuplicateFlow(flow.name));
            }
            flows.insert(flow.name.clone(), flow);
        }

        if !flows.contains_key(&FlowName::MAIN_MENU) {
            return Err(RegistryError::MissingDefault);
        }

        tracing::debug!(flows = flows.len(), "flow registry built");
        Ok(FlowRegistry { flows })
    }
}
