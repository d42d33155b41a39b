//! Realized containers and their recycling pool.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use horizon_grid_core::logging::targets;

/// Identity of a container over its whole life, across recycling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// What a container can hold. Containers of equal shape are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerShape {
    /// Rows per container.
    pub slots: usize,
}

/// A realized container wrapping `shape.slots` consecutive rows.
///
/// The renderer owns what goes in the element slot; the virtualizer only
/// keeps it alive across recycling so it can be rebound instead of rebuilt.
pub struct Container {
    id: ContainerId,
    ordinal: usize,
    shape: ContainerShape,
    element: Option<Box<dyn Any + Send>>,
}

impl Container {
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Position of the container in the sequence of containers.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn shape(&self) -> ContainerShape {
        self.shape
    }

    /// First row this container wraps.
    pub fn first_row(&self) -> usize {
        self.ordinal * self.shape.slots
    }

    pub fn element(&self) -> Option<&(dyn Any + Send)> {
        self.element.as_deref()
    }

    pub fn element_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        self.element.as_deref_mut()
    }

    /// Attach a renderer element, returning the one it replaces.
    pub fn attach_element(&mut self, element: Box<dyn Any + Send>) -> Option<Box<dyn Any + Send>> {
        self.element.replace(element)
    }

    pub fn detach_element(&mut self) -> Option<Box<dyn Any + Send>> {
        self.element.take()
    }

    pub(crate) fn bind(&mut self, ordinal: usize) {
        self.ordinal = ordinal;
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("ordinal", &self.ordinal)
            .field("slots", &self.shape.slots)
            .field("element", &self.element.is_some())
            .finish()
    }
}

/// Idle containers keyed by shape, bounded per shape.
#[derive(Debug)]
pub struct ContainerPool {
    capacity: usize,
    free: HashMap<ContainerShape, Vec<Container>>,
    next_id: u64,
    created: usize,
    recycled: usize,
}

impl ContainerPool {
    /// Create a pool keeping at most `capacity` idle containers per shape.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: HashMap::new(),
            next_id: 1,
            created: 0,
            recycled: 0,
        }
    }

    /// Take an idle container of `shape` bound to `ordinal`, or create one.
    pub fn acquire(&mut self, shape: ContainerShape, ordinal: usize) -> Container {
        if let Some(mut container) = self.free.get_mut(&shape).and_then(Vec::pop) {
            self.recycled += 1;
            container.bind(ordinal);
            tracing::trace!(target: targets::VIRTUALIZER, id = ?container.id, ordinal, "container recycled");
            return container;
        }
        let id = ContainerId(self.next_id);
        self.next_id += 1;
        self.created += 1;
        tracing::trace!(target: targets::VIRTUALIZER, ?id, ordinal, "container created");
        Container {
            id,
            ordinal,
            shape,
            element: None,
        }
    }

    /// Return a container. It is dropped if its shape's pool is full.
    pub fn release(&mut self, container: Container) {
        let free = self.free.entry(container.shape).or_default();
        if free.len() < self.capacity {
            free.push(container);
        } else {
            tracing::trace!(target: targets::VIRTUALIZER, id = ?container.id, "pool full, container dropped");
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Idle containers across all shapes.
    pub fn idle(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Containers created since the pool was made.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Acquisitions served from the idle list.
    pub fn recycled(&self) -> usize {
        self.recycled
    }
}
