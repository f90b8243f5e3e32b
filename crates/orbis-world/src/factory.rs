//! Object factory: turns generator placement records into placed objects.

use std::collections::HashMap;

use glam::Vec2;
use orbis_common::{IdAllocator, ObjectTypeId};
use tracing::warn;

use crate::content::{ObjectVariant, PlacedObject, Placement};
use crate::generation::object_types;

/// Instantiates placed objects by type id.
///
/// Implemented by the content layer; the streaming core only ever hands it
/// placement records.
pub trait ObjectFactory: Send + Sync {
    /// Builds the object for `placement` in a chunk whose top-left corner is
    /// `origin`. Returns `None` for unknown types.
    fn instantiate(
        &self,
        placement: &Placement,
        origin: Vec2,
        ids: &IdAllocator,
    ) -> Option<PlacedObject>;
}

/// Shape of objects built from a template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemplateShape {
    /// Plain terrain object
    Terrain,
    /// Light emitter
    Light {
        /// Light radius in world units
        radius: f32,
        /// Light intensity (0.0-1.0)
        intensity: f32,
    },
    /// Container whose children come from the placement's children
    Composite,
}

/// Registered description of an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTemplate {
    /// Display name (for logs and debug tools)
    pub name: String,
    /// Footprint size in world units
    pub size: Vec2,
    /// Behaviour
    pub shape: TemplateShape,
}

impl ObjectTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(name: impl Into<String>, size: Vec2, shape: TemplateShape) -> Self {
        Self {
            name: name.into(),
            size,
            shape,
        }
    }
}

/// Table-driven factory.
#[derive(Debug, Default)]
pub struct TemplateFactory {
    templates: HashMap<ObjectTypeId, ObjectTemplate>,
}

impl TemplateFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that knows every type the built-in generators emit.
    #[must_use]
    pub fn standard() -> Self {
        let mut factory = Self::new();
        factory.register(
            object_types::TREE,
            ObjectTemplate::new("tree", Vec2::new(8.0, 24.0), TemplateShape::Terrain),
        );
        factory.register(
            object_types::ROCK,
            ObjectTemplate::new("rock", Vec2::new(6.0, 4.0), TemplateShape::Terrain),
        );
        factory.register(
            object_types::CRYSTAL,
            ObjectTemplate::new(
                "crystal",
                Vec2::new(4.0, 4.0),
                TemplateShape::Light {
                    radius: 48.0,
                    intensity: 0.6,
                },
            ),
        );
        factory.register(
            object_types::STAR_SYSTEM,
            ObjectTemplate::new("star system", Vec2::splat(64.0), TemplateShape::Composite),
        );
        factory.register(
            object_types::STAR,
            ObjectTemplate::new(
                "star",
                Vec2::splat(48.0),
                TemplateShape::Light {
                    radius: 1024.0,
                    intensity: 1.0,
                },
            ),
        );
        factory.register(
            object_types::PLANET,
            ObjectTemplate::new("planet", Vec2::splat(16.0), TemplateShape::Terrain),
        );
        factory
    }

    /// Registers (or replaces) a template.
    pub fn register(&mut self, type_id: ObjectTypeId, template: ObjectTemplate) {
        self.templates.insert(type_id, template);
    }

    /// Looks up a template.
    #[must_use]
    pub fn template(&self, type_id: ObjectTypeId) -> Option<&ObjectTemplate> {
        self.templates.get(&type_id)
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if no template is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl ObjectFactory for TemplateFactory {
    fn instantiate(
        &self,
        placement: &Placement,
        origin: Vec2,
        ids: &IdAllocator,
    ) -> Option<PlacedObject> {
        let Some(template) = self.templates.get(&placement.type_id) else {
            warn!("No template for object type {}", placement.type_id.raw());
            return None;
        };

        let variant = match template.shape {
            TemplateShape::Terrain => ObjectVariant::Terrain,
            TemplateShape::Light { radius, intensity } => ObjectVariant::Light { radius, intensity },
            TemplateShape::Composite => ObjectVariant::Composite {
                children: placement
                    .children
                    .iter()
                    .filter_map(|child| self.instantiate(child, origin, ids))
                    .collect(),
            },
        };

        Some(PlacedObject {
            id: ids.next_object(),
            type_id: placement.type_id,
            position: origin + placement.local_position,
            size: template.size,
            variant,
        })
    }
}
