//! Diagram layers: entities (boxes with attributes) and relations between them.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a layer, unique across all collaborators.
pub type LayerId = String;

/// Generate a fresh layer or attribute id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Kind of layer, used by the insert tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Entity,
    Relation,
}

/// A single column/field of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub pk: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            data_type: data_type.into(),
            required: false,
            pk: false,
        }
    }

    /// Primary key column: required and flagged `pk`.
    pub fn primary_key(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            required: true,
            pk: true,
            ..Self::new(name, data_type)
        }
    }

    pub fn apply(&mut self, patch: &AttributePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(data_type) = &patch.data_type {
            self.data_type = data_type.clone();
        }
        if let Some(required) = patch.required {
            self.required = required;
        }
        if let Some(pk) = patch.pk {
            self.pk = pk;
        }
    }
}

/// Partial update of an [`Attribute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributePatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub required: Option<bool>,
    pub pk: Option<bool>,
}

/// A class/table box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLayer {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    100.0
}

/// Name given to entities created with the insert tool.
pub const DEFAULT_ENTITY_NAME: &str = "NuevaEntidad";

impl EntityLayer {
    /// The entity the insert tool drops at `origin`: an `id` primary key and a
    /// `nombre` column.
    pub fn with_defaults(origin: Point, width: f64, height: f64) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width,
            height,
            name: DEFAULT_ENTITY_NAME.to_string(),
            attributes: vec![
                Attribute::primary_key("id", "long"),
                Attribute::new("nombre", "string"),
            ],
            opacity: default_opacity(),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn apply(&mut self, patch: &EntityPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(attributes) = &patch.attributes {
            self.attributes = attributes.clone();
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
    }
}

/// Partial update of an [`EntityLayer`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub name: Option<String>,
    pub attributes: Option<Vec<Attribute>>,
    pub opacity: Option<f64>,
}

impl EntityPatch {
    pub fn position(p: Point) -> Self {
        Self {
            x: Some(p.x),
            y: Some(p.y),
            ..Default::default()
        }
    }

    pub fn bounds(r: Rect) -> Self {
        Self {
            x: Some(r.x0),
            y: Some(r.y0),
            width: Some(r.width()),
            height: Some(r.height()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// UML relationship kind drawn between two entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    #[default]
    Association,
    Aggregation,
    Composition,
    Generalization,
    Realization,
    Dependency,
}

impl RelationType {
    pub const ALL: [RelationType; 6] = [
        RelationType::Association,
        RelationType::Aggregation,
        RelationType::Composition,
        RelationType::Generalization,
        RelationType::Realization,
        RelationType::Dependency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::Association => "association",
            RelationType::Aggregation => "aggregation",
            RelationType::Composition => "composition",
            RelationType::Generalization => "generalization",
            RelationType::Realization => "realization",
            RelationType::Dependency => "dependency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Multiplicity of one end of a relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::One => "ONE",
            Cardinality::Many => "MANY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ONE" => Some(Cardinality::One),
            "MANY" => Some(Cardinality::Many),
            _ => None,
        }
    }
}

/// Which end of a relation holds the foreign key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwningSide {
    Source,
    #[default]
    Target,
}

impl OwningSide {
    pub fn as_str(self) -> &'static str {
        match self {
            OwningSide::Source => "source",
            OwningSide::Target => "target",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "source" => Some(OwningSide::Source),
            "target" => Some(OwningSide::Target),
            _ => None,
        }
    }
}

/// A typed edge between two entities. Endpoints are weak references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationLayer {
    pub source_id: LayerId,
    pub target_id: LayerId,
    #[serde(default)]
    pub relation_type: RelationType,
    #[serde(default)]
    pub source_card: Cardinality,
    #[serde(default)]
    pub target_card: Cardinality,
    #[serde(default)]
    pub owning_side: OwningSide,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl RelationLayer {
    /// A ONE-to-ONE relation owned by the target side.
    pub fn new(source_id: impl Into<LayerId>, target_id: impl Into<LayerId>, relation_type: RelationType) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type,
            source_card: Cardinality::One,
            target_card: Cardinality::One,
            owning_side: OwningSide::Target,
            opacity: default_opacity(),
        }
    }

    pub fn references(&self, id: &str) -> bool {
        self.source_id == id || self.target_id == id
    }

    pub fn apply(&mut self, patch: &RelationPatch) {
        if let Some(source_id) = &patch.source_id {
            self.source_id = source_id.clone();
        }
        if let Some(target_id) = &patch.target_id {
            self.target_id = target_id.clone();
        }
        if let Some(relation_type) = patch.relation_type {
            self.relation_type = relation_type;
        }
        if let Some(card) = patch.source_card {
            self.source_card = card;
        }
        if let Some(card) = patch.target_card {
            self.target_card = card;
        }
        if let Some(side) = patch.owning_side {
            self.owning_side = side;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
    }
}

/// Partial update of a [`RelationLayer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelationPatch {
    pub source_id: Option<LayerId>,
    pub target_id: Option<LayerId>,
    pub relation_type: Option<RelationType>,
    pub source_card: Option<Cardinality>,
    pub target_card: Option<Cardinality>,
    pub owning_side: Option<OwningSide>,
    pub opacity: Option<f64>,
}

/// A diagram element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Entity(EntityLayer),
    Relation(RelationLayer),
}

/// Partial update for either layer kind.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerPatch {
    Entity(EntityPatch),
    Relation(RelationPatch),
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Entity(_) => LayerType::Entity,
            Layer::Relation(_) => LayerType::Relation,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityLayer> {
        match self {
            Layer::Entity(e) => Some(e),
            Layer::Relation(_) => None,
        }
    }

    pub fn as_relation(&self) -> Option<&RelationLayer> {
        match self {
            Layer::Relation(r) => Some(r),
            Layer::Entity(_) => None,
        }
    }

    /// Standalone bounds. Relations derive theirs from their endpoints, so
    /// they have none.
    pub fn bounds(&self) -> Option<Rect> {
        self.as_entity().map(EntityLayer::bounds)
    }

    /// Apply a patch of the matching kind. Returns `false` on kind mismatch.
    pub fn apply(&mut self, patch: &LayerPatch) -> bool {
        match (self, patch) {
            (Layer::Entity(e), LayerPatch::Entity(p)) => {
                e.apply(p);
                true
            }
            (Layer::Relation(r), LayerPatch::Relation(p)) => {
                r.apply(p);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_entity() {
        let e = EntityLayer::with_defaults(Point::new(100.0, 100.0), 240.0, 140.0);
        assert_eq!(e.name, "NuevaEntidad");
        assert_eq!(e.attributes.len(), 2);
        assert!(e.attributes[0].pk && e.attributes[0].required);
        assert_eq!(e.attributes[0].data_type, "long");
        assert_eq!(e.attributes[1].name, "nombre");
        assert!(!e.attributes[1].pk);
        assert_ne!(e.attributes[0].id, e.attributes[1].id);
    }

    #[test]
    fn test_relation_wire_format() {
        let layer = Layer::Relation(RelationLayer::new("a", "b", RelationType::Composition));
        let value = serde_json::to_value(&layer).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "relation",
                "sourceId": "a",
                "targetId": "b",
                "relationType": "composition",
                "sourceCard": "ONE",
                "targetCard": "ONE",
                "owningSide": "target",
                "opacity": 100.0,
            })
        );
    }

    #[test]
    fn test_entity_parses_with_missing_optionals() {
        let layer: Layer = serde_json::from_value(json!({
            "type": "entity",
            "x": 1, "y": 2, "width": 3, "height": 4,
            "name": "Cliente",
            "attributes": [{"id": "a1", "name": "id", "type": "long"}],
        }))
        .unwrap();
        let e = layer.as_entity().unwrap();
        assert!((e.opacity - 100.0).abs() < f64::EPSILON);
        assert!(!e.attributes[0].pk);
    }

    #[test]
    fn test_patch_kind_mismatch() {
        let mut layer = Layer::Relation(RelationLayer::new("a", "b", RelationType::Association));
        assert!(!layer.apply(&LayerPatch::Entity(EntityPatch::position(Point::ORIGIN))));
        assert!(layer.apply(&LayerPatch::Relation(RelationPatch {
            target_card: Some(Cardinality::Many),
            ..Default::default()
        })));
        assert_eq!(layer.as_relation().unwrap().target_card, Cardinality::Many);
    }

    #[test]
    fn test_relation_type_parse() {
        for t in RelationType::ALL {
            assert_eq!(RelationType::parse(t.as_str()), Some(t));
        }
        assert_eq!(RelationType::parse("inheritance"), None);
    }
}
