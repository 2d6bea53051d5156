//! Conversion between layers and Loro values.

use loro::{LoroList, LoroMap, LoroMapValue, LoroResult, LoroValue, ValueOrContainer};

use crate::layer::{
    Attribute, Cardinality, EntityLayer, EntityPatch, Layer, LayerPatch, LayerType, OwningSide,
    RelationLayer, RelationPatch, RelationType,
};

// Layer type identifiers
const TYPE_ENTITY: &str = "entity";
const TYPE_RELATION: &str = "relation";

// Common keys
const KEY_TYPE: &str = "type";
const KEY_OPACITY: &str = "opacity";

// Entity keys
const KEY_X: &str = "x";
const KEY_Y: &str = "y";
const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";
const KEY_NAME: &str = "name";
const KEY_ATTRIBUTES: &str = "attributes";

// Attribute keys
const KEY_ID: &str = "id";
const KEY_DATA_TYPE: &str = "type";
const KEY_REQUIRED: &str = "required";
const KEY_PK: &str = "pk";

// Relation keys
const KEY_SOURCE_ID: &str = "sourceId";
const KEY_TARGET_ID: &str = "targetId";
const KEY_RELATION_TYPE: &str = "relationType";
const KEY_SOURCE_CARD: &str = "sourceCard";
const KEY_TARGET_CARD: &str = "targetCard";
const KEY_OWNING_SIDE: &str = "owningSide";

fn get_double(map: &LoroMapValue, key: &str) -> Option<f64> {
    match map.get(key)? {
        LoroValue::Double(d) => Some(*d),
        LoroValue::I64(i) => Some(*i as f64),
        _ => None,
    }
}

fn get_string(map: &LoroMapValue, key: &str) -> Option<String> {
    match map.get(key)? {
        LoroValue::String(s) => Some(s.to_string()),
        _ => None,
    }
}

fn get_bool(map: &LoroMapValue, key: &str) -> Option<bool> {
    match map.get(key)? {
        LoroValue::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Read the kind of a live layer map without materializing it.
pub fn layer_type_of(map: &LoroMap) -> Option<LayerType> {
    match map.get(KEY_TYPE)? {
        ValueOrContainer::Value(LoroValue::String(s)) => match s.to_string().as_str() {
            TYPE_ENTITY => Some(LayerType::Entity),
            TYPE_RELATION => Some(LayerType::Relation),
            _ => None,
        },
        _ => None,
    }
}

/// Write a layer into an empty Loro map.
pub fn layer_to_loro(layer: &Layer, map: &LoroMap) -> LoroResult<()> {
    match layer {
        Layer::Entity(e) => {
            map.insert(KEY_TYPE, TYPE_ENTITY)?;
            map.insert(KEY_X, e.x)?;
            map.insert(KEY_Y, e.y)?;
            map.insert(KEY_WIDTH, e.width)?;
            map.insert(KEY_HEIGHT, e.height)?;
            map.insert(KEY_NAME, e.name.as_str())?;
            map.insert(KEY_OPACITY, e.opacity)?;
            attributes_to_loro(&e.attributes, map)?;
        }
        Layer::Relation(r) => {
            map.insert(KEY_TYPE, TYPE_RELATION)?;
            map.insert(KEY_SOURCE_ID, r.source_id.as_str())?;
            map.insert(KEY_TARGET_ID, r.target_id.as_str())?;
            map.insert(KEY_RELATION_TYPE, r.relation_type.as_str())?;
            map.insert(KEY_SOURCE_CARD, r.source_card.as_str())?;
            map.insert(KEY_TARGET_CARD, r.target_card.as_str())?;
            map.insert(KEY_OWNING_SIDE, r.owning_side.as_str())?;
            map.insert(KEY_OPACITY, r.opacity)?;
        }
    }
    Ok(())
}

/// Replace the attribute list of an entity map.
fn attributes_to_loro(attributes: &[Attribute], map: &LoroMap) -> LoroResult<()> {
    let list = map.insert_container(KEY_ATTRIBUTES, LoroList::new())?;
    for attr in attributes {
        let attr_map = list.insert_container(list.len(), LoroMap::new())?;
        attr_map.insert(KEY_ID, attr.id.as_str())?;
        attr_map.insert(KEY_NAME, attr.name.as_str())?;
        attr_map.insert(KEY_DATA_TYPE, attr.data_type.as_str())?;
        attr_map.insert(KEY_REQUIRED, attr.required)?;
        attr_map.insert(KEY_PK, attr.pk)?;
    }
    Ok(())
}

/// Write only the fields a patch sets.
pub fn patch_to_loro(patch: &LayerPatch, map: &LoroMap) -> LoroResult<()> {
    match patch {
        LayerPatch::Entity(p) => entity_patch_to_loro(p, map),
        LayerPatch::Relation(p) => relation_patch_to_loro(p, map),
    }
}

fn entity_patch_to_loro(p: &EntityPatch, map: &LoroMap) -> LoroResult<()> {
    if let Some(x) = p.x {
        map.insert(KEY_X, x)?;
    }
    if let Some(y) = p.y {
        map.insert(KEY_Y, y)?;
    }
    if let Some(width) = p.width {
        map.insert(KEY_WIDTH, width)?;
    }
    if let Some(height) = p.height {
        map.insert(KEY_HEIGHT, height)?;
    }
    if let Some(name) = &p.name {
        map.insert(KEY_NAME, name.as_str())?;
    }
    if let Some(opacity) = p.opacity {
        map.insert(KEY_OPACITY, opacity)?;
    }
    if let Some(attributes) = &p.attributes {
        attributes_to_loro(attributes, map)?;
    }
    Ok(())
}

fn relation_patch_to_loro(p: &RelationPatch, map: &LoroMap) -> LoroResult<()> {
    if let Some(id) = &p.source_id {
        map.insert(KEY_SOURCE_ID, id.as_str())?;
    }
    if let Some(id) = &p.target_id {
        map.insert(KEY_TARGET_ID, id.as_str())?;
    }
    if let Some(t) = p.relation_type {
        map.insert(KEY_RELATION_TYPE, t.as_str())?;
    }
    if let Some(card) = p.source_card {
        map.insert(KEY_SOURCE_CARD, card.as_str())?;
    }
    if let Some(card) = p.target_card {
        map.insert(KEY_TARGET_CARD, card.as_str())?;
    }
    if let Some(side) = p.owning_side {
        map.insert(KEY_OWNING_SIDE, side.as_str())?;
    }
    if let Some(opacity) = p.opacity {
        map.insert(KEY_OPACITY, opacity)?;
    }
    Ok(())
}

/// Materialize a layer from its deep value. Unknown types yield `None`.
pub fn layer_from_loro(map: &LoroMapValue) -> Option<Layer> {
    let layer_type = get_string(map, KEY_TYPE)?;
    match layer_type.as_str() {
        TYPE_ENTITY => Some(Layer::Entity(entity_from_loro(map)?)),
        TYPE_RELATION => Some(Layer::Relation(relation_from_loro(map)?)),
        _ => None,
    }
}

fn entity_from_loro(map: &LoroMapValue) -> Option<EntityLayer> {
    let attributes = if let Some(LoroValue::List(list)) = map.get(KEY_ATTRIBUTES) {
        list.iter()
            .filter_map(|value| match value {
                LoroValue::Map(attr) => attribute_from_loro(attr),
                _ => None,
            })
            .collect()
    } else {
        Vec::new()
    };

    Some(EntityLayer {
        x: get_double(map, KEY_X)?,
        y: get_double(map, KEY_Y)?,
        width: get_double(map, KEY_WIDTH)?,
        height: get_double(map, KEY_HEIGHT)?,
        name: get_string(map, KEY_NAME).unwrap_or_default(),
        attributes,
        opacity: get_double(map, KEY_OPACITY).unwrap_or(100.0),
    })
}

fn attribute_from_loro(map: &LoroMapValue) -> Option<Attribute> {
    Some(Attribute {
        id: get_string(map, KEY_ID)?,
        name: get_string(map, KEY_NAME).unwrap_or_default(),
        data_type: get_string(map, KEY_DATA_TYPE).unwrap_or_default(),
        required: get_bool(map, KEY_REQUIRED).unwrap_or(false),
        pk: get_bool(map, KEY_PK).unwrap_or(false),
    })
}

fn relation_from_loro(map: &LoroMapValue) -> Option<RelationLayer> {
    Some(RelationLayer {
        source_id: get_string(map, KEY_SOURCE_ID)?,
        target_id: get_string(map, KEY_TARGET_ID)?,
        relation_type: get_string(map, KEY_RELATION_TYPE)
            .and_then(|s| RelationType::parse(&s))
            .unwrap_or_default(),
        source_card: get_string(map, KEY_SOURCE_CARD)
            .and_then(|s| Cardinality::parse(&s))
            .unwrap_or_default(),
        target_card: get_string(map, KEY_TARGET_CARD)
            .and_then(|s| Cardinality::parse(&s))
            .unwrap_or_default(),
        owning_side: get_string(map, KEY_OWNING_SIDE)
            .and_then(|s| OwningSide::parse(&s))
            .unwrap_or_default(),
        opacity: get_double(map, KEY_OPACITY).unwrap_or(100.0),
    })
}
