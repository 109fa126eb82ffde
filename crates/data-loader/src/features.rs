//! Item attribute extraction from the DBpedia property mapping.
//!
//! Inputs:
//! - `mapping_entities.tsv`: `entity_id  uri`, two leading header lines
//! - `item-prop/train.tsv`: `item_id  entity_id  property_type`
//!
//! Property types: 2 author, 3 series, 4 genre, 5 publisher, 7 subject.
//! Single-valued properties take the first linked entity; subject collects
//! every linked `Category:` entity, each followed by a comma.

use crate::error::Result;
use crate::parser::read_lines;
use crate::types::{ItemAttributes, ItemId};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

const RESOURCE_PREFIX: &str = "http://dbpedia.org/resource/";
const CATEGORY_PREFIX: &str = "Category:";
const GENRE_SUFFIX: &str = "_(genre)";
const MAPPING_HEADER_LINES: usize = 2;

/// DBpedia property kinds carried by the item mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Author,
    Series,
    Genre,
    Publisher,
    Subject,
}

impl PropertyKind {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(PropertyKind::Author),
            3 => Some(PropertyKind::Series),
            4 => Some(PropertyKind::Genre),
            5 => Some(PropertyKind::Publisher),
            7 => Some(PropertyKind::Subject),
            _ => None,
        }
    }
}

/// Local name of a DBpedia resource URI, `None` for foreign URIs
fn resource_name(uri: &str) -> Option<&str> {
    uri.split(RESOURCE_PREFIX).nth(1)
}

/// Build the attribute table from the two DBpedia mapping files.
///
/// Items are returned in first-seen order of the item mapping. Items with
/// no usable property keep empty attributes.
pub fn extract_item_attributes(
    mapping_entities: &Path,
    item_properties: &Path,
) -> Result<Vec<ItemAttributes>> {
    let entity_lines = read_lines(mapping_entities)?;
    let mut entities: Vec<(u32, String)> = Vec::new();
    for line in entity_lines.iter().skip(MAPPING_HEADER_LINES) {
        let mut parts = line.split('\t');
        let (Some(id), Some(uri)) = (parts.next(), parts.next()) else {
            continue;
        };
        match id.trim().parse() {
            Ok(id) => entities.push((id, uri.trim().to_string())),
            Err(_) => warn!("Skipping malformed entity line: {:?}", line),
        }
    }

    let property_lines = read_lines(item_properties)?;
    let mut item_order: Vec<ItemId> = Vec::new();
    let mut seen: HashSet<ItemId> = HashSet::new();
    let mut links_by_entity: HashMap<u32, Vec<(ItemId, PropertyKind)>> = HashMap::new();
    for line in &property_lines {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let &[item, entity, kind] = fields.as_slice() else {
            continue;
        };
        let (Ok(item_id), Ok(entity_id), Ok(code)) =
            (item.parse::<ItemId>(), entity.parse::<u32>(), kind.parse::<u32>())
        else {
            warn!("Skipping malformed item property line: {:?}", line);
            continue;
        };
        if seen.insert(item_id) {
            item_order.push(item_id);
        }
        if let Some(kind) = PropertyKind::from_code(code) {
            links_by_entity.entry(entity_id).or_default().push((item_id, kind));
        }
    }

    let mut attributes: HashMap<ItemId, ItemAttributes> = item_order
        .iter()
        .map(|&id| (id, ItemAttributes::empty(id)))
        .collect();

    // Walk entities in mapping order so "first" property means first in that file
    for (entity_id, uri) in &entities {
        let Some(links) = links_by_entity.get(entity_id) else {
            continue;
        };
        let Some(name) = resource_name(uri) else {
            warn!("Entity {} is not a DBpedia resource: {}", entity_id, uri);
            continue;
        };
        for &(item_id, kind) in links {
            let Some(item) = attributes.get_mut(&item_id) else {
                continue;
            };
            apply_property(item, kind, name);
        }
    }

    let items: Vec<ItemAttributes> = item_order
        .into_iter()
        .filter_map(|id| attributes.remove(&id))
        .collect();
    info!("Extracted attributes for {} items", items.len());
    Ok(items)
}

fn apply_property(item: &mut ItemAttributes, kind: PropertyKind, name: &str) {
    let set_first = |slot: &mut String, value: &str| {
        if slot.is_empty() {
            *slot = value.to_string();
        }
    };
    match kind {
        PropertyKind::Author => set_first(&mut item.author, name),
        PropertyKind::Series => set_first(&mut item.series, name),
        PropertyKind::Publisher => set_first(&mut item.publisher, name),
        PropertyKind::Genre => set_first(&mut item.genre, &name.replace(GENRE_SUFFIX, "")),
        PropertyKind::Subject => match name.split(CATEGORY_PREFIX).nth(1) {
            Some(category) => {
                item.subject.push_str(category);
                item.subject.push(',');
            }
            None => warn!("Subject of item {} is not a category: {}", item.item_id, name),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_item_attributes() {
        let dir = TempDir::new().unwrap();
        let entities = dir.path().join("mapping_entities.tsv");
        let props = dir.path().join("item-prop.tsv");

        std::fs::write(
            &entities,
            "header\nid\tprop\n\
             100\thttp://dbpedia.org/resource/J._R._R._Tolkien\n\
             101\thttp://dbpedia.org/resource/High_fantasy_(genre)\n\
             102\thttp://dbpedia.org/resource/Category:English_novels\n\
             103\thttp://dbpedia.org/resource/Category:Fantasy_novels\n\
             104\thttp://dbpedia.org/resource/Allen_&_Unwin\n\
             105\thttp://dbpedia.org/resource/Christopher_Tolkien\n",
        )
        .unwrap();
        std::fs::write(
            &props,
            "5\t100\t2\n5\t105\t2\n5\t101\t4\n5\t102\t7\n5\t103\t7\n5\t104\t5\n6\t104\t1\n",
        )
        .unwrap();

        let items = extract_item_attributes(&entities, &props).unwrap();
        assert_eq!(items.len(), 2);

        let hobbit = &items[0];
        assert_eq!(hobbit.item_id, 5);
        assert_eq!(hobbit.author, "J._R._R._Tolkien");
        assert_eq!(hobbit.genre, "High_fantasy");
        assert_eq!(hobbit.publisher, "Allen_&_Unwin");
        assert_eq!(hobbit.series, "");
        assert_eq!(hobbit.subject, "English_novels,Fantasy_novels,");

        // Item 6 only has an unknown property type
        assert_eq!(items[1], ItemAttributes::empty(6));
    }
}
