//! Shared lookup tables on the site document
//!
//! Append-only, dedup-by-id category metadata populated incrementally by
//! the fetch stages and the enrichment modules. A category is looked up
//! before it is fetched; insertion only happens when the id is absent.

use super::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: i32,
    pub unit_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_abbrev: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatingLab {
    pub lab_id: i32,
    pub lab_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxon {
    pub taxon_id: i32,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbundanceElement {
    pub abundance_element_id: i32,
    pub element_name: String,
}

/// The growing set of category metadata shared across the whole site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupTables {
    #[serde(default)]
    pub methods: BTreeMap<i32, Method>,
    #[serde(default)]
    pub units: BTreeMap<i32, Unit>,
    #[serde(default)]
    pub dating_labs: BTreeMap<i32, DatingLab>,
    #[serde(default)]
    pub taxa: BTreeMap<i32, Taxon>,
    #[serde(default)]
    pub abundance_elements: BTreeMap<i32, AbundanceElement>,
}

impl LookupTables {
    /// Insert-if-absent. Returns true when the method was newly added.
    pub fn add_method(&mut self, method: Method) -> bool {
        insert_absent(&mut self.methods, method.method_id, method)
    }

    pub fn add_unit(&mut self, unit: Unit) -> bool {
        insert_absent(&mut self.units, unit.unit_id, unit)
    }

    pub fn add_dating_lab(&mut self, lab: DatingLab) -> bool {
        insert_absent(&mut self.dating_labs, lab.lab_id, lab)
    }

    pub fn add_taxon(&mut self, taxon: Taxon) -> bool {
        insert_absent(&mut self.taxa, taxon.taxon_id, taxon)
    }

    pub fn add_abundance_element(&mut self, element: AbundanceElement) -> bool {
        insert_absent(&mut self.abundance_elements, element.abundance_element_id, element)
    }

    pub fn has_taxon(&self, taxon_id: i32) -> bool {
        self.taxa.contains_key(&taxon_id)
    }

    pub fn has_unit(&self, unit_id: i32) -> bool {
        self.units.contains_key(&unit_id)
    }
}

fn insert_absent<V>(map: &mut BTreeMap<i32, V>, id: i32, value: V) -> bool {
    if map.contains_key(&id) {
        return false;
    }
    map.insert(id, value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_insert_keeps_first_entry() {
        let mut tables = LookupTables::default();
        assert!(tables.add_unit(Unit {
            unit_id: 5,
            unit_name: "year".to_string(),
            unit_abbrev: Some("yr".to_string()),
        }));
        assert!(!tables.add_unit(Unit {
            unit_id: 5,
            unit_name: "overwritten".to_string(),
            unit_abbrev: None,
        }));
        assert_eq!(tables.units.len(), 1);
        assert_eq!(tables.units[&5].unit_name, "year");
    }

    #[test]
    fn test_taxon_dedup() {
        let mut tables = LookupTables::default();
        let taxon = Taxon {
            taxon_id: 42,
            family: Some("Pinaceae".to_string()),
            genus: Some("Pinus".to_string()),
            species: None,
        };
        assert!(tables.add_taxon(taxon.clone()));
        assert!(!tables.add_taxon(taxon));
        assert_eq!(tables.taxa.len(), 1);
        assert!(tables.has_taxon(42));
    }
}
