//! Fixed product and location catalogs offered on button keyboards.
//!
//! Button payloads carry a slug derived from the display name; resolving a
//! slug prefers an exact catalog match so the stored value keeps its
//! original punctuation.

use crate::format;

pub const PRODUCTS: [&str; 34] = [
    "Red Onion Grade A Restaurant quality",
    "Red Onion Grade B",
    "Red Onion Grade C",
    "Red Onion Elfora",
    "Potatoes",
    "Potatoes Restaurant Quality",
    "Tomatoes Grade B",
    "Tomatoes Grade A",
    "Carrot",
    "Chilly Green",
    "Chilly Green (Elfora)",
    "White Cabbage",
    "White Cabbage (Small)",
    "White Cabbage (Large)",
    "Avocado",
    "Strawberry",
    "Papaya",
    "Courgette",
    "Cucumber",
    "Garlic",
    "Ginger",
    "Pineapple",
    "Apple Mango",
    "Lemon",
    "Apple",
    "Valencia Orange",
    "Yerer Orange",
    "Avocado Shekaraw",
    "Beet root",
    "Corn",
    "Orange",
    "Green Beans",
    "Salad",
    "Broccoli",
];

pub const LOCATIONS: [&str; 4] = [
    "Distribution Center 1 Gerji",
    "Distribution Center 2 Garment",
    "Distribution Center 3 02",
    "Distribution Center Lemi Kura/Alem Bank",
];

/// Slug used as the callback-payload suffix for a catalog item.
pub fn slug(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

/// Resolve a payload slug back into a product name.
pub fn product_from_slug(raw: &str) -> String {
    resolve(&PRODUCTS, raw)
}

/// Resolve a payload slug back into a location name.
pub fn location_from_slug(raw: &str) -> String {
    resolve(&LOCATIONS, raw)
}

fn resolve(catalog: &[&str], raw: &str) -> String {
    catalog
        .iter()
        .find(|name| slug(name) == raw)
        .map(|name| (*name).to_owned())
        .unwrap_or_else(|| format::display_name(raw))
}

#[cfg(test)]
mod tests {
    use super::{location_from_slug, product_from_slug, slug, LOCATIONS, PRODUCTS};

    #[test]
    fn slugs_are_lowercase_with_underscores() {
        assert_eq!(slug("Red Onion Grade B"), "red_onion_grade_b");
        assert_eq!(slug("Chilly Green (Elfora)"), "chilly_green_(elfora)");
    }

    #[test]
    fn every_catalog_slug_resolves_to_its_exact_name() {
        for product in PRODUCTS {
            assert_eq!(product_from_slug(&slug(product)), product);
        }
        for location in LOCATIONS {
            assert_eq!(location_from_slug(&slug(location)), location);
        }
    }

    #[test]
    fn unknown_slugs_fall_back_to_title_cased_display() {
        assert_eq!(product_from_slug("dragon_fruit"), "Dragon Fruit");
    }

    #[test]
    fn catalog_slugs_are_unique() {
        let mut slugs: Vec<_> = PRODUCTS.iter().map(|p| slug(p)).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), PRODUCTS.len());
    }
}
