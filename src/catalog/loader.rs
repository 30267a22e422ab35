use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use super::product::Product;
use super::Catalog;
use crate::allergens::{format_allergen_list, parse_allergen_list};
use crate::canonical::ConfidenceLevel;
use crate::error::{CanonError, Result};

const ID_COL: &str = "id";
const NAME_COL: &str = "name";
const BRAND_COL: &str = "brand";
const TAG_COL: &str = "canonical_tag";
const CONFIDENCE_COL: &str = "confidence_level";
const ALLERGENS_COL: &str = "allergens";
const INGREDIENTS_COL: &str = "ingredients_text";
const GENERIC_COL: &str = "is_generic";

const COLUMNS: [&str; 8] = [
    ID_COL,
    NAME_COL,
    BRAND_COL,
    TAG_COL,
    CONFIDENCE_COL,
    ALLERGENS_COL,
    INGREDIENTS_COL,
    GENERIC_COL,
];

fn optional_cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_bool(cell: Option<String>) -> bool {
    matches!(
        cell.as_deref().map(str::to_lowercase).as_deref(),
        Some("true" | "1" | "yes" | "t")
    )
}

/// Load the product catalog from CSV. `id` and `name` are required columns.
pub fn load_products(csv_path: &Path) -> Result<Catalog> {
    let file = std::fs::File::open(csv_path).map_err(|e| CanonError::io(csv_path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = rdr.headers().map_err(|e| CanonError::csv(csv_path, e))?.clone();
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let id_idx = position(ID_COL).ok_or_else(|| CanonError::missing_column(ID_COL, csv_path))?;
    let name_idx =
        position(NAME_COL).ok_or_else(|| CanonError::missing_column(NAME_COL, csv_path))?;
    let brand_idx = position(BRAND_COL);
    let tag_idx = position(TAG_COL);
    let confidence_idx = position(CONFIDENCE_COL);
    let allergens_idx = position(ALLERGENS_COL);
    let ingredients_idx = position(INGREDIENTS_COL);
    let generic_idx = position(GENERIC_COL);

    let mut products = Vec::new();
    let mut seen_ids = HashSet::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| CanonError::csv(csv_path, e))?;

        let Some(name) = optional_cell(&record, Some(name_idx)) else {
            tracing::warn!(row = row_index + 1, "skipping product row with empty name");
            continue;
        };
        let id = optional_cell(&record, Some(id_idx))
            .unwrap_or_else(|| format!("row-{}", row_index + 1));
        if !seen_ids.insert(id.clone()) {
            return Err(CanonError::DuplicateEntry {
                kind: "product id",
                key: id,
            });
        }

        let confidence_level = optional_cell(&record, confidence_idx)
            .map(|c| c.parse::<ConfidenceLevel>())
            .transpose()?;
        let allergens = match optional_cell(&record, allergens_idx) {
            Some(list) => parse_allergen_list(&list)?,
            None => Default::default(),
        };

        products.push(Product {
            id,
            name,
            brand: optional_cell(&record, brand_idx),
            canonical_tag: optional_cell(&record, tag_idx).map(|t| t.to_lowercase()),
            confidence_level,
            allergens,
            ingredients_text: optional_cell(&record, ingredients_idx),
            is_generic: parse_bool(optional_cell(&record, generic_idx)),
        });
    }

    if products.is_empty() {
        return Err(CanonError::EmptyDataset {
            path: csv_path.to_path_buf(),
        });
    }

    tracing::info!(products = products.len(), path = ?csv_path, "loaded product catalog");
    Ok(Catalog::new(products))
}

/// Write the catalog back with the full column set.
pub fn save_products(catalog: &Catalog, csv_path: &Path) -> Result<()> {
    if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CanonError::io(parent, e))?;
    }
    let mut wtr = WriterBuilder::new()
        .from_path(csv_path)
        .map_err(|e| CanonError::csv(csv_path, e))?;

    wtr.write_record(COLUMNS)
        .map_err(|e| CanonError::csv(csv_path, e))?;
    for product in catalog.iter() {
        let confidence = product
            .confidence_level
            .map(|c| c.as_str().to_string())
            .unwrap_or_default();
        wtr.write_record([
            product.id.as_str(),
            product.name.as_str(),
            product.brand.as_deref().unwrap_or_default(),
            product.canonical_tag.as_deref().unwrap_or_default(),
            confidence.as_str(),
            format_allergen_list(&product.allergens).as_str(),
            product.ingredients_text.as_deref().unwrap_or_default(),
            if product.is_generic { "true" } else { "false" },
        ])
        .map_err(|e| CanonError::csv(csv_path, e))?;
    }
    wtr.flush().map_err(|e| CanonError::io(csv_path, e))?;

    tracing::info!(products = catalog.len(), path = ?csv_path, "saved product catalog");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allergens::Allergen;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_products_success() -> Result<()> {
        let file = write_csv(&[
            "id,name,brand,canonical_tag,confidence_level,allergens,ingredients_text,is_generic",
            "p1,Organic Garlic Bulbs,FarmCo,Garlic,confident,,,false",
            "p2,Salted Butter,Dairyland,butter,suggested,milk,\"cream, salt\",",
            "p3,,NoName,,,,,",
            "generic:salt,salt,,salt,confident,,,true",
        ]);
        let catalog = load_products(file.path())?;
        assert_eq!(catalog.len(), 3);

        let garlic = catalog.get("p1").unwrap();
        assert_eq!(garlic.canonical_tag.as_deref(), Some("garlic"));
        assert_eq!(garlic.confidence_level, Some(ConfidenceLevel::Confident));
        assert!(!garlic.is_generic);

        let butter = catalog.get("p2").unwrap();
        assert!(butter.allergens.contains(&Allergen::Milk));
        assert_eq!(butter.ingredients_text.as_deref(), Some("cream, salt"));

        assert!(catalog.get("generic:salt").unwrap().is_generic);
        Ok(())
    }

    #[test]
    fn test_minimal_columns() -> Result<()> {
        let file = write_csv(&["id,name", "a,Roma Tomatoes"]);
        let catalog = load_products(file.path())?;
        let product = catalog.get("a").unwrap();
        assert!(product.canonical_tag.is_none());
        assert!(product.allergens.is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let file = write_csv(&["id,name", "a,Garlic", "a,Onion"]);
        assert!(matches!(
            load_products(file.path()),
            Err(CanonError::DuplicateEntry { .. })
        ));
    }

    #[test]
    fn test_bad_confidence_rejected() {
        let file = write_csv(&["id,name,confidence_level", "a,Garlic,certain"]);
        assert!(matches!(
            load_products(file.path()),
            Err(CanonError::UnknownConfidence(_))
        ));
    }

    #[test]
    fn test_missing_name_column() {
        let file = write_csv(&["id,title", "a,Garlic"]);
        let err = load_products(file.path()).unwrap_err();
        assert!(err.to_string().contains("Column 'name' not found"));
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let file = write_csv(&[
            "id,name,brand,canonical_tag,confidence_level,allergens",
            "p1,Peanut Butter,Jiffy,peanut butter,confident,peanut",
        ]);
        let catalog = load_products(file.path())?;

        let out = tempfile::tempdir().unwrap();
        let out_path = out.path().join("nested").join("products.csv");
        save_products(&catalog, &out_path)?;

        let reloaded = load_products(&out_path)?;
        assert_eq!(reloaded.get("p1"), catalog.get("p1"));
        Ok(())
    }
}
