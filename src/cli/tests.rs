use super::create_starter_catalog;
use crate::catalog::Product;

#[test]
fn test_create_starter_catalog() {
    let dir = tempfile::tempdir().unwrap();
    create_starter_catalog(dir.path()).unwrap();

    let path = dir.path().join("products.json");
    assert!(path.exists());

    let content = std::fs::read_to_string(&path).unwrap();
    let products: Vec<Product> = serde_json::from_str(&content).unwrap();
    assert_eq!(products.len(), 3);
    assert!(products.iter().all(|p| p.available));
    assert!(products.iter().all(|p| p.price.is_some()));
    assert!(products.iter().all(|p| p.image_url.is_some()));
}

#[test]
fn test_create_starter_catalog_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("products.json");
    std::fs::write(&path, "[]").unwrap();

    create_starter_catalog(dir.path()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "[]");
}
