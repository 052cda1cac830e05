use futures::TryStreamExt;
use mongodb::{bson::Document, Cursor};

pub async fn collect_and_map<T, F>(
    mut cursor: Cursor<Document>,
    mut normalize: F,
) -> Result<Vec<T>, String>
where
    F: FnMut(&Document) -> Option<T>,
{
    let mut out = Vec::new();
    while let Some(doc) = cursor.try_next().await.map_err(|e| e.to_string())? {
        if let Some(item) = normalize(&doc) {
            out.push(item);
        }
    }
    Ok(out)
}

pub async fn collect_string_field(
    mut cursor: Cursor<Document>,
    field: &str,
) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    while let Some(doc) = cursor.try_next().await.map_err(|e| e.to_string())? {
        if let Ok(value) = doc.get_str(field) {
            out.push(value.to_string());
        }
    }
    Ok(out)
}
