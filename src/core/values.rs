use mongodb::bson::Bson;

pub fn optional_string_bson(value: Option<String>) -> Bson {
    value.map(Bson::String).unwrap_or(Bson::Null)
}
