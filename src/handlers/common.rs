/// Paging defaults shared by the list endpoints.
///
/// Query structs keep `page`/`per_page` as plain fields; flattening a
/// shared struct breaks number parsing in `serde_urlencoded`.
pub fn default_page() -> u64 {
    1
}

pub fn default_per_page() -> u64 {
    20
}
